//! Decoded voxel scenes: models, transformed instances, per-instance
//! normalization and the parallel merge into one scene grid.
#![forbid(unsafe_code)]

mod merge;
mod normalize;

pub use merge::{MergeError, SceneGrid, merge_scene, scene_bounds};
pub use normalize::{NormalizedInstance, Sample, UnifyError, normalize_instance, normalize_scene};

use std::fmt;

use hexvox_geom::{IVec3, Mat4};

/// Dense palette grid of one model. `0` is empty, `1..=255` is palette
/// index + 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Model {
    pub size: IVec3,
    pub voxels: Vec<u8>,
}

impl Model {
    pub fn new(size: IVec3, voxels: Vec<u8>) -> Self {
        Self { size, voxels }
    }

    /// Model of `size` with every voxel set to `value`.
    pub fn filled(size: IVec3, value: u8) -> Self {
        let count = (size.x.max(0) * size.y.max(0) * size.z.max(0)) as usize;
        Self::new(size, vec![value; count])
    }

    #[inline]
    pub fn index(&self, x: i32, y: i32, z: i32) -> usize {
        (x + self.size.x * y + self.size.x * self.size.y * z) as usize
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> u8 {
        self.voxels.get(self.index(x, y, z)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, x: i32, y: i32, z: i32, value: u8) {
        let i = self.index(x, y, z);
        if let Some(v) = self.voxels.get_mut(i) {
            *v = value;
        }
    }

    /// True when the voxel buffer is missing or does not cover `size`.
    pub fn is_degenerate(&self) -> bool {
        let s = self.size;
        s.x <= 0
            || s.y <= 0
            || s.z <= 0
            || self.voxels.len() != (s.x as usize) * (s.y as usize) * (s.z as usize)
    }
}

/// A model placed in the scene. `transform` is row-vector: translation in
/// row 3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub model_index: usize,
    pub transform: Mat4,
}

impl Instance {
    pub fn new(model_index: usize, transform: Mat4) -> Self {
        Self {
            model_index,
            transform,
        }
    }
}

/// Decoder output. A `None` model is one the decoder could not produce voxel
/// data for; instances referencing it fail normalization.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub models: Vec<Option<Model>>,
    pub instances: Vec<Instance>,
}

impl Scene {
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index).and_then(Option::as_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene decode failed: {}", self.0)
    }
}

impl std::error::Error for DecodeError {}

/// Turns an encoded scene file into a [`Scene`].
pub trait SceneDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Scene, DecodeError>;
}

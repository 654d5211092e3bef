use std::fmt;

use hexvox_geom::{IVec3, IntBox, Mat4, Vec3};

use crate::{Model, Scene};

/// Offset of a voxel's corner from its center in the default voxel frame.
const VOXEL_PIVOT: Vec3 = Vec3::splat(-0.5);

/// One occupied voxel, positioned relative to its instance's `bounds.min`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub pos: IVec3,
    pub value: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedInstance {
    pub bounds: IntBox,
    pub samples: Vec<Sample>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnifyError {
    pub model_index: usize,
    pub transform: Mat4,
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to import model index {} at transform {}",
            self.model_index, self.transform
        )
    }
}

impl std::error::Error for UnifyError {}

/// Maps `model` through `transform` onto the integer world grid.
///
/// The world half extent is the absolute value of the transformed local half
/// extent, so only 90 degree rotations give a tight box. The index matrix
/// keeps the rotation and replaces the translation so that every local cell
/// truncates onto its own world cell, with pivots chosen so odd and even
/// sizes both rotate around the true model center. Zero voxels are skipped.
///
/// Returns `None` for a model without usable voxel data.
pub fn normalize_instance(model: &Model, transform: &Mat4) -> Option<NormalizedInstance> {
    if model.is_degenerate() {
        return None;
    }

    let local_half = model.size.as_vec3() * 0.5;
    let world_half = transform.transform_vector(local_half).abs();

    let pivot = local_half.fract();
    let center_to_origin_voxel = -local_half.floor() + Vec3::splat(0.5);

    let center = transform.translation();
    let origin = center + transform.transform_vector(pivot) - world_half;
    let unified = center + transform.transform_vector(center_to_origin_voxel) + VOXEL_PIVOT;
    let index_matrix = transform.with_translation(unified - origin);

    let bounds = IntBox {
        min: origin.truncate(),
        max: (origin + world_half * 2.0).truncate(),
    };

    let mut samples = Vec::new();
    for z in 0..model.size.z {
        for y in 0..model.size.y {
            for x in 0..model.size.x {
                let value = model.get(x, y, z);
                if value == 0 {
                    continue;
                }
                let pos = index_matrix
                    .transform_position(IVec3::new(x, y, z).as_vec3())
                    .truncate();
                samples.push(Sample { pos, value });
            }
        }
    }

    Some(NormalizedInstance { bounds, samples })
}

/// Normalizes every instance in scene order; the first instance whose model
/// is missing or empty aborts with its index and transform.
pub fn normalize_scene(scene: &Scene) -> Result<Vec<NormalizedInstance>, UnifyError> {
    scene
        .instances
        .iter()
        .map(|inst| {
            scene
                .model(inst.model_index)
                .and_then(|model| normalize_instance(model, &inst.transform))
                .ok_or(UnifyError {
                    model_index: inst.model_index,
                    transform: inst.transform,
                })
        })
        .collect()
}

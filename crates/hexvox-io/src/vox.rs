//! `.vox` decoding through the `dot_vox` crate.

use dot_vox::{Dict, DotVoxData, SceneNode};
use hexvox_geom::{IVec3, Mat4, Vec3};
use hexvox_scene::{DecodeError, Instance, Model, Scene, SceneDecoder};

/// Scene graphs deeper than this are treated as cyclic.
const MAX_DEPTH: usize = 64;

/// [`SceneDecoder`] for MagicaVoxel files.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoxDecoder;

impl SceneDecoder for VoxDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Scene, DecodeError> {
        let data = dot_vox::load_bytes(bytes).map_err(|e| DecodeError(e.to_string()))?;
        scene_from_vox(&data)
    }
}

/// Flattens models and the transform graph into a [`Scene`].
pub fn scene_from_vox(data: &DotVoxData) -> Result<Scene, DecodeError> {
    let models = data.models.iter().map(convert_model).collect();
    let mut instances = Vec::new();
    if data.scenes.is_empty() {
        instances.extend((0..data.models.len()).map(|i| Instance::new(i, Mat4::IDENTITY)));
    } else {
        walk(&data.scenes, 0, Mat4::IDENTITY, 0, &mut instances)?;
    }
    log::debug!(
        "decoded {} model(s), {} instance(s)",
        data.models.len(),
        instances.len()
    );
    Ok(Scene { models, instances })
}

fn walk(
    nodes: &[SceneNode],
    index: u32,
    parent: Mat4,
    depth: usize,
    out: &mut Vec<Instance>,
) -> Result<(), DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError(format!("scene graph deeper than {MAX_DEPTH}")));
    }
    let node = nodes
        .get(index as usize)
        .ok_or_else(|| DecodeError(format!("scene node {index} out of range")))?;
    match node {
        SceneNode::Transform { frames, child, .. } => {
            let local = frames
                .first()
                .map(|f| frame_transform(&f.attributes))
                .unwrap_or(Mat4::IDENTITY);
            walk(nodes, *child, local * parent, depth + 1, out)
        }
        SceneNode::Group { children, .. } => children
            .iter()
            .try_for_each(|&c| walk(nodes, c, parent, depth + 1, out)),
        SceneNode::Shape { models, .. } => {
            out.extend(
                models
                    .iter()
                    .map(|m| Instance::new(m.model_id as usize, parent)),
            );
            Ok(())
        }
        #[allow(unreachable_patterns)]
        _ => Ok(()),
    }
}

/// Dense model with `palette index + 1` per voxel; models without voxels
/// come back as `None`.
pub fn convert_model(model: &dot_vox::Model) -> Option<Model> {
    if model.voxels.is_empty() {
        return None;
    }
    let size = IVec3::new(
        model.size.x as i32,
        model.size.y as i32,
        model.size.z as i32,
    );
    let mut out = Model::filled(size, 0);
    for v in &model.voxels {
        let (x, y, z) = (i32::from(v.x), i32::from(v.y), i32::from(v.z));
        if x < size.x && y < size.y && z < size.z {
            out.set(x, y, z, v.i.saturating_add(1));
        }
    }
    Some(out)
}

/// Row-vector matrix from a transform frame's `_r` and `_t` attributes.
pub fn frame_transform(attributes: &Dict) -> Mat4 {
    let rotation = attributes
        .get("_r")
        .and_then(|r| r.trim().parse::<u8>().ok())
        .map(rotation_matrix)
        .unwrap_or(Mat4::IDENTITY);
    let translation = attributes.get("_t").and_then(|t| {
        let parts: Vec<f32> = t
            .split_whitespace()
            .filter_map(|s| s.parse::<f32>().ok())
            .collect();
        match parts[..] {
            [x, y, z] => Some(Vec3::new(x, y, z)),
            _ => None,
        }
    });
    match translation {
        Some(t) => rotation * Mat4::from_translation(t),
        None => rotation,
    }
}

/// Decodes MagicaVoxel's packed rotation byte.
///
/// Bits 0-1 and 2-3 give the column of the non-zero entry in rows 0 and 1,
/// row 2 takes the remaining column, bits 4-6 negate rows 0-2. The rows are
/// written transposed so the result applies as `p * M`.
pub fn rotation_matrix(bits: u8) -> Mat4 {
    let c0 = usize::from(bits & 3).min(2);
    let c1 = usize::from((bits >> 2) & 3).min(2);
    let c2 = (0..3).find(|&c| c != c0 && c != c1).unwrap_or(2);

    let mut c = [0.0; 16];
    c[15] = 1.0;
    for (row, col) in [c0, c1, c2].into_iter().enumerate() {
        let sign = if bits & (1 << (4 + row)) != 0 { -1.0 } else { 1.0 };
        c[col * 4 + row] = sign;
    }
    Mat4::from_array(c)
}

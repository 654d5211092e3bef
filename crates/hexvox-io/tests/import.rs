use std::sync::Arc;

use hexvox_field::{DenseField, FieldStats, VoxelField};
use hexvox_geom::{IVec3, IntBox, Mat4, Vec3};
use hexvox_hex::HexSettings;
use hexvox_io::vox::rotation_matrix;
use hexvox_io::{ImportError, VoxDecoder, import_file, import_scene};
use hexvox_pool::{PoolConfig, WorkerPool};
use hexvox_scene::{DecodeError, Instance, Model, Scene, SceneDecoder, normalize_instance};

/// Hands back a prepared scene, or fails for an empty input buffer.
struct FixedDecoder(Scene);

impl SceneDecoder for FixedDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Scene, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError("empty buffer".into()));
        }
        Ok(self.0.clone())
    }
}

fn pool() -> WorkerPool {
    WorkerPool::new(PoolConfig::with_threads(4)).unwrap()
}

fn import(scene: Scene, pool: &WorkerPool, field: &Arc<DenseField>) -> Result<hexvox_io::ImportSummary, ImportError> {
    import_scene(
        b"scene",
        &FixedDecoder(scene),
        pool,
        field,
        &Arc::new(HexSettings::default()),
    )
}

fn cube_scene() -> Scene {
    Scene {
        models: vec![Some(Model::filled(IVec3::new(2, 2, 2), 1))],
        instances: vec![Instance::new(0, Mat4::IDENTITY)],
    }
}

#[test]
fn solid_cube_end_to_end() {
    let field = Arc::new(DenseField::default());
    let summary = import(cube_scene(), &pool(), &field).unwrap();

    assert_eq!(summary.bounds.size(), IVec3::new(2, 2, 2));
    assert_eq!(summary.instances, 1);
    assert_eq!(summary.occupied, 8);
    assert_eq!(summary.slabs, 2);
    assert_eq!(field.size(), IVec3::new(2, 2, 2));

    for z in 0..2 {
        for row in 0..2 {
            for col in 0..2 {
                let p = IVec3::new(row, col, z);
                let d = field.density(p).expect("density set");
                assert!(d.value() != 0.0, "zero density at {p}");
                assert_eq!(field.material(p), Some(0));
            }
        }
    }
}

#[test]
fn field_axes_are_swapped() {
    // 3 wide along X, 1 deep along Y
    let scene = Scene {
        models: vec![Some(Model::filled(IVec3::new(3, 1, 1), 2))],
        instances: vec![Instance::new(0, Mat4::IDENTITY)],
    };
    let field = Arc::new(DenseField::default());
    import(scene, &pool(), &field).unwrap();
    assert_eq!(field.size(), IVec3::new(1, 3, 1));
    assert_eq!(field.material(IVec3::new(0, 2, 0)), Some(1));
    assert_eq!(FieldStats::collect(&*field).with_material, 3);
}

#[test]
fn two_instances_share_one_field() {
    let model = Model::filled(IVec3::new(2, 2, 2), 1);
    let scene = Scene {
        models: vec![Some(model)],
        instances: vec![
            Instance::new(0, Mat4::IDENTITY),
            Instance::new(0, Mat4::from_translation(Vec3::new(4.0, 0.0, 0.0))),
        ],
    };
    let field = Arc::new(DenseField::default());
    let summary = import(scene, &pool(), &field).unwrap();
    assert_eq!(
        summary.bounds,
        IntBox::new(IVec3::new(-1, -1, -1), IVec3::new(5, 1, 1))
    );
    assert_eq!(summary.occupied, 16);
    let stats = FieldStats::collect(&*field);
    assert_eq!(stats.with_material, 16);
    assert_eq!(stats.unset, 0);
}

#[test]
fn decode_failure_is_reported() {
    let field = Arc::new(DenseField::default());
    let err = import_scene(
        b"",
        &FixedDecoder(cube_scene()),
        &pool(),
        &field,
        &Arc::new(HexSettings::default()),
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::DecodeFailed(ref m) if m == "empty buffer"));
}

#[test]
fn scene_without_models_is_rejected() {
    let field = Arc::new(DenseField::default());
    let err = import(Scene::default(), &pool(), &field).unwrap_err();
    assert!(matches!(err, ImportError::NoModels));
}

#[test]
fn missing_model_names_instance() {
    let shifted = Mat4::from_translation(Vec3::new(0.0, 8.0, 0.0));
    let scene = Scene {
        models: vec![Some(Model::filled(IVec3::new(1, 1, 1), 1)), None],
        instances: vec![Instance::new(0, Mat4::IDENTITY), Instance::new(1, shifted)],
    };
    let field = Arc::new(DenseField::default());
    match import(scene, &pool(), &field).unwrap_err() {
        ImportError::ModelUnifyFailed {
            model_index,
            transform,
        } => {
            assert_eq!(model_index, 1);
            assert_eq!(transform, shifted);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn instance_less_scene_fails_merge() {
    let scene = Scene {
        models: vec![Some(Model::filled(IVec3::new(1, 1, 1), 1))],
        instances: Vec::new(),
    };
    let field = Arc::new(DenseField::default());
    let err = import(scene, &pool(), &field).unwrap_err();
    assert!(matches!(err, ImportError::MergeFailed(_)));
}

#[test]
fn shut_down_pool_fails_merge() {
    let pool = pool();
    pool.abandon_all();
    let field = Arc::new(DenseField::default());
    let err = import(cube_scene(), &pool, &field).unwrap_err();
    assert!(matches!(err, ImportError::MergeFailed(_)), "{err}");
}

#[test]
fn missing_file_is_reported() {
    let field = Arc::new(DenseField::default());
    let path = std::env::temp_dir().join("hexvox-does-not-exist.vox");
    let err = import_file(
        &path,
        &VoxDecoder,
        &pool(),
        &field,
        &Arc::new(HexSettings::default()),
    )
    .unwrap_err();
    match &err {
        ImportError::FileOpenFailed { path: p, .. } => assert_eq!(p, &path),
        other => panic!("unexpected error {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
}

fn chunk(id: &[u8; 4], content: &[u8], children: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend((content.len() as i32).to_le_bytes());
    out.extend((children.len() as i32).to_le_bytes());
    out.extend(content);
    out.extend(children);
    out
}

fn model_chunks(size: (i32, i32, i32), voxels: &[(u8, u8, u8, u8)]) -> Vec<u8> {
    let mut size_content = Vec::new();
    for v in [size.0, size.1, size.2] {
        size_content.extend(v.to_le_bytes());
    }
    let mut xyzi = (voxels.len() as i32).to_le_bytes().to_vec();
    for &(x, y, z, i) in voxels {
        xyzi.extend([x, y, z, i]);
    }
    let mut out = chunk(b"SIZE", &size_content, &[]);
    out.extend(chunk(b"XYZI", &xyzi, &[]));
    out
}

fn vox_file(children: &[u8]) -> Vec<u8> {
    let mut out = b"VOX ".to_vec();
    out.extend(150i32.to_le_bytes());
    out.extend(chunk(b"MAIN", &[], children));
    out
}

/// Minimal MagicaVoxel file: one model, no scene graph.
fn tiny_vox(size: (i32, i32, i32), voxels: &[(u8, u8, u8, u8)]) -> Vec<u8> {
    vox_file(&model_chunks(size, voxels))
}

fn vox_dict(pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut out = (pairs.len() as u32).to_le_bytes().to_vec();
    for (k, v) in pairs {
        for s in [k, v] {
            out.extend((s.len() as u32).to_le_bytes());
            out.extend(s.as_bytes());
        }
    }
    out
}

fn transform_node(id: u32, child: u32, frame: &[(&str, &str)]) -> Vec<u8> {
    let mut c = id.to_le_bytes().to_vec();
    c.extend(vox_dict(&[]));
    c.extend(child.to_le_bytes());
    c.extend((-1i32).to_le_bytes());
    c.extend(0u32.to_le_bytes());
    c.extend(1u32.to_le_bytes());
    c.extend(vox_dict(frame));
    chunk(b"nTRN", &c, &[])
}

fn group_node(id: u32, children: &[u32]) -> Vec<u8> {
    let mut c = id.to_le_bytes().to_vec();
    c.extend(vox_dict(&[]));
    c.extend((children.len() as u32).to_le_bytes());
    for child in children {
        c.extend(child.to_le_bytes());
    }
    chunk(b"nGRP", &c, &[])
}

fn shape_node(id: u32, model_id: u32) -> Vec<u8> {
    let mut c = id.to_le_bytes().to_vec();
    c.extend(vox_dict(&[]));
    c.extend(1u32.to_le_bytes());
    c.extend(model_id.to_le_bytes());
    c.extend(vox_dict(&[]));
    chunk(b"nSHP", &c, &[])
}

/// One 3x1x1 bar placed twice under a translated root: once turned a
/// quarter about Z, once shifted along Y.
fn scene_graph_vox() -> Vec<u8> {
    let mut children = model_chunks((3, 1, 1), &[(0, 0, 0, 1), (1, 0, 0, 1), (2, 0, 0, 1)]);
    children.extend(transform_node(0, 1, &[("_t", "10 0 0")]));
    children.extend(group_node(1, &[2, 4]));
    children.extend(transform_node(2, 3, &[("_r", "17")]));
    children.extend(shape_node(3, 0));
    children.extend(transform_node(4, 5, &[("_t", "0 5 0")]));
    children.extend(shape_node(5, 0));
    vox_file(&children)
}

#[test]
fn vox_file_round_trip() {
    let bytes = tiny_vox((2, 2, 1), &[(0, 0, 0, 3), (1, 1, 0, 7)]);
    let path = std::env::temp_dir().join(format!("hexvox-import-{}.vox", std::process::id()));
    std::fs::write(&path, &bytes).unwrap();

    let field = Arc::new(DenseField::default());
    let summary = import_file(
        &path,
        &VoxDecoder,
        &pool(),
        &field,
        &Arc::new(HexSettings::default()),
    );
    let _ = std::fs::remove_file(&path);
    let summary = summary.unwrap();

    assert_eq!(summary.bounds.size(), IVec3::new(2, 2, 1));
    assert_eq!(summary.occupied, 2);
    // file palette indices are 1-based, materials 0-based
    assert_eq!(field.material(IVec3::new(0, 0, 0)), Some(2));
    assert_eq!(field.material(IVec3::new(1, 1, 0)), Some(6));
    assert_eq!(field.material(IVec3::new(1, 0, 0)), None);
}

#[test]
fn garbage_bytes_fail_to_decode() {
    let field = Arc::new(DenseField::default());
    let err = import_scene(
        b"not a vox file",
        &VoxDecoder,
        &pool(),
        &field,
        &Arc::new(HexSettings::default()),
    )
    .unwrap_err();
    assert!(matches!(err, ImportError::DecodeFailed(_)));
}

#[test]
fn scene_graph_transforms_compose_child_first() {
    let scene = VoxDecoder.decode(&scene_graph_vox()).unwrap();
    assert_eq!(scene.models.len(), 1);
    assert_eq!(scene.instances.len(), 2);

    let root = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
    let turned = rotation_matrix(17) * root;
    let shifted = Mat4::from_translation(Vec3::new(10.0, 5.0, 0.0));
    assert_eq!(scene.instances[0], Instance::new(0, turned));
    assert_eq!(scene.instances[1], Instance::new(0, shifted));
    assert_eq!(
        turned.transform_position(Vec3::new(1.0, 0.0, 0.0)),
        Vec3::new(10.0, 1.0, 0.0)
    );
}

#[test]
fn scene_graph_file_imports_both_instances() {
    let path = std::env::temp_dir().join(format!("hexvox-graph-{}.vox", std::process::id()));
    std::fs::write(&path, scene_graph_vox()).unwrap();
    let field = Arc::new(DenseField::default());
    let summary = import_file(
        &path,
        &VoxDecoder,
        &pool(),
        &field,
        &Arc::new(HexSettings::default()),
    );
    let _ = std::fs::remove_file(&path);
    let summary = summary.unwrap();

    let bar = Model::filled(IVec3::new(3, 1, 1), 1);
    let root = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
    let a = normalize_instance(&bar, &(rotation_matrix(17) * root)).unwrap();
    let b = normalize_instance(&bar, &Mat4::from_translation(Vec3::new(10.0, 5.0, 0.0))).unwrap();
    assert_eq!(a.bounds, IntBox::new(IVec3::new(9, -1, 0), IVec3::new(10, 2, 1)));
    assert_eq!(b.bounds, IntBox::new(IVec3::new(9, 5, 0), IVec3::new(12, 6, 1)));
    assert_eq!(summary.bounds, a.bounds.union(&b.bounds));
    assert_eq!(summary.instances, 2);
    assert_eq!(summary.occupied, 6);

    // the turned bar runs along scene Y, which is the field's row axis
    assert_eq!(field.size(), IVec3::new(7, 3, 1));
    for row in 0..3 {
        assert_eq!(field.material(IVec3::new(row, 0, 0)), Some(0));
    }
    for col in 0..3 {
        assert_eq!(field.material(IVec3::new(6, col, 0)), Some(0));
    }
    assert_eq!(field.material(IVec3::new(4, 0, 0)), None);
    assert_eq!(FieldStats::collect(&*field).with_material, 6);
}

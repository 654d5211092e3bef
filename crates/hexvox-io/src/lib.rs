//! Scene import pipeline: decode, normalize every instance, merge into one
//! grid, then voxelize into the output field.
#![forbid(unsafe_code)]

pub mod vox;

pub use vox::VoxDecoder;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use hexvox_field::VoxelField;
use hexvox_geom::{IntBox, Mat4};
use hexvox_hex::{HexSettings, VoxelizeStats, voxelize};
use hexvox_pool::WorkerPool;
use hexvox_scene::{SceneDecoder, merge_scene, normalize_scene};

#[derive(Debug)]
pub enum ImportError {
    FileOpenFailed { path: PathBuf, source: io::Error },
    DecodeFailed(String),
    NoModels,
    ModelUnifyFailed { model_index: usize, transform: Mat4 },
    MergeFailed(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::FileOpenFailed { path, source } => {
                write!(f, "failed to open {}: {}", path.display(), source)
            }
            ImportError::DecodeFailed(msg) => write!(f, "error decoding the scene: {}", msg),
            ImportError::NoModels => write!(f, "no models in the file"),
            ImportError::ModelUnifyFailed {
                model_index,
                transform,
            } => write!(
                f,
                "failed to import model index {} at transform {}",
                model_index, transform
            ),
            ImportError::MergeFailed(reason) => write!(f, "failed to merge scene: {}", reason),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::FileOpenFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Outcome of a successful import.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub bounds: IntBox,
    pub instances: usize,
    pub occupied: usize,
    pub slabs: usize,
    pub voxelize: VoxelizeStats,
}

/// Imports an encoded scene into `field`.
///
/// Input errors are reported before any work reaches the pool. Nothing
/// partial is returned on failure, though `field` may hold a half-written
/// result if voxelization was abandoned.
pub fn import_scene<D, F>(
    bytes: &[u8],
    decoder: &D,
    pool: &WorkerPool,
    field: &Arc<F>,
    settings: &Arc<HexSettings>,
) -> Result<ImportSummary, ImportError>
where
    D: SceneDecoder + ?Sized,
    F: VoxelField + ?Sized + 'static,
{
    let start = Instant::now();
    let scene = decoder
        .decode(bytes)
        .map_err(|e| ImportError::DecodeFailed(e.0))?;
    if scene.models.is_empty() {
        return Err(ImportError::NoModels);
    }

    let instances = normalize_scene(&scene).map_err(|e| ImportError::ModelUnifyFailed {
        model_index: e.model_index,
        transform: e.transform,
    })?;
    let instance_count = instances.len();

    let grid = merge_scene(pool, instances).map_err(|e| ImportError::MergeFailed(e.to_string()))?;
    let occupied = grid.occupied_count();
    log::debug!(
        "merged scene {} with {} occupied cell(s)",
        grid.bounds(),
        occupied
    );

    let stats =
        voxelize(pool, &grid, field, settings).map_err(|e| ImportError::MergeFailed(e.to_string()))?;

    let summary = ImportSummary {
        bounds: grid.bounds(),
        instances: instance_count,
        occupied,
        slabs: stats.slabs,
        voxelize: stats,
    };
    log::info!(
        "imported {} instance(s) into {} ({} occupied, {} split, {} seam) in {:?}",
        summary.instances,
        summary.bounds,
        summary.occupied,
        stats.split,
        stats.seams,
        start.elapsed()
    );
    Ok(summary)
}

/// Reads `path` and hands its bytes to [`import_scene`].
pub fn import_file<D, F>(
    path: &Path,
    decoder: &D,
    pool: &WorkerPool,
    field: &Arc<F>,
    settings: &Arc<HexSettings>,
) -> Result<ImportSummary, ImportError>
where
    D: SceneDecoder + ?Sized,
    F: VoxelField + ?Sized + 'static,
{
    let bytes = std::fs::read(path).map_err(|source| ImportError::FileOpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("read {} byte(s) from {}", bytes.len(), path.display());
    import_scene(&bytes, decoder, pool, field, settings)
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use hexvox_field::{Density, VoxelField};
use hexvox_geom::{IVec3, IntBox};
use hexvox_pool::{Job, WorkerPool};
use hexvox_scene::SceneGrid;

use crate::lattice::{border_clock, candidate_center};
use crate::settings::HexSettings;

const TRACE_TARGET: &str = "hexvox::voxelize";

/// Splits `size` into at most `threads` slabs along its longest axis (first
/// of X, Y, Z on ties). The last slab takes the remainder.
pub fn partition_slabs(size: IVec3, threads: usize) -> Vec<IntBox> {
    let full = IntBox::from_size(size);
    if full.is_empty() {
        return Vec::new();
    }
    let extent = size.max_element();
    let axis = (0..3).find(|&a| size.axis(a) == extent).unwrap_or(0);
    let count = threads.clamp(1, extent as usize) as i32;
    let step = extent / count;

    (0..count)
        .map(|i| {
            let start = i * step;
            let end = if i + 1 == count { extent } else { start + step };
            IntBox::new(
                full.min.with_axis(axis, start),
                full.max.with_axis(axis, end),
            )
        })
        .collect()
}

/// Per-run counters, summed over all slabs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoxelizeStats {
    pub slabs: usize,
    pub solid: usize,
    pub split: usize,
    pub seams: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoxelizeError {
    EmptyScene,
    Abandoned { completed: usize, expected: usize },
}

impl fmt::Display for VoxelizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoxelizeError::EmptyScene => write!(f, "scene grid has no cells"),
            VoxelizeError::Abandoned {
                completed,
                expected,
            } => write!(
                f,
                "voxelize abandoned after {completed} of {expected} slab(s)"
            ),
        }
    }
}

impl std::error::Error for VoxelizeError {}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    solid: AtomicUsize,
    split: AtomicUsize,
    seams: AtomicUsize,
}

struct VoxelizeJob<F: ?Sized> {
    slab: IntBox,
    grid: SceneGrid,
    field: Arc<F>,
    settings: Arc<HexSettings>,
    counters: Arc<Counters>,
}

/// Field cell for a scene position: rows are scene Y, columns scene X.
#[inline]
fn field_pos(x: i32, y: i32, z: i32) -> IVec3 {
    IVec3::new(y, x, z)
}

impl<F: VoxelField + ?Sized + 'static> VoxelizeJob<F> {
    fn process_cell(&self, x: i32, y: i32, z: i32, value: u8, local: &mut VoxelizeStats) {
        let grid = &self.grid;
        let field = &*self.field;
        let trace = self.settings.debug_layer() == Some(z);
        let pos = field_pos(x, y, z);

        if value == 0 {
            field.init_density(pos, Density::EMPTY);
            if trace {
                log::trace!(
                    target: TRACE_TARGET,
                    "empty {x} {y} {z} value {:?}",
                    field.density(pos)
                );
            }
            return;
        }

        let current = IVec3::new(x, y, z);
        let center = candidate_center(&self.settings, current);
        let (cp, center) = border_clock(&self.settings, grid, center, current);

        let mut density = Density::FULL;
        if cp.splits() {
            let shift_x = if cp.pushes_right() { x + 1 } else { x - 1 };
            if (0..grid.size().x).contains(&shift_x) {
                if grid.get(IVec3::new(shift_x, y, z)) == 0 {
                    let pair = self.settings.values_at(current.y - center.y);
                    density = pair.inside;
                    field.set_density(field_pos(shift_x, y, z), pair.outside);
                    local.split += 1;
                    if trace {
                        log::trace!(
                            target: TRACE_TARGET,
                            "split {shift_x} {y} {z} value {value} outside {:.3} clock {} center {}",
                            pair.outside.value(),
                            cp.0,
                            center
                        );
                    }
                } else if cp.is_equator() {
                    density = Density::EMPTY;
                    local.seams += 1;
                }
            }
        }
        if density == Density::FULL {
            local.solid += 1;
        }

        field.set_density(pos, density);
        field.set_material(pos, value - 1);
        if trace {
            log::trace!(
                target: TRACE_TARGET,
                "cell {x} {y} {z} value {value} density {:.3} clock {} center {}",
                density.value(),
                cp.0,
                center
            );
        }
    }
}

impl<F: VoxelField + ?Sized + 'static> Job for VoxelizeJob<F> {
    fn name(&self) -> &'static str {
        "hex-voxelize"
    }

    fn run(self: Box<Self>) {
        let mut local = VoxelizeStats::default();
        let b = self.slab;
        for z in b.min.z..b.max.z {
            for y in b.min.y..b.max.y {
                for x in b.min.x..b.max.x {
                    let value = self.grid.at_flat(self.grid.flat_index(x, y, z)).unwrap_or(0);
                    self.process_cell(x, y, z, value, &mut local);
                }
            }
        }
        let c = &self.counters;
        c.solid.fetch_add(local.solid, Ordering::Relaxed);
        c.split.fetch_add(local.split, Ordering::Relaxed);
        c.seams.fetch_add(local.seams, Ordering::Relaxed);
        c.completed.fetch_add(1, Ordering::Release);
    }
}

/// Writes the hexagon-shaped density and material for every cell of `grid`
/// into `field`, one pool job per slab, and blocks until they drain.
///
/// `field` is resized to `(size.y, size.x, size.z)` first. Slabs only read
/// the grid; border splits may write into a neighboring slab's cells, which
/// the field's atomic writes and set-if-unset semantics keep race free.
pub fn voxelize<F>(
    pool: &WorkerPool,
    grid: &SceneGrid,
    field: &Arc<F>,
    settings: &Arc<HexSettings>,
) -> Result<VoxelizeStats, VoxelizeError>
where
    F: VoxelField + ?Sized + 'static,
{
    let size = grid.size();
    let slabs = partition_slabs(size, pool.num_threads());
    if slabs.is_empty() {
        return Err(VoxelizeError::EmptyScene);
    }
    let start = Instant::now();
    field.resize(IVec3::new(size.y, size.x, size.z));
    log::debug!(
        "voxelizing {} into {} slab(s), half width {}",
        size,
        slabs.len(),
        settings.half_width()
    );

    let counters = Arc::new(Counters::default());
    let expected = slabs.len();
    let jobs: Vec<Box<dyn Job>> = slabs
        .into_iter()
        .map(|slab| {
            Box::new(VoxelizeJob {
                slab,
                grid: grid.clone(),
                field: Arc::clone(field),
                settings: Arc::clone(settings),
                counters: Arc::clone(&counters),
            }) as Box<dyn Job>
        })
        .collect();
    pool.submit_batch(jobs);
    pool.wait_until_drained();

    let completed = counters.completed.load(Ordering::Acquire);
    if completed != expected {
        return Err(VoxelizeError::Abandoned {
            completed,
            expected,
        });
    }
    let stats = VoxelizeStats {
        slabs: expected,
        solid: counters.solid.load(Ordering::Relaxed),
        split: counters.split.load(Ordering::Relaxed),
        seams: counters.seams.load(Ordering::Relaxed),
    };
    log::debug!("voxelized in {:?}: {:?}", start.elapsed(), stats);
    Ok(stats)
}

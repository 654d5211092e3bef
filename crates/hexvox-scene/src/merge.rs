use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use hexvox_geom::{IVec3, IntBox};
use hexvox_pool::{Job, WorkerPool};

use crate::normalize::{NormalizedInstance, Sample};

/// Merged palette grid of the whole scene, `x` fastest then `y` then `z`.
/// Read-only once built and cheap to clone.
#[derive(Clone, Debug)]
pub struct SceneGrid {
    bounds: IntBox,
    size: IVec3,
    data: Arc<[u8]>,
}

impl SceneGrid {
    /// Wraps an existing buffer; `data.len()` must equal `bounds.count()`.
    pub fn from_parts(bounds: IntBox, data: Vec<u8>) -> Option<Self> {
        (data.len() == bounds.count()).then(|| Self {
            bounds,
            size: bounds.size(),
            data: data.into(),
        })
    }

    pub fn bounds(&self) -> IntBox {
        self.bounds
    }

    pub fn size(&self) -> IVec3 {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Flat index without per-axis checks. Out-of-row coordinates wrap into
    /// neighboring rows, as the hex lattice lookups expect.
    #[inline]
    pub fn flat_index(&self, x: i32, y: i32, z: i32) -> i64 {
        let (sx, sy) = (self.size.x as i64, self.size.y as i64);
        x as i64 + sx * y as i64 + sx * sy * z as i64
    }

    /// Value at a flat index, `None` past either end of the buffer.
    #[inline]
    pub fn at_flat(&self, idx: i64) -> Option<u8> {
        usize::try_from(idx).ok().and_then(|i| self.data.get(i).copied())
    }

    /// Value at a grid position with per-axis bounds; outside reads as `0`.
    #[inline]
    pub fn get(&self, pos: IVec3) -> u8 {
        if !IntBox::from_size(self.size).contains_point(pos) {
            return 0;
        }
        self.at_flat(self.flat_index(pos.x, pos.y, pos.z))
            .unwrap_or(0)
    }

    pub fn occupied_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    NoInstances,
    EmptyBounds(IntBox),
    Abandoned { completed: usize, expected: usize },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::NoInstances => write!(f, "scene has no instances"),
            MergeError::EmptyBounds(b) => write!(f, "scene bounds {b} hold no cells"),
            MergeError::Abandoned {
                completed,
                expected,
            } => write!(
                f,
                "merge abandoned after {completed} of {expected} instance(s)"
            ),
        }
    }
}

impl std::error::Error for MergeError {}

/// Union of every instance box, folded from the first one.
pub fn scene_bounds(instances: &[NormalizedInstance]) -> Option<IntBox> {
    let (first, rest) = instances.split_first()?;
    Some(
        rest.iter()
            .fold(first.bounds, |acc, inst| acc.union(&inst.bounds)),
    )
}

struct MergeJob {
    offset: IVec3,
    scene_size: IVec3,
    samples: Vec<Sample>,
    buffer: Arc<Vec<AtomicU8>>,
    dropped: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl Job for MergeJob {
    fn name(&self) -> &'static str {
        "scene-merge"
    }

    fn run(self: Box<Self>) {
        let s = self.scene_size;
        let scene = IntBox::from_size(s);
        let mut dropped = 0usize;
        for sample in &self.samples {
            let p = self.offset + sample.pos;
            if !scene.contains_point(p) {
                dropped += 1;
                continue;
            }
            let idx = p.x as usize + s.x as usize * (p.y as usize + s.y as usize * p.z as usize);
            self.buffer[idx].store(sample.value, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Release);
    }
}

/// Scatters every instance into one zeroed scene buffer, one pool job per
/// instance, and blocks until the batch drains.
///
/// Overlapping instances race; the last store wins. Samples landing outside
/// the scene box are dropped and reported with a warning.
pub fn merge_scene(
    pool: &WorkerPool,
    instances: Vec<NormalizedInstance>,
) -> Result<SceneGrid, MergeError> {
    let bounds = scene_bounds(&instances).ok_or(MergeError::NoInstances)?;
    if bounds.is_empty() {
        return Err(MergeError::EmptyBounds(bounds));
    }
    let size = bounds.size();
    let expected = instances.len();
    let start = Instant::now();
    if log::log_enabled!(log::Level::Debug) {
        let overlapping: usize = instances
            .iter()
            .enumerate()
            .map(|(i, a)| {
                instances[i + 1..]
                    .iter()
                    .filter(|b| a.bounds.intersects(&b.bounds))
                    .count()
            })
            .sum();
        if overlapping > 0 {
            log::debug!("{overlapping} overlapping instance pair(s), last write wins");
        }
    }

    let buffer: Arc<Vec<AtomicU8>> = Arc::new((0..bounds.count()).map(|_| AtomicU8::new(0)).collect());
    let dropped = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<Box<dyn Job>> = instances
        .into_iter()
        .map(|inst| {
            Box::new(MergeJob {
                offset: inst.bounds.min - bounds.min,
                scene_size: size,
                samples: inst.samples,
                buffer: Arc::clone(&buffer),
                dropped: Arc::clone(&dropped),
                completed: Arc::clone(&completed),
            }) as Box<dyn Job>
        })
        .collect();
    pool.submit_batch(jobs);
    pool.wait_until_drained();

    let completed = completed.load(Ordering::Acquire);
    if completed != expected {
        return Err(MergeError::Abandoned {
            completed,
            expected,
        });
    }
    let dropped = dropped.load(Ordering::Relaxed);
    if dropped > 0 {
        log::warn!("merge dropped {dropped} sample(s) outside scene bounds {bounds}");
    }

    let data: Vec<u8> = match Arc::try_unwrap(buffer) {
        Ok(cells) => cells.into_iter().map(AtomicU8::into_inner).collect(),
        Err(shared) => shared.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
    };
    log::debug!(
        "merged {expected} instance(s) into {bounds} in {:?}",
        start.elapsed()
    );
    Ok(SceneGrid {
        bounds,
        size,
        data: data.into(),
    })
}

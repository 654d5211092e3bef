//! Dense density + material field written by the voxelizer.
#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use hexvox_geom::IVec3;

/// Signed density sample: negative is solid, positive is air, the surface
/// sits at zero.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Density(pub f32);

impl Density {
    pub const FULL: Density = Density(-1.0);
    pub const EMPTY: Density = Density(1.0);

    #[inline]
    pub fn value(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn is_full(self) -> bool {
        self.0 <= -1.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 >= 1.0
    }

    #[inline]
    pub fn is_partial(self) -> bool {
        !self.is_full() && !self.is_empty()
    }
}

/// Output container addressed by `(row, col, layer)`.
///
/// All methods take `&self` so slab jobs can share one field; implementations
/// synchronize internally. Writes outside the current size are ignored and
/// reads outside it return `None`.
pub trait VoxelField: Send + Sync {
    fn size(&self) -> IVec3;

    /// Reallocates to `size`, leaving every density and material unset.
    fn resize(&self, size: IVec3);

    fn set_density(&self, pos: IVec3, value: Density);

    /// `None` when the cell was never written.
    fn density(&self, pos: IVec3) -> Option<Density>;

    /// Writes `value` only if the cell is still unset; returns whether it
    /// wrote. Implementations shared across threads should make the
    /// check-and-set atomic.
    fn init_density(&self, pos: IVec3, value: Density) -> bool {
        if self.density(pos).is_none() {
            self.set_density(pos, value);
            true
        } else {
            false
        }
    }

    fn set_material(&self, pos: IVec3, index: u8);

    fn material(&self, pos: IVec3) -> Option<u8>;
}

const UNSET_DENSITY: u32 = u32::MAX;
const UNSET_MATERIAL: u16 = u16::MAX;

struct Storage {
    size: IVec3,
    density: Vec<AtomicU32>,
    material: Vec<AtomicU16>,
}

impl Storage {
    fn new(size: IVec3) -> Self {
        let count = cell_count(size);
        Self {
            size,
            density: (0..count).map(|_| AtomicU32::new(UNSET_DENSITY)).collect(),
            material: (0..count).map(|_| AtomicU16::new(UNSET_MATERIAL)).collect(),
        }
    }

    #[inline]
    fn idx(&self, pos: IVec3) -> Option<usize> {
        let s = self.size;
        if pos.x < 0 || pos.y < 0 || pos.z < 0 || pos.x >= s.x || pos.y >= s.y || pos.z >= s.z {
            return None;
        }
        let (sx, sy) = (s.x as usize, s.y as usize);
        Some(pos.x as usize + sx * (pos.y as usize + sy * pos.z as usize))
    }
}

fn cell_count(size: IVec3) -> usize {
    if size.x <= 0 || size.y <= 0 || size.z <= 0 {
        return 0;
    }
    size.x as usize * size.y as usize * size.z as usize
}

#[inline]
fn encode(value: Density) -> u32 {
    debug_assert!(!value.0.is_nan(), "NaN density");
    value.0.to_bits()
}

#[inline]
fn decode(bits: u32) -> Option<Density> {
    (bits != UNSET_DENSITY).then(|| Density(f32::from_bits(bits)))
}

/// In-memory [`VoxelField`] backed by atomics; only `resize` takes the write
/// lock.
pub struct DenseField {
    storage: RwLock<Storage>,
}

impl Default for DenseField {
    fn default() -> Self {
        Self::new(IVec3::ZERO)
    }
}

impl DenseField {
    pub fn new(size: IVec3) -> Self {
        Self {
            storage: RwLock::new(Storage::new(size)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Storage> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VoxelField for DenseField {
    fn size(&self) -> IVec3 {
        self.read().size
    }

    fn resize(&self, size: IVec3) {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        *storage = Storage::new(size);
    }

    fn set_density(&self, pos: IVec3, value: Density) {
        let storage = self.read();
        if let Some(i) = storage.idx(pos) {
            storage.density[i].store(encode(value), Ordering::Relaxed);
        }
    }

    fn density(&self, pos: IVec3) -> Option<Density> {
        let storage = self.read();
        let i = storage.idx(pos)?;
        decode(storage.density[i].load(Ordering::Relaxed))
    }

    fn init_density(&self, pos: IVec3, value: Density) -> bool {
        let storage = self.read();
        match storage.idx(pos) {
            Some(i) => storage.density[i]
                .compare_exchange(
                    UNSET_DENSITY,
                    encode(value),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok(),
            None => false,
        }
    }

    fn set_material(&self, pos: IVec3, index: u8) {
        let storage = self.read();
        if let Some(i) = storage.idx(pos) {
            storage.material[i].store(u16::from(index), Ordering::Relaxed);
        }
    }

    fn material(&self, pos: IVec3) -> Option<u8> {
        let storage = self.read();
        let i = storage.idx(pos)?;
        let raw = storage.material[i].load(Ordering::Relaxed);
        (raw != UNSET_MATERIAL).then_some(raw as u8)
    }
}

/// Cell classification counts over a whole field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldStats {
    pub full: usize,
    pub partial: usize,
    pub empty: usize,
    pub unset: usize,
    pub with_material: usize,
}

impl FieldStats {
    pub fn collect<F: VoxelField + ?Sized>(field: &F) -> Self {
        let size = field.size();
        let mut stats = FieldStats::default();
        for z in 0..size.z {
            for y in 0..size.y {
                for x in 0..size.x {
                    let pos = IVec3::new(x, y, z);
                    match field.density(pos) {
                        None => stats.unset += 1,
                        Some(d) if d.is_partial() => stats.partial += 1,
                        Some(d) if d.is_full() => stats.full += 1,
                        Some(_) => stats.empty += 1,
                    }
                    if field.material(pos).is_some() {
                        stats.with_material += 1;
                    }
                }
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.full + self.partial + self.empty + self.unset
    }
}

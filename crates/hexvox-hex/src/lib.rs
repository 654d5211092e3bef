//! Reshapes a merged cubic voxel scene into density values that render as
//! rounded flat-top hexagonal prisms.
#![forbid(unsafe_code)]

pub mod lattice;
mod settings;
mod voxelize;

pub use lattice::{ClockPos, Inbound, LatticeKind};
pub use settings::{DensityPair, HexConfig, HexSettings, SettingsError};
pub use voxelize::{VoxelizeError, VoxelizeStats, partition_slabs, voxelize};

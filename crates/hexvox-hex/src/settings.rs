use std::fmt;

use hexvox_field::Density;
use serde::Deserialize;

pub(crate) const TAN_30: f32 = 0.577_350_26;

#[derive(Clone, Debug, Deserialize)]
pub struct HexConfig {
    #[serde(default = "default_half_width")]
    pub half_width: i32,
    /// `[inside, outside]` per vertical distance from the hex center.
    #[serde(default)]
    pub value_by_height: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    pub debug_layer: Option<i32>,
}

fn default_half_width() -> i32 {
    4
}

impl Default for HexConfig {
    fn default() -> Self {
        Self {
            half_width: default_half_width(),
            value_by_height: None,
            debug_layer: None,
        }
    }
}

/// Densities written on either side of a split border.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityPair {
    pub inside: Density,
    pub outside: Density,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    HalfWidthTooSmall(i32),
    TableTooShort { len: usize, needed: usize },
    NonFinite { index: usize },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::HalfWidthTooSmall(hw) => {
                write!(f, "hexagon half width must be at least 2, got {hw}")
            }
            SettingsError::TableTooShort { len, needed } => write!(
                f,
                "value_by_height has {len} entries, needs at least {needed}"
            ),
            SettingsError::NonFinite { index } => {
                write!(f, "value_by_height entry {index} is not finite")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Validated hexagon geometry plus the border density table. Built once
/// before any voxelize job exists and shared read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct HexSettings {
    half_width: i32,
    half_height: i32,
    values: Vec<DensityPair>,
    debug_layer: Option<i32>,
}

impl Default for HexSettings {
    fn default() -> Self {
        let half_width = default_half_width();
        let half_height = derive_half_height(half_width);
        Self {
            half_width,
            half_height,
            values: default_values(half_width, half_height),
            debug_layer: None,
        }
    }
}

impl HexSettings {
    pub fn new(half_width: i32) -> Result<Self, SettingsError> {
        if half_width < 2 {
            return Err(SettingsError::HalfWidthTooSmall(half_width));
        }
        let half_height = derive_half_height(half_width);
        Ok(Self {
            half_width,
            half_height,
            values: default_values(half_width, half_height),
            debug_layer: None,
        })
    }

    pub fn from_config(cfg: &HexConfig) -> Result<Self, SettingsError> {
        let mut settings = Self::new(cfg.half_width)?;
        if let Some(table) = &cfg.value_by_height {
            let pairs = table
                .iter()
                .map(|&[inside, outside]| DensityPair {
                    inside: Density(inside),
                    outside: Density(outside),
                })
                .collect();
            settings = settings.with_values(pairs)?;
        }
        Ok(settings.with_debug_layer(cfg.debug_layer))
    }

    /// Replaces the density table; it must cover every distance up to
    /// `half_height`.
    pub fn with_values(mut self, values: Vec<DensityPair>) -> Result<Self, SettingsError> {
        let needed = self.half_height as usize + 1;
        if values.len() < needed {
            return Err(SettingsError::TableTooShort {
                len: values.len(),
                needed,
            });
        }
        if let Some(index) = values
            .iter()
            .position(|p| !p.inside.0.is_finite() || !p.outside.0.is_finite())
        {
            return Err(SettingsError::NonFinite { index });
        }
        self.values = values;
        Ok(self)
    }

    pub fn with_debug_layer(mut self, layer: Option<i32>) -> Self {
        self.debug_layer = layer;
        self
    }

    #[inline]
    pub fn half_width(&self) -> i32 {
        self.half_width
    }

    #[inline]
    pub fn half_height(&self) -> i32 {
        self.half_height
    }

    #[inline]
    pub fn quarter_width(&self) -> i32 {
        self.half_width / 2
    }

    /// Horizontal distance between a center and its diagonal neighbor.
    #[inline]
    pub fn column_offset(&self) -> i32 {
        (self.half_width as f32 * 1.5) as i32
    }

    #[inline]
    pub fn row_offset(&self) -> i32 {
        self.half_height
    }

    pub fn debug_layer(&self) -> Option<i32> {
        self.debug_layer
    }

    pub fn values(&self) -> &[DensityPair] {
        &self.values
    }

    /// Pair for vertical distance `dy`; distances past the table reuse its
    /// last entry.
    pub fn values_at(&self, dy: i32) -> DensityPair {
        let i = dy.unsigned_abs() as usize;
        match self.values.get(i).or_else(|| self.values.last()) {
            Some(pair) => *pair,
            None => DensityPair {
                inside: Density::FULL,
                outside: Density::EMPTY,
            },
        }
    }

    /// How far the slanted hex edge has moved in from `half_width` at
    /// vertical distance `dy`, rounded onto the integer grid.
    pub fn x_offset(&self, dy: i32) -> i32 {
        let dy = dy.abs();
        let x_dist = TAN_30 * dy as f32 + 0.5;
        let whole = x_dist.floor();
        let bump = x_dist - whole > 0.5 && dy != self.half_height;
        whole as i32 + i32::from(bump)
    }
}

/// Height of a regular flat-top hexagon with the given half width.
fn derive_half_height(half_width: i32) -> i32 {
    ((half_width as f32 * 3f32.sqrt() * 0.5).round() as i32).max(1)
}

fn default_values(half_width: i32, half_height: i32) -> Vec<DensityPair> {
    let probe = HexSettings {
        half_width,
        half_height,
        values: Vec::new(),
        debug_layer: None,
    };
    (0..=half_height)
        .map(|dy| {
            // share of the border cell the true edge still covers
            let t = (probe.x_offset(dy) as f32 - TAN_30 * dy as f32 + 0.5).clamp(0.0, 1.0);
            DensityPair {
                inside: Density(-t),
                outside: Density(1.0 - t),
            }
        })
        .collect()
}

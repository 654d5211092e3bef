//! Flat-top hexagon tiling approximated by two interleaved rectangular
//! lattices on the XY plane.
//!
//! The primary lattice has centers at `(hw + k * 2col, hh + j * 2row)`; the
//! diagonal lattice is shifted by `(col, row)` (minus a quarter width so its
//! centers line up with the hexagon corners). Clock positions name points on
//! a hexagon's border, 12 at the top, 3 at the right corner, 6 at the bottom
//! and 9 at the left corner. Odd positions and 12/6 touch three hexagons, the
//! slanted edges (2, 4, 8, 10) touch two.

use hexvox_geom::IVec3;
use hexvox_scene::SceneGrid;

use crate::settings::HexSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatticeKind {
    Primary,
    Diagonal,
}

/// Where a sample sits relative to one hexagon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Inbound {
    Outside = 0,
    Border = 1,
    Inside = 2,
    Center = 3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClockPos(pub u8);

impl ClockPos {
    pub const NONE: ClockPos = ClockPos(0);

    /// 0, 6 and 12 never split a cell.
    #[inline]
    pub fn splits(self) -> bool {
        !matches!(self.0, 0 | 6 | 12)
    }

    /// Positions 1 through 6 push toward +X.
    #[inline]
    pub fn pushes_right(self) -> bool {
        self.0 < 6
    }

    /// Left and right corners, shared by three hexagons on one row.
    #[inline]
    pub fn is_equator(self) -> bool {
        matches!(self.0, 3 | 9)
    }
}

/// Nearest lattice center for `v`; `z` is carried through.
pub fn center(settings: &HexSettings, v: IVec3, kind: LatticeKind) -> IVec3 {
    let two_col = settings.half_width() * 3;
    let two_row = settings.row_offset() * 2;
    match kind {
        LatticeKind::Primary => IVec3::new(
            v.x.div_euclid(two_col) * two_col + settings.half_width(),
            v.y.div_euclid(two_row) * two_row + settings.half_height(),
            v.z,
        ),
        LatticeKind::Diagonal => IVec3::new(
            (v.x + settings.column_offset()).div_euclid(two_col) * two_col
                - settings.quarter_width(),
            (v.y + settings.row_offset()).div_euclid(two_row) * two_row,
            v.z,
        ),
    }
}

/// Classifies `v` against the hexagon centered at `c`, ignoring `z`.
pub fn classify(settings: &HexSettings, c: IVec3, v: IVec3) -> Inbound {
    let (dx, dy) = ((v.x - c.x).abs(), (v.y - c.y).abs());
    if dx == 0 && dy == 0 {
        return Inbound::Center;
    }
    let limit = settings.half_width() - settings.x_offset(dy);
    if dx <= limit && dy <= settings.half_height() {
        if dx == limit || dy == settings.half_height() {
            Inbound::Border
        } else {
            Inbound::Inside
        }
    } else {
        Inbound::Outside
    }
}

/// Clock position of a border sample as seen from `c`, without looking at
/// occupancy. Non-border samples map to [`ClockPos::NONE`].
pub fn raw_clock(settings: &HexSettings, c: IVec3, v: IVec3) -> ClockPos {
    if classify(settings, c, v) != Inbound::Border {
        return ClockPos::NONE;
    }
    let (dx, dy) = (v.x - c.x, v.y - c.y);
    let left = dx < 0;
    let corner = dx.abs() == settings.half_width() && dy == 0;
    let pick = |l: u8, r: u8| ClockPos(if left { l } else { r });
    if dy >= 0 {
        if dy == settings.half_height() {
            if dx.abs() == settings.quarter_width() {
                pick(11, 1)
            } else {
                ClockPos(12)
            }
        } else if corner {
            pick(9, 3)
        } else {
            pick(10, 2)
        }
    } else if dy == -settings.half_height() {
        if dx.abs() == settings.quarter_width() {
            pick(7, 5)
        } else {
            ClockPos(6)
        }
    } else if corner {
        pick(9, 3)
    } else {
        pick(8, 4)
    }
}

fn occupied(grid: &SceneGrid, p: IVec3) -> bool {
    grid.at_flat(grid.flat_index(p.x, p.y, p.z))
        .is_some_and(|v| v != 0)
}

/// Resolves which hexagon owns a border sample.
///
/// If the hexagon at `c` is occupied the raw clock position is kept. Slanted
/// edges are kept regardless. Otherwise the neighbors sharing that border
/// point are probed in order (top, top-right, bottom-right, bottom,
/// bottom-left, top-left); the first occupied one becomes the new center and
/// the position is re-expressed from its side. Returns [`ClockPos::NONE`] when
/// nothing owns the point. Occupancy uses flat buffer indices, so probes past
/// a row end read the wrapped cell.
pub fn border_clock(
    settings: &HexSettings,
    grid: &SceneGrid,
    c: IVec3,
    v: IVec3,
) -> (ClockPos, IVec3) {
    let cp = raw_clock(settings, c, v);
    if cp == ClockPos::NONE || occupied(grid, c) {
        return (cp, c);
    }
    if matches!(cp.0, 2 | 4 | 8 | 10) {
        return (cp, c);
    }

    let col = settings.column_offset();
    let row = settings.row_offset();
    let n = cp.0;
    // (applies, neighbor offset, remap)
    let probes: [(bool, (i32, i32), fn(u8) -> u8); 6] = [
        (matches!(n, 11 | 12 | 1), (0, 2 * row), |n| match n {
            1 => 5,
            11 => 7,
            _ => 6,
        }),
        ((1..=3).contains(&n), (col, row), |n| match n {
            1 => 9,
            3 => 7,
            _ => 8,
        }),
        ((3..=5).contains(&n), (col, -row), |n| match n {
            3 => 11,
            5 => 9,
            _ => 10,
        }),
        (matches!(n, 5..=7), (0, -2 * row), |n| match n {
            5 => 1,
            7 => 11,
            _ => 12,
        }),
        ((7..=9).contains(&n), (-col, -row), |n| match n {
            7 => 3,
            9 => 1,
            _ => 2,
        }),
        ((9..=11).contains(&n), (-col, row), |n| match n {
            9 => 5,
            11 => 3,
            _ => 4,
        }),
    ];

    for (applies, (ox, oy), remap) in probes {
        if !applies {
            continue;
        }
        let neighbor = IVec3::new(c.x + ox, c.y + oy, c.z);
        if occupied(grid, neighbor) {
            return (ClockPos(remap(n)), neighbor);
        }
    }
    (ClockPos::NONE, c)
}

/// Center choice used by the voxelizer: the primary center when the sample
/// lies on its border, the diagonal center otherwise.
pub fn candidate_center(settings: &HexSettings, v: IVec3) -> IVec3 {
    let primary = center(settings, v, LatticeKind::Primary);
    if classify(settings, primary, v) == Inbound::Border {
        primary
    } else {
        center(settings, v, LatticeKind::Diagonal)
    }
}

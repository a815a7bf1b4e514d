use std::fmt;
use std::str::FromStr;

use glam::Vec2;

use crate::error::CollisionError;
use crate::geom::{Cardinal, Line, TILESIZE};
use crate::quad::{ColliderQuad, ColliderSurface, QuadSurface};
use crate::types::QuadId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileShapeKind {
    #[default]
    Empty,
    Solid,
    Half,
    HalfVert,
    Slope,
    Shallow1,
    Shallow2,
    Steep1,
    Steep2,
    Oneway,
    OnewayVert,
    LevelBoundary,
    LevelBoundaryWall,
}

impl TileShapeKind {
    const LABELS: [(&'static str, TileShapeKind); 11] = [
        ("empty", TileShapeKind::Empty),
        ("solid", TileShapeKind::Solid),
        ("half", TileShapeKind::Half),
        ("halfvert", TileShapeKind::HalfVert),
        ("slope", TileShapeKind::Slope),
        ("shallow1", TileShapeKind::Shallow1),
        ("shallow2", TileShapeKind::Shallow2),
        ("steep1", TileShapeKind::Steep1),
        ("steep2", TileShapeKind::Steep2),
        ("oneway", TileShapeKind::Oneway),
        ("onewayvert", TileShapeKind::OnewayVert),
    ];

    pub fn label(self) -> &'static str {
        match self {
            TileShapeKind::LevelBoundary => "levelboundary",
            TileShapeKind::LevelBoundaryWall => "levelboundarywall",
            _ => Self::LABELS
                .iter()
                .find(|(_, k)| *k == self)
                .map(|(s, _)| *s)
                .unwrap_or("empty"),
        }
    }

    fn h_symmetric(self) -> bool {
        matches!(
            self,
            TileShapeKind::Empty | TileShapeKind::Solid | TileShapeKind::Half | TileShapeKind::Oneway
        )
    }

    fn v_symmetric(self) -> bool {
        matches!(
            self,
            TileShapeKind::Empty
                | TileShapeKind::Solid
                | TileShapeKind::HalfVert
                | TileShapeKind::OnewayVert
        )
    }

    /// Corner points (fractions of a tile) and the bitmask of present surfaces.
    fn prototype(self) -> ([Vec2; 4], u8) {
        const ALL: u8 = 0b1111;
        let n = Cardinal::N.bit();
        let e = Cardinal::E.bit();
        let s = Cardinal::S.bit();
        let w = Cardinal::W.bit();
        let solid = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        match self {
            TileShapeKind::Solid => (solid, ALL),
            TileShapeKind::Half => (
                [Vec2::new(0.0, 0.5), Vec2::new(1.0, 0.5), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
                ALL,
            ),
            TileShapeKind::HalfVert => (
                [Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.0), Vec2::new(0.5, 1.0), Vec2::new(0.0, 1.0)],
                ALL,
            ),
            TileShapeKind::Oneway => (solid, n),
            TileShapeKind::OnewayVert => (solid, e),
            TileShapeKind::Slope => (
                [Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
                n | e | s,
            ),
            TileShapeKind::Shallow1 => (
                [Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.5), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
                n | e | s,
            ),
            TileShapeKind::Shallow2 => (
                [Vec2::new(0.0, 0.5), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
                ALL,
            ),
            TileShapeKind::Steep1 => (
                [Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)],
                ALL,
            ),
            TileShapeKind::Steep2 => (
                [Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.5, 1.0)],
                e | s | w,
            ),
            TileShapeKind::LevelBoundary => (solid, n),
            TileShapeKind::LevelBoundaryWall => (solid, e),
            TileShapeKind::Empty => (solid, 0),
        }
    }
}

/// Descriptive tile shape: prototype kind plus mirroring.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileShape {
    pub kind: TileShapeKind,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl TileShape {
    pub const EMPTY: TileShape = TileShape { kind: TileShapeKind::Empty, flip_h: false, flip_v: false };
    pub const SOLID: TileShape = TileShape { kind: TileShapeKind::Solid, flip_h: false, flip_v: false };

    /// Flips on an axis the kind is symmetric on are dropped.
    pub fn new(kind: TileShapeKind, flip_h: bool, flip_v: bool) -> Self {
        Self {
            kind,
            flip_h: flip_h && !kind.h_symmetric(),
            flip_v: flip_v && !kind.v_symmetric(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == TileShapeKind::Empty
    }

    /// Builds the collision quad for this shape placed at tile `position`.
    pub fn to_quad(&self, position: (i32, i32), id: QuadId) -> ColliderQuad {
        let (points, bits) = self.kind.prototype();
        let offset = Vec2::new(position.0 as f32, position.1 as f32) * TILESIZE;

        let mut quad = ColliderQuad::default();
        for dir in Cardinal::ALL {
            let i = dir.index();
            let mut line = Line::new(points[i] * TILESIZE, points[(i + 1) % 4] * TILESIZE);

            if self.flip_h {
                line.p1.x = TILESIZE - line.p1.x;
                line.p2.x = TILESIZE - line.p2.x;
            }
            if self.flip_v {
                line.p1.y = TILESIZE - line.p1.y;
                line.p2.y = TILESIZE - line.p2.y;
            }
            // keep surfaces clockwise
            if self.flip_h != self.flip_v {
                line = line.reversed();
            }

            quad.surfaces[i] = QuadSurface {
                has_surface: bits & dir.bit() != 0,
                collider: ColliderSurface::new(line.shift(offset)),
            };
        }

        if self.flip_h {
            swap_facing(&mut quad, Cardinal::E);
        }
        if self.flip_v {
            swap_facing(&mut quad, Cardinal::N);
        }

        let vertical_dir = if self.flip_v { Cardinal::S } else { Cardinal::N };
        let horizontal_dir = if self.flip_h { Cardinal::W } else { Cardinal::E };
        match self.kind {
            TileShapeKind::Oneway => {
                quad.has_one_way = true;
                quad.one_way_dir = vertical_dir;
            }
            TileShapeKind::OnewayVert => {
                quad.has_one_way = true;
                quad.one_way_dir = horizontal_dir;
            }
            TileShapeKind::LevelBoundary => {
                quad.has_boundary = true;
                quad.one_way_dir = vertical_dir;
            }
            TileShapeKind::LevelBoundaryWall => {
                quad.has_boundary = true;
                quad.one_way_dir = horizontal_dir;
            }
            _ => {}
        }
        quad.id = id;
        quad
    }
}

fn swap_facing(quad: &mut ColliderQuad, dir: Cardinal) {
    let (a, b) = (dir.index(), dir.opposite().index());
    let (lhs, rhs) = (quad.surfaces[a], quad.surfaces[b]);
    match (lhs.has_surface, rhs.has_surface) {
        (true, true) => {
            quad.surfaces[a].collider = rhs.collider;
            quad.surfaces[b].collider = lhs.collider;
        }
        (true, false) => {
            quad.surfaces[b] = lhs;
            quad.surfaces[a].has_surface = false;
        }
        (false, true) => {
            quad.surfaces[a] = rhs;
            quad.surfaces[b].has_surface = false;
        }
        (false, false) => {}
    }
}

impl FromStr for TileShape {
    type Err = CollisionError;

    /// Parses `"<kind>[-<flags>]"`, e.g. `"slope-hv"` or `"halfvert-h"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, flags) = match s.split_once('-') {
            Some((name, flags)) => (name, flags),
            None => (s, ""),
        };
        let name = name.trim().to_ascii_lowercase();
        let kind = TileShapeKind::LABELS
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, k)| *k)
            .ok_or_else(|| CollisionError::UnknownTileShape(s.to_string()))?;

        let flags = flags.to_ascii_lowercase();
        Ok(TileShape::new(kind, flags.contains('h'), flags.contains('v')))
    }
}

impl fmt::Display for TileShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.label())?;
        if self.flip_h || self.flip_v {
            write!(f, "-")?;
            if self.flip_h {
                write!(f, "h")?;
            }
            if self.flip_v {
                write!(f, "v")?;
            }
        }
        Ok(())
    }
}

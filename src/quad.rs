use glam::Vec2;

use crate::geom::{Cardinal, Line, Rect};
use crate::types::QuadId;

/// One directed collision surface plus the neighbouring ("ghost") endpoints
/// it continues into. `ghostp0` precedes `surface.p1`, `ghostp3` follows `surface.p2`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColliderSurface {
    pub surface: Line,
    pub ghostp0: Vec2,
    pub ghostp3: Vec2,
    /// Ghost endpoint is synthesized, not backed by a real neighbouring surface.
    pub g0virtual: bool,
    pub g3virtual: bool,
}

impl Default for ColliderSurface {
    fn default() -> Self {
        Self {
            surface: Line::default(),
            ghostp0: Vec2::ZERO,
            ghostp3: Vec2::ZERO,
            g0virtual: true,
            g3virtual: true,
        }
    }
}

impl ColliderSurface {
    /// Surface with virtual ghosts continuing straight along the line.
    pub fn new(surface: Line) -> Self {
        let v = surface.vector();
        Self {
            surface,
            ghostp0: surface.p1 - v,
            ghostp3: surface.p2 + v,
            g0virtual: true,
            g3virtual: true,
        }
    }

    #[inline]
    pub fn ghost_prev(&self) -> Line {
        Line::new(self.ghostp0, self.surface.p1)
    }

    #[inline]
    pub fn ghost_next(&self) -> Line {
        Line::new(self.surface.p2, self.ghostp3)
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.surface = self.surface.shift(offset);
        self.ghostp0 += offset;
        self.ghostp3 += offset;
    }
}

/// Conveyor-style surface property.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SurfaceMaterial {
    /// Tangential speed along the surface.
    pub velocity: f32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TileMaterial {
    pub surfaces: [SurfaceMaterial; 4],
}

impl TileMaterial {
    pub fn uniform(velocity: f32) -> Self {
        Self { surfaces: [SurfaceMaterial { velocity }; 4] }
    }

    /// Material of `side` once the tile is rotated to `facing`.
    pub fn get_surface(&self, side: Cardinal, facing: Cardinal) -> SurfaceMaterial {
        let ndx = (side.index() as i32 - facing.index() as i32).rem_euclid(4) as usize;
        self.surfaces[ndx]
    }
}

/// A quad slot: the line is kept even when `has_surface` is false, since the
/// tile's bounding area is derived from all four.
#[derive(Copy, Clone, Debug, Default)]
pub struct QuadSurface {
    pub has_surface: bool,
    pub collider: ColliderSurface,
}

impl PartialEq for QuadSurface {
    fn eq(&self, other: &Self) -> bool {
        self.has_surface == other.has_surface && self.collider.surface == other.collider.surface
    }
}

/// Up to four surfaces describing one tile cell.
#[derive(Copy, Clone, Debug, Default)]
pub struct ColliderQuad {
    pub surfaces: [QuadSurface; 4],
    pub has_one_way: bool,
    pub has_boundary: bool,
    pub one_way_dir: Cardinal,
    pub material: Option<TileMaterial>,
    pub mat_facing: Cardinal,
    pub id: QuadId,
}

impl PartialEq for ColliderQuad {
    fn eq(&self, other: &Self) -> bool {
        self.surfaces == other.surfaces
    }
}

impl ColliderQuad {
    /// Closed rectangle with all four surfaces ghosted into each other.
    pub fn from_rect(shape: Rect) -> Self {
        let points = [shape.topleft(), shape.topright(), shape.botright(), shape.botleft()];
        let mut quad = ColliderQuad::default();
        for i in 0..4 {
            quad.surfaces[i] = QuadSurface {
                has_surface: true,
                collider: ColliderSurface {
                    surface: Line::new(points[i], points[(i + 1) % 4]),
                    ghostp0: points[(i + 3) % 4],
                    ghostp3: points[(i + 2) % 4],
                    g0virtual: false,
                    g3virtual: false,
                },
            };
        }
        quad
    }

    #[inline]
    pub fn surface(&self, side: Cardinal) -> Option<&ColliderSurface> {
        let s = &self.surfaces[side.index()];
        s.has_surface.then_some(&s.collider)
    }

    #[inline]
    pub fn surface_mut(&mut self, side: Cardinal) -> Option<&mut ColliderSurface> {
        let s = &mut self.surfaces[side.index()];
        if s.has_surface { Some(&mut s.collider) } else { None }
    }

    pub fn set_surface(&mut self, side: Cardinal, surface: ColliderSurface) {
        self.surfaces[side.index()] = QuadSurface { has_surface: true, collider: surface };
    }

    pub fn remove_surface(&mut self, side: Cardinal) {
        self.surfaces[side.index()].has_surface = false;
    }

    pub fn clear_surfaces(&mut self) {
        for s in &mut self.surfaces {
            s.has_surface = false;
        }
    }

    #[inline]
    pub fn has_any_surface(&self) -> bool {
        self.surfaces.iter().any(|s| s.has_surface)
    }

    #[inline]
    pub fn is_one_way(&self, dir: Cardinal) -> bool {
        self.has_one_way && self.one_way_dir == dir
    }

    #[inline]
    pub fn is_boundary(&self, dir: Cardinal) -> bool {
        self.has_boundary && self.one_way_dir == dir
    }

    pub fn translate(&mut self, offset: Vec2) {
        for s in &mut self.surfaces {
            s.collider.translate(offset);
        }
    }

    pub fn translated(&self, offset: Vec2) -> ColliderQuad {
        let mut q = *self;
        q.translate(offset);
        q
    }

    /// Bounding rect of every surface point, present or not.
    pub fn bounds(&self) -> Rect {
        let mut min = Vec2::splat(f32::MAX);
        let mut max = Vec2::splat(f32::MIN);
        for s in &self.surfaces {
            let l = s.collider.surface;
            min = min.min(l.p1).min(l.p2);
            max = max.max(l.p1).max(l.p2);
        }
        Rect::from_min_max(min, max)
    }

    /// Material of one side, honouring the quad's facing.
    pub fn surface_material(&self, side: Cardinal) -> Option<SurfaceMaterial> {
        self.material.map(|m| m.get_surface(side, self.mat_facing))
    }
}

use glam::Vec2;

use crate::geom::{Cardinal, Line, Rect, lefthand};
use crate::quad::ColliderQuad;
use crate::types::{QuadId, RegionId};

/// Closest surface struck by a cardinal raycast.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RaycastHit {
    /// Distance along the ray from its origin; negative inside the backoff.
    pub distance: f32,
    pub origin: Vec2,
    pub impact: Vec2,
    /// World-space surface that was hit.
    pub surface: Line,
    pub quad: QuadId,
    pub region: Option<RegionId>,
}

/// Keeps the nearer of two optional hits; ties go to `rhs`.
pub fn compare_hits(lhs: Option<RaycastHit>, rhs: Option<RaycastHit>) -> Option<RaycastHit> {
    match (lhs, rhs) {
        (None, r) => r,
        (l, None) => l,
        (Some(l), Some(r)) => Some(if l.distance < r.distance { l } else { r }),
    }
}

/// Slab test of the segment `line` against `rect`. Returns the entry fraction
/// in `[0, 1]` and the entry normal (zero when `p1` starts inside).
pub fn segment_rect(line: Line, rect: Rect) -> Option<(f32, Vec2)> {
    let d = line.vector();
    let (min, max) = (rect.topleft(), rect.botright());
    let mut tmin = 0.0_f32;
    let mut tmax = 1.0_f32;
    let mut n_enter = Vec2::ZERO;

    for axis in 0..2 {
        let (o, dir, lo, hi) = (line.p1[axis], d[axis], min[axis], max[axis]);
        if dir.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir;
        let mut t1 = (lo - o) * inv;
        let mut t2 = (hi - o) * inv;
        let mut n = -1.0;
        if t1 > t2 {
            core::mem::swap(&mut t1, &mut t2);
            n = 1.0;
        }
        if t1 > tmin {
            tmin = t1;
            n_enter = if axis == 0 { Vec2::new(n, 0.0) } else { Vec2::new(0.0, n) };
        }
        tmax = tmax.min(t2);
        if tmin > tmax {
            return None;
        }
    }
    Some((tmin, n_enter))
}

/// Casts an axis-aligned `line` (world space) against the surfaces of a quad
/// positioned at `offset`. Surfaces facing away from the ray are ignored.
pub fn raycast_quad(quad: &ColliderQuad, offset: Vec2, line: Line, backoff: f32) -> Option<RaycastHit> {
    let ray = line.vector();
    let dir = Cardinal::from_vec(ray)?;
    let mut result: Option<RaycastHit> = None;

    for s in quad.surfaces.iter().filter(|s| s.has_surface) {
        let local = s.collider.surface;
        if lefthand(local.vector()).dot(ray) > 0.0 {
            continue;
        }
        let surface = local.shift(offset);

        let between = if line.is_vertical() {
            line.p1.x >= surface.p1.x.min(surface.p2.x) && line.p1.x <= surface.p1.x.max(surface.p2.x)
        } else {
            line.p1.y >= surface.p1.y.min(surface.p2.y) && line.p1.y <= surface.p1.y.max(surface.p2.y)
        };
        if !between {
            continue;
        }

        let Some(impact) = line.intersection(&surface) else {
            continue;
        };
        if (impact - (line.p1 - ray)).dot(ray) < 0.0 {
            continue;
        }

        let distance = match dir {
            Cardinal::N => line.p1.y - impact.y,
            Cardinal::S => impact.y - line.p1.y,
            Cardinal::E => impact.x - line.p1.x,
            Cardinal::W => line.p1.x - impact.x,
        };

        if distance >= -backoff.abs() && result.is_none_or(|r| distance < r.distance) {
            result = Some(RaycastHit {
                distance,
                origin: line.p1,
                impact,
                surface,
                quad: quad.id,
                region: None,
            });
        }
    }
    result
}

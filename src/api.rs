use std::any::Any;

use glam::Vec2;

use crate::collidable::Collidable;
use crate::error::CollisionError;
use crate::geom::{Cardinal, Line, Rect, projection, righthand};
use crate::narrowphase::{RaycastHit, compare_hits, raycast_quad};
use crate::quad::ColliderQuad;
use crate::types::*;

/// A body of static (or kinematically moving) tile geometry.
///
/// Quads are stored in region-local space; `position` maps them into the world.
pub trait ColliderRegion: Any {
    /// Per-tick maintenance, e.g. applying queued tile edits.
    fn update(&mut self, dt: f32);

    /// Downcast helper.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast helper.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn get_quad(&self, id: QuadId) -> Option<&ColliderQuad>;

    /// Candidate quads overlapping the world-space `area`, with their
    /// world-space tile bounds, in a stable order.
    fn quads_in_rect(&self, area: Rect) -> Vec<(QuadId, Rect)>;

    fn position(&self) -> Vec2;
    fn prev_position(&self) -> Vec2;
    fn velocity(&self) -> Vec2;

    /// World-space bounds swept over the last move.
    fn bounding_box(&self) -> Rect;

    fn delta_position(&self) -> Vec2 {
        self.position() - self.prev_position()
    }

    /// Veto hook consulted before a contact reaches the solver.
    fn on_precontact(&self, _quad: QuadId, _contact: &Contact, _duration: f32) -> bool {
        true
    }

    /// Notified for every contact the solver applied against this region.
    fn on_postcontact(&self, _quad: QuadId, _contact: &AppliedContact) {}

    /// Closest surface hit along an axis-aligned world-space `line`.
    fn raycast(&self, line: Line, backoff: f32) -> Option<RaycastHit> {
        let area = Rect::from_min_max(line.p1.min(line.p2), line.p1.max(line.p2));
        let offset = self.position();
        self.quads_in_rect(area)
            .into_iter()
            .filter_map(|(id, _)| self.get_quad(id))
            .fold(None, |best, quad| compare_hits(best, raycast_quad(quad, offset, line, backoff)))
    }
}

/// Post-contact velocity rule.
pub trait CollisionResponse {
    fn respond(&self, vel: Vec2, contact: &Contact) -> Vec2;
}

/// Keeps the surface's normal velocity and the body's tangential velocity.
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardResponse;

impl CollisionResponse for StandardResponse {
    fn respond(&self, vel: Vec2, contact: &Contact) -> Vec2 {
        projection(contact.velocity, contact.collider_n) + projection(vel, righthand(contact.collider_n))
    }
}

/// Like [`StandardResponse`] but against the axis-aligned normal, so slopes
/// do not redirect the body.
#[derive(Copy, Clone, Debug, Default)]
pub struct FlattenResponse;

impl CollisionResponse for FlattenResponse {
    fn respond(&self, vel: Vec2, contact: &Contact) -> Vec2 {
        projection(contact.velocity, contact.ortho_n) + projection(vel, righthand(contact.ortho_n))
    }
}

/// Public API contract for the collision world.
pub trait CollisionWorldApi {
    /// Construct a new world with the given configuration.
    fn new(cfg: WorldConfig) -> Result<Self, CollisionError>
    where
        Self: Sized;

    // --- Regions -----------------------------------------------------------

    fn add_region(&mut self, region: Box<dyn ColliderRegion>) -> RegionId;

    fn remove_region(&mut self, id: RegionId) -> Result<Box<dyn ColliderRegion>, CollisionError>;

    fn region(&self, id: RegionId) -> Option<&dyn ColliderRegion>;

    // --- Bodies ------------------------------------------------------------

    fn add_collidable(&mut self, body: Collidable) -> CollidableId;

    fn remove_collidable(&mut self, id: CollidableId) -> Result<Collidable, CollisionError>;

    fn collidable(&self, id: CollidableId) -> Option<&Collidable>;

    fn collidable_mut(&mut self, id: CollidableId) -> Option<&mut Collidable>;

    // --- Simulation --------------------------------------------------------

    /// Advance every region and body by `dt` and resolve their collisions.
    fn update(&mut self, dt: f32);

    /// Advance by the configured fixed step.
    fn step(&mut self);

    /// Last solver output for a body.
    fn frame(&self, id: CollidableId) -> Option<&CollisionFrame>;

    // --- Queries -----------------------------------------------------------

    /// Closest surface hit from `origin` toward `dir` across all regions.
    fn raycast(&self, origin: Vec2, dir: Cardinal, dist: f32) -> Option<RaycastHit>;
}

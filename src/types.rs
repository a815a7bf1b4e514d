use std::cmp::Ordering;

use glam::Vec2;

use crate::error::CollisionError;
use crate::geom::{is_vertical_vec, righthand};
use crate::quad::{ColliderSurface, SurfaceMaterial};

/// Cell index of a quad inside its region.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuadId(pub u32);

impl QuadId {
    /// Sentinel used by synthetic axes that are not backed by a quad.
    pub const NONE: QuadId = QuadId(u32::MAX);
}

/// Generation-checked handle into the world's region arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId {
    pub index: u32,
    pub generation: u32,
}

/// Generation-checked handle into the world's collidable arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollidableId {
    pub index: u32,
    pub generation: u32,
}

/// Identity of the (body, region, quad) triple a contact came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId {
    pub collidable: CollidableId,
    pub region: RegionId,
    pub quad: QuadId,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContactType {
    #[default]
    NoSolution,
    /// Resolved from a single arbiter.
    Single,
    /// Lateral ejection out of two non-parallel surfaces.
    Wedge,
    CrushHorizontal,
    CrushVertical,
}

impl ContactType {
    pub fn is_crush(self) -> bool {
        matches!(self, ContactType::CrushHorizontal | ContactType::CrushVertical)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contact {
    /// Distance along `ortho_n` needed to separate. Positive means overlapping.
    pub separation: f32,
    pub has_contact: bool,
    pub position: Vec2,
    /// Axis-aligned resolution direction.
    pub ortho_n: Vec2,
    /// True surface normal, diagonal on slopes.
    pub collider_n: Vec2,
    pub collider: ColliderSurface,
    pub has_valley: bool,
    /// World-space velocity of the surface in contact.
    pub velocity: Vec2,
    pub material: Option<SurfaceMaterial>,
    /// Fraction of the tick at which the body started touching, `-1` if none.
    pub impact_time: f32,
    pub has_impact_time: bool,
    pub is_slip: bool,
    pub is_transposed: bool,
    /// False when the quad backing this contact could not be found.
    pub quad_valid: bool,
    pub touch_duration: f32,
    /// Age of the arbiter that produced the contact.
    pub alive_duration: f32,
    pub id: Option<ContactId>,
    /// How the solver applies this contact. Only synthesized wedges set it.
    pub kind: ContactType,
}

impl Default for Contact {
    fn default() -> Self {
        Self {
            separation: 0.0,
            has_contact: false,
            position: Vec2::ZERO,
            ortho_n: Vec2::ZERO,
            collider_n: Vec2::ZERO,
            collider: ColliderSurface::default(),
            has_valley: false,
            velocity: Vec2::ZERO,
            material: None,
            impact_time: -1.0,
            has_impact_time: false,
            is_slip: false,
            is_transposed: false,
            quad_valid: true,
            touch_duration: 0.0,
            alive_duration: 0.0,
            id: None,
            kind: ContactType::NoSolution,
        }
    }
}

impl Contact {
    #[inline]
    pub fn is_resolvable(&self) -> bool {
        self.ortho_n != Vec2::ZERO
    }

    /// A floor/ceiling contact on a surface steep enough to act as a wall.
    pub fn is_transposable(&self) -> bool {
        !self.is_transposed
            && is_vertical_vec(self.ortho_n)
            && self.collider_n.x.abs() > self.collider_n.y.abs()
            && self.has_impact_time
            && !self.has_valley
    }

    /// Separation this contact would have along its horizontal alternative.
    pub fn transposed_separation(&self) -> f32 {
        (self.collider_n.y * self.separation / self.collider_n.x).abs()
    }

    /// Re-expresses the contact along the horizontal axis.
    pub fn transpose(&mut self) {
        if self.is_transposed {
            return;
        }
        self.separation = self.transposed_separation();
        self.ortho_n = if self.collider_n.x < 0.0 { Vec2::new(-1.0, 0.0) } else { Vec2::new(1.0, 0.0) };
        self.is_transposed = true;
    }

    pub fn surface_velocity(&self) -> Vec2 {
        self.material
            .map(|m| righthand(self.collider_n) * m.velocity)
            .unwrap_or(Vec2::ZERO)
    }
}

/// Priority ordering of candidate contacts. `Less` means `lhs` should be
/// resolved first.
pub fn compare_contact(lhs: &Contact, rhs: &Contact) -> Ordering {
    if lhs.has_contact != rhs.has_contact {
        return if lhs.has_contact { Ordering::Less } else { Ordering::Greater };
    }
    if lhs.has_impact_time != rhs.has_impact_time {
        return if lhs.has_impact_time { Ordering::Less } else { Ordering::Greater };
    }
    if lhs.has_impact_time && rhs.has_impact_time && lhs.impact_time != rhs.impact_time {
        return lhs.impact_time.total_cmp(&rhs.impact_time);
    }
    if lhs.separation != rhs.separation {
        return lhs.separation.total_cmp(&rhs.separation);
    }
    let (lv, rv) = (lhs.velocity.length_squared(), rhs.velocity.length_squared());
    if lv != rv {
        return lv.total_cmp(&rv);
    }
    // older arbiter first
    rhs.alive_duration.total_cmp(&lhs.alive_duration)
}

/// One contact the solver pushed onto a body.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AppliedContact {
    pub contact: Contact,
    pub kind: ContactType,
    pub region: Option<RegionId>,
    pub quad: Option<QuadId>,
    /// Body velocity right before this contact was applied.
    pub precontact_velocity: Vec2,
}

/// Solver output for one body and one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionFrame {
    pub contacts: Vec<AppliedContact>,
    /// Applied contacts per ortho direction, indexed by `Cardinal::index`.
    pub applied_count: [usize; 4],
    /// Wedges whose surfaces never intersect and were left unresolved.
    pub unresolved_wedges: usize,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SlipState {
    #[default]
    None,
    SlipHorizontal,
    SlipVertical,
}

/// Slip policy of a body: which axis may slip and by how much.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Slip {
    pub state: SlipState,
    pub leeway: f32,
}

impl Slip {
    pub fn vertical_leeway(&self) -> f32 {
        if self.state == SlipState::SlipVertical { self.leeway } else { 0.0 }
    }

    pub fn horizontal_leeway(&self) -> f32 {
        if self.state == SlipState::SlipHorizontal { self.leeway } else { 0.0 }
    }
}

/// Cached touch flags recomputed from the applied contacts each frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CollisionState(pub u8);

impl CollisionState {
    pub const FLOOR: CollisionState = CollisionState(1 << 0);
    pub const WALL_L: CollisionState = CollisionState(1 << 1);
    pub const CEILING: CollisionState = CollisionState(1 << 2);
    pub const WALL_R: CollisionState = CollisionState(1 << 3);
    pub const CRUSH_H: CollisionState = CollisionState(1 << 4);
    pub const CRUSH_V: CollisionState = CollisionState(1 << 5);
    pub const WEDGE: CollisionState = CollisionState(1 << 6);

    #[inline]
    pub fn contains(self, other: CollisionState) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: CollisionState) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// World-level configuration.
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// Fixed step used by `CollisionWorldApi::step`.
    pub dt: f32,
    /// Cap on the broad phase push-bound fixed point.
    pub max_bound_iterations: usize,
    /// Rays longer than this are clamped.
    pub ray_max_dist: f32,
    /// Hits up to this far behind the ray origin are accepted.
    pub ray_backoff: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            max_bound_iterations: 16,
            ray_max_dist: 10_000.0,
            ray_backoff: 0.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), CollisionError> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(CollisionError::InvalidConfig("dt must be positive"));
        }
        if self.max_bound_iterations == 0 {
            return Err(CollisionError::InvalidConfig("max_bound_iterations must be non-zero"));
        }
        if !(self.ray_max_dist > 0.0) {
            return Err(CollisionError::InvalidConfig("ray_max_dist must be positive"));
        }
        if self.ray_backoff < 0.0 {
            return Err(CollisionError::InvalidConfig("ray_backoff must not be negative"));
        }
        Ok(())
    }
}

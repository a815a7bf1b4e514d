use glam::Vec2;
use tracing::warn;

use crate::api::{CollisionResponse, FlattenResponse, StandardResponse};
use crate::error::CollisionError;
use crate::geom::{Cardinal, Rect, TILESIZE};
use crate::types::{AppliedContact, CollisionFrame, CollisionState, Contact, ContactType, Slip, SlipState};

/// Built-in velocity responses selectable per body.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ResponseKind {
    #[default]
    Standard,
    Flatten,
}

impl CollisionResponse for ResponseKind {
    fn respond(&self, vel: Vec2, contact: &Contact) -> Vec2 {
        match self {
            ResponseKind::Standard => StandardResponse.respond(vel, contact),
            ResponseKind::Flatten => FlattenResponse.respond(vel, contact),
        }
    }
}

/// Moves `val` toward `zero` by `amount` without crossing it.
fn reduce(val: f32, amount: f32, zero: f32) -> f32 {
    if val > zero {
        (val - amount).max(zero)
    } else if val < zero {
        (val + amount).min(zero)
    } else {
        val
    }
}

/// Axis-aligned moving body. Positions are bottom-center.
#[derive(Clone, Debug)]
pub struct Collidable {
    curr_rect: Rect,
    prev_rect: Rect,

    vel: Vec2,
    /// Velocity right before the last collision pass.
    precollision_vel: Vec2,
    acc: Vec2,
    gravity: Vec2,
    accel_accum: Vec2,
    decel_accum: Vec2,
    friction: Vec2,

    slip: Slip,
    response: ResponseKind,

    frame: CollisionFrame,
    state: CollisionState,
}

fn bottom_center(r: &Rect) -> Vec2 {
    Vec2::new(r.left + r.width * 0.5, r.bottom())
}

fn rect_at(pos: Vec2, size: Vec2) -> Rect {
    Rect::new(pos.x - size.x * 0.5, pos.y - size.y, size.x, size.y)
}

impl Collidable {
    pub fn new(position: Vec2, size: Vec2) -> Result<Self, CollisionError> {
        if !(size.x > 0.0 && size.y > 0.0 && size.is_finite()) {
            return Err(CollisionError::InvalidBodySize(size.x, size.y));
        }
        if size.x > TILESIZE {
            warn!(width = size.x, "collidable wider than a tile, collision may break");
        }
        let rect = rect_at(position, size);
        Ok(Self {
            curr_rect: rect,
            prev_rect: rect,
            vel: Vec2::ZERO,
            precollision_vel: Vec2::ZERO,
            acc: Vec2::ZERO,
            gravity: Vec2::ZERO,
            accel_accum: Vec2::ZERO,
            decel_accum: Vec2::ZERO,
            friction: Vec2::ZERO,
            slip: Slip::default(),
            response: ResponseKind::default(),
            frame: CollisionFrame::default(),
            state: CollisionState::default(),
        })
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_response(mut self, response: ResponseKind) -> Self {
        self.response = response;
        self
    }

    // --- Geometry ------------------------------------------------------------

    #[inline]
    pub fn position(&self) -> Vec2 {
        bottom_center(&self.curr_rect)
    }

    #[inline]
    pub fn prev_position(&self) -> Vec2 {
        bottom_center(&self.prev_rect)
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        self.curr_rect
    }

    #[inline]
    pub fn prev_rect(&self) -> Rect {
        self.prev_rect
    }

    pub fn size(&self) -> Vec2 {
        self.curr_rect.size()
    }

    /// Union of the previous and current box.
    pub fn bounding_box(&self) -> Rect {
        self.curr_rect.union(&self.prev_rect)
    }

    /// Moves the body; with `swap_prev` the old box becomes the previous box.
    pub fn set_position(&mut self, position: Vec2, swap_prev: bool) {
        debug_assert!(!position.is_nan(), "collidable moved to NaN");
        if swap_prev {
            self.prev_rect = self.curr_rect;
        }
        self.curr_rect = rect_at(position, self.curr_rect.size());
    }

    pub fn move_by(&mut self, offset: Vec2, swap_prev: bool) {
        self.set_position(self.position() + offset, swap_prev);
    }

    /// Moves without sweeping: the previous box follows.
    pub fn teleport(&mut self, position: Vec2) {
        self.curr_rect = rect_at(position, self.curr_rect.size());
        self.prev_rect = self.curr_rect;
    }

    /// Resizes around the box center. Each side is clamped to at least 1.
    pub fn set_size(&mut self, size: Vec2) {
        if size.x > TILESIZE {
            warn!(width = size.x, "collidable wider than a tile, collision may break");
        }
        let s = size.abs().max(Vec2::ONE);
        let diff = s - self.curr_rect.size();
        self.curr_rect.left -= diff.x * 0.5;
        self.curr_rect.top -= diff.y * 0.5;
        self.curr_rect.width = s.x;
        self.curr_rect.height = s.y;
    }

    // --- Motion --------------------------------------------------------------

    #[inline]
    pub fn vel(&self) -> Vec2 {
        self.vel
    }

    pub fn set_vel(&mut self, vel: Vec2) {
        self.vel = vel;
    }

    pub fn set_vel_x(&mut self, x: f32) {
        self.vel.x = x;
    }

    pub fn set_vel_y(&mut self, y: f32) {
        self.vel.y = y;
    }

    pub fn precollision_vel(&self) -> Vec2 {
        self.precollision_vel
    }

    pub fn acc(&self) -> Vec2 {
        self.acc
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    /// Acceleration for the next update only.
    pub fn add_accel(&mut self, acc: Vec2) {
        self.accel_accum += acc;
    }

    /// Deceleration toward the surface velocity for the next update only.
    pub fn add_decel(&mut self, decel: Vec2) {
        self.decel_accum += decel;
    }

    pub fn friction(&self) -> Vec2 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: Vec2) {
        self.friction = friction;
    }

    #[inline]
    pub fn slip(&self) -> Slip {
        self.slip
    }

    pub fn set_slip(&mut self, slip: Slip) {
        self.slip = slip;
    }

    pub fn has_slip_v(&self) -> bool {
        self.slip.state == SlipState::SlipVertical && self.slip.leeway != 0.0
    }

    pub fn has_slip_h(&self) -> bool {
        self.slip.state == SlipState::SlipHorizontal && self.slip.leeway != 0.0
    }

    pub fn response(&self) -> ResponseKind {
        self.response
    }

    /// Sum of the conveyor velocities of the floors touched last frame.
    pub fn surface_velocity(&self) -> Vec2 {
        self.frame
            .contacts
            .iter()
            .filter(|c| c.kind == ContactType::Single && c.contact.ortho_n == Cardinal::N.to_vec())
            .map(|c| c.contact.surface_velocity())
            .sum()
    }

    /// Integrates one step. Accumulated acceleration and deceleration are consumed.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let mut next = self.position();

        self.vel -= self.friction;
        self.acc = self.accel_accum;

        let surface_vel = self.surface_velocity();
        self.vel += self.acc * dt;
        self.vel.x = reduce(self.vel.x, self.decel_accum.x * dt, surface_vel.x);
        self.vel.y = reduce(self.vel.y, self.decel_accum.y * dt, surface_vel.y);
        next += self.vel * dt;

        self.vel += self.gravity * dt;
        next += self.gravity * dt * dt;

        self.precollision_vel = self.vel;
        self.set_position(next, true);

        self.accel_accum = Vec2::ZERO;
        self.decel_accum = Vec2::ZERO;
    }

    // --- Collision -----------------------------------------------------------

    pub fn apply_contact(&mut self, contact: &Contact, kind: ContactType) {
        let response = self.response;
        self.apply_contact_with(contact, kind, &response);
    }

    /// Pushes the body out along the contact and updates its velocity.
    pub fn apply_contact_with(&mut self, contact: &Contact, kind: ContactType, response: &dyn CollisionResponse) {
        self.move_by(contact.ortho_n * contact.separation, false);

        match kind {
            ContactType::CrushHorizontal | ContactType::CrushVertical => self.vel = Vec2::ZERO,
            ContactType::Wedge => self.vel = contact.velocity,
            _ => {
                if (self.vel - contact.velocity).dot(contact.collider_n) <= 0.0 {
                    self.vel = response.respond(self.vel, contact);
                }
            }
        }
    }

    /// Replaces the visible contact list and recomputes the state flags.
    pub fn set_frame(&mut self, frame: CollisionFrame) {
        self.frame = frame;
        self.state = CollisionState::default();
        for applied in &self.frame.contacts {
            let flag = match applied.kind {
                ContactType::CrushHorizontal => Some(CollisionState::CRUSH_H),
                ContactType::CrushVertical => Some(CollisionState::CRUSH_V),
                ContactType::Wedge => Some(CollisionState::WEDGE),
                ContactType::Single => Cardinal::from_vec(applied.contact.ortho_n).map(|dir| match dir {
                    Cardinal::N => CollisionState::FLOOR,
                    Cardinal::S => CollisionState::CEILING,
                    Cardinal::E => CollisionState::WALL_L,
                    Cardinal::W => CollisionState::WALL_R,
                }),
                ContactType::NoSolution => None,
            };
            if let Some(flag) = flag {
                self.state.insert(flag);
            }
        }
    }

    pub fn frame(&self) -> &CollisionFrame {
        &self.frame
    }

    pub fn contacts(&self) -> &[AppliedContact] {
        &self.frame.contacts
    }

    pub fn state(&self) -> CollisionState {
        self.state
    }

    pub fn has_state(&self, flag: CollisionState) -> bool {
        self.state.contains(flag)
    }
}

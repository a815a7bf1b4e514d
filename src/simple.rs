use std::any::Any;

use glam::Vec2;

use crate::api::ColliderRegion;
use crate::geom::{Cardinal, Rect};
use crate::quad::ColliderQuad;
use crate::types::{AppliedContact, Contact, QuadId};

pub type SimplePrecontactFn = Box<dyn Fn(&Contact, f32) -> bool>;
pub type SimplePostcontactFn = Box<dyn Fn(&AppliedContact)>;

/// A region holding one solid box, e.g. a moving platform.
pub struct ColliderSimple {
    quad: ColliderQuad,
    shape: Rect,

    position: Vec2,
    prev_position: Vec2,
    velocity: Vec2,

    on_precontact: Option<SimplePrecontactFn>,
    on_postcontact: Option<SimplePostcontactFn>,
}

impl ColliderSimple {
    const QUAD: QuadId = QuadId(0);

    /// `shape` is in region-local space.
    pub fn new(shape: Rect) -> Self {
        let mut quad = ColliderQuad::from_rect(shape);
        quad.id = Self::QUAD;
        Self {
            quad,
            shape,
            position: Vec2::ZERO,
            prev_position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            on_precontact: None,
            on_postcontact: None,
        }
    }

    pub fn shape(&self) -> Rect {
        self.shape
    }

    /// Moves the box, keeping the last position as the previous one.
    pub fn set_position(&mut self, pos: Vec2) {
        self.prev_position = self.position;
        self.position = pos;
    }

    pub fn teleport(&mut self, pos: Vec2) {
        self.prev_position = pos;
        self.position = pos;
    }

    pub fn set_velocity(&mut self, vel: Vec2) {
        self.velocity = vel;
    }

    pub fn set_on_precontact(&mut self, f: impl Fn(&Contact, f32) -> bool + 'static) {
        self.on_precontact = Some(Box::new(f));
    }

    pub fn set_on_postcontact(&mut self, f: impl Fn(&AppliedContact) + 'static) {
        self.on_postcontact = Some(Box::new(f));
    }
}

impl ColliderRegion for ColliderSimple {
    fn update(&mut self, _dt: f32) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_quad(&self, id: QuadId) -> Option<&ColliderQuad> {
        (id == Self::QUAD).then_some(&self.quad)
    }

    fn quads_in_rect(&self, area: Rect) -> Vec<(QuadId, Rect)> {
        // local query widened by the last move so a box that swept past is kept
        let deltap = self.delta_position();
        let local = area
            .translate(-self.position)
            .extend(if deltap.x < 0.0 { Cardinal::W } else { Cardinal::E }, deltap.x.abs())
            .extend(if deltap.y < 0.0 { Cardinal::N } else { Cardinal::S }, deltap.y.abs());

        if self.shape.touches(&local) {
            vec![(Self::QUAD, self.shape.translate(self.position))]
        } else {
            Vec::new()
        }
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn prev_position(&self) -> Vec2 {
        self.prev_position
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn bounding_box(&self) -> Rect {
        self.shape.translate(self.prev_position).union(&self.shape.translate(self.position))
    }

    fn on_precontact(&self, _quad: QuadId, contact: &Contact, duration: f32) -> bool {
        self.on_precontact.as_ref().is_none_or(|f| f(contact, duration))
    }

    fn on_postcontact(&self, _quad: QuadId, contact: &AppliedContact) {
        if let Some(f) = &self.on_postcontact {
            f(contact);
        }
    }
}

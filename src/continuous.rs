use glam::Vec2;

use crate::discrete::{CollisionAxis, CollisionContext, CollisionDiscrete, FrameTime};
use crate::quad::ColliderQuad;
use crate::types::{Contact, ContactId, QuadId, SlipState};

/// Fraction of the tick at which separation `y0 -> y1` crosses zero.
#[inline]
fn root(y0: f32, y1: f32) -> f32 {
    -(y0 / (y1 - y0))
}

/// Swept contact of one body against one quad, built from the previous and
/// current discrete tests so fast bodies cannot skip through thin geometry.
#[derive(Clone, Debug)]
pub struct CollisionContinuous {
    quad_id: QuadId,
    id: Option<ContactId>,
    prev: CollisionDiscrete,
    curr: CollisionDiscrete,
    /// Quad as it was last tick, used to decide whether `curr` can become `prev`.
    prev_quad: ColliderQuad,
    contact: Contact,
    velocity: Vec2,
    last_axis: Option<usize>,
    tile_valid: bool,
}

impl CollisionContinuous {
    /// Starts tracking `quad_id`, which must exist in `ctx.region`; a missing
    /// quad yields a tracker that never reports contact.
    pub fn new(ctx: CollisionContext<'_>, quad_id: QuadId, id: Option<ContactId>) -> Self {
        let quad = ctx.region.get_quad(quad_id).copied();
        let tile_valid = quad.is_some_and(|q| q.has_any_surface());
        let quad = quad.unwrap_or_default();

        let mut continuous = Self {
            quad_id,
            id,
            prev: CollisionDiscrete::new(ctx, quad, id, FrameTime::Prev),
            curr: CollisionDiscrete::new(ctx, quad, id, FrameTime::Curr),
            prev_quad: quad,
            contact: Contact::default(),
            velocity: ctx.region.velocity(),
            last_axis: None,
            tile_valid,
        };
        continuous.eval(ctx, 0.0);
        continuous
    }

    /// Re-derives the contact. `dt == 0` re-tests the current frame only,
    /// which the solver uses after pushing the body mid-resolution.
    pub fn update(&mut self, ctx: CollisionContext<'_>, dt: f32) {
        let Some(quad) = ctx.region.get_quad(self.quad_id).copied() else {
            self.tile_valid = false;
            self.last_axis = None;
            self.contact = Contact { quad_valid: false, id: self.id, ..Default::default() };
            return;
        };
        self.tile_valid = quad.has_any_surface();

        if dt > 0.0 {
            if ctx.region.prev_position() == ctx.region.position() && self.prev_quad == quad {
                self.prev = self.curr.clone();
                self.prev.set_previous();
                self.prev.update_contact(ctx.collidable);
            } else {
                self.prev.reset(ctx, quad, FrameTime::Prev);
            }
            self.curr.reset(ctx, quad, FrameTime::Curr);
        } else {
            self.curr.update_contact(ctx.collidable);
        }
        self.eval(ctx, dt);
        self.prev_quad = quad;
    }

    fn eval(&mut self, ctx: CollisionContext<'_>, dt: f32) {
        let count = self.curr.axis_count();
        debug_assert_eq!(self.prev.axis_count(), count);

        let mut first_exit = 1.0_f32;
        let mut last_entry = 0.0_f32;
        let mut touch: Option<(usize, f32)> = None;
        let mut no_collision = false;

        for (i, (p, c)) in self.prev.axes().iter().zip(self.curr.axes()).enumerate() {
            debug_assert_eq!(p.dir, c.dir);
            let p_hit = p.is_intersecting() && !p.applied;
            let c_hit = c.is_intersecting();

            match (p_hit, c_hit) {
                (false, false) => no_collision = true,
                (true, false) => {
                    first_exit = first_exit.min(root(p.contact.separation, c.contact.separation));
                }
                (false, true) => {
                    let r = root(p.contact.separation, c.contact.separation);
                    last_entry = last_entry.max(r);
                    if c.is_collider_valid() && (0.0..1.0).contains(&r) {
                        // latest entry wins, ties go to the shallower axis
                        let replace = match touch {
                            None => true,
                            Some((t, t_root)) => {
                                r > t_root || (r == t_root && self.curr.axes()[t].contact.separation > c.contact.separation)
                            }
                        };
                        if replace {
                            touch = Some((i, r));
                        }
                    }
                }
                (true, true) => {}
            }
        }

        let departing = first_exit < 1.0;
        let has_intersect = first_exit >= last_entry;

        self.contact = Contact::default();
        if no_collision {
            self.contact = *self.curr.contact();
            self.last_axis = None;
        } else if let Some((t, _)) = touch.filter(|_| has_intersect) {
            let axis = &self.curr.axes()[t];
            self.contact = axis.contact;
            self.contact.has_contact = axis.is_intersecting();

            if self.contact.has_contact && departing {
                let opposite = axis.dir.opposite();
                let opposite_intersecting = self
                    .curr
                    .axes()
                    .iter()
                    .enumerate()
                    .any(|(i, a)| i != t && a.dir == opposite && a.contact.separation > 0.0);
                // still straddling the quad: only trust the current frame
                if opposite_intersecting {
                    self.contact.has_contact &= self.curr.contact().has_contact;
                }
            }
            self.contact.has_impact_time = last_entry > 0.0;
            self.contact.impact_time = last_entry;
            self.last_axis = Some(t);
        } else if has_intersect {
            match self.last_axis.and_then(|i| self.curr.axis(i)).filter(|a| a.applied) {
                Some(axis) => {
                    self.contact = axis.contact;
                    self.contact.has_contact = axis.is_intersecting();
                }
                None => {
                    self.contact = *self.curr.contact();
                    self.last_axis = self.curr.chosen_axis();
                }
            }
        }

        if dt > 0.0 {
            self.velocity = ctx.region.velocity();
        }
        self.contact.velocity = self.velocity;
        self.contact.id = self.id;

        let slip = ctx.collidable.slip();
        if slip.state == SlipState::SlipVertical {
            if let Some(c) = self.vertical_slip_contact(slip.leeway) {
                self.contact = c;
            }
        }
    }

    /// Swaps a fresh horizontal contact for a shallow floor or ceiling
    /// overlap within `leeway`, letting the body step onto it.
    fn vertical_slip_contact(&self, leeway: f32) -> Option<Contact> {
        if leeway <= 0.0 || !self.contact.has_contact || !self.contact.has_impact_time {
            return None;
        }
        if self.contact.ortho_n.y != 0.0 {
            return None;
        }

        let first = |dir| self.curr.axes().iter().find(|a: &&CollisionAxis| a.dir == dir);
        fn constrain<F: for<'a> Fn(Option<&'a CollisionAxis>) -> Option<&'a CollisionAxis>>(f: F) -> F {
            f
        }
        let eligible = constrain(|a: Option<&CollisionAxis>| {
            a.filter(|a| a.is_collider_valid() && (0.0..=leeway).contains(&a.contact.separation))
        });
        let north = eligible(first(crate::geom::Cardinal::N));
        let south = eligible(first(crate::geom::Cardinal::S));

        let pick = match (north, south) {
            (Some(n), Some(s)) => {
                if s.contact.separation > n.contact.separation {
                    n
                } else {
                    s
                }
            }
            (Some(n), None) => n,
            (None, Some(s)) => s,
            (None, None) => return None,
        };

        let mut c = pick.contact;
        c.is_slip = true;
        c.has_impact_time = self.contact.has_impact_time;
        c.impact_time = self.contact.impact_time;
        c.velocity = self.velocity;
        c.id = self.id;
        Some(c)
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn quad_id(&self) -> QuadId {
        self.quad_id
    }

    /// The quad still exists and has at least one surface.
    pub fn tile_valid(&self) -> bool {
        self.tile_valid
    }

    pub fn current(&self) -> &CollisionDiscrete {
        &self.curr
    }

    pub fn previous(&self) -> &CollisionDiscrete {
        &self.prev
    }

    pub fn set_axis_applied(&mut self, ortho_n: Vec2) {
        self.curr.set_axis_applied(ortho_n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ColliderRegion;
    use crate::collidable::Collidable;
    use crate::shape::TileShape;
    use crate::tilemap::ColliderTileMap;
    use crate::types::Slip;

    fn floor_map() -> ColliderTileMap {
        let mut map = ColliderTileMap::new(4, 4, false).unwrap();
        map.set_tile((1, 2), TileShape::SOLID);
        map.apply_changes();
        map
    }

    fn track(map: &ColliderTileMap, body: &Collidable) -> CollisionContinuous {
        let id = map.quad_id((1, 2)).unwrap();
        CollisionContinuous::new(CollisionContext { region: map, collidable: body }, id, None)
    }

    #[test]
    fn test_entry_reports_impact_time() {
        let map = floor_map();
        // floor top at y = 32; the bottom moves 24 -> 40 this tick
        let mut body = Collidable::new(Vec2::new(24.0, 24.0), Vec2::new(8.0, 8.0)).unwrap();
        body.set_position(Vec2::new(24.0, 40.0), true);

        let mut c = track(&map, &body);
        c.update(CollisionContext { region: &map, collidable: &body }, 1.0 / 60.0);
        let contact = c.contact();
        assert!(contact.has_contact);
        assert!(contact.has_impact_time);
        assert!((contact.impact_time - 0.5).abs() < 1e-4);
        assert_eq!(contact.ortho_n, Vec2::new(0.0, -1.0));
        assert!((contact.separation - 8.0).abs() < 1e-4);
    }

    #[test]
    fn test_fast_fall_does_not_tunnel() {
        let map = floor_map();
        // discrete test alone would see the body's center below the floor top
        let mut body = Collidable::new(Vec2::new(24.0, 30.0), Vec2::new(8.0, 16.0)).unwrap();
        body.set_position(Vec2::new(24.0, 45.0), true);

        let mut c = track(&map, &body);
        c.update(CollisionContext { region: &map, collidable: &body }, 1.0 / 60.0);
        let contact = c.contact();
        assert!(contact.has_contact);
        assert!(contact.has_impact_time);
        assert_eq!(contact.ortho_n, Vec2::new(0.0, -1.0));
        assert!((contact.separation - 13.0).abs() < 1e-4);
    }

    #[test]
    fn test_resting_repeats_discrete_contact() {
        let map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 33.0), Vec2::new(8.0, 8.0)).unwrap();
        let mut c = track(&map, &body);
        c.update(CollisionContext { region: &map, collidable: &body }, 1.0 / 60.0);
        assert!(c.contact().has_contact);
        assert!(!c.contact().has_impact_time);
        assert_eq!(c.contact().ortho_n, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_missing_quad_is_not_colliding() {
        let mut map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 33.0), Vec2::new(8.0, 8.0)).unwrap();
        let mut c = track(&map, &body);
        map.remove_tile((1, 2));
        map.update(0.0);
        c.update(CollisionContext { region: &map, collidable: &body }, 1.0 / 60.0);
        assert!(!c.tile_valid());
        assert!(!c.contact().has_contact);
    }

    #[test]
    fn test_vertical_slip_steps_onto_ledge() {
        let map = floor_map();
        // moving right into the tile's west face with the bottom 2px below its top
        let mut body = Collidable::new(Vec2::new(10.0, 34.0), Vec2::new(8.0, 8.0)).unwrap();
        body.set_slip(Slip { state: SlipState::SlipVertical, leeway: 4.0 });
        body.set_position(Vec2::new(14.0, 34.0), true);

        let mut c = track(&map, &body);
        c.update(CollisionContext { region: &map, collidable: &body }, 1.0 / 60.0);
        let contact = c.contact();
        assert!(contact.is_slip);
        assert_eq!(contact.ortho_n, Vec2::new(0.0, -1.0));
        assert!((contact.separation - 2.0).abs() < 1e-4);
    }
}

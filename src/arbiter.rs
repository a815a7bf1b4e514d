use std::collections::BTreeMap;

use tracing::debug;

use crate::continuous::CollisionContinuous;
use crate::discrete::CollisionContext;
use crate::geom::Rect;
use crate::types::{CollidableId, Contact, ContactId, QuadId, RegionId};

/// Persistent collision state of one (body, region, quad) triple.
#[derive(Clone, Debug)]
pub struct Arbiter {
    id: ContactId,
    collision: CollisionContinuous,
    contact: Contact,
    touch_duration: f32,
    alive_duration: f32,
    recalc_count: u32,
}

impl Arbiter {
    pub fn new(ctx: CollisionContext<'_>, id: ContactId) -> Self {
        let collision = CollisionContinuous::new(ctx, id.quad, Some(id));
        let contact = *collision.contact();
        Self {
            id,
            collision,
            contact,
            touch_duration: 0.0,
            alive_duration: 0.0,
            recalc_count: 0,
        }
    }

    /// Refreshes the contact. With `dt == 0` only the current frame is
    /// re-tested and the timers stand still.
    pub fn update(&mut self, ctx: CollisionContext<'_>, dt: f32) {
        self.alive_duration += dt;
        self.collision.update(ctx, dt);

        self.contact = *self.collision.contact();
        if self.contact.has_contact {
            self.touch_duration += dt;
        } else {
            self.touch_duration = 0.0;
        }
        self.recalc_count += 1;

        self.contact.touch_duration = self.touch_duration;
        self.contact.alive_duration = self.alive_duration;
    }

    /// Consumes the axis `ortho_n` so it is not picked again this tick. A
    /// steep floor pushed out sideways passes its transposed normal.
    pub fn set_applied_along(&mut self, ortho_n: glam::Vec2) {
        self.collision.set_axis_applied(ortho_n);
    }

    #[inline]
    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn collision(&self) -> &CollisionContinuous {
        &self.collision
    }

    /// Backing quad exists and can collide.
    pub fn is_valid(&self) -> bool {
        self.collision.tile_valid()
    }

    pub fn id(&self) -> ContactId {
        self.id
    }

    pub fn quad(&self) -> QuadId {
        self.id.quad
    }

    pub fn region(&self) -> RegionId {
        self.id.region
    }

    pub fn touch_duration(&self) -> f32 {
        self.touch_duration
    }

    pub fn alive_duration(&self) -> f32 {
        self.alive_duration
    }

    pub fn recalc_count(&self) -> u32 {
        self.recalc_count
    }
}

#[derive(Clone, Debug)]
struct QuadEntry {
    arbiter: Arbiter,
    /// World-space tile bounds when last seen.
    bounds: Rect,
    stale: bool,
    updated: bool,
}

/// Arbiters of one body against the quads of one region, keyed by quad.
#[derive(Clone, Debug)]
pub struct RegionArbiter {
    region: RegionId,
    collidable: CollidableId,
    quads: BTreeMap<QuadId, QuadEntry>,
}

impl RegionArbiter {
    pub fn new(region: RegionId, collidable: CollidableId) -> Self {
        Self { region, collidable, quads: BTreeMap::new() }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Syncs the arbiter set with the quads inside `bounds`: new quads get an
    /// arbiter, quads that no longer touch the bounds are dropped.
    pub fn update_region(&mut self, ctx: CollisionContext<'_>, bounds: Rect) {
        let candidates = ctx.region.quads_in_rect(bounds);

        for entry in self.quads.values_mut() {
            if !bounds.touches(&entry.bounds) {
                entry.stale = true;
            }
        }

        let mut created = 0;
        for (quad, tile_bounds) in candidates {
            if !ctx.region.get_quad(quad).is_some_and(|q| q.has_any_surface()) {
                continue;
            }
            match self.quads.get_mut(&quad) {
                Some(entry) => {
                    entry.stale = false;
                    entry.bounds = tile_bounds;
                }
                None => {
                    let id = ContactId { collidable: self.collidable, region: self.region, quad };
                    self.quads.insert(
                        quad,
                        QuadEntry {
                            arbiter: Arbiter::new(ctx, id),
                            bounds: tile_bounds,
                            stale: false,
                            updated: false,
                        },
                    );
                    created += 1;
                }
            }
        }

        let before = self.quads.len();
        self.quads.retain(|_, e| !e.stale);
        let removed = before - self.quads.len();
        if created > 0 || removed > 0 {
            debug!(region = ?self.region, created, removed, "region arbiters changed");
        }
    }

    /// Updates every arbiter that has not been updated since the last
    /// [`RegionArbiter::begin_tick`].
    pub fn update_arbiters(&mut self, ctx: CollisionContext<'_>, dt: f32) {
        for entry in self.quads.values_mut().filter(|e| !e.updated) {
            entry.arbiter.update(ctx, dt);
            entry.updated = true;
        }
    }

    pub fn begin_tick(&mut self) {
        for entry in self.quads.values_mut() {
            entry.updated = false;
        }
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn get(&self, quad: QuadId) -> Option<&Arbiter> {
        self.quads.get(&quad).map(|e| &e.arbiter)
    }

    pub fn get_mut(&mut self, quad: QuadId) -> Option<&mut Arbiter> {
        self.quads.get_mut(&quad).map(|e| &mut e.arbiter)
    }

    /// Arbiters in quad order.
    pub fn arbiters(&self) -> impl Iterator<Item = &Arbiter> {
        self.quads.values().map(|e| &e.arbiter)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::collidable::Collidable;
    use crate::shape::TileShape;
    use crate::tilemap::ColliderTileMap;

    fn ids() -> (RegionId, CollidableId) {
        (RegionId { index: 0, generation: 0 }, CollidableId { index: 0, generation: 0 })
    }

    fn floor_map() -> ColliderTileMap {
        let mut map = ColliderTileMap::new(6, 6, false).unwrap();
        for x in 0..6 {
            map.set_tile((x, 3), TileShape::SOLID);
        }
        map.apply_changes();
        map
    }

    #[test]
    fn test_update_region_tracks_bounds() {
        let map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 48.0), Vec2::new(8.0, 8.0)).unwrap();
        let (rid, cid) = ids();
        let mut ra = RegionArbiter::new(rid, cid);
        let ctx = CollisionContext { region: &map, collidable: &body };

        ra.update_region(ctx, body.bounding_box());
        let quads: Vec<_> = ra.arbiters().map(|a| map.position_of(a.quad()).unwrap()).collect();
        assert!(quads.contains(&(1, 3)));
        assert!(quads.iter().all(|&(_, y)| y == 3));

        // far away: everything drops
        ra.update_region(ctx, Rect::new(200.0, 0.0, 8.0, 8.0));
        assert!(ra.is_empty());
    }

    #[test]
    fn test_arbiter_timers() {
        let map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 49.0), Vec2::new(8.0, 8.0)).unwrap();
        let (rid, cid) = ids();
        let ctx = CollisionContext { region: &map, collidable: &body };
        let quad = map.quad_id((1, 3)).unwrap();
        let mut arb = Arbiter::new(ctx, ContactId { collidable: cid, region: rid, quad });

        arb.update(ctx, 0.5);
        arb.update(ctx, 0.25);
        assert!(arb.contact().has_contact);
        assert!((arb.alive_duration() - 0.75).abs() < 1e-6);
        assert!((arb.touch_duration() - 0.75).abs() < 1e-6);
        assert_eq!(arb.contact().touch_duration, arb.touch_duration());
        assert_eq!(arb.recalc_count(), 2);

        arb.update(ctx, 0.0);
        assert_eq!(arb.recalc_count(), 3);
        assert!((arb.alive_duration() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_set_applied_marks_axis() {
        let map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 49.0), Vec2::new(8.0, 8.0)).unwrap();
        let (rid, cid) = ids();
        let ctx = CollisionContext { region: &map, collidable: &body };
        let quad = map.quad_id((1, 3)).unwrap();
        let mut arb = Arbiter::new(ctx, ContactId { collidable: cid, region: rid, quad });
        arb.update(ctx, 1.0 / 60.0);
        arb.set_applied_along(Vec2::new(0.0, -1.0));
        let curr = arb.collision().current();
        let applied: Vec<_> = curr.axes().iter().filter(|a| a.applied).map(|a| a.dir).collect();
        assert_eq!(applied, vec![crate::geom::Cardinal::N]);
    }

    #[test]
    fn test_update_arbiters_once_per_tick() {
        let map = floor_map();
        let body = Collidable::new(Vec2::new(24.0, 49.0), Vec2::new(8.0, 8.0)).unwrap();
        let (rid, cid) = ids();
        let ctx = CollisionContext { region: &map, collidable: &body };
        let mut ra = RegionArbiter::new(rid, cid);
        ra.update_region(ctx, body.bounding_box());
        ra.begin_tick();
        ra.update_arbiters(ctx, 0.1);
        ra.update_arbiters(ctx, 0.1);
        assert!(ra.arbiters().all(|a| a.recalc_count() == 1));
    }
}

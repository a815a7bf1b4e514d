use std::collections::BTreeMap;

use glam::Vec2;
use tracing::{debug, warn};

use crate::api::{ColliderRegion, CollisionWorldApi};
use crate::arbiter::RegionArbiter;
use crate::collidable::Collidable;
use crate::discrete::CollisionContext;
use crate::error::CollisionError;
use crate::geom::{Cardinal, Line, Rect};
use crate::narrowphase::{RaycastHit, compare_hits, segment_rect};
use crate::solver::{CollisionSolver, RegionSource};
use crate::types::*;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena handing out (index, generation) pairs; freed slots are reused
/// with a bumped generation so old handles go stale.
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    fn insert(&mut self, value: T) -> (u32, u32) {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                (index, slot.generation)
            }
            None => {
                self.slots.push(Slot { generation: 0, value: Some(value) });
                ((self.slots.len() - 1) as u32, 0)
            }
        }
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(value)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Live entries in index order.
    fn iter(&self) -> impl Iterator<Item = ((u32, u32), &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| ((i as u32, s.generation), v)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = ((u32, u32), &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| {
                let generation = s.generation;
                s.value.as_mut().map(|v| ((i as u32, generation), v))
            })
    }

    fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

struct Regions(Arena<Box<dyn ColliderRegion>>);

impl RegionSource for Regions {
    fn get_region(&self, id: RegionId) -> Option<&dyn ColliderRegion> {
        self.0.get(id.index, id.generation).map(|r| r.as_ref())
    }
}

impl Regions {
    fn iter(&self) -> impl Iterator<Item = (RegionId, &Box<dyn ColliderRegion>)> {
        self.0.iter().map(|((index, generation), r)| (RegionId { index, generation }, r))
    }
}

/// A body plus its arbiters, one [`RegionArbiter`] per nearby region.
struct Body {
    collidable: Collidable,
    arbiters: BTreeMap<RegionId, RegionArbiter>,
}

/// Owns regions and bodies and runs the per-tick collision pipeline.
pub struct CollisionWorld {
    pub cfg: WorldConfig,
    pub frame_counter: u64,

    regions: Regions,
    bodies: Arena<Body>,
}

impl CollisionWorldApi for CollisionWorld {
    fn new(cfg: WorldConfig) -> Result<Self, CollisionError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            frame_counter: 0,
            regions: Regions(Arena::new()),
            bodies: Arena::new(),
        })
    }

    fn add_region(&mut self, region: Box<dyn ColliderRegion>) -> RegionId {
        let (index, generation) = self.regions.0.insert(region);
        RegionId { index, generation }
    }

    fn remove_region(&mut self, id: RegionId) -> Result<Box<dyn ColliderRegion>, CollisionError> {
        let region = self
            .regions
            .0
            .remove(id.index, id.generation)
            .ok_or(CollisionError::StaleHandle)?;
        for (_, body) in self.bodies.iter_mut() {
            body.arbiters.remove(&id);
        }
        Ok(region)
    }

    fn region(&self, id: RegionId) -> Option<&dyn ColliderRegion> {
        self.regions.get_region(id)
    }

    fn add_collidable(&mut self, body: Collidable) -> CollidableId {
        let (index, generation) = self.bodies.insert(Body { collidable: body, arbiters: BTreeMap::new() });
        CollidableId { index, generation }
    }

    fn remove_collidable(&mut self, id: CollidableId) -> Result<Collidable, CollisionError> {
        self.bodies
            .remove(id.index, id.generation)
            .map(|b| b.collidable)
            .ok_or(CollisionError::StaleHandle)
    }

    fn collidable(&self, id: CollidableId) -> Option<&Collidable> {
        self.bodies.get(id.index, id.generation).map(|b| &b.collidable)
    }

    fn collidable_mut(&mut self, id: CollidableId) -> Option<&mut Collidable> {
        self.bodies.get_mut(id.index, id.generation).map(|b| &mut b.collidable)
    }

    fn update(&mut self, dt: f32) {
        self.frame_counter = self.frame_counter.wrapping_add(1);

        for (_, region) in self.regions.0.iter_mut() {
            region.update(dt);
        }
        for (_, body) in self.bodies.iter_mut() {
            body.collidable.update(dt);
        }

        let max_iterations = self.cfg.max_bound_iterations;
        for ((index, generation), body) in self.bodies.iter_mut() {
            let id = CollidableId { index, generation };
            gather_collisions(&self.regions, id, body, dt, max_iterations);
            solve_collisions(&self.regions, body);
        }
    }

    fn step(&mut self) {
        self.update(self.cfg.dt);
    }

    fn frame(&self, id: CollidableId) -> Option<&CollisionFrame> {
        self.collidable(id).map(|c| c.frame())
    }

    fn raycast(&self, origin: Vec2, dir: Cardinal, dist: f32) -> Option<RaycastHit> {
        let dist = dist.clamp(0.0, self.cfg.ray_max_dist);
        let step = dir.to_vec();
        let line = Line::new(origin, origin + step * dist);
        // the backed-off segment is what may touch a region's bounds
        let reach = Line::new(origin - step * self.cfg.ray_backoff, line.p2);

        self.regions
            .iter()
            .filter(|(_, region)| segment_rect(reach, region.bounding_box()).is_some())
            .fold(None, |best, (id, region)| {
                let hit = region.raycast(line, self.cfg.ray_backoff).map(|mut h| {
                    h.region = Some(id);
                    h
                });
                compare_hits(best, hit)
            })
    }
}

impl CollisionWorld {
    pub fn region_mut(&mut self, id: RegionId) -> Option<&mut (dyn ColliderRegion + 'static)> {
        self.regions.0.get_mut(id.index, id.generation).map(|r| r.as_mut())
    }

    /// Typed access to a region, e.g. to read back a [`ColliderTileMap`].
    ///
    /// [`ColliderTileMap`]: crate::tilemap::ColliderTileMap
    pub fn region_as<T: ColliderRegion>(&self, id: RegionId) -> Option<&T> {
        self.region(id)?.as_any().downcast_ref()
    }

    /// Typed mutable access, for queueing tile edits or moving a region
    /// between ticks.
    pub fn region_as_mut<T: ColliderRegion>(&mut self, id: RegionId) -> Option<&mut T> {
        self.region_mut(id)?.as_any_mut().downcast_mut()
    }

    pub fn region_count(&self) -> usize {
        self.regions.0.len()
    }

    pub fn collidable_count(&self) -> usize {
        self.bodies.len()
    }

    /// Arbiters tracked for `id` against `region`.
    pub fn region_arbiter(&self, id: CollidableId, region: RegionId) -> Option<&RegionArbiter> {
        self.bodies.get(id.index, id.generation)?.arbiters.get(&region)
    }
}

/// Distance from the body rect to each edge of `bound`, indexed by [`Cardinal`].
fn bound_distances(body: Rect, bound: Rect) -> [f32; 4] {
    [
        body.top - bound.top,
        bound.right() - body.right(),
        bound.bottom() - body.bottom(),
        body.left - bound.left,
    ]
}

/// Grows `bound` so the quads the body would be pushed toward by `contact`
/// are part of the search.
fn push_bounds_for_contact(mut bound: Rect, dist: &[f32; 4], contact: &Contact) -> Rect {
    if !contact.has_contact {
        return bound;
    }
    let Some(dir) = Cardinal::from_vec(contact.ortho_n) else {
        return bound;
    };
    let diff = contact.separation - dist[dir.index()];
    if diff > 0.0 {
        bound = bound.extend(dir, diff);
    }

    if contact.is_transposable() {
        let alt = if contact.collider_n.x < 0.0 { Cardinal::W } else { Cardinal::E };
        let diff = contact.transposed_separation() - dist[alt.index()];
        if diff > 0.0 {
            bound = bound.extend(alt, diff);
        }
    }
    bound
}

/// Syncs the body's region arbiters with the regions overlapping `bound`.
fn update_region_arbiters(regions: &Regions, id: CollidableId, body: &mut Body, bound: Rect) {
    let Body { collidable, arbiters } = body;
    for (rid, region) in regions.iter() {
        if region.bounding_box().intersects(&bound) {
            let ctx = CollisionContext { region: region.as_ref(), collidable: &*collidable };
            arbiters
                .entry(rid)
                .or_insert_with(|| RegionArbiter::new(rid, id))
                .update_region(ctx, bound);
        } else if arbiters.remove(&rid).is_some() {
            debug!(region = ?rid, "left region bounds");
        }
    }
}

/// Broad phase: widens the search bounds until every contact's push-out
/// stays inside them, updating each arbiter at most once.
fn gather_collisions(regions: &Regions, id: CollidableId, body: &mut Body, dt: f32, max_iterations: usize) {
    let body_rect = body.collidable.rect();
    let mut push_bound = body.collidable.bounding_box();

    for ra in body.arbiters.values_mut() {
        ra.begin_tick();
    }

    let mut iterations = 0;
    loop {
        let bound = push_bound;
        let dist = bound_distances(body_rect, bound);

        update_region_arbiters(regions, id, body, bound);

        let Body { collidable, arbiters } = &mut *body;
        for (rid, ra) in arbiters.iter_mut() {
            let Some(region) = regions.get_region(*rid) else {
                continue;
            };
            ra.update_arbiters(CollisionContext { region, collidable: &*collidable }, dt);
            for arbiter in ra.arbiters() {
                push_bound = push_bounds_for_contact(push_bound, &dist, arbiter.contact());
            }
        }

        iterations += 1;
        if push_bound == bound {
            debug!(?id, iterations, "broad phase converged");
            break;
        }
        if iterations >= max_iterations {
            warn!(?id, iterations, "broad phase bound did not converge");
            break;
        }
    }
}

/// Hands the admitted contacts to the solver and stores the result.
fn solve_collisions(regions: &Regions, body: &mut Body) {
    let Body { collidable, arbiters } = body;

    let mut contacts = Vec::new();
    for (rid, ra) in arbiters.iter() {
        let Some(region) = regions.get_region(*rid) else {
            continue;
        };
        for arbiter in ra.arbiters().filter(|a| a.is_valid()) {
            if region.on_precontact(arbiter.quad(), arbiter.contact(), arbiter.touch_duration()) {
                contacts.push(*arbiter.contact());
            }
        }
    }

    let mut solver = CollisionSolver::new(collidable, arbiters, regions);
    for contact in contacts {
        solver.add_contact(contact);
    }
    let frame = solver.solve();

    for applied in &frame.contacts {
        if let (Some(rid), Some(quad)) = (applied.region, applied.quad) {
            if let Some(region) = regions.get_region(rid) {
                region.on_postcontact(quad, applied);
            }
        }
    }
    collidable.set_frame(frame);
}

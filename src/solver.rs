use std::collections::BTreeMap;

use glam::Vec2;
use tracing::{trace, warn};

use crate::api::ColliderRegion;
use crate::arbiter::RegionArbiter;
use crate::collidable::Collidable;
use crate::discrete::CollisionContext;
use crate::geom::{Cardinal, Line, Rect, is_horizontal_vec, is_vertical_vec, lefthand};
use crate::types::{AppliedContact, CollisionFrame, Contact, ContactType, RegionId, compare_contact};

/// Tolerance for two collider normals cancelling out.
pub const CRUSH_EPSILON: f32 = 1e-5;

/// Resolves region ids to the regions borrowed for one solve.
pub trait RegionSource {
    fn get_region(&self, id: RegionId) -> Option<&dyn ColliderRegion>;
}

/// How strongly a candidate surface hides behind a basis surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GhostEdge {
    None,
    Partial,
    Full,
}

/// Classifies `candidate` against `basis`: a candidate lying behind the
/// basis surface is a seam artifact rather than a real contact.
pub fn is_ghost_edge(basis: &Contact, candidate: &Contact) -> GhostEdge {
    if !basis.is_resolvable() {
        return GhostEdge::None;
    }
    // a one-way surface the body has not committed to yet hides nothing
    let is_one_way = !basis.has_contact && basis.separation > 0.0 && basis.impact_time == -1.0;

    let b = basis.collider.surface;
    let c = candidate.collider.surface;
    let normal = lefthand(b.vector()).normalize_or_zero();

    let dotp1 = normal.dot(c.p1 - b.p2);
    let dotp2 = normal.dot(c.p2 - b.p1);

    let behind = if b.p1 == c.p2 {
        dotp1 < 0.0 && dotp2 <= 0.0
    } else if b.p2 == c.p1 {
        dotp1 <= 0.0 && dotp2 < 0.0
    } else {
        (dotp1 <= 0.0 && dotp2 < 0.0) || (dotp1 < 0.0 && dotp2 <= 0.0)
    };
    let vertical_behind = !b.is_vertical() && c.is_vertical() && dotp1 <= 0.0 && dotp2 <= 0.0;
    let opposite = b == c.reversed();

    if is_one_way || !(behind || vertical_behind || opposite) {
        GhostEdge::None
    } else if behind {
        GhostEdge::Full
    } else {
        GhostEdge::Partial
    }
}

/// Outcome of comparing two candidates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompResult {
    pub discard_first: bool,
    pub discard_second: bool,
    /// Replacement contact produced by the comparison (crushes).
    pub contact: Option<(Contact, ContactType)>,
}

/// Pairwise ghost check between two candidates.
pub fn compare(lhs: &Contact, rhs: &Contact) -> CompResult {
    let mut r = CompResult {
        discard_first: !lhs.quad_valid,
        discard_second: !rhs.quad_valid,
        contact: None,
    };
    if r.discard_first || r.discard_second {
        return r;
    }

    let g1 = is_ghost_edge(rhs, lhs);
    let g2 = is_ghost_edge(lhs, rhs);
    let (mut first, mut second) = (g1 != GhostEdge::None, g2 != GhostEdge::None);

    if first && second {
        if g1 == g2 {
            match compare_contact(lhs, rhs) {
                std::cmp::Ordering::Equal => (first, second) = (false, false),
                ord => {
                    first = ord == std::cmp::Ordering::Greater;
                    second = !first;
                }
            }
        } else {
            first = g2 < g1;
            second = !first;
        }
    }
    r.discard_first = first;
    r.discard_second = second;
    r
}

/// Drops ghost and invalid candidates, keeping the survivors in order.
pub fn compare_all(contacts: &mut Vec<Contact>) {
    let mut i = 0;
    while i + 1 < contacts.len() {
        let mut j = i + 1;
        let mut dropped = false;
        while j < contacts.len() {
            let r = compare(&contacts[i], &contacts[j]);
            if r.discard_first {
                contacts.remove(i);
                dropped = true;
                break;
            } else if r.discard_second {
                contacts.remove(j);
            } else {
                j += 1;
            }
        }
        if !dropped {
            i += 1;
        }
    }
}

fn is_squeezing(a: &Contact, b: &Contact) -> bool {
    a.separation + b.separation >= 0.0 && (a.has_contact || b.has_contact) && a.ortho_n == -b.ortho_n
}

fn is_crushing(a: &Contact, b: &Contact) -> bool {
    let sum = a.collider_n + b.collider_n;
    sum.x.abs() < CRUSH_EPSILON && sum.y.abs() < CRUSH_EPSILON
}

/// Floor and ceiling face away from each other.
fn is_diverging_v(a: Line, b: Line) -> bool {
    let (a_mid, b_mid) = (a.midpoint(), b.midpoint());
    let a_away = (b_mid - a_mid).dot(lefthand(a.vector()).normalize_or_zero()) < 0.0;
    let b_away = (a_mid - b_mid).dot(lefthand(b.vector()).normalize_or_zero()) < 0.0;
    a_away && b_away
}

/// Midpoint correction of two opposing overlaps.
fn crush_contact(deeper: &Contact, other_sep: f32, kind: ContactType) -> Option<(Contact, ContactType)> {
    let mut c = *deeper;
    c.separation = (c.separation - other_sep) / 2.0;
    Some((c, kind))
}

pub type Picker = fn(&Contact, &Contact, Rect) -> CompResult;

/// Decides between the best east and best west candidate.
pub fn pick_h(east: &Contact, west: &Contact, body: Rect) -> CompResult {
    let (e, w) = (east.separation, west.separation);

    if (e >= body.width) != (w >= body.width) {
        return CompResult { discard_first: e >= body.width, discard_second: w >= body.width, contact: None };
    }
    if e + w > 0.0 {
        let contact = if e > w {
            crush_contact(east, w, ContactType::CrushHorizontal)
        } else {
            crush_contact(west, e, ContactType::CrushHorizontal)
        };
        return CompResult { discard_first: true, discard_second: true, contact };
    }
    if east.has_contact != west.has_contact {
        return CompResult { discard_first: !east.has_contact, discard_second: !west.has_contact, contact: None };
    }
    CompResult::default()
}

/// Decides between the best north and best south candidate.
pub fn pick_v(north: &Contact, south: &Contact, body: Rect) -> CompResult {
    let (n, s) = (north.separation, south.separation);

    if n + s > body.height || is_diverging_v(north.collider.surface, south.collider.surface) {
        let discard_first = s < n;
        return CompResult { discard_first, discard_second: !discard_first, contact: None };
    }
    if is_squeezing(north, south) && is_crushing(north, south) {
        let contact = if n > s {
            crush_contact(north, s, ContactType::CrushVertical)
        } else {
            crush_contact(south, n, ContactType::CrushVertical)
        };
        return CompResult { discard_first: true, discard_second: true, contact };
    }
    if north.has_contact != south.has_contact {
        return CompResult { discard_first: !north.has_contact, discard_second: !south.has_contact, contact: None };
    }
    CompResult::default()
}

/// Result of testing a floor/ceiling pair for a wedge.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum WedgeOutcome {
    None,
    /// The two surfaces never meet; nothing is applied.
    Unresolved,
    Resolved(Contact),
}

/// A floor and a non-parallel ceiling squeezing the body push it sideways
/// toward the point where they would meet.
pub fn detect_wedge(north: &Contact, south: &Contact, body: Rect) -> WedgeOutcome {
    if !is_squeezing(north, south)
        || is_crushing(north, south)
        || is_diverging_v(north.collider.surface, south.collider.surface)
    {
        return WedgeOutcome::None;
    }
    let floor = north.collider.surface;
    let ceil = south.collider.surface.shift(Vec2::new(0.0, body.height));

    let Some(meet) = floor.intersection(&ceil) else {
        warn!(?floor, ?ceil, "bad intersection");
        return WedgeOutcome::Unresolved;
    };
    let pos = Vec2::new(body.left + body.width * 0.5, body.bottom());
    if meet.x == pos.x {
        return WedgeOutcome::None;
    }

    let side = if north.collider_n.x + south.collider_n.x < 0.0 { -1.0 } else { 1.0 };
    let prev_meet = floor
        .shift(-north.velocity)
        .intersection(&ceil.shift(-south.velocity))
        .unwrap_or(meet);

    WedgeOutcome::Resolved(Contact {
        separation: (meet.x - pos.x).abs(),
        has_contact: true,
        position: Vec2::new(pos.x, body.mid().y),
        ortho_n: Vec2::new(side, 0.0),
        collider_n: Vec2::new(side, 0.0),
        velocity: meet - prev_meet,
        kind: ContactType::Wedge,
        ..Default::default()
    })
}

/// Takes the first candidate of a sorted stack. Among leading candidates of
/// equal separation the one whose contact point lies closest to the body's
/// center, across the resolving axis, wins.
pub fn take_first(mut stack: Vec<Contact>, body_mid: Vec2) -> (Option<Contact>, Vec<Contact>) {
    if stack.is_empty() {
        return (None, stack);
    }
    let sep = stack[0].separation;
    let mut pick = 0;
    for (i, c) in stack.iter().enumerate().skip(1) {
        if c.separation != sep {
            break;
        }
        let best = &stack[pick];
        let closer = if is_horizontal_vec(best.ortho_n) {
            (c.position.y - body_mid.y).abs() < (best.position.y - body_mid.y).abs()
        } else {
            (c.position.x - body_mid.x).abs() < (best.position.x - body_mid.x).abs()
        };
        if closer {
            pick = i;
        }
    }
    let first = stack.remove(pick);
    (Some(first), stack)
}

fn sort_stack(stack: &mut [Contact]) {
    stack.sort_by(compare_contact);
}

/// Picks and applies a consistent set of contacts for one body.
pub struct CollisionSolver<'a> {
    collidable: &'a mut Collidable,
    arbiters: &'a mut BTreeMap<RegionId, RegionArbiter>,
    regions: &'a dyn RegionSource,

    contacts: Vec<Contact>,
    north: Vec<Contact>,
    south: Vec<Contact>,
    east: Vec<Contact>,
    west: Vec<Contact>,
    north_alt: Vec<Contact>,
    south_alt: Vec<Contact>,

    frame: CollisionFrame,
}

impl<'a> CollisionSolver<'a> {
    pub fn new(
        collidable: &'a mut Collidable,
        arbiters: &'a mut BTreeMap<RegionId, RegionArbiter>,
        regions: &'a dyn RegionSource,
    ) -> Self {
        Self {
            collidable,
            arbiters,
            regions,
            contacts: Vec::new(),
            north: Vec::new(),
            south: Vec::new(),
            east: Vec::new(),
            west: Vec::new(),
            north_alt: Vec::new(),
            south_alt: Vec::new(),
            frame: CollisionFrame::default(),
        }
    }

    pub fn add_contact(&mut self, contact: Contact) {
        self.contacts.push(contact);
    }

    /// Runs ghost filtering, wedge detection, then the X and Y passes.
    pub fn solve(mut self) -> CollisionFrame {
        if self.contacts.is_empty() {
            return self.frame;
        }
        compare_all(&mut self.contacts);

        for c in std::mem::take(&mut self.contacts) {
            self.push_to_stack(c);
        }
        self.detect_wedges();

        if self.can_apply_alt() {
            for mut c in std::mem::take(&mut self.north_alt).into_iter().chain(std::mem::take(&mut self.south_alt)) {
                c.transpose();
                self.push_to_stack(c);
            }
        } else {
            let north_alt = std::mem::take(&mut self.north_alt);
            let south_alt = std::mem::take(&mut self.south_alt);
            self.north.extend(north_alt);
            self.south.extend(south_alt);
        }

        let mut east = std::mem::take(&mut self.east);
        let mut west = std::mem::take(&mut self.west);
        sort_stack(&mut east);
        sort_stack(&mut west);
        if self.solve_axis(&mut east, &mut west, pick_h) {
            let mut north = std::mem::take(&mut self.north);
            let mut south = std::mem::take(&mut self.south);
            self.update_stack(&mut north);
            self.update_stack(&mut south);
            self.north = north;
            self.south = south;
        }

        let mut north = std::mem::take(&mut self.north);
        let mut south = std::mem::take(&mut self.south);
        sort_stack(&mut north);
        sort_stack(&mut south);
        self.solve_axis(&mut north, &mut south, pick_v);

        self.frame
    }

    fn push_to_stack(&mut self, contact: Contact) {
        match Cardinal::from_vec(contact.ortho_n) {
            Some(Cardinal::E) => self.east.push(contact),
            Some(Cardinal::W) => self.west.push(contact),
            Some(Cardinal::N) if contact.is_transposable() => self.north_alt.push(contact),
            Some(Cardinal::N) => self.north.push(contact),
            Some(Cardinal::S) if contact.is_transposable() => self.south_alt.push(contact),
            Some(Cardinal::S) => self.south.push(contact),
            None => trace!(ortho_n = ?contact.ortho_n, "discarding contact without direction"),
        }
    }

    fn detect_wedges(&mut self) {
        let body = self.collidable.rect();
        let mut wedges = Vec::new();
        for north in &self.north {
            for south in &self.south {
                match detect_wedge(north, south, body) {
                    WedgeOutcome::Resolved(c) => wedges.push(c),
                    WedgeOutcome::Unresolved => self.frame.unresolved_wedges += 1,
                    WedgeOutcome::None => {}
                }
            }
        }
        for c in wedges {
            self.push_to_stack(c);
        }
    }

    /// Steep slopes may resolve sideways when nothing else pushes that way
    /// and the remaining floors and ceilings are flat.
    fn can_apply_alt(&self) -> bool {
        let alts = || self.north_alt.iter().chain(&self.south_alt);
        let all_west = self.east.is_empty() && alts().all(|c| c.collider_n.x < 0.0);
        let all_east = self.west.is_empty() && alts().all(|c| c.collider_n.x > 0.0);
        let flat = |s: &[Contact]| s.iter().all(|c| is_vertical_vec(c.collider_n));

        flat(&self.north) && flat(&self.south) && (all_west || all_east)
    }

    fn solve_axis(&mut self, a: &mut Vec<Contact>, b: &mut Vec<Contact>, picker: Picker) -> bool {
        let mut any_applied = false;

        while !a.is_empty() && !b.is_empty() {
            let mut r = picker(&a[0], &b[0], self.collidable.rect());

            if let Some((contact, kind)) = r.contact.take() {
                if self.apply(&contact, kind) {
                    any_applied = true;
                    if kind.is_crush() {
                        return true;
                    }
                }
                if !r.discard_first {
                    a[0] = self.refresh(a[0]);
                }
                if !r.discard_second {
                    b[0] = self.refresh(b[0]);
                }
                r.discard_first = !a[0].has_contact;
                r.discard_second = !b[0].has_contact;
            }

            if !r.discard_first && !r.discard_second {
                any_applied |= if a[0].separation < b[0].separation {
                    self.apply_then_update(a, b)
                } else {
                    self.apply_then_update(b, a)
                };
            } else {
                // drop the discarded fronts before an apply re-sorts either stack
                if r.discard_first {
                    a.remove(0);
                }
                if r.discard_second {
                    b.remove(0);
                }
                if !r.discard_first {
                    any_applied |= self.apply_then_update(a, b);
                } else if !r.discard_second {
                    any_applied |= self.apply_then_update(b, a);
                }
            }
        }

        any_applied |= self.apply_stack(a);
        any_applied |= self.apply_stack(b);
        any_applied
    }

    fn apply_then_update(&mut self, stack: &mut Vec<Contact>, other: &mut Vec<Contact>) -> bool {
        let applied = self.apply_first(stack);
        if applied {
            self.update_stack(stack);
            self.update_stack(other);
        }
        applied
    }

    fn apply_stack(&mut self, stack: &mut Vec<Contact>) -> bool {
        let mut any_applied = false;
        while !stack.is_empty() {
            if self.apply_first(stack) {
                any_applied = true;
                self.update_stack(stack);
            }
        }
        any_applied
    }

    fn apply_first(&mut self, stack: &mut Vec<Contact>) -> bool {
        let (first, rest) = take_first(std::mem::take(stack), self.collidable.rect().mid());
        *stack = rest;
        first.is_some_and(|c| {
            let kind = match c.kind {
                ContactType::Wedge => ContactType::Wedge,
                _ => ContactType::Single,
            };
            self.apply(&c, kind)
        })
    }

    /// Re-derives every candidate for the body's new position and re-sorts.
    fn update_stack(&mut self, stack: &mut [Contact]) {
        for c in stack.iter_mut() {
            *c = self.refresh(*c);
        }
        sort_stack(stack);
    }

    fn refresh(&mut self, contact: Contact) -> Contact {
        let Some(id) = contact.id else {
            return contact;
        };
        let regions = self.regions;
        let Some(region) = regions.get_region(id.region) else {
            return contact;
        };
        let Some(arbiter) = self.arbiters.get_mut(&id.region).and_then(|ra| ra.get_mut(id.quad)) else {
            return contact;
        };
        arbiter.update(CollisionContext { region, collidable: &*self.collidable }, 0.0);

        let mut fresh = *arbiter.contact();
        let steep = is_vertical_vec(fresh.ortho_n) && fresh.collider_n.x.abs() > fresh.collider_n.y.abs();
        if contact.is_transposed && steep {
            fresh.transpose();
        }
        fresh
    }

    fn apply(&mut self, contact: &Contact, kind: ContactType) -> bool {
        if !contact.has_contact {
            trace!(?kind, separation = contact.separation, "skipping contact without overlap");
            return false;
        }
        let precontact_velocity = self.collidable.vel();
        self.collidable.apply_contact(contact, kind);

        if let Some(id) = contact.id {
            let regions = self.regions;
            if let (Some(region), Some(arbiter)) = (
                regions.get_region(id.region),
                self.arbiters.get_mut(&id.region).and_then(|ra| ra.get_mut(id.quad)),
            ) {
                arbiter.set_applied_along(contact.ortho_n);
                arbiter.update(CollisionContext { region, collidable: &*self.collidable }, 0.0);
            }
        }

        trace!(
            ?kind,
            separation = contact.separation,
            ortho_n = ?contact.ortho_n,
            quad = ?contact.id.map(|id| id.quad),
            "applied contact"
        );
        if let Some(dir) = Cardinal::from_vec(contact.ortho_n) {
            self.frame.applied_count[dir.index()] += 1;
        }
        self.frame.contacts.push(AppliedContact {
            contact: *contact,
            kind,
            region: contact.id.map(|id| id.region),
            quad: contact.id.map(|id| id.quad),
            precontact_velocity,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quad::ColliderSurface;
    use crate::types::CollisionState;

    fn surf(p1: (f32, f32), p2: (f32, f32)) -> ColliderSurface {
        ColliderSurface::new(Line::new(Vec2::new(p1.0, p1.1), Vec2::new(p2.0, p2.1)))
    }

    fn contact(surface: ColliderSurface, ortho: Vec2, sep: f32) -> Contact {
        Contact {
            separation: sep,
            has_contact: sep > 0.0,
            ortho_n: ortho,
            collider_n: surface.surface.normal(),
            collider: surface,
            ..Default::default()
        }
    }

    const N: Vec2 = Vec2::new(0.0, -1.0);
    const S: Vec2 = Vec2::new(0.0, 1.0);
    const E: Vec2 = Vec2::new(1.0, 0.0);
    const W: Vec2 = Vec2::new(-1.0, 0.0);

    struct NoRegions;

    impl RegionSource for NoRegions {
        fn get_region(&self, _id: RegionId) -> Option<&dyn ColliderRegion> {
            None
        }
    }

    #[test]
    fn test_wall_under_floor_is_ghost() {
        // floor of one tile and the west wall of the tile right of it, just below
        let floor = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 2.0);
        let wall = contact(surf((16.0, 32.0), (16.0, 16.0)), W, 6.0);
        assert_eq!(is_ghost_edge(&floor, &wall), GhostEdge::Full);
        let r = compare(&floor, &wall);
        assert!(!r.discard_first);
        assert!(r.discard_second);
    }

    #[test]
    fn test_opposite_surfaces_are_ghosts() {
        let a = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 1.0);
        let b = contact(surf((16.0, 16.0), (0.0, 16.0)), S, 2.0);
        assert_ne!(is_ghost_edge(&a, &b), GhostEdge::None);
        // same classification both ways: the lesser contact survives
        let r = compare(&a, &b);
        assert!(!r.discard_first);
        assert!(r.discard_second);
    }

    #[test]
    fn test_collinear_floors_are_not_ghosts() {
        let a = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 1.0);
        let b = contact(surf((16.0, 16.0), (32.0, 16.0)), N, 1.0);
        assert_eq!(is_ghost_edge(&a, &b), GhostEdge::None);
        assert_eq!(is_ghost_edge(&b, &a), GhostEdge::None);
        let mut all = vec![a, b];
        compare_all(&mut all);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_uncommitted_one_way_hides_nothing() {
        let mut floor = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 2.0);
        floor.has_contact = false;
        let wall = contact(surf((16.0, 32.0), (16.0, 16.0)), W, 6.0);
        assert_eq!(is_ghost_edge(&floor, &wall), GhostEdge::None);
    }

    #[test]
    fn test_invalid_quad_discarded() {
        let mut a = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 1.0);
        a.quad_valid = false;
        let b = contact(surf((64.0, 16.0), (80.0, 16.0)), N, 1.0);
        let mut all = vec![a, b];
        compare_all(&mut all);
        assert_eq!(all, vec![b]);
    }

    #[test]
    fn test_pick_h_crush_midpoint() {
        let east = contact(surf((0.0, 0.0), (0.0, 16.0)), E, 6.0);
        let west = contact(surf((8.0, 16.0), (8.0, 0.0)), W, 2.0);
        let r = pick_h(&east, &west, Rect::new(0.0, 0.0, 8.0, 16.0));
        let (c, kind) = r.contact.unwrap();
        assert_eq!(kind, ContactType::CrushHorizontal);
        assert!((c.separation - 2.0).abs() < 1e-6);
        assert_eq!(c.ortho_n, E);
        assert!(r.discard_first && r.discard_second);
    }

    #[test]
    fn test_pick_h_diverging_discards_deep_side() {
        let east = contact(surf((0.0, 0.0), (0.0, 16.0)), E, 10.0);
        let west = contact(surf((8.0, 16.0), (8.0, 0.0)), W, -3.0);
        let r = pick_h(&east, &west, Rect::new(0.0, 0.0, 8.0, 16.0));
        assert!(r.discard_first);
        assert!(!r.discard_second);
        assert!(r.contact.is_none());
    }

    #[test]
    fn test_pick_v_crush() {
        let north = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 3.0);
        let south = contact(surf((16.0, 2.0), (0.0, 2.0)), S, 1.0);
        let r = pick_v(&north, &south, Rect::new(4.0, 2.0, 8.0, 16.0));
        let (c, kind) = r.contact.unwrap();
        assert_eq!(kind, ContactType::CrushVertical);
        assert_eq!(c.ortho_n, N);
        assert!((c.separation - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pick_v_prefers_contact() {
        let north = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 1.0);
        let south = contact(surf((16.0, -8.0), (0.0, -8.0)), S, -8.0);
        let r = pick_v(&north, &south, Rect::new(4.0, 1.0, 8.0, 16.0));
        assert!(!r.discard_first);
        assert!(r.discard_second);
    }

    #[test]
    fn test_wedge_pushes_toward_meeting_point() {
        // floor rising to the right meets a ceiling falling to the right
        let north = contact(surf((0.0, 32.0), (32.0, 0.0)), N, 2.0);
        let south = contact(surf((32.0, 0.0), (0.0, -32.0)), S, 2.0);
        let body = Rect::new(4.0, 8.0, 8.0, 16.0);
        let WedgeOutcome::Resolved(c) = detect_wedge(&north, &south, body) else {
            panic!("expected a wedge");
        };
        assert!(c.has_contact);
        assert_eq!(c.ortho_n, W);
        // floor y = 32 - x, shifted ceiling y = x - 16 meet at x = 24
        assert!((c.separation - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_wedge_is_applied_as_wedge() {
        let mut body = Collidable::new(Vec2::new(8.0, 24.0), Vec2::new(8.0, 16.0)).unwrap();
        body.set_vel(Vec2::new(-60.0, 0.0));
        let mut arbiters = BTreeMap::new();
        let mut solver = CollisionSolver::new(&mut body, &mut arbiters, &NoRegions);
        solver.add_contact(contact(surf((0.0, 32.0), (32.0, 0.0)), N, 2.0));
        solver.add_contact(contact(surf((32.0, 0.0), (0.0, -32.0)), S, 2.0));
        let frame = solver.solve();

        let wedge = frame.contacts.iter().find(|a| a.kind == ContactType::Wedge).expect("wedge was not applied");
        assert_eq!(wedge.contact.ortho_n, W);
        assert_eq!(wedge.precontact_velocity, Vec2::new(-60.0, 0.0));

        // static surfaces: the wedge hands the body a zero surface velocity
        body.set_frame(frame);
        assert!(body.has_state(CollisionState::WEDGE));
        assert_eq!(body.vel(), Vec2::ZERO);
    }

    #[test]
    fn test_discard_skips_stale_front_after_resort() {
        let mut body = Collidable::new(Vec2::new(4.0, 16.0), Vec2::new(8.0, 16.0)).unwrap();
        let mut arbiters = BTreeMap::new();
        let mut solver = CollisionSolver::new(&mut body, &mut arbiters, &NoRegions);

        // the deep west candidate sits in front until the east apply re-sorts the stack
        let mut east = vec![contact(surf((0.0, 0.0), (0.0, 16.0)), E, 2.0)];
        let mut west = vec![
            contact(surf((8.0, 16.0), (8.0, 0.0)), W, 9.0),
            contact(surf((8.0, 16.0), (8.0, 0.0)), W, 1.0),
        ];
        assert!(solver.solve_axis(&mut east, &mut west, pick_h));

        let applied: Vec<_> =
            solver.frame.contacts.iter().map(|a| (a.contact.ortho_n, a.contact.separation)).collect();
        assert_eq!(applied, vec![(E, 2.0), (W, 1.0)]);
    }

    #[test]
    fn test_parallel_wedge_is_unresolved() {
        let north = contact(surf((0.0, 32.0), (32.0, 0.0)), N, 2.0);
        let mut south = contact(surf((32.0, -10.0), (0.0, 22.0)), S, 2.0);
        // force the pair to look squeezing but not crushing
        south.collider_n = Vec2::new(0.6, 0.8);
        let body = Rect::new(4.0, 8.0, 8.0, 16.0);
        assert_eq!(detect_wedge(&north, &south, body), WedgeOutcome::Unresolved);
    }

    #[test]
    fn test_take_first_prefers_centered_tie() {
        let mut a = contact(surf((0.0, 16.0), (16.0, 16.0)), N, 1.0);
        a.position = Vec2::new(2.0, 16.0);
        let mut b = a;
        b.position = Vec2::new(9.0, 16.0);
        let mut c = a;
        c.separation = 3.0;
        c.position = Vec2::new(8.0, 16.0);

        let (first, rest) = take_first(vec![a, b, c], Vec2::new(8.0, 8.0));
        assert_eq!(first.unwrap().position.x, 9.0);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].position.x, 2.0);

        let (none, empty) = take_first(Vec::new(), Vec2::ZERO);
        assert!(none.is_none() && empty.is_empty());
    }
}

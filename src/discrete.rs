use glam::Vec2;
use tracing::error;

use crate::api::ColliderRegion;
use crate::collidable::Collidable;
use crate::geom::{Cardinal, Line, Ordinal, Rect, TILESIZE};
use crate::quad::{ColliderQuad, ColliderSurface};
use crate::types::{Contact, ContactId, Slip, SlipState};

/// Horizontal distance from a valley joint inside which the joint is flattened.
pub const VALLEY_FLATTEN_THRESH: f32 = 0.25;

/// Borrowed view of the pair being tested.
#[derive(Copy, Clone)]
pub struct CollisionContext<'a> {
    pub region: &'a dyn ColliderRegion,
    pub collidable: &'a Collidable,
}

/// Which instant of the tick a discrete test describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameTime {
    Prev,
    Curr,
}

#[derive(Copy, Clone, Debug)]
struct AxisPreStep {
    dir: Cardinal,
    surface: ColliderSurface,
    is_real: bool,
    is_valid: bool,
    /// Quad slot backing the axis, `None` for bounding-box fallbacks.
    quad_index: Option<Cardinal>,
}

impl AxisPreStep {
    fn fallback(line: Line, dir: Cardinal) -> Self {
        Self {
            dir,
            surface: ColliderSurface { surface: line, ..Default::default() },
            is_real: false,
            is_valid: false,
            quad_index: None,
        }
    }
}

/// One cardinal candidate contact of a (body, quad) pair.
#[derive(Copy, Clone, Debug)]
pub struct CollisionAxis {
    pub contact: Contact,
    pub quad_index: Option<Cardinal>,
    pub dir: Cardinal,
    /// Cleared when the whole axis is rejected (e.g. one-way from the wrong side).
    pub axis_valid: bool,
    /// Resolution was already applied along this axis this tick.
    pub applied: bool,
    pub separation_offset: f32,
    collider_valid: bool,
    collider_real: bool,
}

impl CollisionAxis {
    fn new(pre: &AxisPreStep) -> Self {
        Self {
            contact: Contact { collider: pre.surface, ..Default::default() },
            quad_index: pre.quad_index,
            dir: pre.dir,
            axis_valid: true,
            applied: false,
            separation_offset: 0.0,
            collider_valid: pre.is_valid,
            collider_real: pre.is_real,
        }
    }

    /// May be chosen as the resolving axis.
    #[inline]
    pub fn is_collider_valid(&self) -> bool {
        self.collider_valid
    }

    /// Backed by a quad surface rather than generated.
    #[inline]
    pub fn is_collider_real(&self) -> bool {
        self.collider_real
    }

    #[inline]
    pub fn is_intersecting(&self) -> bool {
        if self.collider_valid {
            self.contact.separation > 0.0
        } else {
            self.contact.separation >= 0.0
        }
    }
}

/// Clamp that tolerates reversed bounds.
fn clamp(v: f32, a: f32, b: f32) -> f32 {
    v.max(a.min(b)).min(a.max(b))
}

/// Separating-axis contact of one body against one quad at one instant.
#[derive(Clone, Debug)]
pub struct CollisionDiscrete {
    id: Option<ContactId>,
    frame: FrameTime,
    quad: ColliderQuad,
    contact: Contact,
    chosen_axis: Option<usize>,

    t_area: Rect,
    t_mid: Vec2,
    t_half: Vec2,

    c_box: Rect,
    c_prev: Rect,
    c_mid: Vec2,
    c_half: Vec2,
    c_vel: Vec2,
    c_slip: Slip,
    collider_deltap: Vec2,

    valleys: [bool; 4],
    axes: Vec<CollisionAxis>,
}

impl CollisionDiscrete {
    /// `quad` is given in region-local space.
    pub fn new(ctx: CollisionContext<'_>, quad: ColliderQuad, id: Option<ContactId>, frame: FrameTime) -> Self {
        let mut discrete = Self {
            id,
            frame,
            quad,
            contact: Contact::default(),
            chosen_axis: None,
            t_area: Rect::default(),
            t_mid: Vec2::ZERO,
            t_half: Vec2::ZERO,
            c_box: Rect::default(),
            c_prev: Rect::default(),
            c_mid: Vec2::ZERO,
            c_half: Vec2::ZERO,
            c_vel: Vec2::ZERO,
            c_slip: Slip::default(),
            collider_deltap: Vec2::ZERO,
            valleys: [false; 4],
            axes: Vec::with_capacity(5),
        };
        discrete.reset(ctx, quad, frame);
        discrete
    }

    /// Rebuilds every axis for `quad` at the given instant.
    pub fn reset(&mut self, ctx: CollisionContext<'_>, quad: ColliderQuad, frame: FrameTime) {
        self.frame = frame;
        self.valleys = [false; 4];
        self.contact = Contact { id: self.id, ..Default::default() };

        self.collider_deltap = match frame {
            FrameTime::Curr => ctx.region.delta_position(),
            FrameTime::Prev => Vec2::ZERO,
        };
        let offset = match frame {
            FrameTime::Prev => ctx.region.prev_position(),
            FrameTime::Curr => ctx.region.position(),
        };
        self.quad = quad.translated(offset);

        let mut area = self.quad.bounds();
        if area.height == 0.0 {
            if self.quad.is_one_way(Cardinal::N) || self.quad.is_boundary(Cardinal::N) {
                area.height = TILESIZE;
            } else if self.quad.is_one_way(Cardinal::S) || self.quad.is_boundary(Cardinal::S) {
                area.top -= TILESIZE;
                area.height = TILESIZE;
            }
        } else if area.width == 0.0 {
            if self.quad.is_one_way(Cardinal::W) || self.quad.is_boundary(Cardinal::W) {
                area.width = TILESIZE;
            } else if self.quad.is_one_way(Cardinal::E) || self.quad.is_boundary(Cardinal::E) {
                area.left -= TILESIZE;
                area.width = TILESIZE;
            }
        }
        debug_assert!(area.width > 0.0 && area.height > 0.0, "degenerate tile area {area:?}");

        self.t_area = area;
        self.t_mid = area.mid();
        self.t_half = area.size() * 0.5;

        self.init_collidable_data(ctx.collidable);
        self.create_axes();
        self.update_contact(ctx.collidable);
    }

    /// Relabels this as the previous-frame test (used when reusing last tick's result).
    pub fn set_previous(&mut self) {
        self.frame = FrameTime::Prev;
    }

    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn axes(&self) -> &[CollisionAxis] {
        &self.axes
    }

    pub fn axis(&self, ndx: usize) -> Option<&CollisionAxis> {
        self.axes.get(ndx)
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn chosen_axis(&self) -> Option<usize> {
        self.chosen_axis
    }

    /// World-space bounds of the tested tile.
    pub fn tile_area(&self) -> Rect {
        self.t_area
    }

    pub fn set_axis_applied(&mut self, ortho_n: Vec2) {
        for axis in self.axes.iter_mut().filter(|a| a.contact.ortho_n == ortho_n) {
            axis.applied = true;
        }
    }

    fn init_collidable_data(&mut self, body: &Collidable) {
        match self.frame {
            FrameTime::Curr => {
                self.c_box = body.rect();
                self.c_vel = body.vel();
            }
            FrameTime::Prev => {
                self.c_box = body.prev_rect();
                self.c_vel = Vec2::ZERO;
            }
        }
        self.c_prev = body.prev_rect();
        self.c_mid = self.c_box.mid();
        self.c_half = self.c_box.size() * 0.5;
        self.c_slip = body.slip();
    }

    fn create_axes(&mut self) {
        self.axes.clear();

        let (mut has_floor, mut has_ceil) = (false, false);
        let (mut has_east, mut has_west) = (false, false);
        let (mut has_east_corner, mut has_west_corner) = (false, false);
        let mut verticals: Vec<AxisPreStep> = Vec::with_capacity(4);
        let mut non_verticals: Vec<AxisPreStep> = Vec::with_capacity(4);

        for slot in Cardinal::ALL {
            let Some(surf) = self.quad.surface(slot).copied() else {
                continue;
            };
            let s = surf.surface;
            let v = s.vector();
            debug_assert!(v != Vec2::ZERO, "zero-length surface");

            let real = |dir| AxisPreStep { dir, surface: surf, is_real: true, is_valid: true, quad_index: Some(slot) };
            let corner = |dir, point: Vec2, g0: Vec2, g3: Vec2| AxisPreStep {
                dir,
                surface: ColliderSurface { surface: Line::new(point, point), ghostp0: g0, ghostp3: g3, ..surf },
                is_real: false,
                is_valid: true,
                quad_index: Some(slot),
            };

            if v.x == 0.0 {
                if v.y > 0.0 {
                    has_east = true;
                    verticals.push(real(Cardinal::E));
                } else {
                    has_west = true;
                    verticals.push(real(Cardinal::W));
                }
            } else if v.x > 0.0 {
                has_floor = true;
                non_verticals.push(real(Cardinal::N));

                if !has_east_corner && surf.ghostp3.x <= s.p2.x && surf.ghostp3.y >= s.p2.y {
                    has_east_corner = true;
                    verticals.push(corner(Cardinal::E, s.p2, s.p1, surf.ghostp3));
                }
                if !has_west_corner && surf.ghostp0.x >= s.p1.x && surf.ghostp0.y >= s.p1.y {
                    has_west_corner = true;
                    verticals.push(corner(Cardinal::W, s.p1, surf.ghostp0, s.p2));
                }
            } else {
                has_ceil = true;
                non_verticals.push(real(Cardinal::S));

                if !has_east_corner && surf.ghostp0.x <= s.p1.x && surf.ghostp0.y <= s.p1.y {
                    has_east_corner = true;
                    verticals.push(corner(Cardinal::E, s.p1, surf.ghostp0, s.p2));
                }
                if !has_west_corner && surf.ghostp3.x >= s.p2.x && surf.ghostp3.y <= s.p2.y {
                    has_west_corner = true;
                    verticals.push(corner(Cardinal::W, s.p2, s.p1, surf.ghostp3));
                }
            }
        }

        // bounding box fallbacks only test intersection
        let a = self.t_area;
        if !has_floor {
            non_verticals.push(AxisPreStep::fallback(Line::new(a.topleft(), a.topright()), Cardinal::N));
        }
        if !has_ceil {
            non_verticals.push(AxisPreStep::fallback(Line::new(a.botright(), a.botleft()), Cardinal::S));
        }
        if !has_east && !has_east_corner {
            verticals.push(AxisPreStep::fallback(Line::new(a.topright(), a.botright()), Cardinal::E));
        }
        if !has_west && !has_west_corner {
            verticals.push(AxisPreStep::fallback(Line::new(a.botleft(), a.topleft()), Cardinal::W));
        }

        non_verticals.sort_by_key(|p| p.dir);
        verticals.sort_by_key(|p| p.dir);

        for pre in &non_verticals {
            let axis = match pre.dir {
                Cardinal::N => self.create_floor(pre),
                Cardinal::S => self.create_ceil(pre),
                _ => continue,
            };
            self.axes.push(axis);
        }
        for pre in &verticals {
            let (has, has_corner) = match pre.dir {
                Cardinal::E => (has_east, has_east_corner),
                Cardinal::W => (has_west, has_west_corner),
                _ => continue,
            };
            if (has && has_corner && pre.is_real) || !has || !has_corner {
                let axis = self.create_wall(pre);
                self.axes.push(axis);
            }
        }
    }

    fn create_floor(&self, pre: &AxisPreStep) -> CollisionAxis {
        let mut axis = CollisionAxis::new(pre);
        axis.contact.id = self.id;
        axis.contact.ortho_n = Vec2::new(0.0, -1.0);
        axis.contact.collider_n = Vec2::new(0.0, -1.0);
        axis.contact.material = self.quad.surface_material(Cardinal::N);

        // one-way floors only collide when the body was above them
        if self.frame == FrameTime::Curr && self.quad.is_one_way(Cardinal::N) {
            let cp_mid = self.c_prev.mid();
            let cp_half = self.c_prev.size() * 0.5;
            let collider = axis.contact.collider;
            let dpx = self.collider_deltap.x;

            let (line, valid_ghost) = if cp_mid.x < collider.surface.p1.x - dpx {
                (collider.ghost_prev(), !collider.g0virtual)
            } else if cp_mid.x > collider.surface.p2.x - dpx {
                (collider.ghost_next(), !collider.g3virtual)
            } else {
                (collider.surface, true)
            };
            let line = line.shift(-self.collider_deltap);
            let slipv = if self.c_slip.state == SlipState::SlipVertical && self.c_vel.y >= 0.0 {
                self.c_slip.leeway
            } else {
                0.0
            };
            axis.axis_valid = !line.is_vertical()
                && (valid_ghost || slipv != 0.0)
                && line.y_for_x(cp_mid.x) >= cp_mid.y + cp_half.y - slipv;
        }
        axis
    }

    fn create_ceil(&self, pre: &AxisPreStep) -> CollisionAxis {
        let mut axis = CollisionAxis::new(pre);
        axis.contact.id = self.id;
        axis.contact.ortho_n = Vec2::new(0.0, 1.0);
        axis.contact.collider_n = Vec2::new(0.0, 1.0);
        axis.contact.material = self.quad.surface_material(Cardinal::S);

        if self.frame == FrameTime::Curr && self.quad.is_one_way(Cardinal::S) {
            let cp_mid = self.c_prev.mid();
            let cp_half = self.c_prev.size() * 0.5;
            let collider = axis.contact.collider;
            let dpx = self.collider_deltap.x;

            let (line, valid_ghost) = if cp_mid.x < collider.surface.p2.x - dpx {
                (collider.ghost_next(), !collider.g3virtual)
            } else if cp_mid.x > collider.surface.p1.x - dpx {
                (collider.ghost_prev(), !collider.g0virtual)
            } else {
                (collider.surface, true)
            };
            let line = line.shift(-self.collider_deltap);
            let slipv = if self.c_slip.state == SlipState::SlipVertical && self.c_vel.y <= 0.0 {
                self.c_slip.leeway
            } else {
                0.0
            };
            axis.axis_valid = !line.is_vertical()
                && (valid_ghost || slipv != 0.0)
                && line.y_for_x(cp_mid.x) <= cp_mid.y - cp_half.y + slipv;
        }
        axis
    }

    fn create_wall(&mut self, pre: &AxisPreStep) -> CollisionAxis {
        let dir = pre.dir;
        let mut axis = CollisionAxis::new(pre);
        axis.contact.id = self.id;
        axis.contact.ortho_n = dir.to_vec();
        axis.contact.collider_n = dir.to_vec();
        axis.contact.material = self.quad.surface_material(dir);

        let p_mid = self.c_prev.mid() + self.collider_deltap;
        let extend = wall_can_extend(
            &axis,
            &self.quad,
            dir,
            p_mid,
            self.c_mid,
            self.t_mid,
            self.t_half,
            self.frame == FrameTime::Prev,
        );
        let has_valley = wall_has_valley(&axis, &self.axes, dir, &mut self.valleys);

        if self.frame == FrameTime::Curr && self.quad.is_one_way(dir) {
            let slipping = self.c_slip.state == SlipState::SlipHorizontal;
            axis.axis_valid = match dir {
                Cardinal::E => {
                    let sliph = if slipping && self.c_vel.x <= 0.0 { self.c_slip.leeway } else { 0.0 };
                    self.c_prev.left >= self.t_area.right() - sliph
                }
                _ => {
                    let sliph = if slipping && self.c_vel.x >= 0.0 { self.c_slip.leeway } else { 0.0 };
                    self.c_prev.right() <= self.t_area.left + sliph
                }
            };
        }

        axis.separation_offset = (if extend { self.c_half.x } else { 0.0 })
            + (if has_valley { VALLEY_FLATTEN_THRESH } else { 0.0 });
        axis
    }

    /// Recomputes separations for the body's current box and re-picks the contact.
    pub fn update_contact(&mut self, body: &Collidable) {
        self.init_collidable_data(body);

        let area = self.t_area;
        let (c_mid, c_half, c_prev, deltap) = (self.c_mid, self.c_half, self.c_prev, self.collider_deltap);

        for axis in &mut self.axes {
            let surface = axis.contact.collider.surface;
            let backed = axis.quad_index.is_some_and(|slot| self.quad.surface(slot).is_some());
            let clamped_x = clamp(c_mid.x, area.left, area.right());

            match axis.dir {
                Cardinal::N => {
                    let mut y = area.top;
                    if !surface.is_horizontal() {
                        y = surface.y_for_x(c_mid.x);
                        axis.contact.collider_n = surface.normal();
                        if c_prev.bottom() <= area.top - deltap.y && y <= area.top && backed && clamped_x != c_mid.x {
                            let collider = axis.contact.collider;
                            if c_mid.x > area.right() && collider.ghost_next().p2.y >= area.top {
                                axis.contact.collider_n = Vec2::new(0.0, -1.0);
                            } else if c_mid.x < area.left && collider.ghost_prev().p1.y >= area.top {
                                axis.contact.collider_n = Vec2::new(0.0, -1.0);
                            }
                            y = area.top;
                        }
                    }
                    axis.contact.separation = -y + (c_mid.y + c_half.y);
                    axis.contact.position = Vec2::new(clamped_x, y);
                }
                Cardinal::S => {
                    let mut y = area.bottom();
                    if !surface.is_horizontal() {
                        y = surface.y_for_x(c_mid.x);
                        axis.contact.collider_n = surface.normal();
                        if c_prev.top >= area.bottom() - deltap.y && y >= area.bottom() && backed && clamped_x != c_mid.x {
                            let collider = axis.contact.collider;
                            if c_mid.x > area.right() && collider.ghost_prev().p1.y <= area.top {
                                axis.contact.collider_n = Vec2::new(0.0, 1.0);
                            } else if c_mid.x < area.left && collider.ghost_next().p2.y <= area.top {
                                axis.contact.collider_n = Vec2::new(0.0, 1.0);
                            }
                            y = area.bottom();
                        }
                    }
                    axis.contact.separation = y - (c_mid.y - c_half.y);
                    axis.contact.position = Vec2::new(clamped_x, y);
                }
                Cardinal::E => {
                    axis.contact.separation = area.right() - c_mid.x + axis.separation_offset;
                    axis.contact.position = Vec2::new(area.right(), clamp(c_mid.y, surface.p1.y, surface.p2.y));
                }
                Cardinal::W => {
                    axis.contact.separation = c_mid.x - area.left + axis.separation_offset;
                    axis.contact.position = Vec2::new(area.left, clamp(c_mid.y, surface.p2.y, surface.p1.y));
                }
            }
        }

        self.eval_contact();
    }

    fn eval_contact(&mut self) {
        let area = self.t_area;
        let (c_mid, c_half) = (self.c_mid, self.c_half);
        let valleys = self.valleys;

        let mut has_contact = true;
        let mut no_contact_count = 0;
        self.chosen_axis = None;

        for axis in &mut self.axes {
            let s = axis.contact.collider.surface;
            match axis.dir {
                Cardinal::N => {
                    let (ne, nw) = (valleys[Ordinal::NE.index()], valleys[Ordinal::NW.index()]);
                    if (ne && c_mid.x > area.right() - VALLEY_FLATTEN_THRESH)
                        || (nw && c_mid.x < area.left + VALLEY_FLATTEN_THRESH)
                    {
                        axis.contact.collider_n = axis.contact.ortho_n;
                        let n_sep = -s.p1.y.max(s.p2.y) + (c_mid.y + c_half.y);
                        axis.contact.separation = axis.contact.separation.max(n_sep);
                    }
                    axis.contact.has_valley = ne || nw;
                }
                Cardinal::S => {
                    let (se, sw) = (valleys[Ordinal::SE.index()], valleys[Ordinal::SW.index()]);
                    if (se && c_mid.x > area.right() - VALLEY_FLATTEN_THRESH)
                        || (sw && c_mid.x < area.left + VALLEY_FLATTEN_THRESH)
                    {
                        axis.contact.collider_n = axis.contact.ortho_n;
                        let n_sep = s.p1.y.min(s.p2.y) - (c_mid.y - c_half.y);
                        axis.contact.separation = axis.contact.separation.max(n_sep);
                    }
                    axis.contact.has_valley = se || sw;
                }
                _ => {}
            }
            axis.contact.has_contact = axis.axis_valid && axis.is_intersecting();
            if !axis.contact.has_contact {
                no_contact_count += 1;
            }
            has_contact &= axis.contact.has_contact;
        }

        let mut best: Option<usize> = None;
        let mut second: Option<usize> = None;
        let mut oneway: Option<usize> = None;
        for (i, axis) in self.axes.iter().enumerate() {
            if no_contact_count == 0 {
                let better = best.is_none_or(|b| axis.contact.separation < self.axes[b].contact.separation);
                if axis.is_collider_valid() && better {
                    best = Some(i);
                }
            } else if no_contact_count == 1 {
                if axis.is_collider_valid() && !axis.is_intersecting() {
                    second = Some(i);
                }
                if self.quad.is_one_way(axis.dir) {
                    oneway = Some(i);
                }
            }
        }

        if let Some(b) = best {
            if self.axes[b].contact.separation == f32::MAX {
                error!(axis = b, "discrete contact picked an unbounded separation");
                has_contact = false;
            }
        }

        self.chosen_axis = best;
        self.contact = match (best, second, oneway) {
            (Some(i), _, _) | (None, Some(i), _) | (None, None, Some(i)) => self.axes[i].contact,
            _ => Contact::default(),
        };
        self.contact.has_contact = has_contact;
        self.contact.id = self.id;
    }
}

/// Whether a wall's separation should reach the far side of the body, so a
/// body whose center already passed the wall is still pushed back out.
#[allow(clippy::too_many_arguments)]
fn wall_can_extend(
    axis: &CollisionAxis,
    quad: &ColliderQuad,
    dir: Cardinal,
    p_mid: Vec2,
    c_mid: Vec2,
    t_mid: Vec2,
    t_half: Vec2,
    collide_previous: bool,
) -> bool {
    if matches!(dir, Cardinal::N | Cardinal::S) {
        return false;
    }
    let north = quad.surface(Cardinal::N);
    let south = quad.surface(Cardinal::S);
    let mut extend = axis.is_collider_valid();

    if !extend && (quad.is_one_way(Cardinal::N) || quad.is_one_way(Cardinal::S)) {
        // a one-way that does not connect onward on this side acts as a wall edge
        extend = match dir {
            Cardinal::E => north.is_some_and(|n| n.g3virtual) || south.is_some_and(|s| s.g0virtual),
            _ => north.is_some_and(|n| n.g0virtual) || south.is_some_and(|s| s.g3virtual),
        };
    } else if !collide_previous && extend {
        let (right, left) = (t_mid.x + t_half.x, t_mid.x - t_half.x);
        let passing = match dir {
            Cardinal::E => p_mid.x <= right && c_mid.x > right,
            _ => p_mid.x >= left && c_mid.x < left,
        };

        // the floor or ceiling continues past the wall on the crossing frame
        let continues = |line: Line, next: Line, still_passing: bool| {
            !next.is_vertical() && still_passing && (next.p1.x < next.p2.x) == (line.p1.x < line.p2.x)
        };

        let prev_above = passing
            && p_mid.y < t_mid.y
            && north.is_some_and(|n| {
                let next = if dir == Cardinal::E { n.ghost_next() } else { n.ghost_prev() };
                let still = if dir == Cardinal::E { n.surface.p2.x == right } else { n.surface.p1.x == left };
                continues(n.surface, next, still)
            });
        let prev_below = passing
            && p_mid.y > t_mid.y
            && south.is_some_and(|s| {
                let next = if dir == Cardinal::W { s.ghost_next() } else { s.ghost_prev() };
                let still = if dir == Cardinal::E { s.surface.p1.x == right } else { s.surface.p2.x == left };
                continues(s.surface, next, still)
            });

        if prev_above || prev_below {
            extend = false;
        }
    }
    extend
}

/// Flags concave joints next to a fallback wall. Returns true when the wall
/// borders at least one valley.
fn wall_has_valley(axis: &CollisionAxis, existing: &[CollisionAxis], dir: Cardinal, valleys: &mut [bool; 4]) -> bool {
    if matches!(dir, Cardinal::N | Cardinal::S) || axis.is_collider_valid() {
        return false;
    }
    let mut has_valley = false;
    for other in existing.iter().filter(|a| a.is_collider_real()) {
        let Some(ord) = Ordinal::combine(other.dir, dir) else {
            continue;
        };
        let surf = &other.contact.collider;
        let (p1, p2) = (surf.surface.p1, surf.surface.p2);
        let concave = match ord {
            Ordinal::NW => p1.y > surf.ghostp0.y && p1.y > p2.y,
            Ordinal::NE => p2.y > surf.ghostp3.y && p2.y > p1.y,
            Ordinal::SE => p1.y < surf.ghostp0.y && p1.y < p2.y,
            Ordinal::SW => p2.y < surf.ghostp3.y && p2.y < p1.y,
        };
        if concave {
            valleys[ord.index()] = true;
            has_valley = true;
        }
    }
    has_valley
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TileShape;
    use crate::tilemap::ColliderTileMap;

    fn map_with(tiles: &[((i32, i32), &str)]) -> ColliderTileMap {
        let mut map = ColliderTileMap::new(8, 8, false).unwrap();
        for (at, s) in tiles {
            map.set_tile(*at, s.parse::<TileShape>().unwrap());
        }
        map.apply_changes();
        map
    }

    /// Body whose previous box is `prev` and current box is `curr` (bottom-center positions).
    fn body(prev: Vec2, curr: Vec2, size: Vec2) -> Collidable {
        let mut b = Collidable::new(prev, size).unwrap();
        b.set_position(curr, true);
        b
    }

    fn discrete(map: &ColliderTileMap, at: (i32, i32), b: &Collidable) -> CollisionDiscrete {
        let quad = *map.quad_at(at).unwrap();
        let ctx = CollisionContext { region: map, collidable: b };
        CollisionDiscrete::new(ctx, quad, None, FrameTime::Curr)
    }

    #[test]
    fn test_solid_tile_builds_four_axes() {
        let map = map_with(&[((1, 1), "solid")]);
        let b = body(Vec2::new(24.0, 10.0), Vec2::new(24.0, 20.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        let dirs: Vec<_> = d.axes().iter().map(|a| a.dir).collect();
        assert_eq!(dirs, vec![Cardinal::N, Cardinal::S, Cardinal::E, Cardinal::W]);
        assert!(d.axes().iter().all(|a| a.is_collider_valid() && a.is_collider_real()));
    }

    #[test]
    fn test_landing_on_floor_picks_north() {
        let map = map_with(&[((1, 1), "solid")]);
        // bottom sinks 4 below the tile top at y = 16
        let b = body(Vec2::new(24.0, 12.0), Vec2::new(24.0, 20.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        let c = d.contact();
        assert!(c.has_contact);
        assert_eq!(c.ortho_n, Vec2::new(0.0, -1.0));
        assert!((c.separation - 4.0).abs() < 1e-4);
        assert_eq!(c.position, Vec2::new(24.0, 16.0));
        assert_eq!(d.chosen_axis(), Some(0));
    }

    #[test]
    fn test_separated_body_has_no_contact() {
        let map = map_with(&[((1, 1), "solid")]);
        let b = body(Vec2::new(24.0, 0.0), Vec2::new(24.0, 4.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        assert!(!d.contact().has_contact);
        // only the north axis is apart, so it is reported as the touch candidate
        assert_eq!(d.contact().ortho_n, Vec2::new(0.0, -1.0));
        assert!((d.contact().separation + 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_surfaces_get_fallback_axes() {
        let map = map_with(&[((1, 1), "oneway")]);
        let b = body(Vec2::new(24.0, 12.0), Vec2::new(24.0, 20.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        assert_eq!(d.axis_count(), 4);
        let fallbacks = d.axes().iter().filter(|a| !a.is_collider_valid()).count();
        assert_eq!(fallbacks, 3);
        assert!(d.contact().has_contact);
    }

    #[test]
    fn test_oneway_rejects_body_from_below() {
        let map = map_with(&[((1, 1), "oneway")]);
        let b = body(Vec2::new(24.0, 30.0), Vec2::new(24.0, 20.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        assert!(!d.axes()[0].axis_valid);
        assert!(!d.contact().has_contact);
    }

    #[test]
    fn test_slope_separation_follows_surface() {
        let map = map_with(&[((1, 1), "slope")]);
        // slope rises from (16,32) to (32,16); at x = 24 the surface is at y = 24
        let b = body(Vec2::new(24.0, 20.0), Vec2::new(24.0, 26.0), Vec2::new(4.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        let c = d.contact();
        assert!(c.has_contact);
        assert_eq!(c.ortho_n, Vec2::new(0.0, -1.0));
        assert!((c.separation - 2.0).abs() < 1e-4);
        // solid side is below-right, so the normal points up-left
        let n = Vec2::new(-1.0, -1.0).normalize();
        assert!((c.collider_n - n).length() < 1e-4);
    }

    #[test]
    fn test_slope_has_west_corner_axis() {
        let map = map_with(&[((1, 1), "slope")]);
        let b = body(Vec2::new(24.0, 20.0), Vec2::new(24.0, 26.0), Vec2::new(4.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        // floor, ceiling, east wall and the generated west corner
        let corner = d.axes().iter().find(|a| a.dir == Cardinal::W).unwrap();
        assert!(corner.is_collider_valid());
        assert!(!corner.is_collider_real());
        assert_eq!(corner.contact.collider.surface.p1, Vec2::new(16.0, 32.0));
    }

    #[test]
    fn test_wall_extends_to_far_side() {
        let map = map_with(&[((1, 1), "solid")]);
        // body slides into the west face from the left
        let b = body(Vec2::new(10.0, 30.0), Vec2::new(14.0, 30.0), Vec2::new(8.0, 8.0));
        let d = discrete(&map, (1, 1), &b);
        let c = d.contact();
        assert!(c.has_contact);
        assert_eq!(c.ortho_n, Vec2::new(-1.0, 0.0));
        // right edge at 18, wall at 16
        assert!((c.separation - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_axis_applied_marks_matching_ortho() {
        let map = map_with(&[((1, 1), "solid")]);
        let b = body(Vec2::new(24.0, 12.0), Vec2::new(24.0, 20.0), Vec2::new(8.0, 8.0));
        let mut d = discrete(&map, (1, 1), &b);
        d.set_axis_applied(Vec2::new(0.0, -1.0));
        assert!(d.axes()[0].applied);
        assert!(d.axes()[1..].iter().all(|a| !a.applied));
    }
}

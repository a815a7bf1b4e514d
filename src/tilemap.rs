use std::any::Any;
use std::collections::VecDeque;

use glam::Vec2;
use tracing::debug;

use crate::api::ColliderRegion;
use crate::error::CollisionError;
use crate::geom::{Cardinal, Line, Rect, TILESIZE, wrap_angle};
use crate::narrowphase::{RaycastHit, compare_hits, raycast_quad};
use crate::quad::{ColliderQuad, ColliderSurface, TileMaterial};
use crate::shape::{TileShape, TileShapeKind};
use crate::types::{AppliedContact, Contact, QuadId};

/// Authoritative data for one grid cell; the quad is derived from it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TileTable {
    pub shape: TileShape,
    pub material: Option<TileMaterial>,
    pub mat_facing: Cardinal,
}

impl TileTable {
    fn to_quad(&self, position: (i32, i32), id: QuadId) -> ColliderQuad {
        let mut quad = self.shape.to_quad(position, id);
        quad.material = self.material;
        quad.mat_facing = self.mat_facing;
        quad
    }
}

#[derive(Copy, Clone, Debug)]
enum Edit {
    Set((i32, i32), TileTable),
    Remove((i32, i32)),
}

pub type PrecontactFn = Box<dyn Fn((i32, i32), &Contact, f32) -> bool>;
pub type PostcontactFn = Box<dyn Fn((i32, i32), &AppliedContact)>;

/// Integer tile range `[left, left + width) x [top, top + height)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileArea {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Grid of collision quads built from tile edits.
///
/// Edits are queued by [`set_tile`](Self::set_tile) and
/// [`remove_tile`](Self::remove_tile) and only reach the quads on
/// [`apply_changes`](Self::apply_changes), so seam stitching always sees the
/// final neighbourhood of a batch.
pub struct ColliderTileMap {
    size: (i32, i32),
    has_border: bool,
    size_min: (i32, i32),
    size_max: (i32, i32),
    tiles: Vec<Option<TileTable>>,
    quads: Vec<ColliderQuad>,
    edits: VecDeque<Edit>,
    position: Vec2,
    prev_position: Vec2,
    velocity: Vec2,
    on_precontact: Option<PrecontactFn>,
    on_postcontact: Option<PostcontactFn>,
}

impl std::fmt::Debug for ColliderTileMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColliderTileMap")
            .field("size", &self.size)
            .field("has_border", &self.has_border)
            .field("position", &self.position)
            .field("pending_edits", &self.edits.len())
            .finish_non_exhaustive()
    }
}

impl ColliderTileMap {
    pub fn new(width: i32, height: i32, border: bool) -> Result<Self, CollisionError> {
        if width <= 0 || height <= 0 {
            return Err(CollisionError::InvalidGridSize { width, height });
        }
        let (size_min, size_max) = if border {
            ((-1, -1), (width + 1, height + 1))
        } else {
            ((0, 0), (width, height))
        };
        let count = ((size_max.0 - size_min.0) * (size_max.1 - size_min.1)) as usize;
        let mut map = Self {
            size: (width, height),
            has_border: border,
            size_min,
            size_max,
            tiles: vec![None; count],
            quads: Vec::new(),
            edits: VecDeque::new(),
            position: Vec2::ZERO,
            prev_position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            on_precontact: None,
            on_postcontact: None,
        };
        map.reset_quads();
        Ok(map)
    }

    fn reset_quads(&mut self) {
        self.quads = (0..self.tiles.len())
            .map(|i| ColliderQuad { id: QuadId(i as u32), ..Default::default() })
            .collect();
    }

    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    pub fn has_border(&self) -> bool {
        self.has_border
    }

    fn stride(&self) -> i32 {
        self.size_max.0 - self.size_min.0
    }

    fn index(&self, at: (i32, i32)) -> Option<usize> {
        let in_x = at.0 >= self.size_min.0 && at.0 < self.size_max.0;
        let in_y = at.1 >= self.size_min.1 && at.1 < self.size_max.1;
        (in_x && in_y)
            .then(|| ((at.0 - self.size_min.0) + (at.1 - self.size_min.1) * self.stride()) as usize)
    }

    pub fn quad_id(&self, at: (i32, i32)) -> Option<QuadId> {
        self.index(at).map(|i| QuadId(i as u32))
    }

    /// Tile position of a quad id.
    pub fn position_of(&self, id: QuadId) -> Option<(i32, i32)> {
        let i = id.0 as usize;
        if i >= self.tiles.len() {
            return None;
        }
        let stride = self.stride();
        let (x, y) = (id.0 as i32 % stride, id.0 as i32 / stride);
        Some((x + self.size_min.0, y + self.size_min.1))
    }

    // --- Edits ---------------------------------------------------------------

    pub fn set_tile(&mut self, at: (i32, i32), shape: TileShape) {
        self.set_tile_with_material(at, shape, None, Cardinal::N);
    }

    pub fn set_tile_with_material(
        &mut self,
        at: (i32, i32),
        shape: TileShape,
        material: Option<TileMaterial>,
        facing: Cardinal,
    ) {
        self.edits.push_back(Edit::Set(at, TileTable { shape, material, mat_facing: facing }));
    }

    pub fn remove_tile(&mut self, at: (i32, i32)) {
        self.edits.push_back(Edit::Remove(at));
    }

    pub fn pending_edits(&self) -> usize {
        self.edits.len()
    }

    /// Places (or clears) level boundary tiles around the grid. `cardinal_bits`
    /// holds one [`Cardinal::bit`] per bordered side. No-op without a border.
    pub fn set_borders(&mut self, cardinal_bits: u8) {
        if !self.has_border {
            return;
        }
        let (w, h) = self.size;
        for side in Cardinal::ALL {
            let cells: Vec<(i32, i32)> = match side {
                Cardinal::N => (0..w).map(|x| (x, -1)).collect(),
                Cardinal::E => (0..h).map(|y| (w, y)).collect(),
                Cardinal::S => (0..w).map(|x| (x, h)).collect(),
                Cardinal::W => (0..h).map(|y| (-1, y)).collect(),
            };
            if cardinal_bits & side.bit() != 0 {
                let kind = match side {
                    Cardinal::N | Cardinal::S => TileShapeKind::LevelBoundary,
                    Cardinal::E | Cardinal::W => TileShapeKind::LevelBoundaryWall,
                };
                let shape = TileShape::new(kind, side == Cardinal::E, side == Cardinal::N);
                cells.into_iter().for_each(|c| self.set_tile(c, shape));
            } else {
                cells.into_iter().for_each(|c| self.remove_tile(c));
            }
        }
        self.apply_changes();
    }

    /// Drops every tile and pending edit.
    pub fn clear(&mut self) {
        self.tiles.iter_mut().for_each(|t| *t = None);
        self.edits.clear();
        self.reset_quads();
    }

    /// Applies every queued edit, then re-stitches ghosts over the 3x3
    /// neighbourhood of each changed cell.
    pub fn apply_changes(&mut self) {
        if self.edits.is_empty() {
            return;
        }
        let edit_count = self.edits.len();
        let mut impacted = vec![false; self.tiles.len()];

        while let Some(edit) = self.edits.pop_front() {
            let (at, changed) = match edit {
                Edit::Set(at, table) => (at, self.apply_set_tile(at, table)),
                Edit::Remove(at) => (at, self.apply_remove_tile(at)),
            };
            if !changed {
                continue;
            }
            for yy in at.1 - 1..=at.1 + 1 {
                for xx in at.0 - 1..=at.0 + 1 {
                    if let Some(i) = self.index((xx, yy)) {
                        impacted[i] = true;
                    }
                }
            }
        }

        let mut impacted_count = 0;
        for (i, _) in impacted.iter().enumerate().filter(|(_, hit)| **hit) {
            if let Some(pos) = self.position_of(QuadId(i as u32)) {
                self.update_ghosts(pos);
                impacted_count += 1;
            }
        }
        debug!(edits = edit_count, impacted = impacted_count, "applied tile edits");
    }

    fn apply_remove_tile(&mut self, at: (i32, i32)) -> bool {
        let Some(ndx) = self.index(at) else {
            return false;
        };
        if self.tiles[ndx].is_none() {
            return false;
        }

        // restore neighbour faces that were culled against this tile
        for side in Cardinal::ALL {
            let adj = offset(at, side);
            let opp = side.opposite();
            let Some(adj_ndx) = self.index(adj) else { continue };
            let Some(adj_table) = self.tiles[adj_ndx] else { continue };

            let restored = adj_table.to_quad(adj, QuadId(adj_ndx as u32));
            if let Some(surface) = restored.surface(opp) {
                if lies_on_edge(surface.surface, opp, adj) {
                    self.quads[adj_ndx].set_surface(opp, *surface);
                }
            }
        }

        self.tiles[ndx] = None;
        self.quads[ndx] = ColliderQuad { id: QuadId(ndx as u32), ..Default::default() };
        true
    }

    fn apply_set_tile(&mut self, at: (i32, i32), table: TileTable) -> bool {
        let Some(ndx) = self.index(at) else {
            return false;
        };
        if let Some(old) = self.tiles[ndx] {
            if old.shape == table.shape {
                return false;
            }
            self.apply_remove_tile(at);
        }
        if table.shape.is_empty() {
            return true;
        }

        let mut quad = table.to_quad(at, QuadId(ndx as u32));
        for side in Cardinal::ALL {
            let adj = offset(at, side);
            let opp = side.opposite();
            let Some(adj_ndx) = self.index(adj) else { continue };
            if self.tiles[adj_ndx].is_none() {
                continue;
            }
            let (Some(added), Some(adjacent)) = (
                quad.surface(side).copied(),
                self.quads[adj_ndx].surface(opp).copied(),
            ) else {
                continue;
            };
            if !lies_on_edge(added.surface, side, at) || !lies_on_edge(adjacent.surface, opp, adj) {
                continue;
            }

            let (mut added, mut adjacent) = (added, adjacent);
            let (drop_added, drop_adjacent) = cull_touching_surfaces(&mut added, &mut adjacent);
            quad.set_surface(side, added);
            self.quads[adj_ndx].set_surface(opp, adjacent);
            if drop_added {
                quad.remove_surface(side);
            }
            if drop_adjacent {
                self.quads[adj_ndx].remove_surface(opp);
            }
        }

        self.tiles[ndx] = Some(table);
        self.quads[ndx] = quad;
        true
    }

    fn update_ghosts(&mut self, at: (i32, i32)) {
        let Some(ndx) = self.index(at) else { return };
        if self.tiles[ndx].is_none() {
            return;
        }

        let mut nearby: Vec<&ColliderQuad> = Vec::with_capacity(9);
        for yy in at.1 - 1..=at.1 + 1 {
            for xx in at.0 - 1..=at.0 + 1 {
                if let Some(q) = self.quad_at((xx, yy)) {
                    nearby.push(q);
                }
            }
        }

        let quad = &self.quads[ndx];
        let mut updated = [None; 4];
        for side in Cardinal::ALL {
            if let Some(surface) = quad.surface(side) {
                updated[side.index()] = Some(ghosts_for(&nearby, surface.surface, quad.has_one_way));
            }
        }
        for side in Cardinal::ALL {
            if let Some(surface) = updated[side.index()] {
                self.quads[ndx].set_surface(side, surface);
            }
        }
    }

    // --- Queries -------------------------------------------------------------

    pub fn tile_at(&self, at: (i32, i32)) -> Option<&TileTable> {
        self.index(at).and_then(|i| self.tiles[i].as_ref())
    }

    /// Region-local quad at a tile position, if that cell holds a tile.
    pub fn quad_at(&self, at: (i32, i32)) -> Option<&ColliderQuad> {
        self.index(at).filter(|&i| self.tiles[i].is_some()).map(|i| &self.quads[i])
    }

    /// Tile range covered by a region-local area, widened by one cell on each
    /// side of a degenerate axis.
    pub fn tile_area(area: Rect) -> TileArea {
        let left = (area.left / TILESIZE).floor() as i32;
        let top = (area.top / TILESIZE).floor() as i32;
        let mut t = TileArea {
            left,
            top,
            width: (area.right() / TILESIZE).ceil() as i32 - left,
            height: (area.bottom() / TILESIZE).ceil() as i32 - top,
        };
        if t.width == 0 {
            t.left -= 1;
            t.width += 2;
        } else if t.height == 0 {
            t.top -= 1;
            t.height += 2;
        }
        t
    }

    /// Iterates tiles overlapping a world-space area in row-major order.
    pub fn in_rect(&self, area: Rect) -> QuadsInRect<'_> {
        let tiles = Self::tile_area(area.translate(-self.position));
        QuadsInRect { map: self, tiles, cursor: (tiles.left, tiles.top) }
    }

    /// First tile at or after `from` (row-major) inside `tiles`.
    pub fn first_quad_in_rect(&self, tiles: TileArea, from: (i32, i32)) -> Option<(i32, i32)> {
        let (mut x, mut y) = from;
        while y < tiles.top + tiles.height {
            while x < tiles.left + tiles.width {
                if self.quad_at((x, y)).is_some() {
                    return Some((x, y));
                }
                x += 1;
            }
            x = tiles.left;
            y += 1;
        }
        None
    }

    /// Tile following `at` inside `tiles`.
    pub fn next_quad_in_rect(&self, tiles: TileArea, at: (i32, i32)) -> Option<(i32, i32)> {
        let next = if at.0 + 1 < tiles.left + tiles.width { (at.0 + 1, at.1) } else { (tiles.left, at.1 + 1) };
        self.first_quad_in_rect(tiles, next)
    }

    /// Quads whose cells a world-space segment passes through, in traversal order.
    pub fn quads_on_line(&self, line: Line) -> Vec<QuadId> {
        let origin = line.p1 - self.position;
        let dir = line.vector();
        let mut cell = ((origin.x / TILESIZE).floor() as i32, (origin.y / TILESIZE).floor() as i32);
        let step_x = if dir.x > 0.0 { 1 } else if dir.x < 0.0 { -1 } else { 0 };
        let step_y = if dir.y > 0.0 { 1 } else if dir.y < 0.0 { -1 } else { 0 };
        let next_boundary = |c: i32, step: i32| -> f32 {
            if step > 0 { (c as f32 + 1.0) * TILESIZE } else { c as f32 * TILESIZE }
        };
        let mut t_max_x = if step_x != 0 { (next_boundary(cell.0, step_x) - origin.x) / dir.x } else { f32::INFINITY };
        let mut t_max_y = if step_y != 0 { (next_boundary(cell.1, step_y) - origin.y) / dir.y } else { f32::INFINITY };
        let t_delta_x = if step_x != 0 { TILESIZE / dir.x.abs() } else { f32::INFINITY };
        let t_delta_y = if step_y != 0 { TILESIZE / dir.y.abs() } else { f32::INFINITY };

        let max_steps = ((dir.x.abs() + dir.y.abs()) / TILESIZE) as usize + 2;

        let mut out = Vec::new();
        let mut t_curr = 0.0_f32;
        for _ in 0..=max_steps {
            if t_curr > 1.0 {
                break;
            }
            if self.quad_at(cell).is_some() {
                if let Some(id) = self.quad_id(cell) {
                    out.push(id);
                }
            }
            if step_x == 0 && step_y == 0 {
                break;
            }
            if t_max_x < t_max_y {
                cell.0 += step_x;
                t_curr = t_max_x;
                t_max_x += t_delta_x;
            } else {
                cell.1 += step_y;
                t_curr = t_max_y;
                t_max_y += t_delta_y;
            }
        }
        out
    }

    // --- Motion and hooks ----------------------------------------------------

    /// Moves the map, keeping the last position as the previous one.
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

    pub fn set_on_precontact(&mut self, f: impl Fn((i32, i32), &Contact, f32) -> bool + 'static) {
        self.on_precontact = Some(Box::new(f));
    }

    pub fn set_on_postcontact(&mut self, f: impl Fn((i32, i32), &AppliedContact) + 'static) {
        self.on_postcontact = Some(Box::new(f));
    }

    fn local_bounds(&self) -> Rect {
        Rect::new(
            self.size_min.0 as f32 * TILESIZE,
            self.size_min.1 as f32 * TILESIZE,
            (self.size_max.0 - self.size_min.0) as f32 * TILESIZE,
            (self.size_max.1 - self.size_min.1) as f32 * TILESIZE,
        )
    }
}

/// Row-major walk over the occupied cells of a [`TileArea`].
pub struct QuadsInRect<'a> {
    map: &'a ColliderTileMap,
    tiles: TileArea,
    cursor: (i32, i32),
}

impl Iterator for QuadsInRect<'_> {
    type Item = (QuadId, Rect);

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.map.first_quad_in_rect(self.tiles, self.cursor)?;
        self.cursor = if at.0 + 1 < self.tiles.left + self.tiles.width {
            (at.0 + 1, at.1)
        } else {
            (self.tiles.left, at.1 + 1)
        };
        let id = self.map.quad_id(at)?;
        let bounds = Rect::new(at.0 as f32 * TILESIZE, at.1 as f32 * TILESIZE, TILESIZE, TILESIZE);
        Some((id, bounds.translate(self.map.position)))
    }
}

impl ColliderRegion for ColliderTileMap {
    fn update(&mut self, _dt: f32) {
        self.apply_changes();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn get_quad(&self, id: QuadId) -> Option<&ColliderQuad> {
        let i = id.0 as usize;
        self.tiles.get(i)?.as_ref()?;
        self.quads.get(i)
    }

    fn quads_in_rect(&self, area: Rect) -> Vec<(QuadId, Rect)> {
        self.in_rect(area).collect()
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
        let local = self.local_bounds();
        local.translate(self.prev_position).union(&local.translate(self.position))
    }

    fn on_precontact(&self, quad: QuadId, contact: &Contact, duration: f32) -> bool {
        match (&self.on_precontact, self.position_of(quad)) {
            (Some(f), Some(at)) => f(at, contact, duration),
            _ => true,
        }
    }

    fn on_postcontact(&self, quad: QuadId, contact: &AppliedContact) {
        if let (Some(f), Some(at)) = (&self.on_postcontact, self.position_of(quad)) {
            f(at, contact);
        }
    }

    fn raycast(&self, line: Line, backoff: f32) -> Option<RaycastHit> {
        // walk from behind the origin so surfaces inside the backoff are visited
        let back = line.vector().normalize_or_zero() * backoff.abs();
        let traversal = Line::new(line.p1 - back, line.p2);
        self.quads_on_line(traversal)
            .into_iter()
            .filter_map(|id| self.get_quad(id))
            .fold(None, |best, quad| compare_hits(best, raycast_quad(quad, self.position, line, backoff)))
    }
}

fn offset(at: (i32, i32), side: Cardinal) -> (i32, i32) {
    let (dx, dy) = side.to_offset();
    (at.0 + dx, at.1 + dy)
}

/// Whether `line` runs along the `side` edge of cell `at` (region-local).
fn lies_on_edge(line: Line, side: Cardinal, at: (i32, i32)) -> bool {
    let cell = Rect::new(at.0 as f32 * TILESIZE, at.1 as f32 * TILESIZE, TILESIZE, TILESIZE);
    match side {
        Cardinal::N => line.p1.y == cell.top && line.p2.y == cell.top,
        Cardinal::S => line.p1.y == cell.bottom() && line.p2.y == cell.bottom(),
        Cardinal::E => line.p1.x == cell.right() && line.p2.x == cell.right(),
        Cardinal::W => line.p1.x == cell.left && line.p2.x == cell.left,
    }
}

/// Merges two facing surfaces on a shared tile edge. Returns which of
/// (`lhs`, `rhs`) should be deleted; the survivor may be extended in place.
pub fn cull_touching_surfaces(lhs: &mut ColliderSurface, rhs: &mut ColliderSurface) -> (bool, bool) {
    let (l, r) = (lhs.surface, rhs.surface);
    if l.p1 == r.p2 && l.p2 == r.p1 {
        return (true, true);
    }
    if l.p1 != r.p2 && l.p2 != r.p1 {
        return (false, false);
    }

    let extent = |v: Vec2| if v.x == 0.0 { v.y.abs() } else { v.x.abs() };
    let len_l = extent(l.vector());
    let len_r = extent(r.vector());
    if len_l + len_r <= TILESIZE {
        return (false, false);
    }

    if len_l > len_r {
        if l.p1 == r.p2 {
            lhs.surface.p1 = r.p1;
        } else {
            lhs.surface.p2 = r.p2;
        }
        (false, true)
    } else if len_r > len_l {
        if r.p1 == l.p2 {
            rhs.surface.p1 = l.p1;
        } else {
            rhs.surface.p2 = l.p2;
        }
        (true, false)
    } else {
        (false, false)
    }
}

/// Picks ghost endpoints for `surface` among the surfaces of nearby quads.
fn ghosts_for(nearby: &[&ColliderQuad], surface: Line, is_one_way: bool) -> ColliderSurface {
    let v = surface.vector();
    let ideal = v.y.atan2(v.x);

    let mut prev_candidates = Vec::new();
    let mut next_candidates = Vec::new();
    for quad in nearby.iter().filter(|q| is_one_way || !q.has_one_way) {
        for s in quad.surfaces.iter().filter(|s| s.has_surface) {
            let line = s.collider.surface;
            if line.p2 == surface.p1 {
                prev_candidates.push(line);
            } else if line.p1 == surface.p2 {
                next_candidates.push(line);
            }
        }
    }

    // floor-vs-ceiling candidates favour the one running the same way as `v`
    let better = |v1: Vec2, v2: Vec2| -> bool {
        if v1.x != 0.0 && v2.x != 0.0 && v.x != 0.0 && (v1.x < 0.0) != (v2.x < 0.0) {
            return (v1.x < 0.0) == (v.x < 0.0);
        }
        let d1 = wrap_angle(v1.y.atan2(v1.x) - ideal).abs();
        let d2 = wrap_angle(v2.y.atan2(v2.x) - ideal).abs();
        d1 < d2
    };

    let prev = pick_best(&prev_candidates, |c| surface.p1 - c.p1, &better);
    let next = pick_best(&next_candidates, |c| c.p2 - surface.p2, &better);

    let mut out = ColliderSurface::new(surface);
    if let Some(p) = prev {
        out.ghostp0 = p.p1;
        out.g0virtual = false;
    }
    if let Some(n) = next {
        out.ghostp3 = n.p2;
        out.g3virtual = false;
    }
    out
}

fn pick_best(
    candidates: &[Line],
    dir_of: impl Fn(&Line) -> Vec2,
    better: &impl Fn(Vec2, Vec2) -> bool,
) -> Option<Line> {
    let mut best: Option<Line> = None;
    for c in candidates {
        match best {
            Some(b) if !better(dir_of(c), dir_of(&b)) => {}
            _ => best = Some(*c),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(s: &str) -> TileShape {
        s.parse().unwrap()
    }

    fn map_with(tiles: &[((i32, i32), &str)]) -> ColliderTileMap {
        let mut map = ColliderTileMap::new(8, 8, false).unwrap();
        for (at, s) in tiles {
            map.set_tile(*at, shape(s));
        }
        map.apply_changes();
        map
    }

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn test_invalid_size() {
        assert_eq!(
            ColliderTileMap::new(0, 4, false).unwrap_err(),
            CollisionError::InvalidGridSize { width: 0, height: 4 }
        );
    }

    #[test]
    fn test_edits_wait_for_apply() {
        let mut map = ColliderTileMap::new(4, 4, false).unwrap();
        map.set_tile((1, 1), shape("solid"));
        assert!(map.quad_at((1, 1)).is_none());
        assert_eq!(map.pending_edits(), 1);
        map.apply_changes();
        assert!(map.quad_at((1, 1)).is_some());
        assert_eq!(map.tile_at((1, 1)).unwrap().shape, shape("solid"));
    }

    #[test]
    fn test_out_of_bounds_edit_ignored() {
        let mut map = ColliderTileMap::new(4, 4, false).unwrap();
        map.set_tile((-1, 0), shape("solid"));
        map.set_tile((4, 4), shape("solid"));
        map.apply_changes();
        assert!(map.quad_at((-1, 0)).is_none());
        assert_eq!(map.pending_edits(), 0);
    }

    #[test]
    fn test_adjacent_solids_cull_shared_faces() {
        let map = map_with(&[((1, 1), "solid"), ((2, 1), "solid")]);
        let a = map.quad_at((1, 1)).unwrap();
        let b = map.quad_at((2, 1)).unwrap();
        assert!(a.surface(Cardinal::E).is_none());
        assert!(b.surface(Cardinal::W).is_none());

        // floors are stitched across the seam
        let fa = a.surface(Cardinal::N).unwrap();
        assert_eq!(fa.ghostp3, v(48.0, 16.0));
        assert!(!fa.g3virtual);
        let fb = b.surface(Cardinal::N).unwrap();
        assert_eq!(fb.ghostp0, v(16.0, 16.0));
        assert!(!fb.g0virtual);
    }

    #[test]
    fn test_lone_tile_ghosts_wrap_corners() {
        let map = map_with(&[((1, 1), "solid")]);
        let n = map.quad_at((1, 1)).unwrap().surface(Cardinal::N).unwrap();
        // previous surface is the west face, next the east face
        assert_eq!(n.ghostp0, v(16.0, 32.0));
        assert_eq!(n.ghostp3, v(32.0, 32.0));
        assert!(!n.g0virtual && !n.g3virtual);
    }

    #[test]
    fn test_half_next_to_solid_extends_longer_face() {
        let map = map_with(&[((1, 1), "half"), ((2, 1), "solid")]);
        let half = map.quad_at((1, 1)).unwrap();
        let solid = map.quad_at((2, 1)).unwrap();
        assert!(half.surface(Cardinal::E).is_none());
        let w = solid.surface(Cardinal::W).unwrap().surface;
        assert_eq!(w, Line::new(v(32.0, 24.0), v(32.0, 16.0)));
    }

    #[test]
    fn test_remove_restores_neighbour_face() {
        let mut map = map_with(&[((1, 1), "solid"), ((2, 1), "solid")]);
        map.remove_tile((2, 1));
        map.apply_changes();
        assert!(map.quad_at((2, 1)).is_none());
        let e = map.quad_at((1, 1)).unwrap().surface(Cardinal::E).unwrap();
        assert_eq!(e.surface, Line::new(v(32.0, 16.0), v(32.0, 32.0)));
        let n = map.quad_at((1, 1)).unwrap().surface(Cardinal::N).unwrap();
        assert_eq!(n.ghostp3, v(32.0, 32.0));
    }

    #[test]
    fn test_same_shape_is_no_change() {
        let mut map = map_with(&[((1, 1), "solid")]);
        let before = *map.quad_at((1, 1)).unwrap();
        map.set_tile((1, 1), shape("solid"));
        map.apply_changes();
        assert_eq!(map.quad_at((1, 1)).unwrap().surfaces, before.surfaces);
    }

    #[test]
    fn test_set_empty_removes() {
        let mut map = map_with(&[((1, 1), "solid")]);
        map.set_tile((1, 1), TileShape::EMPTY);
        map.apply_changes();
        assert!(map.quad_at((1, 1)).is_none());
        assert!(map.tile_at((1, 1)).is_none());
    }

    #[test]
    fn test_slope_ghosts_into_floor() {
        let map = map_with(&[((1, 2), "slope"), ((0, 3), "solid"), ((2, 2), "solid")]);
        let slope = map.quad_at((1, 2)).unwrap().surface(Cardinal::N).unwrap();
        assert_eq!(slope.surface, Line::new(v(16.0, 48.0), v(32.0, 32.0)));
        // climbs from the left floor onto the right tile's top
        assert_eq!(slope.ghostp0, v(0.0, 48.0));
        assert_eq!(slope.ghostp3, v(48.0, 32.0));
        assert!(map.quad_at((1, 2)).unwrap().surface(Cardinal::E).is_none());
    }

    #[test]
    fn test_oneway_ghosts_skip_solid_neighbours() {
        let map = map_with(&[((1, 1), "oneway"), ((2, 1), "oneway"), ((0, 1), "solid")]);
        let n = map.quad_at((1, 1)).unwrap().surface(Cardinal::N).unwrap();
        assert!(!n.g3virtual);
        assert_eq!(n.ghostp3, v(48.0, 16.0));
        // one-way quads may ghost into solid ones
        assert!(!n.g0virtual);
        // while the solid floor wraps its own corner instead
        let solid = map.quad_at((0, 1)).unwrap().surface(Cardinal::N).unwrap();
        assert_eq!(solid.ghostp3, v(16.0, 32.0));
    }

    #[test]
    fn test_borders_face_inward() {
        let mut map = ColliderTileMap::new(2, 2, true).unwrap();
        map.set_borders(Cardinal::ALL.iter().fold(0, |b, c| b | c.bit()));
        let top = map.quad_at((0, -1)).unwrap();
        assert!(top.is_boundary(Cardinal::S));
        assert_eq!(top.surface(Cardinal::S).unwrap().surface.p1.y, 0.0);
        let right = map.quad_at((2, 0)).unwrap();
        assert!(right.is_boundary(Cardinal::W));
        assert_eq!(right.surface(Cardinal::W).unwrap().surface.p1.x, 32.0);
        let bottom = map.quad_at((1, 2)).unwrap();
        assert!(bottom.is_boundary(Cardinal::N));
        let left = map.quad_at((-1, 1)).unwrap();
        assert!(left.is_boundary(Cardinal::E));

        map.set_borders(0);
        assert!(map.quad_at((0, -1)).is_none());
    }

    #[test]
    fn test_quads_in_rect_order_and_bounds() {
        let mut map = map_with(&[((1, 1), "solid"), ((2, 1), "solid"), ((1, 2), "solid")]);
        map.teleport(v(100.0, 0.0));
        let got = map.quads_in_rect(Rect::new(110.0, 10.0, 30.0, 30.0));
        let positions: Vec<_> = got.iter().map(|(id, _)| map.position_of(*id).unwrap()).collect();
        assert_eq!(positions, vec![(1, 1), (2, 1), (1, 2)]);
        assert_eq!(got[0].1, Rect::new(116.0, 16.0, 16.0, 16.0));
    }

    #[test]
    fn test_tile_area_widens_degenerate_axis() {
        let t = ColliderTileMap::tile_area(Rect::new(16.0, 0.0, 0.0, 32.0));
        assert_eq!(t, TileArea { left: 0, top: 0, width: 2, height: 2 });
        let t = ColliderTileMap::tile_area(Rect::new(0.0, 16.0, 32.0, 0.0));
        assert_eq!(t, TileArea { left: 0, top: 0, width: 2, height: 2 });
    }

    #[test]
    fn test_quads_on_line_walks_cells() {
        let map = map_with(&[((1, 0), "solid"), ((3, 0), "solid"), ((3, 2), "solid")]);
        let ids = map.quads_on_line(Line::new(v(2.0, 8.0), v(60.0, 8.0)));
        let pos: Vec<_> = ids.iter().map(|id| map.position_of(*id).unwrap()).collect();
        assert_eq!(pos, vec![(1, 0), (3, 0)]);
    }

    #[test]
    fn test_raycast_down_onto_floor() {
        let map = map_with(&[((0, 4), "solid"), ((1, 4), "solid")]);
        let hit = ColliderRegion::raycast(&map, Line::new(v(20.0, 0.0), v(20.0, 200.0)), 0.0).unwrap();
        assert_eq!(hit.impact, v(20.0, 64.0));
        assert_eq!(hit.distance, 64.0);
        assert_eq!(hit.quad, map.quad_id((1, 4)).unwrap());
    }

    #[test]
    fn test_callbacks_receive_tile_position() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut map = map_with(&[((3, 5), "solid")]);
        let seen = Rc::new(Cell::new((0, 0)));
        let seen_cb = seen.clone();
        map.set_on_precontact(move |at, _, _| {
            seen_cb.set(at);
            at.0 != 3
        });
        let id = map.quad_id((3, 5)).unwrap();
        assert!(!map.on_precontact(id, &Contact::default(), 0.0));
        assert_eq!(seen.get(), (3, 5));
    }

    #[test]
    fn test_cull_equal_lengths_keeps_both() {
        let mut a = ColliderSurface::new(Line::new(v(0.0, 0.0), v(0.0, 16.0)));
        let mut b = ColliderSurface::new(Line::new(v(0.0, 16.0), v(0.0, 32.0)));
        assert_eq!(cull_touching_surfaces(&mut a, &mut b), (false, false));
    }
}

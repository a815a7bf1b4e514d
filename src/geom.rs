use glam::Vec2;

/// Edge length of one tile in world units.
pub const TILESIZE: f32 = 16.0;

/// Axis directions in tile space (y grows downward).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cardinal {
    #[default]
    N = 0,
    E = 1,
    S = 2,
    W = 3,
}

impl Cardinal {
    pub const ALL: [Cardinal; 4] = [Cardinal::N, Cardinal::E, Cardinal::S, Cardinal::W];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(i: usize) -> Cardinal {
        Self::ALL[i % 4]
    }

    pub fn opposite(self) -> Cardinal {
        match self {
            Cardinal::N => Cardinal::S,
            Cardinal::E => Cardinal::W,
            Cardinal::S => Cardinal::N,
            Cardinal::W => Cardinal::E,
        }
    }

    /// Unit vector pointing toward this direction.
    pub fn to_vec(self) -> Vec2 {
        match self {
            Cardinal::N => Vec2::new(0.0, -1.0),
            Cardinal::E => Vec2::new(1.0, 0.0),
            Cardinal::S => Vec2::new(0.0, 1.0),
            Cardinal::W => Vec2::new(-1.0, 0.0),
        }
    }

    pub fn to_offset(self) -> (i32, i32) {
        match self {
            Cardinal::N => (0, -1),
            Cardinal::E => (1, 0),
            Cardinal::S => (0, 1),
            Cardinal::W => (-1, 0),
        }
    }

    /// Exact inverse of [`Cardinal::to_vec`] for axis-aligned, non-zero vectors.
    pub fn from_vec(v: Vec2) -> Option<Cardinal> {
        match (v.x == 0.0, v.y == 0.0) {
            (true, false) => Some(if v.y < 0.0 { Cardinal::N } else { Cardinal::S }),
            (false, true) => Some(if v.x > 0.0 { Cardinal::E } else { Cardinal::W }),
            _ => None,
        }
    }

    #[inline]
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ordinal {
    NE = 0,
    SE = 1,
    SW = 2,
    NW = 3,
}

impl Ordinal {
    pub fn combine(a: Cardinal, b: Cardinal) -> Option<Ordinal> {
        use Cardinal::*;
        match (a, b) {
            (N, E) | (E, N) => Some(Ordinal::NE),
            (S, E) | (E, S) => Some(Ordinal::SE),
            (S, W) | (W, S) => Some(Ordinal::SW),
            (N, W) | (W, N) => Some(Ordinal::NW),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Left-hand perpendicular. For a clockwise tile surface this is the outward side.
#[inline]
pub fn lefthand(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

#[inline]
pub fn righthand(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Projects `a` onto the unit vector `onto`. Axis-aligned `onto` keeps the
/// matching component of `a` untouched.
pub fn projection(a: Vec2, onto: Vec2) -> Vec2 {
    if onto == Vec2::ZERO {
        Vec2::ZERO
    } else if onto.x == 0.0 {
        Vec2::new(0.0, a.y)
    } else if onto.y == 0.0 {
        Vec2::new(a.x, 0.0)
    } else {
        onto * a.dot(onto)
    }
}

#[inline]
pub fn is_vertical_vec(v: Vec2) -> bool {
    v.x == 0.0
}

#[inline]
pub fn is_horizontal_vec(v: Vec2) -> bool {
    v.y == 0.0
}

/// Signed angle wrapped into (-PI, PI].
pub fn wrap_angle(a: f32) -> f32 {
    use std::f32::consts::PI;
    let mut r = a % (2.0 * PI);
    if r > PI {
        r -= 2.0 * PI;
    } else if r <= -PI {
        r += 2.0 * PI;
    }
    r
}

/// Directed line segment.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Line {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl Line {
    #[inline]
    pub const fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2 }
    }

    #[inline]
    pub fn vector(&self) -> Vec2 {
        self.p2 - self.p1
    }

    #[inline]
    pub fn is_vertical(&self) -> bool {
        self.p1.x == self.p2.x
    }

    #[inline]
    pub fn is_horizontal(&self) -> bool {
        self.p1.y == self.p2.y
    }

    #[inline]
    pub fn midpoint(&self) -> Vec2 {
        (self.p1 + self.p2) * 0.5
    }

    /// Outward unit normal of a clockwise surface.
    #[inline]
    pub fn normal(&self) -> Vec2 {
        lefthand(self.vector()).normalize_or_zero()
    }

    #[inline]
    pub fn reversed(&self) -> Line {
        Line::new(self.p2, self.p1)
    }

    #[inline]
    pub fn shift(&self, offset: Vec2) -> Line {
        Line::new(self.p1 + offset, self.p2 + offset)
    }

    /// Y of the infinite line through this segment at `x`. Not defined for vertical lines.
    pub fn y_for_x(&self, x: f32) -> f32 {
        let v = self.vector();
        debug_assert!(v.x != 0.0, "y_for_x on a vertical line");
        let scale = (x - self.p1.x) / v.x;
        scale * v.y + self.p1.y
    }

    /// Intersection of the two infinite lines, `None` when they are parallel.
    pub fn intersection(&self, other: &Line) -> Option<Vec2> {
        let (a, b) = (self, other);
        let det_a = a.p1.x * a.p2.y - a.p1.y * a.p2.x;
        let det_b = b.p1.x * b.p2.y - b.p1.y * b.p2.x;

        let mx_a = a.p1.x - a.p2.x;
        let mx_b = b.p1.x - b.p2.x;
        let my_a = a.p1.y - a.p2.y;
        let my_b = b.p1.y - b.p2.y;

        let denom = mx_a * my_b - my_a * mx_b;
        if denom == 0.0 {
            return None;
        }
        let p = Vec2::new(
            (det_a * mx_b - det_b * mx_a) / denom,
            (det_a * my_b - det_b * my_a) / denom,
        );
        p.is_finite().then_some(p)
    }
}

/// Axis-aligned rectangle stored as top-left + size.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    #[inline]
    pub fn topleft(&self) -> Vec2 {
        Vec2::new(self.left, self.top)
    }

    #[inline]
    pub fn topright(&self) -> Vec2 {
        Vec2::new(self.right(), self.top)
    }

    #[inline]
    pub fn botleft(&self) -> Vec2 {
        Vec2::new(self.left, self.bottom())
    }

    #[inline]
    pub fn botright(&self) -> Vec2 {
        Vec2::new(self.right(), self.bottom())
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn mid(&self) -> Vec2 {
        Vec2::new(self.left + self.width * 0.5, self.top + self.height * 0.5)
    }

    /// Smallest rect containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let min = self.topleft().min(other.topleft());
        let max = self.botright().max(other.botright());
        Rect::from_min_max(min, max)
    }

    /// Strict overlap (shared edges do not count).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    /// Overlap including shared edges.
    pub fn touches(&self, other: &Rect) -> bool {
        self.left <= other.right()
            && other.left <= self.right()
            && self.top <= other.bottom()
            && other.top <= self.bottom()
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    /// Grows the rect by `amount` toward `dir`.
    pub fn extend(&self, dir: Cardinal, amount: f32) -> Rect {
        let mut out = *self;
        match dir {
            Cardinal::N => {
                out.top -= amount;
                out.height += amount;
            }
            Cardinal::E => out.width += amount,
            Cardinal::S => out.height += amount,
            Cardinal::W => {
                out.left -= amount;
                out.width += amount;
            }
        }
        out
    }

    pub fn translate(&self, offset: Vec2) -> Rect {
        Rect::new(self.left + offset.x, self.top + offset.y, self.width, self.height)
    }
}

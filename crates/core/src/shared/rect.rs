/// Axis-aligned box in pixel coordinates: `(x, y)` is the top-left corner.
///
/// Coordinates may be negative or extend past the frame; consumers clip
/// with [`Rect::clamp_to`] before touching pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rect from corner coordinates `[x1, y1, x2, y2]`.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the whole rect lies inside a `width` x `height` frame.
    pub fn is_inside(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.right() <= width as i32
            && self.bottom() <= height as i32
    }

    /// Intersection with the frame, or `None` if it is empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(width as i32);
        let y2 = self.bottom().min(height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }

    pub fn iou(&self, other: &Rect) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.area() as f64;
        let area_b = other.area() as f64;
        inter / (area_a + area_b - inter)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grows a detected hand box into the region an open hand occupies.
    ///
    /// Cascade hits cover the palm; fingers extend above it and the hand
    /// may sit beside the face, so the box is widened by three half-widths
    /// (shifted left by one and a half) and stretched to 2.7x its height,
    /// starting 1.3 heights above the original top.
    pub fn expand_for_open_hand(&self) -> Rect {
        let half_w = self.width / 2;
        let h = self.height as f64;
        Rect::new(
            (self.x as f64 - half_w as f64 * 1.5) as i32,
            (self.y as f64 - h * 1.3) as i32,
            self.width + 3 * half_w,
            (h * 2.0 + h * 0.7) as i32,
        )
    }
}

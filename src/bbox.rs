use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::str::FromStr;

/// Left-top-width-height box in frame pixel coordinates
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<[i32; 4]> for BoundingBox {
    #[inline]
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    #[inline]
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.width, bbox.height]
    }
}

/// Parses `x,y,w,h`
impl FromStr for BoundingBox {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("invalid box `{}`: {}", s, err))?;

        match parts[..] {
            [x, y, w, h] => Ok(Self::new(x, y, w, h)),
            _ => Err(format!("invalid box `{}`: expected x,y,w,h", s)),
        }
    }
}

impl BoundingBox {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from center coordinates and size, truncating toward zero
    #[inline]
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(
            (cx - w / 2.0) as i32,
            (cy - h / 2.0) as i32,
            w as i32,
            h as i32,
        )
    }

    #[inline(always)]
    pub fn left(&self) -> i32 {
        self.x
    }

    #[inline(always)]
    pub fn top(&self) -> i32 {
        self.y
    }

    #[inline(always)]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    #[inline(always)]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    #[inline(always)]
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    #[inline]
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Intersection of two boxes, `BoundingBox::default()` when they don't overlap
    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        let edges = |b: &BoundingBox| {
            let (x, y) = (b.x as i64, b.y as i64);
            (x, y, x + b.width as i64, y + b.height as i64)
        };

        let (l0, t0, r0, b0) = edges(self);
        let (l1, t1, r1, b1) = edges(other);

        let (left, top) = (l0.max(l1), t0.max(t1));
        let (right, bottom) = (r0.min(r1), b0.min(b1));

        if right <= left || bottom <= top {
            return BoundingBox::default();
        }

        // every edge lies within one of the operands, so it fits back in i32
        BoundingBox::new(
            left as i32,
            top as i32,
            (right - left) as i32,
            (bottom - top) as i32,
        )
    }

    /// Restricts the box to a `width` x `height` frame
    #[inline]
    pub fn clip(&self, width: u32, height: u32) -> BoundingBox {
        self.intersect(&BoundingBox::new(0, 0, width as i32, height as i32))
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersect(other).area();
        let union = self.area() + other.area() - inter;

        if union <= 0 {
            return 0.0;
        }

        inter as f32 / union as f32
    }
}

/// Oriented box: center, (width, height) and angle in degrees
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RotatedRect {
    pub center: na::Point2<f32>,
    pub size: (f32, f32),
    pub angle: f32,
}

impl Default for RotatedRect {
    fn default() -> Self {
        Self {
            center: na::Point2::origin(),
            size: (0.0, 0.0),
            angle: 0.0,
        }
    }
}

impl RotatedRect {
    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.size.0
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.size.1
    }

    #[inline(always)]
    pub fn is_degenerate(&self) -> bool {
        !(self.size.0 > 0.0 && self.size.1 > 0.0)
    }

    pub fn vertices(&self) -> [na::Point2<f32>; 4] {
        let angle = self.angle.to_radians();
        let b = angle.cos() * 0.5;
        let a = angle.sin() * 0.5;
        let (w, h) = self.size;
        let c = self.center;

        let p0 = na::Point2::new(c.x - a * h - b * w, c.y + b * h - a * w);
        let p1 = na::Point2::new(c.x + a * h - b * w, c.y - b * h - a * w);
        let p2 = na::Point2::new(2.0 * c.x - p0.x, 2.0 * c.y - p0.y);
        let p3 = na::Point2::new(2.0 * c.x - p1.x, 2.0 * c.y - p1.y);

        [p0, p1, p2, p3]
    }

    /// Smallest upright integer box enclosing all four vertices
    pub fn bounding_box(&self) -> BoundingBox {
        let pts = self.vertices();
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);

        for p in &pts {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;

        BoundingBox::new(x, y, max_x.ceil() as i32 - x, max_y.ceil() as i32 - y)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundingBox, RotatedRect};
    use nalgebra as na;

    #[test]
    fn center_and_area() {
        let b = BoundingBox::new(100, 100, 50, 50);
        assert_eq!(b.center(), na::Point2::new(125.0, 125.0));
        assert_eq!(b.area(), 2500);

        let odd = BoundingBox::new(0, 0, 5, 3);
        assert_eq!(odd.center(), na::Point2::new(2.5, 1.5));
    }

    #[test]
    fn degenerate() {
        assert!(BoundingBox::new(0, 0, 0, 10).is_degenerate());
        assert!(BoundingBox::new(0, 0, 10, -1).is_degenerate());
        assert!(!BoundingBox::new(-5, -5, 1, 1).is_degenerate());
    }

    #[test]
    fn clip_to_frame() {
        let b = BoundingBox::new(-10, 5, 30, 100);
        assert_eq!(b.clip(64, 48), BoundingBox::new(0, 5, 20, 43));

        let outside = BoundingBox::new(100, 100, 10, 10);
        assert!(outside.clip(64, 48).is_degenerate());
    }

    #[test]
    fn clip_far_outside_does_not_overflow() {
        let far = BoundingBox::new(i32::MAX - 5, 0, 10, 10);
        assert_eq!(far.right(), i32::MAX);
        assert!(far.clip(64, 64).is_degenerate());

        let huge = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert!(huge.clip(64, 64).is_degenerate());

        let wide = BoundingBox::new(-10, -10, i32::MAX, i32::MAX);
        assert_eq!(wide.clip(64, 48), BoundingBox::new(0, 0, 64, 48));
    }

    #[test]
    fn iou() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 10, 10);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&BoundingBox::new(20, 20, 5, 5)), 0.0);
    }

    #[test]
    fn parse_from_str() {
        assert_eq!("100, 100,50,50".parse::<BoundingBox>(), Ok(BoundingBox::new(100, 100, 50, 50)));
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn serde_as_array() {
        let b = BoundingBox::new(1, 2, 3, 4);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1,2,3,4]");
        let back: BoundingBox = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn upright_box_of_axis_aligned_rect() {
        let r = RotatedRect {
            center: na::Point2::new(125.0, 125.0),
            size: (49.6, 49.6),
            angle: 90.0,
        };

        assert_eq!(r.bounding_box(), BoundingBox::new(100, 100, 50, 50));
    }

    #[test]
    fn upright_box_of_tilted_rect() {
        let r = RotatedRect {
            center: na::Point2::new(50.0, 50.0),
            size: (10.0, 40.0),
            angle: 45.0,
        };
        let b = r.bounding_box();
        // (10 + 40) / sqrt(2) ~ 35.36
        assert_eq!(b.width, 36);
        assert_eq!(b.height, 36);
        assert!((b.center().x - 50.0).abs() <= 1.0);
    }
}

use serde::Serialize;

/// Canvas rectangle. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BBox {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// True when the box covers no pixel at all.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Running min/max over pixel positions, producing the tightest box around them.
#[derive(Debug, Clone, Copy)]
pub struct BBoxAccumulator {
    min_x: i64,
    min_y: i64,
    max_x: i64,
    max_y: i64,
}

impl BBoxAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            min_x: i64::from(width),
            min_y: i64::from(height),
            max_x: -1,
            max_y: -1,
        }
    }

    pub fn include(&mut self, x: u32, y: u32) {
        let (x, y) = (i64::from(x), i64::from(y));
        if x < self.min_x {
            self.min_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    /// Convert the inclusive maxima to an exclusive box. Empty if nothing was included.
    pub fn finish(self) -> BBox {
        if self.max_x < 0 {
            return BBox {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            };
        }
        BBox {
            left: self.min_x as u32,
            top: self.min_y as u32,
            right: (self.max_x + 1) as u32,
            bottom: (self.max_y + 1) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_accumulator_is_empty() {
        assert!(BBoxAccumulator::new(10, 10).finish().is_empty());
    }

    #[test]
    fn single_pixel_box_is_exclusive() {
        let mut acc = BBoxAccumulator::new(10, 10);
        acc.include(3, 3);
        assert_eq!(
            acc.finish(),
            BBox {
                left: 3,
                top: 3,
                right: 4,
                bottom: 4
            }
        );
    }

    #[test]
    fn box_spans_all_included_points() {
        let mut acc = BBoxAccumulator::new(10, 10);
        acc.include(7, 1);
        acc.include(2, 8);
        let bbox = acc.finish();
        assert_eq!((bbox.left, bbox.top, bbox.right, bbox.bottom), (2, 1, 8, 9));
        assert_eq!((bbox.width(), bbox.height()), (6, 8));
    }
}

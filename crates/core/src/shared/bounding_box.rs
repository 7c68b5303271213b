use serde::{Deserialize, Serialize};

/// Axis-aligned face box in pixel coordinates.
///
/// Serialized as `[left, top, right, bottom]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).abs()
    }

    /// Component-wise mean rounded to the nearest pixel, `None` when empty.
    pub fn mean<'a, I>(boxes: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a BoundingBox>,
    {
        let mut sums = [0.0f64; 4];
        let mut count = 0usize;
        for b in boxes {
            sums[0] += b.left as f64;
            sums[1] += b.top as f64;
            sums[2] += b.right as f64;
            sums[3] += b.bottom as f64;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(BoundingBox::new(
            (sums[0] / n).round() as i32,
            (sums[1] / n).round() as i32,
            (sums[2] / n).round() as i32,
            (sums[3] / n).round() as i32,
        ))
    }

    /// Whether `candidate` continues the face last seen at `self`.
    ///
    /// The tolerance window comes from `self` only: the top-left shift is
    /// divided by the previous width and height. A shrinking face can
    /// therefore leave the window while a growing one cannot. Degenerate
    /// previous boxes never match (the ratio is infinite or NaN).
    pub fn is_same_face(&self, candidate: &BoundingBox, max_relative_shift: f64) -> bool {
        let dx = (self.left as f64 - candidate.left as f64).abs() / self.width() as f64;
        let dy = (self.top as f64 - candidate.top as f64).abs() / self.height() as f64;
        dx < max_relative_shift && dy < max_relative_shift
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from(c: [i32; 4]) -> Self {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.left, b.top, b.right, b.bottom]
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

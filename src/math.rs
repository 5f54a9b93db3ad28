use crate::bbox::BoundingBox;

use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// Population mean and standard deviation, `None` for an empty sample
pub fn mean_std<T, I>(values: I) -> Option<(f64, f64)>
where
    T: ToPrimitive,
    I: IntoIterator<Item = T>,
{
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;

    for v in values {
        let v = v.to_f64()?;
        n += 1;
        sum += v;
        sum_sq += v * v;
    }

    if n == 0 {
        return None;
    }

    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);

    Some((mean, var.sqrt()))
}

/// Rounds to the nearest integer, ties to even
#[inline]
pub fn round_half_even(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

/// Spatial and central moments up to the second order.
///
/// Coordinates are relative to the top-left corner of the window they were
/// computed over.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl Moments {
    /// Moments of `prob` inside `window`; the window must lie within the map
    pub fn of_window(prob: ArrayView2<'_, f32>, window: &BoundingBox) -> Self {
        let region = prob.slice(s![
            window.top() as usize..window.bottom() as usize,
            window.left() as usize..window.right() as usize
        ]);

        let (mut m00, mut m10, mut m01) = (0.0, 0.0, 0.0);
        let (mut m20, mut m11, mut m02) = (0.0, 0.0, 0.0);

        for ((y, x), &v) in region.indexed_iter() {
            if v == 0.0 {
                continue;
            }

            let (v, x, y) = (v as f64, x as f64, y as f64);
            m00 += v;
            m10 += x * v;
            m01 += y * v;
            m20 += x * x * v;
            m11 += x * y * v;
            m02 += y * y * v;
        }

        if m00.abs() < f64::EPSILON {
            return Self::default();
        }

        let cx = m10 / m00;
        let cy = m01 / m00;

        Self {
            m00,
            m10,
            m01,
            mu20: m20 - cx * m10,
            mu11: m11 - cx * m01,
            mu02: m02 - cy * m01,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.m00.abs() < f64::EPSILON
    }
}

/// Running root-mean-square accumulator
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rmse {
    sum: f64,
    count: usize,
}

impl Rmse {
    #[inline]
    pub fn push(&mut self, squared_error: f64) {
        self.sum += squared_error;
        self.count += 1;
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Zero when nothing was accumulated
    #[inline]
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        (self.sum / self.count as f64).sqrt()
    }
}

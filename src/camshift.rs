use crate::bbox::{BoundingBox, RotatedRect};
use crate::math::{round_half_even, Moments};
use crate::meanshift::{mean_shift, TermCriteria};
use crate::tracker::WindowSearch;

use log::debug;
use nalgebra as na;
use ndarray::prelude::*;
use std::f64::consts::FRAC_PI_2;

/// Margin added around the converged window before the moments are measured
const TOLERANCE: i32 = 10;

/// Continuously adaptive mean shift.
///
/// Runs [`mean_shift`] from `window`, then fits an oriented box to the second
/// order moments of the probability mass around the converged window. Returns
/// the oriented box together with the adapted upright search window. When no
/// mass is found the oriented box is degenerate and the window is unchanged.
pub fn cam_shift(
    prob: ArrayView2<'_, f32>,
    window: BoundingBox,
    criteria: &TermCriteria,
) -> (RotatedRect, BoundingBox) {
    let (rows, cols) = (prob.nrows() as i32, prob.ncols() as i32);
    let (_, window) = mean_shift(prob, window, criteria);

    let expanded = expand(window, cols, rows);

    if expanded.is_degenerate() {
        return (RotatedRect::default(), window);
    }

    let m = Moments::of_window(prob, &expanded);
    if m.is_empty() {
        return (RotatedRect::default(), window);
    }

    let inv_m00 = 1.0 / m.m00;
    let xc = m.m10 * inv_m00 + expanded.x as f64;
    let yc = m.m01 * inv_m00 + expanded.y as f64;

    let a = m.mu20 * inv_m00;
    let b = m.mu11 * inv_m00;
    let c = m.mu02 * inv_m00;

    // orientation of the major axis
    let square = (4.0 * b * b + (a - c) * (a - c)).sqrt();
    let mut theta = (2.0 * b).atan2(a - c + square);

    let mut cs = theta.cos();
    let mut sn = theta.sin();

    let rotate_a = (cs * cs * m.mu20 + 2.0 * cs * sn * m.mu11 + sn * sn * m.mu02).max(0.0);
    let rotate_c = (sn * sn * m.mu20 - 2.0 * cs * sn * m.mu11 + cs * cs * m.mu02).max(0.0);

    let mut length = (rotate_a * inv_m00).sqrt() * 4.0;
    let mut width = (rotate_c * inv_m00).sqrt() * 4.0;

    if length < width {
        std::mem::swap(&mut length, &mut width);
        std::mem::swap(&mut cs, &mut sn);
        theta = FRAC_PI_2 - theta;
    }

    let ixc = round_half_even(xc) as i32;
    let iyc = round_half_even(yc) as i32;

    let mut adapted = BoundingBox::default();

    let t0 = round_half_even((length * cs).abs()) as i32;
    let t1 = round_half_even((width * sn).abs()) as i32;
    adapted.width = (t0.max(t1) + 2).min((cols - ixc) * 2);

    let t0 = round_half_even((length * sn).abs()) as i32;
    let t1 = round_half_even((width * cs).abs()) as i32;
    adapted.height = (t0.max(t1) + 2).min((rows - iyc) * 2);

    adapted.x = (ixc - adapted.width / 2).max(0);
    adapted.y = (iyc - adapted.height / 2).max(0);
    adapted.width = adapted.width.min(cols - adapted.x);
    adapted.height = adapted.height.min(rows - adapted.y);

    let mut angle = ((FRAC_PI_2 + theta) * 180.0 / std::f64::consts::PI) as f32;
    angle = angle.rem_euclid(360.0);
    if angle >= 180.0 {
        angle -= 180.0;
    }

    let rotated = RotatedRect {
        center: na::Point2::new(
            adapted.x as f32 + adapted.width as f32 * 0.5,
            adapted.y as f32 + adapted.height as f32 * 0.5,
        ),
        size: (width as f32, length as f32),
        angle,
    };

    debug!(
        "cam shift fitted {:?} (window {:?}, mass {:.1})",
        rotated, adapted, m.m00
    );

    (rotated, adapted)
}

/// Grows `window` by [`TOLERANCE`] on every side. The origin is clamped to
/// the map first and the full grown size is kept, then the far edges are
/// clipped.
fn expand(window: BoundingBox, cols: i32, rows: i32) -> BoundingBox {
    let x = (window.x - TOLERANCE).max(0);
    let y = (window.y - TOLERANCE).max(0);

    BoundingBox::new(
        x,
        y,
        (window.width + 2 * TOLERANCE).min(cols - x),
        (window.height + 2 * TOLERANCE).min(rows - y),
    )
}

/// Adaptive window search: size and orientation follow the target.
///
/// The reported box is the upright box enclosing the fitted oriented box,
/// clipped to the map.
#[derive(Debug, Default, Clone, Copy)]
pub struct CamShift;

impl WindowSearch for CamShift {
    const NAME: &'static str = "CamShift";

    fn search(
        &self,
        prob: ArrayView2<'_, f32>,
        window: BoundingBox,
        criteria: &TermCriteria,
    ) -> Option<BoundingBox> {
        let (rotated, _) = cam_shift(prob, window, criteria);
        if rotated.is_degenerate() {
            return None;
        }

        let found = rotated
            .bounding_box()
            .clip(prob.ncols() as u32, prob.nrows() as u32);

        if found.is_degenerate() {
            None
        } else {
            Some(found)
        }
    }
}

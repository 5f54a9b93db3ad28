use crate::bbox::BoundingBox;
use crate::math::{round_half_even, Moments};
use crate::tracker::WindowSearch;

use log::debug;
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};

/// Stop after `max_iter` iterations or once the window moves by less than `epsilon`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TermCriteria {
    pub max_iter: usize,
    pub epsilon: f64,
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self {
            max_iter: 10,
            epsilon: 1.0,
        }
    }
}

/// Moves a fixed-size window toward the centroid of `prob` until it settles.
///
/// Returns the number of iterations performed and the final window. The
/// window is kept inside the map; its size only shrinks if it initially
/// extends past the map border.
pub fn mean_shift(
    prob: ArrayView2<'_, f32>,
    window: BoundingBox,
    criteria: &TermCriteria,
) -> (usize, BoundingBox) {
    let (rows, cols) = (prob.nrows() as i32, prob.ncols() as i32);
    if window.is_degenerate() || rows == 0 || cols == 0 {
        return (0, window);
    }

    let frame = BoundingBox::new(0, 0, cols, rows);
    let window = window.intersect(&frame);
    let eps = (criteria.epsilon.max(0.0) * criteria.epsilon.max(0.0)).round() as i32;
    let max_iter = criteria.max_iter.max(1);

    let mut cur = window;
    let mut iter = 0;

    while iter < max_iter {
        cur = cur.intersect(&frame);
        if cur == BoundingBox::default() {
            cur.x = cols / 2;
            cur.y = rows / 2;
        }
        cur.width = cur.width.max(1);
        cur.height = cur.height.max(1);

        let m = Moments::of_window(prob, &cur);
        if m.is_empty() {
            break;
        }

        let dx = round_half_even(m.m10 / m.m00 - window.width as f64 * 0.5) as i32;
        let dy = round_half_even(m.m01 / m.m00 - window.height as f64 * 0.5) as i32;

        let nx = (cur.x + dx).max(0).min(cols - cur.width);
        let ny = (cur.y + dy).max(0).min(rows - cur.height);

        let (dx, dy) = (nx - cur.x, ny - cur.y);
        cur.x = nx;
        cur.y = ny;

        if dx * dx + dy * dy < eps {
            break;
        }

        iter += 1;
    }

    debug!("mean shift settled at {:?} after {} iterations", cur, iter);

    (iter, cur)
}

/// Fixed-size window search: only the position of the window changes
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanShift;

impl WindowSearch for MeanShift {
    const NAME: &'static str = "MeanShift";

    fn search(
        &self,
        prob: ArrayView2<'_, f32>,
        window: BoundingBox,
        criteria: &TermCriteria,
    ) -> Option<BoundingBox> {
        let (_, found) = mean_shift(prob, window, criteria);

        if found.is_degenerate() {
            None
        } else {
            Some(found)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(rows: usize, cols: usize, rect: BoundingBox) -> Array2<f32> {
        let mut prob = Array2::zeros((rows, cols));
        prob.slice_mut(s![
            rect.top() as usize..rect.bottom() as usize,
            rect.left() as usize..rect.right() as usize
        ])
        .fill(255.0);
        prob
    }

    #[test]
    fn stays_on_centered_target() {
        let prob = blob(100, 100, BoundingBox::new(40, 40, 11, 11));
        let (iters, found) = mean_shift(
            prob.view(),
            BoundingBox::new(35, 35, 21, 21),
            &TermCriteria::default(),
        );

        assert_eq!(iters, 0);
        assert_eq!(found, BoundingBox::new(35, 35, 21, 21));
    }

    #[test]
    fn follows_displaced_target() {
        let prob = blob(100, 100, BoundingBox::new(50, 44, 11, 11));
        let (_, found) = mean_shift(
            prob.view(),
            BoundingBox::new(35, 35, 21, 21),
            &TermCriteria::default(),
        );

        assert_eq!(found.width, 21);
        assert_eq!(found.height, 21);
        assert!((found.center().x - 55.0).abs() <= 1.0, "{:?}", found);
        assert!((found.center().y - 49.5).abs() <= 1.0, "{:?}", found);
    }

    #[test]
    fn iteration_limit_is_respected() {
        let prob = blob(200, 200, BoundingBox::new(150, 150, 10, 10));
        let criteria = TermCriteria {
            max_iter: 1,
            epsilon: 1.0,
        };
        let (iters, _) = mean_shift(prob.view(), BoundingBox::new(140, 140, 20, 20), &criteria);
        assert!(iters <= 1);
    }

    #[test]
    fn empty_map_keeps_window() {
        let prob = Array2::<f32>::zeros((50, 50));
        let (iters, found) = mean_shift(
            prob.view(),
            BoundingBox::new(10, 10, 5, 5),
            &TermCriteria::default(),
        );

        assert_eq!(iters, 0);
        assert_eq!(found, BoundingBox::new(10, 10, 5, 5));
    }

    #[test]
    fn window_is_kept_inside_map() {
        let prob = blob(60, 60, BoundingBox::new(50, 50, 10, 10));
        let (_, found) = mean_shift(
            prob.view(),
            BoundingBox::new(40, 40, 20, 20),
            &TermCriteria::default(),
        );

        assert!(found.right() <= 60 && found.bottom() <= 60);
        assert_eq!(found.width, 20);
    }

    #[test]
    fn default_criteria() {
        let c = TermCriteria::default();
        assert_eq!(c.max_iter, 10);
        assert_eq!(c.epsilon, 1.0);
    }
}

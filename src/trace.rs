use nalgebra as na;
use serde_derive::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 500;

/// Line segment between two consecutive trace points
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: [f32; 2],
    pub to: [f32; 2],
    /// Fades from the oldest segment toward 1 for the newest
    pub alpha: f32,
    pub thickness: u32,
}

/// Bounded history of target centers
#[derive(Debug, Clone)]
pub struct Trace {
    points: VecDeque<na::Point2<f32>>,
    capacity: usize,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Trace {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Lost frames (`None`) leave the trace untouched
    pub fn push(&mut self, center: Option<na::Point2<f32>>) {
        if let Some(pt) = center {
            if self.points.len() == self.capacity {
                self.points.pop_front();
            }

            self.points.push_back(pt);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &na::Point2<f32>> + '_ {
        self.points.iter()
    }

    pub fn segments(&self) -> Vec<Segment> {
        let len = self.points.len();

        (1..len)
            .map(|i| {
                let (a, b) = (self.points[i - 1], self.points[i]);
                let alpha = i as f32 / len as f32;

                Segment {
                    from: [a.x, a.y],
                    to: [b.x, b.y],
                    alpha,
                    thickness: ((3.0 * alpha) as u32).max(1),
                }
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

use crate::bbox::BoundingBox;
use crate::color::ColorSpace;
use crate::error::InitializationError;
use crate::frame::Frame;
use crate::histogram::Histogram;
use crate::math::mean_std;

use log::debug;
use ndarray::prelude::*;
use ndarray::Zip;

/// Default width of the sample envelope, in standard deviations
pub const DEFAULT_TOLERANCE: f32 = 1.5;

/// Inclusive per-channel value bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

impl Envelope {
    /// `mean ± tolerance·σ` of every channel of `sample`, clamped to the legal
    /// range of the channel in `space`
    pub fn of_sample(sample: ArrayView3<'_, u8>, space: ColorSpace, tolerance: f32) -> Self {
        let mut lower = [0.0; 3];
        let mut upper = [0.0; 3];

        for c in 0..3 {
            let (mean, std) = mean_std(sample.index_axis(Axis(2), c).iter().copied())
                .unwrap_or((0.0, 0.0));
            let spread = tolerance as f64 * std;

            lower[c] = ((mean - spread) as f32).max(0.0);
            upper[c] = ((mean + spread) as f32).min(space.channel_max(c));
        }

        Self { lower, upper }
    }

    /// Bounds are rounded to the pixel type before the inclusive comparison
    #[inline]
    pub fn contains(&self, px: ArrayView1<'_, u8>) -> bool {
        (0..3).all(|c| {
            let v = px[c] as f32;
            v >= self.lower[c].round() && v <= self.upper[c].round()
        })
    }

    pub fn mask(&self, img: ArrayView3<'_, u8>) -> Array2<bool> {
        let (h, w, _) = img.dim();
        let mut mask = Array2::from_elem((h, w), false);

        Zip::from(&mut mask)
            .and(img.lanes(Axis(2)))
            .for_each(|m, px| *m = self.contains(px));

        mask
    }
}

/// Color distribution of the tracked target.
///
/// Built once from the initial region and never adapted afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceModel {
    space: ColorSpace,
    histogram: Histogram,
}

impl AppearanceModel {
    pub fn build(
        frame: &Frame,
        bbox: &BoundingBox,
        space: ColorSpace,
        tolerance: f32,
    ) -> Result<Self, InitializationError> {
        if bbox.is_degenerate() {
            return Err(InitializationError::DegenerateRegion { bbox: *bbox });
        }

        let (width, height) = frame.dims();
        let sample = frame
            .crop(bbox)
            .ok_or(InitializationError::OutsideFrame {
                bbox: *bbox,
                width,
                height,
            })?;

        let converted = space.convert(sample);
        let mask = if space == ColorSpace::Hsv {
            let envelope = Envelope::of_sample(converted.view(), space, tolerance);
            debug!(
                "sample envelope lower={:?} upper={:?}",
                envelope.lower, envelope.upper
            );

            Some(envelope.mask(converted.view()))
        } else {
            None
        };

        let mut histogram =
            Histogram::calc(converted.view(), space.profile(), mask.as_ref().map(|m| m.view()));

        if histogram.is_empty() {
            return Err(InitializationError::EmptyModel);
        }

        histogram.normalize(0.0, 255.0);

        Ok(Self { space, histogram })
    }

    #[inline]
    pub fn space(&self) -> ColorSpace {
        self.space
    }

    #[inline]
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Probability map of `frame`, same spatial size as the frame
    pub fn back_project(&self, frame: &Frame) -> Array2<f32> {
        let converted = self.space.convert(frame.view());
        self.histogram.back_project(converted.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::HUE_MAX;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];

    fn scene() -> Frame {
        let mut frame = Frame::filled(0, 200, 200, BLUE);
        frame.fill_rect(&BoundingBox::new(54, 54, 43, 43), RED);
        frame
    }

    #[test]
    fn envelope_clamps_hue_and_value() {
        let sample = Array3::from_shape_fn((1, 4, 3), |(_, x, c)| match c {
            0 => [0u8, 179, 179, 179][x],
            1 => [0u8, 0, 0, 255][x],
            _ => [10u8, 255, 255, 255][x],
        });

        let env = Envelope::of_sample(sample.view(), ColorSpace::Hsv, 1.5);
        assert_eq!(env.upper[0], HUE_MAX);
        assert_eq!(env.lower[1], 0.0);
        assert_eq!(env.upper[2], 255.0);
    }

    #[test]
    fn uniform_sample_has_tight_envelope() {
        let sample = Array3::from_elem((3, 3, 3), 42u8);
        let env = Envelope::of_sample(sample.view(), ColorSpace::Hsv, 1.5);

        assert_eq!(env.lower, [42.0; 3]);
        assert_eq!(env.upper, [42.0; 3]);
        assert!(env.contains(sample.slice(s![0, 0, ..])));
    }

    #[test]
    fn gating_drops_background_leakage() {
        let frame = scene();
        let model =
            AppearanceModel::build(&frame, &BoundingBox::new(50, 50, 50, 50), ColorSpace::Hsv, 1.5)
                .unwrap();

        let hist = model.histogram();
        assert_eq!(hist.get(&[0]), Some(255.0));
        assert_eq!(hist.get(&[120]), Some(0.0));
    }

    #[test]
    fn without_gating_background_leaks() {
        let frame = scene();
        let model = AppearanceModel::build(
            &frame,
            &BoundingBox::new(50, 50, 50, 50),
            ColorSpace::YCrCb,
            1.5,
        )
        .unwrap();

        let (_, hi) = model.histogram().min_max();
        assert_eq!(hi, 255.0);
        let prob = model.back_project(&frame);
        assert!(prob[[0, 0]] > 0.0);
        assert_eq!(prob[[75, 75]], 255.0);
    }

    #[test]
    fn back_projection_highlights_target() {
        let frame = scene();
        let model =
            AppearanceModel::build(&frame, &BoundingBox::new(50, 50, 50, 50), ColorSpace::Hsv, 1.5)
                .unwrap();

        let prob = model.back_project(&frame);
        assert_eq!(prob.dim(), (200, 200));
        assert_eq!(prob[[75, 75]], 255.0);
        assert_eq!(prob[[10, 10]], 0.0);
    }

    #[test]
    fn rejects_bad_regions() {
        let frame = scene();

        assert_eq!(
            AppearanceModel::build(&frame, &BoundingBox::new(10, 10, 0, 5), ColorSpace::Hsv, 1.5),
            Err(InitializationError::DegenerateRegion {
                bbox: BoundingBox::new(10, 10, 0, 5)
            })
        );

        assert!(matches!(
            AppearanceModel::build(&frame, &BoundingBox::new(500, 10, 5, 5), ColorSpace::Hsv, 1.5),
            Err(InitializationError::OutsideFrame { .. })
        ));

        let far = BoundingBox::new(i32::MAX - 5, 0, 10, 10);
        assert_eq!(
            AppearanceModel::build(&frame, &far, ColorSpace::Hsv, 1.5),
            Err(InitializationError::OutsideFrame {
                bbox: far,
                width: frame.width(),
                height: frame.height(),
            })
        );
    }
}

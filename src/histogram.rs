use crate::color::ColorSpaceProfile;

use ndarray::prelude::*;
use ndarray::Zip;

const MAX_DIMS: usize = 3;

/// Multi-dimensional frequency table over the bins of a color space profile
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    profile: &'static ColorSpaceProfile,
    bins: ArrayD<f32>,
}

impl Histogram {
    /// Accumulates every pixel of `img` (already in the profile's color space)
    /// for which `mask` is set
    pub fn calc(
        img: ArrayView3<'_, u8>,
        profile: &'static ColorSpaceProfile,
        mask: Option<ArrayView2<'_, bool>>,
    ) -> Self {
        let mut bins = ArrayD::<f32>::zeros(IxDyn(profile.bins));

        Zip::indexed(img.lanes(Axis(2))).for_each(|(y, x), px| {
            if let Some(mask) = &mask {
                if !mask[[y, x]] {
                    return;
                }
            }

            let mut idx = [0usize; MAX_DIMS];
            if bin_index(profile, px, &mut idx) {
                bins[&idx[..profile.dims()]] += 1.0;
            }
        });

        Self { profile, bins }
    }

    #[inline]
    pub fn profile(&self) -> &'static ColorSpaceProfile {
        self.profile
    }

    #[inline]
    pub fn values(&self) -> ArrayViewD<'_, f32> {
        self.bins.view()
    }

    #[inline]
    pub fn get(&self, idx: &[usize]) -> Option<f32> {
        self.bins.get(idx).copied()
    }

    #[inline]
    pub fn total(&self) -> f32 {
        self.bins.sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(|&v| v == 0.0)
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.bins
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Linearly maps the smallest bin to `lo` and the largest to `hi`.
    /// A flat histogram collapses to `lo`.
    pub fn normalize(&mut self, lo: f32, hi: f32) {
        let (smin, smax) = self.min_max();
        let spread = smax - smin;
        let scale = if spread > f32::EPSILON {
            (hi - lo) / spread
        } else {
            0.0
        };
        let shift = lo - smin * scale;

        self.bins.mapv_inplace(|v| v * scale + shift);
    }

    /// Per-pixel lookup of the bin value, saturated to the 8-bit range.
    /// Pixels falling outside the profile ranges map to zero.
    pub fn back_project(&self, img: ArrayView3<'_, u8>) -> Array2<f32> {
        let (h, w, _) = img.dim();
        let mut out = Array2::<f32>::zeros((h, w));
        let dims = self.profile.dims();

        Zip::from(&mut out)
            .and(img.lanes(Axis(2)))
            .for_each(|dst, px| {
                let mut idx = [0usize; MAX_DIMS];
                if bin_index(self.profile, px, &mut idx) {
                    *dst = self.bins[&idx[..dims]].round().clamp(0.0, 255.0);
                }
            });

        out
    }
}

/// Uniform binning: `floor((v - low) * bins / (high - low))`
#[inline]
fn bin_index(
    profile: &ColorSpaceProfile,
    px: ArrayView1<'_, u8>,
    idx: &mut [usize; MAX_DIMS],
) -> bool {
    for (dim, &channel) in profile.channels.iter().enumerate() {
        let (low, high) = profile.range(dim);
        let nbins = profile.bins[dim];
        let v = px[channel] as f32;

        let bin = ((v - low) * nbins as f32 / (high - low)).floor();
        if bin < 0.0 || bin >= nbins as f32 {
            return false;
        }

        idx[dim] = bin as usize;
    }

    true
}

use ndarray::prelude::*;
use ndarray::Zip;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Hsv,
    Rgb,
    YCrCb,
    Lab,
}

impl FromStr for ColorSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hsv" => Ok(ColorSpace::Hsv),
            "rgb" => Ok(ColorSpace::Rgb),
            "ycrcb" => Ok(ColorSpace::YCrCb),
            "lab" => Ok(ColorSpace::Lab),
            other => Err(format!(
                "unknown color space `{}` (expected hsv, rgb, ycrcb or lab)",
                other
            )),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorSpace::Hsv => "hsv",
            ColorSpace::Rgb => "rgb",
            ColorSpace::YCrCb => "ycrcb",
            ColorSpace::Lab => "lab",
        };

        f.write_str(name)
    }
}

/// How a frame is bucketed into a histogram for one color space.
///
/// `ranges` holds a `[low, high)` pair per histogrammed channel.
#[derive(Debug, PartialEq)]
pub struct ColorSpaceProfile {
    pub space: ColorSpace,
    pub channels: &'static [usize],
    pub ranges: &'static [f32],
    pub bins: &'static [usize],
}

pub static HSV: ColorSpaceProfile = ColorSpaceProfile {
    space: ColorSpace::Hsv,
    channels: &[0],
    ranges: &[0.0, 180.0],
    bins: &[180],
};

pub static RGB: ColorSpaceProfile = ColorSpaceProfile {
    space: ColorSpace::Rgb,
    channels: &[0, 1, 2],
    ranges: &[0.0, 256.0, 0.0, 256.0, 0.0, 256.0],
    bins: &[8, 8, 8],
};

pub static YCRCB: ColorSpaceProfile = ColorSpaceProfile {
    space: ColorSpace::YCrCb,
    channels: &[1, 2],
    ranges: &[0.0, 256.0, 0.0, 256.0],
    bins: &[32, 32],
};

pub static LAB: ColorSpaceProfile = ColorSpaceProfile {
    space: ColorSpace::Lab,
    channels: &[1, 2],
    ranges: &[0.0, 256.0, 0.0, 256.0],
    bins: &[32, 32],
};

/// Largest legal hue value in the 8-bit HSV encoding
pub const HUE_MAX: f32 = 179.0;

impl ColorSpaceProfile {
    /// Number of histogram dimensions
    #[inline]
    pub fn dims(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn range(&self, dim: usize) -> (f32, f32) {
        (self.ranges[2 * dim], self.ranges[2 * dim + 1])
    }

    pub fn is_consistent(&self) -> bool {
        self.channels.len() == self.bins.len()
            && self.ranges.len() == 2 * self.channels.len()
            && self.channels.iter().all(|&c| c < 3)
            && self.bins.iter().all(|&b| b > 0)
            && self.ranges.chunks(2).all(|r| r[0] < r[1])
    }
}

impl ColorSpace {
    pub const ALL: [ColorSpace; 4] = [
        ColorSpace::Hsv,
        ColorSpace::Rgb,
        ColorSpace::YCrCb,
        ColorSpace::Lab,
    ];

    pub fn profile(self) -> &'static ColorSpaceProfile {
        match self {
            ColorSpace::Hsv => &HSV,
            ColorSpace::Rgb => &RGB,
            ColorSpace::YCrCb => &YCRCB,
            ColorSpace::Lab => &LAB,
        }
    }

    /// Largest legal 8-bit value of `channel` in this color space
    #[inline]
    pub fn channel_max(self, channel: usize) -> f32 {
        match (self, channel) {
            (ColorSpace::Hsv, 0) => HUE_MAX,
            _ => 255.0,
        }
    }

    #[inline]
    pub fn convert_pixel(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            ColorSpace::Hsv => rgb_to_hsv(rgb),
            ColorSpace::Rgb => rgb,
            ColorSpace::YCrCb => rgb_to_ycrcb(rgb),
            ColorSpace::Lab => rgb_to_lab(rgb),
        }
    }

    /// Converts an RGB `height x width x 3` image into this color space
    pub fn convert(self, img: ArrayView3<'_, u8>) -> Array3<u8> {
        if self == ColorSpace::Rgb {
            return img.to_owned();
        }

        let mut out = Array3::zeros(img.raw_dim());
        Zip::from(out.lanes_mut(Axis(2)))
            .and(img.lanes(Axis(2)))
            .for_each(|mut dst, src| {
                let px = self.convert_pixel([src[0], src[1], src[2]]);
                dst[0] = px[0];
                dst[1] = px[1];
                dst[2] = px[2];
            });

        out
    }
}

#[inline(always)]
fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// 8-bit HSV with hue halved into [0, 180)
fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);

    let s = if v == 0 {
        0.0
    } else {
        diff as f32 * 255.0 / v as f32
    };

    let h = if diff == 0 {
        0
    } else {
        let num = if v == r {
            g - b
        } else if v == g {
            b - r + 2 * diff
        } else {
            r - g + 4 * diff
        };

        let h = (num as f32 * 30.0 / diff as f32 + 0.5).floor() as i32;
        if h < 0 {
            h + 180
        } else {
            h
        }
    };

    [h as u8, saturate(s), v as u8]
}

fn rgb_to_ycrcb([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = (r - y) * 0.713 + 128.0;
    let cb = (b - y) * 0.564 + 128.0;

    [saturate(y), saturate(cr), saturate(cb)]
}

fn rgb_to_lab([r, g, b]: [u8; 3]) -> [u8; 3] {
    fn linear(c: u8) -> f32 {
        let c = c as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    fn f(t: f32) -> f32 {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    }

    let (r, g, b) = (linear(r), linear(g), linear(b));

    // D65 white point
    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let (fx, fy, fz) = (f(x), f(y), f(z));
    let l = if y > 0.008856 {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };

    [
        saturate(l * 255.0 / 100.0),
        saturate(500.0 * (fx - fy) + 128.0),
        saturate(200.0 * (fy - fz) + 128.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_consistent() {
        for cs in ColorSpace::ALL {
            let p = cs.profile();
            assert_eq!(p.space, cs);
            assert_eq!(p.channels.len(), p.bins.len());
            assert_eq!(p.ranges.len(), 2 * p.channels.len());
            assert!(p.is_consistent());
        }
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(ColorSpace::Hsv.convert_pixel([255, 0, 0]), [0, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([0, 255, 0]), [60, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([0, 0, 255]), [120, 255, 255]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([0, 0, 0]), [0, 0, 0]);
        assert_eq!(ColorSpace::Hsv.convert_pixel([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn hsv_hue_wraps_into_range() {
        // magenta-ish red: hue slightly below zero wraps to the top of the range
        let [h, _, _] = ColorSpace::Hsv.convert_pixel([255, 0, 20]);
        assert!(h as f32 <= HUE_MAX);
        assert!(h > 170);
    }

    #[test]
    fn ycrcb_gray_is_neutral() {
        assert_eq!(ColorSpace::YCrCb.convert_pixel([100, 100, 100]), [100, 128, 128]);
    }

    #[test]
    fn lab_white_and_black() {
        assert_eq!(ColorSpace::Lab.convert_pixel([255, 255, 255]), [255, 128, 128]);
        assert_eq!(ColorSpace::Lab.convert_pixel([0, 0, 0]), [0, 128, 128]);
    }

    #[test]
    fn convert_image() {
        let mut img = Array3::<u8>::zeros((2, 3, 3));
        img[[1, 2, 2]] = 255;

        let hsv = ColorSpace::Hsv.convert(img.view());
        assert_eq!(hsv.shape(), &[2, 3, 3]);
        assert_eq!(hsv[[1, 2, 0]], 120);
        assert_eq!(hsv[[0, 0, 2]], 0);

        assert_eq!(ColorSpace::Rgb.convert(img.view()), img);
    }

    #[test]
    fn parse_and_display() {
        for cs in ColorSpace::ALL {
            assert_eq!(cs.to_string().parse::<ColorSpace>(), Ok(cs));
        }
        assert_eq!("YCrCb".parse::<ColorSpace>(), Ok(ColorSpace::YCrCb));
        assert!("xyz".parse::<ColorSpace>().is_err());
    }

    #[test]
    fn serde_names() {
        assert_eq!(serde_json::to_string(&ColorSpace::YCrCb).unwrap(), "\"ycrcb\"");
        let cs: ColorSpace = serde_json::from_str("\"lab\"").unwrap();
        assert_eq!(cs, ColorSpace::Lab);
    }
}

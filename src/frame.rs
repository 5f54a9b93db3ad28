use crate::bbox::BoundingBox;
use crate::error::Error;

use image::{imageops::FilterType, RgbImage};
use ndarray::prelude::*;

/// Decoded RGB frame, stored as a `height x width x 3` array
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    data: Array3<u8>,
}

impl Frame {
    pub fn new(index: usize, data: Array3<u8>) -> Result<Self, Error> {
        let shape = data.shape();
        if shape[2] != 3 {
            return Err(Error::Frame(format!(
                "expected 3 channels, got {}",
                shape[2]
            )));
        }

        if shape[0] == 0 || shape[1] == 0 {
            return Err(Error::Frame("empty frame".into()));
        }

        Ok(Self { index, data })
    }

    /// Solid color frame
    pub fn filled(index: usize, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = Array3::from_shape_fn((height as usize, width as usize, 3), |(_, _, c)| rgb[c]);

        Self { index, data }
    }

    pub fn from_image(index: usize, img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let data = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
            img.get_pixel(x as u32, y as u32)[c]
        });

        Self { index, data }
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        let (w, h) = self.dims();
        let raw = self.data.as_standard_layout().into_owned().into_raw_vec();

        RgbImage::from_raw(w, h, raw)
    }

    /// (width, height)
    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.data.shape()[1] as u32
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.data.shape()[0] as u32
    }

    #[inline]
    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let p = self.data.slice(s![y as usize, x as usize, ..]);
        [p[0], p[1], p[2]]
    }

    /// Part of the frame covered by `bbox`, clipped to the frame bounds
    pub fn crop(&self, bbox: &BoundingBox) -> Option<ArrayView3<'_, u8>> {
        let clipped = bbox.clip(self.width(), self.height());
        if clipped.is_degenerate() {
            return None;
        }

        Some(self.data.slice(s![
            clipped.top() as usize..clipped.bottom() as usize,
            clipped.left() as usize..clipped.right() as usize,
            ..
        ]))
    }

    pub fn fill_rect(&mut self, bbox: &BoundingBox, rgb: [u8; 3]) {
        let clipped = bbox.clip(self.width(), self.height());
        if clipped.is_degenerate() {
            return;
        }

        let mut region = self.data.slice_mut(s![
            clipped.top() as usize..clipped.bottom() as usize,
            clipped.left() as usize..clipped.right() as usize,
            ..
        ]);

        for mut px in region.lanes_mut(Axis(2)) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
    }

    /// Downscales frames wider than `max_width`, keeping the aspect ratio
    pub fn downscaled(self, max_width: u32) -> Result<Self, Error> {
        let (w, h) = self.dims();
        if w <= max_width {
            return Ok(self);
        }

        let scale = max_width as f64 / w as f64;
        let new_w = ((w as f64 * scale) as u32).max(1);
        let new_h = ((h as f64 * scale) as u32).max(1);

        let img = self
            .to_image()
            .ok_or_else(|| Error::Frame("buffer does not match frame size".into()))?;
        let resized = image::imageops::resize(&img, new_w, new_h, FilterType::Triangle);

        Ok(Self::from_image(self.index, &resized))
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use crate::bbox::BoundingBox;
    use ndarray::Array3;

    #[test]
    fn rejects_wrong_channel_count() {
        assert!(Frame::new(0, Array3::zeros((4, 4, 1))).is_err());
        assert!(Frame::new(0, Array3::zeros((0, 4, 3))).is_err());
        assert!(Frame::new(0, Array3::zeros((4, 4, 3))).is_ok());
    }

    #[test]
    fn fill_and_crop() {
        let mut frame = Frame::filled(0, 20, 10, [0, 0, 255]);
        frame.fill_rect(&BoundingBox::new(2, 3, 4, 5), [255, 0, 0]);

        assert_eq!(frame.dims(), (20, 10));
        assert_eq!(frame.pixel(2, 3), [255, 0, 0]);
        assert_eq!(frame.pixel(6, 3), [0, 0, 255]);

        let crop = frame.crop(&BoundingBox::new(15, 5, 10, 10)).unwrap();
        assert_eq!(crop.shape(), &[5, 5, 3]);
        assert!(frame.crop(&BoundingBox::new(30, 30, 5, 5)).is_none());
    }

    #[test]
    fn downscale_keeps_aspect() {
        let frame = Frame::filled(7, 640, 360, [10, 20, 30]);
        let small = frame.downscaled(320).unwrap();

        assert_eq!(small.dims(), (320, 180));
        assert_eq!(small.index, 7);
        assert_eq!(small.pixel(160, 90), [10, 20, 30]);
    }

    #[test]
    fn narrow_frames_are_untouched() {
        let frame = Frame::filled(0, 640, 480, [1, 2, 3]);
        let same = frame.clone().downscaled(1600).unwrap();
        assert_eq!(same, frame);
    }

    #[test]
    fn image_round_trip() {
        let mut frame = Frame::filled(0, 8, 6, [0, 128, 0]);
        frame.fill_rect(&BoundingBox::new(1, 1, 2, 2), [200, 100, 50]);

        let img = frame.to_image().unwrap();
        assert_eq!(Frame::from_image(0, &img), frame);
    }
}

use crate::error::Error;
use crate::frame::Frame;

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Widest frame handed to trackers by default
pub const DEFAULT_MAX_WIDTH: u32 = 1600;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Sequential supplier of decoded frames
pub trait FrameSource: Send {
    fn open(&mut self, path: &Path) -> Result<(), Error>;

    /// `Ok(None)` at the end of the stream
    fn read_frame(&mut self) -> Result<Option<Frame>, Error>;

    /// Rewinds to the first frame
    fn reset(&mut self) -> Result<(), Error>;

    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    #[inline]
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        (**self).open(path)
    }

    #[inline]
    fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        (**self).read_frame()
    }

    #[inline]
    fn reset(&mut self) -> Result<(), Error> {
        (**self).reset()
    }

    #[inline]
    fn release(&mut self) {
        (**self).release()
    }
}

/// Frames already held in memory; cheap to clone into many sessions.
///
/// `open` ignores the path and rewinds.
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Arc<[Frame]>,
    cursor: usize,
}

impl MemorySource {
    pub fn new<F: Into<Arc<[Frame]>>>(frames: F) -> Self {
        Self {
            frames: frames.into(),
            cursor: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self, _path: &Path) -> Result<(), Error> {
        self.cursor = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        let frame = self.frames.get(self.cursor).cloned().map(|mut f| {
            f.index = self.cursor;
            f
        });

        if frame.is_some() {
            self.cursor += 1;
        }

        Ok(frame)
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.cursor = 0;
        Ok(())
    }

    fn release(&mut self) {}
}

/// Directory of still images played back in file name order
#[derive(Debug, Default, Clone)]
pub struct ImageSequenceSource {
    files: Option<Vec<PathBuf>>,
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        if !path.is_dir() {
            return Err(Error::Config(format!(
                "{} is not an image directory (video files require the `opencv` feature)",
                path.display()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file = entry?.path();
            if file.is_file() && Self::is_image(&file) {
                files.push(file);
            }
        }

        if files.is_empty() {
            return Err(Error::Config(format!(
                "no images found in {}",
                path.display()
            )));
        }

        files.sort();
        info!("opened {} with {} frames", path.display(), files.len());

        self.files = Some(files);
        self.cursor = 0;

        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        let files = self.files.as_ref().ok_or(Error::NotOpened)?;

        let file = match files.get(self.cursor) {
            Some(file) => file,
            None => return Ok(None),
        };

        let img = image::open(file)?.to_rgb8();
        let frame = Frame::from_image(self.cursor, &img);
        self.cursor += 1;

        Ok(Some(frame))
    }

    fn reset(&mut self) -> Result<(), Error> {
        if self.files.is_none() {
            return Err(Error::NotOpened);
        }

        self.cursor = 0;
        Ok(())
    }

    fn release(&mut self) {
        self.files = None;
        self.cursor = 0;
    }
}

/// Applies the maximum width policy to every frame of `inner`
#[derive(Debug, Clone)]
pub struct Downscaled<S> {
    inner: S,
    max_width: u32,
}

impl<S: FrameSource> Downscaled<S> {
    pub fn new(inner: S, max_width: u32) -> Self {
        Self {
            inner,
            max_width: max_width.max(1),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for Downscaled<S> {
    #[inline]
    fn open(&mut self, path: &Path) -> Result<(), Error> {
        self.inner.open(path)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        match self.inner.read_frame()? {
            Some(frame) => Ok(Some(frame.downscaled(self.max_width)?)),
            None => Ok(None),
        }
    }

    #[inline]
    fn reset(&mut self) -> Result<(), Error> {
        self.inner.reset()
    }

    #[inline]
    fn release(&mut self) {
        self.inner.release()
    }
}

#[cfg(feature = "opencv")]
pub use self::video::VideoSource;

#[cfg(feature = "opencv")]
mod video {
    use super::*;
    use log::warn;
    use ndarray::Array3;
    use opencv::{core::Mat, imgproc, prelude::*, videoio};

    /// Video file decoded with OpenCV
    #[derive(Default)]
    pub struct VideoSource {
        cap: Option<videoio::VideoCapture>,
        index: usize,
    }

    impl VideoSource {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl FrameSource for VideoSource {
        fn open(&mut self, path: &Path) -> Result<(), Error> {
            self.release();

            let name = path
                .to_str()
                .ok_or_else(|| Error::Config(format!("invalid path {}", path.display())))?;
            let cap = videoio::VideoCapture::from_file(name, videoio::CAP_ANY)?;

            if !cap.is_opened()? {
                return Err(Error::Config(format!("unable to open {}", path.display())));
            }

            let total = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
            info!("opened {} with {} frames", path.display(), total);

            self.cap = Some(cap);
            self.index = 0;

            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
            let cap = self.cap.as_mut().ok_or(Error::NotOpened)?;
            let mut mat = Mat::default();

            if !cap.read(&mut mat)? || mat.rows() == 0 || mat.cols() == 0 {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let (rows, cols) = (rgb.rows() as usize, rgb.cols() as usize);
            let data = rgb.data_bytes()?.to_vec();
            let data = Array3::from_shape_vec((rows, cols, 3), data)
                .map_err(|err| Error::Frame(err.to_string()))?;

            let frame = Frame::new(self.index, data)?;
            self.index += 1;

            Ok(Some(frame))
        }

        fn reset(&mut self) -> Result<(), Error> {
            let cap = self.cap.as_mut().ok_or(Error::NotOpened)?;
            cap.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
            self.index = 0;

            Ok(())
        }

        fn release(&mut self) {
            if let Some(mut cap) = self.cap.take() {
                if let Err(err) = cap.release() {
                    warn!("failed to release capture: {}", err);
                }
            }
        }
    }
}

/// Source able to decode `path`, with the maximum width policy applied
pub fn for_path(path: &Path, max_width: u32) -> Box<dyn FrameSource> {
    #[cfg(feature = "opencv")]
    {
        if !path.is_dir() {
            debug!("decoding {} with opencv", path.display());
            return Box::new(Downscaled::new(VideoSource::new(), max_width));
        }
    }

    debug!("reading {} as an image sequence", path.display());
    Box::new(Downscaled::new(ImageSequenceSource::new(), max_width))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize, width: u32) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::filled(100 + i, width, width / 2, [i as u8, 0, 0]))
            .collect()
    }

    #[test]
    fn memory_source_reads_and_rewinds() {
        let mut src = MemorySource::new(frames(3, 8));
        src.open(Path::new("")).unwrap();

        let mut seen = Vec::new();
        while let Some(f) = src.read_frame().unwrap() {
            seen.push((f.index, f.pixel(0, 0)[0]));
        }
        assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2)]);
        assert!(src.read_frame().unwrap().is_none());

        src.reset().unwrap();
        assert_eq!(src.read_frame().unwrap().unwrap().index, 0);
    }

    #[test]
    fn downscaled_source_limits_width() {
        let mut src = Downscaled::new(MemorySource::new(frames(2, 64)), 32);
        src.open(Path::new("")).unwrap();

        let f = src.read_frame().unwrap().unwrap();
        assert_eq!(f.dims(), (32, 16));
    }

    #[test]
    fn image_sequence_requires_open() {
        let mut src = ImageSequenceSource::new();
        assert!(matches!(src.read_frame(), Err(Error::NotOpened)));
        assert!(src.open(Path::new("/definitely/not/here.mp4")).is_err());
    }

    #[test]
    fn image_extensions() {
        assert!(ImageSequenceSource::is_image(Path::new("a/0001.PNG")));
        assert!(ImageSequenceSource::is_image(Path::new("b.jpeg")));
        assert!(!ImageSequenceSource::is_image(Path::new("clip.mp4")));
        assert!(!ImageSequenceSource::is_image(Path::new("noext")));
    }
}

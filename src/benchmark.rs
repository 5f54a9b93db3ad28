use crate::bbox::BoundingBox;
use crate::config::{ReferencePolicy, RunConfig};
use crate::error::Error;
use crate::frame::Frame;
use crate::report::{BenchmarkResult, FrameRecord, ModelRecords};
use crate::source::{self, FrameSource};
use crate::Tracker;

use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Receives `(completed, total, message)` as the run advances
pub trait ProgressSink: Sync {
    fn report(&self, completed: usize, total: usize, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &str) + Sync,
{
    #[inline]
    fn report(&self, completed: usize, total: usize, message: &str) {
        self(completed, total, message)
    }
}

/// Progress sink that drops every report
pub fn no_progress(_completed: usize, _total: usize, _message: &str) {}

type SourceFactory = dyn Fn() -> Box<dyn FrameSource> + Send + Sync;

/// What one configuration produced
#[derive(Debug, Default)]
struct Session {
    frames: Vec<FrameRecord>,
    failure: Option<String>,
}

/// Everything a session needs besides its tracker
#[derive(Clone, Copy)]
struct Clip<'a> {
    open: &'a SourceFactory,
    path: &'a Path,
    roi: BoundingBox,
    cancel: &'a AtomicBool,
}

impl<'a> Clip<'a> {
    #[inline]
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Runs `tracker` over a fresh decode session of the clip
    fn track(&self, label: &str, tracker: &mut dyn Tracker) -> Session {
        let mut source = (self.open)();

        let session = self.track_source(label, tracker, source.as_mut());
        source.release();

        session
    }

    fn track_source(
        &self,
        label: &str,
        tracker: &mut dyn Tracker,
        source: &mut dyn FrameSource,
    ) -> Session {
        let mut session = Session::default();

        if let Err(err) = source.open(self.path) {
            warn!("[{}] unable to open {}: {}", label, self.path.display(), err);
            session.failure = Some(err.to_string());
            return session;
        }

        let first: Frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("[{}] {} has no frames", label, self.path.display());
                return session;
            }
            Err(err) => {
                warn!("[{}] unable to decode first frame: {}", label, err);
                session.failure = Some(err.to_string());
                return session;
            }
        };

        tracker.reset();
        if let Err(err) = tracker.init(&first, self.roi) {
            warn!("[{}] failed to init: {}", label, err);
            session.failure = Some(err.to_string());
            return session;
        }

        let mut index = 0;
        loop {
            if self.cancelled() {
                warn!("[{}] cancelled after {} frames", label, index);
                break;
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    warn!("[{}] decoding stopped at frame {}: {}", label, index, err);
                    break;
                }
            };

            let record = match tracker.update(&frame) {
                Some(bbox) if !bbox.is_degenerate() => FrameRecord::tracked(index, &bbox),
                _ => FrameRecord::lost(index),
            };

            debug!("[{}] {:?}", label, record);
            session.frames.push(record);
            index += 1;
        }

        session
    }
}

/// Runs several tracker configurations over the same clip and region and
/// compares them against a reference configuration
pub struct Benchmark {
    video_path: PathBuf,
    roi: BoundingBox,
    configs: Vec<(String, Box<dyn Tracker>)>,
    reference: ReferencePolicy,
    parallel: bool,
    cancel: Arc<AtomicBool>,
    open_source: Box<SourceFactory>,
}

impl Benchmark {
    /// Benchmark over the clip at `video_path`, decoded with the source
    /// matching the path and frames limited to `max_width`
    pub fn new<P: Into<PathBuf>>(video_path: P, roi: BoundingBox, max_width: u32) -> Self {
        let video_path = video_path.into();
        let source_path = video_path.clone();

        Self {
            video_path,
            roi,
            configs: Vec::new(),
            reference: ReferencePolicy::default(),
            parallel: false,
            cancel: Arc::new(AtomicBool::new(false)),
            open_source: Box::new(move || source::for_path(&source_path, max_width)),
        }
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut bench = Self::new(config.video_path.clone(), config.roi, config.max_width)
            .with_reference(config.reference.clone())
            .parallel(config.parallel);

        for entry in &config.trackers {
            bench.push_boxed(entry.label.clone(), entry.tracker.build());
        }

        Ok(bench)
    }

    /// Replaces how decode sessions are opened
    pub fn with_source<F>(mut self, open: F) -> Self
    where
        F: Fn() -> Box<dyn FrameSource> + Send + Sync + 'static,
    {
        self.open_source = Box::new(open);
        self
    }

    pub fn with_reference(mut self, reference: ReferencePolicy) -> Self {
        self.reference = reference;
        self
    }

    /// Runs configurations concurrently on the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn push<L, T>(&mut self, label: L, tracker: T)
    where
        L: Into<String>,
        T: Tracker + 'static,
    {
        self.push_boxed(label.into(), Box::new(tracker));
    }

    pub fn push_boxed(&mut self, label: String, tracker: Box<dyn Tracker>) {
        self.configs.push((label, tracker));
    }

    pub fn with<L, T>(mut self, label: L, tracker: T) -> Self
    where
        L: Into<String>,
        T: Tracker + 'static,
    {
        self.push(label, tracker);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Flag checked between configurations and between frames. Setting it
    /// stops the run with whatever has been recorded so far.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn run(&mut self, progress: &dyn ProgressSink) -> BenchmarkResult {
        let total = self.configs.len();
        let clip = Clip {
            open: &*self.open_source,
            path: &self.video_path,
            roi: self.roi,
            cancel: &self.cancel,
        };

        info!(
            "benchmarking {} configurations on {} from {:?}",
            total,
            self.video_path.display(),
            self.roi
        );

        let sessions: Vec<Option<Session>> = if self.parallel {
            let completed = AtomicUsize::new(0);

            self.configs
                .par_iter_mut()
                .map(|(label, tracker)| {
                    if clip.cancelled() {
                        return None;
                    }

                    let done = completed.load(Ordering::SeqCst);
                    progress.report(done, total, &testing_message(label, done, total));

                    let session = clip.track(label, tracker.as_mut());
                    completed.fetch_add(1, Ordering::SeqCst);
                    info!("[{}] finished with {} frames", label, session.frames.len());

                    Some(session)
                })
                .collect()
        } else {
            let mut sessions = Vec::with_capacity(total);

            for (done, (label, tracker)) in self.configs.iter_mut().enumerate() {
                if clip.cancelled() {
                    break;
                }

                progress.report(done, total, &testing_message(label, done, total));

                let session = clip.track(label, tracker.as_mut());
                info!("[{}] finished with {} frames", label, session.frames.len());

                sessions.push(Some(session));
            }

            sessions
        };

        let mut result = BenchmarkResult::new(self.video_path.display().to_string(), self.roi);
        result.cancelled = clip.cancelled();

        for ((label, _), session) in self.configs.iter().zip(sessions) {
            let session = match session {
                Some(session) => session,
                None => continue,
            };

            if let Some(reason) = session.failure {
                result.failures.insert(label.clone(), reason);
            }

            result.models.insert(
                label.clone(),
                ModelRecords {
                    frames: session.frames,
                },
            );
        }

        if result.cancelled {
            warn!(
                "benchmark cancelled, {} of {} configurations recorded",
                result.models.len(),
                total
            );
        }

        progress.report(
            total,
            total,
            &format!("Calculating errors... ({}/{} completed)", total, total),
        );
        result.compute_errors(&self.reference);

        result
    }
}

#[inline]
fn testing_message(label: &str, done: usize, total: usize) -> String {
    format!("Testing {}... ({}/{} completed)", label, done, total)
}

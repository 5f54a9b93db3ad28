use roi_track::benchmark::{no_progress, Benchmark};
use roi_track::config::RunConfig;
use roi_track::report::BenchmarkResult;
use roi_track::source::{FrameSource, ImageSequenceSource};
use roi_track::{BoundingBox, Error, Frame};
use std::fs;
use std::path::Path;

const RED: [u8; 3] = [255, 0, 0];
const BLUE: [u8; 3] = [0, 0, 255];

/// Red square drifting right over a blue background
fn write_clip(dir: &Path, frames: usize) {
    fs::create_dir_all(dir).unwrap();

    for i in 0..frames {
        let mut frame = Frame::filled(i, 250, 200, BLUE);
        frame.fill_rect(&BoundingBox::new(104 + 2 * i as i32, 84, 43, 43), RED);
        frame
            .to_image()
            .unwrap()
            .save(dir.join(format!("{:04}.png", i)))
            .unwrap();
    }
}

/// Detections matching the drawn square, one line per frame
fn write_detections(path: &Path, frames: usize) {
    let lines: Vec<String> = (0..frames)
        .map(|i| {
            format!(
                "{}:[{{\"x\":{},\"y\":105.5,\"w\":43,\"h\":43,\"p\":0.9,\"c\":2}}]",
                i * 33,
                125.5 + 2.0 * i as f32
            )
        })
        .collect();

    fs::write(path, lines.join("\n")).unwrap();
}

fn write_config(dir: &Path, parallel: bool) -> std::path::PathBuf {
    let config = format!(
        r#"{{
            "video_path": "clip",
            "roi": [100, 80, 50, 50],
            "parallel": {},
            "trackers": [
                {{"label": "CamShift", "tracker": {{"kind": "camshift"}}}},
                {{"label": "MeanShift", "tracker": {{"kind": "meanshift"}}}},
                {{"label": "YOLOv8n", "tracker": {{"kind": "detections", "path": "clip.dets"}}}}
            ]
        }}"#,
        parallel
    );

    let path = dir.join("run.json");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn image_sequence_source_plays_in_order() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(dir.path(), 3);
    fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

    let mut src = ImageSequenceSource::new();
    src.open(dir.path()).unwrap();

    let mut indices = Vec::new();
    while let Some(frame) = src.read_frame().unwrap() {
        assert_eq!(frame.dims(), (250, 200));
        assert_eq!(frame.pixel(0, 0), BLUE);
        indices.push(frame.index);
    }
    assert_eq!(indices, vec![0, 1, 2]);

    src.reset().unwrap();
    let first = src.read_frame().unwrap().unwrap();
    assert_eq!(first.pixel(110, 90), RED);

    src.release();
    assert!(matches!(src.read_frame(), Err(Error::NotOpened)));
}

#[test]
fn end_to_end_benchmark_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(&dir.path().join("clip"), 6);
    write_detections(&dir.path().join("clip.dets"), 6);

    let config = RunConfig::load(write_config(dir.path(), false)).unwrap();
    let mut bench = Benchmark::from_config(&config).unwrap();
    let result = bench.run(&no_progress);

    assert!(result.failures.is_empty(), "{:?}", result.failures);
    assert_eq!(result.roi, BoundingBox::new(100, 80, 50, 50));

    for label in ["CamShift", "MeanShift", "YOLOv8n"] {
        let frames = &result.models[label].frames;
        assert_eq!(frames.len(), 5, "{}", label);
        assert!(frames.iter().all(|r| r.success), "{}", label);
    }

    assert_eq!(result.errors["YOLOv8n"].position_rmse, 0.0);
    for label in ["CamShift", "MeanShift"] {
        let err = result.errors[label];
        assert!(err.position_rmse < 5.0, "{}: {:?}", label, err);
    }

    let out = dir.path().join("out.json");
    assert_eq!(result.export(Some(out.as_path())).unwrap(), out);

    let back = BenchmarkResult::import(&out).unwrap();
    assert_eq!(back.models, result.models);
    assert_eq!(back.errors, result.errors);
    assert_eq!(back.roi, result.roi);
    assert_eq!(back.timestamp, result.timestamp);
    assert_eq!(back.video_path, result.video_path);
}

#[test]
fn parallel_run_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(&dir.path().join("clip"), 4);
    write_detections(&dir.path().join("clip.dets"), 4);

    let sequential = RunConfig::load(write_config(dir.path(), false)).unwrap();
    let parallel = RunConfig::load(write_config(dir.path(), true)).unwrap();
    assert!(parallel.parallel);

    let a = Benchmark::from_config(&sequential).unwrap().run(&no_progress);
    let b = Benchmark::from_config(&parallel).unwrap().run(&no_progress);

    assert_eq!(a.models, b.models);
    assert_eq!(a.errors, b.errors);
}

#[test]
fn export_failure_keeps_results() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(&dir.path().join("clip"), 3);
    write_detections(&dir.path().join("clip.dets"), 3);

    let config = RunConfig::load(write_config(dir.path(), false)).unwrap();
    let result = Benchmark::from_config(&config).unwrap().run(&no_progress);

    let bad = dir.path().join("missing").join("out.json");
    match result.export(Some(bad.as_path())) {
        Err(Error::Export { path, .. }) => assert_eq!(path, bad),
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(result.models.len(), 3);
    assert!(result.to_json().is_ok());
}

#[test]
fn missing_detection_dump_fails_only_its_configuration() {
    let dir = tempfile::tempdir().unwrap();
    write_clip(&dir.path().join("clip"), 4);

    let config = RunConfig::load(write_config(dir.path(), false)).unwrap();
    let result = Benchmark::from_config(&config).unwrap().run(&no_progress);

    assert!(!result.cancelled);
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures["YOLOv8n"].contains("clip.dets"), "{:?}", result.failures);
    assert!(result.models["YOLOv8n"].frames.is_empty());

    for label in ["CamShift", "MeanShift"] {
        let frames = &result.models[label].frames;
        assert_eq!(frames.len(), 3, "{}", label);
        assert!(frames.iter().all(|r| r.success), "{}", label);
    }

    // the reference has nothing to compare against
    assert!(result.errors.is_empty());
}

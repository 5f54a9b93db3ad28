use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use roi_track::benchmark::Benchmark;
use roi_track::config::RunConfig;
use roi_track::report::BenchmarkResult;
use roi_track::source::{self, DEFAULT_MAX_WIDTH};
use roi_track::trace::Trace;
use roi_track::{BoundingBox, CamShiftTracker, ColorSpace, MeanShiftTracker, Tracker};
use std::path::PathBuf;

/// Single target region tracking and tracker benchmarking
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track a region through a clip, one line per frame
    Track {
        /// Image directory, or a video file when built with `opencv`
        #[arg(long)]
        clip: PathBuf,

        /// Initial region as x,y,w,h
        #[arg(long)]
        roi: BoundingBox,

        #[arg(long, value_enum, default_value_t = Method::CamShift)]
        tracker: Method,

        #[arg(long, default_value_t = ColorSpace::Hsv)]
        color_space: ColorSpace,

        #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
        max_width: u32,

        /// Write the trajectory segments as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
    },

    /// Run a benchmark described by a JSON config
    Bench {
        #[arg(long)]
        config: PathBuf,

        /// Overrides the output path of the config
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the ranking stored in an exported benchmark document
    Show { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    #[value(name = "camshift")]
    CamShift,
    #[value(name = "meanshift")]
    MeanShift,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Track {
            clip,
            roi,
            tracker,
            color_space,
            max_width,
            trace,
        } => {
            let tracker: Box<dyn Tracker> = match tracker {
                Method::CamShift => Box::new(CamShiftTracker::new(color_space)),
                Method::MeanShift => Box::new(MeanShiftTracker::new(color_space)),
            };

            track(clip, roi, tracker, max_width, trace)
        }
        Command::Bench { config, output } => bench(config, output),
        Command::Show { path } => {
            let result = BenchmarkResult::import(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            print_ranking(&result);
            Ok(())
        }
    }
}

fn track(
    clip: PathBuf,
    roi: BoundingBox,
    mut tracker: Box<dyn Tracker>,
    max_width: u32,
    trace_out: Option<PathBuf>,
) -> Result<()> {
    let mut source = source::for_path(&clip, max_width);
    source
        .open(&clip)
        .with_context(|| format!("opening {}", clip.display()))?;

    let first = source
        .read_frame()?
        .ok_or_else(|| anyhow!("{} has no frames", clip.display()))?;
    tracker.init(&first, roi)?;

    let mut trace = Trace::default();
    trace.push(tracker.center(Some(&roi)));

    let mut lost = 0;
    let mut frame_no = 0;

    while let Some(frame) = source.read_frame()? {
        let found = tracker.update(&frame);
        trace.push(tracker.center(found.as_ref()));

        match found {
            Some(b) => println!("{} {} {} {} {}", frame_no, b.x, b.y, b.width, b.height),
            None => {
                lost += 1;
                println!("{} lost", frame_no);
            }
        }

        frame_no += 1;
    }

    source.release();
    info!(
        "{} tracked {} frames, lost {}",
        tracker.name(),
        frame_no,
        lost
    );

    if let Some(path) = trace_out {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &trace.segments())?;
    }

    Ok(())
}

fn bench(config_path: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let config = RunConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let mut bench = Benchmark::from_config(&config)?;
    let progress = |done: usize, total: usize, message: &str| {
        eprintln!("[{}/{}] {}", done, total, message);
    };

    let result = bench.run(&progress);
    print_ranking(&result);

    let output = output.or_else(|| config.output.clone());
    let path = result.export(output.as_deref())?;
    println!("results written to {}", path.display());

    Ok(())
}

fn print_ranking(result: &BenchmarkResult) {
    println!("{:<4} {:<24} {:>14} {:>14}", "#", "model", "rmse position", "rmse area");

    for (i, (label, err)) in result.ranking().into_iter().enumerate() {
        if !result.has_track(label) {
            println!("{:<4} {:<24} {:>14} {:>14}", i + 1, label, "no track", "-");
            continue;
        }

        println!(
            "{:<4} {:<24} {:>14.3} {:>14.3}",
            i + 1,
            label,
            err.position_rmse,
            err.area_rmse
        );
    }

    for (label, reason) in &result.failures {
        println!("{} failed: {}", label, reason);
    }
}

//! Binary entry point: parses the CLI surface, wires a scene into an
//! estimator and the frame driver, and maps whatever comes back onto an
//! exit code.
//!
//! Grounded in `original_source/main.cpp`/`Application.cpp`'s overall shape
//! (parse options, build the scene once, run the render loop, persist on
//! every snapshot boundary and at the end) and the teacher's own
//! `main.rs`-style thin binary that defers everything to the library crate.

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::info;

use lumen::core::camera::Camera;
use lumen::core::cli::{Cli, Command, ManyImagesArgs, RenderArgs, Technique};
use lumen::core::error::{Error, Result};
use lumen::core::estimators::{bpt::BidirectionalEstimator, pt::PathTracingEstimator, vcm::VcmEstimator, Estimator, EstimatorConfig};
use lumen::core::film::{render_frame, Film};
use lumen::core::imageio::{self, ImageBuffer};
use lumen::core::progressive::{Budget, ProgressiveController, SnapshotPolicy};
use lumen::core::sceneio::{build_scene, JsonSceneLoader, SceneLoader};
use lumen::core::stats::FrameStats;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("lumen: {err}");
            ExitCode::from(lumen::core::error::exit_code(&err) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Render(args) => run_render(args),
        Command::Avg(args) => run_many(args, imageio::avg),
        Command::Merge(args) => run_many(args, imageio::merge),
        Command::Errors(args) => run_errors(args),
        Command::Sub(args) => run_sub(args),
        Command::Filter(args) => run_filter(args),
        Command::Time(args) => run_time(args),
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    args.validate()?;
    let technique = args.technique()?;
    let resolution = args.resolution()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_jobs())
        .build_global()
        .map_err(|e| Error::Programming(format!("failed to configure thread pool: {e}")))?;

    let description = JsonSceneLoader.load(&args.scene)?;
    let (scene, selected_camera) = build_scene(&description, args.camera)?;
    let camera = Camera::new(&selected_camera, resolution);

    let config = EstimatorConfig {
        min_subpath: args.min_subpath,
        roulette: args.roulette,
        beta: args.beta(),
        photons_per_frame: args.num_photons,
        initial_radius: args.max_radius,
        merging_enabled: matches!(technique, Technique::Vcm | Technique::Upg),
        connections_enabled: matches!(technique, Technique::Vcm),
    };
    let mut engine = lumen::core::rng::RandomEngine::new(0);
    let estimator: Box<dyn Estimator> = match technique {
        Technique::Pt => Box::new(PathTracingEstimator::new(config)),
        Technique::Bpt => Box::new(BidirectionalEstimator::new(config)),
        Technique::Vcm | Technique::Upg => {
            let vcm = VcmEstimator::new(config);
            vcm.prepare_frame(&scene, &mut engine);
            Box::new(vcm)
        }
    };

    let film = Film::new(resolution.0, resolution.1);

    let reference = args
        .reference
        .as_ref()
        .map(|path| imageio::read_exr(path))
        .transpose()?;

    let budget = if args.num_samples > 0 {
        Budget::samples(args.num_samples)
    } else if args.num_seconds_total() > 0.0 {
        Budget::seconds(args.num_seconds_total())
    } else {
        Budget::unbounded()
    };
    let controller = ProgressiveController::new(budget, SnapshotPolicy::every_n_samples(args.snapshot));

    let mut stats = FrameStats::new();
    let max_samples = if args.num_samples > 0 { args.num_samples } else { u64::MAX };

    render_frame(&scene, &camera, estimator.as_ref(), &film, 0, max_samples, |samples_completed, report| {
        stats.sample_ray_counters(&scene);
        let (rms_error, abs_error) = reference
            .as_ref()
            .and_then(|reference| {
                let current = ImageBuffer::from_accumulator(resolution.0, resolution.1, &film.snapshot(), HashMap::new());
                imageio::rms_abs_errors(&current, reference).ok()
            })
            .unwrap_or((0.0, 0.0));
        stats.push_record(samples_completed, report.numeric_errors, rms_error, abs_error);

        if controller.snapshot_due(samples_completed) {
            if let Err(e) = write_output(&snapshot_path(&args.output, samples_completed), resolution, &film, &stats, technique) {
                log::error!("failed to write snapshot at sample {samples_completed}: {e}");
            }
        }
        info!("sample {samples_completed} complete, {} numeric errors this wave", report.numeric_errors);
        controller.should_continue(samples_completed)
    });

    write_output(&args.output, resolution, &film, &stats, technique)
}

fn snapshot_path(output: &Path, samples_completed: u64) -> std::path::PathBuf {
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = output.extension().and_then(|s| s.to_str()).unwrap_or("exr");
    let mut path = output.to_path_buf();
    path.set_file_name(format!("{stem}.snapshot-{samples_completed:06}.{ext}"));
    path
}

fn write_output(path: &Path, resolution: (u32, u32), film: &Film, stats: &FrameStats, technique: Technique) -> Result<()> {
    let mut metadata = stats.to_dict();
    metadata.insert("technique".into(), technique_name(technique).into());
    let buffer = ImageBuffer::from_accumulator(resolution.0, resolution.1, &film.snapshot(), metadata);
    imageio::write_exr(path, &buffer)
}

fn technique_name(technique: Technique) -> &'static str {
    match technique {
        Technique::Pt => "PT",
        Technique::Bpt => "BPT",
        Technique::Vcm => "VCM",
        Technique::Upg => "UPG",
    }
}

fn load_all(paths: &[std::path::PathBuf]) -> Result<Vec<ImageBuffer>> {
    if paths.is_empty() {
        return Err(Error::Input("at least one input image is required".into()));
    }
    paths.iter().map(|path| imageio::read_exr(path)).collect()
}

fn run_many(args: ManyImagesArgs, op: fn(&[ImageBuffer]) -> Result<ImageBuffer>) -> Result<()> {
    let images = load_all(&args.inputs)?;
    let combined = op(&images)?;
    imageio::write_exr(&args.output, &combined)
}

fn run_errors(args: lumen::core::cli::ErrorsArgs) -> Result<()> {
    let candidate = imageio::read_exr(&args.candidate)?;
    let reference = imageio::read_exr(&args.reference)?;
    let (rms, abs) = imageio::rms_abs_errors(&candidate, &reference)?;
    println!("rms error: {rms:.6}");
    println!("abs error: {abs:.6}");
    if let Some(output) = &args.output {
        let heatmap = imageio::error_heatmap(&candidate, &reference)?;
        imageio::write_exr(output, &heatmap)?;
    }
    Ok(())
}

fn run_sub(args: lumen::core::cli::TwoImagesArgs) -> Result<()> {
    let a = imageio::read_exr(&args.a)?;
    let b = imageio::read_exr(&args.b)?;
    let result = imageio::sub(&a, &b)?;
    imageio::write_exr(&args.output, &result)
}

fn run_filter(args: lumen::core::cli::FilterArgs) -> Result<()> {
    let image = imageio::read_exr(&args.input)?;
    let filtered = imageio::filter_box(&image, args.radius)?;
    imageio::write_exr(&args.output, &filtered)
}

fn run_time(args: lumen::core::cli::TimeArgs) -> Result<()> {
    for path in &args.inputs {
        let image = imageio::read_exr(path)?;
        let stats = FrameStats::from_dict(&image.metadata)?;
        println!("{}", path.display());
        println!("{:>10}  {:>12}  {:>12}  {:>10}  {:>10}", "sample", "clock_time", "frame_dt", "rms", "abs");
        for record in &stats.records {
            println!(
                "{:>10}  {:>12.3}  {:>12.3}  {:>10.6}  {:>10.6}",
                record.sample_index, record.clock_time, record.frame_duration, record.rms_error, record.abs_error
            );
        }
    }
    Ok(())
}


//! `rover` – command line driver for the ground-perception pipeline.
//!
//! ```text
//! rover init                 write ~/.rover/config.toml with defaults
//! rover show-config          print the effective config (file + ROVER_* env)
//! rover run [--frames N]     run perception on sim or file frames
//! ```

mod config;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, info};

use rover_hal::{Camera, CameraFrame, ImageFileCamera, SimCamera, SimDrive};
use rover_perception::image::Image;
use rover_perception::projection::PolarPoints;
use rover_perception::{FrameReport, Perception, PerceptionConfig, RoverState};
use rover_types::{Pose, TerrainClass};

/// Single-camera ground perception and world mapping.
#[derive(Parser, Debug)]
#[command(name = "rover", author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.rover/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
    /// Run the perception pipeline over a sequence of frames
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Number of frames to process
    #[arg(short, long, default_value = "1")]
    frames: usize,

    /// Replay this image instead of the simulated camera
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Paint a target patch in the simulated scene
    #[arg(long)]
    target: bool,

    /// Starting x position in world cells
    #[arg(long, default_value = "100.0")]
    x: f32,

    /// Starting y position in world cells
    #[arg(long, default_value = "100.0")]
    y: f32,

    /// Starting heading in degrees
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    yaw: f32,

    /// Roll in degrees
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    roll: f32,

    /// Pitch in degrees
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pitch: f32,

    /// World cells travelled per frame
    #[arg(long, default_value = "0.0")]
    speed: f32,

    /// Degrees of heading change per frame
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    yaw_rate: f32,

    /// Rock the chassis by this many degrees of roll every other frame
    #[arg(long, default_value = "0.0")]
    rock: f32,

    /// Write vision.png, worldmap.png and nav.json here after the last frame
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    let cfg = match config::load_or_default(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let endpoint = Some(cfg.otlp_endpoint.as_str()).filter(|ep| !ep.is_empty());
    let _guard = telemetry::init_tracing("rover", cfg.log_format, endpoint);
    debug!(path = %path.display(), "config resolved");

    let result = match cli.command {
        Command::Init { force } => init(&path, force),
        Command::ShowConfig => show_config(&cfg),
        Command::Run(args) => run(&cfg.perception, &args).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// init / show-config
// ─────────────────────────────────────────────────────────────────────────────

fn init(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        println!(
            "  Config already exists at {} (use {} to overwrite)",
            path.display().to_string().bold(),
            "--force".bold()
        );
        return Ok(());
    }
    config::save_to(&config::Config::default(), path)?;
    println!(
        "  {} Config saved to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

fn show_config(cfg: &config::Config) -> Result<(), String> {
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{raw}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────────────────────────

/// Navigation output written to `nav.json`.
#[derive(Debug, Serialize)]
struct NavSnapshot {
    pose: Pose,
    mean_angle_deg: Option<f32>,
    #[serde(flatten)]
    polar: PolarPoints,
}

fn open_camera(perception: &PerceptionConfig, args: &RunArgs) -> Box<dyn Camera> {
    match &args.image {
        Some(path) => Box::new(ImageFileCamera::new("file", path)),
        None => {
            let (w, h) = (perception.frame_width as u32, perception.frame_height as u32);
            // Horizon and target placement scale with the stock 320x160 layout.
            let mut cam = SimCamera::new("sim")
                .with_size(w, h)
                .with_horizon(h * 9 / 16);
            if args.target {
                cam = cam.with_target(w * 15 / 32, h * 25 / 32, (w / 16).max(1), (h * 3 / 32).max(1));
            }
            Box::new(cam)
        }
    }
}

fn to_image(frame: CameraFrame) -> Result<Image, String> {
    debug!(
        width = frame.width,
        height = frame.height,
        age_ms = frame.age().num_milliseconds(),
        "frame captured"
    );
    Image::from_raw(frame.width as usize, frame.height as usize, frame.data)
        .map_err(|e| e.to_string())
}

/// Process `args.frames` frames (at least one) and return the final state.
fn run(perception_cfg: &PerceptionConfig, args: &RunArgs) -> Result<RoverState, String> {
    let perception = Perception::new(perception_cfg.clone()).map_err(|e| e.to_string())?;
    let mut camera = open_camera(perception_cfg, args);
    let mut drive = SimDrive::new(args.x, args.y, args.yaw)
        .with_speed(args.speed)
        .with_yaw_rate(args.yaw_rate)
        .with_attitude(args.roll, args.pitch)
        .with_rocking(args.rock);

    info!(camera = camera.id(), frames = args.frames, "run started");

    let first = to_image(camera.capture().map_err(|e| e.to_string())?)?;
    let mut state = RoverState::new(perception_cfg, first, drive.pose());
    for n in 1..=args.frames.max(1) {
        if n > 1 {
            let image = to_image(camera.capture().map_err(|e| e.to_string())?)?;
            state.observe(image, drive.step());
        }
        let report = perception
            .perception_step(&mut state)
            .map_err(|e| e.to_string())?;
        print_frame(n, &state.pose, &report);
    }

    print_summary(&state);
    if let Some(dir) = &args.out_dir {
        write_outputs(dir, &state)?;
    }
    Ok(state)
}

fn print_frame(n: usize, pose: &Pose, report: &FrameReport) {
    let map = if report.map_updated {
        "mapped".green()
    } else {
        "skipped".yellow()
    };
    let steer = report
        .mean_nav_angle_deg
        .map(|a| format!("{a:+.1}°"))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "  frame {:>3}  pose ({:.1}, {:.1}) yaw {:.1}°  obstacle {} target {} navigable {}  {}  steer {}",
        n.to_string().bold(),
        pose.x,
        pose.y,
        pose.yaw_deg,
        report.pixel_counts.obstacle.to_string().red(),
        report.pixel_counts.target.to_string().yellow(),
        report.pixel_counts.navigable.to_string().cyan(),
        map,
        steer.bold()
    );
}

fn print_summary(state: &RoverState) {
    println!();
    println!("  World map ({0}x{0}):", state.worldmap.size());
    for class in TerrainClass::ALL {
        println!(
            "    {:<10} {:>6} cells  {:>8} hits",
            class.to_string(),
            state.worldmap.occupied_cells(class),
            state.worldmap.total(class)
        );
    }
}

fn write_outputs(dir: &Path, state: &RoverState) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;

    let vision = &state.vision_image;
    save_rgb(
        &dir.join("vision.png"),
        vision.width() as u32,
        vision.height() as u32,
        vision.data().to_vec(),
    )?;

    let size = state.worldmap.size() as u32;
    save_rgb(&dir.join("worldmap.png"), size, size, state.worldmap.to_rgb())?;

    let polar = PolarPoints {
        distances: state.nav_dists.clone(),
        angles: state.nav_angles.clone(),
    };
    let nav = NavSnapshot {
        pose: state.pose,
        mean_angle_deg: polar.mean_angle_deg(),
        polar,
    };
    let json = serde_json::to_string_pretty(&nav)
        .map_err(|e| format!("Failed to serialize nav output: {}", e))?;
    let nav_path = dir.join("nav.json");
    std::fs::write(&nav_path, json)
        .map_err(|e| format!("Failed to write {}: {}", nav_path.display(), e))?;

    println!(
        "\n  {} Outputs written to {}",
        "✓".green().bold(),
        dir.display().to_string().bold()
    );
    Ok(())
}

fn save_rgb(path: &Path, width: u32, height: u32, data: Vec<u8>) -> Result<(), String> {
    let img = image::RgbImage::from_raw(width, height, data)
        .ok_or_else(|| format!("buffer does not match {width}x{height} for {}", path.display()))?;
    img.save(path)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

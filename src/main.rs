//! # Delve Command Line
//!
//! Generates a dungeon level, prints it as text and optionally saves it as JSON.

use clap::{Parser, ValueEnum};
use delve::{generate, CorridorStyle, DelveResult, GeneratedLevel, GenerationConfig, RoomType};
use log::{error, info, warn};
use std::path::PathBuf;

/// Corridor style names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StyleArg {
    Straight,
    LShaped,
    Organic,
    Random,
}

impl From<StyleArg> for CorridorStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Straight => CorridorStyle::Straight,
            StyleArg::LShaped => CorridorStyle::LShaped,
            StyleArg::Organic => CorridorStyle::Organic,
            StyleArg::Random => CorridorStyle::Random,
        }
    }
}

/// Command line arguments for the level generator.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(about = "Procedural dungeon layout generator")]
#[command(version)]
struct Args {
    /// Random seed for generation (drawn from OS entropy when omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Level width in cells
    #[arg(long)]
    width: Option<u32>,

    /// Level height in cells
    #[arg(long)]
    height: Option<u32>,

    /// JSON configuration file; command line options override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Corridor carving style
    #[arg(long, value_enum)]
    corridor_style: Option<StyleArg>,

    /// Write the generated level as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not print the level map
    #[arg(short, long)]
    quiet: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    initialize_logging(&args.log_level);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    }
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .parse_default_env()
        .init();
}

/// Generates and reports a level. Returns whether the level is valid.
fn run(args: &Args) -> DelveResult<bool> {
    info!("Starting Delve v{}", delve::VERSION);

    let config = build_config(args)?;
    let result = generate(&config)?;

    if !args.quiet {
        print!("{}", result.level.grid);
    }
    print_summary(&result);

    if let Some(path) = &args.output {
        result.save(path)?;
        info!("Saved level to {}", path.display());
    }

    if let Some(failure) = &result.failure {
        warn!("Level failed validation: {}", failure);
    }
    Ok(result.is_valid)
}

fn build_config(args: &Args) -> DelveResult<GenerationConfig> {
    let mut config = match &args.config {
        Some(path) => GenerationConfig::load(path)?,
        None => GenerationConfig::default(),
    };

    config.seed = match args.seed {
        Some(seed) => seed,
        None if args.config.is_some() => config.seed,
        None => rand::random(),
    };
    if let Some(width) = args.width {
        config.level_width = width;
    }
    if let Some(height) = args.height {
        config.level_height = height;
    }
    if let Some(style) = args.corridor_style {
        config.corridor_style = style.into();
    }
    Ok(config)
}

fn print_summary(result: &GeneratedLevel) {
    let level = &result.level;
    info!(
        "Seed {} | {} rooms | {} corridors | {} doors ({} locked) | {} keys | attempts {}",
        result.seed_used,
        level.rooms.len(),
        level.corridors.len(),
        level.doors.len(),
        level.doors.iter().filter(|door| door.is_locked).count(),
        level.keys.len(),
        result.attempts_used
    );
    for room_type in [
        RoomType::Entrance,
        RoomType::Exit,
        RoomType::Boss,
        RoomType::Treasure,
        RoomType::Shop,
        RoomType::Challenge,
        RoomType::Secret,
    ] {
        let ids: Vec<u32> = level.rooms_of_type(room_type).map(|room| room.id).collect();
        if !ids.is_empty() {
            info!("{:?}: {:?}", room_type, ids);
        }
    }
    info!("Critical path: {:?}", level.critical_path);
}

mod demo;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use cube_animator_core::{Algorithm, AppConfig, CubeAnimError, RenderPipeline};
use tracing_subscriber::EnvFilter;

use crate::demo::{IsometricProjection, MoveLog};

const DEFAULT_MOVES: &str = "R U R' U'";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> cube_animator_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Config => print_default_config(),
    }
}

fn run(args: RunArgs) -> cube_animator_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(max_fps) = args.max_fps {
        config.pipeline.max_fps = max_fps;
    }
    if let Some(duration_ms) = args.duration_ms {
        config.animation.move_duration_ms = duration_ms;
    }

    let mut algorithm = match &args.moves {
        Some(moves) => moves.parse::<Algorithm>()?,
        None if args.scramble == 0 => DEFAULT_MOVES.parse::<Algorithm>()?,
        None => Algorithm::default(),
    };
    if args.scramble > 0 {
        let scramble = demo::scramble(args.scramble, &mut rand::thread_rng());
        algorithm.moves.extend(scramble.moves);
    }
    tracing::info!(
        moves = algorithm.len(),
        duration_ms = config.animation.move_duration_ms,
        max_fps = config.pipeline.max_fps,
        "starting headless animation"
    );

    let redraws = Arc::new(AtomicU64::new(0));
    let host = {
        let redraws = Arc::clone(&redraws);
        move || {
            redraws.fetch_add(1, Ordering::Relaxed);
        }
    };

    let mut pipeline = RenderPipeline::new(
        MoveLog::default(),
        IsometricProjection,
        host,
        &config.pipeline,
    );
    let frames = pipeline.frames();
    pipeline.enqueue_algorithm(&algorithm, config.animation.move_duration_ms);
    pipeline.start()?;

    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let queue = pipeline.queue();
    while !queue.is_empty() {
        if Instant::now() >= deadline {
            pipeline.stop();
            return Err(CubeAnimError::msg(format!(
                "animation did not finish within {}s, {} requests left",
                args.timeout_secs,
                queue.len()
            )));
        }
        thread::sleep(POLL_INTERVAL);
        let summary = frames.with_presented(|frame| {
            (demo::front_cubie(frame.faces()), demo::extent(frame.faces()))
        });
        tracing::info!(
            fps = pipeline.fps(),
            pending = queue.len(),
            front = ?summary.and_then(|(front, _)| front),
            extent = summary.map(|(_, extent)| extent),
            "animating"
        );
    }
    pipeline.stop();

    let applied = pipeline.with_cube(|cube| Algorithm::new(cube.moves().to_vec()));
    tracing::info!(
        frames = redraws.load(Ordering::Relaxed),
        applied = applied.len(),
        "animation finished"
    );
    println!("{applied}");
    Ok(())
}

fn print_default_config() -> cube_animator_core::Result<()> {
    println!("{}", AppConfig::default().to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated puzzle cube renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Animate a move sequence headless and print the moves applied.
    Run(RunArgs),
    /// Print the default configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration file; missing fields use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Moves to animate in cube notation, e.g. "R U R' U'".
    #[arg(short, long)]
    moves: Option<String>,
    /// Number of random moves appended after `--moves`.
    #[arg(long, default_value_t = 0)]
    scramble: usize,
    /// Duration of each move in milliseconds.
    #[arg(short, long)]
    duration_ms: Option<u64>,
    /// Frame rate cap for the render loop.
    #[arg(long)]
    max_fps: Option<f64>,
    /// Give up if the queue has not drained after this many seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

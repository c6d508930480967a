//! depthview: viewers for depth sensor color, depth, infrared, transformation
//! and point cloud streams

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use depthview::display::{HeadlessSurface, Surface};
use depthview::sensor::{SyntheticDevice, SyntheticProvider};
use depthview::{Config, FramePipeline, PipelineSettings, Scenario};

#[derive(Debug, Parser)]
#[command(version, about = "Depth sensor viewers")]
struct Cli {
    /// What to show
    #[arg(value_enum)]
    scenario: Scenario,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sensor index, overrides the configuration
    #[arg(short, long)]
    device: Option<u32>,

    /// Run without windows
    #[arg(long, requires = "frames")]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
}

fn run<S: Surface>(
    cli: &Cli,
    config: &Config,
    settings: PipelineSettings,
    surface: S,
) -> depthview::Result<()> {
    let provider = SyntheticProvider::new(config.sensor.synthetic.clone());
    let mut pipeline: FramePipeline<SyntheticDevice, S> = FramePipeline::new(
        cli.scenario.view(),
        surface,
        config.sensor.camera.clone(),
        settings,
    );

    pipeline.start(&provider)?;
    let summary = pipeline.run()?;
    info!("{} frames shown", summary.frames);
    Ok(())
}

fn execute(cli: &Cli) -> depthview::Result<()> {
    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(index) = cli.device {
        config.sensor.device_index = index;
    }

    let mut settings = PipelineSettings::from_config(&config);
    settings.max_frames = cli.frames;

    if cli.headless {
        run(cli, &config, settings, HeadlessSurface::new())
    } else {
        run_windowed(cli, &config, settings)
    }
}

fn main() -> Result<ExitCode> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depthview=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let cli = Cli::parse();
    info!("depthview launching: {}", cli.scenario);

    match execute(&cli) {
        Ok(()) => {
            info!("depthview shutting down");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(kind = ?e.kind(), "{}", e);
            eprintln!("error: {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

#[cfg(feature = "sdl-display")]
fn run_windowed(cli: &Cli, config: &Config, settings: PipelineSettings) -> depthview::Result<()> {
    let surface = depthview::display::Sdl2Display::new(
        config.display.clone(),
        config.sensor.device_index,
        config.pipeline.quit_key,
    )?;
    run(cli, config, settings, surface)
}

#[cfg(not(feature = "sdl-display"))]
fn run_windowed(
    _cli: &Cli,
    _config: &Config,
    _settings: PipelineSettings,
) -> depthview::Result<()> {
    Err(depthview::Error::Render(
        "built without the sdl-display feature, use --headless".into(),
    ))
}

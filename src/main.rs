//! Skywarden daemon
//!
//! Loads the configuration and ephemeris tables, checks the table horizon,
//! then runs the supervisor against real or simulated hardware until ctrl-c
//! or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use skywarden::command::{command_queue, CommandListener, DEFAULT_QUEUE_CAPACITY};
use skywarden::error::exit_code;
use skywarden::hardware::{Hardware, LinuxHardware, MockHardware};
use skywarden::logging::init_logging;
use skywarden::{Clock, SupervisionConfig, Supervisor, SupervisorError, SystemClock, VERSION};
use skywarden_core_ephemeris::AstronomicalOracle;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Skywarden - sun and moon scheduled lighting supervisor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON, or TOML by extension)
    #[arg(short, long, default_value = "skywarden.json")]
    config: PathBuf,

    /// Ephemeris table file (default: from config, or next to it)
    #[arg(long)]
    tables: Option<PathBuf>,

    /// Address to receive remote commands on
    #[arg(long)]
    ip: Option<IpAddr>,

    /// Port to receive remote commands on
    #[arg(long)]
    port: Option<u16>,

    /// Display player address
    #[arg(long)]
    display_ip: Option<IpAddr>,

    /// Display player port
    #[arg(long)]
    display_port: Option<u16>,

    /// Seconds to wait for the display player before the first tick
    #[arg(long)]
    warmup_secs: Option<u64>,

    /// Ignore the sun schedule and keep the lights on
    #[arg(long)]
    disable_sun: bool,

    /// Debug logging; the watchdog is not signalled
    #[arg(short, long)]
    debug: bool,

    /// Run against simulated hardware
    #[arg(long)]
    simulate: bool,

    /// Append JSON logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Validate configuration and tables, print today's ephemeris, and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    /// Command-line flags win over the file
    fn apply(&self, config: &mut SupervisionConfig) {
        config.listen = SocketAddr::new(
            self.ip.unwrap_or(config.listen.ip()),
            self.port.unwrap_or(config.listen.port()),
        );
        config.display_addr = SocketAddr::new(
            self.display_ip.unwrap_or(config.display_addr.ip()),
            self.display_port.unwrap_or(config.display_addr.port()),
        );
        if let Some(secs) = self.warmup_secs {
            config.warmup_secs = secs;
        }
        if let Some(ref tables) = self.tables {
            config.tables = Some(tables.clone());
        }
        if let Some(ref log_file) = self.log_file {
            config.log_file = Some(log_file.clone());
        }
        config.disable_sun |= self.disable_sun;
        config.debug |= self.debug;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => exit_code::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<SupervisorError>()
                .map_or(exit_code::FATAL, SupervisorError::exit_code);
            eprintln!("skywarden: {:#}", err);
            code
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = SupervisionConfig::from_file(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;
    init_logging(&config)?;

    info!("🚀 Skywarden v{}", VERSION);

    let tables_path = config.tables_path(&cli.config);
    let oracle = AstronomicalOracle::load(&tables_path)
        .map_err(SupervisorError::from)
        .with_context(|| format!("loading ephemeris tables from {}", tables_path.display()))?;

    let clock = Arc::new(SystemClock::new(config.utc_offset_minutes));
    let now = clock.now();
    oracle
        .validate_horizon(now, config.horizon_days)
        .map_err(SupervisorError::from)
        .with_context(|| format!("ephemeris must cover the next {} days", config.horizon_days))?;
    info!(
        sun_days = oracle.sun_days(),
        phases_until = ?oracle.phase_coverage_end(),
        horizon_days = config.horizon_days,
        "📅 Ephemeris loaded from {}",
        tables_path.display()
    );

    if cli.check {
        let sun = oracle.sun_times(now).map_err(SupervisorError::from)?;
        let phase = oracle.phase_at(now).map_err(SupervisorError::from)?;
        info!(
            "✓ Configuration OK | Sunrise {} | Sunset {} | Moon: {} ({})",
            sun.sunrise.format("%H:%M"),
            sun.sunset.format("%H:%M"),
            phase,
            phase.index()
        );
        return Ok(());
    }

    let hardware = if cli.simulate {
        info!("🧪 Simulation mode: no GPIO, sensors at ambient");
        Hardware::from_backend(Arc::new(MockHardware::new()))
    } else {
        let linux = LinuxHardware::new(&config)
            .await
            .context("Failed to initialize hardware")?;
        Hardware::from_backend(Arc::new(linux))
    };

    let supervisor = Supervisor::new(&config, oracle, hardware, clock)?;

    let (handle, commands) = command_queue(DEFAULT_QUEUE_CAPACITY);
    let listener = CommandListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind command listener on {}", config.listen))?;
    let listener_task = tokio::spawn(listener.run(handle));

    let result = supervisor.run(commands, shutdown_signal()).await;
    listener_task.abort();
    result?;

    info!("👋 Skywarden stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

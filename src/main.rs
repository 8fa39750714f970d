//! oakhz-rotary - rotary encoder volume and media controller
//!
//! Reads a quadrature encoder and a push button on the Raspberry Pi GPIO and
//! drives moOde's volume, MPD, Plexamp and the connected Bluetooth source.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oakhz_rotary::backends::{
    BluezMediaControl, MpdClient, PlexampRemote, SoftwareMixer, SqliteStore, SystemPower,
    VolumeBackend,
};
use oakhz_rotary::button::{
    ActionTargets, ButtonDispatcher, ButtonEdge, MuteMemory, EDGE_CHANNEL_CAPACITY,
};
use oakhz_rotary::cli::Args;
use oakhz_rotary::config::AppConfig;
use oakhz_rotary::encoder::{AccelerationSampler, QuadratureDecoder};
use oakhz_rotary::paths::AppPaths;
use oakhz_rotary::volume::VolumeSynchronizer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(args.log_filter())?;

    info!("Starting oakhz-rotary v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal and must surface before any GPIO is touched
    let paths = AppPaths::detect();
    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            AppConfig::load(path).await?
        }
        None => {
            info!("Configuration file: {} (detected)", paths.config.display());
            AppConfig::load_or_default(&paths.config).await?
        }
    };
    config.apply_overrides(&args.overrides());
    config.validate().context("Invalid configuration")?;

    let timeout = config.volume.backend_timeout();

    // Volume backends, in fan-out order
    let mixer = Arc::new(SoftwareMixer::new(config.mixer.dialect(), timeout));
    let mut backends: Vec<Arc<dyn VolumeBackend>> = vec![mixer.clone()];
    if config.mpd.enabled {
        backends.push(Arc::new(MpdClient::new(
            config.mpd.host.clone(),
            config.mpd.port,
            config.mpd.password.clone(),
            timeout,
        )));
    }
    if config.plexamp.enabled {
        let plexamp = PlexampRemote::new(config.plexamp.url.clone(), timeout)
            .context("Failed to create Plexamp client")?;
        backends.push(Arc::new(plexamp));
    }

    let store = Arc::new(SqliteStore::new(config.volume.database.clone(), timeout));
    let volume = Arc::new(VolumeSynchronizer::new(
        store,
        backends,
        config.volume.default_volume,
        timeout,
    ));
    info!(
        "Volume store: {} -> {}",
        config.volume.database.display(),
        volume.backend_names().join(", ")
    );

    let mute = open_mute_memory(&config, &paths)?;

    // Hardware
    let decoder = Arc::new(QuadratureDecoder::new());
    let (edge_tx, edge_rx) = mpsc::channel(EDGE_CHANNEL_CAPACITY);
    let _gpio = attach_gpio(&config, decoder.clone(), edge_tx)?;

    if config.volume.sync_on_startup {
        if let Err(e) = volume.resync().await {
            warn!("Startup volume sync failed: {}", e);
        }
    }

    let sampler = AccelerationSampler::new(
        decoder,
        volume.clone(),
        config.encoder.policy(),
        config.encoder.poll_interval(),
    );
    let sampler_task = tokio::spawn(sampler.run());

    let targets = ActionTargets {
        volume,
        mixer,
        media: Arc::new(BluezMediaControl::new(
            config.bluetooth.adapter.clone(),
            timeout,
        )),
        power: Arc::new(SystemPower::new(config.power.command.clone())),
    };
    let mut dispatcher = ButtonDispatcher::new(
        config.button.mapping(),
        config.button.safety_timeout(),
        targets,
        mute,
    );
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(edge_rx).await });

    info!("Rotary controller ready");

    shutdown_signal().await;

    sampler_task.abort();
    dispatcher_task.abort();

    info!("oakhz-rotary stopped");
    Ok(())
}

/// Pre-mute memory, persisted under the state directory when enabled
fn open_mute_memory(config: &AppConfig, paths: &AppPaths) -> Result<MuteMemory> {
    if !config.mute.persist {
        return Ok(MuteMemory::in_memory());
    }

    let paths = match &config.mute.state_dir {
        Some(dir) => AppPaths {
            config: paths.config.clone(),
            state_dir: dir.clone(),
        },
        None => paths.clone(),
    };
    paths.ensure_state_dir()?;

    let db_path = paths.sled_db_path();
    info!("Mute memory persisted in {}", db_path.display());
    MuteMemory::persistent(&db_path)
}

#[cfg(target_os = "linux")]
fn attach_gpio(
    config: &AppConfig,
    decoder: Arc<QuadratureDecoder>,
    edges: mpsc::Sender<ButtonEdge>,
) -> Result<oakhz_rotary::gpio::GpioInputs> {
    use oakhz_rotary::gpio::{attach, GpioPins};

    let pins = GpioPins {
        encoder_a: config.encoder.pin_a,
        encoder_b: config.encoder.pin_b,
        button: config.button.pin,
        button_debounce: config.button.debounce(),
    };
    attach(pins, decoder, edges)
}

#[cfg(not(target_os = "linux"))]
fn attach_gpio(
    _config: &AppConfig,
    _decoder: Arc<QuadratureDecoder>,
    _edges: mpsc::Sender<ButtonEdge>,
) -> Result<()> {
    anyhow::bail!("GPIO access requires Linux on a Raspberry Pi")
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM from the service manager
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

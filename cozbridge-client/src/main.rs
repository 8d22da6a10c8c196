//! cozbridge - command-line front end for the robot bridge
//!
//! Connects to the peer, runs one block operation or sensor read, and exits.

use std::sync::Arc;
use std::time::Duration;

use cozbridge_client::{
    BlockArgs, BridgeConfig, ConfigLoader, LatestFrame, PrefsStore, Sensor, Session,
};
use cozbridge_utils::{ensure_dir, init_logging_with_config, BridgeError, LogConfig, Result};

mod cli;

use cli::{Args, Command};

const FRAME_WAIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    let config = load_config(&args)?;
    let mut log_config = LogConfig::client().with_filter(config.logging.filter.clone());
    if args.log_file {
        log_config = log_config.with_file();
    }
    init_logging_with_config(log_config)?;
    tracing::debug!("CLI args: {:?}", args);

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("cozbridge error: {}", e);
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                eprintln!("Is the robot app running and reachable?");
            }
            Err(e)
        }
    }
}

fn load_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_path(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    ConfigLoader::validate(&config)?;
    Ok(config)
}

async fn run(args: Args, config: BridgeConfig) -> Result<()> {
    let prefs_store = PrefsStore::open_default();

    if !args.needs_connection() {
        if let Command::Verbose { mode } = &args.command {
            let prefs = prefs_store.update(|p| p.verbose = mode.enabled())?;
            println!("verbose: {}", if prefs.verbose { "on" } else { "off" });
        }
        return Ok(());
    }

    let frames = Arc::new(LatestFrame::new());
    let session = Session::new(config, frames.clone());
    session.set_verbose_logging(prefs_store.load().verbose);
    session.start();

    let result = async {
        wait_until_open(&session, Duration::from_millis(args.connect_timeout)).await?;
        execute(&session, &frames, args.command).await
    }
    .await;

    session.stop();
    result
}

async fn wait_until_open(session: &Session, timeout: Duration) -> Result<()> {
    let opened = tokio::time::timeout(timeout, async {
        while !session.transport().is_open() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    opened.map_err(|_| {
        BridgeError::connection(format!(
            "could not reach {} within {:?}",
            session.config().url,
            timeout
        ))
    })
}

async fn execute(session: &Session, frames: &LatestFrame, command: Command) -> Result<()> {
    match command {
        Command::Run { opcode, args } => {
            let block_args = BlockArgs::parse_pairs(&args)?;
            let outcome = session.perform(&opcode, &block_args).await?;
            tracing::debug!(?outcome, "Operation finished");
            println!("{}", outcome.as_value());
        }
        Command::Sensor { name } => {
            let sensor: Sensor = name.parse().map_err(BridgeError::invalid_argument)?;
            println!("{}", session.read_sensor(sensor).await.to_json());
        }
        Command::State { refresh } => {
            let snapshot = if refresh {
                session.refresh_state().await
            } else {
                session.request_state().await
            };
            if let Ok(age) = snapshot.captured_at().elapsed() {
                tracing::debug!(?age, "State snapshot");
            }
            println!("{}", serde_json::to_string_pretty(snapshot.fields())?);
        }
        Command::Frames { out, count } => {
            ensure_dir(&out).map_err(|e| BridgeError::FileWrite {
                path: out.clone(),
                source: e,
            })?;

            let mut rx = frames.subscribe();
            for index in 0..count {
                match tokio::time::timeout(FRAME_WAIT, rx.changed()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => return Err(BridgeError::internal("frame sink closed")),
                    Err(_) if !session.transport().is_open() => {
                        return Err(BridgeError::ConnectionClosed)
                    }
                    Err(_) => return Err(BridgeError::connection("no camera frame received")),
                }

                let Some(frame) = rx.borrow_and_update().clone() else {
                    continue;
                };
                let path = out.join(format!("frame-{:04}.{}", index, frame.format.extension()));
                std::fs::write(&path, &frame.payload).map_err(|e| BridgeError::FileWrite {
                    path: path.clone(),
                    source: e,
                })?;
                println!("{}", path.display());
            }
        }
        Command::Verbose { .. } => {}
    }
    Ok(())
}

pub mod backend;
pub mod clock;
pub mod gamification;
pub mod identity;
pub mod models;
pub mod presence;
pub mod search;
pub mod session;
pub mod settings;
pub mod status;
pub mod timer;
mod utils;
pub mod voice;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use backend::{ActivityBackend, MemoryBackend, RestBackend};
use clock::SystemClock;
use identity::AuthState;
use models::AuthUser;
use presence::LocalPresenceHub;
use session::{spawn_activity_supervisor, ActivityDeps, LifecycleEvent};
use settings::{ClientSettings, SettingsStore};

const ENV_CONFIG_PATH: &str = "CLUBHOUSE_CONFIG";
const ENV_USER_ID: &str = "CLUBHOUSE_USER_ID";
const ENV_DISPLAY_NAME: &str = "CLUBHOUSE_DISPLAY_NAME";
const DEFAULT_CONFIG_FILE: &str = "clubhouse.json";

fn build_backend(settings: &ClientSettings) -> Result<Arc<dyn ActivityBackend>> {
    if settings.backend.url.trim().is_empty() {
        warn!("No backend url configured; activity is only recorded in memory");
        return Ok(Arc::new(MemoryBackend::new()));
    }
    let backend = RestBackend::new(&settings.backend).context("invalid backend settings")?;
    Ok(Arc::new(backend))
}

fn parse_command(line: &str) -> Option<LifecycleEvent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "hide" | "background" => Some(LifecycleEvent::Background),
        "show" | "foreground" => Some(LifecycleEvent::Foreground),
        "quit" | "exit" => Some(LifecycleEvent::Teardown),
        _ => None,
    }
}

/// Track the member named by `CLUBHOUSE_USER_ID` until Ctrl-C or `quit`.
///
/// Visibility changes can be simulated on stdin with `hide` / `show`.
pub async fn run() -> Result<()> {
    // Initialize logging (RUST_LOG wins when set)
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    info!("Clubhouse client starting up...");

    let config_path = std::env::var_os(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let store = SettingsStore::new(config_path)?;
    let settings = store.settings().with_env_overrides();

    let user_id = std::env::var(ENV_USER_ID)
        .with_context(|| format!("{ENV_USER_ID} must name the signed-in member"))?;
    let user = AuthUser {
        id: user_id.as_str().into(),
        display_name: std::env::var(ENV_DISPLAY_NAME).ok(),
    };

    let deps = ActivityDeps {
        backend: build_backend(&settings)?,
        presence: Arc::new(LocalPresenceHub::new()),
        clock: Arc::new(SystemClock),
        settings,
    };

    let auth = AuthState::new(Some(user));
    let (events_tx, events_rx) = mpsc::channel(16);
    let shutdown = CancellationToken::new();
    let supervisor = spawn_activity_supervisor(deps, auth.context(), events_rx, shutdown.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("Failed to listen for Ctrl-C: {err}");
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(LifecycleEvent::Teardown) => break,
                    Some(event) => {
                        if events_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown command '{}'; try hide, show or quit", line.trim()),
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }

    // Teardown flushes the visible stretch before the process exits.
    let _ = events_tx.send(LifecycleEvent::Teardown).await;
    supervisor
        .await
        .context("activity supervisor task failed to join")?;
    shutdown.cancel();

    info!("Clubhouse client stopped");
    Ok(())
}

use color_eyre::{eyre::eyre, Result};
use headtrack::config::TrackingConfig;
use headtrack::pipeline::PipelineHandle;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Minimum spacing between logged frames.
const FRAME_LOG_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = load_config()?;
    info!(
        "Listening for OpenTrack on port {} ({:?} receiver)",
        config.receiver.port, config.receiver.mode
    );

    let handle = PipelineHandle::spawn_udp(config)
        .map_err(|e| eyre!("Failed to start tracking pipeline: {}", e))?;
    let mut frames = handle.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut recentered = false;
    let mut last_logged: Option<Instant> = None;

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Ctrl-C received, shutting down");
                break;
            }

            changed = frames.changed() => {
                if changed.is_err() {
                    warn!("Tracking pipeline stopped unexpectedly");
                    break;
                }
                let Some(frame) = *frames.borrow_and_update() else {
                    continue;
                };

                // Treat wherever the user is looking at startup as straight ahead
                if !recentered {
                    handle
                        .recenter()
                        .await
                        .map_err(|e| eyre!("Failed to recenter: {}", e))?;
                    recentered = true;
                    info!(
                        "Recentered on first pose ({:.1}, {:.1}, {:.1})",
                        frame.raw.0, frame.raw.1, frame.raw.2
                    );
                    continue;
                }

                let now = Instant::now();
                if last_logged.is_some_and(|at| now.duration_since(at) < FRAME_LOG_INTERVAL) {
                    continue;
                }
                last_logged = Some(now);

                info!(
                    "yaw {:7.2}  pitch {:7.2}  roll {:7.2}  connected={} remote={}",
                    frame.pose.yaw,
                    frame.pose.pitch,
                    frame.pose.roll,
                    frame.connected,
                    frame.remote
                );
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Explicit path from the first argument, else the user config file, else defaults.
fn load_config() -> Result<TrackingConfig> {
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        return TrackingConfig::load(&path)
            .map_err(|e| eyre!("Failed to load {}: {}", path.display(), e));
    }

    match TrackingConfig::default_path() {
        Ok(path) => Ok(TrackingConfig::load_or_default(&path)?),
        Err(e) => {
            warn!("{}; using default config", e);
            Ok(TrackingConfig::default())
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

/// Builds the log filter from a `RUST_LOG` style directive such as
/// `info` or `headtrack=debug,warn`. Malformed directives fall back to `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn setup_logging_env() {
    let directives = std::env::var("RUST_LOG").ok();

    FmtSubscriber::builder()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_accepts_target_directives() {
        let filter = log_filter(Some("headtrack=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_log_filter_plain_level() {
        let filter = log_filter(Some("warn"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_falls_back_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        let filter = log_filter(Some("headtrack=loud"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }
}

//! Tracing setup: console layer plus an optional rotating JSON file sink.

use std::path::Path;

use eyre::{Result, WrapErr};
use feeder_config::Logging;
use tracing_appender::rolling::{self, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::cli::FILE_GUARD;

fn rotation_for(name: Option<&str>) -> Result<Rotation> {
    match name.unwrap_or("never").to_ascii_lowercase().as_str() {
        "never" => Ok(Rotation::NEVER),
        "daily" => Ok(Rotation::DAILY),
        "hourly" => Ok(Rotation::HOURLY),
        other => eyre::bail!("logging.rotation must be never|daily|hourly, got '{other}'"),
    }
}

/// Console logs go to stderr so stdout stays clean for replies and JSON.
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(json: bool, level: &str, file_cfg: &Logging) -> Result<()> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter())
            .boxed()
    };

    let file = match &file_cfg.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("feeder.log");
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("create log directory {}", dir.display()))?;
            let appender = rolling::RollingFileAppender::new(
                rotation_for(file_cfg.rotation.as_deref())?,
                dir,
                name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_level = file_cfg.level.as_deref().unwrap_or(level);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(EnvFilter::new(file_level))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::rotation_for;

    #[test]
    fn rotation_names() {
        assert!(rotation_for(None).is_ok());
        assert!(rotation_for(Some("Daily")).is_ok());
        assert!(rotation_for(Some("weekly")).is_err());
    }
}

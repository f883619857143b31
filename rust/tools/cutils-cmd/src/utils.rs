//! Common utilities for cutils-cmd

use anyhow::Result;
use std::{path::Path, time::Duration};
use tracing_subscriber::EnvFilter;

/// Checks if a file exists and is readable
pub fn validate_file_exists(path: &str) -> Result<()> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }
    if !file_path.is_file() {
        anyhow::bail!("Path is not a file: {}", path);
    }
    Ok(())
}

/// Formats a duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_secs_f64() * 1000.0;
    if millis < 1000.0 {
        format!("{millis:.1} ms")
    } else {
        format!("{:.2} s", millis / 1000.0)
    }
}

/// Default filter directive for the given `-v` count.
pub fn filter_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Sends log output to stderr. `RUST_LOG` takes precedence over `-v`.
/// Records from the `log` facade are bridged into the subscriber.
pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_for_verbosity(verbose)));

    // Fails only when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.5 ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50 s");
    }

    #[test]
    fn test_filter_for_verbosity() {
        assert_eq!(filter_for_verbosity(0), "warn");
        assert_eq!(filter_for_verbosity(1), "debug");
        assert_eq!(filter_for_verbosity(5), "trace");
        assert!(EnvFilter::try_new(filter_for_verbosity(2)).is_ok());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(1);
        init_logging(2);
        log::debug!("bridged through the log facade");
    }

    #[test]
    fn test_validate_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_file_exists(dir.path().to_str().unwrap()).is_err());
        let file = dir.path().join("pool.json");
        std::fs::write(&file, "{}").unwrap();
        assert!(validate_file_exists(file.to_str().unwrap()).is_ok());
    }
}

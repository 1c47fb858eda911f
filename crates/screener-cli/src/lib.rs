//! Shared plumbing for the screener binaries: env setup, logging, API
//! key handling, and minimal argument parsing.

use std::time::Duration;

use anyhow::{bail, Context};
use screener_pipeline::FetchConfig;
use tracing_subscriber::EnvFilter;

/// Load `.env` and initialize tracing. Call once at the top of main.
pub fn init() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Read and sanity-check the FMP API key from the environment.
pub fn api_key() -> anyhow::Result<String> {
    let key = std::env::var("FMP_API_KEY")
        .context("FMP_API_KEY is not set; add it to the environment or a .env file")?;
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!("FMP_API_KEY is empty");
    }
    if key.len() < 10 {
        bail!("FMP_API_KEY looks too short to be a real key");
    }
    Ok(key)
}

/// Apply the optional environment overrides to a fetch configuration:
/// `SCREENER_CONCURRENCY` and `FMP_RATE_DELAY_MS`. Unparseable values
/// are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut FetchConfig) {
    if let Ok(raw) = std::env::var("SCREENER_CONCURRENCY") {
        match raw.parse::<usize>() {
            Ok(n) if n > 0 => cfg.concurrency = n,
            _ => tracing::warn!("ignoring invalid SCREENER_CONCURRENCY={raw}"),
        }
    }
    if let Ok(raw) = std::env::var("FMP_RATE_DELAY_MS") {
        match raw.parse::<u64>() {
            Ok(ms) => cfg.request_delay = Duration::from_millis(ms),
            _ => tracing::warn!("ignoring invalid FMP_RATE_DELAY_MS={raw}"),
        }
    }
}

/// Value of `--name <value>` in the argument list, if present.
pub fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// True when `--name` appears as a bare flag.
pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

/// Parse `--name <value>` as a number, keeping `default` when absent.
pub fn flag_parse<T: std::str::FromStr>(
    args: &[String],
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match flag_value(args, name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {name}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flag_value_finds_following_argument() {
        let a = args(&["--input", "rows.csv", "--overwrite"]);
        assert_eq!(flag_value(&a, "--input").as_deref(), Some("rows.csv"));
        assert_eq!(flag_value(&a, "--output"), None);
        assert!(has_flag(&a, "--overwrite"));
        assert!(!has_flag(&a, "--input-dir"));
    }

    #[test]
    fn flag_parse_uses_default_and_rejects_garbage() {
        let a = args(&["--min-cap", "5000000"]);
        assert_eq!(flag_parse(&a, "--min-cap", 0.0).unwrap(), 5_000_000.0);
        assert_eq!(flag_parse(&a, "--limit", 20usize).unwrap(), 20);

        let bad = args(&["--min-cap", "lots"]);
        assert!(flag_parse(&bad, "--min-cap", 0.0).is_err());
    }
}

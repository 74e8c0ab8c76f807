use aia_config::{BASE_URL_ENV, Config};
use tracing::info;

use super::build_backend;

/// Strategy for displaying configuration information.
///
/// Prints the effective configuration (file, defaults and environment
/// merged), masks the API key, and probes the backend.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== aia Configuration ===\n");

        let config_path = Config::config_path()?;
        println!("Config File:");
        if config_path.exists() {
            println!("  Path: {}", config_path.display());
        } else {
            println!("  Path: {} (not found, using defaults)", config_path.display());
        }
        println!();

        println!("Backend:");
        println!("  URL: {}", config.backend.base_url);
        if std::env::var(BASE_URL_ENV).is_ok() {
            println!("  (overridden by {BASE_URL_ENV})");
        }
        println!("  Wire: {:?}", config.backend.wire);
        match config.backend.timeout_secs {
            Some(secs) => println!("  Timeout: {secs}s"),
            None => println!("  Timeout: none"),
        }

        info!("Probing backend");
        let backend = build_backend(&config)?;
        match backend.status().await {
            Ok(_) => println!("  Status: Reachable"),
            Err(e) => {
                println!("  Status: Unreachable");
                println!("  Error: {e}");
            }
        }
        println!();

        println!("Session:");
        println!("  Greeting: {}", truncate(&config.session.greeting, 60));
        println!(
            "  API Key: {}",
            config
                .session
                .api_key
                .as_deref()
                .map_or_else(|| "(server default)".to_string(), mask_key)
        );

        Ok(())
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

mod activity;
mod config;
mod core;
mod gateway;
mod providers;
mod quarantine;
mod relay;
mod sanitize;
mod supervisor;
mod traits;
mod transport;
mod types;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("amelied {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("amelied {}", env!("CARGO_PKG_VERSION"));
                println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
                println!("Usage: amelied [OPTIONS]\n");
                println!("Options:");
                println!("  -h, --help       Print help");
                println!("  -V, --version    Print version");
                println!("\nConfiguration is read from config.toml in the working directory.");
                return Ok(());
            }
            _ => {}
        }
    }

    let config_path = PathBuf::from("config.toml");

    // Load config — if corrupted, try restoring from .lastgood (proven
    // working config), then fall back to .bak.
    let config = match config::AppConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config load failed: {}", e);

            let candidates = [
                config_path.with_extension("toml.lastgood"),
                config_path.with_extension("toml.bak"),
            ];

            let mut restored = false;
            for candidate in &candidates {
                if candidate.exists() {
                    eprintln!("Trying restore from {}...", candidate.display());
                    if std::fs::copy(candidate, &config_path).is_ok()
                        && config::AppConfig::load(&config_path).is_ok()
                    {
                        eprintln!("Restored config from {}", candidate.display());
                        restored = true;
                        break;
                    }
                }
            }

            if !restored {
                return Err(e);
            }

            config::AppConfig::load(&config_path)?
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(crate::core::run(config))
}

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use structopt::StructOpt;

use heimdall::analytics::AnalyticsCollector;
use heimdall::api::KvUserDirectory;
use heimdall::config::Config;
use heimdall::detection::BruteForceDetector;
use heimdall::persistence::{KeyValueStore, SqliteKeyValueStore};

/// Heimdall risk engine command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "heimdall", about = "Adaptive authentication risk engine CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Provision a user in the directory
    AddUser {
        /// Email address
        email: String,
        /// Password
        password: String,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print daily metrics as JSON
    Metrics {
        /// UTC date (YYYY-MM-DD), defaults to today
        #[structopt(short, long)]
        date: Option<String>,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Clear a brute-force window after a confirmed non-malicious
    /// resolution
    ResetWindow {
        /// Window key: an identity, or "ip:<address>"
        key: String,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::from_file(path)
    } else {
        eprintln!("Config file not found at {:?}, using defaults", path);
        Ok(Config::default())
    }
}

fn open_store(config: &Config) -> Result<Arc<SqliteKeyValueStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteKeyValueStore::new(&config.store.db_path)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::AddUser {
            email,
            password,
            config,
        } => {
            let config = load_config(&config)?;
            let store = open_store(&config)?;
            let directory = KvUserDirectory::new(store, config.auth.password_salt.clone());

            match directory.create_user(&email, &password, Utc::now().timestamp()) {
                Ok(user) => println!("User created: {} ({})", user.email, user.id),
                Err(e) => {
                    eprintln!("Failed to create user: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Cli::Metrics { date, config } => {
            let config = load_config(&config)?;
            let store = open_store(&config)?;
            let collector = AnalyticsCollector::new(store.clone());

            let date =
                date.unwrap_or_else(|| AnalyticsCollector::date_of(Utc::now().timestamp()));
            match collector.get_metrics(&date)? {
                Some(metrics) => println!("{}", serde_json::to_string_pretty(&metrics)?),
                None => {
                    println!("No metrics recorded for {}", date);
                    let days: Vec<String> = store
                        .list("metrics:")?
                        .into_iter()
                        .map(|key| key.trim_start_matches("metrics:").to_string())
                        .collect();
                    if !days.is_empty() {
                        println!("Days with data: {}", days.join(", "));
                    }
                }
            }
        }
        Cli::ResetWindow { key, config } => {
            let config = load_config(&config)?;
            let store = open_store(&config)?;
            let detector = BruteForceDetector::with_window(
                store,
                config.detection.brute_force_window_seconds,
            );

            detector.reset(&key)?;
            println!("Cleared brute-force window for: {}", key);
        }
    }

    Ok(())
}

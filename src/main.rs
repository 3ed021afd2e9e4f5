use std::fs;
use std::path::Path;

use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;

pub mod models;
mod repositories;
pub mod services;
pub mod settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = settings::Settings::new(&args.config).expect("Could not load config file.");
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting MarketBot onboarding service.");

    let database_url = if config.accounts.database_url.is_empty() {
        default_database_url().expect("Could not resolve a database location.")
    } else {
        config.accounts.database_url.clone()
    };

    let conn = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Could not connect to database.");

    println!("[*] Starting services.");
    services::start_services(conn, config)
        .await
        .expect("Could not start services.");
}

fn default_database_url() -> Result<String, anyhow::Error> {
    let dirs = directories::ProjectDirs::from("app", "MarketBot", "marketbot-onboarding")
        .ok_or_else(|| anyhow::anyhow!("No home directory available."))?;
    fs::create_dir_all(dirs.data_dir())?;

    Ok(format!(
        "sqlite://{}?mode=rwc",
        dirs.data_dir().join("onboarding.db").display()
    ))
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}

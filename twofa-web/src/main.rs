//! twofa-gate
//!
//! Reverse proxy that enforces 2FA in front of the host application.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use twofa_core::{
    init_logging, DatabaseConfig, EnforcementConfig, LogFormat, LoggingConfig,
    PostgresAccountStore,
};
use twofa_web::{TwoFactorGateServerBuilder, WebConfig};

/// 2FA gate - blocks write requests from users without two-factor authentication
#[derive(Parser)]
#[command(name = "twofa-gate")]
#[command(about = "Enforce 2FA in front of the host application")]
#[command(version)]
struct Args {
    /// Host to bind to (overrides TWOFA_GATE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides TWOFA_GATE_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host application base URL (overrides TWOFA_UPSTREAM_URL)
    #[arg(long)]
    upstream: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        format: if args.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Compact
        },
        filter_directives: vec![
            format!("twofa_web={}", args.log_level),
            format!("twofa_core={}", args.log_level),
            "tower_http=info".to_string(),
        ],
        ..LoggingConfig::default()
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let mut config = match WebConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(upstream) = args.upstream {
        config.upstream_url = upstream;
    }

    let database = match DatabaseConfig::from_env() {
        Ok(database) => database,
        Err(e) => {
            e.log();
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };
    let enforcement = Arc::new(EnforcementConfig::from_env());

    info!("🗄️  Accounts: {}", database.target());

    // Lookups fail open while the database is unreachable
    let store = PostgresAccountStore::connect_lazy(&database);

    let server = match TwoFactorGateServerBuilder::new(config)
        .enforcement(enforcement)
        .store(Arc::new(store))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to build gate: {}", e);
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.start().await {
        eprintln!("❌ Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

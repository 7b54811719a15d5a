//! twofa CLI - audit and enforce two-factor authentication
//!
//! Reads the host application's account table, reports 2FA compliance and
//! disables (or re-enables) accounts on operator confirmation.

mod terminal;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use terminal::TerminalOperator;
use twofa_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success,
    DatabaseConfig, EnforcementConfig, Enforcer, LoggingConfig, PostgresAccountStore,
};

#[derive(Parser, Debug)]
#[command(name = "twofa")]
#[command(about = "Enforce 2FA for host application users")]
#[command(
    long_about = "Enforce 2FA for host application users.\n\n\
    Environment variables:\n  \
    DB_HOST, DB_PORT, DB_USER, DB_PASSWORD, DB_DB  database connection\n  \
    2FA_EXEMPT_USERS  comma-separated emails exempt from the 2FA requirement"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Audit users and show 2FA status
    Audit,

    /// Disable users without 2FA
    Enforce,

    /// Re-enable a specific user
    EnableUser {
        /// Email of the account to re-enable
        email: String,
    },
}

/// Map a count-style result to the process exit status
fn exit_for_count(result: i64) -> ExitCode {
    if result >= 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn exit_for_flag(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting twofa CLI v{}", env!("CARGO_PKG_VERSION"));

    let enforcement = Arc::new(EnforcementConfig::from_env());
    let database = match DatabaseConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            e.log();
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match PostgresAccountStore::connect(&database).await {
        Ok(store) => store,
        Err(e) => {
            log_operation_error!("connect", e);
            eprintln!("{}", e);
            for suggestion in e.suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
            return ExitCode::FAILURE;
        }
    };

    let enforcer = Enforcer::new(Arc::new(store), enforcement);
    let mut operator = TerminalOperator;

    match cli.command {
        Commands::Audit => {
            log_operation_start!("audit");
            let result = enforcer.audit(&mut operator).await;
            if result >= 0 {
                log_operation_success!("audit", non_compliant = result);
            }
            exit_for_count(result)
        }
        Commands::Enforce => {
            log_operation_start!("enforce");
            let result = enforcer.enforce(&mut operator).await;
            if result >= 0 {
                log_operation_success!("enforce", disabled = result);
            }
            exit_for_count(result)
        }
        Commands::EnableUser { email } => {
            log_operation_start!("enable_user", email = %email);
            let ok = enforcer.enable_user(&email, &mut operator).await;
            if !ok {
                error!(email = %email, "User was not enabled");
            }
            exit_for_flag(ok)
        }
    }
}

// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pagewright_runtime::cli::{
    self, batch_cmd::BatchArgs, cookies_cmd::CookiesAction, db_cmd::DbAction,
    extract_cmd::ExtractArgs, interact_cmd::InteractArgs, login_cmd::LoginArgs, App,
};
use pagewright_runtime::config::RunConfig;
use pagewright_runtime::logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pagewright",
    about = "Pagewright: resilient browser automation, phone extraction and SMS batches",
    version,
    after_help = "Run 'pagewright <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (defaults to ~/.pagewright/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a page and act on the first matching selector
    Interact(InteractArgs),
    /// Find a phone number on each page
    ExtractPhone(ExtractArgs),
    /// Log in through a username/password form
    Login(LoginArgs),
    /// Export or import browser cookies
    Cookies {
        #[command(subcommand)]
        action: CookiesAction,
    },
    /// Send one SMS per CSV row, with retries
    SendBatch(BatchArgs),
    /// Manage the client database
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

async fn dispatch(command: Commands, json: bool, config: Option<PathBuf>) -> Result<()> {
    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "pagewright", &mut std::io::stdout());
        return Ok(());
    }

    let config = RunConfig::load(config.as_deref())?;
    let app = App::start(config, json)?;
    let result = match &command {
        Commands::Interact(args) => cli::interact_cmd::run(&app, args).await,
        Commands::ExtractPhone(args) => cli::extract_cmd::run(&app, args).await,
        Commands::Login(args) => cli::login_cmd::run(&app, args).await,
        Commands::Cookies { action } => cli::cookies_cmd::run(&app, action).await,
        Commands::SendBatch(args) => cli::batch_cmd::run(&app, args).await,
        Commands::Db { action } => cli::db_cmd::run(&app, action).await,
        Commands::Completions { .. } => Ok(()),
    };
    app.finish().await;
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logging::init(args.verbose, args.log_json);
    let json = args.json;

    let result = dispatch(args.command, json, args.config).await;

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if json {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

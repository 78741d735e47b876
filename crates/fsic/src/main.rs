use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsic_core::{
    check_database, update_database, CheckSummary, FileKey, FsicConfig, FsicError,
    PasswordAuthenticator, PasswordFile, SelfTest,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

mod logging;
mod prompt;

use crate::prompt::TerminalPrompt;

/// Exit status when a check completes but finds anomalies.
const EXIT_ANOMALIES: u8 = 3;
const EXIT_OTHER: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "File system integrity checker", long_about = None)]
struct Cli {
    /// Directory holding fsic.conf, fsic.db, fsic.pw, fsic.sc and fsic.log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// JSON file overriding individual file locations
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the password file
    Init,
    /// Authenticate and rebuild the integrity database
    #[command(short_flag = 'u')]
    Update,
    /// Check files against the integrity database
    #[command(short_flag = 'c')]
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Change the update password
    #[command(short_flag = 'p')]
    ChangePassword,
    /// Verify the checker's own files
    #[command(short_flag = 's')]
    SelfTest {
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json(&self) -> bool {
        matches!(self, Self::Check { json: true } | Self::SelfTest { json: true })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("fsic: {err:#}");
            let code = err
                .downcast_ref::<FsicError>()
                .map(FsicError::exit_code)
                .unwrap_or(EXIT_OTHER);
            ExitCode::from(code)
        }
    }
}

fn load_config(cli: &Cli) -> Result<FsicConfig> {
    let config = match &cli.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create data directory {}", dir.display()))?;
            FsicConfig::in_dir(dir)?
        }
        None => FsicConfig::from_current_dir()?,
    };
    match &cli.settings {
        Some(settings) => Ok(config.load_settings(settings)?),
        None => Ok(config),
    }
}

fn run(cli: Cli) -> Result<u8> {
    let config = load_config(&cli)?;
    logging::init(&config.log_file, cli.command.json())?;
    let key = FileKey::from_env();
    let password_file = PasswordFile::new(&config.password_file);

    match cli.command {
        Commands::Init => {
            password_file.initialize(&mut TerminalPrompt)?;
            println!("Password file created: {}", config.password_file.display());
            Ok(0)
        }
        Commands::Update => {
            let mut auth = PasswordAuthenticator::new(password_file, TerminalPrompt);
            let summary = update_database(&config, &key, &mut auth)?;
            println!(
                "Database updated: {} records written, {} skipped",
                summary.records_written, summary.skipped
            );
            Ok(0)
        }
        Commands::Check { json } => {
            let summary = check_database(&config.database_file, &key)?;
            report(&summary, json)
        }
        Commands::ChangePassword => {
            password_file.change(&mut TerminalPrompt)?;
            println!("Password changed");
            Ok(0)
        }
        Commands::SelfTest { json } => {
            let summary = SelfTest::from_config(&config)?.verify(&key)?;
            if summary.is_clean() {
                info!("Self-test passed");
            } else {
                error!("Self-test failed");
            }
            report(&summary, json)
        }
    }
}

fn report(summary: &CheckSummary, json: bool) -> Result<u8> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "{} records, {} clean, {} anomalies",
            summary.records_read,
            summary.clean_files,
            summary.total_anomalies()
        );
        for report in &summary.reports {
            let kinds: Vec<String> = report.anomalies.iter().map(ToString::to_string).collect();
            println!(
                "  line {}: {}: {}",
                report.line,
                report.path.as_deref().unwrap_or("-"),
                kinds.join(", ")
            );
        }
    }
    Ok(if summary.is_clean() { 0 } else { EXIT_ANOMALIES })
}

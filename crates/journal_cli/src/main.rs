//! Command-line front end for the journal data layer.
//!
//! # Responsibility
//! - Expose health probe, backup export/import and summary commands.
//! - Keep output deterministic so scripts can parse it.

use clap::{Parser, Subcommand};
use journal_core::{init_from_config, CoreConfig, ImportMode, Journal};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "journal", version, about = "Campaign journal storage tool")]
struct Cli {
    /// Database file; overrides JOURNAL_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core liveness and version.
    Ping,
    /// Write a JSON backup to a file or stdout.
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Restore a JSON backup; replaces stored data unless --merge is given.
    Import {
        file: PathBuf,
        #[arg(long)]
        merge: bool,
    },
    /// Print entity counts.
    Summary,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();
    if let Some(db) = cli.db.clone() {
        config = config.with_db_path(db);
    }
    if let Err(err) = init_from_config(&config) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &CoreConfig) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Ping => {
            println!("journal_core ping={}", journal_core::ping());
            println!("journal_core version={}", journal_core::core_version());
        }
        Command::Export { output } => {
            let journal = Journal::open(config)?;
            let json = journal.backup().export_json()?;
            match output {
                Some(path) => std::fs::write(&path, json)?,
                None => println!("{json}"),
            }
        }
        Command::Import { file, merge } => {
            let journal = Journal::open(config)?;
            let text = std::fs::read_to_string(&file)?;
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            let report = journal.backup().import_json(&text, mode)?;
            println!(
                "mode={} inserted={} skipped={}",
                report.mode,
                report.inserted(),
                report.skipped()
            );
        }
        Command::Summary => {
            let summary = Journal::open(config)?.summary()?;
            println!("campaigns={}", summary.campaigns);
            println!("characters={}", summary.characters);
            println!("entries={}", summary.entries);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_import_with_merge_and_global_db() {
        let cli = Cli::parse_from(["journal", "import", "backup.json", "--merge", "--db", "x.db"]);
        assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("x.db")));
        assert!(matches!(cli.command, Command::Import { merge: true, .. }));
    }
}

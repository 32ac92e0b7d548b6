mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod runner;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Settings;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    log::trace!("verbosity {}, quiet {}", ctx.verbose, ctx.quiet);

    let load = || Settings::load(cli.config.as_deref(), &cli.connection);

    match cli.command {
        Command::Batch(args) => commands::batch::run(&ctx, &load()?, args),
        Command::Classes(args) => commands::classes::run(&ctx, &load()?, args),
        Command::Groups(args) => commands::groups::run(&ctx, &load()?, args),
        Command::RefreshClasses => commands::refresh::run(&ctx, &load()?),
        Command::Config => commands::config::run(&load()?),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "ncedit", &mut io::stdout());
            Ok(())
        }
    }
}

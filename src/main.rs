//! envmectl - Embedded NVMe controller recovery tool
//!
//! Talks to an embedded NVMe controller through a vendor service
//! connection. The main job is the boot-from-host (BFH) recovery handoff:
//! hand the controller a loader image for its MSP type, wait for it to come
//! up, and print the NAND descriptor that names the firmware image to flash.
//!
//! # Architecture
//!
//! The controller connection is a `ControllerChannel` opened by name through
//! `envme-channel`. Every command receives that channel by `&mut`, so the
//! same code runs against hardware and the emulated `dummy` channel.
//!
//! Every failure comes back to `main` as an error, is printed once to
//! standard error, and turns into exit code 1.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use envme_channel::{open_channel, ControllerChannel};
use envme_core::bfh::BfhRequest;
use envme_core::blob::BlobSource;
use envme_core::config::Config;
use log::LevelFilter;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG still overrides the -v level
    env_logger::Builder::new()
        .filter_level(level_for(cli.verbose))
        .parse_default_env()
        .init();

    exit_code(run(cli, &mut io::stdout()))
}

/// Log level for the number of `-v` flags
fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Print the error, if any, and map the result to an exit code
fn exit_code(result: Result<(), Box<dyn std::error::Error>>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| format!("Failed to load configuration: {}", e))?;
    match &config.source {
        Some(path) => log::debug!("Loaded configuration from {}", path.display()),
        None => log::debug!("Using built-in configuration"),
    }

    let channel = cli.channel.as_deref();

    match cli.command {
        Commands::Bfh {
            size,
            loader,
            entry,
            recheck,
        } => {
            let mut bfh = config.bfh;
            if let Some(entry) = entry {
                bfh.entry = entry;
            }
            if let Some(recheck) = recheck {
                bfh.recheck = recheck;
            }
            let request = BfhRequest {
                override_size: size,
                loader_path: loader,
            };
            with_channel(channel, |ch| {
                commands::bfh::run_bfh(ch, &config, bfh, &request, out)
            })
        }
        Commands::Query { what } => with_channel(channel, |ch| {
            commands::query::run_query(ch, &config.loaders, what)
        }),
        Commands::Identify => with_channel(channel, commands::query::run_identify),
        Commands::Validate { input } => {
            with_channel(channel, |ch| commands::firmware::run_validate(ch, &input))
        }
        Commands::Update { input, stdin } => {
            let source = match (input, stdin) {
                (Some(path), _) => BlobSource::Path(path),
                (None, Some(size)) => BlobSource::Stream { size },
                (None, None) => return Err("Either --input or --stdin is required".into()),
            };
            with_channel(channel, |ch| {
                commands::firmware::run_update(ch, &source, config.bfh.max_stream_size)
            })
        }
        Commands::QueryUpdate { input } => with_channel(channel, |ch| {
            commands::firmware::run_query_update(ch, &input)
        }),
        Commands::Pci { state, aux } => {
            with_channel(channel, |ch| commands::power::run_pci(ch, state, aux))
        }
        Commands::NvmeState { state } => {
            with_channel(channel, |ch| commands::power::run_nvme_state(ch, state))
        }
        Commands::NvmeCommand { selector, words } => with_channel(channel, |ch| {
            commands::power::run_nvme_command(ch, selector, &words)
        }),
        Commands::BfhGpio { on, off: _ } => {
            with_channel(channel, |ch| commands::power::run_bfh_gpio(ch, on))
        }
        Commands::ListChannels => {
            commands::list_channels();
            Ok(())
        }
    }
}

/// Open the channel, run `f` on it, and close it
///
/// The connection is closed on every path: explicitly after success so a
/// close failure is reported, and by the handle's drop otherwise.
fn with_channel<F>(channel: Option<&str>, f: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut dyn ControllerChannel) -> Result<(), Box<dyn std::error::Error>>,
{
    let name = channel.ok_or("No channel specified (use -c/--channel)")?;
    let mut handle = open_channel(name)?;
    log::debug!("Opened channel {}", handle.name());

    f(handle.as_channel_mut())?;
    handle.close()?;
    Ok(())
}

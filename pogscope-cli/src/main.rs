mod app;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::Parser;
use pogscope::{DecompileOptions, Decompilation};

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .expect("failed to set Ctrl+C handler");

    let cli = Cli::parse();

    // Show pogscope info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("pogscope", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    match &cli.command {
        Command::Decompile {
            path,
            includes,
            output,
            assembly,
            offsets,
            debug_logging,
        } => {
            let options = DecompileOptions {
                assembly: *assembly,
                assembly_only: false,
                assembly_offsets: *offsets,
                debug_logging: *debug_logging,
            };
            let source = run(path, includes.as_deref(), options)?;

            let output = output.clone().unwrap_or_else(|| default_output(path));
            std::fs::write(&output, source)
                .with_context(|| format!("failed to write {}", output.display()))?;
            log::info!("Wrote {}", output.display());
        }

        Command::Disasm {
            path,
            includes,
            output,
            no_offsets,
        } => {
            let options = DecompileOptions {
                assembly: false,
                assembly_only: true,
                assembly_offsets: !*no_offsets,
                debug_logging: false,
            };
            let listing = run(path, includes.as_deref(), options)?;

            match output {
                Some(output) => {
                    std::fs::write(output, listing)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                }
                None => print!("{listing}"),
            }
        }
    }

    Ok(())
}

fn run(path: &Path, includes: Option<&Path>, options: DecompileOptions) -> anyhow::Result<String> {
    let mut job = Decompilation::from_path(path, includes, options)
        .with_context(|| format!("failed to load {}", path.display()))?;
    job.resolve();
    Ok(job.render())
}

fn default_output(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(".d.pog");
    PathBuf::from(name)
}

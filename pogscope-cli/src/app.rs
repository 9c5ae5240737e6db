use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pogscope - POG script package decompilation and inspection
#[derive(Debug, Parser)]
#[command(name = "pogscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decompile a package to POG source.
    Decompile {
        /// Path to the compiled package file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Includes directory with the package headers. Without it, handle
        /// hierarchies, enums, and prototypes are unavailable and type recovery
        /// degrades badly.
        #[arg(short, long, value_name = "DIR")]
        includes: Option<PathBuf>,

        /// Output path (defaults to the input path plus `.d.pog`).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Emit the per-function assembly listing as comments above each function.
        #[arg(long)]
        assembly: bool,

        /// Prefix assembly listing lines with byte offsets.
        #[arg(long)]
        offsets: bool,

        /// Insert a Debug.PrintString trace at the top of every function body.
        #[arg(long)]
        debug_logging: bool,
    },

    /// Disassemble a package: emit only the assembly listing.
    Disasm {
        /// Path to the compiled package file.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Includes directory with the package headers.
        #[arg(short, long, value_name = "DIR")]
        includes: Option<PathBuf>,

        /// Output path (defaults to stdout).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Hide byte offsets (shown by default).
        #[arg(long)]
        no_offsets: bool,
    },
}

#![deny(missing_docs)]

//! # pogscope
//!
//! A decompiler for the POG scripting bytecode used by a proprietary game engine.
//! `pogscope` consumes a compiled binary package file and reconstructs human-readable
//! POG source suitable for re-compilation, recovering structured control flow, types,
//! and meaningful variable names from a flat opcode stream.
//!
//! # Architecture
//!
//! The library is organized into layers that mirror the pipeline:
//!
//! - **File layer** ([`crate::file`]) - memory-mapped input and endian-aware cursor
//!   parsing; section framing is big-endian, payloads little-endian
//! - **Assembly layer** ([`crate::assembly`]) - the opcode set and code-section
//!   disassembly into [`assembly::Operation`] lists
//! - **Package layer** ([`crate::package`]) - the shared [`Context`]: header
//!   ingestion (prototypes, handle hierarchy, enums), container loading, and
//!   package dependency handling
//! - **Decompiler layer** ([`crate::decompiler`]) - expression recovery,
//!   control-flow structuring, fixed-point type inference, name synthesis, and
//!   source rendering
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! let source = pogscope::decompile_file(
//!     Path::new("mission07.pkg"),
//!     Some(Path::new("includes/")),
//!     pogscope::DecompileOptions::default(),
//! )?;
//! println!("{source}");
//! # Ok::<(), pogscope::Error>(())
//! ```
//!
//! Staged access for tooling that needs the intermediate state:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pogscope::{Decompilation, DecompileOptions};
//!
//! let mut job = Decompilation::from_path(
//!     Path::new("mission07.pkg"),
//!     Some(Path::new("includes/")),
//!     DecompileOptions::default(),
//! )?;
//! job.resolve();
//! println!("{} functions", job.functions.len());
//! std::fs::write("mission07.pkg.d.pog", job.render())?;
//! # Ok::<(), pogscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Recovery is local wherever
//! possible: malformed header entries and undecodable or unstructurable functions
//! are skipped with diagnostics on the `log` facade, while a malformed container or
//! failing output sink aborts the job.
//!
//! # Determinism
//!
//! Re-running on identical inputs produces byte-identical output: hint sets are
//! insertion-ordered, enum members and import lists are sorted, and name-collision
//! resolution processes variables in scope order.

#[macro_use]
pub(crate) mod error;

pub mod assembly;
pub mod decompiler;
pub mod file;
pub mod package;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

pub use assembly::Opcode;
pub use decompiler::{decompile_file, Decompilation};
pub use error::Error;
pub use file::Parser;
pub use package::{Context, DecompileOptions};

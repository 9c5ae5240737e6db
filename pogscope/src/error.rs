use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        $crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! structure_error {
    // Single string version
    ($offset:expr, $msg:expr) => {
        $crate::Error::Structure {
            message: $msg.to_string(),
            offset: $offset,
        }
    };

    // Format string with arguments version
    ($offset:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Error::Structure {
            message: format!($fmt, $($arg)*),
            offset: $offset,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the decompilation pipeline: container and opcode
/// stream parsing, header ingestion, control-flow structuring, and output writing. Most errors
/// are local (the affected function or header entry is skipped with a diagnostic); only
/// malformed container headers and output I/O failures abort the whole job.
///
/// # Error Categories
///
/// ## Input Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid container structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input boundaries
/// - [`Error::NotSupported`] - Input is not a POG package container
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::UnknownOpcode`] - Unrecognized opcode in the code section
///
/// ## Structuring Errors
/// - [`Error::Structure`] - Control-flow reconstruction failed for a function
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    ///
    /// This error occurs when trying to read data beyond the end of the input.
    /// It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Indicates that the input file does not start with the expected `FORM`
    /// container wrapper.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// An unrecognized opcode was found in the code section.
    ///
    /// The affected function is abandoned; decoding resumes at the next
    /// function boundary.
    #[error("Unknown opcode 0x{opcode:02X} at offset 0x{offset:08X}")]
    UnknownOpcode {
        /// The opcode byte that was not recognized
        opcode: u8,
        /// The code-section offset at which it was found
        offset: u32,
    },

    /// Control-flow reconstruction failed for a function.
    ///
    /// Covers unclassified jumps, unmatched atomic blocks, and switch parse
    /// failures. The affected function is abandoned with a diagnostic; the
    /// rest of the job continues.
    #[error("Structure - 0x{offset:08X}: {message}")]
    Structure {
        /// Description of the structural failure
        message: String,
        /// The code-section offset of the offending operation
        offset: u32,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

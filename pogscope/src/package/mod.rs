//! Package-level state and inputs: the shared [`Context`], the binary container
//! loader, the header ingestor, and dependency handling.
//!
//! Loading order matters: headers are ingested first (they register packages, the
//! handle hierarchy, enums, and frozen prototypes), then the container supplies the
//! exporting package, imports, exports, the string table, and the code section.

pub(crate) mod context;
pub(crate) mod dependencies;
pub(crate) mod headers;
pub(crate) mod loader;

pub use context::{
    Context, DeclId, DecompileOptions, EnumType, FunctionDeclaration, FunctionParameter,
    HandleType, PackageInfo, VarId, SYSTEM_PACKAGE, UNKNOWN_TYPE,
};
pub use dependencies::{detect_package_dependencies, sort_package_imports};
pub use headers::{load_headers, parse_header_source};
pub use loader::load_package;

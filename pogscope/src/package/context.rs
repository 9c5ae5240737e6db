//! Shared decompilation state.
//!
//! [`Context`] owns every cross-function table the pipeline needs: the package registry
//! built from headers, the handle hierarchy, enum definitions, the function declaration
//! registry, the string table, export/import lists, and the variable arena. It is created
//! once per job and passed by reference through every stage; nothing in this crate keeps
//! process-global state.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::decompiler::Variable;

/// Sentinel type name for not-yet-inferred variables and parameters.
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// The reserved engine package that is never imported explicitly.
pub const SYSTEM_PACKAGE: &str = "__system";

/// The fixed set of collection type names.
const COLLECTION_TYPES: [&str; 2] = ["list", "set"];

/// Index of a function declaration in the [`Context`] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub u32);

/// Index of a variable in the [`Context`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

/// A handle type: a node in the single-inheritance tree rooted at `hobject`.
#[derive(Debug, Clone)]
pub struct HandleType {
    /// Name of the base type; empty for the root.
    pub base_type: String,
    /// Package whose header declared this handle.
    pub source_package: String,
}

/// An enum type: a bidirectional member name / value mapping.
#[derive(Debug, Clone, Default)]
pub struct EnumType {
    /// Member name to value.
    pub name_to_value: FxHashMap<String, u32>,
    /// Value to member name, ordered so rendering is deterministic.
    pub value_to_name: BTreeMap<u32, String>,
}

/// One formal parameter of a function declaration.
#[derive(Clone)]
pub struct FunctionParameter {
    /// Type name; [`UNKNOWN_TYPE`] until inference resolves it.
    pub type_name: String,
    /// Parameter name from the prototype, or a synthesized `param_N`.
    pub name: String,
    /// The scope variable backing this parameter, once the function is sliced.
    pub variable: Option<VarId>,
}

/// A function known to the decompiler, whether from a header prototype, an export,
/// an import, or a synthesized local function.
pub struct FunctionDeclaration {
    /// Owning package; empty for synthesized local functions.
    pub package: String,
    /// Function name.
    pub name: String,
    /// Formal parameters; `None` until the count is known.
    pub parameters: Option<Vec<FunctionParameter>>,
    /// Whether type inference may rewrite parameter and return types.
    /// False for declarations frozen by an external prototype.
    pub auto_detect_types: bool,
    /// Variable carrying the return type and its inference hints.
    pub return_info: VarId,
}

impl FunctionDeclaration {
    /// `Pkg.Name`, or just `Name` for package-less local functions.
    #[must_use]
    pub fn scoped_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Whether any parameters are declared.
    #[must_use]
    pub fn has_parameters(&self) -> bool {
        self.parameters.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Number of declared parameters, zero when still unknown.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.as_ref().map_or(0, Vec::len)
    }

    /// Whether `v` backs one of this declaration's parameters.
    #[must_use]
    pub fn is_parameter_variable(&self, v: VarId) -> bool {
        self.parameters
            .as_ref()
            .is_some_and(|params| params.iter().any(|p| p.variable == Some(v)))
    }

    /// Index of the first parameter whose name matches `pattern`.
    #[must_use]
    pub fn find_parameter(&self, pattern: &regex::Regex) -> Option<usize> {
        self.parameters
            .as_ref()?
            .iter()
            .position(|p| pattern.is_match(&p.name))
    }
}

/// Everything a package header contributes: its functions, handles, enums, and
/// dependency set.
pub struct PackageInfo {
    /// Canonical package name (case from the header file / prototypes).
    pub name: String,
    /// Declarations parsed from this package's prototypes.
    pub functions: Vec<DeclId>,
    /// Explicit `uses` dependencies; `None` means "infer from types".
    pub dependencies: Option<BTreeSet<String>>,
    /// Handle types declared by this package.
    pub handles: BTreeSet<String>,
    /// Enum types declared by this package.
    pub enums: BTreeSet<String>,
}

impl PackageInfo {
    /// Whether this package directly depends on `base`.
    #[must_use]
    pub fn depends_on(&self, base: &str) -> bool {
        self.dependencies
            .as_ref()
            .is_some_and(|deps| deps.contains(base))
    }
}

/// Flags controlling optional output of a decompilation job.
#[derive(Debug, Clone, Default)]
pub struct DecompileOptions {
    /// Emit a `//` assembly listing above each function.
    pub assembly: bool,
    /// Emit only the assembly listing; skip structuring and source output.
    pub assembly_only: bool,
    /// Prefix assembly listing lines with `0xOFFSET`.
    pub assembly_offsets: bool,
    /// Insert a `debug atomic Debug.PrintString(...)` trace at the top of each function.
    pub debug_logging: bool,
}

/// Shared state for one decompilation job.
///
/// Mutated during loading and the type-inference fixed point, then effectively
/// read-only while rendering.
pub struct Context {
    /// Output options for this job.
    pub options: DecompileOptions,
    /// Package registry keyed by lower-cased name.
    pub packages: FxHashMap<String, PackageInfo>,
    /// The handle inheritance tree, keyed by handle type name.
    pub handles: FxHashMap<String, HandleType>,
    /// Enum definitions keyed by enum type name.
    pub enums: FxHashMap<String, EnumType>,
    /// All function declarations, indexed by [`DeclId`].
    pub declarations: Vec<FunctionDeclaration>,
    /// Scoped name to declaration.
    pub declaration_index: FxHashMap<String, DeclId>,
    /// Code offset of a local function entry to its declaration.
    pub functions_by_offset: FxHashMap<u32, DeclId>,
    /// Code offset of an imported-call operation to the callee declaration.
    pub imports_by_offset: FxHashMap<u32, DeclId>,
    /// The global string table from the `STAB` section.
    pub string_table: Vec<String>,
    /// Exported functions, in `FEXP` order.
    pub exports: Vec<DeclId>,
    /// Imported package names, in `PIMP` order.
    pub package_imports: Vec<String>,
    /// The package this decompilation reconstructs.
    pub exporting_package: String,
    /// All variables, indexed by [`VarId`].
    pub variables: Vec<Variable>,
    local_function_counter: usize,
}

impl Context {
    /// Create an empty context, pre-seeded with the system handle types.
    #[must_use]
    pub fn new(options: DecompileOptions) -> Self {
        let mut handles = FxHashMap::default();
        handles.insert(
            "hobject".to_string(),
            HandleType {
                base_type: String::new(),
                source_package: SYSTEM_PACKAGE.to_string(),
            },
        );
        handles.insert(
            "htask".to_string(),
            HandleType {
                base_type: "hobject".to_string(),
                source_package: SYSTEM_PACKAGE.to_string(),
            },
        );

        Context {
            options,
            packages: FxHashMap::default(),
            handles,
            enums: FxHashMap::default(),
            declarations: Vec::new(),
            declaration_index: FxHashMap::default(),
            functions_by_offset: FxHashMap::default(),
            imports_by_offset: FxHashMap::default(),
            string_table: Vec::new(),
            exports: Vec::new(),
            package_imports: Vec::new(),
            exporting_package: String::new(),
            variables: Vec::new(),
            local_function_counter: 0,
        }
    }

    /// Access a declaration by id.
    #[must_use]
    pub fn decl(&self, id: DeclId) -> &FunctionDeclaration {
        &self.declarations[id.0 as usize]
    }

    /// Mutable access to a declaration by id.
    pub fn decl_mut(&mut self, id: DeclId) -> &mut FunctionDeclaration {
        &mut self.declarations[id.0 as usize]
    }

    /// Access a variable by id.
    #[must_use]
    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id.0 as usize]
    }

    /// Mutable access to a variable by id.
    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.0 as usize]
    }

    /// Allocate a new variable in the arena.
    pub fn new_variable(&mut self, name: &str, type_name: &str) -> VarId {
        let id = VarId(u32::try_from(self.variables.len()).unwrap_or(u32::MAX));
        self.variables.push(Variable::new(id, name, type_name));
        id
    }

    /// Look up a string-table entry.
    #[must_use]
    pub fn string(&self, index: u32) -> Option<&str> {
        self.string_table.get(index as usize).map(String::as_str)
    }

    /// Register a declaration for `pkg.name`, returning the existing one if the scoped
    /// name is already known (for example from a header prototype).
    pub fn add_function_declaration(&mut self, pkg: &str, name: &str) -> DeclId {
        let scoped = if pkg.is_empty() {
            name.to_string()
        } else {
            format!("{pkg}.{name}")
        };
        if let Some(&existing) = self.declaration_index.get(&scoped) {
            return existing;
        }

        let return_info = self.new_variable("", UNKNOWN_TYPE);
        let id = DeclId(u32::try_from(self.declarations.len()).unwrap_or(u32::MAX));
        self.declarations.push(FunctionDeclaration {
            package: pkg.to_string(),
            name: name.to_string(),
            parameters: None,
            auto_detect_types: true,
            return_info,
        });
        self.declaration_index.insert(scoped, id);
        id
    }

    /// Synthesize a `local_function_N` declaration for an unregistered entry offset.
    ///
    /// Task entries default their return type to `task`; parameters are created with
    /// unknown types when `parameter_count` is given.
    pub fn new_local_function(
        &mut self,
        offset: u32,
        parameter_count: Option<u32>,
        is_task: bool,
    ) -> DeclId {
        let name = format!("local_function_{}", self.local_function_counter);
        self.local_function_counter += 1;

        let id = self.add_function_declaration("", &name);
        self.functions_by_offset.insert(offset, id);

        if let Some(count) = parameter_count {
            if self.decl(id).parameters.is_none() {
                let params = (0..count)
                    .map(|ii| FunctionParameter {
                        type_name: UNKNOWN_TYPE.to_string(),
                        name: format!("param_{ii}"),
                        variable: None,
                    })
                    .collect();
                self.decl_mut(id).parameters = Some(params);
            }
        }

        if is_task {
            let return_info = self.decl(id).return_info;
            let ret = self.var_mut(return_info);
            if ret.type_name == UNKNOWN_TYPE {
                ret.type_name = "task".to_string();
            }
        }

        id
    }

    /// The declared return type, with `task` mapped to the `htask` handle the caller
    /// actually receives.
    #[must_use]
    pub fn return_type(&self, id: DeclId) -> String {
        let type_name = &self.var(self.decl(id).return_info).type_name;
        if type_name == "task" {
            "htask".to_string()
        } else {
            type_name.clone()
        }
    }

    /// Whether the declaration returns a value.
    #[must_use]
    pub fn returns_non_void(&self, id: DeclId) -> bool {
        !self.var(self.decl(id).return_info).type_name.is_empty()
    }

    /// True if `type_name` is a registered handle type.
    #[must_use]
    pub fn is_handle_type(&self, type_name: &str) -> bool {
        self.handles.contains_key(type_name)
    }

    /// True if `type_name` is a registered enum type.
    #[must_use]
    pub fn is_enum_type(&self, type_name: &str) -> bool {
        self.enums.contains_key(type_name)
    }

    /// True if `type_name` is one of the collection types.
    #[must_use]
    pub fn is_collection_type(&self, type_name: &str) -> bool {
        COLLECTION_TYPES.contains(&type_name)
    }

    /// Whether `handle_type` is `base_type` or derives from it.
    #[must_use]
    pub fn handle_is_derived_from(&self, handle_type: &str, base_type: &str) -> bool {
        if handle_type == base_type {
            return true;
        }
        match self.handles.get(handle_type) {
            Some(info) => self.handle_is_derived_from(&info.base_type, base_type),
            None => false,
        }
    }

    /// The deepest type both arguments derive from, or [`UNKNOWN_TYPE`] when the
    /// hierarchy does not connect them.
    #[must_use]
    pub fn highest_common_ancestor(&self, left_type: &str, right_type: &str) -> String {
        let mut left_iter = left_type;
        while !left_iter.is_empty() {
            let mut right_iter = right_type;
            while !right_iter.is_empty() {
                if left_iter == right_iter {
                    return left_iter.to_string();
                }
                right_iter = match self.handles.get(right_iter) {
                    Some(info) => &info.base_type,
                    None => "",
                };
            }
            left_iter = match self.handles.get(left_iter) {
                Some(info) => &info.base_type,
                None => "",
            };
        }

        UNKNOWN_TYPE.to_string()
    }

    /// The `Cast` function of the package that declared `handle_type`, when one exists.
    #[must_use]
    pub fn cast_function_for_handle_type(&self, handle_type: &str) -> Option<DeclId> {
        let info = self.handles.get(handle_type)?;
        let package = self.packages.get(&info.source_package.to_lowercase())?;
        package
            .functions
            .iter()
            .copied()
            .find(|&id| self.decl(id).name == "Cast")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_context() -> Context {
        let mut ctx = Context::new(DecompileOptions::default());
        ctx.handles.insert(
            "hsim".to_string(),
            HandleType {
                base_type: "hobject".to_string(),
                source_package: "Sim".to_string(),
            },
        );
        ctx.handles.insert(
            "hship".to_string(),
            HandleType {
                base_type: "hsim".to_string(),
                source_package: "iShip".to_string(),
            },
        );
        ctx.handles.insert(
            "hstation".to_string(),
            HandleType {
                base_type: "hsim".to_string(),
                source_package: "iStation".to_string(),
            },
        );
        ctx
    }

    #[test]
    fn test_handle_derivation() {
        let ctx = test_context();
        assert!(ctx.handle_is_derived_from("hship", "hship"));
        assert!(ctx.handle_is_derived_from("hship", "hsim"));
        assert!(ctx.handle_is_derived_from("hship", "hobject"));
        assert!(!ctx.handle_is_derived_from("hsim", "hship"));
        assert!(!ctx.handle_is_derived_from("missing", "hobject"));
    }

    #[test]
    fn test_highest_common_ancestor() {
        let ctx = test_context();
        assert_eq!(ctx.highest_common_ancestor("hship", "hstation"), "hsim");
        assert_eq!(ctx.highest_common_ancestor("hship", "hship"), "hship");
        assert_eq!(ctx.highest_common_ancestor("hship", "htask"), "hobject");
        assert_eq!(ctx.highest_common_ancestor("hship", "unrelated"), UNKNOWN_TYPE);
    }

    #[test]
    fn test_declaration_dedup() {
        let mut ctx = test_context();
        let a = ctx.add_function_declaration("Debug", "PrintString");
        let b = ctx.add_function_declaration("Debug", "PrintString");
        assert_eq!(a, b);
        let c = ctx.add_function_declaration("Debug", "PrintInt");
        assert_ne!(a, c);
    }

    #[test]
    fn test_local_function_counter() {
        let mut ctx = test_context();
        let a = ctx.new_local_function(0x10, Some(2), false);
        let b = ctx.new_local_function(0x20, Some(0), true);
        assert_eq!(ctx.decl(a).name, "local_function_0");
        assert_eq!(ctx.decl(b).name, "local_function_1");
        assert_eq!(ctx.decl(a).parameter_count(), 2);
        assert_eq!(ctx.var(ctx.decl(b).return_info).type_name, "task");
        assert_eq!(ctx.return_type(b), "htask");
    }

    #[test]
    fn test_collection_types() {
        let ctx = test_context();
        assert!(ctx.is_collection_type("list"));
        assert!(ctx.is_collection_type("set"));
        assert!(!ctx.is_collection_type("array"));
    }
}

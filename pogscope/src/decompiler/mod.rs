//! The decompilation core: expression recovery, control-flow structuring, type
//! inference, name synthesis, and source rendering.
//!
//! # Architecture
//!
//! The pipeline runs in strictly ordered phases over shared [`Context`] state:
//!
//! 1. **Slice** (`function`): split the operation stream into per-function ranges,
//!    detect locals and parameters, and trim epilogues.
//! 2. **Recover + structure** (`structure`, `graph`, `block`): stack-simulate each
//!    body into expression trees and fold jumps into nested structured blocks.
//! 3. **Infer** (`types`, `variable`): iterate bidirectional type propagation across
//!    all functions to a fixed point, then force the leftovers.
//! 4. **Name** (`naming`): run prioritized name providers and resolve collisions.
//! 5. **Render** (`render`, `writer`): emit the reconstructed package source.
//!
//! [`Decompilation`] wires the phases together; the phase modules stay usable on
//! their own for tests and tooling.

pub(crate) mod block;
pub(crate) mod function;
pub(crate) mod graph;
pub(crate) mod naming;
pub(crate) mod render;
pub(crate) mod structure;
pub(crate) mod types;
pub(crate) mod variable;
pub(crate) mod writer;

use std::path::Path;

use log::warn;

pub use block::{
    AtomicBlock, BlockContext, BlockElement, CaseBlock, DebugBlock, DoWhileLoop, ElseBlock,
    ForLoop, IfBlock, ScheduleBlock, ScheduleEveryBlock, SwitchBlock, WhileLoop,
};
pub use function::{decompile_function, slice_functions, FunctionDefinition};
pub use graph::{ExprArena, NodeId, OpNode, Statement};
pub use naming::{convert_to_identifier, to_pascal_case, NameProvider};
pub use render::render_float;
pub use variable::{Scope, Variable};
pub use writer::CodeWriter;

use crate::{
    file::Physical,
    package::{
        detect_package_dependencies, load_headers, load_package, sort_package_imports, Context,
        DecompileOptions, UNKNOWN_TYPE,
    },
    Opcode, Result,
};

/// Safety cap on inference iterations; each pass only narrows types within finite
/// lattices, so convergence normally happens long before this.
const MAX_INFERENCE_PASSES: usize = 100;

/// One full decompilation job: the loaded context plus every sliced function.
pub struct Decompilation {
    /// Shared tables: packages, handles, enums, declarations, strings, variables.
    pub ctx: Context,
    /// Decompiled functions in code-section order.
    pub functions: Vec<FunctionDefinition>,
}

impl Decompilation {
    /// Load a package file, ingesting headers from `includes_dir` first when given.
    ///
    /// # Errors
    /// Fails on unreadable input, a non-`FORM` container, truncated sections, or
    /// references to packages missing from the headers.
    pub fn from_path(
        path: &Path,
        includes_dir: Option<&Path>,
        options: DecompileOptions,
    ) -> Result<Self> {
        let mut ctx = Context::new(options);
        if let Some(dir) = includes_dir {
            load_headers(&mut ctx, dir)?;
        }

        let file = Physical::new(path)?;
        Self::from_slice(file.data(), ctx)
    }

    /// Load a package from an in-memory container, with headers already in `ctx`.
    ///
    /// # Errors
    /// Same failure modes as [`Decompilation::from_path`], minus file I/O.
    pub fn from_slice(data: &[u8], mut ctx: Context) -> Result<Self> {
        let functions = load_package(&mut ctx, data)?;
        Ok(Decompilation { ctx, functions })
    }

    /// Run global type inference to a fixed point, then name synthesis and the
    /// remaining fixups. Must be called once before [`Decompilation::render`].
    pub fn resolve(&mut self) {
        if !self.ctx.options.assembly_only {
            self.run_inference();
            self.force_unknown_parameter_types();
            self.run_inference_pass();
            self.resolve_unknown_return_types();

            for def in &mut self.functions {
                def.check_code(&mut self.ctx);
            }
            for def in &self.functions {
                def.resolve_all_names(&mut self.ctx);
            }
            for def in &self.functions {
                def.finalize_local_types(&mut self.ctx);
            }
        }

        // The uses block needs the dependency graph to order imports
        detect_package_dependencies(&mut self.ctx);
    }

    fn run_inference(&mut self) {
        for _ in 0..MAX_INFERENCE_PASSES {
            if self.run_inference_pass() == 0 {
                break;
            }
        }
    }

    /// One reset / body-walk / resolve cycle; returns how many variables or
    /// declarations changed type.
    fn run_inference_pass(&mut self) -> usize {
        for def in &self.functions {
            def.reset_possible_types(&mut self.ctx);
        }
        for def in &mut self.functions {
            def.resolve_body_types(&mut self.ctx);
        }

        let mut resolved = 0;
        for def in &self.functions {
            resolved += def.resolve_local_types(&mut self.ctx);
            resolved += def.resolve_declaration_types(&mut self.ctx);
        }
        resolved
    }

    /// Parameters whose type never resolved become ints, and detection freezes so
    /// the final pass treats every signature as authoritative.
    fn force_unknown_parameter_types(&mut self) {
        for def in &self.functions {
            if !self.ctx.decl(def.declaration).auto_detect_types {
                continue;
            }

            for ii in 0..def.scope.local_variable_index_offset as usize {
                let vid = def.scope.variables[ii];
                if self.ctx.var(vid).type_name != UNKNOWN_TYPE {
                    continue;
                }
                if self.ctx.var(vid).ref_count > 0 {
                    warn!(
                        "Parameter {} of {} is referenced but never resolved, defaulting to int",
                        self.ctx.var(vid).variable_name,
                        self.ctx.decl(def.declaration).scoped_name()
                    );
                }
                self.ctx.var_mut(vid).type_name = "int".to_string();
                if let Some(params) = self.ctx.decl_mut(def.declaration).parameters.as_mut() {
                    if let Some(param) = params.get_mut(ii) {
                        param.type_name = "int".to_string();
                    }
                }
            }

            self.ctx.decl_mut(def.declaration).auto_detect_types = false;
        }
    }

    /// Functions whose return type stayed unknown are void when the epilogue pushes
    /// a literal zero, and tasks otherwise.
    fn resolve_unknown_return_types(&mut self) {
        for def in &self.functions {
            let return_info = self.ctx.decl(def.declaration).return_info;
            if self.ctx.var(return_info).type_name != UNKNOWN_TYPE {
                continue;
            }

            let Some(end) = def
                .ops
                .iter()
                .position(|op| op.opcode == Opcode::FunctionEnd)
            else {
                continue;
            };

            let returns_zero = (end >= 1 && def.ops[end - 1].opcode == Opcode::LiteralZero)
                || (end >= 2
                    && def.ops[end - 1].opcode == Opcode::Unknown3C
                    && def.ops[end - 2].opcode == Opcode::LiteralZero);

            self.ctx.var_mut(return_info).type_name = if returns_zero {
                String::new()
            } else {
                "task".to_string()
            };
        }
    }

    /// Render the reconstructed source (or only the assembly listing in
    /// assembly-only mode).
    #[must_use]
    pub fn render(&self) -> String {
        let ctx = &self.ctx;
        let mut writer = CodeWriter::new();

        if ctx.options.assembly_only {
            for def in &self.functions {
                render::render_function_assembly(ctx, def, &mut writer);
            }
            return writer.finish();
        }

        writer.appendf(format_args!("package {};\n\n", ctx.exporting_package));
        self.render_package_imports(&mut writer);
        self.render_function_exports(&mut writer);
        self.render_enums(&mut writer);

        for def in &self.functions {
            def.render_prototype(ctx, &mut writer);
        }
        writer.append("\n");

        for def in &self.functions {
            if def.failed {
                continue;
            }
            def.render(ctx, &mut writer);
        }

        writer.finish()
    }

    fn render_package_imports(&self, writer: &mut CodeWriter) {
        let imports = sort_package_imports(&self.ctx);
        if imports.is_empty() {
            return;
        }

        writer.append("uses ");
        for (ii, name) in imports.iter().enumerate() {
            if ii > 0 {
                writer.append("     ");
            }
            writer.append(name);
            if ii < imports.len() - 1 {
                writer.append(",\n");
            }
        }
        writer.append(";\n\n");
    }

    fn render_function_exports(&self, writer: &mut CodeWriter) {
        let exports = &self.ctx.exports;
        if exports.is_empty() {
            return;
        }

        writer.append("provides ");
        for (ii, &decl) in exports.iter().enumerate() {
            if ii > 0 {
                writer.append("         ");
            }
            writer.append(&self.ctx.decl(decl).name);
            if ii < exports.len() - 1 {
                writer.append(",\n");
            }
        }
        writer.append(";\n\n");
    }

    fn render_enums(&self, writer: &mut CodeWriter) {
        let ctx = &self.ctx;
        let Some(package) = ctx.packages.get(&ctx.exporting_package.to_lowercase()) else {
            return;
        };

        for enum_name in &package.enums {
            let Some(data) = ctx.enums.get(enum_name) else {
                continue;
            };

            writer.appendf(format_args!("enum {enum_name}\n"));
            writer.append("{\n");
            writer.push_indent();
            let count = data.value_to_name.len();
            for (ii, (value, member)) in data.value_to_name.iter().enumerate() {
                writer.appendf(format_args!("{member} = {value}"));
                writer.append(if ii < count - 1 { ",\n" } else { "\n" });
            }
            writer.pop_indent();
            writer.append("};\n\n");
        }
    }
}

/// Decompile the package at `path` in one call.
///
/// # Errors
/// See [`Decompilation::from_path`].
pub fn decompile_file(
    path: &Path,
    includes_dir: Option<&Path>,
    options: DecompileOptions,
) -> Result<String> {
    let mut decompilation = Decompilation::from_path(path, includes_dir, options)?;
    decompilation.resolve();
    Ok(decompilation.render())
}

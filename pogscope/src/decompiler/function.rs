//! Function slicing and per-function pipeline passes.
//!
//! The slicer splits the decoded operation stream into functions (offset 0 and after
//! every `OP_FUNCTION_END`), detects locals from a leading `OP_PUSH_STACK_N`, infers
//! the parameter count from the highest referenced slot when no prototype exists,
//! backs the body end off over return-value and string-teardown epilogues, and hands
//! the body range to the control-flow structurer.
//!
//! [`FunctionDefinition`] then carries the per-function state through the global
//! inference fixed point, naming, and rendering.

use log::{error, warn};
use rustc_hash::FxHashMap;

use crate::{
    assembly::{CodeSection, OperandData, Operation},
    decompiler::{
        block::{BlockContext, BlockElement},
        graph::{ExprArena, Statement},
        naming::{resolve_naming_conflict, resolve_variable_name, NameProvider},
        render::{
            render_block_elements, render_function_assembly, render_function_header,
            render_statement,
        },
        structure::parse_operations,
        types::{check_elements, resolve_element_types},
        variable::Scope,
        writer::CodeWriter,
    },
    package::{Context, DeclId, FunctionParameter, VarId, UNKNOWN_TYPE},
    Opcode,
};

/// A decompiled function: its declaration, scope, recovered body, and the operation
/// slice it came from (kept for the assembly listing and return-type fixups).
pub struct FunctionDefinition {
    /// The declaration this definition fills in.
    pub declaration: DeclId,
    /// Parameters and locals.
    pub scope: Scope,
    /// Expression nodes of the body.
    pub arena: ExprArena,
    /// Structured body elements.
    pub body: Vec<BlockElement>,
    /// All operations of the function, through `OP_FUNCTION_END`.
    pub ops: Vec<Operation>,
    /// Index of the first body operation.
    pub body_start: usize,
    /// Inclusive index of the last body operation.
    pub body_end: usize,
    /// Set when structuring failed and the body was abandoned.
    pub failed: bool,
}

/// Split a decoded code section into functions and decompile each.
///
/// Entries inside undecodable (poisoned) spans are skipped with a diagnostic.
pub fn slice_functions(ctx: &mut Context, section: &CodeSection) -> Vec<FunctionDefinition> {
    let ops = &section.operations;
    let mut definitions = Vec::new();

    let mut idx = 0;
    while idx < ops.len() {
        let entry_offset = ops[idx].offset;
        let Some(relative_end) = ops[idx..]
            .iter()
            .position(|op| op.opcode == Opcode::FunctionEnd)
        else {
            warn!("Code section ends without OP_FUNCTION_END after offset 0x{entry_offset:08X}");
            break;
        };
        let end_idx = idx + relative_end;

        let declaration = match ctx.functions_by_offset.get(&entry_offset) {
            Some(&declaration) => declaration,
            None => ctx.new_local_function(entry_offset, None, false),
        };

        if section.is_poisoned(entry_offset, ops[end_idx].offset) {
            warn!(
                "Skipping function {} at 0x{entry_offset:08X}: undecodable operations in range",
                ctx.decl(declaration).scoped_name()
            );
        } else {
            definitions.push(decompile_function(
                ctx,
                declaration,
                ops[idx..=end_idx].to_vec(),
            ));
        }

        idx = end_idx + 1;
    }

    definitions
}

fn failed_definition(declaration: DeclId, scope: Scope, ops: Vec<Operation>) -> FunctionDefinition {
    FunctionDefinition {
        declaration,
        scope,
        arena: ExprArena::new(),
        body: Vec::new(),
        body_start: 0,
        body_end: 0,
        ops,
        failed: true,
    }
}

/// Decompile one function from its operation slice (ending at `OP_FUNCTION_END`).
pub fn decompile_function(
    ctx: &mut Context,
    declaration: DeclId,
    mut ops: Vec<Operation>,
) -> FunctionDefinition {
    let mut body_start = 0usize;

    // Locals are announced by a leading stack reservation, unless that reservation
    // belongs to a schedule
    let mut local_variable_count = 0u32;
    if ops[0].opcode == Opcode::PushStackN
        && ops.get(1).map(|op| op.opcode) != Some(Opcode::ScheduleStart)
    {
        if let OperandData::PushCount { count } = ops[0].data {
            local_variable_count = count;
        }
    }

    // Without a prototype, the parameter count falls out of the highest slot index
    // used anywhere in the body
    if ctx.decl(declaration).parameters.is_none() {
        let mut max_index: i64 = -1;
        let mut has_schedules = false;

        for op in &ops {
            match op.opcode {
                Opcode::FunctionEnd => break,
                Opcode::VariableRead | Opcode::VariableWrite | Opcode::StringVariableWrite => {
                    if let Some(index) = op.variable_index() {
                        max_index = max_index.max(i64::from(index));
                    }
                }
                Opcode::ScheduleStart => has_schedules = true,
                _ => {}
            }
        }

        // More locals can be reserved than are ever referenced, so clamp at zero
        let parameter_count =
            usize::try_from((max_index - i64::from(local_variable_count) + 1).max(0))
                .unwrap_or_default();

        let params = (0..parameter_count)
            .map(|ii| FunctionParameter {
                type_name: UNKNOWN_TYPE.to_string(),
                name: format!("param_{ii}"),
                variable: None,
            })
            .collect();
        ctx.decl_mut(declaration).parameters = Some(params);

        // Anything with schedules inside it must be a task
        if has_schedules {
            let return_info = ctx.decl(declaration).return_info;
            if ctx.var(return_info).type_name == UNKNOWN_TYPE {
                ctx.var_mut(return_info).type_name = "task".to_string();
            }
        }
    }

    // Parameters take the low stack slots, locals follow
    let mut scope = Scope {
        function: declaration,
        function_end_offset: 0,
        variables: Vec::new(),
        local_variable_index_offset: 0,
    };

    let params = ctx.decl(declaration).parameters.clone().unwrap_or_default();
    for (ii, param) in params.iter().enumerate() {
        let vid = ctx.new_variable(&param.name, &param.type_name);
        ctx.var_mut(vid).stack_index = u32::try_from(ii).unwrap_or(u32::MAX);
        scope.variables.push(vid);
        if let Some(params) = ctx.decl_mut(declaration).parameters.as_mut() {
            params[ii].variable = Some(vid);
        }
    }
    scope.local_variable_index_offset = u32::try_from(params.len()).unwrap_or(u32::MAX);

    if local_variable_count > 0 {
        for ii in 0..local_variable_count {
            let vid = ctx.new_variable(&format!("local_{ii}"), UNKNOWN_TYPE);
            ctx.var_mut(vid).stack_index = scope.local_variable_index_offset + ii;
            scope.variables.push(vid);
        }
        // Skip over the local variable opcode
        body_start = 1;
    }

    // Mark string/handle slots that get a default init
    for idx in 0..ops.len().saturating_sub(1) {
        if ops[idx].opcode == Opcode::VariableInit && ops[idx + 1].opcode == Opcode::VariableWrite
        {
            if let Some(vid) = ops[idx + 1]
                .variable_index()
                .and_then(|index| scope.variable_by_stack_index(index))
            {
                ctx.var_mut(vid).has_init = true;
            }
        }
    }

    let Some(function_end_idx) = ops.iter().position(|op| op.opcode == Opcode::FunctionEnd)
    else {
        error!(
            "Failed to find end of function: {}",
            ctx.decl(declaration).name
        );
        return failed_definition(declaration, scope, ops);
    };

    // Back off over the return-value epilogue
    let mut idx = function_end_idx.saturating_sub(1);
    if idx >= 1 && ops[idx].opcode == Opcode::Unknown3C && ops[idx - 1].opcode == Opcode::LiteralZero
    {
        idx -= 1;
    }
    if idx >= 1 && ops[idx].opcode == Opcode::Unknown3C && ops[idx - 1].opcode == Opcode::Unknown40
    {
        idx -= 1;
    }
    let body_end = idx;

    // String locals tear down with repeated read/deref/pop triples before the
    // epilogue; return jumps land on the first of them
    let mut end = idx;
    while end >= body_start + 4 {
        if ops[end - 3].opcode == Opcode::VariableRead
            && ops[end - 2].opcode == Opcode::Unknown3B
            && ops[end - 1].opcode == Opcode::PopStack
        {
            end -= 3;
        } else {
            break;
        }
    }
    scope.function_end_offset = ops[end].offset;

    // Check for out of bounds variable access
    let variable_count = u32::try_from(scope.variables.len()).unwrap_or(u32::MAX);
    for op in ops.get(body_start..body_end).unwrap_or_default() {
        if let Some(index) = op.variable_index() {
            if index >= variable_count {
                error!(
                    "Function {} tries to reference variable at index {index} while only {variable_count} were declared, skipping",
                    ctx.decl(declaration).scoped_name()
                );
                return failed_definition(declaration, scope, ops);
            }
        }
    }

    if ctx.options.assembly_only {
        return FunctionDefinition {
            declaration,
            scope,
            arena: ExprArena::new(),
            body: Vec::new(),
            body_start,
            body_end,
            ops,
            failed: false,
        };
    }

    let mut arena = ExprArena::new();
    let (body, failed) = match parse_operations(
        ctx,
        &scope,
        &mut arena,
        &BlockContext::default(),
        &mut ops,
        body_start,
        body_end,
    ) {
        Ok(body) => (body, false),
        Err(parse_error) => {
            error!(
                "Abandoning function {}: {parse_error}",
                ctx.decl(declaration).scoped_name()
            );
            (Vec::new(), true)
        }
    };

    FunctionDefinition {
        declaration,
        scope,
        arena,
        body,
        body_start,
        body_end,
        ops,
        failed,
    }
}

impl FunctionDefinition {
    /// Clear all hint sets ahead of an inference pass.
    pub fn reset_possible_types(&self, ctx: &mut Context) {
        let return_info = ctx.decl(self.declaration).return_info;
        ctx.var_mut(return_info).reset_possible_types();
        for &vid in &self.scope.variables {
            ctx.var_mut(vid).reset_possible_types();
        }
    }

    /// Walk the body once, accumulating type hints.
    pub fn resolve_body_types(&mut self, ctx: &mut Context) {
        resolve_element_types(ctx, &self.scope, &mut self.arena, &mut self.body);
    }

    /// Resolve local variable types from their hints; parameters are handled by
    /// [`FunctionDefinition::resolve_declaration_types`].
    pub fn resolve_local_types(&self, ctx: &mut Context) -> usize {
        let mut resolved = 0;
        for &vid in &self.scope.variables[self.scope.local_variable_index_offset as usize..] {
            if ctx.resolve_variable_type(vid) {
                resolved += 1;
            }
        }
        resolved
    }

    /// Resolve parameter and return types, unless a prototype froze them.
    pub fn resolve_declaration_types(&self, ctx: &mut Context) -> usize {
        if !ctx.decl(self.declaration).auto_detect_types {
            return 0;
        }

        let mut resolved = 0;
        for ii in 0..self.scope.local_variable_index_offset as usize {
            let vid = self.scope.variables[ii];
            if ctx.resolve_variable_type(vid) {
                resolved += 1;
            }

            let type_name = ctx.var(vid).type_name.clone();
            if type_name != UNKNOWN_TYPE {
                if let Some(params) = ctx.decl_mut(self.declaration).parameters.as_mut() {
                    if let Some(param) = params.get_mut(ii) {
                        param.type_name = type_name;
                    }
                }
            }
        }

        let return_info = ctx.decl(self.declaration).return_info;
        if ctx.resolve_variable_type(return_info) {
            resolved += 1;
        }

        resolved
    }

    /// Post-inference checks: handle-assignment consistency diagnostics, cast
    /// splicing for mismatched comparisons, and name-provider attachment.
    pub fn check_code(&mut self, ctx: &mut Context) {
        for &vid in &self.scope.variables {
            let type_name = ctx.var(vid).type_name.clone();
            if !ctx.is_handle_type(&type_name) {
                continue;
            }
            for assigned in ctx.var(vid).assigned_types.clone() {
                if ctx.is_handle_type(&assigned)
                    && !ctx.handle_is_derived_from(&assigned, &type_name)
                {
                    warn!(
                        "Variable {} uses type {type_name}, from which assigned type {assigned} is not derived",
                        ctx.var(vid).id.0
                    );
                }
            }
        }

        check_elements(ctx, &self.scope, &mut self.arena, &self.body);
    }

    /// Run name providers for every variable and resolve collisions; parameters get
    /// their trailing underscore here.
    pub fn resolve_all_names(&self, ctx: &mut Context) -> usize {
        let mut total_resolved = 0;

        for &vid in &self.scope.variables {
            let type_name = ctx.var(vid).type_name.clone();

            // Add generic name providers here
            if ctx.is_handle_type(&type_name) {
                ctx.var_mut(vid).add_name_provider(NameProvider::HandleType {
                    handle_type: type_name.clone(),
                });
            }
            if ctx.is_enum_type(&type_name) {
                ctx.var_mut(vid).add_name_provider(NameProvider::EnumType);
            }
            if ctx.is_collection_type(&type_name) {
                ctx.var_mut(vid).add_name_provider(NameProvider::CollectionType);
            }

            if resolve_variable_name(ctx, &self.arena, vid) {
                total_resolved += 1;
            }
        }

        // Group collisions in scope order so conflict numbering is stable
        let mut collisions: Vec<(String, Vec<VarId>)> = Vec::new();
        for &vid in &self.scope.variables {
            let name = ctx.var(vid).variable_name.clone();
            match collisions.iter_mut().find(|(taken, _)| *taken == name) {
                Some((_, vars)) => vars.push(vid),
                None => collisions.push((name, vec![vid])),
            }
        }
        for (_, vars) in collisions {
            if vars.len() > 1 {
                for (index, &vid) in vars.iter().enumerate() {
                    resolve_naming_conflict(ctx, vid, index);
                }
            }
        }

        // Copy resolved names over to the declaration when we own its types
        let parameter_count = self.scope.local_variable_index_offset as usize;
        if ctx.decl(self.declaration).auto_detect_types {
            for ii in 0..parameter_count {
                let name = ctx.var(self.scope.variables[ii]).variable_name.clone();
                if let Some(params) = ctx.decl_mut(self.declaration).parameters.as_mut() {
                    if let Some(param) = params.get_mut(ii) {
                        param.name = name;
                    }
                }
            }
        }

        // Engine-reserved identifiers can collide with parameter names, so every
        // parameter gets a trailing underscore
        for ii in 0..parameter_count {
            let vid = self.scope.variables[ii];
            let name = format!("{}_", ctx.var(vid).variable_name);
            ctx.var_mut(vid).variable_name = name.clone();
            if let Some(params) = ctx.decl_mut(self.declaration).parameters.as_mut() {
                if let Some(param) = params.get_mut(ii) {
                    param.name = name;
                }
            }
        }

        total_resolved
    }

    /// Default still-unknown, never-referenced locals (init-ed slots are strings,
    /// the rest ints) and report locals that stayed unresolved despite being used.
    pub fn finalize_local_types(&self, ctx: &mut Context) {
        for &vid in &self.scope.variables[self.scope.local_variable_index_offset as usize..] {
            let v = ctx.var(vid);
            if v.type_name != UNKNOWN_TYPE {
                continue;
            }
            if v.ref_count == 0 {
                // If it has an init, it is probably a string
                let default = if v.has_init { "string" } else { "int" };
                ctx.var_mut(vid).type_name = default.to_string();
            } else {
                error!(
                    "Failed to determine type for local variable {} id {} in function {}",
                    v.variable_name,
                    v.id.0,
                    ctx.decl(self.declaration).scoped_name()
                );
            }
        }
    }

    fn is_local_variable_initial_assignment(&self, statement: &Statement) -> Option<VarId> {
        let arena = &self.arena;
        let root = statement.root;
        if arena.node(root).operation.opcode != Opcode::PopStack {
            return None;
        }

        let mut write = *arena.node(root).children.first()?;
        // Skip over any return-slot move we hit
        if arena.node(write).operation.opcode == Opcode::Unknown3C {
            write = *arena.node(write).children.first()?;
        }

        let write_opcode = arena.node(write).operation.opcode;
        if write_opcode != Opcode::VariableWrite && write_opcode != Opcode::StringVariableWrite {
            return None;
        }

        let index = arena.node(write).operation.variable_index()?;
        let rhs = *arena.node(write).children.first()?;

        // A RHS referencing the target or later slots cannot be an initializer
        let references = arena.referenced_variable_indices(rhs);
        let variable_count = u32::try_from(self.scope.variables.len()).unwrap_or(u32::MAX);
        for idx in index..variable_count {
            if references.contains(&idx) {
                return None;
            }
        }

        self.scope.variable_by_stack_index(index)
    }

    fn latest_variable_write_index_before_offset(&self, offset: u32) -> i64 {
        let Some(end_idx) = self.ops.iter().position(|op| op.offset == offset) else {
            return -1;
        };

        let mut latest = -1i64;
        for op in &self.ops[..end_idx] {
            if matches!(
                op.opcode,
                Opcode::VariableWrite | Opcode::StringVariableWrite
            ) {
                if let Some(index) = op.variable_index() {
                    latest = i64::from(index);
                }
            }
        }
        latest
    }

    fn write_local_variable_declarations(
        &self,
        ctx: &Context,
        assignments: &FxHashMap<u32, Statement>,
        writer: &mut CodeWriter,
    ) {
        let locals = &self.scope.variables[self.scope.local_variable_index_offset as usize..];

        for &vid in locals {
            let v = ctx.var(vid);

            if let Some(assignment) = assignments.get(&v.stack_index) {
                writer.appendf(format_args!("{} ", v.type_name));
                render_statement(ctx, &self.scope, &self.arena, assignment, writer);
                writer.append(";");
            } else {
                writer.appendf(format_args!("{} {};", v.type_name, v.variable_name));
            }

            if ctx.options.assembly {
                writer.appendf(format_args!(" // ID: {}", v.id.0));
            }
            writer.append("\n");
        }

        if !locals.is_empty() {
            writer.append("\n");
        }
    }

    /// Emit `prototype <header>;`.
    pub fn render_prototype(&self, ctx: &Context, writer: &mut CodeWriter) {
        writer.append("prototype ");
        writer.append(&render_function_header(ctx, self.declaration));
        writer.append(";\n");
    }

    /// Emit the full definition: header, merged initial assignments, local
    /// declarations, and the structured body.
    pub fn render(&self, ctx: &Context, writer: &mut CodeWriter) {
        if ctx.options.assembly {
            render_function_assembly(ctx, self, writer);
        }

        writer.append(&render_function_header(ctx, self.declaration));
        if ctx.options.assembly {
            let decl = ctx.decl(self.declaration);
            if ctx.returns_non_void(self.declaration) || decl.has_parameters() {
                writer.append(" // ");
                if ctx.returns_non_void(self.declaration) {
                    writer.appendf(format_args!(
                        "Return ID: {} ",
                        ctx.var(decl.return_info).id.0
                    ));
                }
                for ii in 0..self.scope.local_variable_index_offset as usize {
                    let vid = self.scope.variables[ii];
                    writer.appendf(format_args!(
                        "{} ID: {} ",
                        ctx.var(vid).variable_name,
                        ctx.var(vid).id.0
                    ));
                }
            }
        }

        writer.append("\n{\n");
        writer.push_indent();

        // Leading statements writing fresh, strictly increasing slots fold into the
        // declaration list
        let mut assignments: FxHashMap<u32, Statement> = FxHashMap::default();
        let mut end_idx: i64 = -1;
        for element in &self.body {
            let Some(statement) = element.as_statement() else {
                break;
            };
            let Some(vid) = self.is_local_variable_initial_assignment(statement) else {
                break;
            };

            let (statement_offset, _) = self.arena.offset_range(statement.root);
            let last_written = self.latest_variable_write_index_before_offset(statement_offset);
            let stack_index = ctx.var(vid).stack_index;

            if i64::from(stack_index) > end_idx && i64::from(stack_index) >= last_written {
                assignments.insert(stack_index, *statement);
                end_idx = i64::from(stack_index);
            } else {
                break;
            }
        }

        self.write_local_variable_declarations(ctx, &assignments, writer);

        if ctx.options.debug_logging {
            writer.appendf(format_args!(
                "debug atomic Debug.PrintString(\"Inside function: {} {}\\n\");\n",
                ctx.exporting_package,
                render_function_header(ctx, self.declaration)
            ));
        }

        render_block_elements(
            ctx,
            &self.scope,
            &self.arena,
            &self.body[assignments.len()..],
            writer,
        );

        writer.pop_indent();
        writer.append("}\n\n");
    }
}

//! Source text emission.
//!
//! Renders the reconstructed package: the `package` line, the topologically sorted
//! `uses` block, `provides`, enum declarations, prototypes, and each function body.
//! Expression rendering restores source argument order (children are stored in pop
//! order), inserts parentheses only where nesting requires them, and folds
//! `v = v + 1` loop increments into `++v`.

use log::error;

use crate::{
    assembly::Operation,
    decompiler::{
        block::{
            BlockElement, CaseBlock, DebugBlock, DoWhileLoop, ElseBlock, ForLoop, IfBlock,
            ScheduleBlock, SwitchBlock, WhileLoop,
        },
        function::FunctionDefinition,
        graph::{ExprArena, NodeId, Statement},
        types::for_loop_iteration_variable,
        variable::Scope,
        writer::CodeWriter,
    },
    package::{Context, DeclId, UNKNOWN_TYPE},
    Opcode,
};

/// Shortest decimal form with a guaranteed fractional part: `1` becomes `1.0`.
#[must_use]
pub fn render_float(value: f32) -> String {
    let mut text = format!("{value}");
    if !text.contains('.') && !text.contains('e') && !text.contains("inf") && !text.contains("NaN")
    {
        text.push_str(".0");
    }
    text
}

fn escape_string(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(c),
        }
    }
    result
}

/// Base render text for an operation, or `None` for operations that only exist
/// structurally. Variable names resolve through the scope so renames take effect.
pub(crate) fn render_operation_code(
    ctx: &Context,
    scope: &Scope,
    op: &Operation,
) -> Option<String> {
    let variable_name = |index: u32| -> Option<String> {
        let vid = scope.variable_by_stack_index(index)?;
        Some(ctx.var(vid).variable_name.clone())
    };

    let result = match op.opcode {
        Opcode::VariableWrite | Opcode::StringVariableWrite => {
            format!("{} = ", variable_name(op.variable_index()?)?)
        }
        Opcode::VariableRead => variable_name(op.variable_index()?)?,

        Opcode::LiteralOne => "1".to_string(),
        Opcode::LiteralZero => "0".to_string(),
        Opcode::LiteralByte | Opcode::LiteralShort | Opcode::LiteralInt => {
            op.literal_integer_value()?.to_string()
        }
        Opcode::LiteralFloat => match op.data {
            crate::assembly::OperandData::LiteralFloat { value } => render_float(value),
            _ => return None,
        },
        Opcode::LiteralString => match op.data {
            crate::assembly::OperandData::LiteralString { index } => {
                format!("\"{}\"", escape_string(ctx.string(index)?))
            }
            _ => return None,
        },

        Opcode::FunctionCallLocal => ctx.decl(op.call_target()?).name.clone(),
        Opcode::FunctionCallImported => ctx.decl(op.call_target()?).scoped_name(),
        Opcode::TaskCallLocal | Opcode::TaskCallImported => {
            format!("start {}", ctx.decl(op.call_target()?).name)
        }

        Opcode::Equals | Opcode::StringEquals => "==".to_string(),
        Opcode::NotEquals => "!=".to_string(),
        Opcode::IntGt | Opcode::FltGt => ">".to_string(),
        Opcode::IntLt | Opcode::FltLt => "<".to_string(),
        Opcode::IntGtEquals | Opcode::FltGtEquals => ">=".to_string(),
        Opcode::IntLtEquals | Opcode::FltLtEquals => "<=".to_string(),

        Opcode::IntAdd | Opcode::FltAdd => "+".to_string(),
        Opcode::IntSub | Opcode::FltSub => "-".to_string(),
        Opcode::IntMul | Opcode::FltMul => "*".to_string(),
        Opcode::IntDiv | Opcode::FltDiv => "/".to_string(),
        Opcode::IntMod => "%".to_string(),
        Opcode::IntNeg | Opcode::FltNeg => "-".to_string(),

        Opcode::LogicalAnd => "&&".to_string(),
        Opcode::LogicalOr => "||".to_string(),
        Opcode::LogicalNot => "!".to_string(),

        Opcode::BitwiseAnd => "&".to_string(),
        Opcode::BitwiseOr => "|".to_string(),

        Opcode::Unknown3B | Opcode::Unknown3C => String::new(),
        Opcode::PopStack => String::new(),
        Opcode::CastIntToFlt | Opcode::CastFltToInt | Opcode::CastToBool => String::new(),
        Opcode::JumpIfFalse => String::new(),

        _ => return None,
    };

    Some(result)
}

fn should_render_before_children(arena: &ExprArena, id: NodeId) -> bool {
    let node = arena.node(id);
    if node.operation.opcode.is_function_call() {
        return true;
    }
    node.children.len() != 2
}

fn should_use_parentheses(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    id: NodeId,
    only_child: bool,
) -> bool {
    let node = arena.node(id);
    if node.operation.opcode.is_function_call() {
        return true;
    }

    let pop_count = node.operation.pop_count(ctx);

    // A textual unary operator applied to an infix expression needs the grouping
    if pop_count == 1 {
        let code = node
            .code
            .clone()
            .or_else(|| render_operation_code(ctx, scope, &node.operation));
        if code.is_some_and(|code| !code.is_empty()) {
            if let Some(&child) = node.children.first() {
                if arena.node(child).children.len() > 1
                    && !should_render_before_children(arena, child)
                {
                    return true;
                }
            }
        }
    }

    !only_child && pop_count > 1
}

fn render_self(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    id: NodeId,
    writer: &mut CodeWriter,
) {
    let node = arena.node(id);
    let code = node
        .code
        .clone()
        .or_else(|| render_operation_code(ctx, scope, &node.operation));

    match code {
        Some(code) => writer.append(&code),
        None => {
            // The opcode has no source mapping; emit its mnemonic so the output
            // visibly fails to recompile instead of silently dropping it
            writer.append(&node.operation.assembly_line(ctx));
        }
    }
}

/// Render the expression rooted at `id`.
pub(crate) fn render_node(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    id: NodeId,
    writer: &mut CodeWriter,
    only_child: bool,
) {
    let children = arena.node(id).children.clone();

    if !should_render_before_children(arena, id) {
        let parentheses = should_use_parentheses(ctx, scope, arena, id, only_child);
        if parentheses {
            writer.append("(");
        }

        render_node(ctx, scope, arena, children[0], writer, false);
        writer.append(" ");
        render_self(ctx, scope, arena, id, writer);
        writer.append(" ");
        render_node(ctx, scope, arena, children[1], writer, false);

        if parentheses {
            writer.append(")");
        }
    } else {
        render_self(ctx, scope, arena, id, writer);

        let parentheses = should_use_parentheses(ctx, scope, arena, id, only_child);
        if parentheses {
            writer.append("(");
            if !children.is_empty() {
                writer.append(" ");
            }
        }

        // Children are in pop order; rendering them reversed restores source order
        for ii in (0..children.len()).rev() {
            render_node(ctx, scope, arena, children[ii], writer, true);
            if ii > 0 {
                writer.append(", ");
            }
        }

        if parentheses {
            if !children.is_empty() {
                writer.append(" ");
            }
            writer.append(")");
        }
    }
}

pub(crate) fn render_statement(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    statement: &Statement,
    writer: &mut CodeWriter,
) {
    render_node(ctx, scope, arena, statement.root, writer, true);
}

fn statement_offsets(arena: &ExprArena, statement: &Statement) -> String {
    let (min, max) = arena.offset_range(statement.root);
    if min != max {
        format!("0x{min:08X} - 0x{max:08X}")
    } else {
        format!("0x{min:08X}")
    }
}

fn should_have_newline_between(element1: &BlockElement, element2: &BlockElement) -> bool {
    if element1.space_below() || element2.space_above() {
        let if_then_else = matches!(element1, BlockElement::If(_))
            && matches!(element2, BlockElement::Else(_));
        return !if_then_else;
    }
    false
}

pub(crate) fn render_block_elements(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    elements: &[BlockElement],
    writer: &mut CodeWriter,
) {
    for idx in 0..elements.len() {
        let element = &elements[idx];
        render_element(ctx, scope, arena, element, writer);

        if let BlockElement::Statement(statement) = element {
            if ctx.options.assembly {
                writer.append("; // ");
                writer.append(&statement_offsets(arena, statement));
                writer.append("\n");
            } else {
                writer.append(";\n");
            }
        }

        if idx < elements.len() - 1 && should_have_newline_between(element, &elements[idx + 1]) {
            writer.append("\n");
        }
    }
}

fn render_conditional_header(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    keyword: &str,
    conditional: &Statement,
    writer: &mut CodeWriter,
) {
    writer.appendf(format_args!("{keyword} ( "));
    render_statement(ctx, scope, arena, conditional, writer);
    if ctx.options.assembly {
        writer.append(" ) // ");
        writer.append(&statement_offsets(arena, conditional));
        writer.append("\n");
    } else {
        writer.append(" )\n");
    }
}

fn render_body(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    body: &[BlockElement],
    writer: &mut CodeWriter,
) {
    writer.append("{\n");
    writer.push_indent();
    render_block_elements(ctx, scope, arena, body, writer);
    writer.pop_indent();
    writer.append("}\n");
}

fn render_element(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    element: &BlockElement,
    writer: &mut CodeWriter,
) {
    match element {
        BlockElement::Statement(statement) => {
            render_statement(ctx, scope, arena, statement, writer);
        }
        BlockElement::If(block) => render_if(ctx, scope, arena, block, writer),
        BlockElement::Else(block) => render_else(ctx, scope, arena, block, writer),
        BlockElement::While(block) => render_while(ctx, scope, arena, block, writer),
        BlockElement::DoWhile(block) => render_do_while(ctx, scope, arena, block, writer),
        BlockElement::For(block) => render_for(ctx, scope, arena, block, writer),
        BlockElement::Switch(block) => render_switch(ctx, scope, arena, block, writer),
        BlockElement::Debug(block) => render_debug(ctx, scope, arena, block, writer),
        BlockElement::Atomic(block) => {
            writer.append("atomic\n");
            render_body(ctx, scope, arena, &block.body, writer);
        }
        BlockElement::Schedule(block) => render_schedule(ctx, scope, arena, block, writer),
    }
}

fn render_if(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &IfBlock,
    writer: &mut CodeWriter,
) {
    render_conditional_header(ctx, scope, arena, "if", &block.conditional, writer);
    render_body(ctx, scope, arena, &block.body, writer);
}

fn render_else(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &ElseBlock,
    writer: &mut CodeWriter,
) {
    writer.append("else");

    // A lone nested block, or an if/else pair, chains without braces
    let inline = match block.body.as_slice() {
        [only] => only.is_block(),
        [BlockElement::If(_), BlockElement::Else(_)] => true,
        _ => false,
    };

    if inline {
        writer.append(" ");
        render_block_elements(ctx, scope, arena, &block.body, writer);
    } else {
        writer.append("\n");
        render_body(ctx, scope, arena, &block.body, writer);
    }
}

fn render_while(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &WhileLoop,
    writer: &mut CodeWriter,
) {
    render_conditional_header(ctx, scope, arena, "while", &block.conditional, writer);
    render_body(ctx, scope, arena, &block.body, writer);
}

fn render_do_while(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &DoWhileLoop,
    writer: &mut CodeWriter,
) {
    writer.append("do\n");
    render_body(ctx, scope, arena, &block.body, writer);
    writer.append("while ( ");
    render_statement(ctx, scope, arena, &block.conditional, writer);
    if ctx.options.assembly {
        writer.append(" ); // ");
        writer.append(&statement_offsets(arena, &block.conditional));
        writer.append("\n");
    } else {
        writer.append(" );\n");
    }
}

fn render_for_increment(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &ForLoop,
    writer: &mut CodeWriter,
) {
    // There is no dedicated increment opcode, so recover ++/-- from the assignment
    let iterator = for_loop_iteration_variable(scope, arena, block)
        .filter(|(vid, _)| !ctx.is_enum_type(&ctx.var(*vid).type_name));

    match iterator {
        Some((vid, magnitude)) => {
            let name = &ctx.var(vid).variable_name;
            match magnitude {
                -1 => writer.appendf(format_args!("--{name}")),
                1 => writer.appendf(format_args!("++{name}")),
                m if m > 0 => writer.appendf(format_args!("{name} += {m}")),
                m => writer.appendf(format_args!("{name} -= {}", -m)),
            }
        }
        None => render_statement(ctx, scope, arena, &block.increment, writer),
    }
}

fn render_for(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &ForLoop,
    writer: &mut CodeWriter,
) {
    writer.append("for ( ");
    render_statement(ctx, scope, arena, &block.init, writer);
    writer.append("; ");
    render_statement(ctx, scope, arena, &block.conditional, writer);
    writer.append("; ");
    render_for_increment(ctx, scope, arena, block, writer);
    if ctx.options.assembly {
        writer.append(" ) // ");
        writer.append(&statement_offsets(arena, &block.init));
        writer.append("; ");
        writer.append(&statement_offsets(arena, &block.conditional));
        writer.append("; ");
        writer.append(&statement_offsets(arena, &block.increment));
        writer.append("\n");
    } else {
        writer.append(" )\n");
    }
    render_body(ctx, scope, arena, &block.body, writer);
}

fn render_case(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    case: &CaseBlock,
    writer: &mut CodeWriter,
) {
    match (&case.value, &case.value_code) {
        (Some(_), Some(code)) => writer.appendf(format_args!("case {code}:")),
        (Some(value), None) => writer.appendf(format_args!("case {value}:")),
        _ => writer.append("default:"),
    }

    if ctx.options.assembly {
        writer.appendf(format_args!(" // 0x{:08X}\n", case.jump_location));
    } else {
        writer.append("\n");
    }

    writer.push_indent();
    render_block_elements(ctx, scope, arena, &case.body, writer);
    writer.pop_indent();
}

fn render_switch(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &SwitchBlock,
    writer: &mut CodeWriter,
) {
    writer.append("switch ( ");
    if let Some(conditional) = &block.conditional {
        render_statement(ctx, scope, arena, conditional, writer);
    }
    if ctx.options.assembly {
        writer.append(" ) // ");
        if let Some(conditional) = &block.conditional {
            writer.append(&statement_offsets(arena, conditional));
        }
        writer.append("\n");
    } else {
        writer.append(" )\n");
    }

    writer.append("{\n");
    writer.push_indent();
    for (idx, case) in block.cases.iter().enumerate() {
        render_case(ctx, scope, arena, case, writer);
        if idx < block.cases.len() - 1 && !case.body.is_empty() {
            writer.append("\n");
        }
    }
    writer.pop_indent();
    writer.append("}\n");
}

fn render_debug(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &DebugBlock,
    writer: &mut CodeWriter,
) {
    let inline = match block.body.as_slice() {
        [BlockElement::Atomic(_)] => true,
        [only] => !only.is_block(),
        _ => false,
    };

    if inline {
        writer.append("debug ");
        render_block_elements(ctx, scope, arena, &block.body, writer);
    } else {
        writer.append("debug\n");
        render_body(ctx, scope, arena, &block.body, writer);
    }
}

fn render_schedule(
    ctx: &Context,
    scope: &Scope,
    arena: &ExprArena,
    block: &ScheduleBlock,
    writer: &mut CodeWriter,
) {
    writer.append("schedule\n");
    writer.append("{\n");
    writer.push_indent();
    for (idx, every) in block.every.iter().enumerate() {
        writer.appendf(format_args!("every {}:\n", render_float(every.interval)));
        render_body(ctx, scope, arena, &every.body, writer);
        if idx < block.every.len() - 1 {
            writer.append("\n");
        }
    }
    writer.pop_indent();
    writer.append("}\n");
}

/// `ret Name( type name, type name )` with diagnostics for unresolved types.
#[must_use]
pub(crate) fn render_function_header(ctx: &Context, decl_id: DeclId) -> String {
    use std::fmt::Write as _;

    let decl = ctx.decl(decl_id);
    let mut header = String::new();

    // The raw return type keeps task functions rendering as `task`
    let return_type = &ctx.var(decl.return_info).type_name;
    if !return_type.is_empty() {
        if return_type == UNKNOWN_TYPE {
            error!(
                "Failed to determine return type id {} for function {}",
                ctx.var(decl.return_info).id.0,
                decl.scoped_name()
            );
        }
        let _ = write!(header, "{return_type} ");
    }

    header.push_str(&decl.name);
    header.push('(');
    if let Some(params) = decl.parameters.as_ref() {
        if !params.is_empty() {
            header.push(' ');
            for (ii, param) in params.iter().enumerate() {
                if param.type_name == UNKNOWN_TYPE {
                    error!(
                        "Failed to determine type for function parameter {}({})",
                        decl.scoped_name(),
                        param.name
                    );
                }
                let _ = write!(header, "{} {}", param.type_name, param.name);
                if ii < params.len() - 1 {
                    header.push_str(", ");
                }
            }
            header.push(' ');
        }
    }
    header.push(')');

    header
}

/// The assembly listing for one function, emitted as `//` comments.
pub(crate) fn render_function_assembly(
    ctx: &Context,
    definition: &FunctionDefinition,
    writer: &mut CodeWriter,
) {
    if ctx.options.assembly_only {
        writer.appendf(format_args!(
            "// ==================== START_FUNCTION {}\n",
            ctx.decl(definition.declaration).scoped_name()
        ));
    } else {
        writer.appendf(format_args!(
            "// ==================== START_FUNCTION {}\n",
            render_function_header(ctx, definition.declaration)
        ));
    }

    for op in &definition.ops {
        if ctx.options.assembly_offsets {
            writer.appendf(format_args!("// 0x{:08X} ", op.offset));
        } else {
            writer.append("// ");
        }
        writer.append(&op.assembly_line(ctx));
        writer.append("\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_float() {
        assert_eq!(render_float(1.0), "1.0");
        assert_eq!(render_float(0.25), "0.25");
        assert_eq!(render_float(-3.5), "-3.5");
        assert_eq!(render_float(12.0), "12.0");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("plain"), "plain");
        assert_eq!(escape_string("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_string("back\\slash"), "back\\\\slash");
    }
}

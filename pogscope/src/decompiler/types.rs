//! Bottom-up type propagation over recovered expression trees.
//!
//! One inference pass walks every statement of every function: literal and operator
//! opcodes fix node types, calls propagate parameter and return types in both
//! directions, and variable reads/writes accumulate hints that
//! [`Context::resolve_variable_type`] later reconciles. The same walk rewrites literal
//! render text where types demand it: zero compared against a handle becomes `none`,
//! bools become `true`/`false`, and integers matching an enum member take its name.
//!
//! The separate code-check walk runs once after inference has converged: it reports
//! mismatched handle comparisons (splicing a cast to the common ancestor where one is
//! available) and attaches the assignment- and parameter-driven name providers.

use log::warn;

use crate::{
    decompiler::{
        block::{BlockElement, ForLoop},
        graph::{ExprArena, NodeId},
        naming::{
            add_assignment_based_providers, add_parameter_passing_providers, NameProvider,
        },
        variable::Scope,
    },
    package::{Context, VarId, UNKNOWN_TYPE},
    Opcode,
};

fn variable_of(scope: &Scope, arena: &ExprArena, id: NodeId) -> Option<VarId> {
    let index = arena.node(id).operation.variable_index()?;
    scope.variable_by_stack_index(index)
}

/// Record that the expression at `id` is used where `type_name` is expected.
///
/// Reads and writes push a referenced-type hint onto the underlying variable;
/// integer literals matching a member of an expected enum take that member's name
/// as their render text.
fn set_possible_type(
    ctx: &mut Context,
    scope: &Scope,
    arena: &mut ExprArena,
    id: NodeId,
    type_name: &str,
) {
    let opcode = arena.node(id).operation.opcode;
    match opcode {
        // The result of an assignment can be passed through to a function, so a
        // write picks up referenced-type hints the same way a read does
        Opcode::VariableRead | Opcode::VariableWrite => {
            if let Some(index) = arena.node(id).operation.variable_index() {
                if let Some(vid) = scope.variable_by_stack_index(index) {
                    ctx.var_mut(vid).add_referenced_type(type_name);
                }
            }
        }
        Opcode::LiteralZero
        | Opcode::LiteralOne
        | Opcode::LiteralByte
        | Opcode::LiteralShort
        | Opcode::LiteralInt => {
            if ctx.is_enum_type(type_name) {
                let value = arena.node(id).operation.literal_integer_value().unwrap_or(-1);
                if value >= 0 {
                    #[allow(clippy::cast_sign_loss)]
                    let member = ctx
                        .enums
                        .get(type_name)
                        .and_then(|data| data.value_to_name.get(&(value as u32)))
                        .cloned();
                    if let Some(member) = member {
                        arena.node_mut(id).code = Some(member);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Rewrite an integer literal to an enum member name when one matches.
fn rewrite_literal_as_enum(ctx: &Context, arena: &mut ExprArena, id: NodeId, enum_type: &str) {
    let Some(value) = arena.node(id).operation.literal_integer_value() else {
        return;
    };
    if value < 0 {
        return;
    }
    #[allow(clippy::cast_sign_loss)]
    let member = ctx
        .enums
        .get(enum_type)
        .and_then(|data| data.value_to_name.get(&(value as u32)))
        .cloned();
    if let Some(member) = member {
        arena.node_mut(id).code = Some(member);
    }
}

/// One bottom-up propagation pass over the expression rooted at `id`.
pub(crate) fn resolve_node_types(
    ctx: &mut Context,
    scope: &Scope,
    arena: &mut ExprArena,
    id: NodeId,
) {
    for child in arena.node(id).children.clone() {
        resolve_node_types(ctx, scope, arena, child);
    }

    let opcode = arena.node(id).operation.opcode;
    match opcode {
        Opcode::CastFltToInt
        | Opcode::BitwiseAnd
        | Opcode::BitwiseOr
        | Opcode::IntNeg
        | Opcode::LiteralByte
        | Opcode::LiteralShort
        | Opcode::LiteralInt => {
            arena.node_mut(id).type_name = "int".to_string();
        }

        Opcode::LiteralOne | Opcode::LiteralZero => {
            arena.node_mut(id).type_name = "bool".to_string();
        }

        Opcode::CastToBool => {
            let child = arena.node(id).children.first().copied();
            let child_is_handle = child
                .map(|c| ctx.is_handle_type(&arena.node(c).type_name))
                .unwrap_or(false);
            arena.node_mut(id).type_name = if child_is_handle {
                "hobject".to_string()
            } else {
                "bool".to_string()
            };
        }

        Opcode::IntAdd | Opcode::IntSub | Opcode::IntMul | Opcode::IntDiv | Opcode::IntMod => {
            arena.node_mut(id).type_name = "int".to_string();
            for child in arena.node(id).children.clone() {
                set_possible_type(ctx, scope, arena, child, "int");
            }
        }

        Opcode::CastIntToFlt | Opcode::FltNeg | Opcode::LiteralFloat => {
            arena.node_mut(id).type_name = "float".to_string();
        }

        Opcode::FltAdd | Opcode::FltSub | Opcode::FltMul | Opcode::FltDiv => {
            arena.node_mut(id).type_name = "float".to_string();
            for child in arena.node(id).children.clone() {
                set_possible_type(ctx, scope, arena, child, "float");
            }
        }

        Opcode::LiteralString => {
            arena.node_mut(id).type_name = "string".to_string();
        }

        _ if opcode.is_function_call() => {
            resolve_call_types(ctx, scope, arena, id);
        }

        Opcode::LogicalAnd | Opcode::LogicalOr => {
            arena.node_mut(id).type_name = "bool".to_string();
            for child in arena.node(id).children.clone() {
                if !arena.node(child).operation.opcode.is_cast() {
                    set_possible_type(ctx, scope, arena, child, "bool");
                }
            }
        }

        Opcode::LogicalNot => {
            arena.node_mut(id).type_name = "bool".to_string();
            if let Some(&child) = arena.node(id).children.first() {
                if !arena.node(child).operation.opcode.is_cast() {
                    set_possible_type(ctx, scope, arena, child, "bool");
                }
            }
        }

        Opcode::IntGt | Opcode::IntLt | Opcode::IntGtEquals | Opcode::IntLtEquals => {
            arena.node_mut(id).type_name = "bool".to_string();
            for child in arena.node(id).children.clone() {
                set_possible_type(ctx, scope, arena, child, "int");
            }
        }

        Opcode::Equals | Opcode::NotEquals => {
            resolve_equality_types(ctx, scope, arena, id);
        }

        Opcode::FltGt | Opcode::FltLt | Opcode::FltGtEquals | Opcode::FltLtEquals => {
            arena.node_mut(id).type_name = "bool".to_string();
            for child in arena.node(id).children.clone() {
                set_possible_type(ctx, scope, arena, child, "float");
            }
        }

        Opcode::StringEquals => {
            arena.node_mut(id).type_name = "bool".to_string();
            for child in arena.node(id).children.clone() {
                set_possible_type(ctx, scope, arena, child, "string");
            }
        }

        Opcode::VariableRead => {
            if let Some(vid) = variable_of(scope, arena, id) {
                ctx.var_mut(vid).ref_count += 1;
                let type_name = ctx.var(vid).type_name.clone();
                if type_name != UNKNOWN_TYPE {
                    arena.node_mut(id).type_name = type_name;
                }
            }
        }

        Opcode::VariableWrite | Opcode::StringVariableWrite => {
            resolve_write_types(ctx, scope, arena, id);
        }

        Opcode::Jump => {
            resolve_return_types(ctx, scope, arena, id);
        }

        Opcode::JumpIfFalse | Opcode::JumpIfTrue => {
            // A bare truth test suggests the tested variable is a bool
            let children = arena.node(id).children.clone();
            if children.len() == 1 {
                set_possible_type(ctx, scope, arena, children[0], "bool");
            }
        }

        _ => {
            if let Some(&child) = arena.node(id).children.first() {
                let child_type = arena.node(child).type_name.clone();
                arena.node_mut(id).type_name = child_type;
            }
        }
    }
}

fn resolve_call_types(ctx: &mut Context, scope: &Scope, arena: &mut ExprArena, id: NodeId) {
    let Some(decl_id) = arena.node(id).operation.call_target() else {
        return;
    };

    let mut func_return = ctx.return_type(decl_id);
    if arena.node(id).operation.opcode.is_task_call() {
        func_return = "htask".to_string();
    }
    if func_return != UNKNOWN_TYPE {
        arena.node_mut(id).type_name = func_return;
    }

    let auto_detect = ctx.decl(decl_id).auto_detect_types;
    let Some(params) = ctx.decl(decl_id).parameters.clone() else {
        return;
    };
    let children = arena.node(id).children.clone();
    if params.len() != children.len() {
        return;
    }

    for (ii, param) in params.iter().enumerate() {
        let child = children[children.len() - 1 - ii];
        let child_opcode = arena.node(child).operation.opcode;

        if param.type_name != UNKNOWN_TYPE {
            set_possible_type(ctx, scope, arena, child, &param.type_name);
        } else if matches!(child_opcode, Opcode::LiteralZero | Opcode::LiteralOne) {
            // Could be either of these really
            if let Some(vid) = param.variable {
                ctx.var_mut(vid).add_assigned_type("bool");
                ctx.var_mut(vid).add_assigned_type("int");
            }
        }

        let child_type = arena.node(child).type_name.clone();
        if child_type != UNKNOWN_TYPE && auto_detect {
            if let Some(vid) = param.variable {
                ctx.var_mut(vid).add_assigned_type(&child_type);
            }
        }

        if param.type_name != UNKNOWN_TYPE {
            if ctx.is_enum_type(&param.type_name) {
                rewrite_literal_as_enum(ctx, arena, child, &param.type_name);
            }

            match child_opcode {
                Opcode::LiteralZero => {
                    if param.type_name == "bool" {
                        arena.node_mut(child).code = Some("false".to_string());
                    } else if ctx.is_handle_type(&param.type_name) {
                        arena.node_mut(child).code = Some("none".to_string());
                    }
                }
                Opcode::LiteralOne => {
                    if param.type_name == "bool" {
                        arena.node_mut(child).code = Some("true".to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

fn resolve_equality_types(ctx: &mut Context, scope: &Scope, arena: &mut ExprArena, id: NodeId) {
    arena.node_mut(id).type_name = "bool".to_string();

    let children = arena.node(id).children.clone();
    let [child1, child2] = children.as_slice() else {
        return;
    };
    let (child1, child2) = (*child1, *child2);

    let child1_type = arena.node(child1).type_name.clone();
    let child2_type = arena.node(child2).type_name.clone();

    let child1_is_handle = ctx.is_handle_type(&child1_type);
    let child2_is_handle = ctx.is_handle_type(&child2_type);

    let child1_opcode = arena.node(child1).operation.opcode;
    let child2_opcode = arena.node(child2).operation.opcode;

    let child1_is_cast = child1_opcode == Opcode::CastToBool;
    let child2_is_cast = child2_opcode == Opcode::CastToBool;

    if ctx.is_enum_type(&child1_type)
        && !child2_is_cast
        && arena.node(child2).operation.literal_integer_value().is_some()
    {
        set_possible_type(ctx, scope, arena, child2, &child1_type);
    }
    if ctx.is_enum_type(&child2_type)
        && !child1_is_cast
        && arena.node(child1).operation.literal_integer_value().is_some()
    {
        set_possible_type(ctx, scope, arena, child1, &child2_type);
    }

    // Comparing a handle against `none` compiles down to a comparison with zero
    if child2_opcode == Opcode::LiteralZero {
        if !child1_is_cast && child1_is_handle {
            arena.node_mut(child2).code = Some("none".to_string());
        } else if child1_is_cast {
            arena.node_mut(child2).code = Some("false".to_string());
        }
    }
    if child1_opcode == Opcode::LiteralZero {
        if !child2_is_cast && child2_is_handle {
            arena.node_mut(child1).code = Some("none".to_string());
        } else if child2_is_cast {
            arena.node_mut(child1).code = Some("false".to_string());
        }
    }

    let v1 = variable_of(scope, arena, child1);
    let v2 = variable_of(scope, arena, child2);

    if child1_is_handle && child2_is_handle {
        if let (Some(v1), Some(v2)) = (v1, v2) {
            let common = ctx.highest_common_ancestor(&child1_type, &child2_type);
            ctx.var_mut(v1).add_handle_equals_type(&common);
            ctx.var_mut(v2).add_handle_equals_type(&common);
        }
    }

    if child1_is_handle {
        if child2_is_cast {
            let inner = arena.node(child2).children.first().copied();
            if let Some(vid) = inner.and_then(|n| variable_of(scope, arena, n)) {
                ctx.var_mut(vid).add_referenced_type(&child1_type);
            }
        } else if let Some(vid) = v2 {
            ctx.var_mut(vid).add_handle_equals_type(&child1_type);
        }
    }
    if child2_is_handle {
        if child1_is_cast {
            let inner = arena.node(child1).children.first().copied();
            if let Some(vid) = inner.and_then(|n| variable_of(scope, arena, n)) {
                ctx.var_mut(vid).add_referenced_type(&child2_type);
            }
        } else if let Some(vid) = v1 {
            ctx.var_mut(vid).add_handle_equals_type(&child2_type);
        }
    }
}

fn resolve_write_types(ctx: &mut Context, scope: &Scope, arena: &mut ExprArena, id: NodeId) {
    let Some(vid) = variable_of(scope, arena, id) else {
        return;
    };
    let Some(&child) = arena.node(id).children.first() else {
        return;
    };
    let child_opcode = arena.node(child).operation.opcode;

    // Default inits are not real assignments
    if child_opcode != Opcode::VariableInit {
        ctx.var_mut(vid).assignment_count += 1;
    }

    let v_type = ctx.var(vid).type_name.clone();
    if ctx.is_enum_type(&v_type) {
        set_possible_type(ctx, scope, arena, child, &v_type);
    }

    let mut child_type = arena.node(child).type_name.clone();
    let is_parameter = ctx.decl(scope.function).is_parameter_variable(vid);

    let mut add_bool_hint = false;
    match child_opcode {
        Opcode::LiteralZero => {
            if ctx.is_handle_type(&v_type) {
                arena.node_mut(child).code = Some("none".to_string());
            } else {
                if v_type == "int" {
                    arena.node_mut(child).code = Some("0".to_string());
                }
                add_bool_hint = true;
            }
        }
        Opcode::LiteralOne => {
            add_bool_hint = true;
        }
        _ => {}
    }

    if add_bool_hint {
        // It could be either a bool or an int at this point
        if is_parameter {
            ctx.var_mut(vid).add_parameter_assigned_type("bool");
        } else {
            ctx.var_mut(vid).add_assigned_type("bool");
        }

        if v_type == "bool" {
            child_type = "bool".to_string();
            let text = if child_opcode == Opcode::LiteralOne {
                "true"
            } else {
                "false"
            };
            arena.node_mut(child).code = Some(text.to_string());
        }
    }

    if child_type != UNKNOWN_TYPE {
        if v_type != UNKNOWN_TYPE {
            set_possible_type(ctx, scope, arena, child, &v_type);
        }
        arena.node_mut(id).type_name = child_type.clone();
        if child_type != UNKNOWN_TYPE {
            // A parameter's type is not altered by what gets assigned to it inside
            // the function, so those hints land in a separate set
            if is_parameter {
                ctx.var_mut(vid).add_parameter_assigned_type(&child_type);
            } else {
                ctx.var_mut(vid).add_assigned_type(&child_type);
            }
        }
    } else if v_type != UNKNOWN_TYPE {
        set_possible_type(ctx, scope, arena, child, &v_type);
    }
}

fn resolve_return_types(ctx: &mut Context, scope: &Scope, arena: &mut ExprArena, id: NodeId) {
    let is_return = arena
        .node(id)
        .code
        .as_deref()
        .is_some_and(|code| code.starts_with("return"));
    if !is_return || arena.node(id).children.len() != 1 {
        return;
    }

    let return_op = arena.node(id).children[0];
    let return_info = ctx.decl(scope.function).return_info;
    let return_type = ctx.var(return_info).type_name.clone();

    match arena.node(return_op).operation.opcode {
        Opcode::LiteralZero | Opcode::LiteralOne => {
            ctx.var_mut(return_info).add_assigned_type("bool");
        }
        _ => {
            let op_type = arena.node(return_op).type_name.clone();
            if op_type != UNKNOWN_TYPE {
                ctx.var_mut(return_info).add_assigned_type(&op_type);
            }
        }
    }

    if return_type == UNKNOWN_TYPE {
        return;
    }

    // Make sure local variables and local function return types are impacted by
    // being returned here
    if !ctx.decl(scope.function).auto_detect_types {
        set_possible_type(ctx, scope, arena, return_op, &return_type);
    }

    if ctx.is_enum_type(&return_type) {
        rewrite_literal_as_enum(ctx, arena, return_op, &return_type);
    } else {
        match arena.node(return_op).operation.opcode {
            Opcode::LiteralZero => {
                if ctx.is_handle_type(&return_type) {
                    arena.node_mut(return_op).code = Some("none".to_string());
                } else if return_type == "bool" {
                    arena.node_mut(return_op).code = Some("false".to_string());
                }
            }
            Opcode::LiteralOne => {
                if return_type == "bool" {
                    arena.node_mut(return_op).code = Some("true".to_string());
                }
            }
            _ => {}
        }
    }
}

/// Walk a list of block elements with the node-level propagation pass.
pub(crate) fn resolve_element_types(
    ctx: &mut Context,
    scope: &Scope,
    arena: &mut ExprArena,
    elements: &mut [BlockElement],
) {
    for element in elements {
        match element {
            BlockElement::Statement(statement) => {
                resolve_node_types(ctx, scope, arena, statement.root);
            }
            BlockElement::If(block) => {
                resolve_node_types(ctx, scope, arena, block.conditional.root);
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::Else(block) => {
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::While(block) => {
                resolve_node_types(ctx, scope, arena, block.conditional.root);
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::DoWhile(block) => {
                resolve_node_types(ctx, scope, arena, block.conditional.root);
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::For(block) => {
                resolve_node_types(ctx, scope, arena, block.init.root);
                resolve_node_types(ctx, scope, arena, block.conditional.root);
                resolve_node_types(ctx, scope, arena, block.increment.root);
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::Switch(block) => {
                if let Some(conditional) = block.conditional {
                    resolve_node_types(ctx, scope, arena, conditional.root);
                    if let Some(&scrutinee) = arena.node(conditional.root).children.first() {
                        set_possible_type(ctx, scope, arena, scrutinee, "int");
                    }

                    let scrutinee_type = arena.node(conditional.root).type_name.clone();
                    if ctx.is_enum_type(&scrutinee_type) {
                        for case in &mut block.cases {
                            let Some(value) = case.value else { continue };
                            if value < 0 {
                                continue;
                            }
                            #[allow(clippy::cast_sign_loss)]
                            let member = ctx
                                .enums
                                .get(&scrutinee_type)
                                .and_then(|data| data.value_to_name.get(&(value as u32)))
                                .cloned();
                            if member.is_some() {
                                case.value_code = member;
                            }
                        }
                    }
                }
                for case in &mut block.cases {
                    resolve_element_types(ctx, scope, arena, &mut case.body);
                }
            }
            BlockElement::Debug(block) => {
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::Atomic(block) => {
                resolve_element_types(ctx, scope, arena, &mut block.body);
            }
            BlockElement::Schedule(block) => {
                for every in &mut block.every {
                    resolve_element_types(ctx, scope, arena, &mut every.body);
                }
            }
        }
    }
}

/// The iteration variable of a for loop's increment, with the step magnitude.
pub(crate) fn for_loop_iteration_variable(
    scope: &Scope,
    arena: &ExprArena,
    block: &ForLoop,
) -> Option<(VarId, i32)> {
    let assignment = *arena.node(block.increment.root).children.first()?;
    let assignment_node = arena.node(assignment);
    if assignment_node.operation.opcode != Opcode::VariableWrite {
        return None;
    }
    let write_index = assignment_node.operation.variable_index()?;

    let add = *assignment_node.children.first()?;
    if arena.node(add).operation.opcode != Opcode::IntAdd {
        return None;
    }
    let add_children = &arena.node(add).children;
    let (&read, &step) = (add_children.first()?, add_children.get(1)?);

    if arena.node(read).operation.variable_index() != Some(write_index)
        || arena.node(read).operation.opcode != Opcode::VariableRead
    {
        return None;
    }

    let magnitude = arena.node(step).operation.literal_integer_value()?;
    let vid = scope.variable_by_stack_index(write_index)?;
    Some((vid, magnitude))
}

fn check_equality_node(ctx: &mut Context, arena: &mut ExprArena, id: NodeId) {
    let children = arena.node(id).children.clone();
    let [child1, child2] = children.as_slice() else {
        return;
    };
    let (child1, child2) = (*child1, *child2);

    let unwrap_cast = |arena: &ExprArena, child: NodeId| -> String {
        let node = arena.node(child);
        if node.operation.opcode == Opcode::CastToBool {
            if let Some(&inner) = node.children.first() {
                return arena.node(inner).type_name.clone();
            }
        }
        node.type_name.clone()
    };

    let child1_type = unwrap_cast(arena, child1);
    let child2_type = unwrap_cast(arena, child2);

    if !ctx.is_handle_type(&child1_type)
        || !ctx.is_handle_type(&child2_type)
        || child1_type == child2_type
    {
        return;
    }

    let offset = arena.node(id).operation.offset;
    warn!(
        "Mismatched handle types in equivalence check at offset 0x{offset:08X} ({child1_type} vs {child2_type}). \
         Without a cast the engine compares these as bools"
    );

    // Splice a cast to the common ancestor around each more-derived operand, when
    // the ancestor's package exposes one
    let common = ctx.highest_common_ancestor(&child1_type, &child2_type);
    if common == UNKNOWN_TYPE {
        return;
    }
    let Some(cast_decl) = ctx.cast_function_for_handle_type(&common) else {
        return;
    };

    for (slot, child, child_type) in [(0usize, child1, child1_type), (1, child2, child2_type)] {
        if child_type == common || arena.node(child).operation.opcode == Opcode::CastToBool {
            continue;
        }
        let child_offset = arena.node(child).operation.offset;
        let cast = arena.alloc(
            crate::assembly::Operation {
                offset: child_offset,
                opcode: Opcode::FunctionCallImported,
                data: crate::assembly::OperandData::Call { decl: cast_decl },
            },
            None,
        );
        arena.node_mut(cast).children = vec![child];
        arena.node_mut(cast).type_name = common.clone();
        arena.node_mut(id).children[slot] = cast;
    }
}

fn check_node(
    ctx: &mut Context,
    scope: &Scope,
    arena: &mut ExprArena,
    id: NodeId,
    parent: Option<NodeId>,
) {
    let opcode = arena.node(id).operation.opcode;

    if matches!(opcode, Opcode::Equals | Opcode::NotEquals) {
        check_equality_node(ctx, arena, id);
    }

    let variable = variable_of(scope, arena, id);

    match opcode {
        Opcode::VariableWrite | Opcode::StringVariableWrite => {
            if let (Some(vid), Some(&rhs)) = (variable, arena.node(id).children.first()) {
                add_assignment_based_providers(ctx, vid, rhs);
            }
            // Drop any cached render text so the final name is used
            arena.node_mut(id).code = None;
            if let (Some(vid), Some(parent)) = (variable, parent) {
                if arena.node(parent).operation.opcode.is_function_call() {
                    add_parameter_passing_providers(ctx, arena, vid, parent);
                }
            }
        }
        Opcode::VariableRead => {
            arena.node_mut(id).code = None;
            if let (Some(vid), Some(parent)) = (variable, parent) {
                if arena.node(parent).operation.opcode.is_function_call() {
                    add_parameter_passing_providers(ctx, arena, vid, parent);
                }
            }
        }
        _ => {}
    }

    for child in arena.node(id).children.clone() {
        check_node(ctx, scope, arena, child, Some(id));
    }
}

/// Post-inference code checks over a list of block elements.
pub(crate) fn check_elements(
    ctx: &mut Context,
    scope: &Scope,
    arena: &mut ExprArena,
    elements: &[BlockElement],
) {
    for element in elements {
        match element {
            BlockElement::Statement(statement) => {
                check_node(ctx, scope, arena, statement.root, None);
            }
            BlockElement::If(block) => {
                check_node(ctx, scope, arena, block.conditional.root, None);
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::Else(block) => {
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::While(block) => {
                check_node(ctx, scope, arena, block.conditional.root, None);
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::DoWhile(block) => {
                check_node(ctx, scope, arena, block.conditional.root, None);
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::For(block) => {
                check_node(ctx, scope, arena, block.init.root, None);
                check_node(ctx, scope, arena, block.conditional.root, None);
                check_node(ctx, scope, arena, block.increment.root, None);
                check_elements(ctx, scope, arena, &block.body);

                if let Some((iterator, _)) = for_loop_iteration_variable(scope, arena, block) {
                    ctx.var_mut(iterator).add_name_provider(NameProvider::Iterator);
                }
            }
            BlockElement::Switch(block) => {
                if let Some(conditional) = &block.conditional {
                    check_node(ctx, scope, arena, conditional.root, None);
                }
                for case in &block.cases {
                    check_elements(ctx, scope, arena, &case.body);
                }
            }
            BlockElement::Debug(block) => {
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::Atomic(block) => {
                check_elements(ctx, scope, arena, &block.body);
            }
            BlockElement::Schedule(block) => {
                for every in &block.every {
                    check_elements(ctx, scope, arena, &every.body);
                }
            }
        }
    }
}

//! Control-flow structuring.
//!
//! A single recursive descent folds the linear operation stream into nested blocks,
//! recovering expressions with an explicit operand stack as it goes. At each index the
//! detectors run in a fixed order - do-while first, then (once a conditional statement
//! has been reduced) if and for/while, then debug, atomic, schedule, and switch - and
//! the first match wins. Any unconsumed `OP_JUMP` is classified as return, break,
//! continue, or the jump over an else block; anything else is a structural error that
//! abandons the function.
//!
//! Jumps that have served their structural purpose are rewritten in place: a do-while
//! back-jump becomes the `OP_POP_STACK` that terminates the loop condition, and loop
//! and schedule back-jumps are erased outright.

use crate::{
    assembly::{OperandData, Operation},
    decompiler::{
        block::{
            AtomicBlock, BlockContext, BlockElement, CaseBlock, DebugBlock, DoWhileLoop,
            ElseBlock, ForLoop, IfBlock, ScheduleBlock, ScheduleEveryBlock, SwitchBlock,
            WhileLoop,
        },
        graph::{ExprArena, NodeId, Statement},
        render::render_operation_code,
        variable::Scope,
    },
    package::Context,
    Opcode, Result,
};

/// Index of the operation at `offset`, searching the whole function.
pub(crate) fn offset_to_op_index(offset: u32, ops: &[Operation]) -> Option<usize> {
    ops.iter().position(|op| op.offset == offset)
}

/// An if block: a forward `JUMP_IF_FALSE` whose target is *not* preceded by a back-jump
/// to the conditional (that shape is a loop).
fn is_if_block(idx: usize, conditional_offset: u32, ops: &[Operation]) -> Option<usize> {
    let op = &ops[idx];
    if op.opcode != Opcode::JumpIfFalse {
        return None;
    }
    let target = op.jump_target()?;
    if target <= op.offset {
        return None;
    }

    let end_idx = offset_to_op_index(target, ops)?;
    if end_idx > 0 {
        let last_op = &ops[end_idx - 1];
        if last_op.opcode == Opcode::Jump && last_op.jump_target() == Some(conditional_offset) {
            return None;
        }
    }

    Some(end_idx)
}

/// A loop: a forward `JUMP_IF_FALSE` whose target *is* preceded by a back-jump to the
/// conditional.
fn is_for_or_while_loop(idx: usize, conditional_offset: u32, ops: &[Operation]) -> Option<usize> {
    let op = &ops[idx];
    if op.opcode != Opcode::JumpIfFalse {
        return None;
    }
    let target = op.jump_target()?;
    if target <= op.offset {
        return None;
    }

    let end_idx = offset_to_op_index(target, ops)?;
    if end_idx > 0 {
        let last_op = &ops[end_idx - 1];
        if last_op.opcode == Opcode::Jump && last_op.jump_target() == Some(conditional_offset) {
            return Some(end_idx);
        }
    }

    None
}

/// A do-while: some later `JUMP_IF_TRUE` targets the current offset.
fn is_do_while_loop(idx: usize, max_idx: usize, ops: &[Operation]) -> Option<usize> {
    for ii in (idx + 1..=max_idx).rev() {
        let op = &ops[ii];
        if op.opcode == Opcode::JumpIfTrue && op.jump_target() == Some(ops[idx].offset) {
            return Some(ii);
        }
    }

    None
}

fn is_debug_block(idx: usize, ops: &[Operation]) -> Result<Option<usize>> {
    let op = &ops[idx];
    if op.opcode != Opcode::JumpIfNotDebug {
        return Ok(None);
    }
    let target = op.jump_target().unwrap_or(0);
    match offset_to_op_index(target, ops) {
        Some(end_idx) => Ok(Some(end_idx)),
        None => Err(structure_error!(
            op.offset,
            "Failed to deal with debug block at offset 0x{:08X}",
            op.offset
        )),
    }
}

/// An atomic block, matched by counting start/stop nesting.
fn is_atomic_block(idx: usize, max_idx: usize, ops: &[Operation]) -> Result<Option<usize>> {
    let op = &ops[idx];
    if op.opcode != Opcode::AtomicStart {
        return Ok(None);
    }

    let mut last_atomic_stop = None;
    let mut atomic_counter = 1i32;

    for ii in idx + 1..=max_idx {
        match ops[ii].opcode {
            Opcode::AtomicStart => {
                if let Some(stop) = last_atomic_stop {
                    return Ok(Some(stop));
                }
                atomic_counter += 1;
            }
            Opcode::AtomicStop => {
                if atomic_counter > 0 {
                    atomic_counter -= 1;
                }
                if atomic_counter == 0 {
                    last_atomic_stop = Some(ii);
                }
            }
            _ => {}
        }
    }

    match last_atomic_stop {
        Some(stop) => Ok(Some(stop)),
        None => Err(structure_error!(
            op.offset,
            "Failed to deal with atomic block at offset 0x{:08X}",
            op.offset
        )),
    }
}

/// A schedule block: `SCHEDULE_START` followed by chained `SCHEDULE_EVERY` skips.
/// Returns the index of the terminating back-jump.
fn is_schedule_block(idx: usize, ops: &[Operation]) -> Option<usize> {
    if ops[idx].opcode != Opcode::ScheduleStart {
        return None;
    }

    let mut target_idx = idx + 1;
    while let Some(op) = ops.get(target_idx) {
        let OperandData::ScheduleEvery { skip_offset, .. } = op.data else {
            break;
        };
        target_idx = offset_to_op_index(skip_offset, ops)?;
    }

    if target_idx < ops.len() {
        Some(target_idx)
    } else {
        None
    }
}

fn should_use_for_loop(
    arena: &ExprArena,
    init: Option<&BlockElement>,
    condition: &Statement,
    increment: Option<&BlockElement>,
) -> bool {
    let (Some(init), Some(increment)) = (init, increment) else {
        return false;
    };
    let (Some(init), Some(increment)) = (init.as_statement(), increment.as_statement()) else {
        return false;
    };

    // One or more variables must appear in the init, the condition, and the increment
    let init_variables = arena.variable_indices(init.root);
    let condition_variables = arena.variable_indices(condition.root);
    let increment_variables = arena.variable_indices(increment.root);

    init_variables.iter().any(|index| {
        condition_variables.contains(index) && increment_variables.contains(index)
    })
}

/// Try to recognize the switch dispatch pattern behind a forward `OP_JUMP`.
///
/// The jump must land on a scrutinee expression terminated by `OP_CLONE_STACK`,
/// followed by `LITERAL; EQUALS; JUMP_IF_TRUE` triples (one per case) and optionally a
/// backward jump into the body marking the default label. Any stray jump before the
/// clone means this is not a switch and the caller falls back to jump classification.
fn is_switch_block(
    ctx: &Context,
    scope: &Scope,
    arena: &mut ExprArena,
    block: &BlockContext,
    idx: usize,
    ops: &mut Vec<Operation>,
) -> Result<Option<(SwitchBlock, usize)>> {
    let op_offset = ops[idx].offset;
    if ops[idx].opcode != Opcode::Jump {
        return Ok(None);
    }
    let Some(target) = ops[idx].jump_target() else {
        return Ok(None);
    };
    if target <= op_offset {
        return Ok(None);
    }
    let Some(cond_start) = offset_to_op_index(target, ops) else {
        return Ok(None);
    };

    let mut cond_end: Option<usize> = None;
    let mut cases: Vec<CaseBlock> = Vec::new();
    let mut ii = cond_start;

    while ii < ops.len() {
        let Some(cond_end_idx) = cond_end else {
            match ops[ii].opcode {
                // A jump before the clone means this is some other construct
                Opcode::Jump
                | Opcode::JumpIfFalse
                | Opcode::JumpIfTrue
                | Opcode::JumpIfNotDebug => return Ok(None),
                Opcode::CloneStack => {
                    if ii <= cond_start {
                        return Ok(None);
                    }
                    cond_end = Some(ii - 1);
                }
                _ => {}
            }
            ii += 1;
            continue;
        };

        if ops[ii].opcode == Opcode::CloneStack {
            ii += 1;
            continue;
        }

        if ops[ii].opcode == Opcode::Jump {
            let jump_target = ops[ii].jump_target().unwrap_or(0);
            // A backward jump between the switch start and here is the default label
            if jump_target < ops[ii].offset && jump_target > op_offset {
                cases.push(CaseBlock {
                    starting_offset: jump_target,
                    jump_location: ops[ii].offset,
                    value: None,
                    value_code: None,
                    body: Vec::new(),
                });
                let switch = parse_switch_block(
                    ctx, scope, arena, block, cond_start, cond_end_idx, ii + 1, cases, ops,
                )?;
                return Ok(Some((switch, ii + 1)));
            }
            // This might be the start of a second switch directly below this one
            let switch = parse_switch_block(
                ctx, scope, arena, block, cond_start, cond_end_idx, ii, cases, ops,
            )?;
            return Ok(Some((switch, ii)));
        }

        // Break out if there aren't enough operations left for a case triple
        if ops.len() - ii < 3 {
            if !cases.is_empty() {
                let switch = parse_switch_block(
                    ctx, scope, arena, block, cond_start, cond_end_idx, ii, cases, ops,
                )?;
                return Ok(Some((switch, ii)));
            }
            return Ok(None);
        }

        let value = ops[ii].literal_integer_value();
        let is_triple = value.is_some()
            && ops[ii + 1].opcode == Opcode::Equals
            && ops[ii + 2].opcode == Opcode::JumpIfTrue;

        if !is_triple {
            if !cases.is_empty() {
                let switch = parse_switch_block(
                    ctx, scope, arena, block, cond_start, cond_end_idx, ii, cases, ops,
                )?;
                return Ok(Some((switch, ii)));
            }
            return Ok(None);
        }

        cases.push(CaseBlock {
            starting_offset: ops[ii + 2].jump_target().unwrap_or(0),
            jump_location: ops[ii].offset,
            value,
            value_code: None,
            body: Vec::new(),
        });
        ii += 3;
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn parse_switch_block(
    ctx: &Context,
    scope: &Scope,
    arena: &mut ExprArena,
    block: &BlockContext,
    cond_start: usize,
    cond_end: usize,
    switch_end: usize,
    mut cases: Vec<CaseBlock>,
    ops: &mut Vec<Operation>,
) -> Result<SwitchBlock> {
    let error_offset = ops[cond_start].offset;

    // Parse the scrutinee by appending a synthetic pop so it reduces to a statement
    let mut conditional_ops: Vec<Operation> = ops[cond_start..=cond_end].to_vec();
    conditional_ops.push(Operation {
        offset: 0,
        opcode: Opcode::PopStack,
        data: OperandData::None,
    });

    let max_idx = conditional_ops.len() - 1;
    let conditional_elements =
        parse_operations(ctx, scope, arena, block, &mut conditional_ops, 0, max_idx)?;

    let Some(BlockElement::Statement(conditional)) = conditional_elements.into_iter().next()
    else {
        return Err(structure_error!(
            error_offset,
            "Failed to parse conditional statement for switch at 0x{:08X}",
            error_offset
        ));
    };

    let Some(break_op) = ops.get(switch_end) else {
        return Err(structure_error!(
            error_offset,
            "Failed to locate the end of switch at 0x{:08X}",
            error_offset
        ));
    };
    let break_offset = break_op.offset;

    let case_count = cases.len();
    for ii in 0..case_count {
        let start_idx = offset_to_op_index(cases[ii].starting_offset, ops).ok_or_else(|| {
            structure_error!(
                error_offset,
                "Failed to locate case body for switch at 0x{:08X}",
                error_offset
            )
        })?;

        let end_idx = if ii < case_count - 1 {
            offset_to_op_index(cases[ii + 1].starting_offset, ops).ok_or_else(|| {
                structure_error!(
                    error_offset,
                    "Failed to locate case body for switch at 0x{:08X}",
                    error_offset
                )
            })?
        } else {
            cond_start
        };

        let case_context = BlockContext {
            break_offset: Some(break_offset),
            continue_offset: block.continue_offset,
            in_if_block: false,
        };

        let mut body = parse_operations(ctx, scope, arena, &case_context, ops, start_idx, end_idx - 1)?;

        // The last case carries the implicit break jump of the switch; strip it
        if ii == case_count - 1 {
            if let Some(BlockElement::Statement(last)) = body.last() {
                if arena.node(last.root).operation.opcode == Opcode::Jump {
                    body.pop();
                }
            }
        }

        cases[ii].body = body;
    }

    Ok(SwitchBlock {
        conditional: Some(conditional),
        cases,
    })
}

/// Fold `ops[min_idx..=max_idx]` into block elements.
///
/// # Errors
/// Returns [`crate::Error::Structure`] when a jump cannot be classified or a block
/// construct cannot be matched; the caller abandons the function.
pub(crate) fn parse_operations(
    ctx: &Context,
    scope: &Scope,
    arena: &mut ExprArena,
    block: &BlockContext,
    ops: &mut Vec<Operation>,
    min_idx: usize,
    max_idx: usize,
) -> Result<Vec<BlockElement>> {
    let mut elements: Vec<BlockElement> = Vec::new();
    let mut stack: Vec<NodeId> = Vec::new();

    let mut idx = min_idx;
    while idx <= max_idx {
        // Check for do-while loop
        if let Some(block_end) = is_do_while_loop(idx, max_idx, ops) {
            stack.clear();

            // Change the jump at the end to a pop so the conditional parses as the
            // last statement of the loop body
            let continue_offset = ops[idx].offset;
            let jump_offset = ops[block_end].offset;
            ops[block_end] = Operation {
                offset: jump_offset,
                opcode: Opcode::PopStack,
                data: OperandData::None,
            };

            let loop_context = BlockContext {
                break_offset: ops.get(block_end + 1).map(|op| op.offset),
                continue_offset: Some(continue_offset),
                in_if_block: false,
            };

            let mut loop_body =
                parse_operations(ctx, scope, arena, &loop_context, ops, idx, block_end)?;

            // The last statement of the body is the loop condition
            let Some(BlockElement::Statement(conditional)) = loop_body.pop() else {
                return Err(structure_error!(
                    continue_offset,
                    "Failed to recover do-while conditional at 0x{:08X}",
                    continue_offset
                ));
            };

            elements.push(BlockElement::DoWhile(DoWhileLoop {
                conditional,
                body: loop_body,
            }));

            idx = block_end + 1;
            continue;
        }

        if ops[idx].skipped_in_recovery() {
            idx += 1;
            continue;
        }

        // Create a node for this operation
        let operation = ops[idx].clone();
        let code = if operation.opcode.is_variable() {
            None
        } else {
            render_operation_code(ctx, scope, &operation)
        };
        let node = arena.alloc(operation, code);

        let pop_count = arena.node(node).operation.pop_count(ctx);
        if pop_count > 0 {
            if pop_count > stack.len() {
                // Stack underflow; skip the opcode
                idx += 1;
                continue;
            }
            for _ in 0..pop_count {
                if let Some(child) = stack.pop() {
                    arena.node_mut(node).children.push(child);
                }
            }
        }
        if arena.node(node).operation.push_count() == 1 {
            stack.push(node);
        }

        let mut statement = if stack.is_empty() && arena.should_render(node) {
            Some(Statement { root: node })
        } else {
            None
        };

        // For if/while/for the conditional statement must have just been reduced
        if let Some(conditional) = statement {
            let (conditional_offset, _) = arena.offset_range(conditional.root);

            // Check for if block
            if let Some(block_end) = is_if_block(idx, conditional_offset, ops) {
                let if_context = BlockContext {
                    break_offset: block.break_offset,
                    continue_offset: block.continue_offset,
                    in_if_block: true,
                };

                let mut body =
                    parse_operations(ctx, scope, arena, &if_context, ops, idx + 1, block_end - 1)?;

                let else_jump_target = match body.last() {
                    Some(BlockElement::Statement(last)) if arena.is_else_jump(last.root) => {
                        arena.node(last.root).operation.jump_target()
                    }
                    _ => None,
                };

                if let Some(target) = else_jump_target {
                    let Some(else_end) = offset_to_op_index(target, ops) else {
                        return Err(structure_error!(
                            ops[block_end].offset,
                            "Failed to parse else block at 0x{:08X}",
                            ops[block_end].offset
                        ));
                    };

                    // Remove the implicit jump at the end of the if body
                    body.pop();
                    elements.push(BlockElement::If(IfBlock { conditional, body }));

                    let else_context = BlockContext {
                        break_offset: block.break_offset,
                        continue_offset: block.continue_offset,
                        in_if_block: false,
                    };
                    let else_body = parse_operations(
                        ctx,
                        scope,
                        arena,
                        &else_context,
                        ops,
                        block_end,
                        else_end - 1,
                    )?;
                    elements.push(BlockElement::Else(ElseBlock { body: else_body }));

                    idx = else_end;
                    continue;
                }

                elements.push(BlockElement::If(IfBlock { conditional, body }));
                idx = block_end;
                continue;
            }

            // Check for for/while loop
            if let Some(block_end) = is_for_or_while_loop(idx, conditional_offset, ops) {
                // Clear out the back-jump since it has served its purpose
                ops[block_end - 1].remove();

                let loop_context = BlockContext {
                    break_offset: Some(ops[block_end].offset),
                    continue_offset: Some(conditional_offset),
                    in_if_block: false,
                };

                let mut loop_body =
                    parse_operations(ctx, scope, arena, &loop_context, ops, idx + 1, block_end - 1)?;

                if should_use_for_loop(arena, elements.last(), &conditional, loop_body.last()) {
                    // The previously emitted statement is the init, the body tail the increment
                    let Some(BlockElement::Statement(init)) = elements.pop() else {
                        unreachable!("for-loop promotion requires a preceding statement");
                    };
                    let Some(BlockElement::Statement(increment)) = loop_body.pop() else {
                        unreachable!("for-loop promotion requires a trailing statement");
                    };

                    elements.push(BlockElement::For(ForLoop {
                        init,
                        conditional,
                        increment,
                        body: loop_body,
                    }));
                } else {
                    elements.push(BlockElement::While(WhileLoop {
                        conditional,
                        body: loop_body,
                    }));
                }

                idx = block_end;
                continue;
            }
        }

        // Check for debug block
        if let Some(block_end) = is_debug_block(idx, ops)? {
            let debug_context = BlockContext {
                break_offset: block.break_offset,
                continue_offset: block.continue_offset,
                in_if_block: false,
            };

            let body =
                parse_operations(ctx, scope, arena, &debug_context, ops, idx + 1, block_end - 1)?;
            elements.push(BlockElement::Debug(DebugBlock { body }));

            idx = block_end;
            continue;
        }

        // Check for atomic block
        if let Some(block_end) = is_atomic_block(idx, max_idx, ops)? {
            let atomic_context = BlockContext {
                break_offset: block.break_offset,
                continue_offset: block.continue_offset,
                in_if_block: false,
            };

            let body =
                parse_operations(ctx, scope, arena, &atomic_context, ops, idx + 1, block_end - 1)?;
            elements.push(BlockElement::Atomic(AtomicBlock { body }));

            idx = block_end + 1;
            continue;
        }

        // Check for schedule block
        if let Some(block_end) = is_schedule_block(idx, ops) {
            // Remove the looping jump at the end
            ops[block_end].remove();

            let mut schedule = ScheduleBlock { every: Vec::new() };

            let mut target_idx = idx + 1;
            while let Some(OperandData::ScheduleEvery {
                skip_offset,
                interval,
                ..
            }) = ops.get(target_idx).map(|op| op.data.clone())
            {
                let Some(next_idx) = offset_to_op_index(skip_offset, ops) else {
                    return Err(structure_error!(
                        ops[target_idx].offset,
                        "Failed to locate schedule target 0x{:08X}",
                        skip_offset
                    ));
                };

                let every_context = BlockContext {
                    break_offset: ops.get(block_end + 1).map(|op| op.offset),
                    continue_offset: block.continue_offset,
                    in_if_block: false,
                };
                let body = parse_operations(
                    ctx,
                    scope,
                    arena,
                    &every_context,
                    ops,
                    target_idx + 1,
                    next_idx - 1,
                )?;

                schedule.every.push(ScheduleEveryBlock { interval, body });
                target_idx = next_idx;
            }

            elements.push(BlockElement::Schedule(schedule));

            idx = block_end + 1;
            continue;
        }

        // Check for switch block
        if let Some((switch, block_end)) = is_switch_block(ctx, scope, arena, block, idx, ops)? {
            elements.push(BlockElement::Switch(switch));
            idx = block_end;
            continue;
        }

        // Any remaining jump is a return, break, continue, or else jump
        if arena.node(node).operation.opcode == Opcode::Jump {
            let op_offset = arena.node(node).operation.offset;
            let target = arena.node(node).operation.jump_target().unwrap_or(0);

            if target == scope.function_end_offset {
                if let Some(child) = stack.pop() {
                    let n = arena.node_mut(node);
                    n.children.push(child);
                    n.code = Some("return ".to_string());
                } else {
                    arena.node_mut(node).code = Some("return".to_string());
                }
                statement = Some(Statement { root: node });
            } else if block.break_offset == Some(target) {
                arena.node_mut(node).code = Some("break".to_string());
                statement = Some(Statement { root: node });
            } else if block.continue_offset == Some(target) {
                arena.node_mut(node).code = Some("continue".to_string());
                statement = Some(Statement { root: node });
            } else if block.in_if_block && idx == max_idx && target > op_offset {
                // The jump past the else block; the if detector one level up consumes it
                match statement {
                    Some(s) => arena.flag_as_else_jump(s.root),
                    None => {
                        return Err(structure_error!(
                            op_offset,
                            "Unhandled jump at offset 0x{:08X}", op_offset
                        ))
                    }
                }
            } else {
                return Err(structure_error!(
                    op_offset,
                    "Unhandled jump at offset 0x{:08X}", op_offset
                ));
            }
        }

        if let Some(statement) = statement {
            elements.push(BlockElement::Statement(statement));
        }

        idx += 1;
    }

    Ok(elements)
}

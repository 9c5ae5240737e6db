//! Variables, scopes, and per-variable type resolution.
//!
//! Each stack slot of a function becomes one [`Variable`]. During every inference pass
//! the body walk fills four type-hint sets (assigned, referenced, parameter-assigned,
//! handle-equals); [`Context::resolve_variable_type`] then reconciles them into a
//! concrete type. Hint sets are insertion-ordered so resolution is deterministic.

use crate::{
    decompiler::naming::NameProvider,
    package::{Context, DeclId, VarId, UNKNOWN_TYPE},
};

/// One variable slot within a function scope, or a declaration's return slot.
pub struct Variable {
    /// Stable id, used by the assembly listing.
    pub id: VarId,
    /// Stack slot index within the owning scope; `u32::MAX` for return slots.
    pub stack_index: u32,
    /// Current type name; [`UNKNOWN_TYPE`] until inference resolves it.
    pub type_name: String,
    /// Current display name.
    pub variable_name: String,
    /// Whether the slot is default-initialized by a `VARIABLE_INIT` write.
    pub has_init: bool,
    /// Number of reads observed in the last body pass.
    pub ref_count: u32,
    /// Number of real assignments observed in the last body pass.
    pub assignment_count: u32,
    /// Types of values assigned into this variable.
    pub assigned_types: Vec<String>,
    /// Types expected where this variable is read.
    pub referenced_types: Vec<String>,
    /// Types assigned into this variable when it is a parameter.
    pub parameter_assigned_types: Vec<String>,
    /// Handle types this variable was compared against with `==`/`!=`.
    pub handle_equals_types: Vec<String>,
    /// Candidate name providers, in attachment order.
    pub providers: Vec<NameProvider>,
    /// Index into `providers` of the provider that won naming, once resolved.
    pub name_provider: Option<usize>,
}

fn push_unique(set: &mut Vec<String>, type_name: &str) {
    if !set.iter().any(|t| t == type_name) {
        set.push(type_name.to_string());
    }
}

impl Variable {
    /// Create a variable with the given display name and type.
    #[must_use]
    pub fn new(id: VarId, name: &str, type_name: &str) -> Self {
        Variable {
            id,
            stack_index: u32::MAX,
            type_name: type_name.to_string(),
            variable_name: name.to_string(),
            has_init: false,
            ref_count: 0,
            assignment_count: 0,
            assigned_types: Vec::new(),
            referenced_types: Vec::new(),
            parameter_assigned_types: Vec::new(),
            handle_equals_types: Vec::new(),
            providers: Vec::new(),
            name_provider: None,
        }
    }

    /// Record a type assigned into this variable.
    pub fn add_assigned_type(&mut self, type_name: &str) {
        push_unique(&mut self.assigned_types, type_name);
    }

    /// Record a type assigned into this variable while it acts as a parameter.
    pub fn add_parameter_assigned_type(&mut self, type_name: &str) {
        push_unique(&mut self.parameter_assigned_types, type_name);
    }

    /// Record a type this variable is expected to have where it is read.
    pub fn add_referenced_type(&mut self, type_name: &str) {
        push_unique(&mut self.referenced_types, type_name);
    }

    /// Record a handle type this variable was equality-compared against.
    pub fn add_handle_equals_type(&mut self, type_name: &str) {
        push_unique(&mut self.handle_equals_types, type_name);
    }

    /// Attach a candidate name provider.
    pub fn add_name_provider(&mut self, provider: NameProvider) {
        self.providers.push(provider);
    }

    /// Clear all hint sets and counters ahead of an inference pass.
    pub fn reset_possible_types(&mut self) {
        self.assigned_types.clear();
        self.referenced_types.clear();
        self.parameter_assigned_types.clear();
        self.handle_equals_types.clear();
        self.ref_count = 0;
        self.assignment_count = 0;
    }
}

/// A function's parameter and local variable list with its end offset.
pub struct Scope {
    /// The owning function declaration.
    pub function: DeclId,
    /// Offset of the operation return jumps target.
    pub function_end_offset: u32,
    /// Variables in stack-index order: parameters first, then locals.
    pub variables: Vec<VarId>,
    /// Index of the first local; everything below is a parameter.
    pub local_variable_index_offset: u32,
}

impl Scope {
    /// The variable occupying `stack_index`, if in bounds.
    #[must_use]
    pub fn variable_by_stack_index(&self, stack_index: u32) -> Option<VarId> {
        self.variables.get(stack_index as usize).copied()
    }
}

fn handle_types<'a>(ctx: &Context, types: &'a [String]) -> Vec<&'a str> {
    types
        .iter()
        .filter(|t| ctx.is_handle_type(t))
        .map(String::as_str)
        .collect()
}

fn single_enum_type(ctx: &Context, types: &[String]) -> String {
    let mut found: Vec<&str> = types
        .iter()
        .filter(|t| ctx.is_enum_type(t))
        .map(String::as_str)
        .collect();
    found.dedup();
    if found.len() == 1 {
        found[0].to_string()
    } else {
        UNKNOWN_TYPE.to_string()
    }
}

fn single_collection_type(ctx: &Context, types: &[String]) -> String {
    let mut found: Vec<&str> = types
        .iter()
        .filter(|t| ctx.is_collection_type(t))
        .map(String::as_str)
        .collect();
    found.dedup();
    if found.len() == 1 {
        found[0].to_string()
    } else {
        UNKNOWN_TYPE.to_string()
    }
}

/// Best non-handle type by precedence: enum, collection, string, float, int, bool.
fn best_non_handle_type(ctx: &Context, types: &[String]) -> String {
    let enum_type = single_enum_type(ctx, types);
    if enum_type != UNKNOWN_TYPE {
        return enum_type;
    }

    let collection_type = single_collection_type(ctx, types);
    if collection_type != UNKNOWN_TYPE {
        return collection_type;
    }

    for candidate in ["string", "float", "int", "bool"] {
        if types.iter().any(|t| t == candidate) {
            return candidate.to_string();
        }
    }

    UNKNOWN_TYPE.to_string()
}

/// Reconcile assigned types: handles fold to their highest common ancestor,
/// otherwise the best non-handle type wins.
fn type_from_assigned(ctx: &Context, assigned: &[String]) -> String {
    let handles = handle_types(ctx, assigned);

    if !handles.is_empty() {
        let mut highest = handles[0].to_string();
        for handle in &handles[1..] {
            highest = ctx.highest_common_ancestor(&highest, handle);
            if highest == UNKNOWN_TYPE {
                return UNKNOWN_TYPE.to_string();
            }
        }
        return highest;
    }

    best_non_handle_type(ctx, assigned)
}

/// Reconcile referenced types: handles must form a chain, and the most derived
/// one wins; a branchy set resolves to unknown.
fn type_from_referenced(ctx: &Context, referenced: &[String]) -> String {
    let handles = handle_types(ctx, referenced);

    if !handles.is_empty() {
        let mut highest = UNKNOWN_TYPE.to_string();
        for handle in handles {
            if highest == UNKNOWN_TYPE {
                highest = handle.to_string();
            }
            if ctx.handle_is_derived_from(&highest, handle) {
                continue;
            }
            if ctx.handle_is_derived_from(handle, &highest) {
                highest = handle.to_string();
                continue;
            }
            return UNKNOWN_TYPE.to_string();
        }
        return highest;
    }

    best_non_handle_type(ctx, referenced)
}

impl Context {
    /// Compute and apply the best type for one variable, returning whether the
    /// type changed.
    ///
    /// A handle-equality hint wins outright; then assigned and referenced handle
    /// types are reconciled through the hierarchy; then assigned-only and
    /// referenced-only fallbacks.
    pub fn resolve_variable_type(&mut self, vid: VarId) -> bool {
        let v = self.var(vid);
        let assigned = v.assigned_types.clone();
        let referenced = v.referenced_types.clone();
        let parameter_assigned = v.parameter_assigned_types.clone();
        let handle_equals = v.handle_equals_types.clone();

        let assigned_type = type_from_assigned(self, &assigned);
        let referenced_type = type_from_referenced(self, &referenced);
        let parameter_assigned_type = type_from_assigned(self, &parameter_assigned);

        let mut detected = UNKNOWN_TYPE.to_string();

        if let Some(first) = handle_equals.first() {
            detected = first.clone();
        } else if self.is_handle_type(&assigned_type) && self.is_handle_type(&referenced_type) {
            if referenced_type == assigned_type {
                detected = referenced_type;
            } else if self.handle_is_derived_from(&assigned_type, &referenced_type) {
                detected = assigned_type.clone();
            } else {
                // The referenced type only wins when every assigned type derives from it
                detected = referenced_type.clone();
                for atype in &assigned {
                    if !self.handle_is_derived_from(&referenced_type, atype) {
                        detected = assigned_type.clone();
                        break;
                    }
                }
            }

            if parameter_assigned_type != UNKNOWN_TYPE {
                detected = self.highest_common_ancestor(&detected, &parameter_assigned_type);
            }
        } else if referenced.is_empty() {
            detected = assigned_type;
        } else if referenced_type == "bool"
            && (self.is_handle_type(&assigned_type)
                || assigned_type == "int"
                || assigned_type == "float")
        {
            // Covers `if (handle)` and `if (counter)`: the truth test references a
            // bool but the assigned type is what the variable really is
            detected = assigned_type;
        } else {
            detected = referenced_type;
        }

        if detected != UNKNOWN_TYPE && self.var(vid).type_name != detected {
            self.var_mut(vid).type_name = detected;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{DecompileOptions, EnumType, HandleType};

    fn test_context() -> Context {
        let mut ctx = Context::new(DecompileOptions::default());
        for (name, base) in [("hsim", "hobject"), ("hship", "hsim"), ("hstation", "hsim")] {
            ctx.handles.insert(
                name.to_string(),
                HandleType {
                    base_type: base.to_string(),
                    source_package: "Test".to_string(),
                },
            );
        }
        ctx.enums.insert("eColor".to_string(), EnumType::default());
        ctx
    }

    fn resolve(ctx: &mut Context, build: impl FnOnce(&mut Variable)) -> String {
        let vid = ctx.new_variable("v", UNKNOWN_TYPE);
        build(ctx.var_mut(vid));
        ctx.resolve_variable_type(vid);
        ctx.var(vid).type_name.clone()
    }

    #[test]
    fn test_handle_equals_wins() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("hship");
            v.add_referenced_type("hsim");
            v.add_handle_equals_type("hstation");
        });
        assert_eq!(resolved, "hstation");
    }

    #[test]
    fn test_assigned_beats_referenced_when_derived() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("hship");
            v.add_referenced_type("hsim");
        });
        assert_eq!(resolved, "hship");
    }

    #[test]
    fn test_mixed_assigned_handles_fold_to_ancestor() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("hship");
            v.add_assigned_type("hstation");
        });
        assert_eq!(resolved, "hsim");
    }

    #[test]
    fn test_non_handle_precedence() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("bool");
            v.add_assigned_type("int");
            v.add_assigned_type("float");
        });
        assert_eq!(resolved, "float");

        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("int");
            v.add_assigned_type("eColor");
        });
        assert_eq!(resolved, "eColor");
    }

    #[test]
    fn test_handle_truth_test_keeps_handle() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("hship");
            v.add_referenced_type("bool");
        });
        assert_eq!(resolved, "hship");
    }

    #[test]
    fn test_truth_tested_int_stays_int() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_assigned_type("int");
            v.add_referenced_type("bool");
        });
        assert_eq!(resolved, "int");
    }

    #[test]
    fn test_unresolvable_stays_unknown() {
        let mut ctx = test_context();
        let resolved = resolve(&mut ctx, |v| {
            v.add_referenced_type(UNKNOWN_TYPE);
        });
        assert_eq!(resolved, UNKNOWN_TYPE);
    }

    #[test]
    fn test_reset_clears_hints() {
        let mut ctx = test_context();
        let vid = ctx.new_variable("v", UNKNOWN_TYPE);
        let v = ctx.var_mut(vid);
        v.add_assigned_type("int");
        v.add_referenced_type("int");
        v.ref_count = 3;
        v.reset_possible_types();
        let v = ctx.var(vid);
        assert!(v.assigned_types.is_empty());
        assert!(v.referenced_types.is_empty());
        assert_eq!(v.ref_count, 0);
    }
}

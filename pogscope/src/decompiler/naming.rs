//! Variable name synthesis.
//!
//! Anonymous stack slots get meaningful names from prioritized heuristic providers.
//! Generic providers derive names from a variable's type; assignment-driven providers
//! inspect the right-hand side of the first write (chasing through casts, read-through
//! wrappers, and whitelisted nested calls) and mine call parameters for string literals.
//! The highest-priority provider producing a non-empty name wins; collisions within a
//! scope are resolved deterministically by the winning provider.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    decompiler::graph::{ExprArena, NodeId},
    decompiler::variable::Variable,
    package::{Context, DeclId, FunctionDeclaration, VarId},
    Opcode,
};

/// Convert arbitrary literal text (entity names, template paths) into a valid
/// identifier: whitespace, dashes, and apostrophes are dropped, other non-identifier
/// characters become `_`, the first letter is lower-cased, and a leading digit gets a
/// `_` prefix. `ini:/a/b/c` resource paths collapse to their last segment.
#[must_use]
pub fn convert_to_identifier(name: &str) -> String {
    if name.starts_with("ini:/") {
        return name.rsplit('/').next().unwrap_or_default().to_string();
    }

    let mut result = String::new();
    for c in name.chars() {
        if c.is_whitespace() || c == '-' || c == '\'' {
            continue;
        }
        if result.is_empty() && c.is_ascii_digit() {
            result.push('_');
            result.push(c);
            continue;
        }
        if !c.is_alphanumeric() && c != '_' {
            result.push('_');
            continue;
        }
        if result.is_empty() {
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// `my ship-01` to `MyShip01`: split on non-alphanumerics, capitalize each piece.
#[must_use]
pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::new();
    let mut upper_next = true;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            upper_next = true;
            continue;
        }
        if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Package/function pair of regular expressions; both must match (unanchored, like
/// the engine's own tooling).
pub struct FuncMatcher {
    package: Regex,
    function: Regex,
}

impl FuncMatcher {
    fn new(package: &str, function: &str) -> Self {
        FuncMatcher {
            package: Regex::new(package).unwrap(),
            function: Regex::new(function).unwrap(),
        }
    }

    fn matches(&self, decl: &FunctionDeclaration) -> bool {
        self.package.is_match(&decl.package) && self.function.is_match(&decl.name)
    }
}

type FilterFn = fn(&Context, &Variable) -> bool;
type SingleNameFn = fn(&Context, &Variable, &FunctionDeclaration) -> String;
type ParamNameFn = fn(&str) -> String;

/// How an assignment-driven rule extracts a name.
enum RuleKind {
    /// Int/float variables assigned exactly once are constants.
    Constant,
    /// `Global.Int("name")` style registry reads carry the name literally.
    Global,
    /// The presence of a matching call names the variable.
    Single {
        function: FuncMatcher,
        nested: Option<FuncMatcher>,
        filter: Option<FilterFn>,
        name: SingleNameFn,
    },
    /// A string-literal argument of a matching call names the variable.
    Parameter {
        function: FuncMatcher,
        nested: Option<FuncMatcher>,
        parameter: Option<Regex>,
        name: Option<ParamNameFn>,
    },
    /// Like `Parameter`, but the argument literal sits inside a required nested
    /// call chain.
    Chain {
        chain: Vec<FuncMatcher>,
        nested: Option<FuncMatcher>,
        parameter: Option<Regex>,
        name: ParamNameFn,
    },
}

/// One assignment-driven naming rule.
pub struct AssignmentRule {
    kind: RuleKind,
    priority: i32,
}

fn fixed(name: &'static str) -> SingleNameFn {
    // A separate fn per fixed name keeps the rule table to plain function pointers
    match name {
        "playerShip" => |_, _, _| "playerShip".to_string(),
        "distance" => |_, _, _| "distance".to_string(),
        "name" => |_, _, _| "name".to_string(),
        "taskState" => |_, _, _| "taskState".to_string(),
        "screenClass" => |_, _, _| "screenClass".to_string(),
        "groupLeader" => |_, _, _| "groupLeader".to_string(),
        "waypoint" => |_, _, _| "waypoint".to_string(),
        "groupIter" => |_, _, _| "groupIter".to_string(),
        "lagrangePoints" => |_, _, _| "lagrangePoints".to_string(),
        "random" => |_, _, _| "random".to_string(),
        "convoResponse" => |_, _, _| "convoResponse".to_string(),
        "currentTask" => |_, _, _| "currentTask".to_string(),
        _ => |_, _, _| String::new(),
    }
}

fn no_nesting() -> Option<FuncMatcher> {
    Some(FuncMatcher::new("none", "none"))
}

/// The rules attached to a variable on its first inspected write, in attachment order.
static ASSIGNMENT_RULES: LazyLock<Vec<AssignmentRule>> = LazyLock::new(|| {
    vec![
        AssignmentRule {
            kind: RuleKind::Constant,
            priority: 10,
        },
        AssignmentRule {
            kind: RuleKind::Global,
            priority: 100,
        },
        // Find provider
        AssignmentRule {
            kind: RuleKind::Parameter {
                function: FuncMatcher::new(".*", "Find"),
                nested: None,
                parameter: None,
                name: None,
            },
            priority: 100,
        },
        // Create Ship provider
        AssignmentRule {
            kind: RuleKind::Parameter {
                function: FuncMatcher::new("iShip", "Create"),
                nested: None,
                parameter: Some(Regex::new("template").unwrap()),
                name: Some(|value| format!("ship{}", to_pascal_case(value))),
            },
            priority: 1000,
        },
        // Create Sim provider
        AssignmentRule {
            kind: RuleKind::Parameter {
                function: FuncMatcher::new("Sim", "Create"),
                nested: None,
                parameter: Some(Regex::new("template").unwrap()),
                name: Some(|value| format!("sim{}", to_pascal_case(value))),
            },
            priority: 1000,
        },
        // Player Ship provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("iShip", "FindPlayerShip"),
                nested: None,
                filter: None,
                name: fixed("playerShip"),
            },
            priority: 1000,
        },
        // Distance provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", ".*Distance.*"),
                nested: None,
                filter: None,
                name: fixed("distance"),
            },
            priority: 100,
        },
        // Count provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", ".*Count[^a-z]?.*"),
                nested: None,
                filter: None,
                name: |_, _, fd| convert_to_identifier(&fd.name),
            },
            priority: 100,
        },
        // Name provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", ".*Name[^a-z]?.*"),
                nested: None,
                filter: Some(|_, v| v.type_name == "string"),
                name: fixed("name"),
            },
            priority: 100,
        },
        // Object Property provider
        AssignmentRule {
            kind: RuleKind::Parameter {
                function: FuncMatcher::new("Object", ".*Property"),
                nested: None,
                parameter: Some(Regex::new("property").unwrap()),
                name: None,
            },
            priority: 200,
        },
        // Task State provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("State", "Find"),
                nested: None,
                filter: None,
                name: fixed("taskState"),
            },
            priority: 300,
        },
        // Screen Class provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("GUI", "CurrentScreenClassname"),
                nested: None,
                filter: None,
                name: fixed("screenClass"),
            },
            priority: 300,
        },
        // Group Leader provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("Group", "Leader"),
                nested: None,
                filter: None,
                name: fixed("groupLeader"),
            },
            priority: 300,
        },
        // Waypoint provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", ".*Waypoint[^a-z]?.*"),
                nested: no_nesting(),
                filter: None,
                name: fixed("waypoint"),
            },
            priority: 50,
        },
        // Named Waypoint provider
        AssignmentRule {
            kind: RuleKind::Chain {
                chain: vec![
                    FuncMatcher::new(".*", "CreateWaypointRelativeTo|WaypointForEntity"),
                    FuncMatcher::new("iMapEntity", "FindByName"),
                ],
                nested: None,
                parameter: None,
                name: |value| format!("waypoint{}", to_pascal_case(value)),
            },
            priority: 1000,
        },
        // Group Iter provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("Group", "NthSim"),
                nested: no_nesting(),
                filter: None,
                name: fixed("groupIter"),
            },
            priority: 50,
        },
        // Lagrange Points provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("iMapEntity", "SystemLagrangePoints"),
                nested: no_nesting(),
                filter: None,
                name: fixed("lagrangePoints"),
            },
            priority: 100,
        },
        // Random provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("Math", "Random.*"),
                nested: no_nesting(),
                filter: None,
                name: fixed("random"),
            },
            priority: 100,
        },
        // Target provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", ".*Target[^a-z]?.*"),
                nested: no_nesting(),
                filter: Some(|ctx, v| ctx.is_handle_type(&v.type_name)),
                name: |_, _, fd| convert_to_identifier(&fd.name),
            },
            priority: 50,
        },
        // Conversation Ask provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("iConversation", "Ask"),
                nested: no_nesting(),
                filter: Some(|ctx, v| v.type_name == "int" || ctx.is_enum_type(&v.type_name)),
                name: fixed("convoResponse"),
            },
            priority: 50,
        },
        // Current Task provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new("Task", "Current"),
                nested: no_nesting(),
                filter: None,
                name: fixed("currentTask"),
            },
            priority: 100,
        },
        // Cast provider
        AssignmentRule {
            kind: RuleKind::Single {
                function: FuncMatcher::new(".*", "Cast"),
                nested: no_nesting(),
                filter: None,
                name: |_, _, fd| {
                    let pkg = fd.package.strip_prefix('i').unwrap_or(&fd.package);
                    if EXCLUDED_HANDLE_TYPES.contains(&pkg.to_lowercase().as_str()) {
                        String::new()
                    } else {
                        convert_to_identifier(pkg)
                    }
                },
            },
            priority: 50,
        },
    ]
});

/// The rule attached when a variable is passed *as* the `property` argument of an
/// `Object.Add*Property` call.
static PROPERTY_PARAMETER_RULE: LazyLock<AssignmentRule> = LazyLock::new(|| AssignmentRule {
    kind: RuleKind::Parameter {
        function: FuncMatcher::new("Object", "Add.*Property"),
        nested: no_nesting(),
        parameter: Some(Regex::new("property").unwrap()),
        name: None,
    },
    priority: 1000,
});

static DEFAULT_NESTED: LazyLock<FuncMatcher> = LazyLock::new(|| FuncMatcher::new(".*", "Cast"));
static DEFAULT_PARAMETER: LazyLock<Regex> = LazyLock::new(|| Regex::new("name").unwrap());

const EXCLUDED_HANDLE_TYPES: [&str; 4] = ["task", "sim", "isim", "object"];

const ITERATOR_NAMES: [&str; 5] = ["ii", "jj", "kk", "mm", "oo"];

/// A candidate name source attached to one variable.
pub enum NameProvider {
    /// Name after the handle type (`hShip` suggests `ship`).
    HandleType {
        /// The handle type the suggestion is derived from.
        handle_type: String,
    },
    /// Name after the enum type (`eColor` suggests `color`).
    EnumType,
    /// `localList` / `localSet` for collection-typed variables.
    CollectionType,
    /// `ii` (then `jj`, `kk`, ...) for a for-loop induction variable.
    Iterator,
    /// An assignment- or parameter-driven rule, anchored at the inspected call.
    Assignment {
        /// The rule to apply.
        rule: &'static AssignmentRule,
        /// The right-hand side (or enclosing call) the rule inspects.
        func_call: NodeId,
    },
}

impl NameProvider {
    /// Selection priority; higher wins, ties go to the earliest-attached provider.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            NameProvider::HandleType { .. } | NameProvider::CollectionType => 10,
            NameProvider::EnumType => 100,
            NameProvider::Iterator => 1000,
            NameProvider::Assignment { rule, .. } => rule.priority,
        }
    }

    /// Propose a name, or empty when the provider does not apply.
    #[must_use]
    pub fn name(&self, ctx: &Context, arena: &ExprArena, v: &Variable) -> String {
        match self {
            NameProvider::HandleType { handle_type } => {
                let stripped = handle_type.strip_prefix('h').unwrap_or(handle_type);
                let lowered = stripped.to_lowercase();
                if lowered == "task" {
                    return "taskHandle".to_string();
                }
                if EXCLUDED_HANDLE_TYPES.contains(&lowered.as_str()) {
                    return String::new();
                }
                convert_to_identifier(stripped)
            }
            NameProvider::EnumType => {
                if ctx.is_enum_type(&v.type_name) {
                    let stripped = v.type_name.strip_prefix('e').unwrap_or(&v.type_name);
                    convert_to_identifier(stripped)
                } else {
                    String::new()
                }
            }
            NameProvider::CollectionType => {
                if ctx.is_collection_type(&v.type_name) {
                    format!("local{}", to_pascal_case(&v.type_name))
                } else {
                    String::new()
                }
            }
            NameProvider::Iterator => ITERATOR_NAMES[0].to_string(),
            NameProvider::Assignment { rule, func_call } => {
                rule.name(ctx, arena, v, *func_call)
            }
        }
    }

    /// Disambiguate after a collision; `index` is this variable's position among the
    /// tied set.
    #[must_use]
    pub fn resolve_conflict(&self, v: &Variable, index: usize) -> String {
        match self {
            NameProvider::Iterator => {
                let name_idx = index % ITERATOR_NAMES.len();
                let suffix = index / ITERATOR_NAMES.len();
                if suffix > 0 {
                    format!("{}_{suffix}", ITERATOR_NAMES[name_idx])
                } else {
                    ITERATOR_NAMES[name_idx].to_string()
                }
            }
            _ => format!("{}_{index}", v.variable_name),
        }
    }
}

impl AssignmentRule {
    fn name(&self, ctx: &Context, arena: &ExprArena, v: &Variable, func_call: NodeId) -> String {
        match &self.kind {
            RuleKind::Constant => match v.type_name.as_str() {
                "int" | "float" if v.assignment_count == 1 => "constant".to_string(),
                _ => String::new(),
            },
            RuleKind::Global => global_registry_name(ctx, arena, func_call),
            RuleKind::Single {
                function,
                nested,
                filter,
                name,
            } => {
                if filter.is_some_and(|f| !f(ctx, v)) {
                    return String::new();
                }
                let nested = nested.as_ref().unwrap_or(&*DEFAULT_NESTED);
                match op_calls_function(ctx, arena, func_call, function, nested) {
                    Some(decl) => name(ctx, v, ctx.decl(decl)),
                    None => String::new(),
                }
            }
            RuleKind::Parameter {
                function,
                nested,
                parameter,
                name,
            } => {
                let nested = nested.as_ref().unwrap_or(&*DEFAULT_NESTED);
                let parameter = parameter.as_ref().unwrap_or(&*DEFAULT_PARAMETER);
                let Some((value, _)) =
                    name_from_function_parameter(ctx, arena, func_call, function, nested, parameter)
                else {
                    return String::new();
                };
                match name {
                    Some(name) => name(&value),
                    None => value,
                }
            }
            RuleKind::Chain {
                chain,
                nested,
                parameter,
                name,
            } => {
                let nested = nested.as_ref().unwrap_or(&*DEFAULT_NESTED);
                let parameter = parameter.as_ref().unwrap_or(&*DEFAULT_PARAMETER);
                let Some((value, _)) = name_from_function_chain_parameter(
                    ctx, arena, func_call, chain, nested, parameter,
                ) else {
                    return String::new();
                };
                name(&value)
            }
        }
    }
}

fn step_allowed(opcode: Opcode) -> bool {
    opcode.is_function_call() || opcode == Opcode::Unknown3B || opcode.is_cast()
}

/// The identifier behind a `UNKNOWN_3B(LITERAL_STRING)` argument subtree, if that is
/// what `id` is.
fn literal_string_identifier(ctx: &Context, arena: &ExprArena, id: NodeId) -> Option<String> {
    let node = arena.node(id);
    if node.operation.opcode != Opcode::Unknown3B {
        return None;
    }
    let &child = node.children.first()?;
    let child_op = &arena.node(child).operation;
    if child_op.opcode != Opcode::LiteralString {
        return None;
    }
    let crate::assembly::OperandData::LiteralString { index } = child_op.data else {
        return None;
    };
    Some(convert_to_identifier(ctx.string(index)?))
}

/// Walk an assignment chain looking for a call matching `target`, passing through
/// casts, read-through wrappers, and calls allowed by `nested`.
fn op_calls_function(
    ctx: &Context,
    arena: &ExprArena,
    start: NodeId,
    target: &FuncMatcher,
    nested: &FuncMatcher,
) -> Option<DeclId> {
    let mut node = start;
    loop {
        let opcode = arena.node(node).operation.opcode;
        if !step_allowed(opcode) {
            return None;
        }

        if opcode.is_function_call() {
            let decl_id = arena.node(node).operation.call_target()?;
            let decl = ctx.decl(decl_id);
            if target.matches(decl) {
                return Some(decl_id);
            }
            if !nested.matches(decl) || arena.node(node).children.is_empty() {
                return None;
            }
        }

        // Step into the first source-order argument (the last child)
        node = *arena.node(node).children.last()?;
    }
}

fn name_from_function_parameter(
    ctx: &Context,
    arena: &ExprArena,
    start: NodeId,
    target: &FuncMatcher,
    nested: &FuncMatcher,
    parameter: &Regex,
) -> Option<(String, DeclId)> {
    let mut node = start;
    loop {
        let opcode = arena.node(node).operation.opcode;
        if !step_allowed(opcode) || arena.node(node).children.is_empty() {
            return None;
        }

        if opcode.is_function_call() {
            let decl_id = arena.node(node).operation.call_target()?;
            let decl = ctx.decl(decl_id);
            if target.matches(decl) {
                if let Some(parameter_idx) = decl.find_parameter(parameter) {
                    if let Some(argument) = arena.function_parameter_child(node, parameter_idx) {
                        if let Some(value) = literal_string_identifier(ctx, arena, argument) {
                            return Some((value, decl_id));
                        }
                    }
                }
            } else if !nested.matches(decl) {
                return None;
            }
        }

        node = *arena.node(node).children.last()?;
    }
}

fn name_from_function_chain_parameter(
    ctx: &Context,
    arena: &ExprArena,
    start: NodeId,
    chain: &[FuncMatcher],
    nested: &FuncMatcher,
    parameter: &Regex,
) -> Option<(String, DeclId)> {
    let mut chain_idx = 0;
    let mut node = start;
    loop {
        let opcode = arena.node(node).operation.opcode;
        if !step_allowed(opcode) || arena.node(node).children.is_empty() {
            return None;
        }

        if opcode.is_function_call() {
            let decl_id = arena.node(node).operation.call_target()?;
            let decl = ctx.decl(decl_id);
            if chain[chain_idx].matches(decl) {
                if chain_idx == chain.len() - 1 {
                    let parameter_idx = decl.find_parameter(parameter)?;
                    let argument = arena.function_parameter_child(node, parameter_idx)?;
                    let value = literal_string_identifier(ctx, arena, argument)?;
                    return Some((value, decl_id));
                }
                chain_idx += 1;
            } else if chain_idx != 0 {
                return None;
            } else if !nested.matches(decl) {
                return None;
            }
        }

        node = *arena.node(node).children.last()?;
    }
}

/// Chase `Global.{Int,Float,Bool,String,Handle,List,Set}("literal")` chains.
fn global_registry_name(ctx: &Context, arena: &ExprArena, start: NodeId) -> String {
    let mut node = start;
    loop {
        let op = &arena.node(node).operation;
        if !op.opcode.is_function_call() || arena.node(node).children.is_empty() {
            return String::new();
        }
        let Some(decl_id) = op.call_target() else {
            return String::new();
        };
        let decl = ctx.decl(decl_id);
        let Some(&last_argument) = arena.node(node).children.first() else {
            return String::new();
        };

        if decl.package == "Global"
            && matches!(
                decl.name.as_str(),
                "Int" | "Float" | "Bool" | "String" | "Handle" | "List" | "Set"
            )
        {
            if let Some(value) = literal_string_identifier(ctx, arena, last_argument) {
                return value;
            }
        }

        node = last_argument;
    }
}

/// Attach the full assignment-driven rule set, anchored at `assignment` (the RHS of
/// the first inspected write into `vid`).
pub(crate) fn add_assignment_based_providers(ctx: &mut Context, vid: VarId, assignment: NodeId) {
    for rule in ASSIGNMENT_RULES.iter() {
        ctx.var_mut(vid).add_name_provider(NameProvider::Assignment {
            rule,
            func_call: assignment,
        });
    }
}

/// Attach the property-argument rule when `vid` is passed as the `property` argument
/// of the surrounding call.
pub(crate) fn add_parameter_passing_providers(
    ctx: &mut Context,
    arena: &ExprArena,
    vid: VarId,
    func_call: NodeId,
) {
    let Some(decl_id) = arena.node(func_call).operation.call_target() else {
        return;
    };

    let stack_index = ctx.var(vid).stack_index;
    let children = &arena.node(func_call).children;

    let is_property_argument = {
        let decl = ctx.decl(decl_id);
        let Some(params) = decl.parameters.as_ref() else {
            return;
        };
        let mut var_parameter = None;
        for (idx, &child) in children.iter().enumerate() {
            if arena.node(child).operation.variable_index() == Some(stack_index) {
                var_parameter = params.get(children.len() - 1 - idx);
            }
        }
        var_parameter.is_some_and(|p| p.name == "property")
    };

    if is_property_argument {
        ctx.var_mut(vid).add_name_provider(NameProvider::Assignment {
            rule: &*PROPERTY_PARAMETER_RULE,
            func_call,
        });
    }
}

/// Pick the winning provider for a variable and apply its name. Returns whether a
/// name was assigned.
pub(crate) fn resolve_variable_name(ctx: &mut Context, arena: &ExprArena, vid: VarId) -> bool {
    let best = {
        let v = ctx.var(vid);
        let mut best: Option<(usize, i32, String)> = None;
        for (ii, provider) in v.providers.iter().enumerate() {
            let name = provider.name(ctx, arena, v);
            if name.is_empty() {
                continue;
            }
            let priority = provider.priority();
            if best.as_ref().is_none_or(|(_, highest, _)| priority > *highest) {
                best = Some((ii, priority, name));
            }
        }
        best
    };

    let Some((winner, _, name)) = best else {
        return false;
    };
    let v = ctx.var_mut(vid);
    v.name_provider = Some(winner);
    v.variable_name = name;
    true
}

/// Re-run the winning provider's conflict resolution for a collided variable.
pub(crate) fn resolve_naming_conflict(ctx: &mut Context, vid: VarId, index: usize) {
    let Some(provider_idx) = ctx.var(vid).name_provider else {
        return;
    };
    let new_name = {
        let v = ctx.var(vid);
        v.providers[provider_idx].resolve_conflict(v, index)
    };
    ctx.var_mut(vid).variable_name = new_name;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_to_identifier() {
        assert_eq!(convert_to_identifier("Enterprise"), "enterprise");
        assert_eq!(convert_to_identifier("My Ship"), "myShip");
        assert_eq!(convert_to_identifier("red-5's wing"), "red5swing");
        assert_eq!(convert_to_identifier("a.b/c"), "a_b_c");
        assert_eq!(convert_to_identifier("9lives"), "_9lives");
        assert_eq!(convert_to_identifier("ini:/ships/fighters/Raptor"), "Raptor");
    }

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("transport"), "Transport");
        assert_eq!(to_pascal_case("my ship-01"), "MyShip01");
        assert_eq!(to_pascal_case("already_Pascal"), "AlreadyPascal");
        assert_eq!(to_pascal_case(""), "");
    }

    #[test]
    fn test_iterator_conflict_rotation() {
        let provider = NameProvider::Iterator;
        let v = Variable::new(crate::package::VarId(0), "ii", "int");
        assert_eq!(provider.resolve_conflict(&v, 0), "ii");
        assert_eq!(provider.resolve_conflict(&v, 1), "jj");
        assert_eq!(provider.resolve_conflict(&v, 4), "oo");
        assert_eq!(provider.resolve_conflict(&v, 5), "ii_1");
        assert_eq!(provider.resolve_conflict(&v, 11), "jj_2");
    }

    #[test]
    fn test_simple_conflict_suffix() {
        let provider = NameProvider::EnumType;
        let mut v = Variable::new(crate::package::VarId(0), "x", "int");
        v.variable_name = "color".to_string();
        assert_eq!(provider.resolve_conflict(&v, 2), "color_2");
    }

    #[test]
    fn test_handle_type_provider_names() {
        let ctx = Context::new(crate::package::DecompileOptions::default());
        let arena = ExprArena::new();
        let v = Variable::new(crate::package::VarId(0), "v", "hShip");

        let ship = NameProvider::HandleType {
            handle_type: "hShip".to_string(),
        };
        assert_eq!(ship.name(&ctx, &arena, &v), "ship");

        // task maps to its override, the excluded types to nothing
        let task = NameProvider::HandleType {
            handle_type: "htask".to_string(),
        };
        assert_eq!(task.name(&ctx, &arena, &v), "taskHandle");

        let sim = NameProvider::HandleType {
            handle_type: "hSim".to_string(),
        };
        assert_eq!(sim.name(&ctx, &arena, &v), "");
    }
}

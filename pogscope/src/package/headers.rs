//! Package header ingestion.
//!
//! Walks an includes directory and parses each `.h` file for the four things a header
//! can contribute: `handle T : Base;` declarations, `uses A, B;` dependency lists,
//! `enum Name { ... }` definitions, and `prototype [Ret] Pkg.Name(...);` function
//! signatures. Prototypes freeze type inference for the functions they describe.
//!
//! Malformed entries are dropped with a warning; a bad header never aborts the job.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::{debug, warn};
use regex::Regex;

use crate::{
    package::{Context, DeclId, EnumType, FunctionParameter, HandleType, PackageInfo},
    Result,
};

const PROTOTYPE_PREFIX: &str = "prototype";

static LINE_COMMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new("//.*\n").unwrap());
static BLOCK_COMMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\*.*\*/").unwrap());
static HANDLE_DECLS: LazyLock<Regex> = LazyLock::new(|| Regex::new("handle[^:]*:[^;]*;").unwrap());
static USES_DECLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\suses[^;]*;").unwrap());
static ENUM_DECLS: LazyLock<Regex> = LazyLock::new(|| Regex::new("enum[^}]*}").unwrap());

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Load every `.h` file under `include_dir` into the context.
///
/// Files are visited in sorted order so repeated runs register packages and
/// declarations identically.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the directory cannot be read. Individual
/// unreadable or malformed files are skipped with a diagnostic.
pub fn load_headers(ctx: &mut Context, include_dir: &Path) -> Result<()> {
    let mut headers = Vec::new();
    collect_headers(include_dir, &mut headers)?;
    headers.sort();

    for path in headers {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(error) => {
                warn!("Failed to read header {}: {error}", path.display());
                continue;
            }
        };

        let package_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        parse_header_source(ctx, &package_name, &contents);
    }

    Ok(())
}

fn collect_headers(dir: &Path, headers: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_headers(&path, headers)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("h"))
        {
            headers.push(path);
        }
    }
    Ok(())
}

/// Parse one header's contents into the context, registering the package under the
/// lower-cased file stem.
pub fn parse_header_source(ctx: &mut Context, package_name: &str, contents: &str) {
    let mut package = PackageInfo {
        name: package_name.to_string(),
        functions: Vec::new(),
        dependencies: Some(Default::default()),
        handles: Default::default(),
        enums: Default::default(),
    };

    let contents = strip_comments(contents);

    parse_package_handles(ctx, &contents, &mut package);
    parse_package_dependencies(&contents, &mut package);
    parse_package_enums(ctx, &contents, &mut package);

    for prototype in scan_prototypes(&contents) {
        if let Some(decl) = add_declaration_from_prototype(ctx, &prototype) {
            // Prototypes carry the canonical package casing
            let pkg = ctx.decl(decl).package.clone();
            if !pkg.is_empty() {
                package.name = pkg;
            }
            package.functions.push(decl);
        }
    }

    ctx.packages.insert(package_name.to_lowercase(), package);
}

fn strip_comments(contents: &str) -> String {
    let without_lines = LINE_COMMENTS.replace_all(contents, "");
    BLOCK_COMMENTS.replace_all(&without_lines, "").into_owned()
}

fn parse_package_handles(ctx: &mut Context, contents: &str, package: &mut PackageInfo) {
    for found in HANDLE_DECLS.find_iter(contents) {
        let decl = &found.as_str()["handle".len()..found.as_str().len() - 1];
        let Some((type_name, base_type)) = decl.split_once(':') else {
            continue;
        };
        let type_name = type_name.trim();
        let base_type = base_type.trim();

        if !is_valid_identifier(type_name) || !is_valid_identifier(base_type) {
            warn!(
                "Failed to parse package {} handle definition '{}', invalid identifier",
                package.name,
                found.as_str()
            );
            continue;
        }

        ctx.handles.insert(
            type_name.to_string(),
            HandleType {
                base_type: base_type.to_string(),
                source_package: package.name.clone(),
            },
        );
        package.handles.insert(type_name.to_string());
    }
}

fn parse_package_dependencies(contents: &str, package: &mut PackageInfo) {
    let mut found_any = false;

    for found in USES_DECLS.find_iter(contents) {
        found_any = true;
        let list = found
            .as_str()
            .trim_start()
            .trim_start_matches("uses")
            .trim_end_matches(';');

        for dep in list.split(',') {
            let dep = dep.trim();
            if !is_valid_identifier(dep) {
                warn!(
                    "Failed to parse package {} dependency list '{}', invalid identifier {dep}",
                    package.name,
                    found.as_str().trim()
                );
                continue;
            }
            if let Some(deps) = package.dependencies.as_mut() {
                deps.insert(dep.to_string());
            }
        }
    }

    // Without explicit uses statements the dependencies are inferred later from the
    // handle types this package declares and consumes.
    if !found_any {
        package.dependencies = None;
    }
}

fn parse_package_enums(ctx: &mut Context, contents: &str, package: &mut PackageInfo) {
    for found in ENUM_DECLS.find_iter(contents) {
        let body = found
            .as_str()
            .trim_start_matches("enum")
            .trim_end_matches('}');

        let Some((name_part, members_part)) = body.split_once('{') else {
            warn!("Enum name missing for enum in package {} header", package.name);
            continue;
        };

        let enum_name = name_part.trim();
        if enum_name.is_empty() {
            warn!("Enum name missing for enum in package {} header", package.name);
            continue;
        }
        if !is_valid_identifier(enum_name) {
            warn!("Invalid enum name {enum_name} in package {} header", package.name);
            continue;
        }

        let Some(enum_data) = parse_enum_members(enum_name, members_part) else {
            continue;
        };

        ctx.enums.insert(enum_name.to_string(), enum_data);
        package.enums.insert(enum_name.to_string());
    }
}

fn parse_enum_members(enum_name: &str, members_part: &str) -> Option<EnumType> {
    let mut enum_data = EnumType::default();
    let mut next_value: u32 = 0;

    for member in members_part.split(',') {
        let (name, value) = match member.split_once('=') {
            Some((name, expr)) => {
                let name = name.trim();
                let Some(value) = parse_enum_expr(&enum_data, expr.trim()) else {
                    warn!(
                        "Failed to parse value for enum {enum_name} member {name}: {}",
                        expr.trim()
                    );
                    return None;
                };
                (name, value)
            }
            None => (member.trim(), next_value),
        };

        if !is_valid_identifier(name) {
            warn!("Invalid identifier for enum {enum_name} member {name}");
            return None;
        }

        enum_data.name_to_value.insert(name.to_string(), value);
        enum_data.value_to_name.entry(value).or_insert_with(|| name.to_string());
        next_value = value.wrapping_add(1);
    }

    Some(enum_data)
}

/// A member value expression: a decimal or `0x` integer, a previously defined member
/// name, or a `A|B|...` bitwise OR of defined members.
fn parse_enum_expr(enum_data: &EnumType, expr: &str) -> Option<u32> {
    if expr.contains('|') {
        let mut value = 0u32;
        for name in expr.split('|') {
            value |= *enum_data.name_to_value.get(name.trim())?;
        }
        return Some(value);
    }

    if let Some(hex) = expr.strip_prefix("0x").or_else(|| expr.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }

    if expr.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-') {
        return expr
            .parse::<i64>()
            .ok()
            .map(|v| u32::try_from(v).unwrap_or(v as u32));
    }

    enum_data.name_to_value.get(expr).copied()
}

fn scan_prototypes(contents: &str) -> Vec<String> {
    let mut prototypes = Vec::new();
    let mut rest = contents;

    while let Some(start) = rest.find(PROTOTYPE_PREFIX) {
        let after = &rest[start..];
        let Some(end) = after.find(';') else {
            break;
        };

        let prototype: String = after[..end]
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        prototypes.push(prototype);

        rest = &after[end + 1..];
    }

    prototypes
}

/// Parse a `prototype [ReturnType ]Pkg.Name( [ref] T1 n1, ... )` declaration and
/// register it with type inference frozen.
///
/// Returns `None` (with a diagnostic) for malformed prototypes; `ref` qualifiers are
/// stripped, and a missing return type means void.
pub fn add_declaration_from_prototype(ctx: &mut Context, prototype: &str) -> Option<DeclId> {
    let Some(function) = prototype.strip_prefix(PROTOTYPE_PREFIX) else {
        warn!("Invalid function prototype: {prototype}");
        return None;
    };
    let function = function.trim();

    let Some((header, parameter_list)) = function.split_once('(') else {
        warn!("Invalid function prototype: {prototype}");
        return None;
    };
    let Some(parameter_list) = parameter_list.trim().strip_suffix(')') else {
        warn!("Invalid function prototype: {prototype}");
        return None;
    };
    let parameter_list = parameter_list.trim();

    let fields: Vec<&str> = header.split_whitespace().collect();
    let (return_type, scoped_name) = match fields.as_slice() {
        [name] => ("", *name),
        [return_type, name] => (*return_type, *name),
        _ => {
            warn!("Invalid function prototype: {prototype}");
            return None;
        }
    };

    let Some((pkg, name)) = scoped_name.split_once('.') else {
        debug!("Skipping non-scoped prototype: {prototype}");
        return None;
    };
    let pkg = pkg.trim();
    let name = name.trim();

    let mut parameters = Vec::new();
    if !parameter_list.is_empty() {
        for param in parameter_list.split(',') {
            let mut fields: Vec<&str> = param.split_whitespace().collect();
            if fields.first() == Some(&"ref") {
                fields.remove(0);
            }
            let [type_name, parameter_name] = fields.as_slice() else {
                warn!("Invalid function prototype: {prototype}");
                return None;
            };
            parameters.push(FunctionParameter {
                type_name: (*type_name).to_string(),
                name: (*parameter_name).to_string(),
                variable: None,
            });
        }
    }

    let return_info = ctx.new_variable("", return_type);
    let id = DeclId(u32::try_from(ctx.declarations.len()).unwrap_or(u32::MAX));
    ctx.declarations.push(crate::package::FunctionDeclaration {
        package: pkg.to_string(),
        name: name.to_string(),
        parameters: Some(parameters),
        auto_detect_types: false,
        return_info,
    });
    ctx.declaration_index.insert(format!("{pkg}.{name}"), id);

    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DecompileOptions;

    fn parse(contents: &str) -> Context {
        let mut ctx = Context::new(DecompileOptions::default());
        parse_header_source(&mut ctx, "iShip", contents);
        ctx
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("hShip"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("name2"));
        assert!(!is_valid_identifier("2name"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("dash-ed"));
    }

    #[test]
    fn test_parse_handles() {
        let ctx = parse("handle hShip : hSim;\nhandle hFleet:hObject;\n");
        assert!(ctx.is_handle_type("hShip"));
        assert!(ctx.is_handle_type("hFleet"));
        assert_eq!(ctx.handles["hShip"].base_type, "hSim");
        assert_eq!(ctx.handles["hShip"].source_package, "iShip");
    }

    #[test]
    fn test_parse_uses() {
        let ctx = parse("\nuses Sim, iFleet,\n     Debug;\n");
        let package = &ctx.packages["iship"];
        assert!(package.depends_on("Sim"));
        assert!(package.depends_on("iFleet"));
        assert!(package.depends_on("Debug"));
        assert!(!package.depends_on("GUI"));
    }

    #[test]
    fn test_missing_uses_means_inferred() {
        let ctx = parse("handle hShip : hSim;\n");
        assert!(ctx.packages["iship"].dependencies.is_none());
    }

    #[test]
    fn test_parse_enum_values() {
        let ctx = parse(
            "enum eState\n{\n\tidle,\n\tmoving = 5,\n\tdocked,\n\tmask = 0x10,\n\tall = moving|mask\n}\n",
        );
        let data = &ctx.enums["eState"];
        assert_eq!(data.name_to_value["idle"], 0);
        assert_eq!(data.name_to_value["moving"], 5);
        assert_eq!(data.name_to_value["docked"], 6);
        assert_eq!(data.name_to_value["mask"], 0x10);
        assert_eq!(data.name_to_value["all"], 0x15);
        assert_eq!(data.value_to_name[&5], "moving");
    }

    #[test]
    fn test_enum_bare_identifier_value() {
        let ctx = parse("enum eAlias { first = 3, second = first }");
        let data = &ctx.enums["eAlias"];
        assert_eq!(data.name_to_value["second"], 3);
        // First registered name wins the reverse mapping
        assert_eq!(data.value_to_name[&3], "first");
    }

    #[test]
    fn test_parse_prototypes() {
        let ctx = parse(
            "prototype hShip iShip.Create( string template, string name );\n\
             prototype iShip.Destroy( ref hShip ship );\n\
             prototype int iShip.HullPercent( hShip ship );\n",
        );

        let create = ctx.declaration_index["iShip.Create"];
        let decl = ctx.decl(create);
        assert!(!decl.auto_detect_types);
        assert_eq!(decl.parameter_count(), 2);
        assert_eq!(ctx.var(decl.return_info).type_name, "hShip");

        // ref qualifier is stripped
        let destroy = ctx.declaration_index["iShip.Destroy"];
        let params = ctx.decl(destroy).parameters.as_ref().unwrap();
        assert_eq!(params[0].type_name, "hShip");
        assert_eq!(params[0].name, "ship");
        // void return renders as no type
        assert_eq!(ctx.var(ctx.decl(destroy).return_info).type_name, "");

        assert_eq!(ctx.packages["iship"].functions.len(), 3);
    }

    #[test]
    fn test_comments_stripped() {
        let ctx = parse(
            "// handle hBogus : hSim;\n/* uses Nothing; */\nhandle hReal : hSim;\n",
        );
        assert!(!ctx.is_handle_type("hBogus"));
        assert!(ctx.is_handle_type("hReal"));
        assert!(ctx.packages["iship"].dependencies.is_none());
    }

    #[test]
    fn test_malformed_prototype_dropped() {
        let ctx = parse("prototype int Broken(no dots here;\nprototype int iShip.Ok( );\n");
        assert!(ctx.declaration_index.contains_key("iShip.Ok"));
        assert_eq!(ctx.declaration_index.len(), 1);
    }
}

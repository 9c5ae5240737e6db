//! Package dependency detection and import ordering.
//!
//! Headers without explicit `uses` lists get their dependencies inferred from the
//! handle types they declare and consume. A small hand-maintained patch table fixes
//! the known headers whose `uses` statements are missing or spurious. The import list
//! of the rendered source is then a topological sort of the dependency graph
//! restricted to the imports, with alphabetical tie-breaking so output is stable.

use std::collections::BTreeSet;

use log::warn;

use crate::package::{Context, SYSTEM_PACKAGE};

/// Known corrections for header `uses` statements: (package, additions, removals).
const MANUAL_DEPENDENCIES: [(&str, &[&str], &[&str]); 7] = [
    ("iDockport", &["iSim"], &[]),
    ("iLoadout", &["GUI"], &[]),
    ("Sim", &[], &["Subsim"]),
    ("Subsim", &["Sim"], &[]),
    ("Object", &["List"], &[]),
    ("iScore", &["iShip"], &[]),
    ("iCargoScript", &["iHabitat"], &[]),
];

/// Fill in inferred dependency sets and apply the manual corrections.
pub fn detect_package_dependencies(ctx: &mut Context) {
    let keys: Vec<String> = ctx.packages.keys().cloned().collect();

    for key in keys {
        let package = &ctx.packages[&key];

        let mut dependencies = match &package.dependencies {
            Some(explicit) => explicit.clone(),
            None => infer_dependencies(ctx, &key),
        };

        let package_name = ctx.packages[&key].name.clone();
        for (name, additions, removals) in MANUAL_DEPENDENCIES {
            if name != package_name {
                continue;
            }
            for add in additions {
                dependencies.insert((*add).to_string());
            }
            for remove in removals {
                dependencies.remove(*remove);
            }
        }

        if let Some(package) = ctx.packages.get_mut(&key) {
            package.dependencies = Some(dependencies);
        }
    }
}

/// Dependencies implied by a package's types: the source packages of its handles'
/// base types and of every handle appearing in its function signatures.
fn infer_dependencies(ctx: &Context, key: &str) -> BTreeSet<String> {
    let package = &ctx.packages[key];
    let mut dependencies = BTreeSet::new();

    // The package's handle definitions pull in their base types' packages
    for handle in &package.handles {
        let Some(info) = ctx.handles.get(handle) else {
            continue;
        };
        if let Some(base) = ctx.handles.get(&info.base_type) {
            if base.source_package != SYSTEM_PACKAGE {
                dependencies.insert(base.source_package.clone());
            }
        }
    }

    // So do the handles in its functions' signatures
    for &decl_id in &package.functions {
        let return_type = ctx.return_type(decl_id);
        if let Some(info) = ctx.handles.get(&return_type) {
            if info.source_package != package.name && info.source_package != SYSTEM_PACKAGE {
                dependencies.insert(info.source_package.clone());
            }
        }

        if let Some(params) = ctx.decl(decl_id).parameters.as_ref() {
            for param in params {
                if let Some(info) = ctx.handles.get(&param.type_name) {
                    if info.source_package != package.name && info.source_package != SYSTEM_PACKAGE
                    {
                        dependencies.insert(info.source_package.clone());
                    }
                }
            }
        }
    }

    dependencies
}

/// Order the imported packages so that every package appears after the packages it
/// depends on, breaking ties alphabetically.
#[must_use]
pub fn sort_package_imports(ctx: &Context) -> Vec<String> {
    let imports = &ctx.package_imports;

    // Edges within the import set only: B before A whenever A depends on B
    let depends_on = |name: &str, base: &str| -> bool {
        name != base
            && ctx
                .packages
                .get(&name.to_lowercase())
                .is_some_and(|package| package.depends_on(base))
    };

    let mut remaining: BTreeSet<&str> = imports.iter().map(String::as_str).collect();
    let mut sorted = Vec::with_capacity(imports.len());

    while !remaining.is_empty() {
        // The alphabetically first import with no unplaced prerequisites
        let next = remaining
            .iter()
            .find(|&&candidate| {
                !remaining
                    .iter()
                    .any(|&other| other != candidate && depends_on(candidate, other))
            })
            .copied();

        match next {
            Some(next) => {
                remaining.remove(next);
                sorted.push(next.to_string());
            }
            None => {
                // Dependency cycle; fall back to alphabetical order for the rest
                warn!("Dependency cycle among imports: {remaining:?}");
                sorted.extend(remaining.iter().map(|&name| name.to_string()));
                remaining.clear();
            }
        }
    }

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{
        headers::parse_header_source, Context, DecompileOptions,
    };

    fn context_with_headers(headers: &[(&str, &str)]) -> Context {
        let mut ctx = Context::new(DecompileOptions::default());
        for (name, contents) in headers {
            parse_header_source(&mut ctx, name, contents);
        }
        ctx
    }

    #[test]
    fn test_inferred_dependencies_from_handles() {
        let mut ctx = context_with_headers(&[
            ("Sim", "\nuses Object;\nhandle hSim : hObject;\nhandle hObject : hobject;\n"),
            // iShip has no uses statement, so its dependency on Sim is inferred
            ("iShip", "handle hShip : hSim;\nprototype hSim iShip.AsSim( hShip ship );\n"),
        ]);

        detect_package_dependencies(&mut ctx);

        let iship = &ctx.packages["iship"];
        assert!(iship.depends_on("Sim"));
    }

    #[test]
    fn test_manual_dependency_patches() {
        let mut ctx = context_with_headers(&[
            ("Sim", "\nuses Subsim;\n"),
            ("Subsim", "handle hSubsim : hobject;\n"),
            ("Object", "handle hObj : hobject;\n"),
        ]);

        detect_package_dependencies(&mut ctx);

        // Sim-Subsim is known-spurious and removed; Object+List is known-missing
        assert!(!ctx.packages["sim"].depends_on("Subsim"));
        assert!(ctx.packages["object"].depends_on("List"));
        assert!(ctx.packages["subsim"].depends_on("Sim"));
    }

    #[test]
    fn test_import_topological_sort() {
        let mut ctx = context_with_headers(&[
            ("Alpha", "\nuses Zulu;\n"),
            ("Zulu", "handle hZ : hobject;\n"),
            ("Mike", "handle hM : hobject;\n"),
        ]);
        detect_package_dependencies(&mut ctx);

        ctx.package_imports = vec![
            "Alpha".to_string(),
            "Mike".to_string(),
            "Zulu".to_string(),
        ];

        // Zulu must precede Alpha; ties break alphabetically
        assert_eq!(sort_package_imports(&ctx), vec!["Mike", "Zulu", "Alpha"]);
    }

    #[test]
    fn test_import_sort_is_deterministic_on_cycles() {
        let mut ctx = context_with_headers(&[
            ("A", "\nuses B;\n"),
            ("B", "\nuses A;\n"),
        ]);
        detect_package_dependencies(&mut ctx);
        ctx.package_imports = vec!["B".to_string(), "A".to_string()];

        assert_eq!(sort_package_imports(&ctx), vec!["A", "B"]);
    }
}

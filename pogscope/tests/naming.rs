//! Name-provider tests over synthetic packages: assignment-driven rules that mine
//! call parameters and registry reads for identifiers.

mod common;

use common::{OpStream, PackageBuilder};
use pogscope::{package::parse_header_source, Context, Decompilation, DecompileOptions};

fn decompile(headers: &[(&str, &str)], package: PackageBuilder) -> String {
    let mut ctx = Context::new(DecompileOptions::default());
    for (name, contents) in headers {
        parse_header_source(&mut ctx, name, contents);
    }
    let mut job = Decompilation::from_slice(&package.build(), ctx).expect("package should load");
    job.resolve();
    job.render()
}

#[test]
fn test_global_registry_read_names_variable() {
    let mut s = OpStream::new();

    s.push_stack_n(1);
    // local_0 = Global.Int("shipCount")
    s.literal_string(0).unknown_3b();
    s.call_imported("Int", 1);
    s.variable_write(0).pop_stack();
    s.void_epilogue();
    let (code, sites) = s.finish();

    let source = decompile(
        &[
            ("Global", "prototype int Global.Int( string name );\n"),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("Global")
            .function_import("Int", &[sites[0].1])
            .export("Init", 0)
            .strings(&["shipCount"])
            .code(&code),
    );

    assert!(
        source.contains("int shipCount = Global.Int( \"shipCount\" );"),
        "{source}"
    );
}

#[test]
fn test_find_call_names_variable_from_parameter() {
    let mut s = OpStream::new();

    s.push_stack_n(1);
    // local_0 = iShip.Find("Avenger")
    s.literal_string(0).unknown_3b();
    s.call_imported("Find", 1);
    s.variable_write(0).pop_stack();
    s.void_epilogue();
    let (code, sites) = s.finish();

    let source = decompile(
        &[
            ("Sim", "handle hSim : hobject;\n"),
            (
                "iShip",
                "handle hShip : hSim;\nprototype hShip iShip.Find( string name );\n",
            ),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("iShip")
            .function_import("Find", &[sites[0].1])
            .export("Init", 0)
            .strings(&["Avenger"])
            .code(&code),
    );

    assert!(
        source.contains("hShip avenger = iShip.Find( \"Avenger\" );"),
        "{source}"
    );
}

#[test]
fn test_ship_create_template_naming_beats_type_naming() {
    let mut s = OpStream::new();

    s.push_stack_n(1);
    // local_0 = iShip.Create("Transport_01", "Hauler")
    s.literal_string(0).unknown_3b();
    s.literal_string(1).unknown_3b();
    s.call_imported("Create", 2);
    s.variable_write(0).pop_stack();
    s.void_epilogue();
    let (code, sites) = s.finish();

    let source = decompile(
        &[
            ("Sim", "handle hSim : hobject;\n"),
            (
                "iShip",
                "handle hShip : hSim;\nprototype hShip iShip.Create( string template, string name );\n",
            ),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("iShip")
            .function_import("Create", &[sites[0].1])
            .export("Init", 0)
            .strings(&["Transport_01", "Hauler"])
            .code(&code),
    );

    // The template rule (priority 1000) beats both the Find-style name rule and the
    // handle-type fallback
    assert!(source.contains("hShip shipTransport01 = "), "{source}");
}

#[test]
fn test_handle_type_name_collision_resolution() {
    let mut s = OpStream::new();

    s.push_stack_n(2);
    s.call_imported("Mk", 0);
    s.variable_write(0).pop_stack();
    s.call_imported("Mk", 0);
    s.variable_write(1).pop_stack();
    s.void_epilogue();
    let (code, sites) = s.finish();

    let offsets: Vec<u32> = sites.iter().map(|(_, offset)| *offset).collect();
    let source = decompile(
        &[
            ("Sim", "handle hSim : hobject;\n"),
            (
                "iShip",
                "handle hShip : hSim;\nprototype hShip iShip.Mk();\n",
            ),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("iShip")
            .function_import("Mk", &offsets)
            .export("Init", 0)
            .code(&code),
    );

    // Both variables want "ship" from their handle type; the collision resolves
    // with deterministic suffixes
    assert!(source.contains("hShip ship_0 = "), "{source}");
    assert!(source.contains("hShip ship_1 = "), "{source}");
}

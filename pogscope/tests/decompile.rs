//! End-to-end structuring and rendering tests over synthetic packages.

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
fn test_if_else_reconstruction() {
    let mut s = OpStream::new();
    let else_l = s.label();
    let end_l = s.label();

    s.push_stack_n(1);
    s.literal_byte(0).variable_write(0).pop_stack();
    s.variable_read(0).jump_if_false(else_l);
    s.literal_byte(1).variable_write(0).pop_stack();
    s.jump(end_l);
    s.place(else_l);
    s.literal_byte(2).variable_write(0).pop_stack();
    s.place(end_l);
    s.literal_byte(3).variable_write(0).pop_stack();
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .export("Init", 0)
            .code(&code),
    );

    assert_eq!(
        source,
        "package Mission;\n\n\
         provides Init;\n\n\
         prototype Init();\n\n\
         Init()\n\
         {\n\
         \tint local_0 = 0;\n\
         \n\
         \tif ( local_0 )\n\
         \t{\n\
         \t\tlocal_0 = 1;\n\
         \t}\n\
         \telse\n\
         \t{\n\
         \t\tlocal_0 = 2;\n\
         \t}\n\
         \n\
         \tlocal_0 = 3;\n\
         }\n\n"
    );
}

#[test]
fn test_for_loop_with_increment() {
    let mut s = OpStream::new();
    let end_l = s.label();

    s.push_stack_n(2);
    // init: local_0 = 0
    s.literal_zero().variable_write(0).pop_stack();
    // condition: local_0 < 10
    let cond_l = s.here();
    s.literal_int(10).variable_read(0).int_lt();
    s.jump_if_false(end_l);
    // body: local_1 = local_0
    s.variable_read(0).variable_write(1).pop_stack();
    // increment: local_0 = local_0 + 1
    s.literal_one().variable_read(0).int_add().variable_write(0).pop_stack();
    s.jump(cond_l);
    s.place(end_l);
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .export("Run", 0)
            .code(&code),
    );

    assert!(source.contains("int ii;"), "{source}");
    assert!(source.contains("for ( ii = 0; ii < 10; ++ii )"), "{source}");
    assert!(source.contains("constant = ii;"), "{source}");
}

#[test]
fn test_do_while_loop() {
    let mut s = OpStream::new();

    s.push_stack_n(1);
    let top_l = s.here();
    s.literal_one().variable_read(0).int_add().variable_write(0).pop_stack();
    s.variable_read(0);
    s.jump_if_true(top_l);
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .export("Spin", 0)
            .code(&code),
    );

    assert!(source.contains("do\n\t{\n\t\tconstant = constant + 1;\n\t}\n\twhile ( constant );"),
        "{source}");
}

#[test]
fn test_handle_compared_to_none() {
    let mut s = OpStream::new();
    let end_l = s.label();

    s.push_stack_n(1);
    s.call_imported("FindPlayerShip", 0);
    s.variable_write(0).pop_stack();
    // if (ship == none) { ship = none; }
    s.literal_zero().variable_read(0).equals();
    s.jump_if_false(end_l);
    s.literal_zero().variable_write(0).pop_stack();
    s.place(end_l);
    s.void_epilogue();
    let (code, sites) = s.finish();

    let source = decompile(
        &[
            ("Sim", "handle hSim : hobject;\n"),
            (
                "iShip",
                "handle hShip : hSim;\nprototype hShip iShip.FindPlayerShip();\n",
            ),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("iShip")
            .function_import("FindPlayerShip", &[sites[0].1])
            .export("Init", 0)
            .code(&code),
    );

    assert!(source.contains("uses iShip;"), "{source}");
    assert!(
        source.contains("hShip playerShip = iShip.FindPlayerShip();"),
        "{source}"
    );
    assert!(source.contains("if ( playerShip == none )"), "{source}");
    assert!(source.contains("playerShip = none;"), "{source}");
}

#[test]
fn test_switch_on_enum() {
    let mut s = OpStream::new();
    let cond_l = s.label();
    let break_l = s.label();

    s.jump(cond_l);
    let case_red = s.here();
    s.literal_byte(1).variable_write(0).pop_stack();
    s.jump(break_l);
    let case_green = s.here();
    s.literal_byte(2).variable_write(0).pop_stack();
    s.jump(break_l);
    s.place(cond_l);
    s.variable_read(0);
    s.clone_stack();
    s.literal_byte(0).equals().jump_if_true(case_red);
    s.clone_stack();
    s.literal_byte(1).equals().jump_if_true(case_green);
    s.place(break_l);
    s.pop_stack();
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[(
            "Mission",
            "enum eColor { red, green, blue }\nprototype Mission.Pick( eColor color );\n",
        )],
        PackageBuilder::new()
            .header("Mission")
            .export("Pick", 0)
            .code(&code),
    );

    assert!(source.contains("switch ( color_ )"), "{source}");
    assert!(source.contains("case red:"), "{source}");
    assert!(source.contains("case green:"), "{source}");
    // Written literals take the enum member names as well
    assert!(source.contains("color_ = green;"), "{source}");
    assert!(source.contains("color_ = blue;"), "{source}");
    assert!(source.contains("break;"), "{source}");
}

#[test]
fn test_mismatched_handle_comparison_gets_cast() {
    let mut s = OpStream::new();

    s.push_stack_n(1);
    s.variable_read(1).variable_read(0).equals();
    s.variable_write(2).pop_stack();
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[
            (
                "Sim",
                "handle hSim : hobject;\nprototype hSim Sim.Cast( hobject object );\n",
            ),
            ("iShip", "handle hShip : hSim;\n"),
            ("iStation", "handle hStation : hSim;\n"),
            (
                "Mission",
                "prototype Mission.Check( hShip ship, hStation station );\n",
            ),
        ],
        PackageBuilder::new()
            .header("Mission")
            .export("Check", 0)
            .code(&code),
    );

    assert!(source.contains("Check( hShip ship_, hStation station_ )"), "{source}");
    assert!(
        source.contains("Sim.Cast( ship_ ) == Sim.Cast( station_ )"),
        "{source}"
    );
}

#[test]
fn test_schedule_every_blocks() {
    let mut s = OpStream::new();
    let start_l = s.here();
    let after_l = s.label();

    s.schedule_start();
    s.schedule_every(after_l, 2.5);
    s.call_imported("Trace", 0).pop_stack();
    s.place(after_l);
    s.jump(start_l);
    s.function_end();
    let (code, sites) = s.finish();

    let source = decompile(
        &[("Debug", "prototype Debug.Trace();\n"), ("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .import("Debug")
            .function_import("Trace", &[sites[0].1])
            .export("Loop", 0)
            .code(&code),
    );

    assert!(source.contains("task Loop()"), "{source}");
    assert!(source.contains("schedule\n\t{\n\t\tevery 2.5:"), "{source}");
    assert!(source.contains("Debug.Trace();"), "{source}");
}

#[test]
fn test_atomic_and_inline_debug_blocks() {
    let mut s = OpStream::new();
    let skip_l = s.label();

    s.atomic_start();
    s.call_imported("Trace", 0).pop_stack();
    s.atomic_stop();
    s.jump_if_not_debug(skip_l);
    s.call_imported("Trace", 0).pop_stack();
    s.place(skip_l);
    s.void_epilogue();
    let (code, sites) = s.finish();

    let offsets: Vec<u32> = sites.iter().map(|(_, offset)| *offset).collect();
    let source = decompile(
        &[("Debug", "prototype Debug.Trace();\n"), ("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .import("Debug")
            .function_import("Trace", &offsets)
            .export("Init", 0)
            .code(&code),
    );

    assert!(source.contains("atomic\n\t{\n\t\tDebug.Trace();\n\t}"), "{source}");
    assert!(source.contains("debug Debug.Trace();"), "{source}");
}

#[test]
fn test_break_and_continue_classification() {
    let mut s = OpStream::new();
    let end_l = s.label();
    let after_if = s.label();
    let after_if2 = s.label();

    s.push_stack_n(1);
    let cond_l = s.here();
    s.variable_read(0).jump_if_false(end_l);
    // if (local_0 == 1) { continue; }
    s.literal_one().variable_read(0).equals().jump_if_false(after_if);
    s.jump(cond_l);
    s.place(after_if);
    // local_0 = 0
    s.literal_zero().variable_write(0).pop_stack();
    // if (local_0) { break; }
    s.variable_read(0).jump_if_false(after_if2);
    s.jump(end_l);
    s.place(after_if2);
    s.jump(cond_l);
    s.place(end_l);
    s.literal_zero().variable_write(0).pop_stack();
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .export("Run", 0)
            .code(&code),
    );

    assert!(source.contains("while ( local_0 )"), "{source}");
    assert!(source.contains("continue;"), "{source}");
    assert!(source.contains("break;"), "{source}");
}

#[test]
fn test_return_with_value() {
    let mut s = OpStream::new();
    let else_l = s.label();
    let end_l = s.label();

    s.variable_read(0).jump_if_false(else_l);
    s.literal_byte(2).jump(end_l);
    s.place(else_l);
    s.literal_byte(3).jump(end_l);
    s.place(end_l);
    s.literal_zero().unknown_3c().function_end();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "prototype int Mission.Get( int flag );\n")],
        PackageBuilder::new()
            .header("Mission")
            .export("Get", 0)
            .code(&code),
    );

    assert!(source.contains("int Get( int flag_ )"), "{source}");
    assert!(source.contains("return 2;"), "{source}");
    assert!(source.contains("return 3;"), "{source}");
}

#[test]
fn test_imports_topologically_sorted() {
    let source = decompile(
        &[
            ("Alpha", "\nuses Zulu;\n"),
            ("Zulu", ""),
            ("Mike", ""),
            ("Mission", ""),
        ],
        PackageBuilder::new()
            .header("Mission")
            .import("Alpha")
            .import("Mike")
            .import("Zulu"),
    );

    assert!(
        source.contains("uses Mike,\n     Zulu,\n     Alpha;"),
        "{source}"
    );
}

#[test]
fn test_enum_declarations_rendered() {
    let source = decompile(
        &[("Mission", "enum eColor { red, green, blue }\n")],
        PackageBuilder::new().header("Mission"),
    );

    assert!(
        source.contains("enum eColor\n{\n\tred = 0,\n\tgreen = 1,\n\tblue = 2\n};"),
        "{source}"
    );
}

#[test]
fn test_local_function_synthesis() {
    let mut s = OpStream::new();
    let helper_l = s.label();

    s.call_local(helper_l, 0).pop_stack();
    s.void_epilogue();
    s.place(helper_l);
    s.void_epilogue();
    let (code, _) = s.finish();

    let source = decompile(
        &[("Mission", "")],
        PackageBuilder::new()
            .header("Mission")
            .export("Init", 0)
            .code(&code),
    );

    assert!(source.contains("prototype local_function_0();"), "{source}");
    assert!(source.contains("local_function_0();"), "{source}");
    assert!(source.contains("local_function_0()\n{\n}"), "{source}");
}

#[test]
fn test_output_is_deterministic() {
    let build = || {
        let mut s = OpStream::new();
        s.push_stack_n(2);
        s.call_imported("FindPlayerShip", 0);
        s.variable_write(0).pop_stack();
        s.call_imported("FindPlayerShip", 0);
        s.variable_write(1).pop_stack();
        s.void_epilogue();
        let (code, sites) = s.finish();
        let offsets: Vec<u32> = sites.iter().map(|(_, offset)| *offset).collect();

        PackageBuilder::new()
            .header("Mission")
            .import("iShip")
            .function_import("FindPlayerShip", &offsets)
            .export("Init", 0)
            .code(&code)
    };

    let headers = [
        ("Sim", "handle hSim : hobject;\n"),
        (
            "iShip",
            "handle hShip : hSim;\nprototype hShip iShip.FindPlayerShip();\n",
        ),
        ("Mission", ""),
    ];

    let first = decompile(&headers, build());
    let second = decompile(&headers, build());
    assert_eq!(first, second);

    // Two variables with the same winning provider resolve their collision
    // deterministically as well
    assert!(first.contains("playerShip_0"), "{first}");
    assert!(first.contains("playerShip_1"), "{first}");
}

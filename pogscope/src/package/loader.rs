//! Binary package container loading.
//!
//! A package file is an IFF-style container: an outer `FORM` wrapper holding typed
//! sections, each framed by a 4-byte ASCII tag and a big-endian length, with payloads
//! odd-padded to 2-byte alignment. The loader dispatches on the known tags (`PKHD`,
//! `PIMP`, `FIMP`, `FEXP`, `STAB`, `CODE`), skips unknown ones, and hands the decoded
//! code section to the function slicer.

use log::debug;

use crate::{
    assembly::decode_code_section,
    decompiler::{slice_functions, FunctionDefinition},
    file::Parser,
    package::{Context, SYSTEM_PACKAGE},
    Result,
};

struct SectionHeader {
    identifier: [u8; 4],
    length: u32,
}

fn read_section_header(parser: &mut Parser<'_>) -> Result<SectionHeader> {
    let mut identifier = [0u8; 4];
    for byte in &mut identifier {
        *byte = parser.read_le::<u8>()?;
    }
    let length = parser.read_be::<u32>()?;

    Ok(SectionHeader { identifier, length })
}

/// Load a package container into the context, decompiling every function of its code
/// section.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] when the input is not a `FORM` container,
/// and [`crate::Error::Malformed`] for truncated sections or references to packages
/// missing from the loaded headers.
pub fn load_package(ctx: &mut Context, data: &[u8]) -> Result<Vec<FunctionDefinition>> {
    let mut parser = Parser::new(data);

    let form = read_section_header(&mut parser)?;
    if &form.identifier != b"FORM" {
        return Err(crate::Error::NotSupported);
    }

    // Skip the form type for now
    parser.advance_by(4)?;
    let maximum_length = form.length.saturating_sub(4);

    let mut definitions = Vec::new();
    let mut importing_package = String::new();

    let mut consumed: u32 = 0;
    while consumed < maximum_length {
        let section = read_section_header(&mut parser)?;
        consumed += 8;

        let start = parser.pos();
        read_section(
            ctx,
            &mut parser,
            &section,
            &mut importing_package,
            &mut definitions,
        )?;

        // If the length is odd, add one so we stay 2-byte aligned
        let mut seek = section.length;
        seek += seek % 2;
        parser.seek(start + seek as usize)?;
        consumed += seek;
    }

    Ok(definitions)
}

fn read_section(
    ctx: &mut Context,
    parser: &mut Parser<'_>,
    section: &SectionHeader,
    importing_package: &mut String,
    definitions: &mut Vec<FunctionDefinition>,
) -> Result<()> {
    match &section.identifier {
        b"PKHD" => {
            let name = parser.read_string_utf8()?;
            // Resolve to the canonical casing from the headers
            let Some(package) = ctx.packages.get(&name.to_lowercase()) else {
                return Err(malformed_error!(
                    "Exporting package '{}' not found in includes", name
                ));
            };
            ctx.exporting_package = package.name.clone();
        }

        b"PIMP" => {
            let mut name = parser.read_string_utf8()?;
            if name != SYSTEM_PACKAGE {
                let Some(package) = ctx.packages.get(&name.to_lowercase()) else {
                    return Err(malformed_error!(
                        "Importing package '{}' not found in includes", name
                    ));
                };
                // Get the package name with the correct upper and lower case letters
                name = package.name.clone();
                ctx.package_imports.push(name.clone());
            }
            *importing_package = name;
        }

        b"FIMP" => {
            let name = parser.read_string_utf8()?;
            let reference_count = parser.read_be::<u32>()?;

            let declaration = ctx.add_function_declaration(importing_package, &name);
            for _ in 0..reference_count {
                let offset = parser.read_be::<u32>()?;
                ctx.imports_by_offset.insert(offset, declaration);
            }
        }

        b"FEXP" => {
            let name = parser.read_string_utf8()?;
            let function_offset = parser.read_be::<u32>()?;

            let exporting_package = ctx.exporting_package.clone();
            let declaration = ctx.add_function_declaration(&exporting_package, &name);

            ctx.exports.push(declaration);
            ctx.functions_by_offset.insert(function_offset, declaration);
        }

        b"STAB" => {
            let string_count = parser.read_be::<u32>()?;
            for _ in 0..string_count {
                let string = parser.read_string_utf8()?;
                ctx.string_table.push(string);
            }
        }

        b"CODE" => {
            let code_length = parser.read_be::<u32>()? as usize;
            let code = parser.read_bytes(code_length)?;

            let section = decode_code_section(ctx, code)?;
            definitions.extend(slice_functions(ctx, &section));
        }

        identifier => {
            debug!(
                "Skipping unknown section '{}' ({} bytes)",
                String::from_utf8_lossy(identifier),
                section.length
            );
        }
    }

    Ok(())
}

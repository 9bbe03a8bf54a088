//! Walks a finalized [`ir::Protocol`] and writes the generated Rust source
//! artifact: one namespace per protocol, one sub-namespace per interface,
//! opcode enumerations and tagged unions for requests and events, and a
//! backed enumeration or packed bitfield record per `<enum>`.
//!
//! Emission only ever reads the IR and writes bytes; it never re-derives
//! anything the validator already decided, and nothing here can fail for a
//! reason the validator should have caught — except a bitfield enum whose
//! entries don't form a clean set of non-overlapping power-of-two bits,
//! which is only detectable once all of an enum's entries are in hand.

use std::io::Write;

use crate::error::Error;
use crate::ir;
use crate::tag::ArgType;

macro_rules! emit {
    ($writer:expr, $($arg:tt)*) => {
        writeln!($writer, $($arg)*).map_err(|e| Error::WriteFailed(e.to_string()))
    };
}

/// Emits the complete generated source for `protocol` to `writer`.
///
/// Deterministic: the same IR always produces byte-identical output, since
/// every collection walked here is already in source order and nothing is
/// routed through a hash-ordered container.
pub fn emit<W: Write + ?Sized>(protocol: &ir::Protocol, writer: &mut W) -> Result<(), Error> {
    if let Some(copyright) = &protocol.copyright {
        for line in copyright.lines() {
            emit!(writer, "// {line}")?;
        }
        emit!(writer, "")?;
    }
    emit!(writer, "pub mod {} {{", protocol.name)?;
    for (index, interface) in protocol.interfaces.iter().enumerate() {
        if index > 0 {
            emit!(writer, "")?;
        }
        emit_interface(writer, "    ", interface)?;
    }
    emit!(writer, "}}")?;
    Ok(())
}

fn emit_interface<W: Write + ?Sized>(writer: &mut W, indent: &str, interface: &ir::Interface) -> Result<(), Error> {
    emit_description(writer, indent, interface.description.as_ref())?;
    emit!(writer, "{indent}pub mod {} {{", interface.name)?;
    let inner = format!("{indent}    ");

    emit!(writer, "{inner}pub const VERSION: u32 = {};", interface.version)?;
    emit!(writer, "")?;

    let requests: Vec<&ir::Message> = interface
        .objects
        .iter()
        .filter_map(|object| match object {
            ir::Object::Request(message) => Some(message),
            _ => None,
        })
        .collect();
    let events: Vec<&ir::Message> = interface
        .objects
        .iter()
        .filter_map(|object| match object {
            ir::Object::Event(message) => Some(message),
            _ => None,
        })
        .collect();
    let enums: Vec<&ir::Enum> = interface
        .objects
        .iter()
        .filter_map(|object| match object {
            ir::Object::Enum(en) => Some(en),
            _ => None,
        })
        .collect();

    emit_opcode_and_union(writer, &inner, "Request", "RequestCode", &requests)?;
    emit_opcode_and_union(writer, &inner, "Event", "EventCode", &events)?;

    for request in &requests {
        emit_payload_struct(writer, &inner, "Request", request)?;
    }
    for event in &events {
        emit_payload_struct(writer, &inner, "Event", event)?;
    }
    for en in &enums {
        emit_enum(writer, &inner, en)?;
    }

    emit!(writer, "{indent}}}")?;
    Ok(())
}

/// Emits the opcode enumeration and tagged union shared by requests and
/// events; `suffix` names the direction (`Request`/`Event`) and is appended
/// to each variant's payload struct name.
fn emit_opcode_and_union<W: Write + ?Sized>(
    writer: &mut W,
    indent: &str,
    suffix: &str,
    code_name: &str,
    messages: &[&ir::Message],
) -> Result<(), Error> {
    let body = format!("{indent}    ");

    emit!(writer, "{indent}#[derive(Debug, Clone, Copy, PartialEq, Eq)]")?;
    emit!(writer, "{indent}#[repr(u16)]")?;
    emit!(writer, "{indent}pub enum {code_name} {{")?;
    for (opcode, message) in messages.iter().enumerate() {
        emit!(writer, "{body}{} = {opcode},", pascal_case(&message.name))?;
    }
    emit!(writer, "{body}Unknown(u16),")?;
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;

    emit!(writer, "{indent}#[derive(Debug, Clone, PartialEq)]")?;
    emit!(writer, "{indent}pub enum {suffix} {{")?;
    for message in messages {
        let variant = pascal_case(&message.name);
        emit!(writer, "{body}{variant}({variant}{suffix}),")?;
    }
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;
    Ok(())
}

fn emit_payload_struct<W: Write + ?Sized>(
    writer: &mut W,
    indent: &str,
    suffix: &str,
    message: &ir::Message,
) -> Result<(), Error> {
    let variant = pascal_case(&message.name);
    let body = format!("{indent}    ");

    emit_description(writer, indent, message.description.as_ref())?;
    emit!(writer, "{indent}#[derive(Debug, Clone, PartialEq)]")?;
    emit!(writer, "{indent}pub struct {variant}{suffix} {{")?;
    for arg in &message.args {
        if let Some(summary) = &arg.summary {
            emit!(writer, "{body}/// {summary}")?;
        }
        if let Some(interface) = &arg.interface {
            emit!(writer, "{body}/// references `{interface}`")?;
        }
        if arg.ty == ArgType::Fixed {
            emit!(writer, "{body}/// 24.8 signed fixed-point")?;
        }
        emit!(writer, "{body}pub {}: {},", arg.name, arg_rust_type(arg))?;
    }
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;

    emit!(writer, "{indent}impl {variant}{suffix} {{")?;
    emit!(writer, "{body}pub const SINCE: Option<u32> = {};", option_u32_literal(message.since))?;
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;
    Ok(())
}

fn emit_enum<W: Write + ?Sized>(writer: &mut W, indent: &str, en: &ir::Enum) -> Result<(), Error> {
    if en.bitfield {
        emit_bitfield_enum(writer, indent, en)
    } else {
        emit_backed_enum(writer, indent, en)
    }
}

fn emit_backed_enum<W: Write + ?Sized>(writer: &mut W, indent: &str, en: &ir::Enum) -> Result<(), Error> {
    let name = pascal_case(&en.name);
    let body = format!("{indent}    ");

    emit_description(writer, indent, en.description.as_ref())?;
    emit!(writer, "{indent}#[derive(Debug, Clone, Copy, PartialEq, Eq)]")?;
    emit!(writer, "{indent}pub enum {name} {{")?;
    for entry in &en.entries {
        if let Some(summary) = &entry.summary {
            emit!(writer, "{body}/// {summary}")?;
        }
        emit!(writer, "{body}{} = {},", pascal_case(&entry.name), entry.value.raw)?;
    }
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;

    emit!(writer, "{indent}impl {name} {{")?;
    emit!(writer, "{body}pub const SINCE: Option<u32> = {};", option_u32_literal(en.since))?;
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;
    Ok(())
}

/// Lays entries out bit by bit, sorted by numeric value: a named `bool`
/// field per entry, an anonymous `[bool; N]` padding field of the exact gap
/// width between consecutive entries. Rejects an entry whose value is not a
/// power of two, and a second entry claiming a bit another entry already
/// occupies.
fn emit_bitfield_enum<W: Write + ?Sized>(writer: &mut W, indent: &str, en: &ir::Enum) -> Result<(), Error> {
    let name = pascal_case(&en.name);
    let body = format!("{indent}    ");

    let mut sorted: Vec<&ir::Entry> = en.entries.iter().collect();
    sorted.sort_by_key(|entry| entry.value.parsed);

    let mut bits: Vec<Option<&ir::Entry>> = Vec::new();
    for entry in &sorted {
        let value = entry.value.parsed;
        if value <= 0 || value & (value - 1) != 0 {
            return Err(Error::InvalidBitfieldEntry(
                en.name.clone(),
                entry.name.clone(),
                value,
            ));
        }
        let bit = value.trailing_zeros() as usize;
        if bits.len() <= bit {
            bits.resize(bit + 1, None);
        }
        if bits[bit].is_some() {
            return Err(Error::InvalidBitfieldEntry(
                en.name.clone(),
                entry.name.clone(),
                value,
            ));
        }
        bits[bit] = Some(entry);
    }

    emit_description(writer, indent, en.description.as_ref())?;
    emit!(writer, "{indent}#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]")?;
    emit!(writer, "{indent}pub struct {name} {{")?;
    let mut pad_index = 0;
    let mut i = 0;
    while i < bits.len() {
        match bits[i] {
            Some(entry) => {
                if let Some(summary) = &entry.summary {
                    emit!(writer, "{body}/// {summary}")?;
                }
                emit!(writer, "{body}pub {}: bool,", entry.name)?;
                i += 1;
            }
            None => {
                let start = i;
                while i < bits.len() && bits[i].is_none() {
                    i += 1;
                }
                emit!(writer, "{body}_pad{pad_index}: [bool; {}],", i - start)?;
                pad_index += 1;
            }
        }
    }
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;

    emit!(writer, "{indent}impl {name} {{")?;
    emit!(writer, "{body}pub const SINCE: Option<u32> = {};", option_u32_literal(en.since))?;
    emit!(writer, "{indent}}}")?;
    emit!(writer, "")?;
    Ok(())
}

fn emit_description<W: Write + ?Sized>(
    writer: &mut W,
    indent: &str,
    description: Option<&ir::Description>,
) -> Result<(), Error> {
    let Some(description) = description else {
        return Ok(());
    };
    if let Some(summary) = &description.summary {
        for line in summary.lines() {
            emit!(writer, "{indent}/// {line}")?;
        }
    }
    if let Some(text) = &description.text {
        if description.summary.is_some() {
            emit!(writer, "{indent}///")?;
        }
        for line in text.lines() {
            emit!(writer, "{indent}/// {line}")?;
        }
    }
    Ok(())
}

fn option_u32_literal(value: Option<u32>) -> String {
    match value {
        Some(n) => format!("Some({n})"),
        None => "None".to_string(),
    }
}

/// The Rust field type for an arg, per the type-and-nullability mapping:
/// object-like references (`object`, `new_id`, `string`) become `Option<T>`
/// when `allow-null="true"`.
fn arg_rust_type(arg: &ir::Arg) -> String {
    let base = match arg.ty {
        ArgType::Int => "i32",
        ArgType::Uint => "u32",
        ArgType::Fixed => "i32",
        ArgType::String => "String",
        ArgType::Object => "u32",
        ArgType::NewId => "u32",
        ArgType::Array => "Vec<u8>",
        ArgType::Fd => "std::os::fd::RawFd",
    };
    let nullable = matches!(arg.ty, ArgType::String | ArgType::Object | ArgType::NewId)
        && matches!(arg.allow_null, Some(true));
    if nullable {
        format!("Option<{base}>")
    } else {
        base.to_string()
    }
}

fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator;

    fn generate(xml: &[u8]) -> String {
        let protocol = validator::build(xml).unwrap();
        let mut out = Vec::new();
        emit(&protocol, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn minimal_protocol_emits_version_constant() {
        let out = generate(
            br#"<?xml version="1.0" encoding="UTF-8"?><protocol name="minimal"><interface name="foo" version="1"/></protocol>"#,
        );
        assert!(out.contains("pub mod minimal {"));
        assert!(out.contains("pub mod foo {"));
        assert!(out.contains("pub const VERSION: u32 = 1;"));
    }

    #[test]
    fn request_names_become_pascal_case_variants() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <request name="set_window_title"><arg name="title" type="string"/></request>
            </interface></protocol>"#,
        );
        assert!(out.contains("SetWindowTitle = 0,"));
        assert!(out.contains("pub struct SetWindowTitleRequest {"));
        assert!(out.contains("pub title: String,"));
    }

    #[test]
    fn opcodes_are_numbered_from_zero_in_source_order() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <request name="a"/>
                <request name="b"/>
                <request name="c"/>
            </interface></protocol>"#,
        );
        let a = out.find("A = 0,").unwrap();
        let b = out.find("B = 1,").unwrap();
        let c = out.find("C = 2,").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn bitfield_enum_pads_the_gap_between_entries() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <enum name="flags" bitfield="true">
                    <entry name="one" value="1"/>
                    <entry name="four" value="4"/>
                </enum>
            </interface></protocol>"#,
        );
        let one = out.find("pub one: bool,").unwrap();
        let pad = out.find("_pad0: [bool; 1],").unwrap();
        let four = out.find("pub four: bool,").unwrap();
        assert!(one < pad && pad < four);
    }

    #[test]
    fn non_bitfield_enum_preserves_raw_value_literal() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <enum name="mode"><entry name="fast" value="0x10"/></enum>
            </interface></protocol>"#,
        );
        assert!(out.contains("Fast = 0x10,"));
    }

    #[test]
    fn non_power_of_two_bitfield_entry_is_rejected() {
        let protocol = validator::build(
            br#"<protocol name="p"><interface name="foo" version="1">
                <enum name="flags" bitfield="true"><entry name="bad" value="3"/></enum>
            </interface></protocol>"#
                .as_slice(),
        )
        .unwrap();
        let mut out = Vec::new();
        let err = emit(&protocol, &mut out).unwrap_err();
        assert!(matches!(err, Error::InvalidBitfieldEntry(_, _, 3)));
    }

    #[test]
    fn emission_is_deterministic() {
        let xml = br#"<protocol name="p"><interface name="foo" version="2">
            <request name="a"><arg name="x" type="uint"/></request>
            <event name="b"/>
            <enum name="e"><entry name="one" value="1"/></enum>
        </interface></protocol>"#;
        let protocol = validator::build(xml.as_slice()).unwrap();
        let mut first = Vec::new();
        let mut second = Vec::new();
        emit(&protocol, &mut first).unwrap();
        emit(&protocol, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nullable_object_arg_becomes_option() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <request name="r"><arg name="target" type="object" interface="foo" allow-null="true"/></request>
            </interface></protocol>"#,
        );
        assert!(out.contains("pub target: Option<u32>,"));
    }

    #[test]
    fn object_arg_interface_is_documented() {
        let out = generate(
            br#"<protocol name="p"><interface name="foo" version="1">
                <request name="r"><arg name="target" type="new_id" interface="foo"/></request>
            </interface></protocol>"#,
        );
        assert!(out.contains("/// references `foo`"));
    }
}

//! Integration coverage of the seed end-to-end scenarios: one test per
//! scenario, driving the full `spark::generate` pipeline rather than any
//! single internal stage.

use pretty_assertions::assert_eq;

fn run(xml: &[u8]) -> Result<String, spark::Error> {
    let mut out = Vec::new();
    spark::generate(xml, &mut out)?;
    Ok(String::from_utf8(out).expect("generated source is valid UTF-8"))
}

#[test]
fn scenario_a_minimal_protocol() {
    let xml = br#"<?xml version="1.0" encoding="UTF-8"?><protocol name="minimal"><interface name="foo" version="1"/></protocol>"#;
    let out = run(xml).unwrap();
    assert!(out.contains("pub mod minimal {"));
    assert!(out.contains("pub mod foo {"));
    assert!(out.contains("pub const VERSION: u32 = 1;"));
    assert!(out.contains("pub enum RequestCode {"));
    assert!(out.contains("pub enum EventCode {"));
    assert!(out.contains("Unknown(u16),"));
    assert!(out.contains("pub enum Request {"));
    assert!(out.contains("pub enum Event {"));
}

#[test]
fn scenario_b_request_with_all_arg_types() {
    let xml = br#"<protocol name="p"><interface name="foo" version="1">
        <request name="everything">
            <arg name="a" type="int"/>
            <arg name="b" type="uint"/>
            <arg name="c" type="fixed"/>
            <arg name="d" type="string"/>
            <arg name="e" type="array"/>
            <arg name="f" type="fd"/>
            <arg name="g" type="object" interface="foo" allow-null="true"/>
            <arg name="h" type="new_id" interface="foo"/>
        </request>
    </interface></protocol>"#;
    let out = run(xml).unwrap();
    assert!(out.contains("pub struct EverythingRequest {"));
    assert!(out.contains("pub a: i32,"));
    assert!(out.contains("pub b: u32,"));
    assert!(out.contains("pub c: i32,"));
    assert!(out.contains("pub d: String,"));
    assert!(out.contains("pub e: Vec<u8>,"));
    assert!(out.contains("pub f: std::os::fd::RawFd,"));
    assert!(out.contains("pub g: Option<u32>,"));
    assert!(out.contains("pub h: u32,"));
}

#[test]
fn scenario_c_bitfield_enum_padding() {
    let xml = br#"<protocol name="p"><interface name="foo" version="1">
        <enum name="flags" bitfield="true">
            <entry name="one" value="1"/>
            <entry name="four" value="4"/>
        </enum>
    </interface></protocol>"#;
    let out = run(xml).unwrap();
    let one = out.find("pub one: bool,").expect("one field present");
    let pad = out
        .find("_pad0: [bool; 1],")
        .expect("single padding bit between one and four");
    let four = out.find("pub four: bool,").expect("four field present");
    assert!(one < pad && pad < four);
}

#[test]
fn scenario_d_mismatched_closing_tag() {
    let xml = br#"<protocol name="t"><interface name="f" version="1"></protocol>"#;
    let err = run(xml).unwrap_err();
    match err {
        spark::Error::MismatchedTagClose(pos, expected) => {
            assert_eq!(expected, "interface");
            assert_eq!(pos.line, 1);
        }
        other => panic!("expected MismatchedTagClose, got {other:?}"),
    }
}

#[test]
fn scenario_e_unsupported_doctype() {
    let xml = br#"<!DOCTYPE protocol>"#;
    let err = run(xml).unwrap_err();
    match err {
        spark::Error::DoctypeUnsupported(pos) => {
            assert_eq!((pos.line, pos.column), (1, 10));
        }
        other => panic!("expected DoctypeUnsupported, got {other:?}"),
    }
}

#[test]
fn scenario_f_duplicate_attribute() {
    let xml = br#"<protocol name="x" name="y"/>"#;
    let err = run(xml).unwrap_err();
    assert!(matches!(err, spark::Error::InvalidAttributes(_, tag) if tag == "protocol"));
}

#[test]
fn scenario_g_literal_text_trim() {
    let xml = b"<protocol name=\"p\"><interface name=\"f\" version=\"1\">\
        <description summary=\"short\">\n    Long.\n    Can span.\n</description>\
    </interface></protocol>";
    let out = run(xml).unwrap();
    assert!(out.contains("/// short"));
    assert!(out.contains("/// Long."));
    assert!(out.contains("/// Can span."));
}

#[test]
fn emission_byte_identical_across_two_runs_on_same_input() {
    let xml = br#"<protocol name="p"><interface name="foo" version="3">
        <request name="a"><arg name="x" type="uint"/></request>
        <event name="b"/>
        <enum name="mode"><entry name="fast" value="1"/></enum>
    </interface></protocol>"#;
    let first = run(xml).unwrap();
    let second = run(xml).unwrap();
    assert_eq!(first, second);
}

#[test]
fn comments_and_whitespace_do_not_affect_output() {
    let plain = br#"<protocol name="p"><interface name="foo" version="1"/></protocol>"#;
    let commented = br#"<protocol name="p">
        <!-- a comment -->
        <interface name="foo" version="1"/>
    </protocol>"#;
    assert_eq!(run(plain).unwrap(), run(commented).unwrap());
}

#[test]
fn opcodes_are_zero_based_in_source_order() {
    let xml = br#"<protocol name="p"><interface name="foo" version="1">
        <request name="a"/>
        <request name="b"/>
        <request name="c"/>
    </interface></protocol>"#;
    let out = run(xml).unwrap();
    let a = out.find("A = 0,").unwrap();
    let b = out.find("B = 1,").unwrap();
    let c = out.find("C = 2,").unwrap();
    assert!(a < b && b < c);
    assert!(out.contains("Unknown(u16),"));
}

#[test]
fn unsupported_tag_is_rejected() {
    let xml = br#"<protocol name="p"><widget name="f"/></protocol>"#;
    let err = run(xml).unwrap_err();
    assert!(matches!(err, spark::Error::UnsupportedTag(_, tag) if tag == "widget"));
}

#[test]
fn carriage_return_in_description_is_rejected() {
    let xml = b"<protocol name=\"p\"><copyright>line one\r\nline two</copyright><interface name=\"f\" version=\"1\"/></protocol>";
    let err = run(xml.as_slice()).unwrap_err();
    assert!(matches!(err, spark::Error::UnsupportedEncoding(_, _)));
}

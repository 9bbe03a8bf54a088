//! The structural validator: consumes scanner events, enforces the Wayland
//! schema's parent/child and attribute rules, and builds the IR tree.
//!
//! The validator never looks ahead or back past the event it is currently
//! handling; legality of an element is decided entirely from the tag
//! currently on top of its stack, which is why [`crate::event::Event::TagOpen`]
//! fires before any of that element's attributes are read.

use std::collections::HashSet;
use std::io::Read;

use crate::error::Error;
use crate::event::{Declaration, Event};
use crate::ir::{
    self, ParsingArg, ParsingEntry, ParsingEnum, ParsingInterface, ParsingMessage, ParsingObject,
    ParsingProtocol,
};
use crate::position::Position;
use crate::scanner::Scanner;
use crate::tag::{ArgType, Tag};

/// Runs a scanner to completion and returns the finalized protocol, or the
/// first error encountered.
pub fn build<R: Read>(reader: R) -> Result<ir::Protocol, Error> {
    let mut scanner = Scanner::new(reader);
    let mut validator = Validator::new();
    while let Some(event) = scanner.next_event()? {
        let pos = scanner.position();
        validator.on_event(event, pos)?;
    }
    validator.finish()
}

enum Node {
    Protocol(ParsingProtocol),
    Interface(ParsingInterface),
    Request(ParsingMessage),
    EventMessage(ParsingMessage),
    Enum(ParsingEnum),
    Arg(ParsingArg),
    Entry(ParsingEntry),
    Description {
        pos: Position,
        summary: Option<String>,
        text: Option<String>,
    },
    Copyright {
        pos: Position,
        text: Option<String>,
    },
}

impl Node {
    fn new(tag: Tag, pos: Position) -> Node {
        match tag {
            Tag::Protocol => Node::Protocol(ParsingProtocol::new(pos)),
            Tag::Interface => Node::Interface(ParsingInterface::new(pos)),
            Tag::Request => Node::Request(ParsingMessage::new(pos)),
            Tag::Event => Node::EventMessage(ParsingMessage::new(pos)),
            Tag::Enum => Node::Enum(ParsingEnum::new(pos)),
            Tag::Arg => Node::Arg(ParsingArg::new(pos)),
            Tag::Entry => Node::Entry(ParsingEntry::new(pos)),
            Tag::Description => Node::Description {
                pos,
                summary: None,
                text: None,
            },
            Tag::Copyright => Node::Copyright { pos, text: None },
        }
    }

    fn tag(&self) -> Tag {
        match self {
            Node::Protocol(_) => Tag::Protocol,
            Node::Interface(_) => Tag::Interface,
            Node::Request(_) => Tag::Request,
            Node::EventMessage(_) => Tag::Event,
            Node::Enum(_) => Tag::Enum,
            Node::Arg(_) => Tag::Arg,
            Node::Entry(_) => Tag::Entry,
            Node::Description { .. } => Tag::Description,
            Node::Copyright { .. } => Tag::Copyright,
        }
    }
}

struct OpenFrame {
    node: Node,
    attrs_seen: HashSet<String>,
}

/// Drives the tag stack and IR builder from a stream of scanner events.
pub struct Validator {
    stack: Vec<OpenFrame>,
    protocol: Option<ir::Protocol>,
}

impl Validator {
    /// Creates a validator with an empty stack and no finalized protocol.
    pub fn new() -> Self {
        Validator {
            stack: Vec::new(),
            protocol: None,
        }
    }

    /// Feeds one scanner event, using `pos` as the position to attribute to
    /// any error the event triggers.
    pub fn on_event(&mut self, event: Event, pos: Position) -> Result<(), Error> {
        match event {
            Event::Declaration(declaration) => {
                log_declaration(&declaration);
                Ok(())
            }
            Event::TagOpen(tag) => self.on_tag_open(tag, pos),
            Event::AttributeSeen { name, value } => self.on_attribute(name, value, pos),
            Event::TagClosed { self_closing } => {
                if self_closing {
                    self.close_top()
                } else {
                    Ok(())
                }
            }
            Event::EndElement(_tag) => self.close_top(),
            Event::LiteralText(bytes) => self.on_literal_text(bytes),
        }
    }

    /// Consumes the validator once its scanner has reached clean end of
    /// stream, returning the finalized protocol.
    pub fn finish(self) -> Result<ir::Protocol, Error> {
        self.protocol.ok_or_else(|| {
            Error::MissingAttributeAtFinal(Position::START, "protocol".into(), "name".into())
        })
    }

    fn on_tag_open(&mut self, tag: Tag, pos: Position) -> Result<(), Error> {
        let parent = self.stack.last().map(|frame| frame.node.tag());
        match tag {
            Tag::Protocol => {
                if parent.is_some() {
                    return Err(Error::NonRootProtocol(pos));
                }
            }
            Tag::Interface => {
                if parent != Some(Tag::Protocol) {
                    return Err(Error::InterfaceNotProtocolChild(pos));
                }
            }
            Tag::Request | Tag::Event | Tag::Enum => {
                if parent != Some(Tag::Interface) {
                    return Err(Error::InterfaceChildNot(pos, tag.as_str().to_string()));
                }
            }
            Tag::Description => {
                if !matches!(
                    parent,
                    Some(Tag::Interface | Tag::Request | Tag::Event | Tag::Enum)
                ) {
                    return Err(Error::InvalidDescriptionParent(pos));
                }
            }
            Tag::Copyright => {
                if parent != Some(Tag::Protocol) {
                    return Err(Error::InvalidCopyrightParent(pos));
                }
            }
            Tag::Arg => {
                if !matches!(parent, Some(Tag::Request | Tag::Event)) {
                    return Err(Error::InvalidArgParent(pos));
                }
            }
            Tag::Entry => {
                if parent != Some(Tag::Enum) {
                    return Err(Error::InvalidEntryParent(pos));
                }
            }
        }
        self.stack.push(OpenFrame {
            node: Node::new(tag, pos),
            attrs_seen: HashSet::new(),
        });
        Ok(())
    }

    fn on_attribute(&mut self, name: String, value: String, pos: Position) -> Result<(), Error> {
        let frame = self
            .stack
            .last_mut()
            .expect("scanner only emits attributes while an element is open");
        let tag = frame.node.tag();
        if !frame.attrs_seen.insert(name.clone()) {
            return Err(duplicate_attribute_error(tag, &name, pos));
        }
        match (&mut frame.node, name.as_str()) {
            (Node::Protocol(p), "name") => p.name = Some(validated_name(value, pos)?),
            (Node::Protocol(_), _) => return Err(Error::InvalidAttributes(pos, "protocol".into())),

            (Node::Interface(i), "name") => i.name = Some(validated_name(value, pos)?),
            (Node::Interface(i), "version") => {
                i.version = Some(parse_unsigned(&value, "interface", pos)?)
            }
            (Node::Interface(_), _) => {
                return Err(Error::InvalidAttributes(pos, "interface".into()))
            }

            (Node::Request(m), attr) => apply_message_attr(m, "request", attr, value, pos)?,
            (Node::EventMessage(m), attr) => apply_message_attr(m, "event", attr, value, pos)?,

            (Node::Enum(e), "name") => e.name = Some(validated_name(value, pos)?),
            (Node::Enum(e), "since") => e.since = Some(parse_unsigned(&value, "enum", pos)?),
            (Node::Enum(e), "bitfield") => e.bitfield = parse_bool(&value, "enum", pos)?,
            (Node::Enum(_), _) => return Err(Error::InvalidAttributes(pos, "enum".into())),

            (Node::Arg(a), "name") => a.name = Some(validated_name(value, pos)?),
            (Node::Arg(a), "type") => {
                a.ty = Some(
                    ArgType::from_str(&value)
                        .ok_or_else(|| Error::InvalidAttributes(pos, "arg".into()))?,
                )
            }
            (Node::Arg(a), "interface") => a.interface = Some(value),
            (Node::Arg(a), "allow-null") => a.allow_null = Some(parse_bool(&value, "arg", pos)?),
            (Node::Arg(a), "summary") => a.summary = Some(value),
            (Node::Arg(_), _) => return Err(Error::InvalidAttributes(pos, "arg".into())),

            (Node::Entry(e), "name") => e.name = Some(validated_name(value, pos)?),
            (Node::Entry(e), "value") => {
                let parsed = ir::parse_entry_value(&value)
                    .ok_or_else(|| Error::InvalidEntryValue(pos, value.clone()))?;
                e.value = Some(ir::EntryValue { raw: value, parsed });
            }
            (Node::Entry(e), "summary") => e.summary = Some(value),
            (Node::Entry(_), _) => return Err(Error::InvalidAttributes(pos, "entry".into())),

            (Node::Description { summary, .. }, "summary") => *summary = Some(value),
            (Node::Description { .. }, _) => {
                return Err(Error::InvalidAttributes(pos, "description".into()))
            }

            (Node::Copyright { .. }, _) => {
                return Err(Error::InvalidAttributes(pos, "copyright".into()))
            }
        }
        Ok(())
    }

    fn on_literal_text(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        let text = if bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8(bytes).expect("scanner emits valid utf-8 literal text"))
        };
        let frame = self
            .stack
            .last_mut()
            .expect("scanner only emits literal text inside description/copyright");
        match &mut frame.node {
            Node::Description { text: slot, .. } => *slot = text,
            Node::Copyright { text: slot, .. } => *slot = text,
            _ => unreachable!("scanner only emits literal text inside description/copyright"),
        }
        Ok(())
    }

    fn close_top(&mut self) -> Result<(), Error> {
        let frame = self
            .stack
            .pop()
            .expect("scanner only closes a tag that was opened");
        self.attach(frame)
    }

    fn parent_mut(&mut self) -> &mut OpenFrame {
        self.stack
            .last_mut()
            .expect("every non-root element was validated to have a parent at open")
    }

    fn attach(&mut self, frame: OpenFrame) -> Result<(), Error> {
        match frame.node {
            Node::Protocol(p) => {
                self.protocol = Some(p.finalize()?);
                Ok(())
            }
            Node::Interface(i) => {
                match &mut self.parent_mut().node {
                    Node::Protocol(p) => p.interfaces.push(i),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::Request(m) => {
                match &mut self.parent_mut().node {
                    Node::Interface(i) => i.objects.push(ParsingObject::Request(m)),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::EventMessage(m) => {
                match &mut self.parent_mut().node {
                    Node::Interface(i) => i.objects.push(ParsingObject::Event(m)),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::Enum(e) => {
                match &mut self.parent_mut().node {
                    Node::Interface(i) => i.objects.push(ParsingObject::Enum(e)),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::Arg(a) => {
                match &mut self.parent_mut().node {
                    Node::Request(m) | Node::EventMessage(m) => m.args.push(a),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::Entry(e) => {
                match &mut self.parent_mut().node {
                    Node::Enum(en) => en.entries.push(e),
                    _ => unreachable!(),
                }
                Ok(())
            }
            Node::Description { pos, summary, text } => {
                let description = ir::Description { summary, text };
                let slot = match &mut self.parent_mut().node {
                    Node::Interface(i) => &mut i.description,
                    Node::Request(m) | Node::EventMessage(m) => &mut m.description,
                    Node::Enum(e) => &mut e.description,
                    _ => unreachable!(),
                };
                if slot.is_some() {
                    return Err(Error::Clobber(pos, "description".into()));
                }
                *slot = Some(description);
                Ok(())
            }
            Node::Copyright { pos, text } => {
                match &mut self.parent_mut().node {
                    Node::Protocol(p) => {
                        if p.copyright.is_some() {
                            return Err(Error::Clobber(pos, "copyright".into()));
                        }
                        p.copyright = text;
                    }
                    _ => unreachable!(),
                }
                Ok(())
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_message_attr(
    message: &mut ParsingMessage,
    tag: &str,
    attr: &str,
    value: String,
    pos: Position,
) -> Result<(), Error> {
    match attr {
        "name" => message.name = Some(validated_name(value, pos)?),
        "since" => message.since = Some(parse_unsigned(&value, tag, pos)?),
        _ => return Err(Error::InvalidAttributes(pos, tag.to_string())),
    }
    Ok(())
}

fn duplicate_attribute_error(tag: Tag, name: &str, pos: Position) -> Error {
    if is_required_attr(tag, name) {
        Error::InvalidAttributes(pos, tag.as_str().to_string())
    } else {
        Error::Clobber(pos, name.to_string())
    }
}

fn is_required_attr(tag: Tag, name: &str) -> bool {
    matches!(
        (tag, name),
        (Tag::Protocol, "name")
            | (Tag::Interface, "name" | "version")
            | (Tag::Request, "name")
            | (Tag::Event, "name")
            | (Tag::Enum, "name")
            | (Tag::Arg, "name" | "type")
            | (Tag::Entry, "name" | "value")
    )
}

fn validated_name(value: String, pos: Position) -> Result<String, Error> {
    if is_valid_name(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidName(pos, value))
    }
}

fn is_valid_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
}

fn parse_unsigned(value: &str, tag: &str, pos: Position) -> Result<u32, Error> {
    value
        .parse()
        .map_err(|_| Error::InvalidAttributes(pos, tag.to_string()))
}

fn parse_bool(value: &str, tag: &str, pos: Position) -> Result<bool, Error> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidAttributes(pos, tag.to_string())),
    }
}

fn log_declaration(declaration: &Declaration) {
    tracing::debug!(
        version = %format!("{}.{}", declaration.version_major, declaration.version_minor),
        encoding = ?declaration.encoding,
        standalone = ?declaration.standalone,
        "parsed xml declaration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_protocol_builds_expected_ir() {
        let protocol = build(
            br#"<?xml version="1.0" encoding="UTF-8"?><protocol name="minimal"><interface name="foo" version="1"/></protocol>"#
                .as_slice(),
        )
        .unwrap();
        assert_eq!(protocol.name, "minimal");
        assert_eq!(protocol.interfaces.len(), 1);
        assert_eq!(protocol.interfaces[0].name, "foo");
        assert_eq!(protocol.interfaces[0].version, 1);
        assert!(protocol.interfaces[0].objects.is_empty());
    }

    #[test]
    fn request_with_all_arg_types_is_ordered() {
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
        let protocol = build(xml.as_slice()).unwrap();
        let ir::Object::Request(request) = &protocol.interfaces[0].objects[0] else {
            panic!("expected a request");
        };
        assert_eq!(request.args.len(), 8);
        assert_eq!(request.args[0].ty, ArgType::Int);
        assert_eq!(request.args[6].ty, ArgType::Object);
        assert_eq!(request.args[6].allow_null, Some(true));
        assert_eq!(request.args[7].interface.as_deref(), Some("foo"));
    }

    #[test]
    fn mismatched_close_is_reported() {
        let xml = br#"<protocol name="t"><interface name="f" version="1"></protocol>"#;
        let err = build(xml.as_slice()).unwrap_err();
        assert!(matches!(err, Error::MismatchedTagClose(_, _)));
    }

    #[test]
    fn doctype_is_rejected() {
        let xml = br#"<!DOCTYPE protocol>"#;
        let err = build(xml.as_slice()).unwrap_err();
        match err {
            Error::DoctypeUnsupported(pos) => assert_eq!((pos.line, pos.column), (1, 10)),
            other => panic!("expected DoctypeUnsupported, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_required_attribute_is_invalid_attributes() {
        let xml = br#"<protocol name="x" name="y"/>"#;
        let err = build(xml.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidAttributes(_, tag) if tag == "protocol"));
    }

    #[test]
    fn duplicate_optional_attribute_is_clobber() {
        let xml = br#"<protocol name="p"><interface name="f" version="1">
            <request name="r" since="1" since="2"/>
        </interface></protocol>"#;
        let err = build(xml.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Clobber(_, attr) if attr == "since"));
    }

    #[test]
    fn description_summary_and_text_are_captured() {
        let xml = b"<protocol name=\"p\"><interface name=\"f\" version=\"1\">\
            <description summary=\"short\">\n    Long.\n    Can span.\n</description>\
        </interface></protocol>";
        let protocol = build(xml.as_slice()).unwrap();
        let description = protocol.interfaces[0].description.as_ref().unwrap();
        assert_eq!(description.summary.as_deref(), Some("short"));
        assert_eq!(description.text.as_deref(), Some("Long.\nCan span."));
    }

    #[test]
    fn bitfield_enum_entries_are_collected_in_source_order() {
        let xml = br#"<protocol name="p"><interface name="f" version="1">
            <enum name="flags" bitfield="true">
                <entry name="one" value="1"/>
                <entry name="four" value="4"/>
            </enum>
        </interface></protocol>"#;
        let protocol = build(xml.as_slice()).unwrap();
        let ir::Object::Enum(en) = &protocol.interfaces[0].objects[0] else {
            panic!("expected an enum");
        };
        assert!(en.bitfield);
        assert_eq!(en.entries[0].value.parsed, 1);
        assert_eq!(en.entries[1].value.parsed, 4);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let xml = br#"<protocol name="Bad-Name"/>"#;
        let err = build(xml.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_, name) if name == "Bad-Name"));
    }

    #[test]
    fn arg_outside_request_or_event_is_rejected() {
        let xml = br#"<protocol name="p"><interface name="f" version="1">
            <arg name="a" type="int"/>
        </interface></protocol>"#;
        let err = build(xml.as_slice()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgParent(_)));
    }
}

//! The lexical scanner: a single-threaded pushdown recognizer that turns a
//! byte stream into the event sequence the validator consumes.
//!
//! Internally the eight documented states (`Plaintext`, `TagName`, `EndTag`,
//! `AttributeName`, `AttributeSep`, `AttributeValue`, `Text`, `Comment`) are
//! joined by two private sub-states, `Bang` and an implicit close-marker on
//! `AttributeName`, that exist only to disambiguate `<!--` from
//! `<!DOCTYPE` and `/`/`?` terminators while reading one byte at a time.

mod bom;

use std::collections::VecDeque;
use std::io::Read;

use crate::error::Error;
use crate::event::{Declaration, Event};
use crate::position::{ByteSource, Position};
use crate::tag::Tag;

const DOCTYPE: &[u8] = b"DOCTYPE";

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Plaintext,
    TagName,
    EndTag,
    AttributeName,
    AttributeSep,
    AttributeValue,
    Text,
    Comment,
    /// Disambiguating `<!--` from `<!DOCTYPE` (and everything else, which is
    /// folded into the doctype-unsupported error since neither is part of
    /// the supported schema).
    Bang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseMarker {
    SelfClose,
    Question,
}

/// Append-only byte arena plus an ordered `(offset, length)` index, used for
/// both the attribute-name and attribute-value lists. Cleared after every
/// tag so per-tag memory stays bounded to that tag's attributes.
#[derive(Debug, Default)]
struct Arena {
    bytes: Vec<u8>,
    entries: Vec<(usize, usize)>,
}

impl Arena {
    fn push(&mut self, data: &[u8]) {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(data);
        self.entries.push((offset, data.len()));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.entries.clear();
    }
}

/// A single-threaded pushdown recognizer over a byte stream, producing the
/// event sequence described in the module's data flow.
pub struct Scanner<R> {
    source: ByteSource<R>,
    state: State,
    bom_checked: bool,
    pending_bytes: VecDeque<u8>,
    pending_events: VecDeque<Event>,

    tag_name_buf: Vec<u8>,
    attr_name_buf: Vec<u8>,
    attr_value_buf: Vec<u8>,
    literal_text: Vec<u8>,

    tag_stack: Vec<Tag>,
    attribute_names: Arena,
    attribute_values: Arena,

    bang_buf: Vec<u8>,
    comment_dash_run: u8,

    pending_attr_name: String,
    pending_close_marker: Option<CloseMarker>,
    current_tag: Option<Tag>,

    first_tag: bool,
    reading_declaration: bool,
    declaration_seen: bool,
    declaration_attrs: Vec<(String, String)>,
    last_opening_was_literal_text_tag: bool,
}

impl<R: Read> Scanner<R> {
    /// Wraps `reader` in a fresh scanner, positioned at the start of input.
    pub fn new(reader: R) -> Self {
        Scanner {
            source: ByteSource::new(reader),
            state: State::Plaintext,
            bom_checked: false,
            pending_bytes: VecDeque::new(),
            pending_events: VecDeque::new(),
            tag_name_buf: Vec::new(),
            attr_name_buf: Vec::new(),
            attr_value_buf: Vec::new(),
            literal_text: Vec::new(),
            tag_stack: Vec::new(),
            attribute_names: Arena::default(),
            attribute_values: Arena::default(),
            bang_buf: Vec::new(),
            comment_dash_run: 0,
            pending_attr_name: String::new(),
            pending_close_marker: None,
            current_tag: None,
            first_tag: true,
            reading_declaration: false,
            declaration_seen: false,
            declaration_attrs: Vec::new(),
            last_opening_was_literal_text_tag: false,
        }
    }

    /// Number of attribute name/value pairs buffered for the tag currently
    /// being scanned. Exposed for the `|names| in {|values|, |values|+1}`
    /// invariant test.
    #[cfg(test)]
    fn attribute_counts(&self) -> (usize, usize) {
        (self.attribute_names.len(), self.attribute_values.len())
    }

    /// The byte source's current line/column, for attaching position
    /// information to errors the validator raises between events.
    pub fn position(&self) -> Position {
        self.source.position()
    }

    /// Produces the next scanner event, or `Ok(None)` at a clean end of
    /// stream.
    pub fn next_event(&mut self) -> Result<Option<Event>, Error> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }
        if !self.bom_checked {
            self.bom_checked = true;
            let replay = bom::consume(&mut self.source)?;
            for byte in replay {
                self.pending_bytes.push_back(byte);
            }
        }
        loop {
            let byte = match self.next_input_byte()? {
                Some(byte) => byte,
                None => return self.finish(),
            };
            let pos = self.source.position();
            let event = match self.state {
                State::Plaintext => self.step_plaintext(byte),
                State::TagName => self.step_tag_name(byte, pos)?,
                State::EndTag => self.step_end_tag(byte, pos)?,
                State::AttributeName => self.step_attribute_name(byte, pos)?,
                State::AttributeSep => self.step_attribute_sep(byte, pos)?,
                State::AttributeValue => self.step_attribute_value(byte, pos)?,
                State::Text => self.step_text(byte),
                State::Comment => self.step_comment(byte),
                State::Bang => self.step_bang(byte, pos)?,
            };
            if let Some(event) = event {
                return Ok(Some(event));
            }
        }
    }

    fn next_input_byte(&mut self) -> Result<Option<u8>, Error> {
        if let Some(byte) = self.pending_bytes.pop_front() {
            return Ok(Some(byte));
        }
        self.source.next_byte()
    }

    fn finish(&mut self) -> Result<Option<Event>, Error> {
        let pos = self.source.position();
        match self.state {
            State::Plaintext if self.tag_stack.is_empty() && !self.reading_declaration => {
                Ok(None)
            }
            State::Plaintext => Err(Error::StreamIncomplete(pos)),
            _ => Err(Error::BrokenTag(pos)),
        }
    }

    // -- plaintext / text ------------------------------------------------

    fn step_plaintext(&mut self, byte: u8) -> Option<Event> {
        if byte == b'<' {
            self.state = State::TagName;
        }
        None
    }

    fn step_text(&mut self, byte: u8) -> Option<Event> {
        if byte == b'<' {
            self.state = State::TagName;
        } else {
            self.literal_text.push(byte);
        }
        None
    }

    // -- tag name ---------------------------------------------------------

    fn step_tag_name(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        if self.tag_name_buf.is_empty() {
            return match byte {
                b'/' => {
                    self.state = State::EndTag;
                    Ok(None)
                }
                b'!' => {
                    self.state = State::Bang;
                    self.bang_buf.clear();
                    Ok(None)
                }
                b'?' => {
                    if self.declaration_seen {
                        Err(Error::DoubleDeclaration(pos))
                    } else if !self.first_tag {
                        Err(Error::InvalidDeclarationQuestionMark(pos))
                    } else {
                        self.reading_declaration = true;
                        Ok(None)
                    }
                }
                b'>' => Err(Error::EmptyTagName(pos)),
                b'<' => Err(Error::DoubleOpenBracket(pos)),
                byte if is_whitespace(byte) => Err(Error::EmptyTagName(pos)),
                byte => {
                    self.tag_name_buf.push(byte);
                    Ok(None)
                }
            };
        }

        if is_whitespace(byte) {
            let open_event = self.resolve_tag_name(pos)?;
            self.state = State::AttributeName;
            return Ok(open_event);
        }

        match byte {
            b'>' => {
                let open_event = self.resolve_tag_name(pos)?;
                if let Some(close_event) = self.close_tag(None)? {
                    self.pending_events.push_back(close_event);
                }
                Ok(open_event)
            }
            b'/' => {
                let open_event = self.resolve_tag_name(pos)?;
                self.pending_close_marker = Some(CloseMarker::SelfClose);
                self.state = State::AttributeName;
                Ok(open_event)
            }
            b'?' => {
                let open_event = self.resolve_tag_name(pos)?;
                if !self.reading_declaration {
                    return Err(Error::InvalidDeclarationQuestionMark(pos));
                }
                self.pending_close_marker = Some(CloseMarker::Question);
                self.state = State::AttributeName;
                Ok(open_event)
            }
            b'<' => Err(Error::DoubleOpenBracket(pos)),
            byte => {
                self.tag_name_buf.push(byte);
                Ok(None)
            }
        }
    }

    /// Resolves the buffered tag name, validating it against the closed tag
    /// set (or, mid-declaration, against the literal name `xml`). For an
    /// element tag this also emits the [`Event::TagOpen`] the validator uses
    /// to push the tag onto its stack before any attribute is applied.
    fn resolve_tag_name(&mut self, pos: Position) -> Result<Option<Event>, Error> {
        let name = std::mem::take(&mut self.tag_name_buf);
        if self.reading_declaration {
            if name != b"xml" {
                return Err(Error::InvalidDeclarationName(pos));
            }
            Ok(None)
        } else {
            let tag = Tag::from_bytes(&name)
                .ok_or_else(|| Error::UnsupportedTag(pos, String::from_utf8_lossy(&name).into_owned()))?;
            self.current_tag = Some(tag);
            Ok(Some(Event::TagOpen(tag)))
        }
    }

    fn close_tag(&mut self, marker: Option<CloseMarker>) -> Result<Option<Event>, Error> {
        match marker {
            Some(CloseMarker::Question) => {
                let pos = self.source.position();
                let event = self.finalize_declaration(pos)?;
                self.reading_declaration = false;
                self.declaration_seen = true;
                self.state = State::Plaintext;
                Ok(Some(event))
            }
            Some(CloseMarker::SelfClose) => {
                self.current_tag = None;
                self.attribute_names.clear();
                self.attribute_values.clear();
                self.state = State::Plaintext;
                self.first_tag = false;
                Ok(Some(Event::TagClosed { self_closing: true }))
            }
            None => {
                let tag = self.current_tag.take().expect("tag name resolved before close");
                self.attribute_names.clear();
                self.attribute_values.clear();
                self.tag_stack.push(tag);
                self.last_opening_was_literal_text_tag = tag.is_literal_text();
                self.state = if tag.is_literal_text() {
                    State::Text
                } else {
                    State::Plaintext
                };
                self.first_tag = false;
                Ok(Some(Event::TagClosed { self_closing: false }))
            }
        }
    }

    fn finalize_declaration(&mut self, pos: Position) -> Result<Event, Error> {
        let mut version = None;
        let mut encoding = None;
        let mut standalone = None;
        for (name, value) in std::mem::take(&mut self.declaration_attrs) {
            match name.as_str() {
                "version" if version.is_none() => {
                    version = Some(
                        parse_version(&value).ok_or(Error::InvalidDeclarationAttributes(pos))?,
                    );
                }
                "encoding" if encoding.is_none() => {
                    if !value.eq_ignore_ascii_case("utf-8") {
                        return Err(Error::UnsupportedEncoding(pos, value));
                    }
                    encoding = Some(value);
                }
                "standalone" if standalone.is_none() => {
                    standalone = Some(match value.as_str() {
                        "yes" => true,
                        "no" => false,
                        _ => return Err(Error::InvalidDeclarationAttributes(pos)),
                    });
                }
                "version" | "encoding" | "standalone" => {
                    return Err(Error::Clobber(pos, name));
                }
                _ => return Err(Error::InvalidDeclarationAttributes(pos)),
            }
        }
        let (version_major, version_minor) =
            version.ok_or(Error::InvalidDeclarationAttributes(pos))?;
        Ok(Event::Declaration(Declaration {
            version_major,
            version_minor,
            encoding,
            standalone,
        }))
    }

    // -- end tag ------------------------------------------------------------

    fn step_end_tag(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        if byte == b'<' {
            return Err(Error::DoubleOpenBracket(pos));
        }
        if byte != b'>' {
            self.tag_name_buf.push(byte);
            return Ok(None);
        }

        let name = std::mem::take(&mut self.tag_name_buf);
        let closed = Tag::from_bytes(&name);
        let expected = self.tag_stack.last().copied();
        if expected.is_none() || closed != expected {
            let expected_str = expected.map(|t| t.as_str().to_string()).unwrap_or_default();
            return Err(Error::MismatchedTagClose(pos, expected_str));
        }
        let tag = expected.unwrap();
        self.tag_stack.pop();
        self.last_opening_was_literal_text_tag = false;
        self.state = State::Plaintext;
        if tag.is_literal_text() {
            let text = self.finalize_literal_text(pos)?;
            self.pending_events.push_back(Event::EndElement(tag));
            Ok(Some(Event::LiteralText(text)))
        } else {
            Ok(Some(Event::EndElement(tag)))
        }
    }

    fn finalize_literal_text(&mut self, pos: Position) -> Result<Vec<u8>, Error> {
        let raw = std::mem::take(&mut self.literal_text);
        if raw.contains(&b'\r') {
            return Err(Error::UnsupportedEncoding(
                pos,
                "carriage return in literal text".into(),
            ));
        }
        let text = String::from_utf8(raw)
            .map_err(|_| Error::UnsupportedEncoding(pos, "literal text is not valid UTF-8".into()))?;
        let joined = text
            .trim()
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(joined.into_bytes())
    }

    // -- attributes -----------------------------------------------------

    fn step_attribute_name(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        if self.attr_name_buf.is_empty() {
            if is_whitespace(byte) {
                return Ok(None);
            }
            return match byte {
                b'=' => Err(Error::EqualsBeforeAttributeName(pos)),
                b'/' => {
                    if self.reading_declaration {
                        return Err(Error::InvalidForwardSlash(pos));
                    }
                    self.pending_close_marker = Some(CloseMarker::SelfClose);
                    Ok(None)
                }
                b'?' => {
                    if !self.reading_declaration {
                        return Err(Error::InvalidDeclarationQuestionMark(pos));
                    }
                    self.pending_close_marker = Some(CloseMarker::Question);
                    Ok(None)
                }
                b'>' => {
                    let marker = self.pending_close_marker.take();
                    self.close_tag(marker)
                }
                b'<' => Err(Error::DoubleOpenBracket(pos)),
                byte => {
                    self.attr_name_buf.push(byte);
                    Ok(None)
                }
            };
        }

        match byte {
            b'=' => {
                self.pending_attr_name = String::from_utf8(std::mem::take(&mut self.attr_name_buf))
                    .map_err(|_| {
                        Error::UnsupportedEncoding(pos, "attribute name is not valid UTF-8".into())
                    })?;
                self.state = State::AttributeSep;
                Ok(None)
            }
            b'>' => {
                let name = String::from_utf8_lossy(&self.attr_name_buf).into_owned();
                Err(Error::UnvaluedAttribute(pos, name))
            }
            b'/' => Err(Error::InvalidForwardSlash(pos)),
            b'<' => Err(Error::DoubleOpenBracket(pos)),
            byte if is_whitespace(byte) => Err(Error::InvalidAttributeNameChar(pos)),
            byte => {
                self.attr_name_buf.push(byte);
                Ok(None)
            }
        }
    }

    fn step_attribute_sep(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        if is_whitespace(byte) {
            return Ok(None);
        }
        if byte == b'"' {
            self.state = State::AttributeValue;
            return Ok(None);
        }
        Err(Error::InvalidBeforeAttributeValue(pos))
    }

    fn step_attribute_value(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        if byte != b'"' {
            self.attr_value_buf.push(byte);
            return Ok(None);
        }
        let value = String::from_utf8(std::mem::take(&mut self.attr_value_buf))
            .map_err(|_| Error::UnsupportedEncoding(pos, "attribute value is not valid UTF-8".into()))?;
        let name = std::mem::take(&mut self.pending_attr_name);
        self.state = State::AttributeName;
        if self.reading_declaration {
            self.declaration_attrs.push((name, value));
            Ok(None)
        } else {
            self.attribute_names.push(name.as_bytes());
            self.attribute_values.push(value.as_bytes());
            Ok(Some(Event::AttributeSeen { name, value }))
        }
    }

    // -- comments ---------------------------------------------------------

    fn step_bang(&mut self, byte: u8, pos: Position) -> Result<Option<Event>, Error> {
        self.bang_buf.push(byte);
        if self.bang_buf == b"--" {
            self.bang_buf.clear();
            self.comment_dash_run = 0;
            self.state = State::Comment;
            return Ok(None);
        }
        let len = self.bang_buf.len();
        if len == 1 && self.bang_buf[0] == b'-' {
            return Ok(None);
        }
        if len <= DOCTYPE.len() && self.bang_buf.as_slice() == &DOCTYPE[..len] {
            return Ok(None);
        }
        Err(Error::DoctypeUnsupported(pos))
    }

    fn step_comment(&mut self, byte: u8) -> Option<Event> {
        if byte == b'>' && self.comment_dash_run >= 2 {
            self.comment_dash_run = 0;
            self.state = if self.last_opening_was_literal_text_tag {
                State::Text
            } else {
                State::Plaintext
            };
            return None;
        }
        self.comment_dash_run = if byte == b'-' {
            (self.comment_dash_run + 1).min(2)
        } else {
            0
        };
        None
    }
}

fn parse_version(value: &str) -> Option<(u16, u16)> {
    let (major, minor) = value.split_once('.')?;
    let major: u16 = major.parse().ok()?;
    let minor: u16 = minor.parse().ok()?;
    if major > 255 || minor > 255 {
        return None;
    }
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(xml: &str) -> Result<Vec<Event>, Error> {
        let mut scanner = Scanner::new(xml.as_bytes());
        let mut events = Vec::new();
        while let Some(event) = scanner.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn minimal_protocol_events() {
        let events = scan_all(
            r#"<?xml version="1.0" encoding="UTF-8"?><protocol name="minimal"><interface name="foo" version="1"/></protocol>"#,
        )
        .unwrap();
        assert!(matches!(events[0], Event::Declaration(_)));
        assert_eq!(events[1], Event::TagOpen(Tag::Protocol));
        assert_eq!(
            events[2],
            Event::AttributeSeen {
                name: "name".into(),
                value: "minimal".into()
            }
        );
        assert_eq!(events[3], Event::TagClosed { self_closing: false });
        assert_eq!(events[4], Event::TagOpen(Tag::Interface));
        assert!(matches!(events[5], Event::AttributeSeen { .. }));
        assert!(matches!(events[6], Event::AttributeSeen { .. }));
        assert_eq!(events[7], Event::TagClosed { self_closing: true });
        assert_eq!(events[8], Event::EndElement(Tag::Protocol));
    }

    #[test]
    fn utf8_bom_is_consumed_silently() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<protocol name=\"x\"/>");
        let mut scanner = Scanner::new(bytes.as_slice());
        assert_eq!(scanner.next_event().unwrap(), Some(Event::TagOpen(Tag::Protocol)));
    }

    #[test]
    fn utf16_bom_is_rejected() {
        let mut scanner = Scanner::new([0xFF, 0xFE, b'<'].as_slice());
        assert!(matches!(
            scanner.next_event(),
            Err(Error::UnsupportedEncoding(_, _))
        ));
    }

    #[test]
    fn doctype_is_rejected_at_expected_column() {
        let mut scanner = Scanner::new(b"<!DOCTYPE protocol>".as_slice());
        match scanner.next_event() {
            Err(Error::DoctypeUnsupported(pos)) => {
                assert_eq!((pos.line, pos.column), (1, 10));
            }
            other => panic!("expected DoctypeUnsupported, got {other:?}"),
        }
    }

    #[test]
    fn comment_between_tags_is_skipped() {
        let events = scan_all(r#"<protocol name="x"><!-- hi --></protocol>"#).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], Event::EndElement(Tag::Protocol));
    }

    #[test]
    fn mismatched_close_reports_expected_tag() {
        let mut scanner = Scanner::new(
            br#"<protocol name="t"><interface name="f" version="1"></protocol>"#.as_slice(),
        );
        loop {
            match scanner.next_event() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error"),
                Err(Error::MismatchedTagClose(_, expected)) => {
                    assert_eq!(expected, "interface");
                    break;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn description_text_is_trimmed_and_rejoined() {
        let events = scan_all(
            "<description summary=\"short\">\n    Long.\n    Can span.\n</description>",
        )
        .unwrap();
        let text = events
            .iter()
            .find_map(|event| match event {
                Event::LiteralText(text) => Some(String::from_utf8(text.clone()).unwrap()),
                _ => None,
            })
            .unwrap();
        assert_eq!(text, "Long.\nCan span.");
    }
}

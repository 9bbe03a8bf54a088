//! The intermediate representation: a two-phase Parsing/Final pair for each
//! entity. Parsing nodes carry optional fields and are built incrementally
//! as the validator walks scanner events; `finalize` proves every required
//! field present and produces the corresponding Final node, or reports
//! [`Error::MissingAttributeAtFinal`].

use crate::error::Error;
use crate::position::Position;
use crate::tag::ArgType;

// ---------------------------------------------------------------------
// Final forms
// ---------------------------------------------------------------------

/// A finalized protocol: one XML document's worth of interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    /// The protocol's `name` attribute.
    pub name: String,
    /// The `<copyright>` element's trimmed text, if present.
    pub copyright: Option<String>,
    /// `<interface>` children, in source order.
    pub interfaces: Vec<Interface>,
}

/// A finalized `<interface>`: a named, versioned collection of requests,
/// events and enums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// The interface's `name` attribute.
    pub name: String,
    /// The interface's `version` attribute.
    pub version: u32,
    /// The interface's `<description>`, if present.
    pub description: Option<Description>,
    /// `<request>`/`<event>`/`<enum>` children, in source order.
    pub objects: Vec<Object>,
}

/// One of an interface's direct children: a request, an event, or an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// A `<request>`.
    Request(Message),
    /// An `<event>`.
    Event(Message),
    /// An `<enum>`.
    Enum(Enum),
}

/// Requests and events share this shape; only the enclosing [`Object`]
/// variant distinguishes direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The request/event's `name` attribute.
    pub name: String,
    /// The request/event's optional `since` attribute.
    pub since: Option<u32>,
    /// The request/event's `<description>`, if present.
    pub description: Option<Description>,
    /// `<arg>` children, in source order.
    pub args: Vec<Arg>,
}

/// A finalized `<enum>`: either a backed enumeration or, when `bitfield` is
/// set, a packed bitfield record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    /// The enum's `name` attribute.
    pub name: String,
    /// The enum's optional `since` attribute.
    pub since: Option<u32>,
    /// The enum's `<description>`, if present.
    pub description: Option<Description>,
    /// Whether this enum's entries are non-overlapping power-of-two bits.
    pub bitfield: bool,
    /// `<entry>` children, in source order.
    pub entries: Vec<Entry>,
}

/// A finalized `<arg>`: one parameter of a request or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    /// The arg's `name` attribute.
    pub name: String,
    /// The arg's `type` attribute.
    pub ty: ArgType,
    /// The arg's optional `interface` attribute.
    pub interface: Option<String>,
    /// The arg's optional `allow-null` attribute.
    pub allow_null: Option<bool>,
    /// The arg's optional `summary` attribute.
    pub summary: Option<String>,
}

/// A finalized `<entry>`: one named value of an `<enum>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's `name` attribute.
    pub name: String,
    /// The entry's `value` attribute, in both raw and parsed form.
    pub value: EntryValue,
    /// The entry's optional `summary` attribute.
    pub summary: Option<String>,
}

/// An entry's `value` attribute: the source text verbatim (emitted
/// unchanged for backed enumerations) plus the parsed magnitude (needed for
/// bitfield sorting and power-of-two checks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryValue {
    /// The source text verbatim, emitted unchanged for backed enumerations.
    pub raw: String,
    /// The parsed magnitude, used for bitfield sorting and power-of-two checks.
    pub parsed: i64,
}

/// A `<description>`'s short and long form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Description {
    /// The `summary` attribute.
    pub summary: Option<String>,
    /// The element's trimmed, line-rejoined text content.
    pub text: Option<String>,
}

/// Parses an entry's `value` per the decimal-or-hex, i32-or-u32 rule.
pub fn parse_entry_value(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    if (i32::MIN as i64..=u32::MAX as i64).contains(&value) {
        Some(value)
    } else {
        None
    }
}

// ---------------------------------------------------------------------
// Parsing (builder) forms
// ---------------------------------------------------------------------

pub(crate) struct ParsingProtocol {
    pub pos: Position,
    pub name: Option<String>,
    pub copyright: Option<String>,
    pub interfaces: Vec<ParsingInterface>,
}

impl ParsingProtocol {
    pub fn new(pos: Position) -> Self {
        ParsingProtocol {
            pos,
            name: None,
            copyright: None,
            interfaces: Vec::new(),
        }
    }

    pub fn finalize(self) -> Result<Protocol, Error> {
        let name = required(self.name, self.pos, "protocol", "name")?;
        let interfaces = self
            .interfaces
            .into_iter()
            .map(ParsingInterface::finalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Protocol {
            name,
            copyright: self.copyright,
            interfaces,
        })
    }
}

pub(crate) struct ParsingInterface {
    pub pos: Position,
    pub name: Option<String>,
    pub version: Option<u32>,
    pub description: Option<Description>,
    pub objects: Vec<ParsingObject>,
}

impl ParsingInterface {
    pub fn new(pos: Position) -> Self {
        ParsingInterface {
            pos,
            name: None,
            version: None,
            description: None,
            objects: Vec::new(),
        }
    }

    pub fn finalize(self) -> Result<Interface, Error> {
        let name = required(self.name, self.pos, "interface", "name")?;
        let version = required(self.version, self.pos, "interface", "version")?;
        let objects = self
            .objects
            .into_iter()
            .map(ParsingObject::finalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Interface {
            name,
            version,
            description: self.description,
            objects,
        })
    }
}

pub(crate) enum ParsingObject {
    Request(ParsingMessage),
    Event(ParsingMessage),
    Enum(ParsingEnum),
}

impl ParsingObject {
    fn finalize(self) -> Result<Object, Error> {
        Ok(match self {
            ParsingObject::Request(m) => Object::Request(m.finalize("request")?),
            ParsingObject::Event(m) => Object::Event(m.finalize("event")?),
            ParsingObject::Enum(e) => Object::Enum(e.finalize()?),
        })
    }
}

pub(crate) struct ParsingMessage {
    pub pos: Position,
    pub name: Option<String>,
    pub since: Option<u32>,
    pub description: Option<Description>,
    pub args: Vec<ParsingArg>,
}

impl ParsingMessage {
    pub fn new(pos: Position) -> Self {
        ParsingMessage {
            pos,
            name: None,
            since: None,
            description: None,
            args: Vec::new(),
        }
    }

    fn finalize(self, tag: &str) -> Result<Message, Error> {
        let name = required(self.name, self.pos, tag, "name")?;
        let args = self
            .args
            .into_iter()
            .map(ParsingArg::finalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Message {
            name,
            since: self.since,
            description: self.description,
            args,
        })
    }
}

pub(crate) struct ParsingEnum {
    pub pos: Position,
    pub name: Option<String>,
    pub since: Option<u32>,
    pub description: Option<Description>,
    pub bitfield: bool,
    pub entries: Vec<ParsingEntry>,
}

impl ParsingEnum {
    pub fn new(pos: Position) -> Self {
        ParsingEnum {
            pos,
            name: None,
            since: None,
            description: None,
            bitfield: false,
            entries: Vec::new(),
        }
    }

    fn finalize(self) -> Result<Enum, Error> {
        let name = required(self.name, self.pos, "enum", "name")?;
        let entries = self
            .entries
            .into_iter()
            .map(ParsingEntry::finalize)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Enum {
            name,
            since: self.since,
            description: self.description,
            bitfield: self.bitfield,
            entries,
        })
    }
}

pub(crate) struct ParsingArg {
    pub pos: Position,
    pub name: Option<String>,
    pub ty: Option<ArgType>,
    pub interface: Option<String>,
    pub allow_null: Option<bool>,
    pub summary: Option<String>,
}

impl ParsingArg {
    pub fn new(pos: Position) -> Self {
        ParsingArg {
            pos,
            name: None,
            ty: None,
            interface: None,
            allow_null: None,
            summary: None,
        }
    }

    fn finalize(self) -> Result<Arg, Error> {
        let name = required(self.name, self.pos, "arg", "name")?;
        let ty = required(self.ty, self.pos, "arg", "type")?;
        Ok(Arg {
            name,
            ty,
            interface: self.interface,
            allow_null: self.allow_null,
            summary: self.summary,
        })
    }
}

pub(crate) struct ParsingEntry {
    pub pos: Position,
    pub name: Option<String>,
    pub value: Option<EntryValue>,
    pub summary: Option<String>,
}

impl ParsingEntry {
    pub fn new(pos: Position) -> Self {
        ParsingEntry {
            pos,
            name: None,
            value: None,
            summary: None,
        }
    }

    fn finalize(self) -> Result<Entry, Error> {
        let name = required(self.name, self.pos, "entry", "name")?;
        let value = required(self.value, self.pos, "entry", "value")?;
        Ok(Entry {
            name,
            value,
            summary: self.summary,
        })
    }
}

fn required<T>(field: Option<T>, pos: Position, tag: &str, attr: &str) -> Result<T, Error> {
    field.ok_or_else(|| Error::MissingAttributeAtFinal(pos, tag.to_string(), attr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_value_accepts_decimal_and_hex() {
        assert_eq!(parse_entry_value("4"), Some(4));
        assert_eq!(parse_entry_value("0x10"), Some(16));
        assert_eq!(parse_entry_value("0X10"), Some(16));
        assert_eq!(parse_entry_value("4294967295"), Some(u32::MAX as i64));
        assert_eq!(parse_entry_value("-1"), Some(-1));
    }

    #[test]
    fn entry_value_rejects_out_of_range() {
        assert_eq!(parse_entry_value("4294967296"), None);
        assert_eq!(parse_entry_value("not-a-number"), None);
    }

    #[test]
    fn finalize_reports_missing_required_attribute() {
        let protocol = ParsingProtocol::new(Position::START);
        let err = protocol.finalize().unwrap_err();
        assert!(matches!(err, Error::MissingAttributeAtFinal(_, tag, attr) if tag == "protocol" && attr == "name"));
    }
}

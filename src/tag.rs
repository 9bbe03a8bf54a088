//! The closed set of recognized element tags and argument types.

use std::fmt;

/// A recognized Wayland-schema element tag. Any tag name outside this set is
/// a validation failure ([`crate::Error::UnsupportedTag`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `<copyright>`.
    Copyright,
    /// `<protocol>`, the document root.
    Protocol,
    /// `<interface>`.
    Interface,
    /// `<description>`.
    Description,
    /// `<request>`.
    Request,
    /// `<event>`.
    Event,
    /// `<enum>`.
    Enum,
    /// `<entry>`.
    Entry,
    /// `<arg>`.
    Arg,
}

impl Tag {
    /// Resolves a scanned tag name, or `None` if it is outside the closed set.
    pub fn from_bytes(name: &[u8]) -> Option<Tag> {
        Some(match name {
            b"copyright" => Tag::Copyright,
            b"protocol" => Tag::Protocol,
            b"interface" => Tag::Interface,
            b"description" => Tag::Description,
            b"request" => Tag::Request,
            b"event" => Tag::Event,
            b"enum" => Tag::Enum,
            b"entry" => Tag::Entry,
            b"arg" => Tag::Arg,
            _ => return None,
        })
    }

    /// The tag's name as it appears in source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Copyright => "copyright",
            Tag::Protocol => "protocol",
            Tag::Interface => "interface",
            Tag::Description => "description",
            Tag::Request => "request",
            Tag::Event => "event",
            Tag::Enum => "enum",
            Tag::Entry => "entry",
            Tag::Arg => "arg",
        }
    }

    /// `description` and `copyright` bodies are raw text, not markup.
    pub fn is_literal_text(&self) -> bool {
        matches!(self, Tag::Description | Tag::Copyright)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The eight argument types a `<arg>` may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    Uint,
    /// 24.8 signed fixed-point.
    Fixed,
    /// A string.
    String,
    /// A reference to an existing protocol object.
    Object,
    /// An argument that allocates a new protocol object id.
    NewId,
    /// An opaque byte array.
    Array,
    /// A file descriptor.
    Fd,
}

impl ArgType {
    /// Resolves an arg's `type` attribute value, or `None` if unrecognized.
    pub fn from_str(s: &str) -> Option<ArgType> {
        Some(match s {
            "int" => ArgType::Int,
            "uint" => ArgType::Uint,
            "fixed" => ArgType::Fixed,
            "string" => ArgType::String,
            "object" => ArgType::Object,
            "new_id" => ArgType::NewId,
            "array" => ArgType::Array,
            "fd" => ArgType::Fd,
            _ => return None,
        })
    }

    /// The type's name as it appears in source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::Int => "int",
            ArgType::Uint => "uint",
            ArgType::Fixed => "fixed",
            ArgType::String => "string",
            ArgType::Object => "object",
            ArgType::NewId => "new_id",
            ArgType::Array => "array",
            ArgType::Fd => "fd",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

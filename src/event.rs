//! Events the scanner emits to the validator.

use crate::tag::Tag;

/// A parsed `<?xml ... ?>` declaration. At most one is permitted, before any
/// element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Declaration {
    /// The `version` attribute's major component (`M` in `M.N`).
    pub version_major: u16,
    /// The `version` attribute's minor component (`N` in `M.N`).
    pub version_minor: u16,
    /// The optional `encoding` attribute (always `"UTF-8"` when present).
    pub encoding: Option<String>,
    /// The optional `standalone` attribute.
    pub standalone: Option<bool>,
}

/// One unit of scanner output. The validator consumes these in order to
/// drive its tag stack and IR builder.
///
/// An element's lifecycle is three events: [`Event::TagOpen`] fires as soon
/// as its name resolves, before any of its attributes are read, so the
/// validator can push it onto its stack and check parent/child legality
/// first; zero or more [`Event::AttributeSeen`] follow; [`Event::TagClosed`]
/// fires at the tag's own closing marker (`>` or `/>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The document's `<?xml ... ?>` declaration, if any.
    Declaration(Declaration),
    /// An element's tag name has resolved; its attributes follow.
    TagOpen(Tag),
    /// One `name="value"` pair on the currently open element.
    AttributeSeen {
        /// The attribute's name.
        name: String,
        /// The attribute's value.
        value: String,
    },
    /// The currently open element's own closing marker was reached.
    TagClosed {
        /// Whether the element closed with `/>` rather than `>`.
        self_closing: bool,
    },
    /// A non-self-closing element's `</tag>` was reached.
    EndElement(Tag),
    /// The raw text content of a just-closed literal-text tag.
    LiteralText(Vec<u8>),
}

//! The closed enumeration of everything that can go wrong while generating
//! protocol bindings, plus the position/token context attached to each.

use crate::position::Position;
use thiserror::Error;

/// All failure conditions the generator can surface, in the four kinds laid
/// out by the scanner/validator split: transport, encoding, lexical and
/// structural.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    // ---- transport -----------------------------------------------------
    /// The byte source failed to produce a byte.
    #[error("{0}: failed to read input: {1}")]
    ReadFailed(Position, String),

    /// The output writer failed.
    #[error("failed to write output: {0}")]
    WriteFailed(String),

    // ---- encoding --------------------------------------------------------
    /// A BOM other than UTF-8, a non-UTF-8 declared `encoding`, or a `\r`
    /// inside literal text.
    #[error("{0}: unsupported encoding: {1}")]
    UnsupportedEncoding(Position, String),

    // ---- lexical ---------------------------------------------------------
    /// End of stream was reached with a tag still open.
    #[error("{0}: tag left open at end of input")]
    BrokenTag(Position),

    /// A tag was closed with no name bytes collected.
    #[error("{0}: tag name is empty")]
    EmptyTagName(Position),

    /// A tag name outside the closed schema set.
    #[error("{0}: unsupported tag `<{1}>`")]
    UnsupportedTag(Position, String),

    /// A literal `<` appeared where only tag/attribute content was expected.
    #[error("{0}: `<` is not allowed inside a tag")]
    DoubleOpenBracket(Position),

    /// A `/` appeared somewhere other than immediately before `>`.
    #[error("{0}: `/` is only allowed immediately before `>`")]
    InvalidForwardSlash(Position),

    /// An attribute name contained a disallowed character.
    #[error("{0}: invalid character in attribute name")]
    InvalidAttributeNameChar(Position),

    /// An attribute value did not begin with `"`.
    #[error("{0}: expected `\"` to start an attribute value")]
    InvalidBeforeAttributeValue(Position),

    /// `=` appeared with no preceding attribute name.
    #[error("{0}: `=` with no preceding attribute name")]
    EqualsBeforeAttributeName(Position),

    /// An attribute had no value before the tag closed.
    #[error("{0}: closing tag does not match the currently open tag `<{1}>`")]
    MismatchedTagClose(Position, String),

    /// An attribute name was followed by `>` with no `=value` pair.
    #[error("{0}: attribute `{1}` has no value")]
    UnvaluedAttribute(Position, String),

    /// A `<!DOCTYPE` declaration, which this schema never accepts.
    #[error("{0}: `<!DOCTYPE` is not supported")]
    DoctypeUnsupported(Position),

    /// A `?` appeared outside a legal declaration-closing position.
    #[error("{0}: invalid `?` in a declaration")]
    InvalidDeclarationQuestionMark(Position),

    /// A second `<?xml ... ?>` declaration was encountered.
    #[error("{0}: a second XML declaration is not allowed")]
    DoubleDeclaration(Position),

    /// A declaration's target name was not `xml`.
    #[error("{0}: invalid declaration target name")]
    InvalidDeclarationName(Position),

    /// A declaration carried an unrecognized or malformed attribute.
    #[error("{0}: invalid declaration attributes")]
    InvalidDeclarationAttributes(Position),

    /// A non-self-closing tag was never matched with `</tag>`.
    #[error("{0}: `<{1}>` must be closed with a matching `</{1}>`")]
    InvalidNonSelfClosing(Position, String),

    /// A tag that cannot self-close was written as `<tag/>`.
    #[error("{0}: `<{1}/>` cannot be self-closing")]
    InvalidSelfClosing(Position, String),

    /// End of stream was reached with a partially-read token.
    #[error("{0}: input ended with a token still open")]
    StreamIncomplete(Position),

    // ---- structural --------------------------------------------------------
    /// `<protocol>` appeared somewhere other than the document root.
    #[error("{0}: `<protocol>` must be the document root")]
    NonRootProtocol(Position),

    /// `<interface>` appeared outside a `<protocol>`.
    #[error("{0}: `<interface>` may only appear directly inside `<protocol>`")]
    InterfaceNotProtocolChild(Position),

    /// A tag that is not a legal child of `<interface>` appeared there.
    #[error("{0}: `<{1}>` is not a legal child of `<interface>`")]
    InterfaceChildNot(Position, String),

    /// `<arg>` appeared outside a `<request>` or `<event>`.
    #[error("{0}: `<arg>` may only appear inside `<request>` or `<event>`")]
    InvalidArgParent(Position),

    /// `<entry>` appeared outside an `<enum>`.
    #[error("{0}: `<entry>` may only appear inside `<enum>`")]
    InvalidEntryParent(Position),

    /// `<description>` appeared somewhere it is not legal.
    #[error("{0}: `<description>` is not legal here")]
    InvalidDescriptionParent(Position),

    /// `<copyright>` appeared outside a `<protocol>`.
    #[error("{0}: `<copyright>` may only appear inside `<protocol>`")]
    InvalidCopyrightParent(Position),

    /// An element carried an attribute its schema entry does not recognize,
    /// or was missing a required attribute on first occurrence.
    #[error("{0}: invalid attributes on `<{1}>`")]
    InvalidAttributes(Position, String),

    /// A `name` attribute failed the `^[a-z_][a-z0-9_]*$` regex.
    #[error("{0}: invalid name `{1}`")]
    InvalidName(Position, String),

    /// An `<entry>`'s `value` did not parse as decimal or hex i32/u32.
    #[error("{0}: invalid entry value `{1}`")]
    InvalidEntryValue(Position, String),

    /// An optional attribute or a `<description>`/`<copyright>` was set
    /// more than once on the same element.
    #[error("{0}: `{1}` is set more than once")]
    Clobber(Position, String),

    /// Finalization found a required attribute still unset.
    #[error("{0}: `<{1}>` is missing required attribute `{2}`")]
    MissingAttributeAtFinal(Position, String, String),

    // ---- emission ----------------------------------------------------------
    /// A bitfield enum entry was not a power of two, or two entries claimed
    /// the same bit.
    #[error("bitfield enum `{0}` entry `{1}` has non-power-of-two or duplicate-bit value {2}")]
    InvalidBitfieldEntry(String, String, i64),
}

impl Error {
    /// Position this error was raised at, when the condition is positional.
    pub fn position(&self) -> Option<Position> {
        use Error::*;
        match self {
            WriteFailed(_) => None,
            ReadFailed(p, _)
            | UnsupportedEncoding(p, _)
            | BrokenTag(p)
            | EmptyTagName(p)
            | UnsupportedTag(p, _)
            | DoubleOpenBracket(p)
            | InvalidForwardSlash(p)
            | InvalidAttributeNameChar(p)
            | InvalidBeforeAttributeValue(p)
            | EqualsBeforeAttributeName(p)
            | MismatchedTagClose(p, _)
            | UnvaluedAttribute(p, _)
            | DoctypeUnsupported(p)
            | InvalidDeclarationQuestionMark(p)
            | DoubleDeclaration(p)
            | InvalidDeclarationName(p)
            | InvalidDeclarationAttributes(p)
            | InvalidNonSelfClosing(p, _)
            | InvalidSelfClosing(p, _)
            | StreamIncomplete(p)
            | NonRootProtocol(p)
            | InterfaceNotProtocolChild(p)
            | InterfaceChildNot(p, _)
            | InvalidArgParent(p)
            | InvalidEntryParent(p)
            | InvalidDescriptionParent(p)
            | InvalidCopyrightParent(p)
            | InvalidAttributes(p, _)
            | InvalidName(p, _)
            | InvalidEntryValue(p, _)
            | Clobber(p, _)
            | MissingAttributeAtFinal(p, _, _) => Some(*p),
            InvalidBitfieldEntry(_, _, _) => None,
        }
    }
}

/// Shorthand for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

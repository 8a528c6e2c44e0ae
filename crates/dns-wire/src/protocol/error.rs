//! Errors raised while encoding or decoding a message.
//!
//! Every error carries its [`ErrorKind`], and optionally the section
//! of the message it arose in and the absolute octet offset at which
//! the offending field starts.  Errors raised by the lower layers
//! (names, type codes) have no stage: the section codecs attach one
//! on the way up.

use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Error {
    pub kind: ErrorKind,
    pub stage: Option<Stage>,
    pub offset: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            stage: None,
            offset: None,
        }
    }

    pub fn truncated(offset: usize) -> Self {
        Self::new(ErrorKind::Truncated).at(offset)
    }

    /// Record the offset of the failing field, unless a more precise
    /// one is already known.
    pub fn at(mut self, offset: usize) -> Self {
        if self.offset.is_none() {
            self.offset = Some(offset);
        }
        self
    }

    /// Record the section being processed, unless an inner layer has
    /// already done so.
    pub fn in_stage(mut self, stage: Stage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(stage) = self.stage {
            write!(f, " in {stage}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " at offset {offset}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// What went wrong.  None of these are retryable: the same input will
/// fail in the same way.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The buffer is shorter than a field or a declared length
    /// requires, or a name has no terminator within the scan limit.
    Truncated,

    /// A label is over 63 octets, or a length octet has one of the
    /// reserved `01` / `10` tag patterns.
    LabelTooLong { len: usize },

    /// A name is over 255 octets, counting length octets and the
    /// terminator.
    NameTooLong { len: usize },

    /// A dotted string has an empty label somewhere other than the
    /// end.
    EmptyLabel,

    /// A dotted string has a `\` escape which is not followed by a
    /// character or by three decimal digits no greater than 255.
    InvalidEscape(String),

    /// A type mnemonic or code is not in the table.
    UnknownRecordType(Unrecognised),

    /// A class mnemonic or code is not in the table.
    UnknownRecordClass(Unrecognised),

    /// `A` record data is not four dotted decimal octets.
    InvalidAddressFormat(String),

    /// The RDATA does not have the length declared for it.
    RdataLengthMismatch { declared: u16, actual: usize },

    /// A compression pointer refers to itself or to a later offset,
    /// or a chain of pointers is too long.
    CompressionLoop,

    /// A name is marked for compression but no earlier name in the
    /// message can be pointed at.
    NoCompressionTarget { name: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Truncated => write!(f, "message is truncated"),
            ErrorKind::LabelTooLong { len } => {
                write!(f, "label of {len} octets is longer than 63 octets")
            }
            ErrorKind::NameTooLong { len } => {
                write!(f, "name of {len} octets is longer than 255 octets")
            }
            ErrorKind::EmptyLabel => write!(f, "name has an empty label"),
            ErrorKind::InvalidEscape(name) => write!(f, "'{name}' has an invalid escape"),
            ErrorKind::UnknownRecordType(what) => write!(f, "unknown record type {what}"),
            ErrorKind::UnknownRecordClass(what) => write!(f, "unknown record class {what}"),
            ErrorKind::InvalidAddressFormat(address) => {
                write!(f, "'{address}' is not a dotted decimal IPv4 address")
            }
            ErrorKind::RdataLengthMismatch { declared, actual } => write!(
                f,
                "RDATA is {actual} octets but RDLENGTH declares {declared}"
            ),
            ErrorKind::CompressionLoop => write!(f, "compression pointers form a loop"),
            ErrorKind::NoCompressionTarget { name } => {
                write!(f, "no earlier name to compress '{name}' against")
            }
        }
    }
}

/// The mnemonic or wire code which failed a table lookup.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Unrecognised {
    Mnemonic(String),
    Code(u16),
}

impl fmt::Display for Unrecognised {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unrecognised::Mnemonic(mnemonic) => write!(f, "'{mnemonic}'"),
            Unrecognised::Code(code) => write!(f, "code {code}"),
        }
    }
}

/// The part of the message being processed when an error arose.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Stage {
    Header,
    /// Zero-based index into the question section.
    Question(usize),
    /// Zero-based index into the answer section.
    ResourceRecord(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Header => write!(f, "header"),
            Stage::Question(index) => write!(f, "question {index}"),
            Stage::ResourceRecord(index) => write!(f, "resource record {index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_offset_and_stage_win() {
        let err = Error::truncated(20)
            .at(12)
            .in_stage(Stage::Question(1))
            .in_stage(Stage::Header);

        assert_eq!(Some(20), err.offset);
        assert_eq!(Some(Stage::Question(1)), err.stage);
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::UnknownRecordType(Unrecognised::Code(99)))
            .at(30)
            .in_stage(Stage::ResourceRecord(0));

        assert_eq!(
            "unknown record type code 99 in resource record 0 at offset 30",
            err.to_string()
        );
    }
}

use bytes::Bytes;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::protocol::error::{Error, ErrorKind, Unrecognised};

/// Maximum encoded length of a domain name.  The number of labels
/// plus sum of the lengths of the labels.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 12;

/// Tag bits of a length octet which starts a compression pointer.
pub const POINTER_TAG: u8 = 0b1100_0000;

/// Largest offset a compression pointer can refer to.
pub const POINTER_MAX_OFFSET: usize = 0b0011_1111_1111_1111;

/// Flag word mask for the QR flag being set (response).
pub const HEADER_MASK_QR: u16 = 0b1000_0000_0000_0000;

/// Flag word mask for the opcode field.
pub const HEADER_MASK_OPCODE: u16 = 0b0111_1000_0000_0000;

/// Offset for the opcode field.
pub const HEADER_OFFSET_OPCODE: u32 = 11;

/// Flag word mask for the AA flag being set (authoritative)
pub const HEADER_MASK_AA: u16 = 0b0000_0100_0000_0000;

/// Flag word mask for the TC flag being set (truncated)
pub const HEADER_MASK_TC: u16 = 0b0000_0010_0000_0000;

/// Flag word mask for the RD flag being set (desired)
pub const HEADER_MASK_RD: u16 = 0b0000_0001_0000_0000;

/// Flag word mask for the RA flag being set (available)
pub const HEADER_MASK_RA: u16 = 0b0000_0000_1000_0000;

/// Flag word mask for the reserved Z field.
pub const HEADER_MASK_Z: u16 = 0b0000_0000_0111_0000;

/// Offset for the Z field.
pub const HEADER_OFFSET_Z: u32 = 4;

/// Flag word mask for the rcode field.
pub const HEADER_MASK_RCODE: u16 = 0b0000_0000_0000_1111;

/// Offset for the rcode field.
pub const HEADER_OFFSET_RCODE: u32 = 0;

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.  The authority and additional
/// sections are not decoded: their counts are carried in the header
/// and nothing more.
///
/// The header counts are taken as given when serialising.  Whoever
/// builds a `Message` must keep `qdcount` and `ancount` equal to the
/// number of questions and answers.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
}

impl Message {
    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                flags: Flags::default(),
                qdcount: 1,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: vec![question],
            answers: Vec::new(),
        }
    }

    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                flags: Flags {
                    is_response: true,
                    opcode: self.header.flags.opcode,
                    recursion_desired: self.header.flags.recursion_desired,
                    ..Flags::default()
                },
                qdcount: self.header.qdcount,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
        }
    }

    /// Append an answer, keeping `ancount` in step.
    pub fn push_answer(&mut self, rr: ResourceRecord) {
        self.answers.push(rr);
        self.header.ancount = self.header.ancount.saturating_add(1);
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(any(feature = "test-util", test), derive(arbitrary::Arbitrary))]
pub struct Header {
    /// A 16 bit identifier assigned by the program that generates any
    /// kind of query.  This identifier is copied the corresponding
    /// reply and can be used by the requester to match up replies to
    /// outstanding queries.
    pub id: u16,

    /// The second 16 bits of the header.
    pub flags: Flags,

    /// Number of entries in the question section.
    pub qdcount: u16,

    /// Number of resource records in the answer section.
    pub ancount: u16,

    /// Number of name server resource records in the authority
    /// section.
    pub nscount: u16,

    /// Number of resource records in the additional records section.
    pub arcount: u16,
}

/// The flag word of the header.  Every one of the 65536 possible
/// words converts to a `Flags` and back unchanged, including the
/// reserved Z bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Flags {
    /// A one bit field that specifies whether this message is a query
    /// (0), or a response (1).
    pub is_response: bool,

    /// A four bit field that specifies kind of query in this message.
    /// This value is set by the originator of a query and copied into
    /// the response.
    pub opcode: Opcode,

    /// Authoritative Answer - this bit is valid in responses, and
    /// specifies that the responding name server is an authority for
    /// the domain name in question section.
    pub is_authoritative: bool,

    /// Truncation - specifies that this message was truncated due to
    /// length greater than that permitted on the transmission
    /// channel.
    pub is_truncated: bool,

    /// Recursion Desired - this bit may be set in a query and is
    /// copied into the response.
    pub recursion_desired: bool,

    /// Recursion Available - this be is set or cleared in a response,
    /// and denotes whether recursive query support is available in
    /// the name server.
    pub recursion_available: bool,

    /// Reserved for future use.  Must be zero in all queries and
    /// responses, but is carried as-is so that it round-trips.
    pub z: u8,

    /// Response code - this 4 bit field is set as part of responses.
    pub rcode: Rcode,
}

impl From<u16> for Flags {
    // each field is masked before narrowing, so the casts are lossless
    #[allow(clippy::cast_possible_truncation)]
    fn from(word: u16) -> Self {
        Self {
            is_response: word & HEADER_MASK_QR != 0,
            opcode: Opcode::from(((word & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE) as u8),
            is_authoritative: word & HEADER_MASK_AA != 0,
            is_truncated: word & HEADER_MASK_TC != 0,
            recursion_desired: word & HEADER_MASK_RD != 0,
            recursion_available: word & HEADER_MASK_RA != 0,
            z: ((word & HEADER_MASK_Z) >> HEADER_OFFSET_Z) as u8,
            rcode: Rcode::from(((word & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE) as u8),
        }
    }
}

impl From<Flags> for u16 {
    fn from(flags: Flags) -> Self {
        let flag_qr = if flags.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode =
            HEADER_MASK_OPCODE & (u16::from(u8::from(flags.opcode)) << HEADER_OFFSET_OPCODE);
        let flag_aa = if flags.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if flags.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if flags.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        let flag_ra = if flags.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let field_z = HEADER_MASK_Z & (u16::from(flags.z) << HEADER_OFFSET_Z);
        let field_rcode =
            HEADER_MASK_RCODE & (u16::from(u8::from(flags.rcode)) << HEADER_OFFSET_RCODE);

        flag_qr | field_opcode | flag_aa | flag_tc | flag_rd | flag_ra | field_z | field_rcode
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.is_response, "qr"),
            (self.is_authoritative, "aa"),
            (self.is_truncated, "tc"),
            (self.recursion_desired, "rd"),
            (self.recursion_available, "ra"),
        ];
        let set = names
            .iter()
            .filter(|(is_set, _)| *is_set)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        write!(f, "{}", set.join(" "))
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Flags {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::from(u.arbitrary::<u16>()?))
    }
}

/// The question section has a list of questions (usually 1 but
/// possibly more) being asked.  This is the structure for a single
/// question.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                     QNAME                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QTYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QCLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.2 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Question {
    /// a domain name represented as a sequence of labels, where each
    /// label consists of a length octet followed by that number of
    /// octets.  The domain name terminates with the zero length octet
    /// for the null label of the root.  Note that this field may be
    /// an odd number of octets; no padding is used.
    pub name: DomainName,

    /// a two octet code which specifies the type of the query.  The
    /// values for this field include all codes valid for a TYPE
    /// field, together with some more general codes which can match
    /// more than one type of RR.
    pub qtype: QueryType,

    /// a two octet code that specifies the class of the query.  For
    /// example, the QCLASS field is IN for the Internet.
    pub qclass: QueryClass,

    /// Whether the name is written as (or ends in) a pointer to an
    /// earlier name in the message.  Serialisation fails if this is
    /// set and there is no earlier name to point to.
    pub compress: bool,
}

impl Question {
    pub fn new(name: DomainName, qtype: QueryType, qclass: QueryClass) -> Self {
        Self {
            name,
            qtype,
            qclass,
            compress: false,
        }
    }

    /// Build a question from its presentation form, eg `("example.com",
    /// "A", "IN")`.
    pub fn from_presentation(name: &str, qtype: &str, qclass: &str) -> Result<Self, Error> {
        Ok(Self::new(name.parse()?, qtype.parse()?, qclass.parse()?))
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.name, self.qclass, self.qtype)
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Question {
    // never compressed: a lone question has nothing to point at
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Ok(Self::new(u.arbitrary()?, u.arbitrary()?, u.arbitrary()?))
    }
}

/// The answer, authority, and additional sections are all the same
/// format: a variable number of resource records.  This is the
/// structure for a single resource record.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                                               /
///     /                      NAME                     /
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     CLASS                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TTL                      |
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                   RDLENGTH                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
///     /                     RDATA                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.3 of RFC 1035.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ResourceRecord {
    /// a domain name to which this resource record pertains.
    pub name: DomainName,

    /// A combination of the RTYPE and RDATA fields
    pub rtype_with_data: RecordTypeWithData,

    /// two octets which specify the class of the data in the RDATA
    /// field.
    pub rclass: RecordClass,

    /// a 32 bit unsigned integer that specifies the time interval (in
    /// seconds) that the resource record may be cached before it
    /// should be discarded.  Carried as-is, never interpreted.
    pub ttl: u32,

    /// The declared length of the RDATA.  Serialisation fails if the
    /// data does not have this length.
    pub rdlength: u16,

    /// As `Question::compress`.
    pub compress: bool,
}

impl ResourceRecord {
    /// Build a record, computing `rdlength` from the data.
    pub fn new(
        name: DomainName,
        rtype_with_data: RecordTypeWithData,
        rclass: RecordClass,
        ttl: u32,
    ) -> Result<Self, Error> {
        let actual = rtype_with_data.rdata_len();
        let rdlength = u16::try_from(actual).map_err(|_| {
            Error::new(ErrorKind::RdataLengthMismatch {
                declared: u16::MAX,
                actual,
            })
        })?;

        Ok(Self {
            name,
            rtype_with_data,
            rclass,
            ttl,
            rdlength,
            compress: false,
        })
    }

    /// Build a record from its presentation form.  The RDATA of an
    /// `A` record is a dotted decimal address; for every other type
    /// the octets of `rdata` are used verbatim.
    pub fn from_presentation(
        name: &str,
        rtype: &str,
        rclass: &str,
        ttl: u32,
        rdata: &str,
    ) -> Result<Self, Error> {
        let rtype_with_data = match rtype.parse::<RecordType>()? {
            RecordType::A => RecordTypeWithData::A {
                address: parse_address(rdata)?,
            },
            rtype => RecordTypeWithData::Opaque {
                rtype,
                octets: Bytes::copy_from_slice(rdata.as_bytes()),
            },
        };

        Self::new(name.parse()?, rtype_with_data, rclass.parse()?, ttl)
    }

    /// The RDATA in presentation form: dotted decimal for `A`
    /// records, a quoted and escaped string otherwise.
    pub fn rdata_string(&self) -> String {
        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => address.to_string(),
            RecordTypeWithData::Opaque { octets, .. } => serialise_octets(octets),
        }
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name,
            self.ttl,
            self.rclass,
            self.rtype_with_data.rtype(),
            self.rdata_string()
        )
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for ResourceRecord {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Self::new(u.arbitrary()?, u.arbitrary()?, u.arbitrary()?, u.arbitrary()?)
            .map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

/// A record type with its associated, deserialised, data.  Only `A`
/// records are interpreted; everything else is carried as the raw
/// RDATA octets.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum RecordTypeWithData {
    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    ///
    /// Where `ADDRESS` is a 32 bit Internet address.
    A { address: Ipv4Addr },

    /// Any other type.  `rtype` must not be `A`: serialising such a
    /// record fails, as its data would not decode to the same value.
    Opaque { rtype: RecordType, octets: Bytes },
}

impl RecordTypeWithData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::Opaque { rtype, .. } => *rtype,
        }
    }

    pub fn rdata_len(&self) -> usize {
        match self {
            RecordTypeWithData::A { .. } => 4,
            RecordTypeWithData::Opaque { octets, .. } => octets.len(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordTypeWithData {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let rtype_with_data = match u.arbitrary::<RecordType>()? {
            RecordType::A => RecordTypeWithData::A {
                address: Ipv4Addr::from(u.arbitrary::<u32>()?),
            },
            rtype => {
                let len = u.int_in_range::<usize>(0..=32)?;
                RecordTypeWithData::Opaque {
                    rtype,
                    octets: Bytes::copy_from_slice(u.bytes(len)?),
                }
            }
        };
        Ok(rtype_with_data)
    }
}

/// Parse a dotted decimal IPv4 address: exactly four decimal integers
/// in the range 0 to 255.
pub fn parse_address(s: &str) -> Result<Ipv4Addr, Error> {
    let invalid = || Error::new(ErrorKind::InvalidAddressFormat(s.to_string()));

    let mut octets = [0; 4];
    let mut parts = s.split('.');
    for octet in &mut octets {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *octet = part.parse::<u8>().map_err(|_| invalid())?;
    }

    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(Ipv4Addr::from(octets))
}

/// Serialise a string of octets to a quoted string with the
/// appropriate escaping.
fn serialise_octets(octets: &[u8]) -> String {
    let mut out = String::with_capacity(2 + octets.len());

    out.push('"');
    for octet in octets {
        if *octet == b'"' || *octet == b'\\' {
            out.push('\\');
            out.push(*octet as char);
        } else if *octet < 32 || *octet > 126 {
            out.push('\\');
            let digit3 = *octet % 10;
            let digit2 = (*octet / 10) % 10;
            let digit1 = (*octet / 100) % 10;
            out.push((digit1 + 48) as char);
            out.push((digit2 + 48) as char);
            out.push((digit3 + 48) as char);
        } else {
            out.push(*octet as char);
        }
    }
    out.push('"');

    out
}

/// Where an item sits in an encoded message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

impl Span {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// What sort of query this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Opcode {
    #[default]
    Standard,
    Inverse,
    Status,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OpcodeReserved(u8);

impl Opcode {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Opcode::Reserved(_))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Opcode::Standard => write!(f, "standard"),
            Opcode::Inverse => write!(f, "inverse"),
            Opcode::Status => write!(f, "status"),
            Opcode::Reserved(OpcodeReserved(n)) => write!(f, "reserved-{n}"),
        }
    }
}

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Standard,
            1 => Opcode::Inverse,
            2 => Opcode::Status,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Standard => 0,
            Opcode::Inverse => 1,
            Opcode::Status => 2,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// What sort of response this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Rcode {
    #[default]
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s
/// cannot be created.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RcodeReserved(u8);

impl Rcode {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Rcode::Reserved(_))
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rcode::NoError => write!(f, "no-error"),
            Rcode::FormatError => write!(f, "format-error"),
            Rcode::ServerFailure => write!(f, "server-failure"),
            Rcode::NameError => write!(f, "name-error"),
            Rcode::NotImplemented => write!(f, "not-implemented"),
            Rcode::Refused => write!(f, "refused"),
            Rcode::Reserved(RcodeReserved(n)) => write!(f, "reserved-{n}"),
        }
    }
}

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormatError,
            2 => Rcode::ServerFailure,
            3 => Rcode::NameError,
            4 => Rcode::NotImplemented,
            5 => Rcode::Refused,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormatError => 1,
            Rcode::ServerFailure => 2,
            Rcode::NameError => 3,
            Rcode::NotImplemented => 4,
            Rcode::Refused => 5,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

/// A domain name is a sequence of labels, where each label is a
/// length octet followed by that number of octets.  The last label is
/// always the empty root label.
///
/// A label must be 63 octets or shorter.  A name must be 255 octets
/// or shorter in total, including both length and label octets.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
    // INVARIANT: len == len(labels) + sum(map(len, labels))
    pub len: usize,
}

impl DomainName {
    pub fn root_domain() -> Self {
        DomainName {
            labels: vec![Label::new()],
            len: 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.len == 1 && self.labels[0].is_empty()
    }

    /// Compares whole labels, so `notexample.com.` is not a subdomain
    /// of `example.com.`.
    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.ends_with(&other.labels)
    }

    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.len);
        let mut first = true;
        for label in &self.labels {
            if first {
                first = false;
            } else {
                out.push('.');
            }
            for octet in &label.octets {
                match *octet {
                    b'.' | b'\\' => {
                        out.push('\\');
                        out.push(char::from(*octet));
                    }
                    33..=126 => out.push(char::from(*octet)),
                    _ => out.push_str(&format!("\\{octet:03}")),
                }
            }
        }

        out
    }

    /// Parse a dotted string.  The trailing dot is optional: both
    /// `"example.com"` and `"example.com."` give the same name.
    ///
    /// Within a label `\.` and `\\` stand for a literal dot and
    /// backslash, and `\DDD` for the octet with that decimal value, as
    /// produced by `to_dotted_string`.
    pub fn from_dotted_string(s: &str) -> Result<Self, Error> {
        if s == "." {
            return Ok(Self::root_domain());
        }

        let chars = s.as_bytes();
        let mut labels = Vec::new();
        let mut current = Vec::new();
        let mut ends_in_dot = false;
        let mut i = 0;

        while i < chars.len() {
            ends_in_dot = false;
            match chars[i] {
                b'.' => {
                    if current.is_empty() {
                        return Err(Error::new(ErrorKind::EmptyLabel));
                    }
                    labels.push(Label::try_from(current.as_slice())?);
                    current.clear();
                    ends_in_dot = true;
                    i += 1;
                }
                b'\\' => {
                    let (octet, used) = unescape(&chars[i + 1..])
                        .ok_or_else(|| Error::new(ErrorKind::InvalidEscape(s.to_string())))?;
                    current.push(octet);
                    i += 1 + used;
                }
                octet => {
                    current.push(octet);
                    i += 1;
                }
            }
        }

        if !current.is_empty() {
            labels.push(Label::try_from(current.as_slice())?);
        } else if !ends_in_dot {
            return Err(Error::new(ErrorKind::EmptyLabel));
        }
        labels.push(Label::new());

        Self::from_labels(labels)
    }

    /// The last label must be the root label, and must be the only
    /// empty one.
    pub fn from_labels(labels: Vec<Label>) -> Result<Self, Error> {
        match labels.last() {
            Some(label) if label.is_empty() => (),
            _ => return Err(Error::new(ErrorKind::EmptyLabel)),
        }

        let mut len = 0;
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() && i != labels.len() - 1 {
                return Err(Error::new(ErrorKind::EmptyLabel));
            }
            len += 1 + usize::from(label.len());
        }

        if len <= DOMAINNAME_MAX_LEN {
            Ok(Self { labels, len })
        } else {
            Err(Error::new(ErrorKind::NameTooLong { len }))
        }
    }
}

/// Decode the escape following a `\\`: either three decimal digits
/// or a single character taken literally.  Returns the octet and the
/// number of characters consumed.
fn unescape(chars: &[u8]) -> Option<(u8, usize)> {
    match chars {
        [d1, d2, d3, ..]
            if d1.is_ascii_digit() && d2.is_ascii_digit() && d3.is_ascii_digit() =>
        {
            let value = u16::from(d1 - b'0') * 100
                + u16::from(d2 - b'0') * 10
                + u16::from(d3 - b'0');
            u8::try_from(value).ok().map(|octet| (octet, 3))
        }
        [d, ..] if d.is_ascii_digit() => None,
        [c, ..] => Some((*c, 1)),
        [] => None,
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.to_dotted_string())
    }
}

impl FromStr for DomainName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_dotted_string(s)
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for DomainName {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_labels = u.int_in_range::<usize>(0..=10)?;
        let mut labels = Vec::new();
        for _ in 0..num_labels {
            labels.push(u.arbitrary()?);
        }
        labels.push(Label::new());
        DomainName::from_labels(labels).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

/// A label is just a sequence of octets.  A label can be no longer
/// than 63 octets.  Octets are kept as given: no case folding is done,
/// so names compare (and compress) octet-for-octet.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Label {
    /// Private to this module so constructing an invalid `Label` is
    /// impossible.
    octets: Bytes,
}

impl Label {
    /// Create a new, empty, label.
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn len(&self) -> u8 {
        // safe as the `TryFrom` ensures a label is <= 63 bytes
        self.octets.len().try_into().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn octets(&self) -> &Bytes {
        &self.octets
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = Error;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        if octets.len() > LABEL_MAX_LEN {
            return Err(Error::new(ErrorKind::LabelTooLong { len: octets.len() }));
        }

        Ok(Self {
            octets: Bytes::copy_from_slice(octets),
        })
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Label {
    // only generates non-empty labels
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Label> {
        let label_len = u.int_in_range::<u8>(1..=20)?;
        let bs = u.bytes(label_len.into())?;
        let octets = bs
            .iter()
            .map(|b| {
                let ascii_byte = if b.is_ascii() { *b } else { *b % 128 };
                if ascii_byte == b'.' || (ascii_byte as char).is_whitespace() {
                    b'x'
                } else {
                    ascii_byte
                }
            })
            .collect::<Vec<u8>>();
        Ok(Self {
            octets: Bytes::from(octets),
        })
    }
}

/// Query types are a superset of record types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryType {
    Record(RecordType),
    AXFR,
    MAILB,
    MAILA,
    Wildcard,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => rtype.fmt(f),
            QueryType::AXFR => write!(f, "AXFR"),
            QueryType::MAILA => write!(f, "MAILA"),
            QueryType::MAILB => write!(f, "MAILB"),
            QueryType::Wildcard => write!(f, "*"),
        }
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AXFR" => Ok(QueryType::AXFR),
            "MAILB" => Ok(QueryType::MAILB),
            "MAILA" => Ok(QueryType::MAILA),
            "*" | "ANY" => Ok(QueryType::Wildcard),
            _ => RecordType::from_str(s).map(QueryType::Record),
        }
    }
}

impl TryFrom<u16> for QueryType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            252 => Ok(QueryType::AXFR),
            253 => Ok(QueryType::MAILB),
            254 => Ok(QueryType::MAILA),
            255 => Ok(QueryType::Wildcard),
            _ => RecordType::try_from(value).map(QueryType::Record),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::AXFR => 252,
            QueryType::MAILB => 253,
            QueryType::MAILA => 254,
            QueryType::Wildcard => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        if u.ratio(4, 5)? {
            Ok(QueryType::Record(u.arbitrary()?))
        } else {
            Self::try_from(u.int_in_range::<u16>(252..=255)?)
                .map_err(|_| arbitrary::Error::IncorrectFormat)
        }
    }
}

/// Query classes are a superset of record classes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    Wildcard,
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => rclass.fmt(f),
            QueryClass::Wildcard => write!(f, "*"),
        }
    }
}

impl FromStr for QueryClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "*" | "ANY" => Ok(QueryClass::Wildcard),
            _ => RecordClass::from_str(s).map(QueryClass::Record),
        }
    }
}

impl TryFrom<u16> for QueryClass {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            255 => Ok(QueryClass::Wildcard),
            _ => RecordClass::try_from(value).map(QueryClass::Record),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Wildcard => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for QueryClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        if u.ratio(4, 5)? {
            Ok(QueryClass::Record(u.arbitrary()?))
        } else {
            Ok(QueryClass::Wildcard)
        }
    }
}

/// Record types are used by resource records and by queries.  These
/// are the types defined in RFC 1035: any other code is rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    NS,
    MD,
    MF,
    CNAME,
    SOA,
    MB,
    MG,
    MR,
    NULL,
    WKS,
    PTR,
    HINFO,
    MINFO,
    MX,
    TXT,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::MD => write!(f, "MD"),
            RecordType::MF => write!(f, "MF"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::MB => write!(f, "MB"),
            RecordType::MG => write!(f, "MG"),
            RecordType::MR => write!(f, "MR"),
            RecordType::NULL => write!(f, "NULL"),
            RecordType::WKS => write!(f, "WKS"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::HINFO => write!(f, "HINFO"),
            RecordType::MINFO => write!(f, "MINFO"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
        }
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "MD" => Ok(RecordType::MD),
            "MF" => Ok(RecordType::MF),
            "CNAME" => Ok(RecordType::CNAME),
            "SOA" => Ok(RecordType::SOA),
            "MB" => Ok(RecordType::MB),
            "MG" => Ok(RecordType::MG),
            "MR" => Ok(RecordType::MR),
            "NULL" => Ok(RecordType::NULL),
            "WKS" => Ok(RecordType::WKS),
            "PTR" => Ok(RecordType::PTR),
            "HINFO" => Ok(RecordType::HINFO),
            "MINFO" => Ok(RecordType::MINFO),
            "MX" => Ok(RecordType::MX),
            "TXT" => Ok(RecordType::TXT),
            _ => Err(Error::new(ErrorKind::UnknownRecordType(
                Unrecognised::Mnemonic(s.to_string()),
            ))),
        }
    }
}

impl TryFrom<u16> for RecordType {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RecordType::A),
            2 => Ok(RecordType::NS),
            3 => Ok(RecordType::MD),
            4 => Ok(RecordType::MF),
            5 => Ok(RecordType::CNAME),
            6 => Ok(RecordType::SOA),
            7 => Ok(RecordType::MB),
            8 => Ok(RecordType::MG),
            9 => Ok(RecordType::MR),
            10 => Ok(RecordType::NULL),
            11 => Ok(RecordType::WKS),
            12 => Ok(RecordType::PTR),
            13 => Ok(RecordType::HINFO),
            14 => Ok(RecordType::MINFO),
            15 => Ok(RecordType::MX),
            16 => Ok(RecordType::TXT),
            _ => Err(Error::new(ErrorKind::UnknownRecordType(Unrecognised::Code(
                value,
            )))),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::MD => 3,
            RecordType::MF => 4,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::MB => 7,
            RecordType::MG => 8,
            RecordType::MR => 9,
            RecordType::NULL => 10,
            RecordType::WKS => 11,
            RecordType::PTR => 12,
            RecordType::HINFO => 13,
            RecordType::MINFO => 14,
            RecordType::MX => 15,
            RecordType::TXT => 16,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordType {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Self::try_from(u.int_in_range::<u16>(1..=16)?).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

/// Record classes are used by resource records and by queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordClass {
    IN,
    CS,
    CH,
    HS,
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::CS => write!(f, "CS"),
            RecordClass::CH => write!(f, "CH"),
            RecordClass::HS => write!(f, "HS"),
        }
    }
}

impl FromStr for RecordClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(RecordClass::IN),
            "CS" => Ok(RecordClass::CS),
            "CH" => Ok(RecordClass::CH),
            "HS" => Ok(RecordClass::HS),
            _ => Err(Error::new(ErrorKind::UnknownRecordClass(
                Unrecognised::Mnemonic(s.to_string()),
            ))),
        }
    }
}

impl TryFrom<u16> for RecordClass {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RecordClass::IN),
            2 => Ok(RecordClass::CS),
            3 => Ok(RecordClass::CH),
            4 => Ok(RecordClass::HS),
            _ => Err(Error::new(ErrorKind::UnknownRecordClass(
                Unrecognised::Code(value),
            ))),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::CS => 2,
            RecordClass::CH => 3,
            RecordClass::HS => 4,
        }
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for RecordClass {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        Self::try_from(u.int_in_range::<u16>(1..=4)?).map_err(|_| arbitrary::Error::IncorrectFormat)
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Message {
    // Names are often drawn from earlier ones so that compression has
    // something to do, and `compress` is only left set where the
    // serialiser will find a target.
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        use crate::protocol::serialise::WritableBuffer;

        let mut names: Vec<DomainName> = Vec::new();

        let qdcount = u.int_in_range::<usize>(0..=8)?;
        let mut questions = Vec::with_capacity(qdcount);
        for _ in 0..qdcount {
            let name = test_util::arbitrary_related_name(u, &names)?;
            names.push(name.clone());
            questions.push(Question {
                name,
                qtype: u.arbitrary()?,
                qclass: u.arbitrary()?,
                compress: u.arbitrary()?,
            });
        }

        let ancount = u.int_in_range::<usize>(0..=8)?;
        let mut answers = Vec::with_capacity(ancount);
        for _ in 0..ancount {
            let name = test_util::arbitrary_related_name(u, &names)?;
            names.push(name.clone());
            let mut rr =
                ResourceRecord::new(name, u.arbitrary()?, u.arbitrary()?, u.arbitrary()?)
                    .map_err(|_| arbitrary::Error::IncorrectFormat)?;
            rr.compress = u.arbitrary()?;
            answers.push(rr);
        }

        let mut buffer = WritableBuffer::default();
        buffer.write_octets(&[0; HEADER_LEN]);
        for question in &mut questions {
            if question.compress && !buffer.plan_name(&question.name).is_compressed() {
                question.compress = false;
            }
            question
                .serialise(&mut buffer)
                .map_err(|_| arbitrary::Error::IncorrectFormat)?;
        }
        for rr in &mut answers {
            if rr.compress && !buffer.plan_name(&rr.name).is_compressed() {
                rr.compress = false;
            }
            rr.serialise(&mut buffer)
                .map_err(|_| arbitrary::Error::IncorrectFormat)?;
        }

        let mut header: Header = u.arbitrary()?;
        header.qdcount = u16::try_from(questions.len()).unwrap_or(u16::MAX);
        header.ancount = u16::try_from(answers.len()).unwrap_or(u16::MAX);
        header.nscount = 0;
        header.arcount = 0;

        Ok(Self {
            header,
            questions,
            answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn u16_flags_roundtrip() {
        for word in 0..=u16::MAX {
            assert_eq!(word, u16::from(Flags::from(word)));
        }
    }

    #[test]
    fn flags_layout() {
        let flags = Flags {
            is_response: true,
            opcode: Opcode::Status,
            is_authoritative: false,
            is_truncated: true,
            recursion_desired: false,
            recursion_available: true,
            z: 0b101,
            rcode: Rcode::Refused,
        };

        assert_eq!(0b1001_0010_1101_0101, u16::from(flags));
    }

    #[test]
    fn u8_opcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Opcode::from(i)), i);
        }
    }

    #[test]
    fn u8_rcode_roundtrip() {
        for i in 0..15 {
            assert_eq!(u8::from(Rcode::from(i)), i);
        }
    }

    #[test]
    fn u16_querytype_roundtrip() {
        for i in (1..=16).chain(252..=255) {
            assert_eq!(Ok(i), QueryType::try_from(i).map(u16::from));
        }
    }

    #[test]
    fn u16_recordtype_rejects_unknown() {
        for i in [0, 17, 28, 251, 252, 255, 65535] {
            assert_eq!(
                Err(Error::new(ErrorKind::UnknownRecordType(Unrecognised::Code(i)))),
                RecordType::try_from(i)
            );
        }
    }

    #[test]
    fn u16_recordclass_roundtrip() {
        for i in 1..=4 {
            assert_eq!(Ok(i), RecordClass::try_from(i).map(u16::from));
        }
        assert!(RecordClass::try_from(5).is_err());
        assert_eq!(Ok(QueryClass::Wildcard), QueryClass::try_from(255));
    }

    #[test]
    fn mnemonic_roundtrip() {
        for i in (1..=16).chain(252..=255) {
            let qtype = QueryType::try_from(i).unwrap();
            assert_eq!(Ok(qtype), qtype.to_string().parse::<QueryType>());
        }
        for i in 1..=4 {
            let rclass = RecordClass::try_from(i).unwrap();
            assert_eq!(Ok(rclass), rclass.to_string().parse::<RecordClass>());
        }
    }

    #[test]
    fn mnemonics_are_case_insensitive() {
        assert_eq!(Ok(RecordType::CNAME), "cname".parse::<RecordType>());
        assert_eq!(Ok(RecordClass::IN), "in".parse::<RecordClass>());
        assert_eq!(Ok(QueryType::Wildcard), "any".parse::<QueryType>());
    }

    #[test]
    fn unknown_mnemonic() {
        assert_eq!(
            Err(Error::new(ErrorKind::UnknownRecordType(
                Unrecognised::Mnemonic("AAAA".to_string())
            ))),
            "AAAA".parse::<RecordType>()
        );
        assert_eq!(
            Err(Error::new(ErrorKind::UnknownRecordClass(
                Unrecognised::Mnemonic("XX".to_string())
            ))),
            "XX".parse::<QueryClass>()
        );
    }

    #[test]
    fn domainname_root_conversions() {
        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::from_dotted_string(".")
        );

        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::from_labels(vec![Label::new()])
        );

        assert_eq!(".", DomainName::root_domain().to_dotted_string());
    }

    #[test]
    fn domainname_trailing_dot_is_optional() {
        assert_eq!(domain("www.example.com."), domain("www.example.com"));
        assert_eq!("www.example.com.", domain("www.example.com").to_string());
    }

    #[test]
    fn domainname_preserves_case() {
        assert_eq!("WwW.Example.COM.", domain("WwW.Example.COM").to_string());
    }

    #[test]
    fn domainname_empty_label() {
        assert_eq!(
            Err(Error::new(ErrorKind::EmptyLabel)),
            DomainName::from_dotted_string("www..com")
        );
        assert_eq!(
            Err(Error::new(ErrorKind::EmptyLabel)),
            DomainName::from_dotted_string("")
        );
    }

    #[test]
    fn domainname_escapes_roundtrip() {
        let name = DomainName::from_labels(vec![
            Label::try_from(&[0xC3_u8, 0xA9][..]).unwrap(),
            Label::try_from(&b"a.b\\c d"[..]).unwrap(),
            Label::new(),
        ])
        .unwrap();

        let dotted = name.to_dotted_string();
        assert_eq!("\\195\\169.a\\.b\\\\c\\032d.", dotted);
        assert_eq!(Ok(name), DomainName::from_dotted_string(&dotted));
    }

    #[test]
    fn domainname_bad_escapes() {
        for bad in ["a\\", "a\\256.com", "a\\12.com", "a\\1"] {
            assert_eq!(
                Err(Error::new(ErrorKind::InvalidEscape(bad.to_string()))),
                DomainName::from_dotted_string(bad)
            );
        }
    }

    #[test]
    fn domainname_label_boundary() {
        let ok = "a".repeat(63);
        let too_long = "a".repeat(64);

        assert_eq!(65, domain(&ok).len);
        assert_eq!(
            Err(Error::new(ErrorKind::LabelTooLong { len: 64 })),
            DomainName::from_dotted_string(&too_long)
        );
    }

    #[test]
    fn domainname_name_boundary() {
        // 3 * 64 + 62 + 1 = 255
        let label = "a".repeat(63);
        let ok = format!("{label}.{label}.{label}.{}", "b".repeat(61));
        let too_long = format!("{label}.{label}.{label}.{}", "b".repeat(62));

        assert_eq!(255, domain(&ok).len);
        assert_eq!(
            Err(Error::new(ErrorKind::NameTooLong { len: 256 })),
            DomainName::from_dotted_string(&too_long)
        );
    }

    #[test]
    fn is_subdomain_of_compares_labels() {
        assert!(domain("www.example.com.").is_subdomain_of(&domain("example.com.")));
        assert!(!domain("notexample.com.").is_subdomain_of(&domain("example.com.")));
    }

    #[test]
    fn parse_address_accepts_dotted_decimal() {
        assert_eq!(Ok(Ipv4Addr::new(8, 8, 8, 8)), parse_address("8.8.8.8"));
        assert_eq!(Ok(Ipv4Addr::new(255, 0, 10, 1)), parse_address("255.0.10.1"));
    }

    #[test]
    fn parse_address_rejects_malformed() {
        for bad in ["", "1.2.3", "1.2.3.4.5", "1.2.3.256", "1.2.-3.4", "a.b.c.d", "1..3.4", "+1.2.3.4"] {
            assert_eq!(
                Err(Error::new(ErrorKind::InvalidAddressFormat(bad.to_string()))),
                parse_address(bad),
                "{bad}"
            );
        }
    }

    #[test]
    fn record_from_presentation() {
        let rr = ResourceRecord::from_presentation("example.com", "A", "IN", 60, "8.8.8.8").unwrap();

        assert_eq!(a_record("example.com.", Ipv4Addr::new(8, 8, 8, 8), 60), rr);
        assert_eq!(4, rr.rdlength);
        assert_eq!("8.8.8.8", rr.rdata_string());
    }

    #[test]
    fn record_from_presentation_opaque() {
        let rr = ResourceRecord::from_presentation("example.com", "TXT", "IN", 60, "hi\n").unwrap();

        assert_eq!(3, rr.rdlength);
        assert_eq!("\"hi\\010\"", rr.rdata_string());
    }

    #[test]
    fn record_from_presentation_bad_address() {
        assert_eq!(
            Err(Error::new(ErrorKind::InvalidAddressFormat("8.8.8".to_string()))),
            ResourceRecord::from_presentation("example.com", "A", "IN", 60, "8.8.8")
        );
    }

    #[test]
    fn push_answer_keeps_count() {
        let mut message = Message::from_question(1, question("example.com.", QueryType::Record(RecordType::A)))
            .make_response();
        message.push_answer(a_record("example.com.", Ipv4Addr::LOCALHOST, 300));

        assert_eq!(1, message.header.qdcount);
        assert_eq!(1, message.header.ancount);
        assert!(message.header.flags.is_response);
    }
}

#[cfg(any(feature = "test-util", test))]
#[allow(clippy::missing_panics_doc)]
pub mod test_util {
    use super::*;

    use arbitrary::{Arbitrary, Unstructured};
    use rand::Rng;

    /// Generate a value from random bytes, retrying with a larger
    /// buffer if it runs out.
    pub fn arbitrary_value<T: for<'a> Arbitrary<'a>>() -> T {
        let mut rng = rand::rng();
        for size in [128, 256, 512, 1024, 2048, 4096] {
            let mut buf = Vec::with_capacity(size);
            for _ in 0..size {
                buf.push(rng.random());
            }

            if let Ok(value) = T::arbitrary(&mut Unstructured::new(&buf)) {
                return value;
            }
        }

        panic!("could not generate arbitrary value!");
    }

    pub fn arbitrary_message() -> Message {
        arbitrary_value()
    }

    pub fn arbitrary_resourcerecord() -> ResourceRecord {
        arbitrary_value()
    }

    /// A name which is often the same as, a suffix of, or an extension
    /// of one of `names`.
    pub fn arbitrary_related_name(
        u: &mut Unstructured,
        names: &[DomainName],
    ) -> arbitrary::Result<DomainName> {
        if names.is_empty() || u.ratio(1, 4)? {
            return u.arbitrary();
        }

        let base = u.choose(names)?;
        let name = match u.int_in_range::<u8>(0..=2)? {
            0 => base.clone(),
            1 => {
                let skip = u.int_in_range(0..=base.labels.len() - 1)?;
                DomainName::from_labels(base.labels[skip..].to_vec())
                    .map_err(|_| arbitrary::Error::IncorrectFormat)?
            }
            _ => {
                let mut labels = vec![u.arbitrary::<Label>()?];
                labels.extend_from_slice(&base.labels);
                DomainName::from_labels(labels).map_err(|_| arbitrary::Error::IncorrectFormat)?
            }
        };
        Ok(name)
    }

    pub fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    pub fn question(name: &str, qtype: QueryType) -> Question {
        Question::new(domain(name), qtype, QueryClass::Record(RecordClass::IN))
    }

    pub fn a_record(name: &str, address: Ipv4Addr, ttl: u32) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::A { address },
            RecordClass::IN,
            ttl,
        )
        .unwrap()
    }

    pub fn opaque_record(name: &str, rtype: RecordType, octets: &[u8]) -> ResourceRecord {
        ResourceRecord::new(
            domain(name),
            RecordTypeWithData::Opaque {
                rtype,
                octets: Bytes::copy_from_slice(octets),
            },
            RecordClass::IN,
            300,
        )
        .unwrap()
    }
}

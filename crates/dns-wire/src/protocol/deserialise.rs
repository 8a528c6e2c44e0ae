//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use bytes::Bytes;
use std::net::Ipv4Addr;

use crate::protocol::compression::NameEncoding;
use crate::protocol::error::{Error, ErrorKind, Stage};
use crate::protocol::types::*;

/// Maximum number of length octets read while decoding one name.
pub const NAME_MAX_READS: usize = 256;

/// Maximum number of compression pointers followed while decoding one
/// name.
pub const NAME_MAX_POINTER_HOPS: usize = 16;

/// Upper bound on space reserved up front for a section, so a bogus
/// count in a short message cannot cause a large allocation.
const SECTION_PREALLOCATE: usize = 64;

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    /// Decode the header, `QDCOUNT` questions, and `ANCOUNT` answers.
    /// Anything after the answer section is left unread.
    ///
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let _span = tracing::trace_span!("deserialise", len = buffer.octets.len()).entered();

        let header = Header::deserialise(buffer)?;
        let questions = deserialise_questions(buffer, header.qdcount)?
            .into_iter()
            .map(|(question, _)| question)
            .collect();
        let answers = deserialise_resource_records(buffer, header.ancount)?
            .into_iter()
            .map(|(rr, _)| rr)
            .collect();

        tracing::trace!(
            id = header.id,
            consumed = buffer.position(),
            "deserialised message"
        );

        Ok(Self {
            header,
            questions,
            answers,
        })
    }
}

/// Deserialise `count` questions, along with where each one was found.
///
/// # Errors
///
/// If any question cannot be parsed.
pub fn deserialise_questions(
    buffer: &mut ConsumableBuffer,
    count: u16,
) -> Result<Vec<(Question, Span)>, Error> {
    let mut questions = Vec::with_capacity(usize::from(count).min(SECTION_PREALLOCATE));
    for index in 0..usize::from(count) {
        let offset = buffer.position();
        let question = Question::deserialise(buffer)
            .map_err(|error| error.in_stage(Stage::Question(index)))?;
        let span = Span {
            offset,
            len: buffer.position() - offset,
        };
        tracing::trace!(index, offset, len = span.len, %question, "deserialised question");
        questions.push((question, span));
    }
    Ok(questions)
}

/// Deserialise `count` resource records, along with where each one
/// was found.
///
/// # Errors
///
/// If any record cannot be parsed.
pub fn deserialise_resource_records(
    buffer: &mut ConsumableBuffer,
    count: u16,
) -> Result<Vec<(ResourceRecord, Span)>, Error> {
    let mut rrs = Vec::with_capacity(usize::from(count).min(SECTION_PREALLOCATE));
    for index in 0..usize::from(count) {
        let offset = buffer.position();
        let rr = ResourceRecord::deserialise(buffer)
            .map_err(|error| error.in_stage(Stage::ResourceRecord(index)))?;
        let span = Span {
            offset,
            len: buffer.position() - offset,
        };
        tracing::trace!(index, offset, len = span.len, %rr, "deserialised resource record");
        rrs.push((rr, span));
    }
    Ok(rrs)
}

impl Header {
    /// # Errors
    ///
    /// If the header is too short.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let mut words = [0; HEADER_LEN / 2];
        for word in &mut words {
            *word = buffer
                .next_u16()
                .ok_or_else(|| Error::truncated(buffer.position()).in_stage(Stage::Header))?;
        }
        let [id, flags, qdcount, ancount, nscount, arcount] = words;

        Ok(Self {
            id,
            flags: Flags::from(flags),
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    /// # Errors
    ///
    /// If the question cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let (name, encoding) = DomainName::deserialise_with_encoding(buffer)?;
        let qtype = QueryType::deserialise(buffer)?;
        let qclass = QueryClass::deserialise(buffer)?;

        Ok(Self {
            name,
            qtype,
            qclass,
            compress: encoding.is_compressed(),
        })
    }
}

impl ResourceRecord {
    /// Only `A` records have their RDATA interpreted, and must have an
    /// RDLENGTH of 4.  Every other type is kept as opaque octets.
    ///
    /// # Errors
    ///
    /// If the record cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let (name, encoding) = DomainName::deserialise_with_encoding(buffer)?;
        let rtype = RecordType::deserialise(buffer)?;
        let rclass = RecordClass::deserialise(buffer)?;

        let ttl_at = buffer.position();
        let ttl = buffer.next_u32().ok_or_else(|| Error::truncated(ttl_at))?;

        let rdlength_at = buffer.position();
        let rdlength = buffer
            .next_u16()
            .ok_or_else(|| Error::truncated(rdlength_at))?;

        if rtype == RecordType::A && rdlength != 4 {
            return Err(Error::new(ErrorKind::RdataLengthMismatch {
                declared: rdlength,
                actual: 4,
            })
            .at(rdlength_at));
        }

        let rdata_at = buffer.position();
        let rdata = buffer
            .take(usize::from(rdlength))
            .ok_or_else(|| Error::truncated(rdata_at))?;

        let rtype_with_data = match rtype {
            RecordType::A => {
                let octets: [u8; 4] = rdata.try_into().map_err(|_| {
                    Error::new(ErrorKind::RdataLengthMismatch {
                        declared: rdlength,
                        actual: 4,
                    })
                    .at(rdlength_at)
                })?;
                RecordTypeWithData::A {
                    address: Ipv4Addr::from(octets),
                }
            }
            rtype => RecordTypeWithData::Opaque {
                rtype,
                octets: Bytes::copy_from_slice(rdata),
            },
        };

        Ok(Self {
            name,
            rtype_with_data,
            rclass,
            ttl,
            rdlength,
            compress: encoding.is_compressed(),
        })
    }
}

impl DomainName {
    /// # Errors
    ///
    /// If the domain cannot be parsed.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        Self::deserialise_with_encoding(buffer).map(|(name, _)| name)
    }

    /// Decode a name, following compression pointers, and report how
    /// it was laid out.  The buffer is left just after the name as it
    /// appears at the current position: after the first pointer, if
    /// there is one.
    ///
    /// A pointer must refer to an offset before the start of the run
    /// of labels it ends, so every hop moves strictly backwards.
    ///
    /// # Errors
    ///
    /// If the domain cannot be parsed.
    pub fn deserialise_with_encoding(
        buffer: &mut ConsumableBuffer,
    ) -> Result<(Self, NameEncoding), Error> {
        let octets = buffer.octets;
        let start = buffer.position;

        let mut labels = Vec::<Label>::with_capacity(5);
        let mut len = 0;
        let mut position = start;
        let mut run_start = start;
        let mut hops = 0;
        let mut reads = 0;
        let mut prefix_labels = 0;
        let mut first_pointer: Option<(u16, usize)> = None;

        loop {
            reads += 1;
            if reads > NAME_MAX_READS {
                return Err(Error::truncated(position));
            }

            let size = *octets
                .get(position)
                .ok_or_else(|| Error::truncated(position))?;

            match size & POINTER_TAG {
                0 => {
                    if size == 0 {
                        labels.push(Label::new());
                        len += 1;
                        position += 1;
                        break;
                    }

                    let label_start = position + 1;
                    let label_octets = octets
                        .get(label_start..label_start + usize::from(size))
                        .ok_or_else(|| Error::truncated(position))?;
                    labels.push(Label::try_from(label_octets).map_err(|error| error.at(position))?);
                    len += 1 + usize::from(size);

                    // the terminator needs one more octet
                    if len >= DOMAINNAME_MAX_LEN {
                        return Err(
                            Error::new(ErrorKind::NameTooLong { len: len + 1 }).at(start)
                        );
                    }

                    if first_pointer.is_none() {
                        prefix_labels += 1;
                    }
                    position = label_start + usize::from(size);
                }
                POINTER_TAG => {
                    let lo = *octets
                        .get(position + 1)
                        .ok_or_else(|| Error::truncated(position))?;
                    let target = u16::from_be_bytes([size & !POINTER_TAG, lo]);

                    hops += 1;
                    if usize::from(target) >= run_start || hops > NAME_MAX_POINTER_HOPS {
                        return Err(Error::new(ErrorKind::CompressionLoop).at(position));
                    }

                    if first_pointer.is_none() {
                        first_pointer = Some((target, position + 2));
                    }
                    position = usize::from(target);
                    run_start = position;
                }
                _ => {
                    return Err(Error::new(ErrorKind::LabelTooLong {
                        len: usize::from(size),
                    })
                    .at(position));
                }
            }
        }

        let encoding = match first_pointer {
            None => {
                buffer.position = position;
                NameEncoding::Literal
            }
            Some((target, after)) => {
                buffer.position = after;
                if prefix_labels == 0 {
                    NameEncoding::Pointer(target)
                } else {
                    NameEncoding::Hybrid {
                        prefix_labels,
                        offset: target,
                    }
                }
            }
        };

        Ok((DomainName { labels, len }, encoding))
    }
}

impl QueryType {
    /// # Errors
    ///
    /// If the query type is too short or not known.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let at = buffer.position();
        let value = buffer.next_u16().ok_or_else(|| Error::truncated(at))?;
        Self::try_from(value).map_err(|error| error.at(at))
    }
}

impl QueryClass {
    /// # Errors
    ///
    /// If the query class is too short or not known.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let at = buffer.position();
        let value = buffer.next_u16().ok_or_else(|| Error::truncated(at))?;
        Self::try_from(value).map_err(|error| error.at(at))
    }
}

impl RecordType {
    /// # Errors
    ///
    /// If the record type is too short or not known.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let at = buffer.position();
        let value = buffer.next_u16().ok_or_else(|| Error::truncated(at))?;
        Self::try_from(value).map_err(|error| error.at(at))
    }
}

impl RecordClass {
    /// # Errors
    ///
    /// If the record class is too short or not known.
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let at = buffer.position();
        let value = buffer.next_u16().ok_or_else(|| Error::truncated(at))?;
        Self::try_from(value).map_err(|error| error.at(at))
    }
}

/// A buffer which will be consumed by the parsing process.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        if self.octets.len() > self.position + 1 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            self.position += 2;
            Some(u16::from_be_bytes([a, b]))
        } else {
            None
        }
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        if self.octets.len() > self.position + 3 {
            let a = self.octets[self.position];
            let b = self.octets[self.position + 1];
            let c = self.octets[self.position + 2];
            let d = self.octets[self.position + 3];
            self.position += 4;
            Some(u32::from_be_bytes([a, b, c, d]))
        } else {
            None
        }
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.octets.len() >= self.position + size {
            let slice = &self.octets[self.position..self.position + size];
            self.position += size;
            Some(slice)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::serialise::{serialise_questions, WritableBuffer};
    use crate::protocol::types::test_util::*;

    #[rustfmt::skip]
    const EXAMPLE_MESSAGE: [u8; 45] = [
        // HEADER
        0x04, 0xD2, // ID
        0b1000_0000, 0b0000_0000, // flags
        0, 1, 0, 1, 0, 0, 0, 0, // counts
        // QNAME
        7, 101, 120, 97, 109, 112, 108, 101, // "example"
        3, 99, 111, 109, 0, // "com"
        // QTYPE, QCLASS
        0, 1, 0, 1,
        // NAME
        0b1100_0000, 0b0000_1100, // pointer to "example.com"
        // TYPE, CLASS
        0, 1, 0, 1,
        // TTL
        0, 0, 0, 60,
        // RDLENGTH
        0, 4,
        // RDATA
        8, 8, 8, 8,
    ];

    fn decode_name(octets: &[u8]) -> Result<(DomainName, NameEncoding, usize), Error> {
        let mut buffer = ConsumableBuffer::new(octets);
        let (name, encoding) = DomainName::deserialise_with_encoding(&mut buffer)?;
        Ok((name, encoding, buffer.position()))
    }

    #[test]
    fn deserialise_example_message() {
        let message = Message::from_octets(&EXAMPLE_MESSAGE).unwrap();

        assert_eq!(0x04D2, message.header.id);
        assert!(message.header.flags.is_response);
        assert_eq!(1, message.header.qdcount);
        assert_eq!(1, message.header.ancount);

        assert_eq!(
            vec![question("example.com.", QueryType::Record(RecordType::A))],
            message.questions
        );

        let mut expected = a_record("example.com.", Ipv4Addr::new(8, 8, 8, 8), 60);
        expected.compress = true;
        assert_eq!(vec![expected], message.answers);
        assert_eq!("8.8.8.8", message.answers[0].rdata_string());
    }

    #[test]
    fn example_message_roundtrip() {
        let message = Message::from_octets(&EXAMPLE_MESSAGE).unwrap();

        assert_eq!(EXAMPLE_MESSAGE.to_vec(), message.to_octets().unwrap());
    }

    #[test]
    fn every_truncation_fails() {
        for len in 0..EXAMPLE_MESSAGE.len() {
            let err = Message::from_octets(&EXAMPLE_MESSAGE[..len]).unwrap_err();
            assert_eq!(ErrorKind::Truncated, err.kind, "{len}");
        }
    }

    #[test]
    fn truncated_header() {
        let err = Message::from_octets(&EXAMPLE_MESSAGE[..7]).unwrap_err();

        assert_eq!(Some(Stage::Header), err.stage);
        assert_eq!(Some(6), err.offset);
    }

    #[test]
    fn header_flags_roundtrip() {
        for word in 0..=u16::MAX {
            let mut octets = [0; HEADER_LEN];
            octets[2..4].copy_from_slice(&word.to_be_bytes());

            let header = Header::deserialise(&mut ConsumableBuffer::new(&octets)).unwrap();
            let mut buffer = WritableBuffer::default();
            header.serialise(&mut buffer);

            assert_eq!(octets.to_vec(), buffer.octets);
        }
    }

    #[test]
    fn trailing_octets_are_ignored() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets.extend_from_slice(&[1, 2, 3]);

        assert_eq!(
            Message::from_octets(&EXAMPLE_MESSAGE),
            Message::from_octets(&octets)
        );
    }

    #[test]
    fn label_boundary() {
        let mut ok = vec![63];
        ok.extend_from_slice(&[b'a'; 63]);
        ok.push(0);

        let (name, encoding, consumed) = decode_name(&ok).unwrap();
        assert_eq!(65, name.len);
        assert_eq!(NameEncoding::Literal, encoding);
        assert_eq!(65, consumed);

        let mut too_long = vec![64];
        too_long.extend_from_slice(&[b'a'; 64]);
        too_long.push(0);

        let err = decode_name(&too_long).unwrap_err();
        assert_eq!(ErrorKind::LabelTooLong { len: 64 }, err.kind);
        assert_eq!(Some(0), err.offset);
    }

    #[test]
    fn reserved_label_tag() {
        assert_eq!(
            ErrorKind::LabelTooLong { len: 0b1000_0001 },
            decode_name(&[0b1000_0001, 0]).unwrap_err().kind
        );
    }

    #[test]
    fn unterminated_name() {
        let err = decode_name(&[3, b'w', b'w', b'w', 3, b'c', b'o', b'm']).unwrap_err();

        assert_eq!(ErrorKind::Truncated, err.kind);
        assert_eq!(Some(8), err.offset);
    }

    #[test]
    fn name_too_long() {
        let mut octets = Vec::new();
        for _ in 0..4 {
            octets.push(63);
            octets.extend_from_slice(&[b'a'; 63]);
        }
        octets.push(0);

        assert_eq!(
            ErrorKind::NameTooLong { len: 257 },
            decode_name(&octets).unwrap_err().kind
        );
    }

    #[test]
    fn name_of_max_length() {
        let mut octets = Vec::new();
        for _ in 0..3 {
            octets.push(63);
            octets.extend_from_slice(&[b'a'; 63]);
        }
        octets.push(61);
        octets.extend_from_slice(&[b'b'; 61]);
        octets.push(0);

        let (name, encoding, position) = decode_name(&octets).unwrap();

        assert_eq!(255, name.len);
        assert_eq!(5, name.labels.len());
        assert_eq!(NameEncoding::Literal, encoding);
        assert_eq!(255, position);
    }

    #[test]
    fn pointer_to_self() {
        let err = decode_name(&[0b1100_0000, 0]).unwrap_err();

        assert_eq!(ErrorKind::CompressionLoop, err.kind);
        assert_eq!(Some(0), err.offset);
    }

    #[test]
    fn pointer_forwards() {
        assert_eq!(
            ErrorKind::CompressionLoop,
            decode_name(&[1, b'a', 0b1100_0000, 4, 0]).unwrap_err().kind
        );
    }

    #[test]
    fn pointer_into_own_label_run() {
        // "a" then a pointer back to "a": a loop
        assert_eq!(
            ErrorKind::CompressionLoop,
            decode_name(&[1, b'a', 0b1100_0000, 0]).unwrap_err().kind
        );
    }

    #[test]
    fn pointer_hop_limit() {
        // a root name at 0, then a chain of pointers each pointing to
        // the one before
        let mut octets = vec![0, 0];
        for i in 0..20u8 {
            octets.extend_from_slice(&[0b1100_0000, i * 2]);
        }

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.take(2 * NAME_MAX_POINTER_HOPS).unwrap();
        assert_eq!(
            Ok(DomainName::root_domain()),
            DomainName::deserialise(&mut buffer)
        );

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.take(2 * NAME_MAX_POINTER_HOPS + 2).unwrap();
        assert_eq!(
            ErrorKind::CompressionLoop,
            DomainName::deserialise(&mut buffer).unwrap_err().kind
        );
    }

    #[test]
    #[rustfmt::skip]
    fn hybrid_name() {
        let octets = [
            3, b'c', b'o', b'm', 0,
            3, b'w', b'w', b'w', 0b1100_0000, 0,
            0xFF,
        ];

        let mut buffer = ConsumableBuffer::new(&octets);
        buffer.take(5).unwrap();
        let (name, encoding) = DomainName::deserialise_with_encoding(&mut buffer).unwrap();

        assert_eq!(domain("www.com."), name);
        assert_eq!(
            NameEncoding::Hybrid {
                prefix_labels: 1,
                offset: 0
            },
            encoding
        );
        assert_eq!(11, buffer.position());
    }

    #[test]
    #[rustfmt::skip]
    fn shared_tail_reencodes() {
        let octets = [
            // HEADER
            0, 1, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0,
            // QNAME
            3, b'w', b'w', b'w', 7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0,
            0, 1, 0, 1,
            // QNAME
            4, b'm', b'a', b'i', b'l', 0b1100_0000, 16, // pointer to "example.com"
            0, 1, 0, 1,
        ];

        let message = Message::from_octets(&octets).unwrap();
        assert_eq!(domain("mail.example.com."), message.questions[1].name);
        assert!(message.questions[1].compress);

        let response = message.make_response();
        let reencoded = response.to_octets().unwrap();

        assert_eq!(octets[4..].to_vec(), reencoded[4..].to_vec());
        assert_eq!(Ok(response), Message::from_octets(&reencoded));
    }

    #[test]
    fn a_record_needs_four_octets() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets[40] = 5;
        octets.push(8);

        let err = Message::from_octets(&octets).unwrap_err();
        assert_eq!(
            ErrorKind::RdataLengthMismatch {
                declared: 5,
                actual: 4
            },
            err.kind
        );
        assert_eq!(Some(Stage::ResourceRecord(0)), err.stage);
        assert_eq!(Some(39), err.offset);
    }

    #[test]
    fn unknown_record_type() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets[32] = 99;

        let err = Message::from_octets(&octets).unwrap_err();
        assert_eq!(
            "unknown record type code 99 in resource record 0 at offset 31",
            err.to_string()
        );
    }

    #[test]
    fn query_only_type_in_record() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets[32] = 252;

        assert_eq!(
            ErrorKind::UnknownRecordType(crate::protocol::error::Unrecognised::Code(252)),
            Message::from_octets(&octets).unwrap_err().kind
        );
    }

    #[test]
    fn query_only_type_in_question() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets[26] = 255;
        octets[28] = 255;

        let message = Message::from_octets(&octets).unwrap();
        assert_eq!(QueryType::Wildcard, message.questions[0].qtype);
        assert_eq!(QueryClass::Wildcard, message.questions[0].qclass);
    }

    #[test]
    fn unknown_question_class() {
        let mut octets = EXAMPLE_MESSAGE.to_vec();
        octets[28] = 9;

        let err = Message::from_octets(&octets).unwrap_err();
        assert_eq!(Some(Stage::Question(0)), err.stage);
        assert_eq!(Some(27), err.offset);
    }

    #[test]
    fn spans_match_serialiser() {
        let mut questions = vec![
            question("www.example.com.", QueryType::Record(RecordType::A)),
            question("example.com.", QueryType::Record(RecordType::NS)),
            question("mail.example.com.", QueryType::MAILA),
        ];
        questions[1].compress = true;

        let mut buf = WritableBuffer::default();
        buf.write_octets(&[0; HEADER_LEN]);
        let spans = serialise_questions(&questions, &mut buf).unwrap();

        let mut buffer = ConsumableBuffer::new(&buf.octets);
        buffer.take(HEADER_LEN).unwrap();
        let decoded = deserialise_questions(&mut buffer, 3).unwrap();

        assert_eq!(
            questions.into_iter().zip(spans).collect::<Vec<_>>(),
            decoded
        );
    }

    #[test]
    fn arbitrary_message_roundtrip() {
        for _ in 0..100 {
            let message = arbitrary_message();
            let octets = message.to_octets().unwrap();

            assert_eq!(Ok(message), Message::from_octets(&octets));
        }
    }

    #[test]
    fn arbitrary_resourcerecord_roundtrip() {
        for _ in 0..100 {
            let rr = arbitrary_resourcerecord();
            let mut buf = WritableBuffer::default();
            rr.serialise(&mut buf).unwrap();

            assert_eq!(
                Ok(rr),
                ResourceRecord::deserialise(&mut ConsumableBuffer::new(&buf.octets))
            );
        }
    }
}

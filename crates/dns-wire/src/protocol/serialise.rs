//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.

use bytes::{BufMut, BytesMut};

use crate::protocol::compression::{CompressionTable, NameEncoding};
use crate::protocol::error::{Error, ErrorKind, Stage};
use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn to_octets(&self) -> Result<BytesMut, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// The header counts are written as given, not recomputed from
    /// the sections.
    ///
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let _span = tracing::trace_span!("serialise", id = self.header.id).entered();

        self.header.serialise(buffer);
        serialise_questions(&self.questions, buffer)?;
        serialise_resource_records(&self.answers, buffer)?;

        tracing::trace!(len = buffer.index(), "serialised message");
        Ok(())
    }
}

/// Serialise each question in turn, returning where each one ended up.
///
/// # Errors
///
/// If any question cannot be serialised.
pub fn serialise_questions(
    questions: &[Question],
    buffer: &mut WritableBuffer,
) -> Result<Vec<Span>, Error> {
    let mut spans = Vec::with_capacity(questions.len());
    for (index, question) in questions.iter().enumerate() {
        let span = question
            .serialise(buffer)
            .map_err(|error| error.in_stage(Stage::Question(index)))?;
        tracing::trace!(
            index,
            offset = span.offset,
            len = span.len,
            "serialised question"
        );
        spans.push(span);
    }
    Ok(spans)
}

/// Serialise each record in turn, returning where each one ended up.
///
/// # Errors
///
/// If any record cannot be serialised.
pub fn serialise_resource_records(
    rrs: &[ResourceRecord],
    buffer: &mut WritableBuffer,
) -> Result<Vec<Span>, Error> {
    let mut spans = Vec::with_capacity(rrs.len());
    for (index, rr) in rrs.iter().enumerate() {
        let span = rr
            .serialise(buffer)
            .map_err(|error| error.in_stage(Stage::ResourceRecord(index)))?;
        tracing::trace!(
            index,
            offset = span.offset,
            len = span.len,
            "serialised resource record"
        );
        spans.push(span);
    }
    Ok(spans)
}

impl Header {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.id);
        buffer.write_u16(self.flags.into());
        buffer.write_u16(self.qdcount);
        buffer.write_u16(self.ancount);
        buffer.write_u16(self.nscount);
        buffer.write_u16(self.arcount);
    }
}

impl Question {
    /// # Errors
    ///
    /// If the name is marked for compression but cannot be compressed.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<Span, Error> {
        let start = buffer.index();

        self.name.serialise(buffer, self.compress)?;
        self.qtype.serialise(buffer);
        self.qclass.serialise(buffer);

        Ok(Span {
            offset: start,
            len: buffer.index() - start,
        })
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the name is marked for compression but cannot be
    /// compressed, if the RDATA does not have the declared length, or
    /// if an `A` record carries opaque data.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<Span, Error> {
        let start = buffer.index();

        self.name.serialise(buffer, self.compress)?;
        self.rtype_with_data.rtype().serialise(buffer);
        self.rclass.serialise(buffer);
        buffer.write_u32(self.ttl);

        let rdlength_index = buffer.index();
        let actual = self.rtype_with_data.rdata_len();
        if usize::from(self.rdlength) != actual {
            return Err(Error::new(ErrorKind::RdataLengthMismatch {
                declared: self.rdlength,
                actual,
            })
            .at(rdlength_index));
        }
        buffer.write_u16(self.rdlength);

        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::Opaque {
                rtype: RecordType::A,
                octets,
            } => {
                return Err(Error::new(ErrorKind::InvalidAddressFormat(
                    String::from_utf8_lossy(octets).into_owned(),
                ))
                .at(rdlength_index + 2));
            }
            RecordTypeWithData::Opaque { octets, .. } => buffer.write_octets(octets),
        }

        Ok(Span {
            offset: start,
            len: buffer.index() - start,
        })
    }
}

impl DomainName {
    /// Write the name, as a pointer (or literal labels ending in a
    /// pointer) if `compress` is set.
    ///
    /// # Errors
    ///
    /// If `compress` is set and there is no earlier name to point at,
    /// or if the name is too long.
    pub fn serialise(
        &self,
        buffer: &mut WritableBuffer,
        compress: bool,
    ) -> Result<NameEncoding, Error> {
        let offset = buffer.index();

        if self.len > DOMAINNAME_MAX_LEN {
            return Err(Error::new(ErrorKind::NameTooLong { len: self.len }).at(offset));
        }

        let encoding = if compress {
            buffer.plan_name(self)
        } else {
            NameEncoding::Literal
        };

        if compress && !encoding.is_compressed() {
            return Err(Error::new(ErrorKind::NoCompressionTarget {
                name: self.to_dotted_string(),
            })
            .at(offset));
        }

        let literal_labels = match encoding {
            NameEncoding::Literal => self.labels.len(),
            NameEncoding::Pointer(_) => 0,
            NameEncoding::Hybrid { prefix_labels, .. } => prefix_labels,
        };

        for label in &self.labels[..literal_labels] {
            buffer.write_u8(label.len());
            buffer.write_octets(label.octets());
        }

        match encoding {
            NameEncoding::Literal => (),
            NameEncoding::Pointer(target) | NameEncoding::Hybrid { offset: target, .. } => {
                buffer.write_pointer(target);
            }
        }

        buffer.compression.record(self, encoding, offset);

        Ok(encoding)
    }
}

impl QueryType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl QueryClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

/// A buffer which can be written to, for serialisation purposes.
/// Offsets, and so compression pointers, are relative to the start of
/// the buffer: it should start out empty.
pub struct WritableBuffer {
    pub octets: BytesMut,
    compression: CompressionTable,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: BytesMut::with_capacity(512),
            compression: CompressionTable::new(),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    /// How `name` would be written if it were compressed now.
    pub fn plan_name(&self, name: &DomainName) -> NameEncoding {
        self.compression.plan(name)
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.put_u8(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_octets(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_octets(&value.to_be_bytes());
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.put_slice(octets);
    }

    fn write_pointer(&mut self, offset: u16) {
        self.write_u16((u16::from(POINTER_TAG) << 8) | offset);
    }
}

//! Name compression bookkeeping for the serialiser.
//!
//! Every label of a name written out in full is a place a later name
//! can point to: the name formed by that label and the ones after it
//! is a "target".  A later name equal to any target is written as a
//! single pointer.  A later name which merely *ends* in an earlier
//! name is written as its leading labels followed by a pointer.  The
//! ending must be an earlier name in its own right or, failing that,
//! the tail of one with at least two labels: sharing only a top-level
//! domain is not enough.  So after `www.example.com.` both
//! `example.com.` and `mail.example.com.` are compressed, but after
//! `example.com.` a following `notexample.com.` is written out in
//! full.

use std::collections::HashMap;

use crate::protocol::types::*;

/// How a name is (or will be) laid out on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NameEncoding {
    /// Every label in full, ending in the root label.
    Literal,
    /// A two octet pointer to an earlier occurrence of the whole name.
    Pointer(u16),
    /// The first `prefix_labels` labels in full, then a pointer to an
    /// earlier occurrence of the rest.
    Hybrid { prefix_labels: usize, offset: u16 },
}

impl NameEncoding {
    pub fn is_compressed(&self) -> bool {
        !matches!(self, NameEncoding::Literal)
    }

    /// Number of octets `name` takes up with this encoding.
    pub fn wire_len(&self, name: &DomainName) -> usize {
        match self {
            NameEncoding::Literal => name.len,
            NameEncoding::Pointer(_) => 2,
            NameEncoding::Hybrid { prefix_labels, .. } => {
                name.labels[..*prefix_labels]
                    .iter()
                    .map(|label| 1 + usize::from(label.len()))
                    .sum::<usize>()
                    + 2
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Target {
    offset: u16,
    /// Whether this label sequence has appeared as a complete name,
    /// rather than only as the tail of a longer one.
    whole: bool,
}

/// Offsets of every name (and name tail) written so far.
#[derive(Debug, Clone, Default)]
pub struct CompressionTable {
    targets: HashMap<Vec<Label>, Target>,
}

impl CompressionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Pick the encoding for `name`, assuming it is to be compressed.
    /// Returns `Literal` if there is nothing to point at.
    pub fn plan(&self, name: &DomainName) -> NameEncoding {
        if name.is_root() {
            return NameEncoding::Literal;
        }

        if let Some(target) = self.targets.get(&name.labels) {
            return NameEncoding::Pointer(target.offset);
        }

        // longest matching suffix first; the root on its own is never
        // a target
        let mut tail = None;
        for prefix_labels in 1..name.labels.len() - 1 {
            if let Some(target) = self.targets.get(&name.labels[prefix_labels..]) {
                let encoding = NameEncoding::Hybrid {
                    prefix_labels,
                    offset: target.offset,
                };
                if target.whole {
                    return encoding;
                }
                // two labels plus the root
                if tail.is_none() && name.labels.len() - prefix_labels > 2 {
                    tail = Some(encoding);
                }
            }
        }

        tail.unwrap_or(NameEncoding::Literal)
    }

    /// Note that `name` has been written at `offset` using `encoding`.
    /// Labels written in full become targets, unless their offset is
    /// too large to fit in a pointer.
    pub fn record(&mut self, name: &DomainName, encoding: NameEncoding, offset: usize) {
        let literal_labels = match encoding {
            NameEncoding::Pointer(_) => 0,
            NameEncoding::Hybrid { prefix_labels, .. } => prefix_labels,
            NameEncoding::Literal => name.labels.len() - 1,
        };

        if let Some(target) = self.targets.get_mut(&name.labels) {
            target.whole = true;
        }

        let mut position = offset;
        for i in 0..literal_labels {
            if position > POINTER_MAX_OFFSET {
                break;
            }

            if let Ok(target_offset) = u16::try_from(position) {
                self.targets
                    .entry(name.labels[i..].to_vec())
                    .or_insert(Target {
                        offset: target_offset,
                        whole: i == 0,
                    });
            }

            position += 1 + usize::from(name.labels[i].len());
        }
    }
}

#![warn(clippy::pedantic)]
// Don't care enough to fix
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::wildcard_imports)]

//! Encoding and decoding of DNS messages (RFC 1035 section 4): the
//! header, the question section, and the answer section, with name
//! compression in both directions.

pub mod protocol;

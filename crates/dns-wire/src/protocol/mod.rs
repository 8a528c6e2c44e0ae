pub mod compression;
pub mod deserialise;
pub mod error;
pub mod serialise;
pub mod types;

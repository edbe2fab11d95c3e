//! Generic utilities shared by the mirroring client crates.

pub mod shutdown;

pub use shutdown::ReferenceCounter;

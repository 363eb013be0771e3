//! Local printer enumeration and classification
//!
//! The enumerator snapshots what the OS spooler already knows; there
//! is no network discovery. Classification is a pure function of the
//! raw OS record, so it is fully unit-tested without hardware.

mod classify;
mod enumerator;

pub use classify::{classify, RawPrinter};
pub use enumerator::{enumerate, EnumerationError};

//! pmdcheck: checks a converter's YAML output against expected substructures.
//!
//! The [`substructure`](mod@substructure) module holds the matching relation, [`value`] the
//! document model it works on, and [`test_harness`] the manifest-driven
//! runner behind the `pmdcheck` binary.

pub use crate::errors::HarnessError;
pub use crate::substructure::{find_mismatch, substructure};
pub use crate::value::{Role, Scalar, Value};

pub mod cli;
pub mod converter;
pub mod errors;
pub mod substructure;
pub mod test_harness;
pub mod value;

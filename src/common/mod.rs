//! Datastructures common to every pass of the compiler.
//!
//! - Source text representation.
//! - The shared `Type` lattice used from normalization onward.

pub mod source;
pub mod types;

pub use source::Source;
pub use types::Type;

//! Small shared utilities.

pub mod idset;
pub mod path;

pub use idset::IdSet;

//! Type definitions shared across crates

pub mod pagination;

pub use pagination::Pagination;

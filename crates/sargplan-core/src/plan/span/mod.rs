//! Span algebra value types and operations.

mod algebra;
mod inclusion;
mod range;
mod sentinel;
mod span;
mod spans;

#[cfg(test)]
mod tests;

pub use algebra::{add_array_keys, compose, constrain, streamline, union};
pub use inclusion::Inclusion;
pub use range::{Range, SELECTIVITY_UNKNOWN};
pub use sentinel::{ClassSet, Sentinel, class_ranges};
pub use span::Span;
pub use spans::{IntersectSpans, SargSpans, TermSpans, UnionSpans, VectorSearch};

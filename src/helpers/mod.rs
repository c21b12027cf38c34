//! Shared low-level helpers for XML parts, ZIP packages and text formatting.

pub(crate) mod string;
pub(crate) mod xml;
pub(crate) mod zip;

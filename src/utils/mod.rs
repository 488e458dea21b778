//! Internal utility helpers for timestamps, export files, and serde shapes.

pub(crate) mod date;
pub(crate) mod download;
pub(crate) mod serde;

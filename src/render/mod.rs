//! Result presentation: display classification, JSON export, and markdown output.

pub mod json;
pub mod markdown;
pub mod view;

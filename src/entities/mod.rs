//! Operator input, the analysis result model, and the submission lifecycle.

pub mod input;
pub mod result;
pub mod selection;
pub mod submission;

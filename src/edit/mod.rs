//! Image edit orchestration
//!
//! Provides:
//! - `EditPipeline`, which turns one streamed generation into stored artifacts
//! - `GenerationResult`, the aggregated outcome returned to callers

mod pipeline;
mod result;

pub use pipeline::{EditPipeline, EditRequest, ImageSource};
pub use result::{GenerationResult, Status, NO_IMAGE_MESSAGE};

//! Animation frame optimizer.
//!
//! Frames come in as a [`FrameSource`], get composited onto a canvas one at a time, and
//! come out as an [`OptimizedSequence`] of cropped layers whose names carry their timing
//! and disposal as `(NNNms)` and `(combine)`/`(replace)` tags.

pub mod backdrop;
pub mod bbox;
pub mod composite;
pub mod delta;
pub mod error;
pub mod frame;
pub mod optimizer;
pub mod progress;
pub mod tags;

pub use bbox::BBox;
pub use error::OptimizeError;
pub use frame::{CanvasGeometry, ColorModel, FrameSource, Layer, LayerStack};
pub use optimizer::{OptimizeMode, OptimizedSequence, OutputFrame, optimize};
pub use progress::{NoProgress, ProgressReporter};
pub use tags::Disposal;

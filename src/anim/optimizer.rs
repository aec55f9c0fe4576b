//! Sequence driver: walks the frames in order and emits the optimized layers.

use serde::{Deserialize, Serialize};

use super::backdrop::{checked_frame, extract_backdrop, remove_backdrop};
use super::bbox::BBox;
use super::composite::composite_frame;
use super::delta::{compute_delta, crop};
use super::error::{OptimizeError, alloc_zeroed};
use super::frame::{CanvasGeometry, ColorModel, FrameSource, Layer};
use super::progress::ProgressReporter;
use super::tags::{self, Disposal};

/// What a run produces from its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizeMode {
    /// Emit only what changed between frames.
    #[default]
    Optimize,
    /// Emit every frame as the full composited canvas.
    Unoptimize,
    /// Emit every frame with the static backdrop made transparent.
    RemoveBackdrop,
    /// Emit a single layer holding the static backdrop.
    FindBackdrop,
}

/// One emitted layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFrame {
    /// Source name with its duration and disposal tags removed.
    pub base_name: String,
    pub bbox: BBox,
    /// The `bbox` region only, row-major.
    pub pixels: Vec<u8>,
    pub can_combine: bool,
    pub duration_ms: u32,
    /// The first frame of a sequence carries no disposal tag.
    pub first: bool,
}

impl OutputFrame {
    pub fn disposal(&self) -> Disposal {
        if self.first {
            Disposal::Undefined
        } else if self.can_combine {
            Disposal::Combine
        } else {
            Disposal::Replace
        }
    }

    /// Layer name with fresh duration and disposal tags.
    pub fn name(&self) -> String {
        format!(
            "{}{}{}",
            self.base_name,
            tags::format_duration_tag(self.duration_ms),
            tags::format_disposal_tag(self.disposal())
        )
    }
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedSequence {
    pub width: u32,
    pub height: u32,
    pub color_model: ColorModel,
    pub frames: Vec<OutputFrame>,
}

impl OptimizedSequence {
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| u64::from(f.duration_ms)).sum()
    }
}

/// Scratch buffers and bookkeeping owned by one run.
pub struct SequenceOptimizerState {
    geometry: CanvasGeometry,
    color_model: ColorModel,
    total: usize,
    /// Canvas after compositing the current frame.
    this_frame: Vec<u8>,
    /// Canvas after compositing the previous frame.
    last_frame: Vec<u8>,
    /// Delta candidate derived from `this_frame`.
    opti_frame: Vec<u8>,
    /// Duration owed to the last emitted frame, including any collapsed followers.
    cumulated_delay: u32,
    last_emitted: Option<usize>,
    frames: Vec<OutputFrame>,
}

impl SequenceOptimizerState {
    pub fn new<S: FrameSource + ?Sized>(source: &S) -> Result<Self, OptimizeError> {
        let (width, height) = (source.canvas_width(), source.canvas_height());
        if width == 0 || height == 0 {
            return Err(OptimizeError::InvalidCanvas { width, height });
        }
        let total = source.layer_count();
        if total == 0 {
            return Err(OptimizeError::EmptySequence);
        }

        let color_model = source.color_model();
        let geometry = CanvasGeometry::new(width, height, color_model);
        let len = geometry.buffer_len();
        Ok(Self {
            geometry,
            color_model,
            total,
            this_frame: alloc_zeroed(len)?,
            last_frame: alloc_zeroed(len)?,
            opti_frame: alloc_zeroed(len)?,
            cumulated_delay: 0,
            last_emitted: None,
            frames: Vec::new(),
        })
    }

    pub fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }

    /// Composite frame `index` onto `this_frame`.
    fn render<'s, S: FrameSource + ?Sized>(
        &mut self,
        source: &'s S,
        index: usize,
    ) -> Result<&'s Layer, OptimizeError> {
        if source.layer_count() != self.total {
            return Err(OptimizeError::SourceChanged { frame: index });
        }
        let layer = checked_frame(source, index, self.geometry.pixelstep)?;
        composite_frame(layer, layer.disposal(), &mut self.this_frame, &self.geometry);
        Ok(layer)
    }

    fn emit(&mut self, frame: OutputFrame) {
        tracing::debug!(
            name = %frame.name(),
            bbox = ?frame.bbox,
            "Emitting frame"
        );
        self.cumulated_delay = frame.duration_ms;
        self.last_emitted = Some(self.frames.len());
        self.frames.push(frame);
    }

    /// Emit the whole of `canvas` as a frame.
    fn emit_full(
        &mut self,
        layer: &Layer,
        canvas: FullCanvas,
        first: bool,
    ) -> Result<(), OptimizeError> {
        let source = match canvas {
            FullCanvas::This => &self.this_frame,
            FullCanvas::Opti => &self.opti_frame,
        };
        let mut pixels = alloc_zeroed(source.len())?;
        pixels.copy_from_slice(source);
        self.emit(OutputFrame {
            base_name: tags::base_name(&layer.name),
            bbox: BBox::full(self.geometry.width, self.geometry.height),
            pixels,
            can_combine: false,
            duration_ms: layer.duration_ms(),
            first,
        });
        Ok(())
    }

    /// Fold a frame that changed nothing into the previously emitted one.
    fn collapse(&mut self, index: usize, duration_ms: u32) {
        self.cumulated_delay = self.cumulated_delay.saturating_add(duration_ms);
        if let Some(previous) = self.last_emitted.and_then(|at| self.frames.get_mut(at)) {
            previous.duration_ms = self.cumulated_delay;
            tracing::debug!(
                frame = index,
                into = %previous.name(),
                "Frame optimized away"
            );
        }
    }

    /// Make the frame just rendered the baseline for the next comparison.
    fn advance(&mut self, index: usize, progress: &mut dyn ProgressReporter, span: (f64, f64)) {
        self.last_frame.copy_from_slice(&self.this_frame);
        let done = (index + 1) as f64 / self.total as f64;
        progress.update(span.0 + (span.1 - span.0) * done);
    }

    fn finish(self) -> OptimizedSequence {
        OptimizedSequence {
            width: self.geometry.width,
            height: self.geometry.height,
            color_model: self.color_model,
            frames: self.frames,
        }
    }
}

#[derive(Clone, Copy)]
enum FullCanvas {
    This,
    Opti,
}

/// Run `mode` over every frame of `source`.
pub fn optimize<S: FrameSource + ?Sized>(
    source: &S,
    mode: OptimizeMode,
    progress: &mut dyn ProgressReporter,
) -> Result<OptimizedSequence, OptimizeError> {
    let state = SequenceOptimizerState::new(source)?;
    let sequence = match mode {
        OptimizeMode::Optimize => run_optimize(state, source, progress)?,
        OptimizeMode::Unoptimize => run_unoptimize(state, source, progress)?,
        OptimizeMode::RemoveBackdrop => run_remove_backdrop(state, source, progress)?,
        OptimizeMode::FindBackdrop => run_find_backdrop(state, source, progress)?,
    };

    tracing::info!(
        ?mode,
        input_frames = source.layer_count(),
        output_frames = sequence.frames.len(),
        total_ms = sequence.total_duration_ms(),
        "Sequence processed"
    );
    Ok(sequence)
}

fn run_optimize<S: FrameSource + ?Sized>(
    mut state: SequenceOptimizerState,
    source: &S,
    progress: &mut dyn ProgressReporter,
) -> Result<OptimizedSequence, OptimizeError> {
    for index in 0..state.total {
        let layer = state.render(source, index)?;

        if index == 0 {
            state.emit_full(layer, FullCanvas::This, true)?;
        } else {
            let geometry = state.geometry;
            let delta = compute_delta(
                &state.this_frame,
                &state.last_frame,
                &mut state.opti_frame,
                &geometry,
            );

            if delta.can_combine && delta.bbox.is_empty() {
                state.collapse(index, layer.duration_ms());
            } else {
                let cropped_from = if delta.can_combine {
                    &state.opti_frame
                } else {
                    &state.this_frame
                };
                let pixels = crop(cropped_from, &delta.bbox, &geometry)?;
                state.emit(OutputFrame {
                    base_name: tags::base_name(&layer.name),
                    bbox: delta.bbox,
                    pixels,
                    can_combine: delta.can_combine,
                    duration_ms: layer.duration_ms(),
                    first: false,
                });
            }
        }

        state.advance(index, progress, (0.0, 1.0));
    }
    Ok(state.finish())
}

fn run_unoptimize<S: FrameSource + ?Sized>(
    mut state: SequenceOptimizerState,
    source: &S,
    progress: &mut dyn ProgressReporter,
) -> Result<OptimizedSequence, OptimizeError> {
    for index in 0..state.total {
        let layer = state.render(source, index)?;
        state.emit_full(layer, FullCanvas::This, index == 0)?;
        state.advance(index, progress, (0.0, 1.0));
    }
    Ok(state.finish())
}

fn run_remove_backdrop<S: FrameSource + ?Sized>(
    mut state: SequenceOptimizerState,
    source: &S,
    progress: &mut dyn ProgressReporter,
) -> Result<OptimizedSequence, OptimizeError> {
    let geometry = state.geometry;
    let backdrop = extract_backdrop(source, &geometry, progress, (0.0, 0.5))?;

    for index in 0..state.total {
        let layer = state.render(source, index)?;
        state.opti_frame.copy_from_slice(&state.this_frame);
        remove_backdrop(&mut state.opti_frame, &backdrop, &geometry);
        state.emit_full(layer, FullCanvas::Opti, index == 0)?;
        state.advance(index, progress, (0.5, 1.0));
    }
    Ok(state.finish())
}

fn run_find_backdrop<S: FrameSource + ?Sized>(
    mut state: SequenceOptimizerState,
    source: &S,
    progress: &mut dyn ProgressReporter,
) -> Result<OptimizedSequence, OptimizeError> {
    let geometry = state.geometry;
    let backdrop = extract_backdrop(source, &geometry, progress, (0.0, 1.0))?;

    // The plate stands in for the whole animation, so it inherits its full running time.
    let mut duration_ms: u32 = 0;
    for index in 0..state.total {
        let layer = checked_frame(source, index, geometry.pixelstep)?;
        duration_ms = duration_ms.saturating_add(layer.duration_ms());
    }

    state.emit(OutputFrame {
        base_name: "Backdrop".to_string(),
        bbox: BBox::full(geometry.width, geometry.height),
        pixels: backdrop,
        can_combine: false,
        duration_ms,
        first: true,
    });
    Ok(state.finish())
}

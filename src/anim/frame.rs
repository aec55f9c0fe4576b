use serde::{Deserialize, Serialize};

use super::error::OptimizeError;
use super::tags::{self, Disposal};

/// Color model of the whole image. Fixes the working bytes per pixel for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorModel {
    Rgb,
    Grayscale,
    Indexed,
}

impl ColorModel {
    /// Bytes per pixel in the working buffers, alpha included.
    pub fn pixelstep(self) -> usize {
        match self {
            ColorModel::Rgb => 4,
            ColorModel::Grayscale | ColorModel::Indexed => 2,
        }
    }
}

/// Size and layout of the canvas-wide scratch buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasGeometry {
    pub width: u32,
    pub height: u32,
    pub pixelstep: usize,
}

impl CanvasGeometry {
    pub fn new(width: u32, height: u32, color_model: ColorModel) -> Self {
        Self {
            width,
            height,
            pixelstep: color_model.pixelstep(),
        }
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * self.pixelstep
    }

    pub fn buffer_len(&self) -> usize {
        self.row_len() * self.height as usize
    }

    /// Number of color channels, i.e. everything before the alpha byte.
    pub fn colors(&self) -> usize {
        self.pixelstep - 1
    }
}

/// One input frame.
///
/// Pixels are row-major, `width * height * bytes_per_pixel` bytes. A layer without
/// an alpha channel stores one byte less per pixel and is treated as fully opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub offset_x: i32,
    pub offset_y: i32,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub pixels: Vec<u8>,
}

impl Layer {
    pub fn new(
        name: impl Into<String>,
        (offset_x, offset_y): (i32, i32),
        (width, height): (u32, u32),
        has_alpha: bool,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            offset_x,
            offset_y,
            width,
            height,
            has_alpha,
            pixels,
        }
    }

    pub fn bytes_per_pixel(&self, pixelstep: usize) -> usize {
        if self.has_alpha {
            pixelstep
        } else {
            pixelstep - 1
        }
    }

    pub fn disposal(&self) -> Disposal {
        tags::parse_disposal_tag(&self.name)
    }

    pub fn duration_ms(&self) -> u32 {
        tags::duration_or_default(&self.name)
    }

    /// Source row `y` (layer-local), `width * bytes_per_pixel` bytes long.
    pub(crate) fn row(&self, y: u32, pixelstep: usize) -> &[u8] {
        let stride = self.width as usize * self.bytes_per_pixel(pixelstep);
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    /// Re-check the layer against the run's pixel format. `frame` is only used for reporting.
    pub(crate) fn validate(&self, pixelstep: usize, frame: usize) -> Result<(), OptimizeError> {
        if self.width == 0 || self.height == 0 {
            return Err(OptimizeError::SourceChanged { frame });
        }
        let expected =
            self.width as usize * self.height as usize * self.bytes_per_pixel(pixelstep);
        if self.pixels.len() != expected {
            return Err(OptimizeError::PixelDataMismatch {
                frame,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// An ordered stack of layers the optimizer reads from.
///
/// Stack position 0 is the top of the stack, which holds the *latest* frame:
/// frame `i` of an `n`-frame animation lives at stack position `n - 1 - i`.
pub trait FrameSource {
    fn canvas_width(&self) -> u32;
    fn canvas_height(&self) -> u32;
    fn color_model(&self) -> ColorModel;
    fn layer_count(&self) -> usize;
    fn layer(&self, stack_position: usize) -> Option<&Layer>;

    /// Layer for animation frame `index`, counting from the earliest frame.
    fn frame(&self, index: usize) -> Option<&Layer> {
        let total = self.layer_count();
        if index >= total {
            return None;
        }
        self.layer(total - 1 - index)
    }
}

/// In-memory [`FrameSource`].
#[derive(Debug, Clone)]
pub struct LayerStack {
    width: u32,
    height: u32,
    color_model: ColorModel,
    /// Top of the stack first.
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(width: u32, height: u32, color_model: ColorModel) -> Self {
        Self {
            width,
            height,
            color_model,
            layers: Vec::new(),
        }
    }

    /// Build a stack from frames given earliest first.
    pub fn from_frames(
        width: u32,
        height: u32,
        color_model: ColorModel,
        frames: impl IntoIterator<Item = Layer>,
    ) -> Self {
        let mut stack = Self::new(width, height, color_model);
        for frame in frames {
            stack.push_frame(frame);
        }
        stack
    }

    /// Append `layer` as the new latest frame (top of the stack).
    pub fn push_frame(&mut self, layer: Layer) {
        self.layers.insert(0, layer);
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl FrameSource for LayerStack {
    fn canvas_width(&self) -> u32 {
        self.width
    }

    fn canvas_height(&self) -> u32 {
        self.height
    }

    fn color_model(&self) -> ColorModel {
        self.color_model
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer(&self, stack_position: usize) -> Option<&Layer> {
        self.layers.get(stack_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(name: &str) -> Layer {
        Layer::new(name, (0, 0), (1, 1), true, vec![1, 2, 3, 255])
    }

    #[test]
    fn frames_are_indexed_from_the_bottom_of_the_stack() {
        let stack = LayerStack::from_frames(
            1,
            1,
            ColorModel::Rgb,
            [solid("first"), solid("second"), solid("third")],
        );
        assert_eq!(stack.layer(0).map(|l| l.name.as_str()), Some("third"));
        assert_eq!(stack.frame(0).map(|l| l.name.as_str()), Some("first"));
        assert_eq!(stack.frame(2).map(|l| l.name.as_str()), Some("third"));
        assert!(stack.frame(3).is_none());
    }

    #[test]
    fn layer_reads_its_tags() {
        let layer = solid("walk (40ms)(replace)");
        assert_eq!(layer.duration_ms(), 40);
        assert_eq!(layer.disposal(), Disposal::Replace);
    }

    #[test]
    fn validation_catches_vanished_and_short_layers() {
        let empty = Layer::new("gone", (0, 0), (0, 4), true, Vec::new());
        assert!(matches!(
            empty.validate(4, 3),
            Err(OptimizeError::SourceChanged { frame: 3 })
        ));

        let short = Layer::new("short", (0, 0), (2, 1), false, vec![0; 4]);
        assert!(matches!(
            short.validate(4, 0),
            Err(OptimizeError::PixelDataMismatch { expected: 6, actual: 4, .. })
        ));
    }

    #[test]
    fn pixelstep_follows_color_model() {
        assert_eq!(ColorModel::Rgb.pixelstep(), 4);
        assert_eq!(ColorModel::Grayscale.pixelstep(), 2);
        assert_eq!(ColorModel::Indexed.pixelstep(), 2);
    }
}

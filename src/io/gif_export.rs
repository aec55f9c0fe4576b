use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use super::{IoError, write_atomically};
use crate::anim::{Disposal, OptimizedSequence, OutputFrame};

/// Palette index reserved for transparent pixels.
const TRANSPARENT_INDEX: u8 = 0;
/// Colors available once the transparent slot is taken.
const MAX_OPAQUE_COLORS: usize = 255;

fn pixel_rgb(pixel: &[u8]) -> [u8; 3] {
    match pixel.len() {
        4 => [pixel[0], pixel[1], pixel[2]],
        // Gray (or an index, which is all a two-byte pixel carries) plus alpha.
        _ => [pixel[0], pixel[0], pixel[0]],
    }
}

fn is_visible(pixel: &[u8]) -> bool {
    pixel[pixel.len() - 1] & 128 != 0
}

// Nearest palette entry by squared Euclidean distance, never the transparent slot.
fn find_nearest_color(color: [u8; 3], palette: &[[u8; 3]]) -> usize {
    let mut best_idx = 1;
    let mut best_dist = u32::MAX;

    for (idx, &palette_color) in palette.iter().enumerate().skip(1) {
        let dr = color[0] as i32 - palette_color[0] as i32;
        let dg = color[1] as i32 - palette_color[1] as i32;
        let db = color[2] as i32 - palette_color[2] as i32;
        let dist = (dr * dr + dg * dg + db * db) as u32;

        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }

    best_idx
}

/// One global palette for the whole sequence. Colors beyond the GIF limit fall back to
/// their nearest kept neighbour at index time.
struct Palette {
    colors: Vec<[u8; 3]>,
    lookup: HashMap<[u8; 3], usize>,
}

impl Palette {
    fn build(sequence: &OptimizedSequence, pixelstep: usize) -> Self {
        let mut colors = vec![[0u8; 3]];
        let mut lookup = HashMap::new();

        let visible = sequence
            .frames
            .iter()
            .flat_map(|frame| frame.pixels.chunks_exact(pixelstep))
            .filter(|pixel| is_visible(pixel));
        for pixel in visible {
            let color = pixel_rgb(pixel);
            if lookup.contains_key(&color) {
                continue;
            }
            if colors.len() > MAX_OPAQUE_COLORS {
                tracing::warn!("More than {MAX_OPAQUE_COLORS} colors, approximating the rest");
                break;
            }
            lookup.insert(color, colors.len());
            colors.push(color);
        }
        Self { colors, lookup }
    }

    fn index_of(&self, color: [u8; 3]) -> u8 {
        let index = self
            .lookup
            .get(&color)
            .copied()
            .unwrap_or_else(|| find_nearest_color(color, &self.colors));
        index as u8
    }

    fn to_rgb_bytes(&self) -> Vec<u8> {
        self.colors.iter().flatten().copied().collect()
    }
}

fn to_u16(value: u32, what: &str) -> Result<u16, IoError> {
    value
        .try_into()
        .map_err(|_| IoError::Unsupported(format!("{what} {value} exceeds GIF limit (65535)")))
}

/// How `frame` must be disposed of so that `next` is drawn correctly.
///
/// GIF can only clear the previous frame's own rectangle, so a replacing frame that does not
/// cover stale pixels elsewhere will still show them.
fn dispose_before(next: Option<&OutputFrame>) -> gif::DisposalMethod {
    match next.map(OutputFrame::disposal) {
        Some(Disposal::Replace) => gif::DisposalMethod::Background,
        _ => gif::DisposalMethod::Keep,
    }
}

/// Encode `sequence` as an animated GIF at `output_path`.
pub fn write_gif(
    sequence: &OptimizedSequence,
    output_path: &Path,
    loop_forever: bool,
) -> Result<(), IoError> {
    // Convert u32 to u16 for GIF encoder (GIF format limitation)
    let width = to_u16(sequence.width, "Width")?;
    let height = to_u16(sequence.height, "Height")?;
    let pixelstep = sequence.color_model.pixelstep();

    // One palette shared by every frame, index 0 reserved for transparency
    let palette = Palette::build(sequence, pixelstep);

    write_atomically(output_path, |file| {
        let mut encoder = gif::Encoder::new(file, width, height, &palette.to_rgb_bytes())?;
        encoder.set_repeat(if loop_forever {
            gif::Repeat::Infinite
        } else {
            gif::Repeat::Finite(0)
        })?;

        for (i, frame) in sequence.frames.iter().enumerate() {
            // Map the cropped pixels to palette indices
            let indexed: Vec<u8> = frame
                .pixels
                .chunks_exact(pixelstep)
                .map(|pixel| {
                    if is_visible(pixel) {
                        palette.index_of(pixel_rgb(pixel))
                    } else {
                        TRANSPARENT_INDEX
                    }
                })
                .collect();

            // Position the frame at its bbox; GIF delays are in centiseconds
            let gif_frame = gif::Frame {
                left: to_u16(frame.bbox.left, "Left offset")?,
                top: to_u16(frame.bbox.top, "Top offset")?,
                width: to_u16(frame.bbox.width(), "Frame width")?,
                height: to_u16(frame.bbox.height(), "Frame height")?,
                delay: u16::try_from(frame.duration_ms / 10).unwrap_or(u16::MAX),
                dispose: dispose_before(sequence.frames.get(i + 1)),
                transparent: Some(TRANSPARENT_INDEX),
                buffer: Cow::Owned(indexed),
                ..gif::Frame::default()
            };
            encoder.write_frame(&gif_frame)?;
        }
        // Flush the trailer before the temporary file is renamed
        encoder.into_inner()?;
        Ok(())
    })?;

    tracing::info!(
        "Wrote {} ({} frame{})",
        output_path.display(),
        sequence.frames.len(),
        if sequence.frames.len() == 1 { "" } else { "s" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_color_skips_transparent_slot() {
        let palette = [[0, 0, 0], [250, 0, 0], [0, 0, 250]];
        assert_eq!(find_nearest_color([1, 1, 1], &palette), 1);
        assert_eq!(find_nearest_color([0, 10, 200], &palette), 2);
    }

    #[test]
    fn gray_pixels_expand_to_rgb() {
        assert_eq!(pixel_rgb(&[42, 255]), [42, 42, 42]);
        assert_eq!(pixel_rgb(&[1, 2, 3, 255]), [1, 2, 3]);
    }
}

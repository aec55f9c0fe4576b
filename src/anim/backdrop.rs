//! Static backdrop detection.
//!
//! The backdrop of an animation is, per pixel, the opaque color the displayed frames show
//! most often. It can be emitted on its own or subtracted from every frame.

use super::composite::composite_row;
use super::error::{OptimizeError, alloc_zeroed};
use super::frame::{CanvasGeometry, FrameSource, Layer};
use super::progress::ProgressReporter;

/// Fetch frame `index` and make sure it still matches the run's pixel format.
pub(crate) fn checked_frame<S: FrameSource + ?Sized>(
    source: &S,
    index: usize,
    pixelstep: usize,
) -> Result<&Layer, OptimizeError> {
    let layer = source
        .frame(index)
        .ok_or(OptimizeError::SourceChanged { frame: index })?;
    layer.validate(pixelstep, index)?;
    Ok(layer)
}

/// Most frequent opaque value among `candidates`, or `None` if none are opaque.
/// On a tie the value seen first wins.
fn mode_color<'a>(candidates: impl Iterator<Item = &'a [u8]>, colors: usize) -> Option<&'a [u8]> {
    let mut histogram: Vec<(&[u8], usize)> = Vec::new();
    for pixel in candidates.filter(|p| p[colors] & 128 != 0) {
        let color = &pixel[..colors];
        match histogram.iter_mut().find(|(seen, _)| *seen == color) {
            Some((_, count)) => *count += 1,
            None => histogram.push((color, 1)),
        }
    }

    let mut best: Option<(&[u8], usize)> = None;
    for &(color, count) in &histogram {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((color, count));
        }
    }
    best.map(|(color, _)| color)
}

/// Build the backdrop plate of `source` as a full-canvas buffer.
///
/// Every frame is composited row by row on top of the previous one, so the histogram votes
/// on what the animation actually displays at each position. Progress is reported per row,
/// scaled into `progress_span`.
pub fn extract_backdrop<S: FrameSource + ?Sized>(
    source: &S,
    geometry: &CanvasGeometry,
    progress: &mut dyn ProgressReporter,
    progress_span: (f64, f64),
) -> Result<Vec<u8>, OptimizeError> {
    let total = source.layer_count();
    let row_len = geometry.row_len();
    let pixelstep = geometry.pixelstep;
    let colors = geometry.colors();

    let mut backdrop = alloc_zeroed(geometry.buffer_len())?;
    // One canvas row per frame, rebuilt for every canvas row
    let mut frame_rows = alloc_zeroed(row_len * total)?;

    let layers = (0..total)
        .map(|index| checked_frame(source, index, pixelstep))
        .collect::<Result<Vec<_>, _>>()?;

    let (span_start, span_end) = progress_span;
    for (row, plate_row) in backdrop.chunks_exact_mut(row_len).enumerate() {
        // Composite this row of every frame on top of the previous frame's row
        for (index, layer) in layers.iter().enumerate() {
            let (before, rest) = frame_rows.split_at_mut(index * row_len);
            let dest = &mut rest[..row_len];
            match before.rchunks_exact(row_len).next() {
                Some(previous) => dest.copy_from_slice(previous),
                None => dest.fill(0),
            }
            composite_row(layer, layer.disposal(), row as u32, dest, geometry);
        }

        // Vote per column; columns no frame ever covers stay transparent
        for (x, plate_pixel) in plate_row.chunks_exact_mut(pixelstep).enumerate() {
            let at = x * pixelstep;
            let column = frame_rows
                .chunks_exact(row_len)
                .map(|frame_row| &frame_row[at..at + pixelstep]);
            if let Some(color) = mode_color(column, colors) {
                plate_pixel[..colors].copy_from_slice(color);
                plate_pixel[colors] = 255;
            }
        }

        let done = (row + 1) as f64 / f64::from(geometry.height);
        progress.update(span_start + (span_end - span_start) * done);
    }

    tracing::debug!(frames = total, "Backdrop extracted");
    Ok(backdrop)
}

/// Make every opaque pixel of `frame` that matches the opaque backdrop color transparent.
pub fn remove_backdrop(frame: &mut [u8], backdrop: &[u8], geometry: &CanvasGeometry) {
    let colors = geometry.colors();
    let pixels = frame
        .chunks_exact_mut(geometry.pixelstep)
        .zip(backdrop.chunks_exact(geometry.pixelstep));
    for (pixel, plate) in pixels {
        let both_opaque = pixel[colors] & 128 != 0 && plate[colors] & 128 != 0;
        if both_opaque && pixel[..colors] == plate[..colors] {
            pixel[colors] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::frame::{ColorModel, LayerStack};
    use crate::anim::progress::NoProgress;

    fn gray(name: &str, values: &[[u8; 2]]) -> Layer {
        Layer::new(name, (0, 0), (values.len() as u32, 1), true, values.concat())
    }

    #[test]
    fn mode_prefers_most_frequent_then_first_seen() {
        let pixels: [&[u8]; 5] = [&[1, 255], &[2, 255], &[2, 255], &[3, 0], &[1, 255]];
        assert_eq!(mode_color(pixels.into_iter(), 1), Some(&[1u8][..]));

        let none: [&[u8]; 2] = [&[1, 0], &[2, 10]];
        assert_eq!(mode_color(none.into_iter(), 1), None);
    }

    #[test]
    fn backdrop_votes_per_pixel() {
        let stack = LayerStack::from_frames(
            2,
            1,
            ColorModel::Grayscale,
            [
                gray("a (replace)", &[[5, 255], [0, 0]]),
                gray("b (replace)", &[[5, 255], [0, 0]]),
                gray("c (replace)", &[[9, 255], [0, 0]]),
            ],
        );
        let geometry = CanvasGeometry::new(2, 1, ColorModel::Grayscale);
        let backdrop = extract_backdrop(&stack, &geometry, &mut NoProgress, (0.0, 1.0)).unwrap();
        assert_eq!(backdrop, vec![5, 255, 0, 0]);
    }

    #[test]
    fn combined_frames_vote_with_what_is_displayed() {
        // The second frame draws nothing at x=0, so the first frame's color stays on screen.
        let stack = LayerStack::from_frames(
            1,
            1,
            ColorModel::Grayscale,
            [
                gray("a", &[[5, 255]]),
                gray("b (combine)", &[[9, 0]]),
                gray("c (replace)", &[[9, 255]]),
            ],
        );
        let geometry = CanvasGeometry::new(1, 1, ColorModel::Grayscale);
        let backdrop = extract_backdrop(&stack, &geometry, &mut NoProgress, (0.0, 1.0)).unwrap();
        assert_eq!(backdrop, vec![5, 255]);
    }

    #[test]
    fn matching_pixels_are_removed() {
        let geometry = CanvasGeometry::new(3, 1, ColorModel::Grayscale);
        let backdrop = vec![5, 255, 6, 255, 0, 0];
        let mut frame = vec![5, 255, 7, 255, 0, 255];
        remove_backdrop(&mut frame, &backdrop, &geometry);
        assert_eq!(frame, vec![5, 0, 7, 255, 0, 255]);
    }
}

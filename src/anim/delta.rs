//! Frame differencing.
//!
//! Compares the freshly composited canvas against the previous one and works out the
//! smallest layer that reproduces the new canvas when drawn over the old one.

use super::bbox::{BBox, BBoxAccumulator};
use super::error::{OptimizeError, alloc_zeroed};
use super::frame::CanvasGeometry;

/// Outcome of comparing two composited canvases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    /// Region to emit. Empty when the frame changed nothing.
    pub bbox: BBox,
    /// True when the region can be drawn over the previous frame with unchanged pixels
    /// made transparent. False means the region must replace the canvas.
    pub can_combine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelClass {
    /// The pixel differs from the previous frame and has to be painted.
    keep: bool,
    /// The pixel is visible in the new frame.
    opaque: bool,
    /// The change cannot be expressed by drawing over the previous frame.
    forces_replace: bool,
}

fn is_opaque(pixel: &[u8], colors: usize) -> bool {
    pixel[colors] & 128 != 0
}

fn classify(this: &[u8], last: &[u8], colors: usize) -> PixelClass {
    match (is_opaque(last, colors), is_opaque(this, colors)) {
        (false, false) => PixelClass {
            keep: false,
            opaque: false,
            forces_replace: false,
        },
        (false, true) => PixelClass {
            keep: true,
            opaque: true,
            forces_replace: false,
        },
        // A pixel that vanishes can only be shown by clearing the canvas.
        (true, false) => PixelClass {
            keep: true,
            opaque: false,
            forces_replace: true,
        },
        (true, true) => PixelClass {
            keep: this[..colors] != last[..colors],
            opaque: true,
            forces_replace: false,
        },
    }
}

/// Compare `this_frame` against `last_frame`.
///
/// `opti_frame` receives a copy of `this_frame` in which every pixel that does not need
/// repainting has its alpha forced to 0. When the returned delta cannot combine, the box is
/// the footprint of every opaque pixel of `this_frame` (or the pixel at the origin when there
/// is none), and [`crop`] must read from `this_frame` instead. An empty box therefore always
/// means the frame changed nothing.
pub fn compute_delta(
    this_frame: &[u8],
    last_frame: &[u8],
    opti_frame: &mut [u8],
    geometry: &CanvasGeometry,
) -> Delta {
    let pixelstep = geometry.pixelstep;
    let colors = geometry.colors();
    let width = geometry.width as usize;

    let mut can_combine = true;
    let mut keep_box = BBoxAccumulator::new(geometry.width, geometry.height);
    let mut opaque_box = BBoxAccumulator::new(geometry.width, geometry.height);

    opti_frame.copy_from_slice(this_frame);

    let pixels = this_frame
        .chunks_exact(pixelstep)
        .zip(last_frame.chunks_exact(pixelstep))
        .zip(opti_frame.chunks_exact_mut(pixelstep));
    for (index, ((this, last), opti)) in pixels.enumerate() {
        let x = (index % width) as u32;
        let y = (index / width) as u32;
        let class = classify(this, last, colors);

        if class.forces_replace {
            can_combine = false;
        }
        if class.keep {
            keep_box.include(x, y);
        } else {
            opti[colors] = 0;
        }
        if class.opaque {
            opaque_box.include(x, y);
        }
    }

    let bbox = match (can_combine, opaque_box.finish()) {
        (true, _) => keep_box.finish(),
        // Everything vanished: a single transparent pixel still carries the canvas clear.
        (false, rbox) if rbox.is_empty() => BBox {
            left: 0,
            top: 0,
            right: 1,
            bottom: 1,
        },
        (false, rbox) => rbox,
    };
    tracing::debug!(?bbox, can_combine, "Frame delta computed");

    Delta { bbox, can_combine }
}

/// Copy the `bbox` sub-rectangle of the canvas-sized `source` into a compact row-major buffer.
pub fn crop(
    source: &[u8],
    bbox: &BBox,
    geometry: &CanvasGeometry,
) -> Result<Vec<u8>, OptimizeError> {
    let pixelstep = geometry.pixelstep;
    let row_len = geometry.row_len();
    let span = bbox.width() as usize * pixelstep;

    let mut out = alloc_zeroed(span * bbox.height() as usize)?;
    for (dest, y) in out.chunks_exact_mut(span.max(1)).zip(bbox.top..bbox.bottom) {
        let start = y as usize * row_len + bbox.left as usize * pixelstep;
        dest.copy_from_slice(&source[start..start + span]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::frame::ColorModel;

    const CLEAR: [u8; 4] = [0, 0, 0, 0];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn canvas(pixels: &[[u8; 4]]) -> Vec<u8> {
        pixels.concat()
    }

    fn geometry() -> CanvasGeometry {
        CanvasGeometry::new(3, 1, ColorModel::Rgb)
    }

    #[test]
    fn identical_frames_optimize_away() {
        let frame = canvas(&[RED, CLEAR, BLUE]);
        let mut opti = vec![0; frame.len()];
        let delta = compute_delta(&frame, &frame, &mut opti, &geometry());
        assert!(delta.bbox.is_empty());
        assert!(delta.can_combine);
        assert!(opti.chunks_exact(4).all(|p| p[3] == 0));
    }

    #[test]
    fn color_change_is_kept_and_others_cleared() {
        let last = canvas(&[RED, RED, RED]);
        let this = canvas(&[RED, BLUE, RED]);
        let mut opti = vec![0; this.len()];
        let delta = compute_delta(&this, &last, &mut opti, &geometry());

        assert!(delta.can_combine);
        assert_eq!(delta.bbox, BBox { left: 1, top: 0, right: 2, bottom: 1 });
        assert_eq!(opti, canvas(&[[255, 0, 0, 0], BLUE, [255, 0, 0, 0]]));
    }

    #[test]
    fn newly_painted_pixel_combines() {
        let last = canvas(&[CLEAR, CLEAR, RED]);
        let this = canvas(&[BLUE, CLEAR, RED]);
        let mut opti = vec![0; this.len()];
        let delta = compute_delta(&this, &last, &mut opti, &geometry());
        assert!(delta.can_combine);
        assert_eq!(delta.bbox, BBox { left: 0, top: 0, right: 1, bottom: 1 });
    }

    #[test]
    fn vanished_pixel_falls_back_to_opaque_footprint() {
        let last = canvas(&[RED, CLEAR, RED]);
        let this = canvas(&[CLEAR, BLUE, RED]);
        let mut opti = vec![0; this.len()];
        let delta = compute_delta(&this, &last, &mut opti, &geometry());

        assert!(!delta.can_combine);
        // Every opaque pixel of the new frame is covered.
        assert_eq!(delta.bbox, BBox { left: 1, top: 0, right: 3, bottom: 1 });
        let cropped = crop(&this, &delta.bbox, &geometry()).unwrap();
        assert_eq!(cropped, canvas(&[BLUE, RED]));
    }

    #[test]
    fn clearing_every_pixel_still_emits_a_replace_box() {
        let last = canvas(&[RED, BLUE, RED]);
        let this = canvas(&[CLEAR, CLEAR, CLEAR]);
        let mut opti = vec![0; this.len()];
        let delta = compute_delta(&this, &last, &mut opti, &geometry());

        assert!(!delta.can_combine);
        assert_eq!(delta.bbox, BBox { left: 0, top: 0, right: 1, bottom: 1 });
        assert_eq!(crop(&this, &delta.bbox, &geometry()).unwrap(), CLEAR.to_vec());
    }

    #[test]
    fn crop_reads_rows_top_to_bottom() {
        let geometry = CanvasGeometry::new(3, 3, ColorModel::Grayscale);
        let source: Vec<u8> = (0..18).collect();
        let bbox = BBox { left: 1, top: 1, right: 3, bottom: 3 };
        let cropped = crop(&source, &bbox, &geometry).unwrap();
        assert_eq!(cropped, vec![8, 9, 10, 11, 14, 15, 16, 17]);
    }
}

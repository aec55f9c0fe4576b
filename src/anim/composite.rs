use super::frame::{CanvasGeometry, Layer};
use super::tags::Disposal;

/// Render `layer`'s contribution to canvas row `row` into `dest`.
///
/// `dest` is one canvas row (`geometry.row_len()` bytes). With `Disposal::Replace` the row is
/// cleared to transparent black first. Source pixels whose alpha has the high bit unset are
/// skipped; every other pixel inside the canvas is copied and made fully opaque.
pub fn composite_row(
    layer: &Layer,
    disposal: Disposal,
    row: u32,
    dest: &mut [u8],
    geometry: &CanvasGeometry,
) {
    if disposal.is_replace() {
        dest.fill(0);
    }

    let local_y = i64::from(row) - i64::from(layer.offset_y);
    if local_y < 0 || local_y >= i64::from(layer.height) {
        return;
    }

    let pixelstep = geometry.pixelstep;
    let colors = geometry.colors();
    let source_step = layer.bytes_per_pixel(pixelstep);
    let source = layer.row(local_y as u32, pixelstep);

    for (local_x, pixel) in source.chunks_exact(source_step).enumerate() {
        let x = i64::from(layer.offset_x) + local_x as i64;
        if x < 0 || x >= i64::from(geometry.width) {
            continue;
        }
        if layer.has_alpha && pixel[colors] & 128 == 0 {
            continue;
        }

        let at = x as usize * pixelstep;
        dest[at..at + colors].copy_from_slice(&pixel[..colors]);
        dest[at + colors] = 255;
    }
}

/// Composite every canvas row of `layer` onto the full-canvas buffer `canvas`.
pub fn composite_frame(
    layer: &Layer,
    disposal: Disposal,
    canvas: &mut [u8],
    geometry: &CanvasGeometry,
) {
    for (row, dest) in canvas.chunks_exact_mut(geometry.row_len()).enumerate() {
        composite_row(layer, disposal, row as u32, dest, geometry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::frame::ColorModel;

    fn geometry(width: u32) -> CanvasGeometry {
        CanvasGeometry::new(width, 4, ColorModel::Rgb)
    }

    #[test]
    fn replace_clears_row_even_outside_layer() {
        let layer = Layer::new("l", (0, 2), (1, 1), true, vec![9, 9, 9, 255]);
        let mut row = vec![7u8; 8];
        composite_row(&layer, Disposal::Replace, 0, &mut row, &geometry(2));
        assert_eq!(row, vec![0; 8]);
    }

    #[test]
    fn combine_outside_layer_leaves_row_untouched() {
        let layer = Layer::new("l", (0, 2), (1, 1), true, vec![9, 9, 9, 255]);
        let mut row = vec![7u8; 8];
        composite_row(&layer, Disposal::Combine, 0, &mut row, &geometry(2));
        assert_eq!(row, vec![7; 8]);
    }

    #[test]
    fn alpha_threshold_and_offset_are_honored() {
        // Two pixels: the first is below the alpha threshold, the second is kept.
        let layer = Layer::new(
            "l",
            (1, 0),
            (2, 1),
            true,
            vec![1, 1, 1, 127, 2, 3, 4, 128],
        );
        let mut row = vec![0u8; 12];
        composite_row(&layer, Disposal::Undefined, 0, &mut row, &geometry(3));
        assert_eq!(row, vec![0, 0, 0, 0, 0, 0, 0, 0, 2, 3, 4, 255]);
    }

    #[test]
    fn pixels_past_canvas_edges_are_clipped() {
        let layer = Layer::new(
            "l",
            (-1, 0),
            (3, 1),
            true,
            vec![1, 1, 1, 255, 2, 2, 2, 255, 3, 3, 3, 255],
        );
        let mut row = vec![0u8; 4];
        composite_row(&layer, Disposal::Combine, 0, &mut row, &geometry(1));
        assert_eq!(row, vec![2, 2, 2, 255]);
    }

    #[test]
    fn layers_without_alpha_are_opaque() {
        let geometry = CanvasGeometry::new(2, 1, ColorModel::Grayscale);
        let layer = Layer::new("gray", (0, 0), (2, 1), false, vec![10, 20]);
        let mut canvas = vec![0u8; geometry.buffer_len()];
        composite_frame(&layer, Disposal::Combine, &mut canvas, &geometry);
        assert_eq!(canvas, vec![10, 255, 20, 255]);
    }
}

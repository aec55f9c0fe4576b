use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder};

use super::IoError;
use crate::anim::{ColorModel, FrameSource, Layer, LayerStack};

/// Decode an animated GIF into a stack of full-canvas RGBA layers.
///
/// The decoder already composites each GIF frame, so every layer is tagged `(replace)` and
/// named `Frame N (Dms)(replace)`.
pub fn load_gif(path: &Path) -> Result<LayerStack, IoError> {
    let reader = BufReader::new(File::open(path)?);
    let decoder = GifDecoder::new(reader)?;
    let (width, height) = decoder.dimensions();
    let frames = decoder.into_frames().collect_frames()?;

    let mut stack = LayerStack::new(width, height, ColorModel::Rgb);
    for (i, frame) in frames.into_iter().enumerate() {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let ms = if denom == 0 { 0 } else { numer / denom };
        let offset = (frame.left() as i32, frame.top() as i32);

        let buffer = frame.into_buffer();
        let size = buffer.dimensions();
        let name = format!("Frame {} ({ms}ms)(replace)", i + 1);
        stack.push_frame(Layer::new(name, offset, size, true, buffer.into_raw()));
    }

    let count = stack.layer_count();
    tracing::info!(
        "Loaded {} ({width}x{height}, {count} frame{})",
        path.display(),
        if count == 1 { "" } else { "s" }
    );
    Ok(stack)
}

/// Load every PNG in `dir`, sorted by file name, as one frame each.
///
/// File stems become layer names, so `walk (80ms)(combine).png` keeps its tags. Frames may
/// differ in size; the canvas is the largest width and height among them.
pub fn load_png_frames(dir: &Path) -> Result<LayerStack, IoError> {
    let entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    let mut paths: Vec<PathBuf> = entries
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(IoError::Unsupported(format!(
            "No PNG frames found in {}",
            dir.display()
        )));
    }

    let mut layers = Vec::with_capacity(paths.len());
    let (mut width, mut height) = (0, 0);
    for path in &paths {
        let rgba = image::open(path)?.into_rgba8();
        let size = rgba.dimensions();
        width = width.max(size.0);
        height = height.max(size.1);

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        layers.push(Layer::new(name, (0, 0), size, true, rgba.into_raw()));
    }

    tracing::info!("Loaded {} frames from {}", layers.len(), dir.display());
    Ok(LayerStack::from_frames(width, height, ColorModel::Rgb, layers))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("animopt-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn png_frames_load_in_name_order_with_tags() {
        let dir = scratch_dir("png-frames");
        image::RgbaImage::from_pixel(2, 1, image::Rgba([9, 9, 9, 255]))
            .save(dir.join("b (40ms).png"))
            .unwrap();
        image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let stack = load_png_frames(&dir).unwrap();
        assert_eq!((stack.canvas_width(), stack.canvas_height()), (3, 2));
        assert_eq!(stack.layer_count(), 2);
        assert_eq!(stack.frame(0).map(|l| l.name.as_str()), Some("a"));
        assert_eq!(stack.frame(1).map(|l| l.duration_ms()), Some(40));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unreadable_directory_is_reported() {
        let missing = std::env::temp_dir().join("animopt-does-not-exist-dir");
        assert!(matches!(load_png_frames(&missing), Err(IoError::Io(_))));
    }
}

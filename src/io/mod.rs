//! Reading animations into a [`LayerStack`](crate::anim::LayerStack) and writing
//! optimized sequences back out.

mod gif_export;
mod gif_import;
pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use crate::anim::OptimizeError;

pub use gif_export::write_gif;
pub use gif_import::{load_gif, load_png_frames};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Failed to encode GIF: {0}")]
    Encode(#[from] gif::EncodingError),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Optimization failed: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("{0}")]
    Unsupported(String),
}

/// `<stem>.<suffix>.gif` next to `input`. Works for both a GIF file and a frame directory.
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "animation".to_string());
    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}.{suffix}.gif"))
}

/// Run `write` against a sibling temporary file and move it over `path` only on success,
/// so a failed run never leaves a half-written output behind.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&mut fs::File) -> Result<(), IoError>,
{
    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let result = fs::File::create(&partial)
        .map_err(IoError::from)
        .and_then(|mut file| write(&mut file));
    match result {
        Ok(()) => {
            fs::rename(&partial, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lands_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("art/walk.gif"), "optimized"),
            PathBuf::from("art/walk.optimized.gif")
        );
        assert_eq!(
            default_output_path(Path::new("art/walk_frames"), "opt"),
            PathBuf::from("art/walk_frames.opt.gif")
        );
    }
}

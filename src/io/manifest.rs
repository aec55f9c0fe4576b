use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{IoError, write_atomically};
use crate::anim::{Disposal, OptimizeMode, OptimizedSequence};

/// JSON description of an optimized sequence, written beside the output GIF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceManifest {
    pub width: u32,
    pub height: u32,
    pub mode: OptimizeMode,
    pub total_duration_ms: u64,
    pub frames: Vec<FrameManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameManifest {
    pub name: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u32,
    pub disposal: Disposal,
}

impl SequenceManifest {
    pub fn from_sequence(sequence: &OptimizedSequence, mode: OptimizeMode) -> Self {
        Self {
            width: sequence.width,
            height: sequence.height,
            mode,
            total_duration_ms: sequence.total_duration_ms(),
            frames: sequence
                .frames
                .iter()
                .map(|frame| FrameManifest {
                    name: frame.name(),
                    left: frame.bbox.left,
                    top: frame.bbox.top,
                    width: frame.bbox.width(),
                    height: frame.bbox.height(),
                    duration_ms: frame.duration_ms,
                    disposal: frame.disposal(),
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomically(path, |file| {
            use std::io::Write;
            file.write_all(json.as_bytes())?;
            Ok(())
        })
    }
}

/// Errors that abort a whole optimization run.
///
/// There is no per-frame recovery: any of these means nothing is emitted.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("The frame source contains no frames")]
    EmptySequence,

    #[error("Invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("Frame {frame} disappeared or lost its extent while the sequence was being processed")]
    SourceChanged { frame: usize },

    #[error("Frame {frame} holds {actual} bytes of pixel data, expected {expected}")]
    PixelDataMismatch {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to allocate {bytes} bytes of scratch memory")]
    AllocationFailed { bytes: usize },
}

/// Allocate a zero-filled byte buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<u8>, OptimizeError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| OptimizeError::AllocationFailed { bytes: len })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

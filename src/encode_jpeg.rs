use std::io::Write as _;
use std::path::Path;

use crate::foundation::core::StoryCanvas;
use crate::foundation::error::{StoryError, StoryResult};

/// Quality used when callers do not pick one.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Encode `canvas` as a baseline JPEG.
pub fn encode_jpeg(canvas: &StoryCanvas, quality: u8) -> StoryResult<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(StoryError::validation("jpeg quality must be in 1..=100"));
    }
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    canvas
        .as_image()
        .write_with_encoder(encoder)
        .map_err(|e| StoryError::encode(format!("jpeg encode failed: {e}")))?;
    Ok(buf)
}

/// JPEG written to a named temporary file, removed when dropped.
#[derive(Debug)]
pub struct TempJpeg {
    file: tempfile::NamedTempFile,
}

impl TempJpeg {
    /// Encode `canvas` into a fresh temporary file.
    pub fn write(canvas: &StoryCanvas, quality: u8) -> StoryResult<Self> {
        let bytes = encode_jpeg(canvas, quality)?;
        let mut file = tempfile::Builder::new()
            .prefix("story-")
            .suffix(".jpg")
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "temporary jpeg written");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Move the file to `dest`, keeping it past this value's lifetime.
    pub fn persist(self, dest: &Path) -> StoryResult<()> {
        self.file.persist(dest).map_err(|e| StoryError::Io(e.error))?;
        Ok(())
    }
}

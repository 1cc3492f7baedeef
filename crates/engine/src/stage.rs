//! Staging of per-job input bytes to a path the engine can read.
//!
//! The engine's image-load op takes a filesystem path, so the raw
//! bytes pulled off the queue are written to a temp `.png` first. The
//! file lives as long as the [`StagedImage`] guard; cleanup on drop is
//! best-effort.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::EngineError;

/// A staged input image. Dropping it removes the temp file.
#[derive(Debug)]
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    /// Path of the staged file, for the engine's image-load op.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Path as a string argument for [`crate::types::NodeInputs`].
    pub fn path_str(&self) -> String {
        self.file.path().to_string_lossy().into_owned()
    }
}

/// Write image bytes to a temporary `.png` file.
pub fn stage_image_bytes(bytes: &[u8]) -> Result<StagedImage, EngineError> {
    let mut file = tempfile::Builder::new()
        .prefix("txr-input-")
        .suffix(".png")
        .tempfile()?;
    std::io::Write::write_all(&mut file, bytes)?;
    Ok(StagedImage { file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_file_holds_the_bytes() {
        let staged = stage_image_bytes(b"not really a png").unwrap();
        let read = std::fs::read(staged.path()).unwrap();
        assert_eq!(read, b"not really a png");
        assert!(staged.path_str().ends_with(".png"));
    }

    #[test]
    fn drop_removes_the_file() {
        let staged = stage_image_bytes(b"x").unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }
}

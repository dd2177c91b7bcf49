use std::path::{Path, PathBuf};

use rfd::FileDialog;

use crate::canvas::SourceImage;
use crate::error::EditorError;

/// Raster formats the decoder is built with.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Check if a path has a supported image extension (case-insensitive).
pub fn is_supported_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an image file into a [`SourceImage`].
pub fn load_source(path: &Path) -> Result<SourceImage, EditorError> {
    let img = image::open(path)?.to_rgba8();
    log::info!(
        "Loaded source {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    SourceImage::new(img)
}

/// Decode in-memory image bytes (pasted or uploaded data).
pub fn decode_source_bytes(bytes: &[u8]) -> Result<SourceImage, EditorError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    log::info!("Decoded source from {} bytes ({}x{})", bytes.len(), img.width(), img.height());
    SourceImage::new(img)
}

/// Default mask file name for a source: `photo.jpg` -> `photo_mask.png`.
pub fn mask_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    format!("{}_mask.png", stem)
}

/// Native file dialogs.  Remembers the last directory used.
#[derive(Default)]
pub struct FileHandler {
    pub current_path: Option<PathBuf>,
}

impl FileHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_dir(&self) -> Option<&Path> {
        self.current_path.as_deref().and_then(|p| p.parent())
    }

    /// Ask for a source image to open.
    pub fn pick_source(&self) -> Option<PathBuf> {
        let mut dialog = FileDialog::new()
            .add_filter("Images", SUPPORTED_EXTENSIONS)
            .add_filter("All Files", &["*"]);
        if let Some(dir) = self.start_dir() {
            dialog = dialog.set_directory(dir);
        }
        dialog.pick_file()
    }

    /// Open a source image via the dialog and remember its path.
    pub fn open_source(&mut self) -> Option<Result<SourceImage, EditorError>> {
        let path = self.pick_source()?;
        let result = load_source(&path);
        if result.is_ok() {
            self.current_path = Some(path);
        }
        Some(result)
    }

    /// Ask where to save the mask PNG, defaulting next to the source.
    pub fn pick_mask_destination(&self) -> Option<PathBuf> {
        let name = self
            .current_path
            .as_deref()
            .map(mask_file_name)
            .unwrap_or_else(|| "mask.png".to_string());
        let mut dialog = FileDialog::new()
            .add_filter("PNG", &["png"])
            .set_file_name(name);
        if let Some(dir) = self.start_dir() {
            dialog = dialog.set_directory(dir);
        }
        dialog.save_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn extension_check_ignores_case() {
        assert!(is_supported_path(Path::new("a/B.PNG")));
        assert!(is_supported_path(Path::new("x.jpeg")));
        assert!(!is_supported_path(Path::new("x.tiff")));
        assert!(!is_supported_path(Path::new("noext")));
    }

    #[test]
    fn mask_name_follows_source() {
        assert_eq!(mask_file_name(Path::new("/tmp/photo.jpg")), "photo_mask.png");
    }

    #[test]
    fn load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.png");
        RgbaImage::from_pixel(6, 4, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();
        let src = load_source(&path).unwrap();
        assert_eq!(src.dimensions(), (6, 4));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_source_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EditorError::Decode(_)));
    }
}

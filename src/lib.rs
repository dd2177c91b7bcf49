//! Mask-based inpainting editor: fit a source image into a display surface,
//! paint or flood-select the regions to regenerate, and export a
//! native-resolution mask (opaque black, transparent where marked).

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod editor;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod settings;

pub use canvas::{ContainerBounds, DisplaySize, SourceImage, SurfaceLayout};
pub use editor::MaskEditor;
pub use error::EditorError;
pub use ops::mask_export::MaskArtifact;
pub use settings::EditorSettings;

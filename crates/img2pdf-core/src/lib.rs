//! Core of img2pdf-rs: image assets, export options, page layout and the
//! sequential export engine. Decoding and document generation are supplied
//! by collaborator crates through the traits in [`plugin`].

pub mod asset;
pub mod error;
pub mod layout;
pub mod options;
pub mod pipeline;
pub mod plugin;

pub use asset::{ImageAsset, ImageSet};
pub use error::{ConvertError, Result};
pub use options::{Color, ExportOptions, MarginPreset, PageFormat};
pub use pipeline::{ExportEngine, ExportState, ExportedDocument};

//! **Ico**n **ex**traction from portable executables and icon containers.
//!
//! Supports:
//! * Parsing and introspection of portable executables and their icon resources
//! * Deterministic variant selection for a requested pixel size
//! * Re-emission as a single-image `.ico` container, a PNG stream or Base64
//! * Extraction from standalone `.ico` containers
//!
//! See [`export_icon`] for the main entry point, or [`Module`] for querying
//! icon resources of a portable executable directly.
//!
//! # Examples
//!
//! ### Icon export
//! ```
//! use icoex::{export_icon, ExportOptions, Output, OutputFormat};
//!
//! // export the second icon group as a 64x64 png and return the bytes
//! let artifact = export_icon(BINARY_PATH, &ExportOptions {
//!     index: 1,
//!     size: Some(64),
//!     format: OutputFormat::Png,
//!     output: Output::Bytes,
//!     ..ExportOptions::default()
//! })?;
//! ```
//!
//! ### Module introspection
//! ```
//! use icoex::Module;
//!
//! let data = std::fs::read(BINARY_PATH)?;
//!
//! // parse the executable image
//! let module = Module::parse(&data)?;
//!
//! // list the icon groups with their variants
//! for group in module.icon_groups() {
//!     let directory = group.directory()?;
//!     for variant in directory.variants() {
//!         println!("{:?}: {}x{}", group.name(), variant.width(), variant.height());
//!     }
//! }
//! ```

pub(crate) mod errors;
pub(crate) mod export;
pub(crate) mod group;
pub(crate) mod ico;
pub(crate) mod module;
pub(crate) mod render;
pub(crate) mod resource;
pub(crate) mod util;

pub mod constants;
pub mod types;

pub use crate::{
    errors::*, export::*, group::*, ico::*, module::*, render::*, resource::*,
};

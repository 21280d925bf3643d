//! Errors specific to reading a module or extracting icon resources.

use std::io::Error as IOError;

use image::ImageError;

/// Error that can occur when reading and parsing bytes.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ReadError(pub String);

/// Errors that can occur when reading a PE module.
#[derive(Debug, thiserror::Error)]
pub enum ModuleReadError {
    #[error("invalid bytes: {0}")]
    InvalidBytes(ReadError),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("invalid section: {0}")]
    InvalidSection(String),
    #[error("io error: {0}")]
    IOError(IOError),
}
impl From<ReadError> for ModuleReadError {
    fn from(error: ReadError) -> Self { ModuleReadError::InvalidBytes(error) }
}
impl From<IOError> for ModuleReadError {
    fn from(error: IOError) -> Self { ModuleReadError::IOError(error) }
}

/// Errors that can occur when locating or decoding icon resources.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("invalid bytes: {0}")]
    InvalidBytes(ReadError),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("invalid icon group: {0}")]
    InvalidGroup(String),
}
impl From<ReadError> for ResourceError {
    fn from(error: ReadError) -> Self { ResourceError::InvalidBytes(error) }
}

/// Errors that can occur when decoding, resampling or encoding raster data.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid raster data: {0}")]
    InvalidRaster(ImageError),
    #[error("encoding failed: {0}")]
    EncodeFailed(ImageError),
}

/// Errors that can occur when exporting an icon from a source file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("load failure: {0}")]
    LoadFailure(ModuleReadError),
    #[error("no icon resources present")]
    NoIconsFound,
    #[error("icon index {index} out of range, {count} icon group(s) available (valid indices 0..{count})")]
    IndexOutOfRange { index: u32, count: usize },
    #[error("malformed icon group: {0}")]
    MalformedIconGroup(String),
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("render failure: {0}")]
    RenderFailure(RenderError),
    #[error("io error: {0}")]
    IOError(IOError),
}
impl From<ModuleReadError> for ExportError {
    fn from(error: ModuleReadError) -> Self { ExportError::LoadFailure(error) }
}
impl From<ResourceError> for ExportError {
    fn from(error: ResourceError) -> Self {
        match error {
            ResourceError::NotFound(resource) => ExportError::ResourceNotFound(resource),
            ResourceError::InvalidGroup(reason) => ExportError::MalformedIconGroup(reason),
            ResourceError::InvalidBytes(error) => {
                ExportError::MalformedIconGroup(error.to_string())
            }
        }
    }
}
impl From<RenderError> for ExportError {
    fn from(error: RenderError) -> Self { ExportError::RenderFailure(error) }
}
impl From<IOError> for ExportError {
    fn from(error: IOError) -> Self { ExportError::IOError(error) }
}

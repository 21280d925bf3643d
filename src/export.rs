//! Icon export facade.
//!
//! Ties module parsing, variant selection, and rendering together behind a
//! single entry point that loads a source file and produces one icon
//! artifact.

use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use debug_ignore::DebugIgnore;
use log::{debug, warn};

use crate::{constants::*, errors::*, group::*, ico::*, module::*, render::*, resource::*};


/// Encoding of the produced icon artifact.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputFormat {
    /// Single-image ICO container.
    Ico,
    /// PNG stream.
    Png,
}
impl Default for OutputFormat {
    fn default() -> Self { Self::Ico }
}

/// Destination of the produced icon artifact.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Output {
    /// Write the artifact to the given path. Without a path a file name is
    /// generated in the system temporary directory. A path that names an
    /// existing directory or ends in a separator receives the generated file
    /// name as well.
    File(Option<PathBuf>),
    /// Return the raw artifact bytes.
    Bytes,
    /// Return the artifact encoded as Base64 in the standard alphabet.
    Base64,
}
impl Default for Output {
    fn default() -> Self { Self::File(None) }
}

/// Options for [`export_icon`].
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Zero-based index of the icon group to export.
    pub index:         u32,
    /// Square target size in pixels. Defaults to 32 for executable sources
    /// and to the native size of the primary entry for container sources.
    pub size:          Option<u32>,
    /// Encoding of the artifact.
    pub format:        OutputFormat,
    /// Destination of the artifact.
    pub output:        Output,
    /// ICO container used in place of the source when the source holds no
    /// usable icon.
    pub fallback_icon: Option<DebugIgnore<Vec<u8>>>,
}

/// Produced icon artifact.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Artifact {
    /// Path of the written file.
    File(PathBuf),
    /// Raw artifact bytes.
    Bytes(DebugIgnore<Vec<u8>>),
    /// Base64 encoding of the artifact bytes.
    Base64(String),
}

/// Description of one icon group of a source file.
#[derive(Debug, Clone)]
pub struct IconGroupInfo {
    /// Resource name or id of the group. `None` for container sources.
    pub name:      Option<ResourceEntryName>,
    /// Directory with the raster variants of the group.
    pub directory: IconGroupDirectory,
}

/// Artifact data with the pixel size it was produced at.
struct ExportPayload {
    data: Vec<u8>,
    size: u32,
}

/// Export one icon from an executable or icon container.
///
/// The source kind is determined by file extension. For executables the icon
/// group at `options.index` is exported, container sources hold a single
/// group at index 0. When extraction fails and a fallback icon is configured,
/// the artifact is produced from the fallback container instead.
///
/// # Returns
/// Returns the artifact as determined by `options.output`, or an error if the
/// options are invalid or the icon cannot be extracted.
pub fn export_icon<P: AsRef<Path>>(source: P, options: &ExportOptions) -> Result<Artifact, ExportError> {
    let source = source.as_ref();
    let extension = validate_source(source)?;
    validate_options(options)?;
    debug!("exporting icon group {} from {:?}", options.index, source);

    let result = if extension == "ico" {
        fs::read(source)
            .map_err(ModuleReadError::IOError)
            .map_err(ExportError::from)
            .and_then(|data| assemble_from_container(data, options))
    } else {
        assemble_from_module(source, options)
    };
    let payload = match result {
        Ok(payload) => payload,
        Err(error) => {
            let fallback = match &options.fallback_icon {
                Some(fallback) if fallback_applies(&error) => fallback,
                _ => return Err(error),
            };
            warn!("falling back to the default icon: {}", error);
            let fallback_options = ExportOptions {
                index: 0,
                fallback_icon: None,
                ..options.clone()
            };
            assemble_from_container(fallback.to_vec(), &fallback_options)?
        }
    };

    match &options.output {
        Output::File(target) => {
            let path = resolve_output_path(source, target.as_deref(), payload.size, options);
            fs::write(&path, &payload.data)?;
            debug!("wrote {} bytes to {:?}", payload.data.len(), path);
            Ok(Artifact::File(path))
        }
        Output::Bytes => Ok(Artifact::Bytes(payload.data.into())),
        Output::Base64 => Ok(Artifact::Base64(STANDARD.encode(&payload.data))),
    }
}

/// List the icon groups of a source file without exporting anything.
///
/// # Returns
/// Returns one entry per icon group in on-disk order. Container sources yield
/// at most one group with no resource name.
pub fn icon_info<P: AsRef<Path>>(source: P) -> Result<Vec<IconGroupInfo>, ExportError> {
    let source = source.as_ref();
    let extension = validate_source(source)?;
    if extension == "ico" {
        let data = fs::read(source).map_err(ModuleReadError::IOError)?;
        let file = IconFile::parse(data)?;
        let variants = file.variants();
        if variants.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![IconGroupInfo {
            name:      None,
            directory: IconGroupDirectory::from_variants(variants),
        }]);
    }
    let module = Module::open(source)?;
    let mut info = Vec::new();
    for group in module.icon_groups() {
        info.push(IconGroupInfo {
            name:      Some(group.name().clone()),
            directory: group.directory()?,
        });
    }
    module.close();
    Ok(info)
}

fn assemble_from_module(source: &Path, options: &ExportOptions) -> Result<ExportPayload, ExportError> {
    let module = Module::open(source)?;
    let result = assemble_module_icon(&module, options);
    module.close();
    result
}

fn assemble_module_icon(module: &Module, options: &ExportOptions) -> Result<ExportPayload, ExportError> {
    let groups = module.icon_groups();
    if groups.is_empty() {
        return Err(ExportError::NoIconsFound);
    }
    let group = groups
        .get(options.index as usize)
        .ok_or(ExportError::IndexOutOfRange {
            index: options.index,
            count: groups.len(),
        })?;
    debug!("exporting icon group {:?}", group.name());
    let directory = group.directory()?;
    let size = options.size.unwrap_or(DEFAULT_ICON_SIZE);
    let variant = select_variant(directory.variants(), size)
        .ok_or_else(|| ExportError::MalformedIconGroup("icon group has no variants".to_string()))?;
    let raster = module.icon_raster(variant.id())?;
    render_output(variant, raster, size, options)
}

fn assemble_from_container(data: Vec<u8>, options: &ExportOptions) -> Result<ExportPayload, ExportError> {
    let file = IconFile::parse(data)?;
    let variants = file.variants();
    if variants.is_empty() {
        return Err(ExportError::NoIconsFound);
    }
    if options.index != 0 {
        return Err(ExportError::IndexOutOfRange {
            index: options.index,
            count: 1,
        });
    }
    let size = options.size.unwrap_or_else(|| variants[0].width());
    let variant = match select_variant(&variants, size) {
        Some(variant) => *variant,
        None => {
            return Err(ExportError::MalformedIconGroup(
                "container has no variants".to_string(),
            ))
        }
    };
    let raster = file.payload(variant.id() as usize)?;
    render_output(&variant, raster, size, options)
}

fn render_output(
    variant: &IconVariant, raster: &[u8], size: u32, options: &ExportOptions,
) -> Result<ExportPayload, ExportError> {
    match options.format {
        OutputFormat::Png => Ok(ExportPayload {
            data: render_png(variant, raster, size)?,
            size,
        }),
        OutputFormat::Ico => {
            // without an explicit size the selected raster is kept byte for byte
            if options.size.is_none() || (variant.width() == size && variant.height() == size) {
                Ok(ExportPayload {
                    data: build_single_ico(variant, raster),
                    size: variant.width(),
                })
            } else {
                Ok(ExportPayload {
                    data: render_ico(variant, raster, size)?,
                    size,
                })
            }
        }
    }
}

fn fallback_applies(error: &ExportError) -> bool {
    matches!(
        error,
        ExportError::LoadFailure(_)
            | ExportError::NoIconsFound
            | ExportError::ResourceNotFound(_)
            | ExportError::MalformedIconGroup(_)
            | ExportError::RenderFailure(_)
    )
}

fn validate_source(source: &Path) -> Result<String, ExportError> {
    let extension = source
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
        .ok_or_else(|| {
            ExportError::InvalidInput(format!("source {:?} has no usable extension", source))
        })?;
    if !SOURCE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ExportError::InvalidInput(format!(
            "source extension {:?} not supported, expected one of {:?}",
            extension, SOURCE_EXTENSIONS
        )));
    }
    if !source.is_file() {
        return Err(ExportError::InvalidInput(format!(
            "source {:?} is not a file",
            source
        )));
    }
    Ok(extension)
}

fn validate_options(options: &ExportOptions) -> Result<(), ExportError> {
    if options.index > MAX_ICON_INDEX {
        return Err(ExportError::InvalidInput(format!(
            "icon index {} exceeds the maximum of {}",
            options.index, MAX_ICON_INDEX
        )));
    }
    if let Some(size) = options.size {
        if !(MIN_ICON_SIZE..=MAX_ICON_SIZE).contains(&size) {
            return Err(ExportError::InvalidInput(format!(
                "icon size {} outside the supported range {} to {}",
                size, MIN_ICON_SIZE, MAX_ICON_SIZE
            )));
        }
    }
    Ok(())
}

fn resolve_output_path(
    source: &Path, target: Option<&Path>, size: u32, options: &ExportOptions,
) -> PathBuf {
    let file_name = output_file_name(source, size, options);
    let target = match target {
        None => return std::env::temp_dir().join(file_name),
        Some(target) => target,
    };
    let trailing_separator = target
        .to_str()
        .map(|target| target.ends_with('/') || target.ends_with('\\'))
        .unwrap_or(false);
    if target.is_dir() || trailing_separator {
        target.join(file_name)
    } else {
        target.to_path_buf()
    }
}

fn output_file_name(source: &Path, size: u32, options: &ExportOptions) -> String {
    let stem = source
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("icon");
    let extension = match options.format {
        OutputFormat::Ico => "ico",
        OutputFormat::Png => "png",
    };
    format!("{}_{}_{}.{}", stem, options.index, size, extension)
}

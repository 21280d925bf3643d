//! Icon group directory parsing and variant selection.
//!
//! An RT_GROUP_ICON resource describes the raster variants of one icon in the
//! GRPICONDIR layout. See <https://learn.microsoft.com/en-us/previous-versions/ms997538(v=msdn.10)>
//! for more information.

use std::mem::size_of;

use log::{trace, warn};

use crate::{constants::*, errors::*, resource::*, types::*, util::*};

/// Handle to one RT_GROUP_ICON resource of a module.
///
/// Holds the resource name and a view of the group payload. The view borrows
/// from the module, so a handle cannot outlive the module it came from.
#[derive(Debug, Clone, Copy)]
pub struct IconGroup<'a> {
    pub(crate) name: &'a ResourceEntryName,
    pub(crate) data: &'a [u8],
}
impl<'a> IconGroup<'a> {
    /// Returns the resource name or id of the group.
    pub fn name(&self) -> &'a ResourceEntryName { self.name }

    /// Returns the raw GRPICONDIR payload of the group.
    pub fn data(&self) -> &'a [u8] { self.data }

    /// Decode the group payload.
    ///
    /// # Returns
    /// Returns an error if the payload is truncated or not an icon directory.
    pub fn directory(&self) -> Result<IconGroupDirectory, ResourceError> {
        IconGroupDirectory::parse(self.data)
    }
}

/// Parsed GRPICONDIR directory of an icon group.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct IconGroupDirectory {
    pub(crate) header:   IconDirectoryHeader,
    pub(crate) variants: Vec<IconVariant>,
}
impl IconGroupDirectory {
    /// Parse a GRPICONDIR layout from raw resource data.
    ///
    /// Entries are kept in directory order, including entries with a zero
    /// payload size.
    ///
    /// # Returns
    /// Returns an error if the header or an entry is truncated, or the data
    /// does not describe an icon directory.
    pub fn parse(data: &[u8]) -> Result<Self, ResourceError> {
        let header = read::<IconDirectoryHeader>(data)
            .map_err(|_| ResourceError::InvalidGroup("truncated directory header".to_string()))?;
        trace!("{:#x?}", header);
        let type_ = header.type_;
        if type_ != ICON_RES_TYPE {
            return Err(ResourceError::InvalidGroup(format!(
                "unexpected resource type {} in directory header",
                type_
            )));
        }
        let reserved = header.reserved;
        if reserved != 0 {
            warn!("directory header reserved field is {}, expected 0", reserved);
        }
        let count = header.count;
        let mut variants = Vec::with_capacity(count as usize);
        for index in 0..count {
            let offset = size_of::<IconDirectoryHeader>() as u64
                + index as u64 * size_of::<IconGroupEntry>() as u64;
            let entry = read_at::<IconGroupEntry>(data, offset).map_err(|_| {
                ResourceError::InvalidGroup(format!("truncated entry {} of {}", index, count))
            })?;
            trace!("{:#x?}", entry);
            let bytes = entry.bytes;
            if bytes == 0 {
                let id = entry.id;
                warn!("variant {} has no raster data", id);
            }
            variants.push(IconVariant {
                entry,
            });
        }
        Ok(Self {
            header,
            variants,
        })
    }

    pub(crate) fn from_variants(variants: Vec<IconVariant>) -> Self {
        Self {
            header: IconDirectoryHeader {
                reserved: 0,
                type_:    ICON_RES_TYPE,
                count:    variants.len() as u16,
            },
            variants,
        }
    }

    /// Returns the raster variants of the group in directory order.
    pub fn variants(&self) -> &[IconVariant] { &self.variants }
}

/// One raster variant of an icon group.
///
/// Wraps the on-disk directory entry. The logical accessors normalize the
/// zero-as-256 dimension encoding, the raw accessors return the stored bytes
/// unchanged for re-serialization.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct IconVariant {
    pub(crate) entry: IconGroupEntry,
}
impl IconVariant {
    /// Logical width in pixels. A stored width of 0 means 256.
    pub fn width(&self) -> u32 {
        match self.entry.width {
            0 => ICON_DIMENSION_ZERO,
            width => width as u32,
        }
    }

    /// Logical height in pixels. A stored height of 0 means 256.
    pub fn height(&self) -> u32 {
        match self.entry.height {
            0 => ICON_DIMENSION_ZERO,
            height => height as u32,
        }
    }

    /// Width as stored in the directory entry.
    pub fn raw_width(&self) -> u8 { self.entry.width }

    /// Height as stored in the directory entry.
    pub fn raw_height(&self) -> u8 { self.entry.height }

    /// Number of palette colors, 0 when the variant has no palette.
    pub fn color_count(&self) -> u8 { self.entry.color_count }

    /// Reserved field as stored in the directory entry.
    pub fn reserved(&self) -> u8 { self.entry.reserved }

    /// Number of color planes.
    pub fn planes(&self) -> u16 { self.entry.planes }

    /// Bits per pixel.
    pub fn bit_count(&self) -> u16 { self.entry.bit_count }

    /// Size of the raster payload in bytes.
    pub fn bytes(&self) -> u32 { self.entry.bytes }

    /// Id of the RT_ICON resource holding the raster payload. For variants of
    /// a standalone container this is the entry index instead.
    pub fn id(&self) -> u16 { self.entry.id }

    /// Returns a descriptor for a 32 bit RGBA rendition of the given square size.
    pub(crate) fn for_size(size: u32) -> Self {
        let dimension = if size >= ICON_DIMENSION_ZERO { 0 } else { size as u8 };
        Self {
            entry: IconGroupEntry {
                width:       dimension,
                height:      dimension,
                color_count: 0,
                reserved:    0,
                planes:      1,
                bit_count:   32,
                bytes:       0,
                id:          0,
            },
        }
    }
}

/// Select the variant of a group best matching a target size.
///
/// Picks an exact width match when one exists. Otherwise the smallest
/// variant larger than the target is chosen, with the largest available as
/// the last resort. Ties resolve to the variant earliest in directory order.
pub fn select_variant(variants: &[IconVariant], size: u32) -> Option<&IconVariant> {
    if let Some(variant) = variants.iter().find(|variant| variant.width() == size) {
        return Some(variant);
    }
    if let Some(variant) = variants
        .iter()
        .filter(|variant| variant.width() > size)
        .min_by_key(|variant| variant.width())
    {
        return Some(variant);
    }
    let mut selected: Option<&IconVariant> = None;
    for variant in variants {
        match selected {
            Some(best) if variant.width() <= best.width() => {}
            _ => selected = Some(variant),
        }
    }
    selected
}

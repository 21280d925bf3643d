//! ICO container building and parsing.
//!
//! The container layout mirrors the GRPICONDIR resource layout with file
//! offsets in place of resource ids. See
//! <https://learn.microsoft.com/en-us/previous-versions/ms997538(v=msdn.10)>
//! for more information.

use std::mem::size_of;

use debug_ignore::DebugIgnore;
use log::trace;
use zerocopy::IntoBytes;

use crate::{constants::*, errors::*, group::*, types::*, util::*};

/// File offset of the raster payload in a container with a single entry.
pub(crate) const SINGLE_PAYLOAD_OFFSET: u32 =
    (size_of::<IconDirectoryHeader>() + size_of::<IconFileEntry>()) as u32;

/// Build a single-image ICO container from a variant descriptor and its
/// raster payload.
///
/// The directory entry keeps the descriptor's raw dimension encoding, only
/// the payload size and offset are recomputed. The payload is copied
/// unchanged, so a PNG or DIB raster round-trips byte for byte.
pub fn build_single_ico(variant: &IconVariant, raster: &[u8]) -> Vec<u8> {
    let header = IconDirectoryHeader {
        reserved: 0,
        type_:    ICON_RES_TYPE,
        count:    1,
    };
    let entry = IconFileEntry {
        width:       variant.raw_width(),
        height:      variant.raw_height(),
        color_count: variant.color_count(),
        reserved:    variant.reserved(),
        planes:      variant.planes(),
        bit_count:   variant.bit_count(),
        bytes:       raster.len() as u32,
        offset:      SINGLE_PAYLOAD_OFFSET,
    };
    let mut container = Vec::with_capacity(SINGLE_PAYLOAD_OFFSET as usize + raster.len());
    container.extend_from_slice(header.as_bytes());
    container.extend_from_slice(entry.as_bytes());
    container.extend_from_slice(raster);
    container
}

/// Parsed standalone ICO container.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct IconFile {
    header:  IconDirectoryHeader,
    entries: Vec<IconFileEntry>,
    data:    DebugIgnore<Vec<u8>>,
}
impl IconFile {
    /// Parse an ICO container.
    ///
    /// # Returns
    /// Returns an error if the directory is truncated or the data does not
    /// describe an icon container.
    pub fn parse(data: Vec<u8>) -> Result<Self, ResourceError> {
        let header = read::<IconDirectoryHeader>(&data)
            .map_err(|_| ResourceError::InvalidGroup("truncated container header".to_string()))?;
        trace!("{:#x?}", header);
        let type_ = header.type_;
        if type_ != ICON_RES_TYPE {
            return Err(ResourceError::InvalidGroup(format!(
                "unexpected resource type {} in container header",
                type_
            )));
        }
        let count = header.count;
        let mut entries = Vec::with_capacity(count as usize);
        for index in 0..count {
            let offset = size_of::<IconDirectoryHeader>() as u64
                + index as u64 * size_of::<IconFileEntry>() as u64;
            let entry = read_at::<IconFileEntry>(&data, offset).map_err(|_| {
                ResourceError::InvalidGroup(format!("truncated entry {} of {}", index, count))
            })?;
            trace!("{:#x?}", entry);
            entries.push(entry);
        }
        Ok(Self {
            header,
            entries,
            data: data.into(),
        })
    }

    /// Returns the directory entries as group variants.
    /// The id of each variant is its entry index in the container.
    pub fn variants(&self) -> Vec<IconVariant> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| IconVariant {
                entry: IconGroupEntry {
                    width:       entry.width,
                    height:      entry.height,
                    color_count: entry.color_count,
                    reserved:    entry.reserved,
                    planes:      entry.planes,
                    bit_count:   entry.bit_count,
                    bytes:       entry.bytes,
                    id:          index as u16,
                },
            })
            .collect()
    }

    /// Returns the raster payload of the entry at the given index.
    ///
    /// # Returns
    /// Returns an error if no entry with the index exists or the payload lies
    /// outside the container.
    pub fn payload(&self, index: usize) -> Result<&[u8], ResourceError> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| ResourceError::NotFound(format!("container entry {}", index)))?;
        let offset = entry.offset as u64;
        let bytes = entry.bytes as u64;
        if offset + bytes > self.data.len() as u64 {
            return Err(ResourceError::InvalidGroup(format!(
                "entry {} payload at {:#x} with size {:#x} outside container ({:#x})",
                index,
                offset,
                bytes,
                self.data.len()
            )));
        }
        Ok(&self.data[offset as usize..(offset + bytes) as usize])
    }
}

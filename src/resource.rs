//! Data types for parsing the resource section and locating icon resources.
//! The resource section contains the resource directory and the resource data.
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format#the-rsrc-section> for more information.

use std::{borrow::Borrow, mem::size_of};

use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use log::{error, trace, warn};

use crate::{constants::*, errors::*, group::*, types::*, util::*};


/// Portable executable resource directory.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceDirectory {
    pub(crate) virtual_address: u32,
    pub(crate) root:            ResourceTable,
}
impl ResourceDirectory {
    /// Parse the resource directory from the given image at the given base address.
    /// The virtual address is used to resolve the resource data offsets and has to correspond to the virtual address in the section table header of the source image.
    ///
    /// # Returns
    /// Returns an error if the resource directory at the given address is invalid.
    pub fn parse(
        image: &[u8], base_address: u32, virtual_address: u32,
    ) -> Result<Self, ModuleReadError> {
        let root = ResourceTable::parse(image, base_address, virtual_address, 0, 0)?;
        Ok(Self {
            virtual_address,
            root,
        })
    }

    /// Returns the virtual address of the resource directory in the source image.
    pub fn virtual_address(&self) -> u32 { self.virtual_address }

    /// Returns the root resource table.
    /// The root resource table contains the top-level resource entries.
    pub fn root(&self) -> &ResourceTable { &self.root }

    /// Enumerate the icon groups of the directory in on-disk resource order.
    ///
    /// Groups without a data entry and groups whose directory holds no
    /// variants are skipped, so every returned handle can be exported.
    /// Decoding of the group payload is deferred to [`IconGroup::directory`].
    pub fn icon_groups(&self) -> Vec<IconGroup> {
        let mut groups = Vec::new();
        let table = match self.root.get(ResourceEntryName::ID(RT_GROUP_ICON as u32)) {
            Some(ResourceEntry::Table(table)) => table,
            _ => return groups,
        };
        for (name, entry) in table.entries.iter() {
            let data = match entry.first_data() {
                Some(data) => data,
                None => {
                    warn!("icon group {:?} has no data entry, skipping", name);
                    continue;
                }
            };
            if let Ok(header) = read::<IconDirectoryHeader>(data.data()) {
                if header.count == 0 {
                    warn!("icon group {:?} is empty, skipping", name);
                    continue;
                }
            }
            trace!("icon group {:?}: {} bytes", name, data.data().len());
            groups.push(IconGroup {
                name,
                data: data.data(),
            });
        }
        groups
    }

    /// Returns the raster payload of the RT_ICON resource with the given id.
    ///
    /// # Returns
    /// Returns an error if no RT_ICON resource with the id exists.
    pub fn icon_raster(&self, id: u16) -> Result<&[u8], ResourceError> {
        let table = match self.root.get(ResourceEntryName::ID(RT_ICON as u32)) {
            Some(ResourceEntry::Table(table)) => table,
            _ => return Err(ResourceError::NotFound("RT_ICON table".to_string())),
        };
        let entry = table
            .get(ResourceEntryName::ID(id as u32))
            .ok_or_else(|| ResourceError::NotFound(format!("RT_ICON resource {}", id)))?;
        entry
            .first_data()
            .map(|data| data.data())
            .ok_or_else(|| ResourceError::NotFound(format!("RT_ICON resource {} data", id)))
    }
}

/// Portable executable resource table.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceTable {
    pub(crate) data:    ResourceDirectoryTable,
    pub(crate) entries: IndexMap<ResourceEntryName, ResourceEntry>,
}
impl ResourceTable {
    fn parse(
        image: &[u8], base_address: u32, virtual_address: u32, directory_offset: u32, level: usize,
    ) -> Result<Self, ModuleReadError> {
        if level > 8 {
            return Err(ModuleReadError::InvalidSection(
                "resource directory nested too deep".to_string(),
            ));
        }

        let table_offset = base_address as u64 + directory_offset as u64;
        let resource_table = read_at::<ResourceDirectoryTable>(image, table_offset)?;
        trace!("{} {:#x?}", "--".repeat(level + 1), resource_table);

        let mut entries = IndexMap::new();

        let mut entry_offset = table_offset + 16;
        for _ in 0..(resource_table.number_of_name_entries as u32
            + resource_table.number_of_id_entries as u32)
        {
            let entry = read_at::<ResourceDirectoryEntry>(image, entry_offset)?;
            trace!("{} {:#x?}", "--".repeat(level + 1), entry);

            if entry.data_entry_or_subdirectory_offset & 0x80000000 != 0 {
                entries.insert(
                    ResourceEntryName::parse(image, base_address, entry.name_offset_or_integer_id)?,
                    ResourceEntry::Table(ResourceTable::parse(
                        image,
                        base_address,
                        virtual_address,
                        entry.data_entry_or_subdirectory_offset ^ 0x80000000,
                        level + 1,
                    )?),
                );
            } else {
                trace!(
                    "reading {} bytes at {} (image size {})",
                    size_of::<ResourceDataEntry>(),
                    base_address as u64 + entry.data_entry_or_subdirectory_offset as u64,
                    image.len()
                );
                let data = read_at::<ResourceDataEntry>(
                    image,
                    base_address as u64 + entry.data_entry_or_subdirectory_offset as u64,
                )?;
                // calculate as i64 and convert to u64 first to check for padding
                let address = base_address as i64 + data.data_rva as i64 - virtual_address as i64;
                let mut address = address as u64;
                if address & 0xffffffffff000000 == 0xffffffffff000000 {
                    warn!(
                        "{} resource data entry address {:#x?} seems to be packed, ignoring padding",
                        "--".repeat(level + 1),
                        address
                    );
                    address ^= 0xffffffffff000000;
                }
                trace!("{} {:#x?} {:#x?}", "--".repeat(level + 1), address, data);
                if address + data.size as u64 > image.len() as u64 {
                    error!(
                        "{} resource data entry address {:#x?} with size {:#x?} ({:#x?}) outside valid range ({:#x?})",
                        "--".repeat(level + 1),
                        address,
                        data.size,
                        address + data.size as u64,
                        image.len()
                    );
                    continue;
                }
                let address = address as usize;
                entries.insert(
                    ResourceEntryName::parse(image, base_address, entry.name_offset_or_integer_id)?,
                    ResourceEntry::Data(ResourceData {
                        codepage: data.codepage,
                        reserved: data.reserved,
                        data:     Vec::from(&image[address..address + data.size as usize]).into(),
                    }),
                );
            }

            entry_offset += 8;
        }
        Ok(Self {
            data: resource_table,
            entries,
        })
    }

    /// Get a resource entry from the table.
    /// # Returns
    /// The resource entry.
    pub fn get<N: Borrow<ResourceEntryName>>(&self, name: N) -> Option<&ResourceEntry> {
        self.entries.get(name.borrow())
    }

    /// Returns the entries in the table.
    pub fn entries(&self) -> Vec<&ResourceEntryName> { self.entries.keys().collect() }
}

/// Raw resource data.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ResourceData {
    data:     DebugIgnore<Vec<u8>>,
    codepage: u32,
    reserved: u32,
}
impl ResourceData {
    /// Returns the raw data.
    pub fn data(&self) -> &[u8] { &self.data }

    /// Returns the codepage of the data.
    pub fn codepage(&self) -> u32 { self.codepage }
}

/// Resource entry in a resource table.
/// This can be either a child table or raw data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResourceEntry {
    Table(ResourceTable),
    Data(ResourceData),
}
impl ResourceEntry {
    /// Returns the first data entry beneath this entry in resource tree order.
    /// For an icon resource this descends through the language level to the payload.
    pub fn first_data(&self) -> Option<&ResourceData> {
        match self {
            ResourceEntry::Data(data) => Some(data),
            ResourceEntry::Table(table) => {
                table.entries.values().find_map(|entry| entry.first_data())
            }
        }
    }
}

/// Resource directory entry name.
/// This can either be a raw id or a name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ResourceEntryName {
    // raw id
    ID(u32),
    // 2 byte size + data
    Name(Vec<u8>),
}
impl ResourceEntryName {
    fn parse(image: &[u8], offset: u32, id: u32) -> Result<Self, ReadError> {
        if id & 0x80000000 != 0 {
            trace!("reading resource name {:#x?}", id);
            let address = offset as u64 + (id ^ 0x80000000) as u64;
            let length = read_at::<u16>(image, address)? as u64;
            trace!("resource name length: {}", length);
            // size is in 16 bit characters so it needs to be doubled
            let data = image
                .get(address as usize..(address + 2 + length * 2) as usize)
                .ok_or_else(|| ReadError("resource name".to_string()))?;
            trace!("resource name: {:x?}", data);
            Ok(Self::Name(data.to_vec()))
        } else {
            trace!("reading resource id {:#x?}", id);
            Ok(Self::ID(id))
        }
    }

    pub fn from_string<S: AsRef<str>>(string: S) -> Self {
        let string = string.as_ref();
        let mut data = Vec::with_capacity(string.len() * 2 + 2);
        data.extend_from_slice(&(string.len() as u16).to_le_bytes());
        data.extend(string.encode_utf16().flat_map(|c| c.to_le_bytes().to_vec()));
        Self::Name(data)
    }

    pub fn to_string(&self) -> Option<String> {
        match self {
            Self::ID(_) => None,
            Self::Name(data) => {
                let length = read::<u16>(&data[0..]).ok()? as usize;
                let data = data.get(2..)?;
                let mut string = String::with_capacity(length);
                for i in 0..length {
                    let c = read::<u16>(data.get(i * 2..)?).ok()? as u32;
                    string.push(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                Some(string)
            }
        }
    }
}

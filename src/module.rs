//! Portable executable module representation.
//!
//! See <https://learn.microsoft.com/en-us/windows/win32/debug/pe-format> for more information.

use std::borrow::Cow;

use ahash::RandomState;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::{constants::*, errors::*, group::*, resource::*, types::*, util::*};

/// Image data directory type enumeration.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DataDirectoryType {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TLSTable,
    LoadConfigTable,
    BoundImport,
    IAT,
    DelayImportDescriptor,
    CLRRuntimeHeader,
    Reserved,
}

/// Portable executable module opened for icon extraction.
///
/// The module owns or borrows the raw image bytes for its whole lifetime.
/// Resource payloads obtained from it are views into the parsed resource
/// directory and stay valid until the module is closed or dropped.
#[derive(Debug, Clone)]
pub struct Module<'a> {
    pub(crate) image: Cow<'a, [u8]>,

    pub(crate) coff_header:           CoffHeader,
    pub(crate) standard_header:       StandardHeader,
    pub(crate) header_data_directory: IndexMap<DataDirectoryType, ImageDataDirectory, RandomState>,
    pub(crate) section_table:         Vec<SectionHeader>,

    pub(crate) resource_directory: Option<ResourceDirectory>,
}

impl<'a> Module<'a> {
    /// Parse a portable executable module from a byte slice.
    ///
    /// # Returns
    /// Returns the `Module`, or an error if the byte slice is not a valid portable executable image or is missing required headers.
    pub fn parse<R: Into<Cow<'a, [u8]>>>(image: R) -> Result<Self, ModuleReadError> {
        let image = image.into();

        let pe_dos_magic = read_at::<u16>(&image, 0)?;
        debug!("pe_dos_magic: {:#x?}", pe_dos_magic);
        if pe_dos_magic != PE_DOS_MAGIC {
            return Err(ModuleReadError::InvalidHeader("no dos magic".into()));
        }

        let pe_signature_offset = read_at::<u32>(&image, PE_PTR_OFFSET as u64)?;
        debug!("pe_signature_offset: {:#x?}", pe_signature_offset);

        let pe_signature = read_at::<u32>(&image, pe_signature_offset as u64)?;
        debug!("pe_signature: {:#x?}", pe_signature);
        if pe_signature != PE_NT_SIGNATURE {
            return Err(ModuleReadError::InvalidHeader("no pe signature".into()));
        }

        let coff_header_offset = (pe_signature_offset + 4) as u64;
        let coff_header = read_at::<CoffHeader>(&image, coff_header_offset)?;
        debug!("{:#x?}: {:#x?}", coff_header_offset, coff_header);
        if coff_header.size_of_optional_header < 24 {
            return Err(ModuleReadError::InvalidHeader("optional header too small".into()));
        }

        let standard_header_offset = coff_header_offset + 20;
        let standard_header = read_at::<StandardHeader>(&image, standard_header_offset)?;
        debug!("{:#x?}: {:#x?}", standard_header_offset, standard_header);

        let (number_of_rva_and_sizes, optional_header_dd_offset) = {
            if standard_header.magic == PE_32_MAGIC && coff_header.size_of_optional_header >= 96 {
                let windows_header_offset = standard_header_offset + 28;
                let windows_header =
                    read_at::<WindowsHeader<u32>>(&image, windows_header_offset)?;
                debug!("{:#x?}: {:#x?}", windows_header_offset, windows_header);
                (windows_header.number_of_rva_and_sizes, standard_header_offset + 96)
            } else if standard_header.magic == PE_64_MAGIC
                && coff_header.size_of_optional_header >= 112
            {
                let windows_header_offset = standard_header_offset + 24;
                let windows_header =
                    read_at::<WindowsHeader<u64>>(&image, windows_header_offset)?;
                debug!("{:#x?}: {:#x?}", windows_header_offset, windows_header);
                (windows_header.number_of_rva_and_sizes, standard_header_offset + 112)
            } else {
                return Err(ModuleReadError::InvalidHeader("invalid optional header".into()));
            }
        };

        if image.len() <= optional_header_dd_offset as usize {
            return Err(ModuleReadError::InvalidHeader(
                "image truncated after optional header".into(),
            ));
        }

        debug!("optional_header_dd_offset: {:#x?}", optional_header_dd_offset);
        let mut header_data_directory =
            IndexMap::<DataDirectoryType, ImageDataDirectory, _>::with_hasher(RandomState::new());
        use DataDirectoryType::*;
        for (index, &header) in [
            ExportTable,
            ImportTable,
            ResourceTable,
            ExceptionTable,
            CertificateTable,
            BaseRelocationTable,
            Debug,
            Architecture,
            GlobalPtr,
            TLSTable,
            LoadConfigTable,
            BoundImport,
            IAT,
            DelayImportDescriptor,
            CLRRuntimeHeader,
            Reserved,
        ]
        .iter()
        .enumerate()
        {
            if (index as u32) < number_of_rva_and_sizes {
                let offset = optional_header_dd_offset + (index * 8) as u64;
                let data = read_at::<ImageDataDirectory>(&image, offset)?;
                header_data_directory.insert(header, data);
                debug!("{:#x?}: {:?}: {:#x?}", offset, header, data);
            }
        }

        let section_table_offset =
            standard_header_offset + coff_header.size_of_optional_header as u64;
        let mut section_table = Vec::new();
        for index in 0..coff_header.number_of_sections {
            let section_table_offset = section_table_offset + index as u64 * 40;
            let section_header = read_at::<SectionHeader>(&image, section_table_offset)?;
            debug!(
                "{:#x?}: {}: {:#x?}",
                section_table_offset,
                section_header.name().unwrap_or("?".to_string()),
                section_header
            );
            section_table.push(section_header);
        }

        let mut resource_directory = None;
        if let Some(resource_data) = header_data_directory.get(&DataDirectoryType::ResourceTable) {
            if resource_data.virtual_address > 0 && resource_data.size > 0 {
                for section_header in section_table.iter() {
                    if resource_data.virtual_address as u64 >= section_header.virtual_address as u64
                        && (resource_data.virtual_address as u64)
                            < section_header.virtual_address as u64
                                + section_header.virtual_size as u64
                    {
                        debug!(
                            "found resource directory in {} section: {:#x?}",
                            section_header.name().unwrap_or("?".to_string()),
                            section_header
                        );
                        // a module with a broken resource tree still opens,
                        // it only has no icons to enumerate
                        match ResourceDirectory::parse(
                            &image,
                            section_header.pointer_to_raw_data,
                            section_header.virtual_address,
                        ) {
                            Ok(directory) => resource_directory = Some(directory),
                            Err(error) => {
                                warn!("skipping unreadable resource directory: {}", error)
                            }
                        }
                    }
                }
            }
        }

        Ok(Self {
            image,
            coff_header,
            standard_header,
            header_data_directory,
            section_table,
            resource_directory,
        })
    }

    /// Open a portable executable module from a file.
    ///
    /// The file is read into memory as data and is never mapped for execution.
    ///
    /// # Returns
    /// Returns the `Module`, or an error if the file could not be read, is not a valid portable executable image or is missing required headers.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ModuleReadError> {
        let data = std::fs::read(path)?;
        Self::parse(data)
    }

    /// Close the module and release the image bytes it holds.
    ///
    /// Consuming the handle makes releasing it a single-shot operation.
    /// Dropping the module has the same effect.
    pub fn close(self) {}

    /// Enumerate the icon groups of the module in their on-disk resource order.
    ///
    /// The position of a group in the returned list is the icon index callers
    /// select by. Groups without any raster variant are not enumerated.
    /// The list is empty when the module has no RT_GROUP_ICON resources.
    pub fn icon_groups(&self) -> Vec<IconGroup<'_>> {
        match &self.resource_directory {
            Some(directory) => directory.icon_groups(),
            None => Vec::new(),
        }
    }

    /// Returns the raster payload of the RT_ICON resource with the given id.
    ///
    /// # Returns
    /// Returns an error if the module has no resource directory or no RT_ICON resource with the id exists.
    pub fn icon_raster(&self, id: u16) -> Result<&[u8], ResourceError> {
        self.resource_directory
            .as_ref()
            .ok_or_else(|| ResourceError::NotFound("resource directory".to_string()))
            .and_then(|directory| directory.icon_raster(id))
    }

    /// Returns the current resource directory or `None` if the module does not contain a resource directory.
    pub fn resource_directory(&self) -> Option<&ResourceDirectory> {
        self.resource_directory.as_ref()
    }

    /// Returns the raw image data.
    pub fn data(&self) -> &[u8] { &self.image }

    /// Returns the parsed coff header.
    pub fn coff_header(&self) -> &CoffHeader { &self.coff_header }

    /// Returns the parsed standard header.
    pub fn standard_header(&self) -> &StandardHeader { &self.standard_header }

    /// Returns the data directory for the requested header.
    pub fn data_directory(&self, directory: DataDirectoryType) -> Option<&ImageDataDirectory> {
        self.header_data_directory.get(&directory)
    }

    /// Returns the section header containing the data directory.
    pub fn section_header_for_data_directory(
        &self, directory: DataDirectoryType,
    ) -> Option<&SectionHeader> {
        if let Some(data_directory) = self.data_directory(directory) {
            for section_header in self.section_table.iter() {
                if data_directory.virtual_address >= section_header.virtual_address
                    && data_directory.virtual_address
                        < section_header.virtual_address + section_header.virtual_size
                {
                    return Some(section_header);
                }
            }
        }
        None
    }
}

//! Windows API and binary constants.

#![allow(non_upper_case_globals)]

pub type DWORD = u32;
pub type UINT = u32;
pub type WORD = u16;
pub type LANGID = WORD;


// https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-lcid/a9eac961-e77d-41a6-90a5-ce1a8b0cdb9c
pub const LANGUAGE_ID_EN_US: LANGID = 1033; // 0x0409, en-US
// https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-ucoderef/28fefe92-d66c-4b03-90a9-97b473223d43
pub const CODE_PAGE_ID_EN_US: LANGID = 1200; // 0x04B0, UTF-16LE


// https://docs.microsoft.com/en-us/windows/win32/debug/pe-format

pub const PE_DOS_MAGIC: WORD = 0x5a4d; // MZ
pub const PE_PTR_OFFSET: DWORD = 0x03c;
pub const PE_NT_SIGNATURE: DWORD = 0x00004550; // PE00
pub const PE_32_MAGIC: WORD = 0x010b;
pub const PE_64_MAGIC: WORD = 0x020b;


// https://docs.microsoft.com/en-us/windows/win32/menurc/resource-types

pub const RT_CURSOR: WORD = 0x01;
pub const RT_BITMAP: WORD = 0x02;
pub const RT_ICON: WORD = 0x03;
pub const RT_MENU: WORD = 0x04;
pub const RT_DIALOG: WORD = 0x05;
pub const RT_STRING: WORD = 0x06;
pub const RT_FONTDIR: WORD = 0x07;
pub const RT_FONT: WORD = 0x08;
pub const RT_ACCELERATOR: WORD = 0x09;
pub const RT_RCDATA: WORD = 0x0A;
pub const RT_MESSAGETABLE: WORD = 0x0B;
pub const RT_GROUP_CURSOR: WORD = 0x0C;
pub const RT_GROUP_ICON: WORD = 0x0E;
pub const RT_VERSION: WORD = 0x10;
pub const RT_DLGINCLUDE: WORD = 0x11;
pub const RT_PLUGPLAY: WORD = 0x13;
pub const RT_VXD: WORD = 0x14;
pub const RT_ANICURSOR: WORD = 0x15;
pub const RT_ANIICON: WORD = 0x16;
pub const RT_HTML: WORD = 0x17;
pub const RT_MANIFEST: WORD = 0x18;


// https://learn.microsoft.com/en-us/previous-versions/ms997538(v=msdn.10)

/// Resource type field of an ICONDIR/GRPICONDIR holding icons.
pub const ICON_RES_TYPE: WORD = 1;
/// Logical width and height encoded by a zero byte in a directory entry.
pub const ICON_DIMENSION_ZERO: u32 = 256;

/// Source file extensions accepted for icon extraction.
pub const SOURCE_EXTENSIONS: &[&str] = &["exe", "dll", "ico", "cpl", "ocx", "scr"];

/// Target size applied to executable sources when the caller gives none.
pub const DEFAULT_ICON_SIZE: u32 = 32;
/// Smallest accepted target size in pixels.
pub const MIN_ICON_SIZE: u32 = 16;
/// Largest accepted target size in pixels.
pub const MAX_ICON_SIZE: u32 = 256;
/// Largest accepted icon group index.
pub const MAX_ICON_INDEX: u32 = 999;

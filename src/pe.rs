//! PE/COFF header parser.
//!
//! Decodes just enough of a Portable Executable to classify it: the DOS
//! stub signature, the `PE\0\0` image header, the COFF machine field, the
//! optional header's data directory #14 (the CLR runtime header) and the
//! section table needed to turn that directory's RVA into a file offset.

use crate::error::{ClassifierError, Result};
use crate::reader::BinaryReader;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek};
use tracing::{debug, trace};

/// `MZ`, read as a little-endian `u16`.
pub const DOS_SIGNATURE: u16 = 0x5A4D;

/// `PE\0\0`, read as a little-endian `u32`.
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// Offset of `e_lfanew`, the pointer to the PE header.
pub const PE_POINTER_OFFSET: u64 = 0x3C;

/// Size of the COFF file header that follows the PE signature.
pub const COFF_HEADER_SIZE: u64 = 20;

/// Size of one section table entry.
pub const SECTION_HEADER_SIZE: u64 = 40;

/// Index of the CLR runtime header in the data directory table.
pub const CLR_RUNTIME_HEADER_INDEX: u32 = 14;

/// PE machine type constants.
pub mod machine {
    /// Machine not specified
    pub const UNKNOWN: u16 = 0x0000;
    /// Intel 386 and compatibles (32-bit x86)
    pub const I386: u16 = 0x014C;
    /// ARM little endian
    pub const ARM: u16 = 0x01C0;
    /// ARM Thumb
    pub const THUMB: u16 = 0x01C2;
    /// ARM Thumb-2
    pub const ARMNT: u16 = 0x01C4;
    /// Intel Itanium
    pub const IA64: u16 = 0x0200;
    /// EFI byte code
    pub const EBC: u16 = 0x0EBC;
    /// RISC-V 64-bit
    pub const RISCV64: u16 = 0x5064;
    /// x64
    pub const AMD64: u16 = 0x8664;
    /// ARM64 with x64 emulation compatibility
    pub const ARM64EC: u16 = 0xA641;
    /// ARM64 little endian
    pub const ARM64: u16 = 0xAA64;
}

/// PE optional header magic values.
pub mod optional_magic {
    /// 32-bit image
    pub const PE32: u16 = 0x10B;
    /// 64-bit image
    pub const PE32PLUS: u16 = 0x20B;
    /// ROM image
    pub const ROM: u16 = 0x107;
}

/// COFF characteristics bits.
pub mod characteristics {
    /// Image is valid and can be run
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    /// Image can handle addresses above 2 GB
    pub const LARGE_ADDRESS_AWARE: u16 = 0x0020;
    /// Image is a dynamic-link library
    pub const DLL: u16 = 0x2000;
}

/// Layout of the optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalHeaderKind {
    /// 32-bit layout (magic 0x10B)
    Pe32,
    /// 64-bit layout (magic 0x20B)
    Pe32Plus,
    /// Any other magic; data directories are not decoded
    Unknown(u16),
}

impl OptionalHeaderKind {
    fn from_magic(magic: u16) -> Self {
        match magic {
            optional_magic::PE32 => OptionalHeaderKind::Pe32,
            optional_magic::PE32PLUS => OptionalHeaderKind::Pe32Plus,
            other => OptionalHeaderKind::Unknown(other),
        }
    }

    /// Offsets of `NumberOfRvaAndSizes` and of the first data directory,
    /// relative to the start of the optional header.
    fn directory_layout(self) -> Option<(u64, u64)> {
        match self {
            OptionalHeaderKind::Pe32 => Some((92, 96)),
            OptionalHeaderKind::Pe32Plus => Some((108, 112)),
            OptionalHeaderKind::Unknown(_) => None,
        }
    }
}

/// An RVA/size pair from the data directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDirectory {
    /// RVA of the referenced structure
    pub virtual_address: u32,
    /// Size in bytes; zero means absent
    pub size: u32,
}

/// One entry of the section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, up to 8 bytes
    pub name: String,
    /// Size once loaded
    pub virtual_size: u32,
    /// RVA of the first byte once loaded
    pub virtual_address: u32,
    /// Size of the initialized data on disk
    pub size_of_raw_data: u32,
    /// File offset of the initialized data
    pub pointer_to_raw_data: u32,
}

impl Section {
    /// Mapped span of the section. Linkers sometimes leave `VirtualSize`
    /// zero, in which case the raw size is what the loader maps.
    fn span(&self) -> u32 {
        if self.virtual_size == 0 {
            self.size_of_raw_data
        } else {
            self.virtual_size
        }
    }

    /// Whether `rva` falls inside this section.
    pub fn contains(&self, rva: u32) -> bool {
        rva >= self.virtual_address && rva - self.virtual_address < self.span()
    }

    /// File offset of `rva`, if it falls inside this section.
    pub fn offset_of(&self, rva: u32) -> Option<u64> {
        self.contains(rva)
            .then(|| u64::from(self.pointer_to_raw_data) + u64::from(rva - self.virtual_address))
    }
}

/// Decoded native header facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Offset of the `PE\0\0` signature
    pub pe_offset: u32,
    /// Raw COFF machine field, never rejected here
    pub machine: u16,
    /// COFF `NumberOfSections`, not validated until the table is read
    pub number_of_sections: u16,
    /// COFF characteristics
    pub characteristics: u16,
    /// Optional header layout, `None` when the header is absent or unreadable
    pub optional_header: Option<OptionalHeaderKind>,
    /// File offset of the first section table entry
    pub section_table_offset: u64,
    /// CLR runtime header directory; only set when its size is nonzero
    pub runtime_directory: Option<DataDirectory>,
}

impl FileHeader {
    /// Whether the image is flagged as a DLL.
    pub fn is_dll(&self) -> bool {
        self.characteristics & characteristics::DLL != 0
    }

    /// Whether the image carries an embedded CLR runtime header.
    pub fn has_runtime_metadata(&self) -> bool {
        self.runtime_directory.is_some()
    }
}

/// Section table of an image, read on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Read the `header.number_of_sections` entries at `header.section_table_offset`.
    ///
    /// # Errors
    ///
    /// [`ClassifierError::OutOfRange`] or [`ClassifierError::Truncated`] when
    /// the table runs past the end of the file.
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, header: &FileHeader) -> Result<Self> {
        reader.seek(header.section_table_offset)?;
        let sections = (0..header.number_of_sections)
            .map(|_| read_section(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sections })
    }

    /// Sections in file order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Translate a relative virtual address into a file offset.
    pub fn rva_to_offset(&self, rva: u32) -> Result<u64> {
        for section in &self.sections {
            if let Some(offset) = section.offset_of(rva) {
                trace!(rva, section = %section.name, offset, "mapped rva");
                return Ok(offset);
            }
        }
        Err(ClassifierError::UnmappableAddress { rva })
    }
}

impl From<Vec<Section>> for SectionTable {
    fn from(sections: Vec<Section>) -> Self {
        Self { sections }
    }
}

/// Parse the native header from the start of `reader`.
///
/// Only the COFF header is read strictly. The optional header is consulted
/// for the runtime directory alone; if it runs off the end of the file the
/// image is treated as having no runtime directory. The section table is
/// left to [`SectionTable::read`].
///
/// # Errors
///
/// [`ClassifierError::InvalidFile`] when a signature is missing;
/// [`ClassifierError::Truncated`] and [`ClassifierError::OutOfRange`] when
/// the PE pointer or the COFF header runs off the end.
pub fn parse<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<FileHeader> {
    reader.seek(0)?;
    let stub = match reader.read_u16() {
        Ok(value) => Some(value),
        Err(ClassifierError::Truncated { .. }) => None,
        Err(e) => return Err(e),
    };
    if stub != Some(DOS_SIGNATURE) {
        return Err(ClassifierError::invalid("missing 'MZ' stub signature"));
    }

    reader.seek(PE_POINTER_OFFSET)?;
    let raw_offset = reader.read_i32()?;
    let pe_offset = u32::try_from(raw_offset).map_err(|_| ClassifierError::OutOfRange {
        offset: u64::from(raw_offset.unsigned_abs()),
        len: reader.len(),
    })?;

    reader.seek(u64::from(pe_offset))?;
    if reader.read_u32()? != PE_SIGNATURE {
        return Err(ClassifierError::invalid("missing 'PE\\0\\0' image header"));
    }

    let machine = reader.read_u16()?;
    let number_of_sections = reader.read_u16()?;
    // TimeDateStamp, PointerToSymbolTable, NumberOfSymbols
    reader.skip(12)?;
    let size_of_optional_header = reader.read_u16()?;
    let characteristics = reader.read_u16()?;
    debug!(
        machine = format_args!("0x{machine:04X}"),
        number_of_sections, size_of_optional_header, "parsed COFF header"
    );

    let optional_start = u64::from(pe_offset) + 4 + COFF_HEADER_SIZE;
    let optional_size = u64::from(size_of_optional_header);

    let (optional_header, runtime_directory) =
        match read_optional_header(reader, optional_start, optional_size) {
            Ok(found) => found,
            Err(e) if e.is_format_error() => {
                debug!(error = %e, "optional header unreadable");
                (None, None)
            }
            Err(e) => return Err(e),
        };

    Ok(FileHeader {
        pe_offset,
        machine,
        number_of_sections,
        characteristics,
        optional_header,
        section_table_offset: optional_start + optional_size,
        runtime_directory,
    })
}

fn read_optional_header<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    start: u64,
    size: u64,
) -> Result<(Option<OptionalHeaderKind>, Option<DataDirectory>)> {
    if size < 2 {
        return Ok((None, None));
    }
    reader.seek(start)?;
    let kind = OptionalHeaderKind::from_magic(reader.read_u16()?);

    let Some((count_offset, directories_offset)) = kind.directory_layout() else {
        debug!(?kind, "data directories not decoded");
        return Ok((Some(kind), None));
    };

    let entry_offset = directories_offset + u64::from(CLR_RUNTIME_HEADER_INDEX) * 8;
    if size < entry_offset + 8 {
        return Ok((Some(kind), None));
    }
    reader.seek(start + count_offset)?;
    if reader.read_u32()? <= CLR_RUNTIME_HEADER_INDEX {
        return Ok((Some(kind), None));
    }
    reader.seek(start + entry_offset)?;
    let directory = DataDirectory {
        virtual_address: reader.read_u32()?,
        size: reader.read_u32()?,
    };
    Ok((Some(kind), (directory.size > 0).then_some(directory)))
}

fn read_section<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Section> {
    let raw_name = reader.read_exact(8)?;
    let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
    let name = String::from_utf8_lossy(&raw_name[..name_len]).into_owned();
    let virtual_size = reader.read_u32()?;
    let virtual_address = reader.read_u32()?;
    let size_of_raw_data = reader.read_u32()?;
    let pointer_to_raw_data = reader.read_u32()?;
    // Relocation/line-number pointers and counts, Characteristics
    reader.skip(SECTION_HEADER_SIZE - 24)?;
    Ok(Section {
        name,
        virtual_size,
        virtual_address,
        size_of_raw_data,
        pointer_to_raw_data,
    })
}

/// Get a human-readable description of a PE machine type.
pub fn machine_description(machine: u16) -> &'static str {
    match machine {
        machine::UNKNOWN => "Unknown machine",
        machine::I386 => "Intel 386 or later",
        machine::ARM => "ARM little endian",
        machine::THUMB => "ARM Thumb",
        machine::ARMNT => "ARM Thumb-2",
        machine::IA64 => "Intel IA-64",
        machine::EBC => "EFI Byte Code",
        machine::RISCV64 => "RISC-V 64-bit",
        machine::AMD64 => "AMD64 / x86-64",
        machine::ARM64EC => "ARM64EC (x64 emulation)",
        machine::ARM64 => "ARM64 / AArch64",
        _ => "Unknown machine type",
    }
}

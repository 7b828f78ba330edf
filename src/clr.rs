//! CLR runtime header detection.
//!
//! A managed image stores a 72-byte runtime header (ECMA-335 II.25.3.3)
//! at the RVA named by data directory #14. Only its flag word decides the
//! bitness of the image; the remaining fields are kept for diagnostics.

use crate::error::{ClassifierError, Result};
use crate::pe::{DataDirectory, FileHeader, SectionTable};
use crate::reader::BinaryReader;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Seek};
use tracing::debug;

/// Size of the runtime header structure.
pub const RUNTIME_HEADER_SIZE: usize = 72;

bitflags! {
    /// `COMIMAGE_FLAGS_*` values of the runtime header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuntimeFlags: u32 {
        /// Image contains only IL code
        const IL_ONLY = 0x0000_0001;
        /// Image must be loaded in a 32-bit process
        const REQUIRES_32BIT = 0x0000_0002;
        /// Obsolete IL library marker
        const IL_LIBRARY = 0x0000_0004;
        /// Image is strong-name signed
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// Entry point is native code rather than a metadata token
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Runtime tracks debug data for the image
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// Prefer a 32-bit process when the host can choose
        const PREFERS_32BIT = 0x0002_0000;
    }
}

/// Decoded runtime header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// Location of the metadata root
    pub metadata: DataDirectory,
    /// `COMIMAGE_FLAGS_*` word
    pub flags: RuntimeFlags,
    /// Metadata token, or an RVA when `NATIVE_ENTRYPOINT` is set
    pub entry_point: u32,
}

impl RuntimeDescriptor {
    /// Decode the fixed-size header from raw bytes.
    ///
    /// Unknown flag bits are retained rather than rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < RUNTIME_HEADER_SIZE {
            return Err(ClassifierError::Truncated {
                offset: 0,
                expected: RUNTIME_HEADER_SIZE,
                available: data.len() as u64,
            });
        }

        Ok(Self {
            major_runtime_version: LittleEndian::read_u16(&data[4..]),
            minor_runtime_version: LittleEndian::read_u16(&data[6..]),
            metadata: DataDirectory {
                virtual_address: LittleEndian::read_u32(&data[8..]),
                size: LittleEndian::read_u32(&data[12..]),
            },
            flags: RuntimeFlags::from_bits_retain(LittleEndian::read_u32(&data[16..])),
            entry_point: LittleEndian::read_u32(&data[20..]),
        })
    }

    /// Image holds only IL code.
    pub fn il_only(&self) -> bool {
        self.flags.contains(RuntimeFlags::IL_ONLY)
    }

    /// Image must run in a 32-bit process.
    pub fn requires_32bit(&self) -> bool {
        self.flags.contains(RuntimeFlags::REQUIRES_32BIT)
    }

    /// Image asks for a 32-bit process when the host can choose.
    pub fn prefers_32bit(&self) -> bool {
        self.flags.contains(RuntimeFlags::PREFERS_32BIT)
    }

    /// Image carries a strong-name signature.
    pub fn strong_name_signed(&self) -> bool {
        self.flags.contains(RuntimeFlags::STRONG_NAME_SIGNED)
    }

    /// Entry point is native code.
    pub fn native_entry_point(&self) -> bool {
        self.flags.contains(RuntimeFlags::NATIVE_ENTRYPOINT)
    }

    /// Runtime version as `major.minor`.
    pub fn runtime_version(&self) -> String {
        format!(
            "{}.{}",
            self.major_runtime_version, self.minor_runtime_version
        )
    }
}

/// Read the runtime header that `directory` points to.
///
/// The section table is read here, since mapping this RVA is the only
/// thing it is needed for.
///
/// # Errors
///
/// [`ClassifierError::UnmappableAddress`] when no section covers the
/// directory's RVA; [`ClassifierError::OutOfRange`] or
/// [`ClassifierError::Truncated`] when the section table or the header
/// runs past the file.
pub fn read_descriptor<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    header: &FileHeader,
    directory: DataDirectory,
) -> Result<RuntimeDescriptor> {
    let sections = SectionTable::read(reader, header)?;
    let offset = sections.rva_to_offset(directory.virtual_address)?;
    reader.seek(offset)?;
    let bytes = reader.read_exact(RUNTIME_HEADER_SIZE)?;
    let descriptor = RuntimeDescriptor::from_bytes(&bytes)?;
    debug!(
        offset,
        flags = format_args!("0x{:08X}", descriptor.flags.bits()),
        runtime = %descriptor.runtime_version(),
        "decoded runtime header"
    );
    Ok(descriptor)
}

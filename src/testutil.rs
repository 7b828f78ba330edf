//! Synthetic PE images for unit tests.

use crate::pe::{characteristics, optional_magic};
use byteorder::{ByteOrder, LittleEndian};

const PE_OFFSET: usize = 0x80;
const IMAGE_SIZE: usize = 0x400;
const TEXT_RVA: u32 = 0x2000;
const TEXT_RAW: u32 = 0x200;

/// Builds a minimal PE image with one `.text` section at RVA 0x2000,
/// file offset 0x200.
#[derive(Debug, Clone)]
pub(crate) struct PeBuilder {
    machine: u16,
    magic: u16,
    characteristics: u16,
    runtime_flags: Option<u32>,
    runtime_rva: u32,
    section_count: u16,
    optional_size: Option<u16>,
    length: usize,
}

impl PeBuilder {
    pub(crate) fn native(machine: u16) -> Self {
        Self {
            machine,
            magic: optional_magic::PE32,
            characteristics: characteristics::EXECUTABLE_IMAGE,
            runtime_flags: None,
            runtime_rva: TEXT_RVA + 8,
            section_count: 1,
            optional_size: None,
            length: IMAGE_SIZE,
        }
    }

    /// Add a CLR runtime header carrying `flags`.
    pub(crate) fn managed(mut self, flags: u32) -> Self {
        self.runtime_flags = Some(flags);
        self
    }

    pub(crate) fn pe32_plus(mut self) -> Self {
        self.magic = optional_magic::PE32PLUS;
        self
    }

    pub(crate) fn magic(mut self, magic: u16) -> Self {
        self.magic = magic;
        self
    }

    pub(crate) fn dll(mut self) -> Self {
        self.characteristics |= characteristics::DLL;
        self
    }

    /// Point the runtime directory at a different RVA.
    pub(crate) fn runtime_rva(mut self, rva: u32) -> Self {
        self.runtime_rva = rva;
        self
    }

    /// Override `NumberOfSections`; the table itself still holds one entry.
    pub(crate) fn section_count(mut self, count: u16) -> Self {
        self.section_count = count;
        self
    }

    /// Override `SizeOfOptionalHeader`; the layout itself is unchanged.
    pub(crate) fn optional_header_size(mut self, size: u16) -> Self {
        self.optional_size = Some(size);
        self
    }

    /// Cut the image short after `length` bytes.
    pub(crate) fn truncate(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut data = vec![0u8; IMAGE_SIZE];
        data[0..2].copy_from_slice(b"MZ");
        LittleEndian::write_u32(&mut data[0x3C..], PE_OFFSET as u32);
        data[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let coff = PE_OFFSET + 4;
        let optional_size: u16 = if self.magic == optional_magic::PE32PLUS {
            0xF0
        } else {
            0xE0
        };
        LittleEndian::write_u16(&mut data[coff..], self.machine);
        LittleEndian::write_u16(&mut data[coff + 2..], self.section_count);
        LittleEndian::write_u16(
            &mut data[coff + 16..],
            self.optional_size.unwrap_or(optional_size),
        );
        LittleEndian::write_u16(&mut data[coff + 18..], self.characteristics);

        let optional = coff + 20;
        LittleEndian::write_u16(&mut data[optional..], self.magic);
        let (count_offset, directories_offset) = if self.magic == optional_magic::PE32PLUS {
            (108, 112)
        } else {
            (92, 96)
        };
        LittleEndian::write_u32(&mut data[optional + count_offset..], 16);
        if self.runtime_flags.is_some() {
            let entry = optional + directories_offset + 14 * 8;
            LittleEndian::write_u32(&mut data[entry..], self.runtime_rva);
            LittleEndian::write_u32(&mut data[entry + 4..], 72);
        }

        let section = optional + usize::from(optional_size);
        data[section..section + 5].copy_from_slice(b".text");
        LittleEndian::write_u32(&mut data[section + 8..], 0x1000);
        LittleEndian::write_u32(&mut data[section + 12..], TEXT_RVA);
        LittleEndian::write_u32(&mut data[section + 16..], 0x200);
        LittleEndian::write_u32(&mut data[section + 20..], TEXT_RAW);

        if let Some(flags) = self.runtime_flags {
            let clr = (TEXT_RAW + 8) as usize;
            LittleEndian::write_u32(&mut data[clr..], 72);
            LittleEndian::write_u16(&mut data[clr + 4..], 2);
            LittleEndian::write_u16(&mut data[clr + 6..], 5);
            LittleEndian::write_u32(&mut data[clr + 8..], TEXT_RVA + 0x50);
            LittleEndian::write_u32(&mut data[clr + 12..], 0x100);
            LittleEndian::write_u32(&mut data[clr + 16..], flags);
            LittleEndian::write_u32(&mut data[clr + 20..], 0x0600_0001);
        }

        data.truncate(self.length);
        data
    }
}

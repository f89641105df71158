//! The minimal ELF64 envelope: one header, one R|X `LOAD` segment that
//! maps the whole file at a fixed virtual address.

use crate::codegen::asm::imm64;

/// Offsets of the fields that are only known once all code is emitted.
pub struct ElfBuilder {
    entry_off: usize,
    filesz_off: usize,
    memsz_off: usize,
}

impl ElfBuilder {
    /// Write the ELF header and the single program header, leaving
    /// placeholders for the entry point and the segment size.
    pub fn begin(buf: &mut Vec<u8>, vaddr: u64) -> ElfBuilder {
        // e_ident: magic, 64-bit, little-endian, version 1, then padding
        buf.extend_from_slice(&[0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x01, 0x00]);
        buf.extend_from_slice(&[0; 8]);
        // e_type = EXEC, e_machine = x86-64, e_version = 1
        buf.extend_from_slice(&[0x02, 0x00, 0x3e, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let entry_off = buf.len();
        imm64(buf, 0); // e_entry, patched later
        let ehsize = 64u64;
        imm64(buf, ehsize as i64); // e_phoff: the phdr follows the header
        imm64(buf, 0); // e_shoff: no sections
        buf.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        buf.extend_from_slice(&(ehsize as u16).to_le_bytes()); // e_ehsize
        buf.extend_from_slice(&56u16.to_le_bytes()); // e_phentsize
        buf.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        buf.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
        buf.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        buf.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        debug_assert_eq!(buf.len(), ehsize as usize);

        // program header: PT_LOAD, R|X
        buf.extend_from_slice(&[0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00]);
        imm64(buf, 0); // p_offset: the file maps from its start
        imm64(buf, vaddr as i64); // p_vaddr
        imm64(buf, vaddr as i64); // p_paddr
        let filesz_off = buf.len();
        imm64(buf, 0); // p_filesz, patched later
        let memsz_off = buf.len();
        imm64(buf, 0); // p_memsz, patched later
        imm64(buf, 0x1000); // p_align

        ElfBuilder {
            entry_off,
            filesz_off,
            memsz_off,
        }
    }

    /// Record the entry point once the code start is known.
    pub fn set_entry(&self, buf: &mut [u8], entry: u64) {
        buf[self.entry_off..self.entry_off + 8].copy_from_slice(&entry.to_le_bytes());
    }

    /// Fill in the segment sizes: the whole file is the segment.
    pub fn finish(&self, buf: &mut [u8]) {
        let size = (buf.len() as u64).to_le_bytes();
        buf[self.filesz_off..self.filesz_off + 8].copy_from_slice(&size);
        buf[self.memsz_off..self.memsz_off + 8].copy_from_slice(&size);
    }
}

//! Byte-level checks of the ELF64 envelope.

use sable::{compile, emit_elf};

fn image(source: &str) -> Vec<u8> {
    emit_elf(&compile(source).unwrap(), 16).unwrap()
}

fn u16_at(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

fn u64_at(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

#[test]
fn header_identifies_x86_64_exec() {
    let buf = image("(return 0)");
    assert_eq!(&buf[..8], &[0x7f, 0x45, 0x4c, 0x46, 0x02, 0x01, 0x01, 0x00]);
    assert_eq!(&buf[8..16], &[0; 8]);
    assert_eq!(u16_at(&buf, 16), 2); // ET_EXEC
    assert_eq!(u16_at(&buf, 18), 0x3e); // EM_X86_64
    assert_eq!(u16_at(&buf, 54), 56); // e_phentsize
    assert_eq!(u16_at(&buf, 56), 1); // e_phnum
}

#[test]
fn load_segment_maps_whole_file() {
    let buf = image("(return 0)");
    assert_eq!(u64_at(&buf, 64 + 8), 0); // p_offset
    assert_eq!(u64_at(&buf, 64 + 16), 0x1000); // p_vaddr
    assert_eq!(u64_at(&buf, 64 + 40), buf.len() as u64); // p_filesz
    assert_eq!(u64_at(&buf, 64 + 48), buf.len() as u64); // p_memsz
    assert_eq!(u64_at(&buf, 64 + 56 - 8), 0x1000); // p_align
}

#[test]
fn entry_points_past_the_headers() {
    let buf = image("(return 0)");
    let entry = u64_at(&buf, 24);
    assert!(entry >= 0x1000 + 120);
    assert!(entry < 0x1000 + buf.len() as u64);
    // the first instruction at the entry is `mov eax, 9` (the mmap that
    // builds the data stack)
    let entry_off = (entry - 0x1000) as usize;
    assert_eq!(buf[entry_off], 0xb8);
    assert_eq!(buf[entry_off + 1], 9);
}

#[test]
fn string_pool_lands_in_the_image() {
    let buf = image("(var s \"elfdata\") (return 0)");
    assert!(buf
        .windows(8)
        .any(|w| w == b"elfdata\0".as_slice()));
}

#[test]
fn written_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program");
    let buf = image("(return 7)");
    std::fs::write(&path, &buf).unwrap();
    let back = std::fs::read(&path).unwrap();
    assert_eq!(back, buf);
}

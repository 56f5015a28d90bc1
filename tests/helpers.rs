//! Shared test utilities for jailtree tests.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

/// Test environment with a staging area for spec sources and a jail
/// destination directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Staging area for files referenced by spec statements
    pub staging: PathBuf,
    /// Jail build destination
    pub jail: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let staging = base.join("staging");
        let jail = base.join("jail");
        fs::create_dir_all(&staging).expect("Failed to create staging dir");

        Self {
            _temp_dir: temp_dir,
            staging,
            jail,
        }
    }

    /// Write a spec file into the staging area and return its path.
    pub fn write_spec(&self, name: &str, content: &str) -> PathBuf {
        let path = self.staging.join(name);
        fs::write(&path, content).expect("Failed to write spec file");
        path
    }

    /// Create a source file in the staging area, parents included.
    pub fn stage_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.staging.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create staging parent");
        }
        fs::write(&path, content).expect("Failed to stage file");
        path
    }
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &str) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );

    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target.to_string_lossy(),
        expected_target,
        "Symlink {} points to {:?}, expected {}",
        path.display(),
        target,
        expected_target
    );
}

/// Assert that a directory exists.
pub fn assert_dir_exists(path: &Path) {
    assert!(
        path.is_dir(),
        "Expected directory to exist: {}",
        path.display()
    );
}

// =============================================================================
// Synthetic ELF images
// =============================================================================

const ELF_EHDR_SIZE: u64 = 64;
const ELF_PHDR_SIZE: u64 = 56;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;
const PT_INTERP: u32 = 3;

const DT_NULL: u64 = 0;
const DT_NEEDED: u64 = 1;
const DT_STRTAB: u64 = 5;
const DT_STRSZ: u64 = 10;

/// Builds minimal but well-formed 64-bit little-endian ELF shared objects,
/// just enough for dependency resolution: a single identity-mapped load
/// segment, a dynamic segment carrying `DT_NEEDED` entries, and optionally
/// a `PT_INTERP` naming the program interpreter.
pub struct ElfBuilder {
    machine: u16,
    needed: Vec<String>,
    interpreter: Option<PathBuf>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        ElfBuilder {
            machine: EM_X86_64,
            needed: Vec::new(),
            interpreter: None,
        }
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn needs(mut self, name: &str) -> Self {
        self.needed.push(name.to_string());
        self
    }

    pub fn interpreter(mut self, path: &Path) -> Self {
        self.interpreter = Some(path.to_path_buf());
        self
    }

    pub fn write(self, path: &Path) {
        fs::write(path, self.build()).expect("Failed to write synthetic ELF");
    }

    fn build(&self) -> Vec<u8> {
        let phnum = 2 + u64::from(self.interpreter.is_some());

        let interp_bytes: Vec<u8> = match &self.interpreter {
            Some(interp) => {
                let mut b = interp.to_string_lossy().into_owned().into_bytes();
                b.push(0);
                b
            }
            None => Vec::new(),
        };

        // String table: leading NUL, then each needed name, NUL-terminated
        let mut dynstr = vec![0u8];
        let mut name_offsets = Vec::new();
        for name in &self.needed {
            name_offsets.push(dynstr.len() as u64);
            dynstr.extend_from_slice(name.as_bytes());
            dynstr.push(0);
        }

        let ph_off = ELF_EHDR_SIZE;
        let interp_off = ph_off + ELF_PHDR_SIZE * phnum;
        let dynstr_off = interp_off + interp_bytes.len() as u64;
        let dyn_off = dynstr_off + dynstr.len() as u64;
        let dyn_size = 16 * (self.needed.len() as u64 + 3);
        let file_len = dyn_off + dyn_size;

        let mut out = Vec::with_capacity(file_len as usize);

        // ELF header
        out.extend_from_slice(b"\x7fELF");
        out.push(2); // 64-bit
        out.push(1); // little-endian
        out.push(1); // EV_CURRENT
        out.extend_from_slice(&[0u8; 9]); // ABI + padding
        put_u16(&mut out, 3); // ET_DYN
        put_u16(&mut out, self.machine);
        put_u32(&mut out, 1); // e_version
        put_u64(&mut out, 0); // e_entry
        put_u64(&mut out, ph_off);
        put_u64(&mut out, 0); // e_shoff: no sections
        put_u32(&mut out, 0); // e_flags
        put_u16(&mut out, ELF_EHDR_SIZE as u16);
        put_u16(&mut out, ELF_PHDR_SIZE as u16);
        put_u16(&mut out, phnum as u16);
        put_u16(&mut out, 64); // e_shentsize
        put_u16(&mut out, 0); // e_shnum
        put_u16(&mut out, 0); // e_shstrndx

        // PT_LOAD mapping the whole file at vaddr 0, so virtual addresses
        // in the dynamic segment equal file offsets
        put_phdr(&mut out, PT_LOAD, 0, file_len, 0x1000);
        if !interp_bytes.is_empty() {
            put_phdr(&mut out, PT_INTERP, interp_off, interp_bytes.len() as u64, 1);
        }
        put_phdr(&mut out, PT_DYNAMIC, dyn_off, dyn_size, 8);

        out.extend_from_slice(&interp_bytes);
        out.extend_from_slice(&dynstr);

        for offset in name_offsets {
            put_u64(&mut out, DT_NEEDED);
            put_u64(&mut out, offset);
        }
        put_u64(&mut out, DT_STRTAB);
        put_u64(&mut out, dynstr_off);
        put_u64(&mut out, DT_STRSZ);
        put_u64(&mut out, dynstr.len() as u64);
        put_u64(&mut out, DT_NULL);
        put_u64(&mut out, 0);

        assert_eq!(out.len() as u64, file_len);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_phdr(out: &mut Vec<u8>, p_type: u32, offset: u64, size: u64, align: u64) {
    put_u32(out, p_type);
    put_u32(out, 6); // read + write
    put_u64(out, offset);
    put_u64(out, offset); // p_vaddr, identity-mapped
    put_u64(out, offset); // p_paddr
    put_u64(out, size);
    put_u64(out, size); // p_memsz
    put_u64(out, align);
}

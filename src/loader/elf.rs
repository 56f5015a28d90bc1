//! Shared-library resolution for ELF binaries.
//!
//! Walks `DT_NEEDED` entries transitively, searching the configured loader
//! paths for each imported name. The program interpreter (when present) is
//! treated as already resolved under its base name, and its directory is
//! searched before the configured paths so a glibc next to its `ld-linux`
//! wins over a stale copy elsewhere.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use goblin::elf::Elf;
use memmap2::Mmap;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Architecture identity used to reject candidate libraries of the wrong
/// class or machine, e.g. 32-bit libraries next to a 64-bit binary.
#[derive(Clone, Copy, PartialEq, Eq)]
struct ElfArch {
    is_64: bool,
    machine: u16,
}

struct ElfInfo {
    arch: ElfArch,
    interpreter: Option<PathBuf>,
    imports: Vec<String>,
}

/// Resolve the transitive shared-library closure of `binary`.
///
/// Files that do not start with the ELF magic resolve to an empty list, so
/// scripts and data files can be fed through without special casing.
/// Imports that cannot be found on the search path with a matching
/// architecture are omitted from the result.
pub fn imported_libraries(binary: &Path, search_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let Some(info) = read_elf(binary)? else {
        return Ok(Vec::new());
    };

    let mut resolved: HashMap<String, PathBuf> = HashMap::new();
    let mut paths: Vec<PathBuf> = Vec::with_capacity(search_dirs.len() + 1);
    if let Some(interp) = &info.interpreter {
        if let Some(name) = interp.file_name() {
            resolved.insert(name.to_string_lossy().into_owned(), interp.clone());
        }
        if let Some(dir) = interp.parent() {
            paths.push(dir.to_path_buf());
        }
    }
    paths.extend(search_dirs.iter().cloned());

    let mut worklist: Vec<String> = info.imports;
    let mut queued: HashSet<String> = worklist.iter().cloned().collect();
    loop {
        let before = resolved.len();
        let mut discovered: Vec<String> = Vec::new();
        for name in &worklist {
            if resolved.contains_key(name) {
                continue;
            }
            if let Some((path, imports)) = find_library(name, &paths, info.arch) {
                resolved.insert(name.clone(), path);
                discovered.extend(imports);
            }
        }
        for name in discovered {
            if !resolved.contains_key(&name) && queued.insert(name.clone()) {
                worklist.push(name);
            }
        }
        if resolved.len() == before {
            break;
        }
    }

    let mut deps: Vec<PathBuf> = resolved.into_values().collect();
    deps.sort();
    Ok(deps)
}

/// Read `path` as an ELF image. Returns `Ok(None)` when the file is too
/// small or does not carry the ELF magic; read and parse failures are
/// hard errors.
fn read_elf(path: &Path) -> Result<Option<ElfInfo>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    match read_magic(&file) {
        Ok(Some(magic)) if &magic == ELF_MAGIC => {}
        Ok(_) => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    }

    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map {}", path.display()))?;
    let elf = Elf::parse(&mmap)
        .with_context(|| format!("failed to parse ELF file {}", path.display()))?;
    Ok(Some(ElfInfo {
        arch: ElfArch {
            is_64: elf.is_64,
            machine: elf.header.e_machine,
        },
        interpreter: elf.interpreter.map(PathBuf::from),
        imports: elf.libraries.iter().map(|s| s.to_string()).collect(),
    }))
}

fn read_magic(mut file: &File) -> io::Result<Option<[u8; 4]>> {
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(Some(magic)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Search `paths` for a library by base name. A candidate only counts if it
/// exists, parses as ELF, and matches the architecture of the root binary;
/// anything else is skipped and the search moves on to the next directory.
fn find_library(name: &str, paths: &[PathBuf], arch: ElfArch) -> Option<(PathBuf, Vec<String>)> {
    for dir in paths {
        let candidate = dir.join(name);
        if !candidate.is_file() {
            continue;
        }
        let Ok(Some(info)) = read_elf(&candidate) else {
            continue;
        };
        if info.arch == arch {
            return Some((candidate, info.imports));
        }
    }
    None
}

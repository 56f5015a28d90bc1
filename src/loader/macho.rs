//! Shared-library resolution for Mach-O binaries.
//!
//! Walks load-command dylib references transitively. Install names in
//! Mach-O files are full paths, so there is no search-path component here;
//! each referenced path is opened directly. The dynamic linker
//! `/usr/lib/dyld` is always part of the closure, and so is the queried
//! binary itself.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use goblin::mach::constants::cputype::{
    CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64,
};
use goblin::mach::fat::{FAT_CIGAM, FAT_MAGIC};
use goblin::mach::header::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64};
use goblin::mach::{Mach, MachO, SingleArch};
use memmap2::Mmap;

const DYLD: &str = "/usr/lib/dyld";

/// Map the host architecture to the Mach-O CPU type used to pick slices
/// out of universal binaries.
pub fn host_cpu_type() -> Result<u32> {
    match std::env::consts::ARCH {
        "x86" => Ok(CPU_TYPE_X86),
        "x86_64" => Ok(CPU_TYPE_X86_64),
        "arm" => Ok(CPU_TYPE_ARM),
        "aarch64" => Ok(CPU_TYPE_ARM64),
        other => bail!("no Mach-O CPU type known for host architecture {other}"),
    }
}

/// Resolve the transitive dylib closure of `binary`.
///
/// Files that do not start with a Mach-O or fat magic resolve to an empty
/// list. Referenced dylibs that fail to open or parse are hard errors,
/// since an install name that does not resolve means a binary that will
/// not start.
pub fn imported_libraries(binary: &Path) -> Result<Vec<PathBuf>> {
    let cpu = host_cpu_type()?;
    if !has_macho_magic(binary)? {
        return Ok(Vec::new());
    }

    let mut resolved: HashMap<PathBuf, bool> = HashMap::new();
    resolved.insert(PathBuf::from(DYLD), true);
    resolved.insert(binary.to_path_buf(), false);

    loop {
        let todo: Vec<PathBuf> = resolved
            .iter()
            .filter(|(_, done)| !**done)
            .map(|(path, _)| path.clone())
            .collect();
        if todo.is_empty() {
            break;
        }
        for path in todo {
            let imports = read_imports(&path, cpu)?;
            resolved.insert(path, true);
            for import in imports {
                resolved.entry(PathBuf::from(import)).or_insert(false);
            }
        }
    }

    let mut deps: Vec<PathBuf> = resolved.into_keys().collect();
    deps.sort();
    Ok(deps)
}

fn has_macho_magic(path: &Path) -> Result<bool> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let word = u32::from_le_bytes(magic);
    Ok(matches!(
        word,
        MH_MAGIC | MH_MAGIC_64 | MH_CIGAM | MH_CIGAM_64 | FAT_MAGIC | FAT_CIGAM
    ))
}

/// Read the dylib install names referenced by the image at `path`,
/// selecting the matching slice when the file is a universal binary.
fn read_imports(path: &Path, cpu: u32) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map {}", path.display()))?;
    let mach = Mach::parse(&mmap)
        .with_context(|| format!("failed to parse Mach-O file {}", path.display()))?;

    match mach {
        Mach::Binary(macho) => {
            if macho.header.cputype != cpu {
                bail!("unexpected Mach-O architecture in {}", path.display());
            }
            Ok(collect_libs(&macho))
        }
        Mach::Fat(multi) => {
            for (index, arch) in multi.iter_arches().enumerate() {
                let arch = arch
                    .with_context(|| format!("failed to parse fat arch in {}", path.display()))?;
                if arch.cputype != cpu {
                    continue;
                }
                return match multi.get(index).with_context(|| {
                    format!("failed to read fat slice in {}", path.display())
                })? {
                    SingleArch::MachO(macho) => Ok(collect_libs(&macho)),
                    SingleArch::Archive(_) => {
                        bail!("unexpected archive slice in {}", path.display())
                    }
                };
            }
            bail!("no matching Mach-O architecture in {}", path.display());
        }
    }
}

fn collect_libs(macho: &MachO) -> Vec<String> {
    // goblin folds plain, weak, lazy, re-export and upward dylib load
    // commands into `libs`, with a literal "self" entry at the front.
    macho
        .libs
        .iter()
        .filter(|lib| **lib != "self")
        .map(|lib| lib.to_string())
        .collect()
}

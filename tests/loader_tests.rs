//! Shared-library resolution tests against synthetic ELF images.
//!
//! These build tiny but well-formed shared objects on the fly, so the
//! resolver is exercised without depending on whatever libraries the host
//! happens to ship.

mod helpers;

use helpers::{ElfBuilder, TestEnv, EM_AARCH64, EM_X86_64};
use jailtree::loader::{self, elf, LoaderConfig};
use std::fs;
use std::path::PathBuf;

// =============================================================================
// Direct and transitive resolution
// =============================================================================

#[test]
fn test_resolves_direct_dependencies() {
    let env = TestEnv::new();
    let libdir = env.staging.join("lib");
    fs::create_dir(&libdir).unwrap();
    ElfBuilder::new().write(&libdir.join("libfoo.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("libfoo.so").write(&root);

    let deps = elf::imported_libraries(&root, &[libdir.clone()]).unwrap();
    assert_eq!(deps, vec![libdir.join("libfoo.so")]);
}

#[test]
fn test_resolves_transitive_dependencies() {
    let env = TestEnv::new();
    let libdir = env.staging.join("lib");
    fs::create_dir(&libdir).unwrap();
    ElfBuilder::new().write(&libdir.join("libleaf.so"));
    ElfBuilder::new()
        .needs("libleaf.so")
        .write(&libdir.join("libmid.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("libmid.so").write(&root);

    let deps = elf::imported_libraries(&root, &[libdir.clone()]).unwrap();
    assert_eq!(
        deps,
        vec![libdir.join("libleaf.so"), libdir.join("libmid.so")]
    );
}

#[test]
fn test_import_cycles_terminate() {
    let env = TestEnv::new();
    let libdir = env.staging.join("lib");
    fs::create_dir(&libdir).unwrap();
    ElfBuilder::new()
        .needs("libb.so")
        .write(&libdir.join("liba.so"));
    ElfBuilder::new()
        .needs("liba.so")
        .write(&libdir.join("libb.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("liba.so").write(&root);

    let deps = elf::imported_libraries(&root, &[libdir.clone()]).unwrap();
    assert_eq!(deps, vec![libdir.join("liba.so"), libdir.join("libb.so")]);
}

// =============================================================================
// Search order and filtering
// =============================================================================

#[test]
fn test_wrong_architecture_candidates_are_passed_over() {
    let env = TestEnv::new();
    let arm_dir = env.staging.join("arm-lib");
    let x86_dir = env.staging.join("x86-lib");
    fs::create_dir(&arm_dir).unwrap();
    fs::create_dir(&x86_dir).unwrap();
    ElfBuilder::new()
        .machine(EM_AARCH64)
        .write(&arm_dir.join("libfoo.so"));
    ElfBuilder::new()
        .machine(EM_X86_64)
        .write(&x86_dir.join("libfoo.so"));

    let root = env.staging.join("app");
    ElfBuilder::new()
        .machine(EM_X86_64)
        .needs("libfoo.so")
        .write(&root);

    // the aarch64 copy sits earlier on the path but must not win
    let deps = elf::imported_libraries(&root, &[arm_dir, x86_dir.clone()]).unwrap();
    assert_eq!(deps, vec![x86_dir.join("libfoo.so")]);
}

#[test]
fn test_first_matching_directory_wins() {
    let env = TestEnv::new();
    let first = env.staging.join("first");
    let second = env.staging.join("second");
    fs::create_dir(&first).unwrap();
    fs::create_dir(&second).unwrap();
    ElfBuilder::new().write(&first.join("libfoo.so"));
    ElfBuilder::new().write(&second.join("libfoo.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("libfoo.so").write(&root);

    let deps = elf::imported_libraries(&root, &[first.clone(), second]).unwrap();
    assert_eq!(deps, vec![first.join("libfoo.so")]);
}

#[test]
fn test_unresolvable_imports_are_omitted() {
    let env = TestEnv::new();
    let root = env.staging.join("app");
    ElfBuilder::new().needs("libnowhere.so").write(&root);

    let deps = elf::imported_libraries(&root, &[]).unwrap();
    assert!(deps.is_empty());
}

#[test]
fn test_corrupt_candidates_do_not_abort_the_search() {
    let env = TestEnv::new();
    let bad_dir = env.staging.join("bad");
    let good_dir = env.staging.join("good");
    fs::create_dir(&bad_dir).unwrap();
    fs::create_dir(&good_dir).unwrap();
    fs::write(bad_dir.join("libfoo.so"), b"\x7fELF junk").unwrap();
    ElfBuilder::new().write(&good_dir.join("libfoo.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("libfoo.so").write(&root);

    let deps = elf::imported_libraries(&root, &[bad_dir, good_dir.clone()]).unwrap();
    assert_eq!(deps, vec![good_dir.join("libfoo.so")]);
}

// =============================================================================
// Interpreter handling
// =============================================================================

#[test]
fn test_interpreter_is_part_of_the_closure() {
    let env = TestEnv::new();
    let interp_dir = env.staging.join("loader");
    fs::create_dir(&interp_dir).unwrap();
    let interp = interp_dir.join("ld-test.so");
    ElfBuilder::new().write(&interp);
    ElfBuilder::new().write(&interp_dir.join("libc-test.so"));

    let root = env.staging.join("app");
    ElfBuilder::new()
        .interpreter(&interp)
        .needs("libc-test.so")
        .write(&root);

    // no configured search dirs: the interpreter's directory must be enough
    let deps = elf::imported_libraries(&root, &[]).unwrap();
    assert_eq!(deps, vec![interp.clone(), interp_dir.join("libc-test.so")]);
}

#[test]
fn test_interpreter_base_name_is_never_searched_again() {
    let env = TestEnv::new();
    let interp_dir = env.staging.join("loader");
    fs::create_dir(&interp_dir).unwrap();
    let interp = interp_dir.join("ld-test.so");
    ElfBuilder::new().write(&interp);

    let root = env.staging.join("app");
    // importing the interpreter by name must reuse the seeded path
    ElfBuilder::new()
        .interpreter(&interp)
        .needs("ld-test.so")
        .write(&root);

    let deps = elf::imported_libraries(&root, &[]).unwrap();
    assert_eq!(deps, vec![interp]);
}

// =============================================================================
// Platform dispatch
// =============================================================================

#[cfg(not(target_os = "macos"))]
#[test]
fn test_loader_config_threads_search_dirs_through() {
    let env = TestEnv::new();
    let libdir = env.staging.join("lib");
    fs::create_dir(&libdir).unwrap();
    ElfBuilder::new().write(&libdir.join("libfoo.so"));

    let root = env.staging.join("app");
    ElfBuilder::new().needs("libfoo.so").write(&root);

    let config = LoaderConfig::with_dirs(vec![libdir.clone()]);
    let deps = loader::imported_libraries(&root, &config).unwrap();
    assert_eq!(deps, vec![libdir.join("libfoo.so")]);
}

#[test]
fn test_scripts_resolve_to_nothing() {
    let env = TestEnv::new();
    let script = env.stage_file("tool.sh", "#!/bin/sh\nexit 0\n");

    let config = LoaderConfig::with_dirs(vec![PathBuf::from("/lib")]);
    let deps = loader::imported_libraries(&script, &config).unwrap();
    assert!(deps.is_empty());
}

// =============================================================================
// Host binaries
// =============================================================================

/// Opportunistic check against a real binary with the host's real loader
/// configuration. Skips quietly when no shell is on PATH.
#[cfg(target_os = "linux")]
#[test]
fn test_host_shell_closure_resolves_cleanly() {
    use std::path::Path;

    let Ok(sh) = which::which("sh") else {
        return;
    };

    let config = LoaderConfig::from_file(Path::new("/etc/ld.so.conf")).unwrap();
    let deps = loader::imported_libraries(&sh, &config).unwrap();
    for dep in &deps {
        assert!(
            dep.exists(),
            "resolved library does not exist on disk: {}",
            dep.display()
        );
    }
}

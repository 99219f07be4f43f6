//! Integration tests for per-architecture library directories.
//!
//! A scripted [`SystemInfo`] stands in for the dynamic linker so every
//! layout can be exercised on any host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::Path;

use vessel_common::config::VesselConfig;
use vessel_common::constants::{I386, VDPAU_DRIVER_PATH, X86_64};
use vessel_common::error::{FsErrorKind, Result, VesselError};
use vessel_common::types::Architecture;
use vessel_env::EnvOverlay;
use vessel_libs::system_info::StandardizedSystemInfo;
use vessel_libs::{LibScheme, PerArchDirs, SystemInfo, set_up_overrides};

const ARCHES: &[Architecture] = &[X86_64, I386];

/// Answers from fixed tables, failing for any tuple not listed.
#[derive(Default)]
struct ScriptedInfo {
    lib: HashMap<&'static str, &'static str>,
    platform: HashMap<&'static str, &'static str>,
}

impl ScriptedInfo {
    fn with_lib(mut self, arch: &Architecture, lib: &'static str) -> Self {
        let _ = self.lib.insert(arch.tuple, lib);
        self
    }

    fn with_platform(mut self, arch: &Architecture, platform: &'static str) -> Self {
        let _ = self.platform.insert(arch.tuple, platform);
        self
    }
}

fn unknown(what: &str, arch: &Architecture) -> VesselError {
    VesselError::io(FsErrorKind::Failed, format!("no {what} for {arch}"))
}

impl SystemInfo for ScriptedInfo {
    fn libdl_lib(&self, arch: &Architecture) -> Result<String> {
        self.lib
            .get(arch.tuple)
            .map(|s| (*s).to_owned())
            .ok_or_else(|| unknown("${LIB}", arch))
    }

    fn libdl_platform(&self, arch: &Architecture) -> Result<String> {
        self.platform
            .get(arch.tuple)
            .map(|s| (*s).to_owned())
            .ok_or_else(|| unknown("${PLATFORM}", arch))
    }
}

fn config_in(dir: &Path) -> VesselConfig {
    VesselConfig {
        temp_dir: dir.to_path_buf(),
        ..VesselConfig::default()
    }
}

fn relative_abi_paths(dirs: &PerArchDirs) -> Vec<String> {
    dirs.abi_dirs()
        .iter()
        .map(|abi| {
            abi.path
                .strip_prefix(dirs.root())
                .expect("under root")
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

fn assert_layout(dirs: &PerArchDirs, scheme: LibScheme, token: &str, subdirs: &[&str]) {
    assert_eq!(dirs.scheme(), scheme);
    assert_eq!(
        dirs.token_path(),
        format!("{}/{token}", dirs.root().display())
    );
    assert_eq!(relative_abi_paths(dirs), subdirs);
    for abi in dirs.abi_dirs() {
        assert!(abi.path.is_dir(), "{} missing", abi.path.display());
    }
}

// ── Scheme selection ─────────────────────────────────────────────────

#[test]
fn multiarch_layout() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib/x86_64-linux-gnu")
        .with_lib(&I386, "lib/i386-linux-gnu");

    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    assert_layout(
        &dirs,
        LibScheme::Multiarch,
        "${LIB}",
        &["lib/x86_64-linux-gnu", "lib/i386-linux-gnu"],
    );
    assert_eq!(
        dirs.abi_path(&I386),
        Some(dirs.root().join("lib/i386-linux-gnu").as_path())
    );
}

#[test]
fn ubuntu_1204_layout_nests_token_under_lib() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "x86_64-linux-gnu")
        .with_lib(&I386, "i386-linux-gnu");

    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    assert_layout(
        &dirs,
        LibScheme::Ubuntu1204,
        "lib/${LIB}",
        &["lib/x86_64-linux-gnu", "lib/i386-linux-gnu"],
    );
}

#[test]
fn fhs_layout() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib64")
        .with_lib(&I386, "lib");

    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    assert_layout(&dirs, LibScheme::Fhs, "${LIB}", &["lib64", "lib"]);
}

#[test]
fn arch_linux_layout() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib")
        .with_lib(&I386, "lib32");

    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    assert_layout(&dirs, LibScheme::ArchLinux, "${LIB}", &["lib", "lib32"]);
}

#[test]
fn disagreeing_architectures_fall_back_to_platform() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib/x86_64-linux-gnu")
        .with_lib(&I386, "lib32")
        .with_platform(&X86_64, "haswell")
        .with_platform(&I386, "i686");

    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    assert_layout(&dirs, LibScheme::Platform, "${PLATFORM}", &["haswell", "i686"]);
}

#[test]
fn unknown_platform_fails_and_cleans_up() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default().with_platform(&X86_64, "haswell");

    let err = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect_err("i386 unknown");
    assert!(
        err.to_string()
            .starts_with("Unknown expansion of the dl string token $PLATFORM"),
        "{err}"
    );

    let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).expect("read_dir").collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn standardized_info_uses_platform_layout() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dirs = PerArchDirs::new(&StandardizedSystemInfo, ARCHES, &config_in(tmp.path()))
        .expect("dirs");

    assert_eq!(dirs.scheme(), LibScheme::Platform);
    assert!(dirs.token_path().ends_with("/${PLATFORM}"));
    assert_eq!(dirs.abi_dirs().len(), 2);
}

#[test]
fn missing_temp_dir_is_reported() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = config_in(&tmp.path().join("absent"));

    let err = PerArchDirs::new(&StandardizedSystemInfo, ARCHES, &config).expect_err("no parent");
    assert!(
        err.to_string()
            .starts_with("Cannot create temporary directory for platform specific libraries"),
        "{err}"
    );
}

#[test]
fn layout_serializes_for_reporting() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib/x86_64-linux-gnu")
        .with_lib(&I386, "lib/i386-linux-gnu");
    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");

    let json = serde_json::to_value(&dirs).expect("json");
    assert_eq!(json["scheme"], "multiarch");
    assert_eq!(json["token_path"], dirs.token_path());
    assert_eq!(json["abi_dirs"][1]["arch"]["tuple"], "i386-linux-gnu");
}

// ── Overrides ────────────────────────────────────────────────────────

#[test]
fn overrides_link_vdpau_drivers_per_architecture() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let overrides = tmp.path().join("overrides");
    std::fs::create_dir_all(overrides.join("x86_64-linux-gnu/vdpau")).expect("mkdir");
    std::fs::create_dir_all(overrides.join("i386-linux-gnu")).expect("mkdir");

    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib64")
        .with_lib(&I386, "lib");
    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");

    let mut env = EnvOverlay::new();
    set_up_overrides(&mut env, Some(&dirs), &overrides).expect("overrides");

    let link = dirs.root().join("lib64/vdpau");
    assert_eq!(
        std::fs::read_link(&link).expect("symlink"),
        overrides.join("x86_64-linux-gnu/vdpau")
    );
    assert!(!dirs.root().join("lib/vdpau").exists());

    let expected = format!("{}/${{LIB}}/vdpau", dirs.root().display());
    assert_eq!(env.get(VDPAU_DRIVER_PATH), Some(expected.as_str()));
}

#[test]
fn overrides_report_existing_link() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let overrides = tmp.path().join("overrides");
    std::fs::create_dir_all(overrides.join("x86_64-linux-gnu/vdpau")).expect("mkdir");

    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib64")
        .with_lib(&I386, "lib");
    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    std::fs::create_dir(dirs.root().join("lib64/vdpau")).expect("squat");

    let mut env = EnvOverlay::new();
    let err = set_up_overrides(&mut env, Some(&dirs), &overrides).expect_err("exists");
    assert!(err.to_string().starts_with("Cannot create symlink"), "{err}");
    assert!(!env.contains(VDPAU_DRIVER_PATH));
}

#[test]
fn dropping_removes_tree_with_overrides() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let overrides = tmp.path().join("overrides");
    std::fs::create_dir_all(overrides.join("i386-linux-gnu/vdpau")).expect("mkdir");

    let info = ScriptedInfo::default()
        .with_lib(&X86_64, "lib64")
        .with_lib(&I386, "lib");
    let dirs = PerArchDirs::new(&info, ARCHES, &config_in(tmp.path())).expect("dirs");
    let mut env = EnvOverlay::new();
    set_up_overrides(&mut env, Some(&dirs), &overrides).expect("overrides");

    let root = dirs.root().to_path_buf();
    drop(dirs);
    assert!(!root.exists());
    assert!(overrides.join("i386-linux-gnu/vdpau").is_dir());
}

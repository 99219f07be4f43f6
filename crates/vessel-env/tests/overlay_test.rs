//! Integration tests for environment overlays.
//!
//! The fixture mirrors a Steam game launch: some variables are replaced,
//! some forced unset, some inherited from the host, and a few have names
//! that are valid in the environment but not in shell syntax.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io::Write;
use std::os::fd::RawFd;
use std::path::Path;

use nix::fcntl::{FcntlArg, fcntl};

use vessel_env::EnvOverlay;

const INITIAL_ENVP: &[&str] = &[
    "FLATPAK_ID=com.valvesoftware.Steam",
    "G_MESSAGES_DEBUG=",
    "LD_AUDIT=audit.so",
    "LD_PRELOAD=libfakeroot.so",
    "STEAM_RUNTIME=0",
    "TMPDIR=/tmp",
];

fn container_env() -> EnvOverlay {
    let mut overlay = EnvOverlay::new();
    overlay.set("LD_AUDIT", Some("audit2.so"));
    overlay.set("G_MESSAGES_DEBUG", Some("all"));
    overlay.set("TMPDIR", None);
    overlay.set("STEAM_RUNTIME", None);
    overlay.inherit("LD_PRELOAD");
    overlay.inherit("FLATPAK_ID");
    overlay.set("2weird", Some("starts with digit"));
    overlay.set(" ", Some("space"));
    overlay
}

/// Reverses `shell::quote` for a single-quoted word.
fn unquote(word: &str) -> String {
    let inner = word
        .strip_prefix('\'')
        .and_then(|w| w.strip_suffix('\''))
        .expect("single-quoted");
    inner.replace("'\\''", "'")
}

// ── Apply ────────────────────────────────────────────────────────────

#[test]
fn apply_sets_unsets_and_inherits() {
    let mut envp = container_env().apply(INITIAL_ENVP);
    envp.sort();

    assert_eq!(
        envp,
        [
            " =space",
            "2weird=starts with digit",
            "FLATPAK_ID=com.valvesoftware.Steam",
            "G_MESSAGES_DEBUG=all",
            "LD_AUDIT=audit2.so",
            "LD_PRELOAD=libfakeroot.so",
        ]
    );
}

#[test]
fn apply_then_read_back_matches_overlay() {
    let overlay = container_env();
    let envp = overlay.apply(INITIAL_ENVP);

    for name in overlay.get_sorted_names() {
        let found = envp
            .iter()
            .find_map(|e| e.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')));
        assert_eq!(found, overlay.get(name), "{name:?}");
    }
}

#[test]
fn sorted_names_include_unset_but_not_inherited() {
    assert_eq!(
        container_env().get_sorted_names(),
        [" ", "2weird", "G_MESSAGES_DEBUG", "LD_AUDIT", "STEAM_RUNTIME", "TMPDIR"]
    );
}

// ── Serialization ────────────────────────────────────────────────────

#[test]
fn env0_lists_only_set_variables() {
    let env0 = container_env().serialize_env0();
    assert_eq!(env0.last(), Some(&0));

    let entries: Vec<&str> = env0[..env0.len() - 1]
        .split(|b| *b == 0)
        .map(|e| std::str::from_utf8(e).expect("utf-8"))
        .collect();
    assert_eq!(
        entries,
        [
            " =space",
            "2weird=starts with digit",
            "G_MESSAGES_DEBUG=all",
            "LD_AUDIT=audit2.so",
        ]
    );
}

#[test]
fn shell_script_parses_back_to_identifier_subset() {
    let script = container_env().serialize_shell();
    let mut parsed = EnvOverlay::new();

    for line in script.lines().filter(|l| !l.is_empty()) {
        let (command, argument) = line.split_once(' ').expect("two words");
        let (name, value) = match command {
            "export" => {
                let (name, quoted) = argument.split_once('=').expect("NAME=VALUE");
                (name, Some(unquote(quoted)))
            }
            "unset" => (argument, None),
            other => panic!("unexpected command {other:?}"),
        };
        assert!(!parsed.contains(name), "{name} appears twice");
        parsed.set(name, value.as_deref());
    }

    assert_eq!(
        parsed.get_sorted_names(),
        ["G_MESSAGES_DEBUG", "LD_AUDIT", "STEAM_RUNTIME", "TMPDIR"]
    );
    assert_eq!(parsed.get("G_MESSAGES_DEBUG"), Some("all"));
    assert_eq!(parsed.get("LD_AUDIT"), Some("audit2.so"));
    assert_eq!(parsed.get("STEAM_RUNTIME"), None);
    assert_eq!(parsed.get("TMPDIR"), None);
}

#[test]
fn shell_script_round_trips_through_sh() {
    let mut overlay = EnvOverlay::new();
    overlay.set("TRICKY", Some("it's \"quoted\" $HOME `x` \\ end"));
    overlay.set("GONE", None);

    let script = format!(
        "GONE=present\n{}printf '%s|%s' \"$TRICKY\" \"${{GONE-unset}}\"",
        overlay.serialize_shell()
    );
    let output = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&script)
        .output()
        .expect("run sh");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).expect("utf-8"),
        "it's \"quoted\" $HOME `x` \\ end|unset"
    );
}

// ── Loading ──────────────────────────────────────────────────────────

/// Opens a temporary file holding `block` on a descriptor numbered at
/// least `min`, away from the low numbers other tests are handed.
fn block_on_fd(block: &[u8], min: RawFd) -> (tempfile::NamedTempFile, RawFd) {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(block).expect("write");
    let reader = std::fs::File::open(file.path()).expect("open");
    let fd = fcntl(&reader, FcntlArg::F_DUPFD_CLOEXEC(min)).expect("dup");
    (file, fd)
}

fn is_open(fd: RawFd) -> bool {
    Path::new(&format!("/proc/self/fd/{fd}")).exists()
}

#[test]
fn load_from_fd_reads_env0_block() {
    let (_file, fd) = block_on_fd(b"FROM_FD=yes\0EQUALS=a=b\0", 900);
    assert!(is_open(fd));

    let mut overlay = EnvOverlay::new();
    overlay
        .load_from_fd("--env-fd", &fd.to_string())
        .expect("load");
    assert_eq!(overlay.get("FROM_FD"), Some("yes"));
    assert_eq!(overlay.get("EQUALS"), Some("a=b"));
    assert!(!is_open(fd), "fd {fd} left open");
}

#[test]
fn load_from_fd_closes_descriptor_of_malformed_block() {
    let (_file, fd) = block_on_fd(b"BROKEN\0", 950);
    assert!(is_open(fd));

    let mut overlay = EnvOverlay::new();
    let err = overlay
        .load_from_fd("--env-fd", &fd.to_string())
        .expect_err("no equals sign");
    assert!(err.to_string().contains("BROKEN"), "{err}");
    assert!(!is_open(fd), "fd {fd} left open");
}

#[test]
fn inherit_matching_clears_overrides() {
    let mut overlay = container_env();
    overlay.inherit_matching("LD_*");
    overlay.inherit_matching("[0-9]*");
    assert_eq!(
        overlay.get_sorted_names(),
        [" ", "G_MESSAGES_DEBUG", "STEAM_RUNTIME", "TMPDIR"]
    );
}

#[test]
fn pass_matching_copies_from_reference() {
    let mut overlay = EnvOverlay::new();
    overlay.pass_matching_from_reference("LD_*", INITIAL_ENVP);
    assert_eq!(overlay.get_sorted_names(), ["LD_AUDIT", "LD_PRELOAD"]);
    assert_eq!(overlay.get("LD_PRELOAD"), Some("libfakeroot.so"));
}

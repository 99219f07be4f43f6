//! Per-variable environment overrides.
//!
//! Every variable is in one of three states: set to a value (possibly
//! empty), forced to be unset, or inherited from whatever environment the
//! overlay is eventually applied to. Only the first two are stored.

use std::collections::BTreeMap;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::{EnvEntry, environ_getenv};

use crate::{pattern, shell};

/// A set of environment variables to set, unset or leave alone.
///
/// Iteration, serialization and application all visit variables in
/// ascending byte order of their names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    values: BTreeMap<String, Option<String>>,
}

impl EnvOverlay {
    /// Creates an overlay in which every variable is inherited.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, or forces it to be unset if `value` is
    /// `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        self.take(name.to_owned(), value.map(str::to_owned));
    }

    /// Like [`set`](Self::set), taking ownership of the strings.
    ///
    /// A name that is empty or contains `=` can never be part of an
    /// environment block, so it is ignored with a warning.
    pub fn take(&mut self, name: String, value: Option<String>) {
        if !is_valid_name(&name) {
            tracing::warn!(name = %name, "ignoring invalid environment variable name");
            return;
        }
        let _ = self.values.insert(name, value);
    }

    /// Marks `name` as inherited, undoing any earlier set or unset.
    pub fn inherit(&mut self, name: &str) {
        let _ = self.values.remove(name);
    }

    /// Marks every set or unset variable whose name matches the shell
    /// wildcard `pattern` as inherited.
    pub fn inherit_matching(&mut self, pattern: &str) {
        self.values.retain(|name, _| !pattern::matches(pattern, name));
    }

    /// Applies a `NAME=VALUE` setting given to `option`.
    ///
    /// Only the first `=` separates name from value.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] if there is no `=` or the name is
    /// empty.
    pub fn set_from_cli(&mut self, option: &str, value: &str) -> Result<()> {
        let entry = EnvEntry::parse(value).ok_or_else(|| {
            VesselError::bad_value(
                option,
                format!(
                    "Invalid environment variable format \"{value}\" for {option}, should be NAME=VALUE"
                ),
            )
        })?;
        self.set(entry.name, Some(entry.value));
        Ok(())
    }

    /// Forces the variable named by `option`'s argument to be unset.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] if `name` is empty.
    pub fn unset_from_cli(&mut self, option: &str, name: &str) -> Result<()> {
        require_name(option, name)?;
        self.set(name, None);
        Ok(())
    }

    /// Marks the variable named by `option`'s argument as inherited.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] if `name` is empty.
    pub fn inherit_from_cli(&mut self, option: &str, name: &str) -> Result<()> {
        require_name(option, name)?;
        self.inherit(name);
        Ok(())
    }

    /// Copies `name` from the reference environment `envp`, or forces it to
    /// be unset if `envp` does not have it.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] if `name` is empty.
    pub fn pass_from_reference<S: AsRef<str>>(
        &mut self,
        option: &str,
        name: &str,
        envp: &[S],
    ) -> Result<()> {
        require_name(option, name)?;
        self.set(name, environ_getenv(envp, name));
        Ok(())
    }

    /// Copies every variable in `envp` whose name matches the shell
    /// wildcard `pattern`. Malformed entries in `envp` are skipped.
    pub fn pass_matching_from_reference<S: AsRef<str>>(&mut self, pattern: &str, envp: &[S]) {
        for entry in envp.iter().filter_map(|e| EnvEntry::parse(e.as_ref())) {
            if pattern::matches(pattern, entry.name) {
                self.set(entry.name, Some(entry.value));
            }
        }
    }

    /// Reads an `env -0` style block from the file descriptor given as
    /// `option`'s argument and sets each variable in it.
    ///
    /// Descriptors other than standard input, output and error are closed
    /// once read.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] if `value` is not a file descriptor
    /// number or the block is malformed, and an I/O error if the
    /// descriptor cannot be read.
    pub fn load_from_fd(&mut self, option: &str, value: &str) -> Result<()> {
        let fd = value
            .parse::<RawFd>()
            .ok()
            .filter(|fd| *fd >= 0)
            .ok_or_else(|| {
                VesselError::bad_value(option, format!("Not a valid file descriptor: {value}"))
            })?;

        let proc_path = format!("/proc/self/fd/{fd}");
        let block = std::fs::read(&proc_path)
            .map_err(|e| VesselError::from_os(e, format!("Unable to read \"{proc_path}\"")))?;

        if fd >= 3 {
            close_received_fd(fd);
        }

        tracing::debug!(fd, len = block.len(), "read environment block");
        self.load_env0(option, &block)
    }

    /// Sets each variable in a block of NUL-terminated `NAME=VALUE`
    /// entries. The final NUL is optional.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::BadValue`] for an entry with no `=`, an empty
    /// name, or contents that are not UTF-8. Entries before the bad one
    /// have already been applied.
    pub fn load_env0(&mut self, option: &str, block: &[u8]) -> Result<()> {
        let block = block.strip_suffix(b"\0").unwrap_or(block);
        if block.is_empty() {
            return Ok(());
        }

        for raw in block.split(|b| *b == 0) {
            let entry = std::str::from_utf8(raw)
                .ok()
                .and_then(EnvEntry::parse)
                .ok_or_else(|| {
                    VesselError::bad_value(
                        option,
                        format!(
                            "Environment variable must be given in the form VARIABLE=VALUE, not {}",
                            String::from_utf8_lossy(raw)
                        ),
                    )
                })?;
            self.set(entry.name, Some(entry.value));
        }
        Ok(())
    }

    /// Names that are set or forced unset, in ascending byte order.
    #[must_use]
    pub fn get_sorted_names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Value of `name`, or `None` if it is unset or inherited.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Option::as_deref)
    }

    /// Returns whether `name` is set or forced unset, as opposed to
    /// inherited.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns whether every variable is inherited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns a copy of `envp` with this overlay's settings applied.
    ///
    /// A set variable replaces an existing entry in place or is appended;
    /// an unset variable is removed.
    #[must_use]
    pub fn apply<S: AsRef<str>>(&self, envp: &[S]) -> Vec<String> {
        let mut out: Vec<String> = envp.iter().map(|e| e.as_ref().to_owned()).collect();

        for (name, value) in &self.values {
            let is_this = |entry: &String| {
                entry
                    .strip_prefix(name.as_str())
                    .is_some_and(|rest| rest.starts_with('='))
            };

            match value {
                Some(value) => {
                    let setting = format!("{name}={value}");
                    match out.iter().position(is_this) {
                        Some(i) => out[i] = setting,
                        None => out.push(setting),
                    }
                }
                None => out.retain(|entry| !is_this(entry)),
            }
        }
        out
    }

    /// Serializes the set variables as `NAME=VALUE\0` entries, in sorted
    /// order. Unset and inherited variables are omitted.
    #[must_use]
    pub fn serialize_env0(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.values {
            if let Some(value) = value {
                out.extend_from_slice(name.as_bytes());
                out.push(b'=');
                out.extend_from_slice(value.as_bytes());
                out.push(0);
            }
        }
        out
    }

    /// Serializes the overlay as a POSIX shell script of `export` and
    /// `unset` lines, in sorted order.
    ///
    /// Variables whose names are not valid shell identifiers are skipped.
    #[must_use]
    pub fn serialize_shell(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.values {
            if !shell::is_identifier(name) {
                tracing::debug!(name = %name, "cannot export variable: not a valid shell variable");
                continue;
            }

            match value {
                Some(value) => {
                    out.push_str(&format!("export {name}={}\n", shell::quote(value)));
                }
                None => out.push_str(&format!("unset {name}\n")),
            }
        }
        out
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=')
}

fn require_name(option: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VesselError::bad_value(
            option,
            format!("Environment variable name for {option} must be non-empty"),
        ));
    }
    if name.contains('=') {
        return Err(VesselError::bad_value(
            option,
            format!("Environment variable name \"{name}\" for {option} must not contain \"=\""),
        ));
    }
    Ok(())
}

/// Closes a descriptor that the caller handed over by number.
#[allow(unsafe_code)]
fn close_received_fd(fd: RawFd) {
    // SAFETY: the descriptor was just read through /proc/self/fd, so it is
    // open, and passing it on the command line transfers ownership to us.
    drop(unsafe { OwnedFd::from_raw_fd(fd) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_unset_inherit_are_exclusive() {
        let mut overlay = EnvOverlay::new();
        overlay.set("A", Some("1"));
        assert_eq!(overlay.get("A"), Some("1"));

        overlay.set("A", None);
        assert!(overlay.contains("A"));
        assert_eq!(overlay.get("A"), None);

        overlay.inherit("A");
        assert!(!overlay.contains("A"));
        assert!(overlay.is_empty());
    }

    #[test]
    fn set_from_cli_splits_at_first_equals() {
        let mut overlay = EnvOverlay::new();
        overlay.set_from_cli("--env", "OPTS=a=b").expect("valid");
        assert_eq!(overlay.get("OPTS"), Some("a=b"));

        overlay.set_from_cli("--env", "EMPTY=").expect("valid");
        assert_eq!(overlay.get("EMPTY"), Some(""));
    }

    #[test]
    fn set_from_cli_rejects_malformed() {
        let mut overlay = EnvOverlay::new();
        for bad in ["NOEQUALS", "=value", ""] {
            let err = overlay.set_from_cli("--env", bad).expect_err("malformed");
            assert!(matches!(err, VesselError::BadValue { .. }));
            assert_eq!(
                err.to_string(),
                format!("Invalid environment variable format \"{bad}\" for --env, should be NAME=VALUE")
            );
        }
        assert!(overlay.is_empty());
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut overlay = EnvOverlay::new();
        let err = overlay.unset_from_cli("--unset-env", "").expect_err("empty");
        assert_eq!(
            err.to_string(),
            "Environment variable name for --unset-env must be non-empty"
        );
        assert!(overlay.inherit_from_cli("--inherit-env", "").is_err());
        assert!(overlay.pass_from_reference("--pass-env", "", &["A=1"]).is_err());
    }

    #[test]
    fn names_containing_equals_are_never_stored() {
        let mut overlay = EnvOverlay::new();
        overlay.set("A=B", Some("v"));
        overlay.take(String::new(), Some("v".to_owned()));
        assert!(overlay.is_empty());
        assert!(overlay.serialize_env0().is_empty());

        let err = overlay
            .unset_from_cli("--unset-env", "A=B")
            .expect_err("contains equals");
        assert_eq!(
            err.to_string(),
            "Environment variable name \"A=B\" for --unset-env must not contain \"=\""
        );
        assert!(overlay.pass_from_reference("--pass-env", "A=B", &["A=B=v"]).is_err());
        assert!(overlay.is_empty());
    }

    #[test]
    fn pass_from_reference_copies_or_unsets() {
        let envp = ["HOME=/home/user", "LANG=C.UTF-8"];
        let mut overlay = EnvOverlay::new();
        overlay.pass_from_reference("--pass-env", "HOME", &envp).expect("pass");
        overlay.pass_from_reference("--pass-env", "DISPLAY", &envp).expect("pass");

        assert_eq!(overlay.get("HOME"), Some("/home/user"));
        assert!(overlay.contains("DISPLAY"));
        assert_eq!(overlay.get("DISPLAY"), None);
    }

    #[test]
    fn pass_matching_skips_malformed() {
        let envp = ["XDG_A=1", "XDG_B=2", "=XDG_C", "XDG_D", "OTHER=3"];
        let mut overlay = EnvOverlay::new();
        overlay.pass_matching_from_reference("XDG_*", &envp);
        assert_eq!(overlay.get_sorted_names(), ["XDG_A", "XDG_B"]);
    }

    #[test]
    fn inherit_matching_uses_wildcards() {
        let mut overlay = EnvOverlay::new();
        overlay.set("LD_AUDIT", Some("a.so"));
        overlay.set("LD_PRELOAD", None);
        overlay.set("TMPDIR", Some("/tmp"));

        overlay.inherit_matching("LD_*");
        assert_eq!(overlay.get_sorted_names(), ["TMPDIR"]);
    }

    #[test]
    fn load_env0_parses_block() {
        let mut overlay = EnvOverlay::new();
        overlay
            .load_env0("--env-fd", b"A=1\0B=x=y\0C=\0")
            .expect("valid");
        assert_eq!(overlay.get("A"), Some("1"));
        assert_eq!(overlay.get("B"), Some("x=y"));
        assert_eq!(overlay.get("C"), Some(""));

        overlay.load_env0("--env-fd", b"D=no-trailing-nul").expect("valid");
        assert_eq!(overlay.get("D"), Some("no-trailing-nul"));

        overlay.load_env0("--env-fd", b"").expect("empty block");
    }

    #[test]
    fn load_env0_rejects_bad_entry() {
        let mut overlay = EnvOverlay::new();
        let err = overlay
            .load_env0("--env-fd", b"A=1\0BROKEN\0")
            .expect_err("no equals");
        assert_eq!(
            err.to_string(),
            "Environment variable must be given in the form VARIABLE=VALUE, not BROKEN"
        );
        assert!(overlay.load_env0("--env-fd", b"=x\0").is_err());
    }

    #[test]
    fn load_from_fd_rejects_non_numbers() {
        let mut overlay = EnvOverlay::new();
        for bad in ["", "three", "-1", "3x"] {
            let err = overlay.load_from_fd("--env-fd", bad).expect_err("not an fd");
            assert_eq!(err.to_string(), format!("Not a valid file descriptor: {bad}"));
        }
    }

    #[test]
    fn apply_replaces_in_place_and_removes() {
        let mut overlay = EnvOverlay::new();
        overlay.set("B", Some("new"));
        overlay.set("C", None);
        overlay.set("D", Some("added"));

        let out = overlay.apply(&["A=1", "B=old", "C=gone", "BB=keep"]);
        assert_eq!(out, ["A=1", "B=new", "BB=keep", "D=added"]);
    }

    #[test]
    fn shell_output_quotes_values() {
        let mut overlay = EnvOverlay::new();
        overlay.set("MSG", Some("it's here"));
        overlay.set("GONE", None);
        assert_eq!(
            overlay.serialize_shell(),
            "unset GONE\nexport MSG='it'\\''s here'\n"
        );
    }
}

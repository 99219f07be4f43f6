//! Running architecture-specific helper executables.
//!
//! Helpers live in one directory and are named `<tuple>-<helper>`, such as
//! `x86_64-linux-gnu-detect-lib`. They run with an explicit environment
//! rather than inheriting the caller's.

use std::path::{Path, PathBuf};
use std::process::Command;

use vessel_common::config::VesselConfig;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::{EnvEntry, environ_getenv};

use crate::setuid::check_not_setuid;

/// Launches helper subprocesses with a fixed environment.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    environ: Vec<String>,
    helpers_path: PathBuf,
}

impl SubprocessRunner {
    /// Creates a runner with an explicit environment block.
    #[must_use]
    pub fn new(environ: Vec<String>, helpers_path: impl Into<PathBuf>) -> Self {
        Self {
            environ,
            helpers_path: helpers_path.into(),
        }
    }

    /// Creates a runner from the current process environment and the
    /// configured helpers directory. Variables that are not valid UTF-8 are
    /// dropped.
    #[must_use]
    pub fn from_env(config: &VesselConfig) -> Self {
        let environ = std::env::vars_os()
            .filter_map(|(name, value)| {
                let name = name.into_string().ok()?;
                let value = value.into_string().ok()?;
                Some(format!("{name}={value}"))
            })
            .collect();
        Self::new(environ, &config.helpers_path)
    }

    /// Environment block helpers run with.
    #[must_use]
    pub fn environ(&self) -> &[String] {
        &self.environ
    }

    /// Looks up a variable in the helper environment.
    #[must_use]
    pub fn getenv(&self, name: &str) -> Option<&str> {
        environ_getenv(&self.environ, name)
    }

    /// Directory containing the helpers.
    #[must_use]
    pub fn helpers_path(&self) -> &Path {
        &self.helpers_path
    }

    /// Path of the helper `name` for the architecture `tuple`.
    #[must_use]
    pub fn helper_path(&self, tuple: &str, name: &str) -> PathBuf {
        self.helpers_path.join(format!("{tuple}-{name}"))
    }

    /// Runs a helper and returns its standard output with at most one
    /// trailing newline removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the process is setuid, the helper cannot be
    /// started, or it exits unsuccessfully. In the last case the message
    /// includes the helper's standard error.
    pub fn run_helper(&self, tuple: &str, name: &str, args: &[&str]) -> Result<String> {
        let program = self.helper_path(tuple, name);
        check_not_setuid(&program.display().to_string())?;

        tracing::debug!(helper = %program.display(), ?args, "running helper");

        let output = Command::new(&program)
            .args(args)
            .env_clear()
            .envs(
                self.environ
                    .iter()
                    .filter_map(|entry| EnvEntry::parse(entry))
                    .map(|entry| (entry.name, entry.value)),
            )
            .output()
            .map_err(|e| {
                VesselError::from_os(e, format!("Unable to run \"{}\"", program.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VesselError::Subprocess {
                message: format!(
                    "\"{}\" failed ({}): {}",
                    program.display(),
                    output.status,
                    stderr.trim_end()
                ),
            });
        }

        let mut stdout = String::from_utf8(output.stdout).map_err(|_| VesselError::Subprocess {
            message: format!("\"{}\" printed invalid UTF-8", program.display()),
        })?;
        if stdout.ends_with('\n') {
            let _ = stdout.pop();
        }
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    fn write_helper(dir: &Path, name: &str, script: &str) {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write helper");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[test]
    fn helper_path_joins_tuple_and_name() {
        let runner = SubprocessRunner::new(Vec::new(), "/opt/helpers");
        assert_eq!(
            runner.helper_path("x86_64-linux-gnu", "detect-lib"),
            PathBuf::from("/opt/helpers/x86_64-linux-gnu-detect-lib")
        );
    }

    #[test]
    fn getenv_reads_runner_environment() {
        let runner = SubprocessRunner::new(vec!["A=1".into(), "B=two=2".into()], "/");
        assert_eq!(runner.getenv("B"), Some("two=2"));
        assert_eq!(runner.getenv("C"), None);
    }

    #[test]
    fn run_helper_strips_one_newline() {
        if crate::setuid::is_setuid() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper(dir.path(), "mock-detect-lib", "printf 'lib/mock\\n\\n'");
        let runner = SubprocessRunner::new(Vec::new(), dir.path());

        let out = runner.run_helper("mock", "detect-lib", &[]).expect("run");
        assert_eq!(out, "lib/mock\n");
    }

    #[test]
    fn run_helper_uses_explicit_environment() {
        if crate::setuid::is_setuid() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper(dir.path(), "mock-echo", "printf '%s' \"$GREETING\"");
        let runner = SubprocessRunner::new(vec!["GREETING=hello".into()], dir.path());

        assert_eq!(runner.run_helper("mock", "echo", &[]).expect("run"), "hello");
    }

    #[test]
    fn run_helper_reports_stderr() {
        if crate::setuid::is_setuid() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        write_helper(dir.path(), "mock-fail", "echo 'no such platform' >&2; exit 1");
        let runner = SubprocessRunner::new(Vec::new(), dir.path());

        let err = runner.run_helper("mock", "fail", &[]).expect_err("must fail");
        assert!(err.to_string().contains("no such platform"));
    }
}

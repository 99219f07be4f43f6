//! `vessel resolve`: resolve a path inside a sysroot.

use clap::Args;
use serde::Serialize;
use vessel_core::sysroot::{ResolveFlags, resolve_in_sysroot};

use super::SysrootArgs;
use crate::output;

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Where to resolve.
    #[command(flatten)]
    pub sysroot: SysrootArgs,

    /// Create missing directories along the way.
    #[arg(long)]
    pub mkdir_p: bool,

    /// Do not follow a symlink in the last component.
    #[arg(long)]
    pub keep_final_symlink: bool,

    /// Fail on any symlink.
    #[arg(long)]
    pub reject_symlinks: bool,

    /// Open the result for reading.
    #[arg(long)]
    pub readable: bool,

    /// Require the result to be a directory.
    #[arg(long, conflicts_with = "must_be_regular")]
    pub must_be_directory: bool,

    /// Require the result to be a regular file.
    #[arg(long)]
    pub must_be_regular: bool,

    /// Require the result to be executable.
    #[arg(long)]
    pub must_be_executable: bool,

    /// Print the path with a leading `/`.
    #[arg(long)]
    pub absolute: bool,

    /// Print a JSON object instead of the bare path.
    #[arg(long)]
    pub json: bool,

    /// Path to resolve, relative to the sysroot.
    pub path: String,
}

impl ResolveArgs {
    /// Flags selected on the command line.
    #[must_use]
    pub fn flags(&self) -> ResolveFlags {
        [
            (self.mkdir_p, ResolveFlags::MKDIR_P),
            (self.keep_final_symlink, ResolveFlags::KEEP_FINAL_SYMLINK),
            (self.reject_symlinks, ResolveFlags::REJECT_SYMLINKS),
            (self.readable, ResolveFlags::READABLE),
            (self.must_be_directory, ResolveFlags::MUST_BE_DIRECTORY),
            (self.must_be_regular, ResolveFlags::MUST_BE_REGULAR),
            (self.must_be_executable, ResolveFlags::MUST_BE_EXECUTABLE),
            (self.absolute, ResolveFlags::RETURN_ABSOLUTE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(ResolveFlags::NONE, |acc, (_, flag)| acc | flag)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    sysroot: String,
    input: &'a str,
    flags: String,
    path: String,
}

/// Executes the `resolve` command.
///
/// # Errors
///
/// Returns an error if the sysroot cannot be opened or the path does not
/// resolve with the requested constraints.
pub fn execute(args: &ResolveArgs) -> anyhow::Result<()> {
    let sysroot = args.sysroot.open()?;
    let flags = args.flags();

    let resolved = match sysroot.fd() {
        Some(fd) => resolve_in_sysroot(fd, &args.path, flags)?,
        None => sysroot.resolve(&args.path, flags)?,
    };
    tracing::info!(input = %args.path, path = %resolved.path, flags = %flags, "resolved");

    if args.json {
        output::write_json(&Report {
            sysroot: sysroot.path().display().to_string(),
            input: &args.path,
            flags: flags.to_string(),
            path: resolved.path,
        })
    } else {
        output::write_line(&resolved.path)
    }
}

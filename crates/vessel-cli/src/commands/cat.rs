//! `vessel cat`: read files through a sysroot.

use clap::Args;
use vessel_core::sysroot::ResolveFlags;

use super::SysrootArgs;
use crate::output;

/// Arguments for the `cat` command.
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Where to resolve.
    #[command(flatten)]
    pub sysroot: SysrootArgs,

    /// Parse the file as JSON and pretty-print it.
    #[arg(long, conflicts_with = "list_json")]
    pub json: bool,

    /// Treat PATH as a directory and list the JSON files in it.
    #[arg(long)]
    pub list_json: bool,

    /// File to read, relative to the sysroot.
    pub path: String,
}

/// Executes the `cat` command.
///
/// # Errors
///
/// Returns an error if the file cannot be resolved, read or parsed.
pub fn execute(args: &CatArgs) -> anyhow::Result<()> {
    let sysroot = args.sysroot.open()?;

    if args.list_json {
        for path in sysroot.json_files(&args.path)? {
            output::write_line(&path?)?;
        }
        return Ok(());
    }

    if args.json {
        let value: serde_json::Value = sysroot.load_json(&args.path)?;
        return output::write_json(&value);
    }

    let (path, contents) = sysroot.load(&args.path, ResolveFlags::NONE)?;
    tracing::debug!(path = %path, len = contents.len(), "read file");
    output::write_bytes(&contents)
}

//! CLI command definitions and dispatch.

pub mod cat;
pub mod env;
pub mod libs;
pub mod resolve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vessel_core::sysroot::SysrootHandle;

/// vessel: building blocks of a container launch, one at a time.
#[derive(Parser, Debug)]
#[command(name = "vessel", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit log records as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a path inside a sysroot and print where it ends up.
    Resolve(resolve::ResolveArgs),
    /// Print a regular file's contents, read through a sysroot.
    Cat(cat::CatArgs),
    /// Build an environment overlay from options and print it.
    Env(env::EnvCommandArgs),
    /// Create per-architecture library directories and describe them.
    Libs(libs::LibsArgs),
}

/// Where paths are resolved.
#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct SysrootArgs {
    /// Directory to treat as the root.
    #[arg(long, value_name = "DIR")]
    pub sysroot: Option<PathBuf>,

    /// Use the real root without descriptor-relative resolution.
    #[arg(long)]
    pub direct: bool,
}

impl SysrootArgs {
    /// Opens the selected sysroot, defaulting to the real root.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened.
    pub fn open(&self) -> anyhow::Result<SysrootHandle> {
        let handle = match &self.sysroot {
            Some(path) => SysrootHandle::new(path.clone())?,
            None if self.direct => SysrootHandle::direct(),
            None => SysrootHandle::real_root()?,
        };
        tracing::debug!(root = %handle.path().display(), direct = handle.is_direct(), "opened sysroot");
        Ok(handle)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Resolve(args) => resolve::execute(&args),
        Command::Cat(args) => cat::execute(&args),
        Command::Env(args) => env::execute(&args),
        Command::Libs(args) => libs::execute(&args),
    }
}

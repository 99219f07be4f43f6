//! `vessel env`: build an environment overlay from options.

use clap::{Args, ValueEnum};
use vessel_env::cli::{EnvArgs, EnvOptionGroup};

use crate::output;

/// How the overlay is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EnvFormat {
    /// `NAME=VALUE` entries for the variables set, each ending with `\0`.
    Env0,
    /// `export` and `unset` lines for a POSIX shell.
    #[default]
    Shell,
    /// The current environment with the overlay applied, one entry per
    /// line.
    Apply,
}

/// Arguments for the `env` command.
#[derive(Args, Debug)]
pub struct EnvCommandArgs {
    /// Environment options, applied in order.
    #[command(flatten)]
    pub env: EnvArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = EnvFormat::Shell)]
    pub format: EnvFormat,
}

/// Executes the `env` command.
///
/// # Errors
///
/// Returns an error if an option has a bad value or output fails.
pub fn execute(args: &EnvCommandArgs) -> anyhow::Result<()> {
    let environ = current_environ();
    let group = EnvOptionGroup::new(environ.clone());
    group.apply(&args.env)?;

    let overlay = group.overlay();
    let overlay = overlay.borrow();
    tracing::debug!(variables = overlay.get_sorted_names().len(), "built overlay");

    match args.format {
        EnvFormat::Env0 => output::write_bytes(&overlay.serialize_env0()),
        EnvFormat::Shell => output::write_bytes(overlay.serialize_shell().as_bytes()),
        EnvFormat::Apply => {
            let mut applied = overlay.apply(&environ);
            applied.sort();
            let mut text = applied.join("\n");
            if !text.is_empty() {
                text.push('\n');
            }
            output::write_bytes(text.as_bytes())
        }
    }
}

/// The process environment, skipping entries that are not UTF-8.
fn current_environ() -> Vec<String> {
    std::env::vars_os()
        .filter_map(|(name, value)| {
            let (name, value) = (name.into_string().ok()?, value.into_string().ok()?);
            Some(format!("{name}={value}"))
        })
        .collect()
}

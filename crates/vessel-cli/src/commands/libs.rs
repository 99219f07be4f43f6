//! `vessel libs`: create per-architecture library directories.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use vessel_common::config::VesselConfig;
use vessel_common::constants::SUPPORTED_ARCHITECTURES;
use vessel_env::EnvOverlay;
use vessel_libs::{PerArchDirs, set_up_overrides, system_info};

use crate::output;

/// Arguments for the `libs` command.
#[derive(Args, Debug)]
pub struct LibsArgs {
    /// Overrides tree containing `<tuple>/vdpau` driver directories.
    #[arg(long, value_name = "DIR")]
    pub overrides: Option<PathBuf>,

    /// Print the environment changes as shell commands instead of JSON.
    #[arg(long)]
    pub print_env: bool,

    /// Keep the directories after exiting.
    #[arg(long)]
    pub keep: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    layout: &'a PerArchDirs,
    env: Vec<(&'a str, Option<&'a str>)>,
}

/// Executes the `libs` command.
///
/// The directories are removed again on exit unless `--keep` is given.
///
/// # Errors
///
/// Returns an error if the directories or override symlinks cannot be
/// created.
pub fn execute(args: &LibsArgs) -> anyhow::Result<()> {
    if SUPPORTED_ARCHITECTURES.is_empty() {
        anyhow::bail!("no supported architectures on this host");
    }

    let config = VesselConfig::from_env();
    let info = system_info::from_config(&config);
    let dirs = PerArchDirs::new(info.as_ref(), SUPPORTED_ARCHITECTURES, &config)?;

    let mut env = EnvOverlay::new();
    if let Some(overrides) = &args.overrides {
        set_up_overrides(&mut env, Some(&dirs), overrides)?;
    }

    if args.print_env {
        output::write_bytes(env.serialize_shell().as_bytes())?;
    } else {
        let names = env.get_sorted_names();
        output::write_json(&Report {
            layout: &dirs,
            env: names.into_iter().map(|name| (name, env.get(name))).collect(),
        })?;
    }

    if args.keep {
        let root = dirs.persist();
        tracing::info!(root = %root.display(), "keeping per-architecture directories");
    }
    Ok(())
}

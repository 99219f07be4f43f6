//! Command-line options that build an [`EnvOverlay`].
//!
//! The options are order-sensitive: `--env A=1 --inherit-env A` leaves `A`
//! inherited, while the reverse sets it. [`EnvArgs`] therefore records every
//! occurrence with its position and replays them in command-line order.
//! It can be flattened into any `clap` derive struct.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use clap::{Arg, ArgAction, ArgMatches, Command};

use vessel_common::error::Result;

use crate::EnvOverlay;

/// One environment option kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvOptionKind {
    /// `--env VAR=VALUE`
    Set,
    /// `--env-fd FD`
    Fd,
    /// `--inherit-env VAR`
    Inherit,
    /// `--inherit-env-matching WILDCARD`
    InheritMatching,
    /// `--unset-env VAR`
    Unset,
    /// `--pass-env VAR`
    Pass,
    /// `--pass-env-matching WILDCARD`
    PassMatching,
}

impl EnvOptionKind {
    const ALL: [Self; 7] = [
        Self::Set,
        Self::Fd,
        Self::Inherit,
        Self::InheritMatching,
        Self::Unset,
        Self::Pass,
        Self::PassMatching,
    ];

    /// Long option name without the leading dashes; also the clap id.
    #[must_use]
    pub const fn long(self) -> &'static str {
        match self {
            Self::Set => "env",
            Self::Fd => "env-fd",
            Self::Inherit => "inherit-env",
            Self::InheritMatching => "inherit-env-matching",
            Self::Unset => "unset-env",
            Self::Pass => "pass-env",
            Self::PassMatching => "pass-env-matching",
        }
    }

    const fn value_name(self) -> &'static str {
        match self {
            Self::Set => "VAR=VALUE",
            Self::Fd => "FD",
            Self::Inherit | Self::Unset | Self::Pass => "VAR",
            Self::InheritMatching | Self::PassMatching => "WILDCARD",
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Self::Set => "Set environment variable.",
            Self::Fd => "Read environment variables in env -0 format from FD",
            Self::Inherit => "Undo a previous --env, --unset-env, --pass-env, etc.",
            Self::InheritMatching => {
                "Undo previous --env, --unset-env, etc. matching a shell-style wildcard"
            }
            Self::Unset => "Unset environment variable, like env -u.",
            Self::Pass => "Pass environment variable through, or unset if set.",
            Self::PassMatching => "Pass environment variables matching a shell-style wildcard.",
        }
    }

    fn arg(self) -> Arg {
        Arg::new(self.long())
            .long(self.long())
            .value_name(self.value_name())
            .help(self.help())
            .action(ArgAction::Append)
            .value_parser(clap::value_parser!(String))
    }
}

impl fmt::Display for EnvOptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}", self.long())
    }
}

/// Environment options in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvArgs {
    options: Vec<(EnvOptionKind, String)>,
}

impl EnvArgs {
    /// Options as given, in command-line order.
    #[must_use]
    pub fn options(&self) -> &[(EnvOptionKind, String)] {
        &self.options
    }

    /// Replays the options onto `overlay`. `envp` is the reference
    /// environment for `--pass-env` and `--pass-env-matching`.
    ///
    /// # Errors
    ///
    /// Returns the first bad value encountered; options before it have
    /// already been applied.
    pub fn apply_to<S: AsRef<str>>(&self, overlay: &mut EnvOverlay, envp: &[S]) -> Result<()> {
        for (kind, value) in &self.options {
            let option = kind.to_string();
            match kind {
                EnvOptionKind::Set => overlay.set_from_cli(&option, value)?,
                EnvOptionKind::Fd => overlay.load_from_fd(&option, value)?,
                EnvOptionKind::Inherit => overlay.inherit_from_cli(&option, value)?,
                EnvOptionKind::InheritMatching => overlay.inherit_matching(value),
                EnvOptionKind::Unset => overlay.unset_from_cli(&option, value)?,
                EnvOptionKind::Pass => overlay.pass_from_reference(&option, value, envp)?,
                EnvOptionKind::PassMatching => overlay.pass_matching_from_reference(value, envp),
            }
        }
        Ok(())
    }
}

impl clap::FromArgMatches for EnvArgs {
    fn from_arg_matches(matches: &ArgMatches) -> std::result::Result<Self, clap::Error> {
        let mut args = Self::default();
        args.update_from_arg_matches(matches)?;
        Ok(args)
    }

    fn update_from_arg_matches(&mut self, matches: &ArgMatches) -> std::result::Result<(), clap::Error> {
        let mut positioned = Vec::new();

        for kind in EnvOptionKind::ALL {
            let Some(values) = matches.try_get_many::<String>(kind.long()).ok().flatten() else {
                continue;
            };
            let Some(indices) = matches.indices_of(kind.long()) else {
                continue;
            };
            positioned.extend(indices.zip(values).map(|(i, v)| (i, kind, v.clone())));
        }

        positioned.sort_by_key(|(index, _, _)| *index);
        self.options
            .extend(positioned.into_iter().map(|(_, kind, value)| (kind, value)));
        Ok(())
    }
}

impl clap::Args for EnvArgs {
    fn augment_args(cmd: Command) -> Command {
        cmd.args(EnvOptionKind::ALL.map(EnvOptionKind::arg))
    }

    fn augment_args_for_update(cmd: Command) -> Command {
        Self::augment_args(cmd)
    }
}

/// Option group holding a shared handle to the overlay it fills in.
///
/// The launcher that later consumes the overlay keeps its own clone of the
/// handle from [`overlay`](Self::overlay).
#[derive(Debug, Clone)]
pub struct EnvOptionGroup {
    overlay: Rc<RefCell<EnvOverlay>>,
    envp: Vec<String>,
}

impl EnvOptionGroup {
    /// Creates a group with a fresh overlay, passing variables through from
    /// `envp`.
    #[must_use]
    pub fn new(envp: Vec<String>) -> Self {
        Self::with_overlay(Rc::new(RefCell::new(EnvOverlay::new())), envp)
    }

    /// Creates a group that fills in an existing shared overlay.
    #[must_use]
    pub const fn with_overlay(overlay: Rc<RefCell<EnvOverlay>>, envp: Vec<String>) -> Self {
        Self { overlay, envp }
    }

    /// Shared handle to the overlay.
    #[must_use]
    pub fn overlay(&self) -> Rc<RefCell<EnvOverlay>> {
        Rc::clone(&self.overlay)
    }

    /// Applies parsed options to the shared overlay.
    ///
    /// # Errors
    ///
    /// See [`EnvArgs::apply_to`].
    pub fn apply(&self, args: &EnvArgs) -> Result<()> {
        args.apply_to(&mut self.overlay.borrow_mut(), &self.envp)
    }
}

//! Domain primitive types used across the vessel workspace.

use std::fmt;

use serde::Serialize;

/// Static description of one supported CPU architecture.
///
/// Besides the multiarch tuple, this records what the dynamic linker's
/// `${LIB}` token expands to under each library directory naming scheme
/// that exists for the architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Architecture {
    /// GNU multiarch tuple, such as `x86_64-linux-gnu`.
    pub tuple: &'static str,
    /// `${LIB}` under Debian-style multiarch, such as `lib/x86_64-linux-gnu`.
    pub multiarch_lib: &'static str,
    /// `${LIB}` under FHS library directories, such as `lib64`.
    pub fhs_lib: &'static str,
    /// `${LIB}` under Arch Linux's FHS variant, which only exists on x86.
    pub arch_linux_lib: Option<&'static str>,
    /// Known `${PLATFORM}` expansions, most specific first.
    pub platforms: &'static [&'static str],
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tuple)
    }
}

/// Parsed `NAME=VALUE` pair from an environment block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvEntry<'a> {
    /// Variable name, never empty.
    pub name: &'a str,
    /// Variable value, possibly empty.
    pub value: &'a str,
}

impl<'a> EnvEntry<'a> {
    /// Splits an environment entry at its first `=`.
    ///
    /// Returns `None` if there is no `=` or the name before it is empty.
    #[must_use]
    pub fn parse(entry: &'a str) -> Option<Self> {
        match entry.split_once('=') {
            Some((name, value)) if !name.is_empty() => Some(Self { name, value }),
            _ => None,
        }
    }
}

/// Looks up `name` in an environment block of `NAME=VALUE` strings.
#[must_use]
pub fn environ_getenv<'a, S: AsRef<str>>(envp: &'a [S], name: &str) -> Option<&'a str> {
    envp.iter()
        .filter_map(|entry| EnvEntry::parse(entry.as_ref()))
        .find(|entry| entry.name == name)
        .map(|entry| entry.value)
}

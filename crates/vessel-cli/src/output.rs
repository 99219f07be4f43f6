//! Writers for command output on stdout.
//!
//! Logs go to stderr, so anything written here can be piped.

use std::io::Write;

use serde::Serialize;

/// Writes raw bytes to stdout and flushes.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn write_bytes(bytes: &[u8]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}

/// Writes one line of text to stdout.
///
/// # Errors
///
/// Returns an error if stdout is closed.
pub fn write_line(line: &str) -> anyhow::Result<()> {
    write_bytes(format!("{line}\n").as_bytes())
}

/// Renders `value` as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_line<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Writes `value` as pretty JSON to stdout.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    write_bytes(to_json_line(value)?.as_bytes())
}

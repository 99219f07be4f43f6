//! Shell-style wildcard matching on variable names.

use std::ffi::CString;

/// Returns whether `name` matches the shell wildcard `pattern`, with the
/// semantics of `fnmatch(3)` and no flags: `*`, `?` and bracket
/// expressions, where `*` and `?` also match `/` and a leading `.`.
///
/// Strings containing NUL never match.
#[must_use]
#[allow(unsafe_code)]
pub fn matches(pattern: &str, name: &str) -> bool {
    let (Ok(pattern), Ok(name)) = (CString::new(pattern), CString::new(name)) else {
        return false;
    };

    // SAFETY: both pointers come from live CStrings, so they are valid and
    // NUL-terminated for the duration of the call; fnmatch does not retain
    // them.
    unsafe { libc::fnmatch(pattern.as_ptr(), name.as_ptr(), 0) == 0 }
}

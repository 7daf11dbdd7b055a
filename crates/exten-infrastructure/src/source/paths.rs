//! Store path arithmetic

use exten_domain::error::{Error, Result};

/// Resolve `relative` against the directory of `base`
///
/// A leading `/` makes `relative` root-relative. `.` and `..` segments are
/// folded; a path climbing above the root is rejected. Backslashes are
/// accepted as separators.
pub fn resolve_relative(base: Option<&str>, relative: &str) -> Result<String> {
    let relative = relative.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    if !relative.starts_with('/')
        && let Some(base) = base
        && let Some((directory, _)) = base.rsplit_once('/')
    {
        segments.extend(directory.split('/').filter(|s| !s.is_empty() && *s != "."));
    }

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::not_found(format!(
                        "{relative} points outside the source root"
                    )));
                }
            }
            name => segments.push(name),
        }
    }

    if segments.is_empty() {
        return Err(Error::not_found(format!("{relative} names no file")));
    }
    Ok(segments.join("/"))
}

/// Store path of the unit with `key`
pub(crate) fn unit_path(key: &str, extension: &str) -> String {
    format!("{key}.{extension}")
}

/// Folded store path of the unit with `key`; keys climbing above the root are rejected
pub(crate) fn normalized_unit_path(key: &str, extension: &str) -> Result<String> {
    resolve_relative(None, &unit_path(key, extension))
}

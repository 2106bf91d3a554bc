//! Mapping between relative paths and remote object keys.
//!
//! Object stores are flat: a "directory" only exists as a zero-length marker
//! object whose key ends with [`SEPARATOR`]. Every other module goes through
//! these functions so the encoding stays in one place.

use crate::NamespaceRoot;

/// Key and relative-path separator.
pub const SEPARATOR: char = '/';

/// Returns the listing prefix covering everything a namespace owns (`ns/`).
#[must_use]
pub fn namespace_prefix(namespace: &NamespaceRoot) -> String {
    format!("{namespace}{SEPARATOR}")
}

/// Maps a `/`-separated path relative to the namespace root to its object key.
///
/// Directory keys always end with the separator, file keys never do. Leading
/// and trailing separators on `relative_path` are ignored; an empty path maps
/// to the namespace root marker `ns/`.
#[must_use]
pub fn to_key(namespace: &NamespaceRoot, relative_path: &str, is_directory: bool) -> String {
    let relative = relative_path.trim_matches(SEPARATOR);
    let mut key = namespace_prefix(namespace);
    if relative.is_empty() {
        return key;
    }
    key.push_str(relative);
    if is_directory {
        key.push(SEPARATOR);
    }
    key
}

/// Inverse of [`to_key`]: strips the namespace prefix and any trailing
/// separator. Returns `None` when the key does not belong to the namespace.
#[must_use]
pub fn to_local_relative<'a>(namespace: &NamespaceRoot, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(namespace.as_str())
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .map(|rest| rest.trim_end_matches(SEPARATOR))
}

/// Returns true for directory marker keys.
#[must_use]
pub fn is_directory_key(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// Returns true when every segment of `relative` is a plain name.
///
/// Keys written by other clients may carry `.`/`..` or empty segments; those
/// must never be joined onto a local path.
#[must_use]
pub fn is_safe_relative(relative: &str) -> bool {
    !relative.is_empty()
        && relative
            .split(SEPARATOR)
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> NamespaceRoot {
        NamespaceRoot::new("user-1").unwrap()
    }

    #[test]
    fn file_and_directory_keys() {
        assert_eq!(to_key(&ns(), "a/b.txt", false), "user-1/a/b.txt");
        assert_eq!(to_key(&ns(), "a/b", true), "user-1/a/b/");
        assert_eq!(to_key(&ns(), "", true), "user-1/");
    }

    #[test]
    fn stray_separators_are_trimmed() {
        assert_eq!(to_key(&ns(), "/docs/", true), "user-1/docs/");
        assert_eq!(to_key(&ns(), "/notes.txt", false), "user-1/notes.txt");
    }

    #[test]
    fn foreign_keys_do_not_map() {
        assert_eq!(to_local_relative(&ns(), "user-2/a.txt"), None);
        assert_eq!(to_local_relative(&ns(), "user-10/a.txt"), None);
    }

    #[test]
    fn unsafe_relatives() {
        assert!(is_safe_relative("a/b"));
        assert!(!is_safe_relative("a/../b"));
        assert!(!is_safe_relative("./a"));
        assert!(!is_safe_relative("a//b"));
        assert!(!is_safe_relative(""));
    }
}

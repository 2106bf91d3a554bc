//! Property-based tests for the working directory and key mapping.

use boxsync_types::{NamespaceRoot, WorkingDirectory, to_key, to_local_relative};
use proptest::prelude::*;
use std::path::Path;

fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,12}").unwrap()
}

/// Tokens that may appear inside a path, excluding bare `/` and `..` calls.
fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => segment_strategy(),
        1 => Just(".".to_string()),
        1 => Just("..".to_string()),
        1 => Just(String::new()),
    ]
}

fn cwd() -> WorkingDirectory {
    WorkingDirectory::new(NamespaceRoot::new("ns").unwrap(), "alice")
}

proptest! {
    /// Applying tokens one by one equals applying the joined path once.
    #[test]
    fn navigation_is_associative(tokens in prop::collection::vec(token_strategy(), 1..12)) {
        let joined = tokens.join("/");
        prop_assume!(joined != "/" && joined != "..");

        let mut stepwise = cwd();
        for token in &tokens {
            if token == ".." {
                stepwise.change_directory("..");
            } else {
                stepwise.change_directory(token);
            }
        }

        let mut at_once = cwd();
        at_once.change_directory(&joined);

        prop_assert_eq!(stepwise.segments(), at_once.segments());
    }

    /// Segments never contain `.`, `..` or empty names.
    #[test]
    fn segments_stay_clean(tokens in prop::collection::vec(token_strategy(), 0..12)) {
        let mut dir = cwd();
        dir.change_directory(&tokens.join("/"));
        for segment in dir.segments() {
            prop_assert!(!segment.is_empty());
            prop_assert!(segment != "." && segment != "..");
        }
    }

    /// Wherever navigation lands, the prompt path stays inside the user root.
    #[test]
    fn prompt_path_is_always_contained(tokens in prop::collection::vec(token_strategy(), 0..12)) {
        let mut dir = cwd();
        dir.change_directory(&tokens.join("/"));
        let root = Path::new("/data");
        prop_assert!(dir.local_prompt_path(root).starts_with(dir.user_root(root)));
        prop_assert!(dir.resolve(root, "").is_ok());
    }

    /// File keys map back to the relative path they came from.
    #[test]
    fn file_key_roundtrip(segments in prop::collection::vec(segment_strategy(), 1..6)) {
        let ns = NamespaceRoot::new("ns").unwrap();
        let relative = segments.join("/");
        let key = to_key(&ns, &relative, false);
        prop_assert!(!key.ends_with('/'));
        prop_assert_eq!(to_local_relative(&ns, &key), Some(relative.as_str()));
    }

    /// Directory keys end with the separator and map back without it.
    #[test]
    fn directory_key_roundtrip(segments in prop::collection::vec(segment_strategy(), 1..6)) {
        let ns = NamespaceRoot::new("ns").unwrap();
        let relative = segments.join("/");
        let key = to_key(&ns, &relative, true);
        prop_assert!(key.ends_with('/'));
        prop_assert_eq!(to_local_relative(&ns, &key), Some(relative.as_str()));
    }
}

#[test]
fn documented_roundtrip() {
    let ns = NamespaceRoot::new("ns").unwrap();
    let key = to_key(&ns, "a/b/c.txt", false);
    assert_eq!(key, "ns/a/b/c.txt");
    assert_eq!(to_local_relative(&ns, &key), Some("a/b/c.txt"));
}

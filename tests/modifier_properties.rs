// tests/modifier_properties.rs

use proptest::prelude::*;
use scipipe::template::Modifier;
use scipipe::template::modifier::{basename, dirname};

proptest! {
    #[test]
    fn basename_never_contains_a_slash(path in "[a-z/._-]{0,40}") {
        prop_assert!(!basename(&path).contains('/'));
    }

    #[test]
    fn trim_suffix_undoes_appending_it(stem in "[a-z0-9_]{0,20}", ext in "\\.[a-z]{1,5}") {
        let m = Modifier::TrimSuffix(ext.clone());
        prop_assert_eq!(m.apply(&format!("{stem}{ext}")), stem);
    }

    #[test]
    fn trimmed_value_never_ends_with_the_suffix(
        value in "[a-z0-9_.]{0,30}",
        ext in "\\.[a-z]{1,3}",
        repeats in 0usize..4,
    ) {
        let input = format!("{value}{}", ext.repeat(repeats));
        let trimmed = Modifier::TrimSuffix(ext.clone()).apply(&input);

        prop_assert!(!trimmed.ends_with(&ext));
        // Only whole copies of the suffix were removed from the end.
        let removed = &input[trimmed.len()..];
        prop_assert!(input.starts_with(&trimmed));
        prop_assert_eq!(removed.len() % ext.len(), 0);
        prop_assert_eq!(removed, ext.repeat(removed.len() / ext.len()));
    }

    #[test]
    fn trim_suffix_without_match_is_identity(value in "[a-z]{0,20}", ext in "\\.[0-9]{1,3}") {
        let m = Modifier::TrimSuffix(ext);
        prop_assert_eq!(m.apply(&value), value);
    }

    #[test]
    fn dirname_and_basename_rebuild_the_path(dir in "(/[a-z]{1,8}){1,4}", file in "[a-z]{1,8}") {
        let path = format!("{dir}/{file}");
        prop_assert_eq!(format!("{}/{}", dirname(&path), basename(&path)), path);
    }
}

//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use scaffold_upgrade::core::generator::{version_label, Generator};
use scaffold_upgrade::core::metadata::{parse_document, render_document, ProjectMetadata};
use scaffold_upgrade::core::types::{BranchName, Oid, SemanticVersion, TargetVersion};

const NS: &str = "generator-jhipster";

/// Strategy for generating valid branch name characters.
fn branch_name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    prop::collection::vec(branch_name_char(), 1..50).prop_filter_map(
        "must be valid branch name",
        |chars| {
            let name: String = chars.into_iter().collect();
            let rejected = name.starts_with('-')
                || name.ends_with('/')
                || name.contains("..")
                || name.contains("//")
                || name
                    .split('/')
                    .any(|c| c.starts_with('.') || c.ends_with(".lock"));
            if rejected {
                None
            } else {
                Some(name)
            }
        },
    )
}

/// Strategy for generating valid hex OIDs.
fn valid_oid_string() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'A',
            'B', 'C', 'D', 'E', 'F',
        ]),
        40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy for pre-release identifiers.
fn pre_release() -> impl Strategy<Value = Option<String>> {
    prop::option::of(
        (
            prop::sample::select(vec!["alpha", "beta", "rc"]),
            prop::option::of(0u64..20),
        )
            .prop_map(|(tag, n)| match n {
                Some(n) => format!("{tag}.{n}"),
                None => tag.to_string(),
            }),
    )
}

/// Strategy for version strings with their numeric core.
fn version_parts() -> impl Strategy<Value = (u64, u64, u64, Option<String>)> {
    (0u64..1000, 0u64..1000, 0u64..1000, pre_release())
}

fn render(major: u64, minor: u64, patch: u64, pre: &Option<String>) -> String {
    match pre {
        Some(pre) => format!("{major}.{minor}.{patch}-{pre}"),
        None => format!("{major}.{minor}.{patch}"),
    }
}

proptest! {
    /// Any valid branch name is accepted and round-trips through serde.
    #[test]
    fn branch_name_serde_roundtrip(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(branch, parsed);
    }

    /// Branch refnames live under refs/heads.
    #[test]
    fn branch_name_to_refname(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        prop_assert_eq!(branch.refname(), format!("refs/heads/{name}"));
    }

    /// Names containing a space are always rejected.
    #[test]
    fn branch_name_with_space_rejected(prefix in valid_branch_name(), suffix in valid_branch_name()) {
        let name = format!("{prefix} {suffix}");
        prop_assert!(BranchName::new(name).is_err());
    }

    /// OIDs are stored lowercase.
    #[test]
    fn oid_normalized_to_lowercase(oid_str in valid_oid_string()) {
        let oid = Oid::new(&oid_str).unwrap();
        prop_assert_eq!(oid.as_str(), oid_str.to_lowercase());
    }

    /// Short OIDs are prefixes of the full OID.
    #[test]
    fn oid_short_is_prefix(oid_str in valid_oid_string(), len in 1usize..40) {
        let oid = Oid::new(&oid_str).unwrap();
        let short = oid.short(len);
        prop_assert_eq!(short.len(), len);
        prop_assert!(oid.as_str().starts_with(short));
    }

    /// Display reproduces the parsed string.
    #[test]
    fn version_display_matches_input((major, minor, patch, pre) in version_parts()) {
        let text = render(major, minor, patch, &pre);
        let version = SemanticVersion::parse(&text).unwrap();
        prop_assert_eq!(version.to_string(), text);
        prop_assert_eq!(version.major(), major);
        prop_assert_eq!(version.minor(), minor);
        prop_assert_eq!(version.patch(), patch);
        prop_assert_eq!(version.is_prerelease(), pre.is_some());
    }

    /// Release ordering follows the numeric core.
    #[test]
    fn release_order_follows_core(
        a in (0u64..50, 0u64..50, 0u64..50),
        b in (0u64..50, 0u64..50, 0u64..50),
    ) {
        let va = SemanticVersion::parse(&render(a.0, a.1, a.2, &None)).unwrap();
        let vb = SemanticVersion::parse(&render(b.0, b.1, b.2, &None)).unwrap();
        prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
    }

    /// A pre-release sorts below its release.
    #[test]
    fn prerelease_below_release(
        (major, minor, patch) in (0u64..1000, 0u64..1000, 0u64..1000),
        pre in pre_release().prop_filter("needs a pre-release", Option::is_some),
    ) {
        let release = SemanticVersion::parse(&render(major, minor, patch, &None)).unwrap();
        let candidate = SemanticVersion::parse(&render(major, minor, patch, &pre)).unwrap();
        prop_assert!(candidate < release);
    }

    /// Build metadata and a leading `v` do not affect equality.
    #[test]
    fn build_and_prefix_ignored_for_equality(
        (major, minor, patch, pre) in version_parts(),
        build in "[a-z0-9]{1,8}",
    ) {
        let plain = SemanticVersion::parse(&render(major, minor, patch, &pre)).unwrap();
        let decorated =
            SemanticVersion::parse(&format!("v{}+{build}", render(major, minor, patch, &pre)))
                .unwrap();
        prop_assert_eq!(plain, decorated);
    }

    /// `latest` in any case is the latest target; anything else must parse.
    #[test]
    fn target_version_parse((major, minor, patch, pre) in version_parts()) {
        let text = render(major, minor, patch, &pre);
        let target: TargetVersion = text.parse().unwrap();
        prop_assert_eq!(target.to_string(), text);
        prop_assert_eq!("LaTeSt".parse::<TargetVersion>().unwrap(), TargetVersion::Latest);
    }

    /// Placeholder mode never leaks a real version into history.
    #[test]
    fn placeholder_label_hides_version((major, minor, patch, pre) in version_parts()) {
        let version = SemanticVersion::parse(&render(major, minor, patch, &pre)).unwrap();
        prop_assert_eq!(version_label(Some(&version), true), "VERSION");
        let message = Generator::default().generation_message(&version_label(Some(&version), true));
        prop_assert_eq!(message, "Generated with JHipster VERSION");
    }

    /// Writing the generator entry keeps other namespaces and is stable.
    #[test]
    fn metadata_render_keeps_other_namespaces(
        base_name in "[a-zA-Z][a-zA-Z0-9]{0,15}",
        skip_client in any::<bool>(),
        (major, minor, patch, pre) in version_parts(),
    ) {
        let existing = r#"{ "other-tool": { "answer": 42 } }"#;
        let mut metadata = ProjectMetadata::new(base_name).with_flag("skipClient", skip_client);
        metadata.generator_version = Some(render(major, minor, patch, &pre));

        let rendered = render_document(Some(existing), NS, &metadata).unwrap();
        let again = render_document(Some(&rendered), NS, &metadata).unwrap();
        prop_assert_eq!(&rendered, &again);
        prop_assert!(rendered.contains("\"other-tool\""));

        let parsed = parse_document(&rendered, NS).unwrap().unwrap();
        prop_assert_eq!(parsed.flag("skipClient"), skip_client);
        prop_assert_eq!(parsed, metadata);
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    /// Test that branch name validation is consistent.
    #[test]
    fn branch_name_validation_consistent() {
        let test_cases = vec![
            ("main", true),
            ("jhipster_upgrade", true),
            ("feature/login", true),
            ("", false),
            ("@", false),
            ("-leading", false),
            ("trailing/", false),
            ("double..dot", false),
            ("a//b", false),
            (".hidden", false),
            ("refs/.hidden", false),
            ("branch.lock", false),
            ("has space", false),
            ("tilde~1", false),
            ("caret^", false),
            ("colon:x", false),
            ("reflog@{1}", false),
        ];

        for (name, expected) in test_cases {
            assert_eq!(
                BranchName::new(name).is_ok(),
                expected,
                "BranchName::new({:?}) expected {}",
                name,
                if expected { "valid" } else { "invalid" }
            );
        }
    }

    /// Test that version validation is consistent.
    #[test]
    fn version_validation_consistent() {
        let test_cases = vec![
            ("8.1.0", true),
            ("v8.1.0", true),
            ("8.0.0-rc.1", true),
            ("8.0.0+build.5", true),
            ("8.1", false),
            ("8.1.0.1", false),
            ("08.1.0", false),
            ("8.x.0", false),
            ("8.1.0-", false),
            ("8.1.0-rc..1", false),
            ("VERSION", false),
            ("", false),
        ];

        for (input, expected) in test_cases {
            assert_eq!(
                SemanticVersion::parse(input).is_ok(),
                expected,
                "SemanticVersion::parse({:?}) expected {}",
                input,
                if expected { "valid" } else { "invalid" }
            );
        }
    }
}

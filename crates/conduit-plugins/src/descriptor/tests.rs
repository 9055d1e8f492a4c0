//! Unit tests for descriptor compatibility checks.

use rstest::rstest;

use super::*;

fn ranged(min: &str, max: &str) -> PluginDescriptor {
    PluginDescriptor::new("filter", "1.0.0", 10).with_host_range(min, max)
}

#[rstest]
#[case::inside("1.0.0", "2.0.0", "1.4.2")]
#[case::at_min("1.0.0", "2.0.0", "1.0.0")]
#[case::at_max("1.0.0", "2.0.0", "2.0.0")]
#[case::no_min("", "2.0.0", "0.1.0")]
#[case::no_max("1.0.0", "", "9.0.0")]
#[case::unbounded("", "", "0.0.1")]
fn compatible_hosts_are_accepted(#[case] min: &str, #[case] max: &str, #[case] host: &str) {
    assert!(ranged(min, max).check_compatible(host).is_ok());
}

#[rstest]
#[case::below("1.0.0", "2.0.0", "0.9.9")]
#[case::above("1.0.0", "2.0.0", "2.0.1")]
#[case::above_open_min("", "1.5.0", "1.6.0")]
fn incompatible_hosts_are_rejected(#[case] min: &str, #[case] max: &str, #[case] host: &str) {
    let err = ranged(min, max).check_compatible(host).expect_err("must reject");
    assert!(matches!(err, PluginError::Incompatible { .. }), "got {err:?}");
}

#[test]
fn unbounded_side_is_displayed_as_wildcard() {
    let err = ranged("", "1.0.0").check_compatible("3.0.0").expect_err("must reject");
    assert_eq!(err.to_string(), "plugin 'filter' requires host *..=1.0.0, running 3.0.0");
}

#[rstest]
#[case::bad_min("one", "2.0.0", "1.0.0", "minimum host version")]
#[case::bad_max("1.0.0", "2.x", "1.0.0", "maximum host version")]
#[case::bad_host("1.0.0", "2.0.0", "latest", "host version")]
fn unparsable_versions_are_errors(
    #[case] min: &str,
    #[case] max: &str,
    #[case] host: &str,
    #[case] expected_field: &str,
) {
    let err = ranged(min, max).check_compatible(host).expect_err("must fail");
    match err {
        PluginError::InvalidVersion { field, .. } => assert_eq!(field, expected_field),
        other => panic!("expected InvalidVersion, got {other:?}"),
    }
}

#[test]
fn unavailable_descriptor_sinks_to_the_end() {
    let descriptor = PluginDescriptor::unavailable();
    assert!(descriptor.name.is_empty());
    assert!(descriptor.version.is_empty());
    assert_eq!(descriptor.priority, i32::MAX);
}

#[test]
fn host_version_is_inside_sample_range() {
    assert!(ranged("1.0.0", "2.0.0").check_compatible(HOST_VERSION).is_ok());
}

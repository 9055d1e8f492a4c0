//! Tests for the shared plugin helpers and in-process scenarios.


use conduit_plugins::Plugin;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{BUILD_TIME, MessageFilter, load_config};

#[test]
fn rejected_configuration_is_reported_and_replaced_by_defaults() {
    let mut diagnostics = Vec::new();

    let config = load_config(
        ["plugin-filter", "--parallel-downloads", "plenty"],
        &mut diagnostics,
    );

    assert_eq!(config, conduit_config::Config::default());
    let report = String::from_utf8(diagnostics).expect("utf-8 diagnostics");
    assert!(
        report.starts_with("configuration rejected, using defaults:"),
        "unexpected report: {report}"
    );
}

#[test]
fn build_stamp_is_rfc3339() {
    OffsetDateTime::parse(BUILD_TIME, &Rfc3339).expect("build stamp parses");
}

#[test]
fn descriptors_carry_a_fixed_build_stamp() {
    let first = MessageFilter.describe().build_time;
    let second = MessageFilter.describe().build_time;
    assert_eq!(first, second);
    assert_eq!(first, BUILD_TIME);
}

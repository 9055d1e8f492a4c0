//! Tests for the process-backed handle, using small shell plugins.

use std::process::Command;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::*;
use crate::event::Event;

const GRACE: Duration = Duration::from_millis(100);

const SHELL_PLUGIN: &str = r#"
while IFS= read -r line; do
  case "$line" in
    *'"op":"describe"'*) echo '{"kind":"descriptor","descriptor":{"name":"shell","version":"1.0.0","priority":7}}' ;;
    *'"op":"decide"'*) echo '{"kind":"decision","decision":{"should_execute":true,"reason":"always"}}' ;;
    *'"op":"process"'*) echo '{"kind":"error","message":"nope"}' ;;
    *'"op":"shutdown"'*) exit 0 ;;
  esac
done
"#;

fn shell(script: &str) -> ProcessPluginHandle {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    ProcessPluginHandle::spawn_command("shell", command, GRACE).expect("spawn shell plugin")
}

#[fixture]
fn context() -> Context {
    Context::new(Event::message("test", "hello", "u", "c"))
}

#[rstest]
fn describe_reads_descriptor() {
    let mut handle = shell(SHELL_PLUGIN);
    let descriptor = handle.describe();
    assert_eq!(descriptor.name, "shell");
    assert_eq!(descriptor.priority, 7);
}

#[rstest]
fn decide_returns_plugin_verdict(context: Context) {
    let mut handle = shell(SHELL_PLUGIN);
    let decision = handle.decide(&context);
    assert!(decision.should_execute());
    assert_eq!(decision.reason(), "always");
}

#[rstest]
fn process_surfaces_remote_errors(context: Context) {
    let mut handle = shell(SHELL_PLUGIN);
    let err = handle.process(&context).expect_err("must fail");
    assert!(
        matches!(err, PluginError::Remote { ref message, .. } if message == "nope"),
        "got {err:?}"
    );
}

#[rstest]
fn exited_plugin_declines_and_describes_as_unavailable(context: Context) {
    let mut handle = shell("exit 0");
    let decision = handle.decide(&context);
    assert!(!decision.should_execute());
    assert!(!decision.reason().is_empty());
    assert_eq!(handle.describe(), PluginDescriptor::unavailable());
}

#[rstest]
fn wrong_reply_kind_is_unavailable() {
    let mut handle =
        shell(r#"read -r line; echo '{"kind":"decision","decision":{"should_execute":true,"reason":"x"}}'"#);
    assert_eq!(handle.describe().priority, i32::MAX);
}

#[rstest]
fn garbage_reply_is_a_process_error(context: Context) {
    let mut handle = shell("read -r line; echo 'not json'");
    let err = handle.process(&context).expect_err("must fail");
    assert!(matches!(err, PluginError::DeserializeReply { .. }), "got {err:?}");
}

#[rstest]
fn teardown_kills_unresponsive_plugin(context: Context) {
    let mut handle = shell("trap '' TERM; while true; do sleep 1; done");
    let started = Instant::now();
    handle.teardown();
    assert!(handle.is_torn_down());
    assert!(started.elapsed() < Duration::from_secs(5));

    let decision = handle.decide(&context);
    assert!(!decision.should_execute());
    assert!(decision.reason().contains("torn down"), "reason: {}", decision.reason());
}

#[rstest]
fn teardown_is_idempotent() {
    let mut handle = shell(SHELL_PLUGIN);
    handle.teardown();
    handle.teardown();
    assert!(handle.is_torn_down());
}

#[test]
fn spawn_failure_is_reported() {
    let plugin = DiscoveredPlugin::new("ghost", "/nonexistent/plugin-ghost");
    let err = ProcessPluginHandle::spawn(&plugin, GRACE).expect_err("must fail");
    assert!(matches!(err, PluginError::SpawnFailed { ref name, .. } if name == "ghost"));
}

//! Sample plugins demonstrating a media workflow.
//!
//! Three plugins cooperate through context properties:
//!
//! 1. [`MessageFilter`] (priority 10) reads the message and publishes
//!    `action`, `media_type` and `needs_upload`.
//! 2. [`MediaConverter`] (priority 30) acts when `action` is `convert` and
//!    publishes `file_path` and `conversion_complete`.
//! 3. [`S3Uploader`] (priority 50) acts when an upload was requested and a
//!    file exists, publishing `uploaded_url`.
//!
//! Each ships as a binary (`plugin-filter`, `plugin-converter`,
//! `plugin-uploader`) that speaks the host protocol over stdio via [`run`].

use std::ffi::OsString;
use std::io::{self, BufReader, Write};

use conduit_config::Config;
use ortho_config::OrthoConfig;
use conduit_plugins::{HOST_VERSION, Plugin, PluginDescriptor, ServeError, serve};
use time::OffsetDateTime;

pub mod converter;
pub mod filter;
pub mod uploader;

#[cfg(test)]
mod tests;

pub use self::converter::MediaConverter;
pub use self::filter::MessageFilter;
pub use self::uploader::S3Uploader;

const SAMPLE_TARGET: &str = "conduit_sample_plugins";

/// Oldest host the sample plugins support.
pub const MIN_HOST_VERSION: &str = "1.0.0";

/// Newest host the sample plugins support.
pub const MAX_HOST_VERSION: &str = "2.0.0";

/// RFC 3339 build stamp, fixed when the crate is compiled.
pub const BUILD_TIME: &str = env!("CONDUIT_BUILD_TIME");

/// Serves `plugin` on the process's stdin and stdout.
///
/// Telemetry is configured from `CONDUIT_*` environment variables and
/// written to stderr, leaving stdout to the protocol.
///
/// # Errors
///
/// Returns a [`ServeError`] when the host connection fails.
pub fn run<P: Plugin>(plugin: &P) -> Result<(), ServeError> {
    let config = load_config([env!("CARGO_PKG_NAME")], &mut io::stderr().lock());
    if let Err(error) = conduit_config::telemetry::initialise(&config) {
        writeln!(io::stderr().lock(), "telemetry disabled: {error}").ok();
    }
    tracing::debug!(
        target: SAMPLE_TARGET,
        plugin = %plugin.describe().name,
        host = HOST_VERSION,
        "serving plugin"
    );
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    serve(plugin, &mut reader, &mut writer)
}

/// Loads configuration from `args` and `CONDUIT_*` variables.
///
/// A configuration that fails to load is reported on `diagnostics` and
/// replaced by the defaults, so a bad variable never stops a plugin from
/// answering its host.
fn load_config<I, W>(args: I, diagnostics: &mut W) -> Config
where
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
    W: Write,
{
    Config::load_from_iter(args).unwrap_or_else(|error| {
        writeln!(diagnostics, "configuration rejected, using defaults: {error}").ok();
        Config::default()
    })
}

/// Builds the descriptor shared by the sample plugins.
fn descriptor(name: &str, priority: i32, description: &str) -> PluginDescriptor {
    PluginDescriptor::new(name, env!("CARGO_PKG_VERSION"), priority)
        .with_host_range(MIN_HOST_VERSION, MAX_HOST_VERSION)
        .with_description(description)
        .with_build_time(BUILD_TIME)
}

/// Seconds since the Unix epoch.
fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

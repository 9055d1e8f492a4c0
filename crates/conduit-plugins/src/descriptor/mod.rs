//! Static identity and compatibility facts about a plugin.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Version of this host, checked against each plugin's declared range.
pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity, compatibility range and scheduling priority of a plugin.
///
/// Read once per loaded handle and cached by the pipeline for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Build timestamp, free-form.
    #[serde(default)]
    pub build_time: String,
    /// Lowest compatible host version; empty means unbounded.
    #[serde(default)]
    pub min_host_version: String,
    /// Highest compatible host version; empty means unbounded.
    #[serde(default)]
    pub max_host_version: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Scheduling key; lower runs earlier.
    pub priority: i32,
}

impl PluginDescriptor {
    /// Creates a descriptor with an unbounded compatibility range.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build_time: String::new(),
            min_host_version: String::new(),
            max_host_version: String::new(),
            description: String::new(),
            priority,
        }
    }

    /// Descriptor reported for a plugin whose `describe` call failed.
    ///
    /// Name and version are empty and the priority is the numerically
    /// highest value so the plugin runs last.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(String::new(), String::new(), i32::MAX)
    }

    /// Sets the compatible host range.
    #[must_use]
    pub fn with_host_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_host_version = min.into();
        self.max_host_version = max.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the build timestamp.
    #[must_use]
    pub fn with_build_time(mut self, build_time: impl Into<String>) -> Self {
        self.build_time = build_time.into();
        self
    }

    /// Checks that `host` lies within the declared range.
    ///
    /// Empty bounds are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidVersion`] when a bound or the host
    /// version does not parse, and [`PluginError::Incompatible`] when the
    /// host falls outside the range.
    pub fn check_compatible(&self, host: &str) -> Result<(), PluginError> {
        let host_version = self.parse(host, "host version")?;
        let below_min = self
            .parse_bound(&self.min_host_version, "minimum host version")?
            .is_some_and(|min| host_version < min);
        let above_max = self
            .parse_bound(&self.max_host_version, "maximum host version")?
            .is_some_and(|max| host_version > max);

        if below_min || above_max {
            return Err(PluginError::Incompatible {
                name: self.name.clone(),
                host: host.to_owned(),
                min: display_bound(&self.min_host_version),
                max: display_bound(&self.max_host_version),
            });
        }
        Ok(())
    }

    fn parse_bound(&self, bound: &str, field: &'static str) -> Result<Option<Version>, PluginError> {
        if bound.trim().is_empty() {
            return Ok(None);
        }
        self.parse(bound, field).map(Some)
    }

    fn parse(&self, value: &str, field: &'static str) -> Result<Version, PluginError> {
        Version::parse(value.trim()).map_err(|source| PluginError::InvalidVersion {
            name: self.name.clone(),
            field,
            value: value.to_owned(),
            source,
        })
    }
}

fn display_bound(bound: &str) -> String {
    if bound.trim().is_empty() {
        String::from("*")
    } else {
        bound.to_owned()
    }
}

#[cfg(test)]
mod tests;

//! Locating plugin release artefacts.
//!
//! Releases are published on a GitHub-style host. Each plugin archive is
//! named `plugin-<name>_<version>_<os>_<arch>.tar.gz` and is looked up under
//! the plugin-specific tag `plugin-<name>-v<version>` first, then under the
//! repository-wide tag `v<version>`. A detached digest lives next to each
//! archive with a `.sha256` suffix.

use serde::Deserialize;

use crate::error::InstallError;

/// Host serving release downloads.
pub const DEFAULT_BASE_URL: &str = "https://github.com";

/// Host serving the releases API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Version keyword resolved through the releases API.
pub const LATEST: &str = "latest";

/// File name prefix shared by every plugin executable.
pub(crate) const PLUGIN_PREFIX: &str = "plugin-";

/// Operating system and architecture as they appear in archive names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Builds a platform from release-name spellings such as `linux` and
    /// `amd64`.
    #[must_use]
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        Self::new(
            release_os(std::env::consts::OS),
            release_arch(std::env::consts::ARCH),
        )
    }

    /// Operating system component.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Architecture component.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

fn release_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn release_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// Builds download URLs for a release repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLocator {
    repository: String,
    base_url: String,
    api_url: String,
}

impl ReleaseLocator {
    /// Creates a locator for `owner/name` on the default hosts.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
        }
    }

    /// Overrides the download host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Overrides the API host.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Repository in `owner/name` form.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// URLs to try, in order, for the archive of `name` at `version`.
    #[must_use]
    pub fn candidate_urls(&self, name: &str, version: &str, platform: &Platform) -> Vec<String> {
        let archive = archive_name(name, version, platform);
        let short = short_name(name);
        [format!("{PLUGIN_PREFIX}{short}-v{version}"), format!("v{version}")]
            .into_iter()
            .map(|tag| {
                format!(
                    "{}/{}/releases/download/{tag}/{archive}",
                    self.base_url, self.repository
                )
            })
            .collect()
    }

    /// URL of the releases API entry for the newest release.
    #[must_use]
    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/releases/latest", self.api_url, self.repository)
    }
}

/// Archive file name for `name` at `version`.
#[must_use]
pub fn archive_name(name: &str, version: &str, platform: &Platform) -> String {
    format!(
        "{PLUGIN_PREFIX}{}_{version}_{}_{}.tar.gz",
        short_name(name),
        platform.os(),
        platform.arch()
    )
}

/// URL of the detached digest for `archive_url`.
#[must_use]
pub fn checksum_url(archive_url: &str) -> String {
    format!("{archive_url}.sha256")
}

/// Plugin name without the `plugin-` prefix.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.strip_prefix(PLUGIN_PREFIX).unwrap_or(name)
}

/// Plugin name with the `plugin-` prefix.
#[must_use]
pub fn executable_name(name: &str) -> String {
    format!("{PLUGIN_PREFIX}{}", short_name(name))
}

/// Normalises a requested version.
///
/// Range operators (`^`, `~`, `>=`, `>`, `<=`, `<`, `=`) are dropped so the
/// bound itself is fetched. An empty request or `*` means [`LATEST`].
#[must_use]
pub fn parse_version_spec(spec: &str) -> String {
    let trimmed = spec.trim();
    let bare = [">=", "<=", "^", "~", ">", "<", "="]
        .iter()
        .find_map(|operator| trimmed.strip_prefix(operator))
        .unwrap_or(trimmed)
        .trim();
    if bare.is_empty() || bare == "*" || bare.eq_ignore_ascii_case(LATEST) {
        LATEST.to_owned()
    } else {
        bare.trim_start_matches('v').to_owned()
    }
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Extracts the version from a releases API response.
///
/// Accepts both `v1.2.3` and `plugin-<name>-v1.2.3` tags.
///
/// # Errors
///
/// Returns [`InstallError::LatestRelease`] when the body is not a release
/// object or the tag carries no version.
pub fn parse_latest_release(body: &str) -> Result<String, InstallError> {
    let release: LatestRelease =
        serde_json::from_str(body).map_err(|err| InstallError::LatestRelease {
            reason: err.to_string(),
        })?;
    let tag = release.tag_name.trim();
    let version = tag
        .rsplit_once("-v")
        .map_or_else(|| tag.trim_start_matches('v'), |(_, version)| version);
    if version.is_empty() {
        return Err(InstallError::LatestRelease {
            reason: format!("tag '{tag}' does not name a version"),
        });
    }
    Ok(version.to_owned())
}

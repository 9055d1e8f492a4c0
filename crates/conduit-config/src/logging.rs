//! Log output formats accepted by `log_format`.
//!
//! Parsing ignores case, so `JSON`, `json` and `Json` all select
//! [`LogFormat::Json`].

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log events are rendered on stderr.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event. Hosts collecting plugin stderr
    /// can parse it line by line.
    #[default]
    Json,
    /// Compact text for people watching a terminal.
    Compact,
}

/// Returned when `log_format` names neither `json` nor `compact`.
pub type LogFormatParseError = strum::ParseError;

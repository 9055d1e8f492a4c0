//! Simulated media conversion.

use std::collections::BTreeMap;

use conduit_plugins::{
    Context, ExecutionDecision, Plugin, PluginDescriptor, ProcessFailure, PropertyValue, Response,
};

use crate::{descriptor, unix_now};

/// Name reported by [`MediaConverter`].
pub const NAME: &str = "media-converter";

const PRIORITY: i32 = 30;

/// Converts the media named by earlier plugins and publishes the output
/// path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaConverter;

impl Plugin for MediaConverter {
    fn describe(&self) -> PluginDescriptor {
        descriptor(
            NAME,
            PRIORITY,
            "Converts media files (video/image) to optimized formats",
        )
    }

    fn decide(&self, context: &Context) -> ExecutionDecision {
        let properties = context.properties();
        if properties.get_str("action") != Some("convert") {
            return ExecutionDecision::decline("No conversion action required");
        }
        let Some(media) = properties.get("media_type") else {
            return ExecutionDecision::decline("No media type specified");
        };
        match media.as_str() {
            Some(kind @ ("video" | "image")) => {
                ExecutionDecision::accept(format!("Ready to convert {kind}"))
            }
            Some(kind) => ExecutionDecision::decline(format!("Cannot convert media type: {kind}")),
            None => ExecutionDecision::decline("Cannot convert media type: not text"),
        }
    }

    fn process(&self, mut context: Context) -> Result<Context, ProcessFailure> {
        let media = context
            .properties()
            .get_str("media_type")
            .map(str::to_owned)
            .ok_or_else(|| ProcessFailure::new("media_type is not set"))?;
        let (file_path, details) = convert(&media, unix_now());

        context.set("file_path", file_path.as_str());
        context.set("conversion_complete", true);
        context.set("conversion_details", details.clone());

        let mut response = Response::new(
            NAME,
            "conversion",
            format!("{media} converted successfully to {file_path}"),
        );
        response.data = details;
        context.push_response(response);
        Ok(context)
    }
}

/// Output path and format details for converting `media` at `timestamp`.
fn convert(media: &str, timestamp: i64) -> (String, BTreeMap<String, PropertyValue>) {
    let entries: &[(&str, &str)] = if media == "video" {
        &[
            ("format", "mp4"),
            ("codec", "h264"),
            ("resolution", "1920x1080"),
            ("duration", "120s"),
        ]
    } else {
        &[
            ("format", "jpeg"),
            ("quality", "95"),
            ("resolution", "1920x1080"),
        ]
    };
    let extension = if media == "video" { "mp4" } else { "jpg" };
    let details = entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), PropertyValue::from(*value)))
        .collect();
    (format!("/tmp/converted_{timestamp}.{extension}"), details)
}

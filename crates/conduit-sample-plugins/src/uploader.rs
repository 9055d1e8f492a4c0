//! Simulated object-store upload.

use conduit_plugins::{Context, ExecutionDecision, Plugin, PluginDescriptor, ProcessFailure, Response};

use crate::{descriptor, unix_now};

/// Name reported by [`S3Uploader`].
pub const NAME: &str = "s3-uploader";

const PRIORITY: i32 = 50;
const SIMULATED_SIZE_BYTES: i64 = 50 * 1024;

/// Uploads the file produced by earlier plugins and publishes its URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Uploader;

impl Plugin for S3Uploader {
    fn describe(&self) -> PluginDescriptor {
        descriptor(NAME, PRIORITY, "Uploads files to S3 when needed")
    }

    fn decide(&self, context: &Context) -> ExecutionDecision {
        let properties = context.properties();
        if properties.get_bool("needs_upload") != Some(true) {
            return ExecutionDecision::decline("Upload not required");
        }
        if !properties.contains_key("file_path") {
            return ExecutionDecision::decline("No file to upload");
        }
        ExecutionDecision::accept("File ready for upload")
    }

    fn process(&self, mut context: Context) -> Result<Context, ProcessFailure> {
        let file_path = context
            .properties()
            .get_str("file_path")
            .unwrap_or_default()
            .to_owned();
        let timestamp = unix_now();
        let url = upload_url(timestamp, &file_path);

        context.set("uploaded_url", url.as_str());
        context.set("upload_timestamp", timestamp);
        context.push_response(
            Response::new(NAME, "upload", format!("File uploaded successfully to {url}"))
                .with_data("url", url.as_str())
                .with_data("original", file_path)
                .with_data("size_bytes", SIMULATED_SIZE_BYTES)
                .with_data("mime_type", "video/mp4"),
        );
        Ok(context)
    }
}

fn upload_url(timestamp: i64, file_path: &str) -> String {
    format!("https://s3.example.com/uploads/{timestamp}/{file_path}")
}

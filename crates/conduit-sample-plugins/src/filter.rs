//! Message classification.

use conduit_plugins::{
    Context, EventType, ExecutionDecision, Plugin, PluginDescriptor, ProcessFailure, Response,
};

use crate::{descriptor, unix_now};

/// Name reported by [`MessageFilter`].
pub const NAME: &str = "message-filter";

const PRIORITY: i32 = 10;
const KEYWORDS: [&str; 4] = ["convert", "upload", "process", "help"];

/// Detects what a chat message asks for and records it as properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFilter;

impl Plugin for MessageFilter {
    fn describe(&self) -> PluginDescriptor {
        descriptor(NAME, PRIORITY, "Filters and categorizes incoming messages")
    }

    fn decide(&self, context: &Context) -> ExecutionDecision {
        if context.event().kind() != EventType::Message {
            return ExecutionDecision::decline("Not a message event");
        }
        let content = context.event().content().to_lowercase();
        if KEYWORDS.iter().any(|keyword| content.contains(keyword)) {
            ExecutionDecision::accept("Message contains actionable keyword")
        } else {
            ExecutionDecision::decline("No actionable keywords found")
        }
    }

    fn process(&self, mut context: Context) -> Result<Context, ProcessFailure> {
        let content = context.event().content().to_lowercase();
        if content.contains("convert") {
            context.set("action", "convert");
            if content.contains("video") {
                context.set("media_type", "video");
            } else if content.contains("image") {
                context.set("media_type", "image");
            }
        }
        if content.contains("upload") {
            context.set("needs_upload", true);
        }

        let mut response = Response::new(NAME, "status", "Message filtered and categorized")
            .with_data("timestamp", unix_now());
        if let Some(action) = context.properties().get_str("action") {
            response = response.with_data("detected_action", action);
        }
        context.push_response(response);
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use conduit_plugins::Event;
    use rstest::rstest;

    use super::*;

    fn message(content: &str) -> Context {
        Context::new(Event::message("test", content, "u-1", "general"))
    }

    #[rstest]
    #[case::convert("Please CONVERT this", true)]
    #[case::upload("upload my file", true)]
    #[case::process("process the batch", true)]
    #[case::help("help!", true)]
    #[case::chatter("good morning", false)]
    fn reacts_to_keywords(#[case] content: &str, #[case] expected: bool) {
        assert_eq!(
            MessageFilter.decide(&message(content)).should_execute(),
            expected
        );
    }

    #[test]
    fn ignores_commands() {
        let context = Context::new(Event::command("cli", "convert video", "u-1", "general"));
        let decision = MessageFilter.decide(&context);
        assert!(!decision.should_execute());
        assert_eq!(decision.reason(), "Not a message event");
    }

    #[rstest]
    #[case::video("convert this video", Some("video"))]
    #[case::image("convert this image", Some("image"))]
    #[case::unknown("convert this", None)]
    fn detects_media_type(#[case] content: &str, #[case] media: Option<&str>) {
        let context = MessageFilter.process(message(content)).expect("process");
        assert_eq!(context.properties().get_str("action"), Some("convert"));
        assert_eq!(context.properties().get_str("media_type"), media);
    }

    #[test]
    fn flags_uploads_and_reports_status() {
        let context = MessageFilter
            .process(message("upload the report"))
            .expect("process");
        assert_eq!(context.properties().get_bool("needs_upload"), Some(true));
        assert!(!context.properties().contains_key("action"));

        let response = context.responses().first().expect("status response");
        assert_eq!(response.plugin_name, NAME);
        assert_eq!(response.kind, "status");
        assert!(response.data.contains_key("timestamp"));
        assert!(!response.data.contains_key("detected_action"));
    }

    #[test]
    fn describes_itself() {
        let descriptor = MessageFilter.describe();
        assert_eq!(descriptor.name, NAME);
        assert_eq!(descriptor.priority, 10);
        assert_eq!(descriptor.min_host_version, "1.0.0");
        assert_eq!(descriptor.max_host_version, "2.0.0");
        assert!(!descriptor.build_time.is_empty());
    }
}

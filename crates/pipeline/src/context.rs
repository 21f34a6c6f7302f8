//! Conversation context windowing.
//!
//! Completion calls that need history see only the tail of the transcript,
//! rendered one `"<speaker>: <content>"` line per message. The cut-off is a
//! hard message count, not a token estimate.

use crate::Message;

/// Default number of trailing messages included in a context window.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

/// Renders at most the last `window` messages as speaker-prefixed lines.
///
/// Returns an empty string for an empty transcript or a zero window.
pub fn render_context(messages: &[Message], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.speaker(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Agent, Phase};

    #[test]
    fn test_renders_speakers() {
        let agent = Agent::new("Writer", "copy", "Write.");
        let messages = vec![
            Message::user("Draft a tagline"),
            Message::from_agent(&agent, "Fresh ideas daily", Phase::Execution),
        ];

        assert_eq!(
            render_context(&messages, DEFAULT_CONTEXT_WINDOW),
            "User: Draft a tagline\nWriter: Fresh ideas daily"
        );
    }

    #[test]
    fn test_keeps_only_the_tail() {
        let messages: Vec<Message> = (0..12).map(|i| Message::user(format!("m{i}"))).collect();
        let context = render_context(&messages, 10);

        assert!(!context.contains("User: m0\n"));
        assert!(!context.contains("User: m1\n"));
        assert!(context.starts_with("User: m2"));
        assert!(context.ends_with("User: m11"));
        assert_eq!(context.lines().count(), 10);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(render_context(&[], 10), "");
        assert_eq!(render_context(&[Message::user("x")], 0), "");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the window never renders more lines than requested.
            #[test]
            fn prop_window_is_bounded(count in 0usize..40, window in 0usize..15) {
                let messages: Vec<Message> =
                    (0..count).map(|i| Message::user(format!("line {i}"))).collect();
                let rendered = render_context(&messages, window);
                let lines = if rendered.is_empty() { 0 } else { rendered.lines().count() };
                prop_assert_eq!(lines, count.min(window));
            }
        }
    }
}

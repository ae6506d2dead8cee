//! Conversation state for the companion widget.

use serde::{Deserialize, Serialize};

/// Chat message role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered chat transcript, insertion order = display order.
///
/// Messages are immutable once appended, except the reply currently being
/// streamed: at most one message is in progress at a time, and it is always
/// the last element, with role assistant. It grows by [`apply_delta`] until
/// [`finish_assistant`] seals it.
///
/// [`apply_delta`]: Conversation::apply_delta
/// [`finish_assistant`]: Conversation::finish_assistant
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    streaming: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation seeded with a system prompt.
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
            streaming: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether an assistant reply is currently being streamed.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Append a finished user message, sealing any in-progress reply first.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.finish_assistant();
        self.messages.push(Message::user(content));
    }

    /// Fold one streamed delta into the transcript.
    ///
    /// The first delta of a reply starts a new assistant message; later
    /// deltas append to it. Empty deltas are ignored.
    pub fn apply_delta(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        if self.streaming
            && let Some(last) = self.messages.last_mut()
        {
            last.content.push_str(delta);
            return;
        }
        self.messages.push(Message::assistant(delta));
        self.streaming = true;
    }

    /// Seal the in-progress reply. Idempotent.
    pub fn finish_assistant(&mut self) {
        self.streaming = false;
    }

    /// Text of the reply currently being streamed, if any.
    pub fn in_progress(&self) -> Option<&str> {
        if self.streaming {
            self.messages.last().map(|m| m.content.as_str())
        } else {
            None
        }
    }

    /// Content of the most recent assistant message.
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_deltas_equals_pushing_whole_text() {
        let mut folded = Conversation::new();
        folded.push_user("question");
        for delta in ["He", "l", "lo"] {
            folded.apply_delta(delta);
        }
        folded.finish_assistant();

        let mut whole = Conversation::new();
        whole.push_user("question");
        whole.apply_delta("Hello");
        whole.finish_assistant();

        assert_eq!(folded.messages(), whole.messages());
    }

    #[test]
    fn in_progress_reply_is_always_the_last_assistant_message() {
        let mut conversation = Conversation::with_system_prompt("tutor");
        conversation.push_user("hi");
        assert!(conversation.in_progress().is_none());

        conversation.apply_delta("He");
        assert!(conversation.is_streaming());
        assert_eq!(conversation.in_progress(), Some("He"));
        assert_eq!(conversation.messages().last().map(|m| m.role), Some(Role::Assistant));

        conversation.apply_delta("llo");
        assert_eq!(conversation.in_progress(), Some("Hello"));

        conversation.finish_assistant();
        assert!(conversation.in_progress().is_none());
        assert_eq!(conversation.last_assistant(), Some("Hello"));
    }

    #[test]
    fn push_user_seals_a_dangling_reply() {
        let mut conversation = Conversation::new();
        conversation.push_user("one");
        conversation.apply_delta("partial");
        conversation.push_user("two");

        assert!(!conversation.is_streaming());
        conversation.apply_delta("fresh");
        assert_eq!(conversation.in_progress(), Some("fresh"));
        assert_eq!(conversation.len(), 4);
    }

    #[test]
    fn empty_delta_does_not_open_a_reply() {
        let mut conversation = Conversation::new();
        conversation.apply_delta("");
        assert!(conversation.is_empty());
        assert!(!conversation.is_streaming());
    }

    #[test]
    fn consecutive_replies_stay_separate() {
        let mut conversation = Conversation::new();
        conversation.push_user("q1");
        conversation.apply_delta("a1");
        conversation.finish_assistant();
        conversation.push_user("q2");
        conversation.apply_delta("a2");
        conversation.finish_assistant();

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
    }
}

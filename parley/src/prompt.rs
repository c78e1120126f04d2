use indoc::formatdoc;

use crate::Message;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[must_use]
pub fn system_prompt(context: &str) -> String {
    if context.is_empty() {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    }

    formatdoc!(
        "You are a helpful assistant that answers some questions with the help of some context data.

        Here is the context data:

        {context}"
    )
}

/// Prepends the system prompt to the caller's conversation.
#[must_use]
pub fn build_messages(context: Option<&str>, messages: &[Message]) -> Vec<Message> {
    let mut prompt = Vec::with_capacity(messages.len() + 1);
    prompt.push(Message::system(system_prompt(context.unwrap_or_default())));
    prompt.extend_from_slice(messages);

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn falls_back_to_default_prompt() {
        let conversation = vec![
            Message::user("Hi"),
            Message::assistant("Hello! How can I help?"),
            Message::user("Tell me a joke"),
        ];

        let prompt = build_messages(None, &conversation);

        assert_eq!(prompt.len(), conversation.len() + 1);
        assert_eq!(prompt[0], Message::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(&prompt[1..], conversation.as_slice());
    }

    #[test]
    fn empty_context_uses_default_prompt() {
        let prompt = build_messages(Some(""), &[Message::user("Hi")]);

        assert_eq!(prompt[0].content, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn injects_context_verbatim() {
        let context = "Tents are waterproof.\n------\nBoots run small.";
        let prompt = build_messages(Some(context), &[Message::user("Which tent?")]);

        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains(context));
        assert!(prompt[0]
            .content
            .starts_with("You are a helpful assistant that answers some questions"));
        assert_eq!(prompt[1], Message::user("Which tent?"));
    }
}

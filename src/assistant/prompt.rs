use crate::models::chat::{ ChatMessage, Conversation, ConversationError };

/// Builds the request for a new user message: the system instruction, every settled
/// turn as a user/assistant pair, then the new message.
///
/// A conversation whose last turn is still streaming cannot be fed back.
pub fn build_messages(
    conversation: &Conversation,
    system_prompt: &str,
    new_message: &str
) -> Result<Vec<ChatMessage>, ConversationError> {
    if conversation.is_pending() {
        return Err(ConversationError::TurnPending);
    }

    let mut messages = Vec::with_capacity(conversation.settled_turns().len() * 2 + 2);
    messages.push(ChatMessage::system(system_prompt));
    for turn in conversation.settled_turns() {
        messages.push(ChatMessage::user(turn.user.clone()));
        messages.push(ChatMessage::assistant(turn.reply_text()));
    }
    messages.push(ChatMessage::user(new_message));
    Ok(messages)
}

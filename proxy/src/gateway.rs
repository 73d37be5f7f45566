//! Stateless shape converters between the chat APIs and the bridge: a
//! conversation flattens to one prompt, a reply wraps into the expected
//! response envelope.

use openlink_types::{
    AnthropicUsage, ChatChoice, ChatMessage, ChatResponse, ChatUsage, ContentBlock,
    MessagesRequest, MessagesResponse,
};

const DEFAULT_MODEL: &str = "browser-proxy";

/// Reduce a conversation to a single text block, one `[Role]: content`
/// paragraph per message. Multi-turn history collapses into one prompt; the
/// web UI on the other side cannot distinguish turns.
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let role = match message.role.as_str() {
            "system" => "System",
            "user" => "User",
            "assistant" => "Assistant",
            other => other,
        };
        prompt.push('[');
        prompt.push_str(role);
        prompt.push_str("]: ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.trim_end().to_string()
}

/// Anthropic requests carry the system prompt out-of-band; fold it in as a
/// leading synthetic system message.
pub fn anthropic_prompt(request: &MessagesRequest) -> String {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system.clone(),
        });
    }
    for message in &request.messages {
        messages.push(ChatMessage {
            role: message.role.clone(),
            content: message.content.clone(),
        });
    }
    flatten_messages(&messages)
}

fn model_or_default(model: &str) -> String {
    if model.is_empty() {
        DEFAULT_MODEL.to_string()
    } else {
        model.to_string()
    }
}

pub fn openai_response(request_id: &str, model: &str, reply: &str) -> ChatResponse {
    ChatResponse {
        id: format!("chatcmpl-{request_id}"),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model_or_default(model),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: reply.to_string(),
            },
            finish_reason: "stop".to_string(),
        }],
        usage: ChatUsage::default(),
    }
}

pub fn anthropic_response(request_id: &str, model: &str, reply: &str) -> MessagesResponse {
    MessagesResponse {
        id: format!("msg_{request_id}"),
        kind: "message".to_string(),
        role: "assistant".to_string(),
        content: vec![ContentBlock {
            kind: "text".to_string(),
            text: reply.to_string(),
        }],
        model: model_or_default(model),
        stop_reason: "end_turn".to_string(),
        stop_sequence: None,
        usage: AnthropicUsage::default(),
    }
}

//! Conversation-related types.

use grounded_agent_model::{
    AssistantMessage, ModelMessage, ToolCallRequest, ToolCallResult,
};

/// Represents the conversation of a single run.
///
/// Items are only ever appended, in the order they happened.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

impl Conversation {
    /// Returns all items, oldest first.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the conversation has no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }
}

/// The author of a conversation item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The system message with instructions and the schema.
    System,
    /// The question.
    User,
    /// A planner output.
    Assistant,
    /// A tool result.
    Tool,
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub struct Item {
    pub(crate) msg: ModelMessage,
}

impl Item {
    pub(crate) fn system(text: String) -> Self {
        Self {
            msg: ModelMessage::System(text),
        }
    }

    pub(crate) fn user(text: String) -> Self {
        Self {
            msg: ModelMessage::User(text),
        }
    }

    pub(crate) fn assistant(
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            msg: ModelMessage::Assistant(AssistantMessage {
                content,
                tool_calls,
            }),
        }
    }

    pub(crate) fn tool(id: String, content: String) -> Self {
        Self {
            msg: ModelMessage::Tool(ToolCallResult { id, content }),
        }
    }

    /// Returns the author of this item.
    pub fn role(&self) -> Role {
        match &self.msg {
            ModelMessage::System(_) => Role::System,
            ModelMessage::User(_) => Role::User,
            ModelMessage::Assistant(_) => Role::Assistant,
            ModelMessage::Tool(_) => Role::Tool,
        }
    }

    /// Returns the transcript of this item.
    ///
    /// For assistant items this is only the text content, the requested
    /// tool calls are available from [`Item::tool_calls`].
    pub fn transcript(&self) -> &str {
        match &self.msg {
            ModelMessage::System(text) | ModelMessage::User(text) => text,
            ModelMessage::Assistant(msg) => &msg.content,
            ModelMessage::Tool(result) => &result.content,
        }
    }

    /// Returns the tool calls requested by an assistant item.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.msg {
            ModelMessage::Assistant(msg) => &msg.tool_calls,
            _ => &[],
        }
    }

    /// Returns the id of the call a tool item answers.
    pub fn tool_call_id(&self) -> Option<&str> {
        match &self.msg {
            ModelMessage::Tool(result) => Some(&result.id),
            _ => None,
        }
    }
}

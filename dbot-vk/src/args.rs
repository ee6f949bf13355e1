//! Listener argument shapes for VK events.

use serde_json::Value;

use crate::types::{ClientInfo, Message};
use crate::users::UserResolver;

/// `message`, `message_reply`, `message_edit`. `capability` is only sent with new messages.
#[derive(Debug, Clone, PartialEq)]
pub struct VkMessageArgs {
    pub message: Message,
    pub capability: Option<ClientInfo>,
    pub sender: UserResolver,
}

/// `message_allow`, `message_deny`: the raw event object and the user it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct VkUserEventArgs {
    pub event: Value,
    pub user: UserResolver,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VkArgument {
    Message(VkMessageArgs),
    UserEvent(VkUserEventArgs),
}

impl VkArgument {
    pub fn as_message(&self) -> Option<&VkMessageArgs> {
        match self {
            VkArgument::Message(args) => Some(args),
            VkArgument::UserEvent(_) => None,
        }
    }

    pub fn as_user_event(&self) -> Option<&VkUserEventArgs> {
        match self {
            VkArgument::UserEvent(args) => Some(args),
            VkArgument::Message(_) => None,
        }
    }
}

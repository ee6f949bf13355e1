//! Listener argument shapes, one per Telegram event kind.

use std::fmt;
use std::sync::Arc;

use dbot_core::{request_as, ApiTransport, DbotError, HandlerError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::types::{CallbackQuery, Chat, ChosenInlineResult, File, InlineQuery, Message, User};

/// Message plus its sender and chat, the argument of message-like events.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageArgs {
    pub message: Message,
    pub sender: Option<User>,
    pub chat: Chat,
}

impl MessageArgs {
    pub fn from_message(message: &Message) -> Self {
        Self {
            sender: message.from.clone(),
            chat: message.chat.clone(),
            message: message.clone(),
        }
    }
}

/// `bot_command` event: the literal command token and whether it opens the text.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMatch {
    pub args: MessageArgs,
    pub command: String,
    pub starts: bool,
}

/// `media` event payload: the highest-priority media field present and its raw value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaPayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub object: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaMatch {
    pub args: MessageArgs,
    pub media: MediaPayload,
}

/// Resolves a file's download URL on demand. Nothing is requested until [`resolve`] is awaited.
///
/// [`resolve`]: FileUrlResolver::resolve
#[derive(Clone)]
pub struct FileUrlResolver {
    api: Arc<dyn ApiTransport>,
    file_base: Arc<str>,
    file_id: Option<String>,
}

impl fmt::Debug for FileUrlResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUrlResolver")
            .field("file_id", &self.file_id)
            .finish()
    }
}

impl PartialEq for FileUrlResolver {
    fn eq(&self, other: &Self) -> bool {
        self.file_id == other.file_id && self.file_base == other.file_base
    }
}

impl FileUrlResolver {
    pub fn new(api: Arc<dyn ApiTransport>, file_base: Arc<str>, file_id: Option<String>) -> Self {
        Self {
            api,
            file_base,
            file_id,
        }
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    /// Calls `getFile` for this file.
    pub async fn file(&self) -> Result<File> {
        let file_id = self
            .file_id
            .as_deref()
            .ok_or(HandlerError::MissingField("file_id"))?;
        debug!(file_id = %file_id, "step: getFile");
        request_as(self.api.as_ref(), "getFile", json!({ "file_id": file_id })).await
    }

    /// Calls `getFile` and builds `{file_base}/{file_path}`.
    pub async fn resolve(&self) -> Result<String> {
        let file = self.file().await?;
        let path = file
            .file_path
            .ok_or_else(|| DbotError::Decode("getFile returned no file_path".into()))?;
        Ok(format!("{}/{}", self.file_base, path))
    }
}

/// Message carrying a downloadable file (photo, video, audio, voice, animation, sticker).
#[derive(Debug, Clone, PartialEq)]
pub struct FileMessage {
    pub args: MessageArgs,
    pub file: FileUrlResolver,
}

/// Argument handed to Telegram listeners. The variant is fixed per event kind; see
/// [`crate::TelegramEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum TelegramArgument {
    Message(MessageArgs),
    Post(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    Command(CommandMatch),
    File(FileMessage),
    Media(MediaMatch),
}

impl TelegramArgument {
    /// The underlying message args for message, command, file and media arguments.
    pub fn message_args(&self) -> Option<&MessageArgs> {
        match self {
            TelegramArgument::Message(args) => Some(args),
            TelegramArgument::Command(c) => Some(&c.args),
            TelegramArgument::File(f) => Some(&f.args),
            TelegramArgument::Media(m) => Some(&m.args),
            TelegramArgument::Post(_)
            | TelegramArgument::CallbackQuery(_)
            | TelegramArgument::InlineQuery(_)
            | TelegramArgument::ChosenInlineResult(_) => None,
        }
    }

    pub fn as_command(&self) -> Option<&CommandMatch> {
        match self {
            TelegramArgument::Command(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaMatch> {
        match self {
            TelegramArgument::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileMessage> {
        match self {
            TelegramArgument::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&Message> {
        match self {
            TelegramArgument::Post(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_callback_query(&self) -> Option<&CallbackQuery> {
        match self {
            TelegramArgument::CallbackQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_inline_query(&self) -> Option<&InlineQuery> {
        match self {
            TelegramArgument::InlineQuery(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_chosen_inline_result(&self) -> Option<&ChosenInlineResult> {
        match self {
            TelegramArgument::ChosenInlineResult(r) => Some(r),
            _ => None,
        }
    }
}

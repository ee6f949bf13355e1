//! Built-in Telegram classification rules.
//!
//! Each [`TelegramEvent`] is one rule; `test` and `handle` are exhaustive matches on the kind, so a
//! new kind does not compile until both are written.

use std::sync::Arc;

use dbot_core::{ApiTransport, EventKind, HandlerError, MatchRule};
use serde_json::Value;

use crate::args::{
    CommandMatch, FileMessage, FileUrlResolver, MediaMatch, MediaPayload, MessageArgs,
    TelegramArgument,
};
use crate::entities::first_bot_command;
use crate::types::{Message, RawField, Update};

pub type TelegramRule = MatchRule<TelegramEvent, Update, TelegramArgument>;

/// Media fields probed by the `media` rule, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
    Animation,
    Voice,
    Sticker,
    Location,
    Venue,
    Contact,
    Poll,
    Game,
}

impl MediaKind {
    pub const PRIORITY: [MediaKind; 12] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Audio,
        MediaKind::Document,
        MediaKind::Animation,
        MediaKind::Voice,
        MediaKind::Sticker,
        MediaKind::Location,
        MediaKind::Venue,
        MediaKind::Contact,
        MediaKind::Poll,
        MediaKind::Game,
    ];

    /// Field name in the message payload.
    pub fn field(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Animation => "animation",
            MediaKind::Voice => "voice",
            MediaKind::Sticker => "sticker",
            MediaKind::Location => "location",
            MediaKind::Venue => "venue",
            MediaKind::Contact => "contact",
            MediaKind::Poll => "poll",
            MediaKind::Game => "game",
        }
    }

    pub fn is_present(self, message: &Message) -> bool {
        match self {
            MediaKind::Photo => message.photo.is_some(),
            MediaKind::Video => message.video.is_some(),
            MediaKind::Audio => message.audio.is_some(),
            MediaKind::Document => message.document.is_some(),
            MediaKind::Animation => message.animation.is_some(),
            MediaKind::Voice => message.voice.is_some(),
            MediaKind::Sticker => message.sticker.is_some(),
            MediaKind::Location => message.location.is_some(),
            MediaKind::Venue => message.venue.is_some(),
            MediaKind::Contact => message.contact.is_some(),
            MediaKind::Poll => message.poll.is_some(),
            MediaKind::Game => message.game.is_some(),
        }
    }

    /// The field exactly as received, if present.
    pub fn value(self, message: &Message) -> Option<Value> {
        let raw = match self {
            MediaKind::Photo => message.photo.as_ref().map(RawField::raw),
            MediaKind::Video => message.video.as_ref().map(RawField::raw),
            MediaKind::Audio => message.audio.as_ref().map(RawField::raw),
            MediaKind::Document => message.document.as_ref().map(RawField::raw),
            MediaKind::Animation => message.animation.as_ref().map(RawField::raw),
            MediaKind::Voice => message.voice.as_ref().map(RawField::raw),
            MediaKind::Sticker => message.sticker.as_ref().map(RawField::raw),
            MediaKind::Location => message.location.as_ref().map(RawField::raw),
            MediaKind::Venue => message.venue.as_ref().map(RawField::raw),
            MediaKind::Contact => message.contact.as_ref().map(RawField::raw),
            MediaKind::Poll => message.poll.as_ref().map(RawField::raw),
            MediaKind::Game => message.game.as_ref().map(RawField::raw),
        };
        raw.cloned()
    }

    /// File id for kinds that carry a downloadable file. Photos use the largest (last) size.
    pub fn file_id(self, message: &Message) -> Option<String> {
        match self {
            MediaKind::Photo => message
                .photo
                .as_ref()
                .and_then(|sizes| sizes.last())
                .map(|p| p.file_id.clone()),
            MediaKind::Video => message.video.as_ref().map(|v| v.file_id.clone()),
            MediaKind::Audio => message.audio.as_ref().map(|a| a.file_id.clone()),
            MediaKind::Animation => message.animation.as_ref().map(|a| a.file_id.clone()),
            MediaKind::Voice => message.voice.as_ref().map(|v| v.file_id.clone()),
            MediaKind::Sticker => message.sticker.as_ref().map(|s| s.file_id.clone()),
            MediaKind::Document
            | MediaKind::Location
            | MediaKind::Venue
            | MediaKind::Contact
            | MediaKind::Poll
            | MediaKind::Game => None,
        }
    }

    /// First kind in [`MediaKind::PRIORITY`] present on the message.
    pub fn probe(message: &Message) -> Option<MediaKind> {
        Self::PRIORITY.into_iter().find(|kind| kind.is_present(message))
    }
}

/// Telegram event kinds, in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelegramEvent {
    Message,
    MessageEdited,
    ChannelPost,
    ChannelPostEdited,
    CallbackQuery,
    InlineQuery,
    ChosenInlineResult,
    Command,
    Photo,
    Video,
    Audio,
    Document,
    Animation,
    Voice,
    Sticker,
    Location,
    Venue,
    Contact,
    Poll,
    Game,
    Media,
}

impl EventKind for TelegramEvent {
    fn label(&self) -> &'static str {
        match self {
            TelegramEvent::Message => "message",
            TelegramEvent::MessageEdited => "message_edited",
            TelegramEvent::ChannelPost => "channel_post",
            TelegramEvent::ChannelPostEdited => "channel_post_edited",
            TelegramEvent::CallbackQuery => "callback_query",
            TelegramEvent::InlineQuery => "inline_query",
            TelegramEvent::ChosenInlineResult => "chosen_inline_result",
            TelegramEvent::Command => "bot_command",
            TelegramEvent::Photo => "photo",
            TelegramEvent::Video => "video",
            TelegramEvent::Audio => "audio",
            TelegramEvent::Document => "document",
            TelegramEvent::Animation => "animation",
            TelegramEvent::Voice => "voice",
            TelegramEvent::Sticker => "sticker",
            TelegramEvent::Location => "location",
            TelegramEvent::Venue => "venue",
            TelegramEvent::Contact => "contact",
            TelegramEvent::Poll => "poll",
            TelegramEvent::Game => "game",
            TelegramEvent::Media => "media",
        }
    }
}

/// What transforms need beyond the update: the API for lazy follow-up calls and the file URL base.
pub struct RuleContext {
    pub api: Arc<dyn ApiTransport>,
    /// `{api_url}/file/bot{token}`
    pub file_base: Arc<str>,
}

impl RuleContext {
    pub fn new(api: Arc<dyn ApiTransport>, file_base: impl Into<Arc<str>>) -> Self {
        Self {
            api,
            file_base: file_base.into(),
        }
    }

    fn resolver(&self, file_id: Option<String>) -> FileUrlResolver {
        FileUrlResolver::new(Arc::clone(&self.api), Arc::clone(&self.file_base), file_id)
    }
}

impl TelegramEvent {
    pub const ALL: [TelegramEvent; 21] = [
        TelegramEvent::Message,
        TelegramEvent::MessageEdited,
        TelegramEvent::ChannelPost,
        TelegramEvent::ChannelPostEdited,
        TelegramEvent::CallbackQuery,
        TelegramEvent::InlineQuery,
        TelegramEvent::ChosenInlineResult,
        TelegramEvent::Command,
        TelegramEvent::Photo,
        TelegramEvent::Video,
        TelegramEvent::Audio,
        TelegramEvent::Document,
        TelegramEvent::Animation,
        TelegramEvent::Voice,
        TelegramEvent::Sticker,
        TelegramEvent::Location,
        TelegramEvent::Venue,
        TelegramEvent::Contact,
        TelegramEvent::Poll,
        TelegramEvent::Game,
        TelegramEvent::Media,
    ];

    /// Media kind checked by the per-field rules; `None` for every other event.
    pub fn media_kind(self) -> Option<MediaKind> {
        match self {
            TelegramEvent::Photo => Some(MediaKind::Photo),
            TelegramEvent::Video => Some(MediaKind::Video),
            TelegramEvent::Audio => Some(MediaKind::Audio),
            TelegramEvent::Document => Some(MediaKind::Document),
            TelegramEvent::Animation => Some(MediaKind::Animation),
            TelegramEvent::Voice => Some(MediaKind::Voice),
            TelegramEvent::Sticker => Some(MediaKind::Sticker),
            TelegramEvent::Location => Some(MediaKind::Location),
            TelegramEvent::Venue => Some(MediaKind::Venue),
            TelegramEvent::Contact => Some(MediaKind::Contact),
            TelegramEvent::Poll => Some(MediaKind::Poll),
            TelegramEvent::Game => Some(MediaKind::Game),
            TelegramEvent::Message
            | TelegramEvent::MessageEdited
            | TelegramEvent::ChannelPost
            | TelegramEvent::ChannelPostEdited
            | TelegramEvent::CallbackQuery
            | TelegramEvent::InlineQuery
            | TelegramEvent::ChosenInlineResult
            | TelegramEvent::Command
            | TelegramEvent::Media => None,
        }
    }

    pub fn test(self, update: &Update) -> bool {
        match self {
            TelegramEvent::Message => update.message.is_some(),
            TelegramEvent::MessageEdited => update.edited_message.is_some(),
            TelegramEvent::ChannelPost => update.channel_post.is_some(),
            TelegramEvent::ChannelPostEdited => update.edited_channel_post.is_some(),
            TelegramEvent::CallbackQuery => update.callback_query.is_some(),
            TelegramEvent::InlineQuery => update.inline_query.is_some(),
            TelegramEvent::ChosenInlineResult => update.chosen_inline_result.is_some(),
            TelegramEvent::Command => update
                .message
                .as_ref()
                .is_some_and(|m| m.text_entities().iter().any(|e| e.is_bot_command())),
            TelegramEvent::Photo
            | TelegramEvent::Video
            | TelegramEvent::Audio
            | TelegramEvent::Document
            | TelegramEvent::Animation
            | TelegramEvent::Voice
            | TelegramEvent::Sticker
            | TelegramEvent::Location
            | TelegramEvent::Venue
            | TelegramEvent::Contact
            | TelegramEvent::Poll
            | TelegramEvent::Game => match (self.media_kind(), update.message.as_ref()) {
                (Some(kind), Some(message)) => kind.is_present(message),
                _ => false,
            },
            TelegramEvent::Media => update
                .message
                .as_ref()
                .is_some_and(|m| MediaKind::probe(m).is_some()),
        }
    }

    pub fn handle(
        self,
        update: &Update,
        ctx: &RuleContext,
    ) -> Result<TelegramArgument, HandlerError> {
        match self {
            TelegramEvent::Message => {
                let message = required(update.message.as_ref(), "message")?;
                Ok(TelegramArgument::Message(MessageArgs::from_message(message)))
            }
            TelegramEvent::MessageEdited => {
                let message = required(update.edited_message.as_ref(), "edited_message")?;
                Ok(TelegramArgument::Message(MessageArgs::from_message(message)))
            }
            TelegramEvent::ChannelPost => {
                let post = required(update.channel_post.as_ref(), "channel_post")?;
                Ok(TelegramArgument::Post(post.clone()))
            }
            TelegramEvent::ChannelPostEdited => {
                let post = required(update.edited_channel_post.as_ref(), "edited_channel_post")?;
                Ok(TelegramArgument::Post(post.clone()))
            }
            TelegramEvent::CallbackQuery => {
                let query = required(update.callback_query.as_ref(), "callback_query")?;
                Ok(TelegramArgument::CallbackQuery(query.clone()))
            }
            TelegramEvent::InlineQuery => {
                let query = required(update.inline_query.as_ref(), "inline_query")?;
                Ok(TelegramArgument::InlineQuery(query.clone()))
            }
            TelegramEvent::ChosenInlineResult => {
                let result =
                    required(update.chosen_inline_result.as_ref(), "chosen_inline_result")?;
                Ok(TelegramArgument::ChosenInlineResult(result.clone()))
            }
            TelegramEvent::Command => {
                let message = required(update.message.as_ref(), "message")?;
                let entity = first_bot_command(message).ok_or(HandlerError::NoCommandEntity)?;
                Ok(TelegramArgument::Command(CommandMatch {
                    args: MessageArgs::from_message(message),
                    starts: entity.entity.offset == 0,
                    command: entity.text,
                }))
            }
            TelegramEvent::Photo
            | TelegramEvent::Video
            | TelegramEvent::Audio
            | TelegramEvent::Animation
            | TelegramEvent::Voice
            | TelegramEvent::Sticker => {
                let message = required(update.message.as_ref(), "message")?;
                let file_id = self.media_kind().and_then(|kind| kind.file_id(message));
                Ok(TelegramArgument::File(FileMessage {
                    args: MessageArgs::from_message(message),
                    file: ctx.resolver(file_id),
                }))
            }
            TelegramEvent::Document
            | TelegramEvent::Location
            | TelegramEvent::Venue
            | TelegramEvent::Contact
            | TelegramEvent::Poll
            | TelegramEvent::Game => {
                let message = required(update.message.as_ref(), "message")?;
                Ok(TelegramArgument::Message(MessageArgs::from_message(message)))
            }
            TelegramEvent::Media => {
                let message = required(update.message.as_ref(), "message")?;
                let kind = MediaKind::probe(message).ok_or(HandlerError::MissingField("media"))?;
                let object = kind.value(message).unwrap_or(Value::Null);
                Ok(TelegramArgument::Media(MediaMatch {
                    args: MessageArgs::from_message(message),
                    media: MediaPayload {
                        kind: kind.field(),
                        object,
                    },
                }))
            }
        }
    }

    /// This kind as a registrable rule bound to `ctx`.
    pub fn rule(self, ctx: Arc<RuleContext>) -> Arc<TelegramRule> {
        MatchRule::new(
            self,
            move |update: &Update| self.test(update),
            move |update: &Update| self.handle(update, &ctx),
        )
    }
}

fn required<'a, T>(field: Option<&'a T>, name: &'static str) -> Result<&'a T, HandlerError> {
    field.ok_or(HandlerError::MissingField(name))
}

/// Every built-in rule, in [`TelegramEvent::ALL`] order.
pub fn builtin_rules(ctx: Arc<RuleContext>) -> Vec<Arc<TelegramRule>> {
    TelegramEvent::ALL
        .into_iter()
        .map(|kind| kind.rule(Arc::clone(&ctx)))
        .collect()
}

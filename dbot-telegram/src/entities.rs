//! Text-entity extraction: resolves each entity's UTF-16 span to the literal substring.

use crate::types::{Message, MessageEntity};

/// An entity together with the text it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub entity: MessageEntity,
    pub text: String,
}

/// Entities of the message's text (or caption), each paired with its substring.
///
/// Spans running past the end of the text are clamped; characters split by a span boundary are
/// replaced with U+FFFD.
pub fn extract_entities(message: &Message) -> Vec<ExtractedEntity> {
    let units: Vec<u16> = message.text_or_caption().unwrap_or("").encode_utf16().collect();

    message
        .text_entities()
        .iter()
        .map(|entity| ExtractedEntity {
            text: utf16_slice(&units, entity.offset, entity.length),
            entity: entity.clone(),
        })
        .collect()
}

/// First `bot_command` entity of the message, if any.
pub fn first_bot_command(message: &Message) -> Option<ExtractedEntity> {
    extract_entities(message)
        .into_iter()
        .find(|e| e.entity.is_bot_command())
}

fn utf16_slice(units: &[u16], offset: usize, length: usize) -> String {
    let start = offset.min(units.len());
    let end = offset.saturating_add(length).min(units.len());
    String::from_utf16_lossy(&units[start..end])
}

//! Message-level text matching: exact text, a specific command, or a regular expression.
//!
//! Independent of the update engine; listeners use it to route a message they already received.

use std::sync::Arc;

use regex::Regex;

use crate::entities::first_bot_command;
use crate::types::Message;

#[derive(Debug, Clone)]
pub enum TextRule {
    /// Text (or caption) equals `0`.
    Exact(String),
    /// First `bot_command` entity equals `command`; with `starts`, it must also sit at offset 0.
    Command { command: String, starts: bool },
    Regex(Regex),
}

impl TextRule {
    pub fn exact(text: impl Into<String>) -> Arc<Self> {
        Arc::new(TextRule::Exact(text.into()))
    }

    pub fn command(command: impl Into<String>, starts: bool) -> Arc<Self> {
        Arc::new(TextRule::Command {
            command: command.into(),
            starts,
        })
    }

    pub fn regex(re: Regex) -> Arc<Self> {
        Arc::new(TextRule::Regex(re))
    }

    pub fn check(&self, message: &Message) -> Option<TextMatch> {
        let text = message.text_or_caption().unwrap_or("");
        match self {
            TextRule::Exact(expected) => (text == expected).then_some(TextMatch::Exact),
            TextRule::Command { command, starts } => {
                let entity = first_bot_command(message)?;
                let position_ok = !*starts || entity.entity.offset == 0;
                (entity.text == *command && position_ok).then(|| TextMatch::Command {
                    command: entity.text,
                })
            }
            TextRule::Regex(re) => re.captures(text).map(|caps| TextMatch::Regex {
                groups: caps
                    .iter()
                    .skip(1)
                    .map(|group| group.map(|g| g.as_str().to_string()))
                    .collect(),
            }),
        }
    }
}

/// Result of a successful [`TextRule::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Exact,
    Command { command: String },
    /// Capture groups after the whole match; `None` for groups that did not participate.
    Regex { groups: Vec<Option<String>> },
}

#[derive(Debug, Default)]
pub struct TextMatcher {
    rules: Vec<Arc<TextRule>>,
}

impl TextMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: Arc<TextRule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Removes the first registration of this exact rule.
    pub fn remove(&mut self, rule: &Arc<TextRule>) -> &mut Self {
        if let Some(index) = self.rules.iter().position(|r| Arc::ptr_eq(r, rule)) {
            self.rules.remove(index);
        }
        self
    }

    /// One entry per rule, in registration order.
    pub fn get_matches(&self, message: &Message) -> Vec<Option<TextMatch>> {
        self.rules.iter().map(|rule| rule.check(message)).collect()
    }

    /// First successful match.
    pub fn get_match(&self, message: &Message) -> Option<TextMatch> {
        self.rules.iter().find_map(|rule| rule.check(message))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

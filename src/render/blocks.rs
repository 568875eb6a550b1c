//! Plain-text rendering of Slack rich-text blocks
//!
//! Blocks are kept verbatim in the shards. Rendering parses each block's
//! `elements` into [`Element`] and flattens them into org-mode text. Element
//! kinds outside the supported set render as nothing.

use crate::directory::{Channels, Users};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Rich-text element
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    /// Literal text
    Text {
        /// Content
        text: String,
    },
    /// Inline run of elements
    RichTextSection {
        /// Children
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// Bulleted or numbered list
    RichTextList {
        /// One child per list item
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// Code block
    RichTextPreformatted {
        /// Children
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// Block quote
    RichTextQuote {
        /// Children
        #[serde(default)]
        elements: Vec<Element>,
    },
    /// Hyperlink
    Link {
        /// Target
        url: String,
        /// Label, the url when absent
        #[serde(default)]
        text: Option<String>,
    },
    /// `@here`, `@channel` or `@everyone`
    Broadcast {
        /// Audience
        range: String,
    },
    /// User mention
    User {
        /// Mentioned user
        user_id: String,
    },
    /// User group mention
    Usergroup {
        /// Mentioned group
        usergroup_id: String,
    },
    /// Channel mention
    Channel {
        /// Mentioned channel
        channel_id: String,
    },
    /// Emoji
    Emoji {
        /// Short name without colons
        name: String,
        /// Code points as dash-separated hex, standard emoji only
        #[serde(default)]
        unicode: Option<String>,
    },
    /// Interactive button
    Button {},
    /// Markdown text object
    Mrkdwn {},
    /// Anything else
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    elements: Vec<Element>,
}

/// Renders blocks with names resolved through the directory
pub struct BlockRenderer<'a> {
    users: &'a Users,
    channels: &'a Channels,
}

impl<'a> BlockRenderer<'a> {
    /// Renderer resolving mentions through `users` and `channels`
    pub fn new(users: &'a Users, channels: &'a Channels) -> Self {
        Self { users, channels }
    }

    /// Text of all `blocks`, one line group per block
    pub fn render_blocks(&self, blocks: &[Value]) -> String {
        blocks
            .iter()
            .map(|block| self.render(block))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text of one block, its top-level elements joined by newlines
    ///
    /// A block that does not parse renders as an empty string.
    pub fn render(&self, block: &Value) -> String {
        match Block::deserialize(block) {
            Ok(block) => block
                .elements
                .iter()
                .map(|element| self.element(element))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                debug!(error = %e, "Skipping unparsable block");
                String::new()
            }
        }
    }

    /// Text of a single element
    pub fn element(&self, element: &Element) -> String {
        match element {
            Element::Text { text } => text.clone(),
            Element::RichTextSection { elements }
            | Element::RichTextPreformatted { elements }
            | Element::RichTextQuote { elements } => self.concat(elements),
            Element::RichTextList { elements } => elements
                .iter()
                .map(|item| format!("- {}", self.element(item)))
                .collect::<Vec<_>>()
                .join("\n"),
            Element::Link { url, text } => {
                format!("[[{url}][{}]]", text.as_deref().unwrap_or(url))
            }
            Element::Broadcast { range } => format!("@{range}"),
            Element::User { user_id } => format!("@{}", self.users.handle(user_id)),
            Element::Usergroup { usergroup_id } => format!("@{usergroup_id}"),
            Element::Channel { channel_id } => {
                format!("#{}", self.channels.display_name(channel_id, self.users))
            }
            Element::Emoji { name, unicode } => unicode
                .as_deref()
                .and_then(decode_code_points)
                .unwrap_or_else(|| format!(":{name}:")),
            Element::Button {} | Element::Mrkdwn {} | Element::Unknown => String::new(),
        }
    }

    fn concat(&self, elements: &[Element]) -> String {
        elements.iter().map(|element| self.element(element)).collect()
    }
}

/// "1f44d" or "1f1e9-1f1ea" to the emoji itself
fn decode_code_points(unicode: &str) -> Option<String> {
    unicode
        .split('-')
        .map(|hex| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32))
        .collect()
}

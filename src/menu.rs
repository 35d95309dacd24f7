use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// The IT helpdesk menu, compiled into the binary.
const BUILTIN_HELPDESK: &str = include_str!("../menus/helpdesk.toml");

const ACTION_PLACEHOLDER: &str = "{action}";
const ITEM_PLACEHOLDER: &str = "{item}";
const CARD_PLACEHOLDER: &str = "{card}";

/// What the bot should send in answer to an action identifier.
/// Computing it has no side effects; the caller does the sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Send the named card.
    Card(String),
    /// Send a confirmation message, then the follow-up card if there is one.
    Confirmation {
        message: String,
        follow_up: Option<String>,
    },
    /// The identifier matched no rule. The message echoes it verbatim.
    Fallback(String),
}

impl Response {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Response::Fallback(_))
    }
}

/// A canned acknowledgement for an exact identifier.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reply {
    pub message: String,
    #[serde(default)]
    pub follow_up: Option<String>,
}

/// Turns `<prefix><item>` identifiers into a confirmation for `<item>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixRule {
    pub prefix: String,
    /// Message template, `{item}` is replaced with the stripped suffix.
    pub message: String,
    #[serde(default)]
    pub follow_up: Option<String>,
}

impl PrefixRule {
    /// The suffix after the prefix, if the identifier carries one.
    pub fn strip<'a>(&self, action: &'a str) -> Option<&'a str> {
        action
            .strip_prefix(self.prefix.as_str())
            .filter(|item| !item.is_empty())
    }
}

/// Declarative dispatch table: exact identifiers first, then prefix rules in
/// declaration order, then the fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuTable {
    /// Card sent after the greeting on every new message.
    pub root_card: String,
    pub greeting: String,
    #[serde(default = "default_fallback")]
    pub fallback: String,
    /// Sent instead of a card that could not be loaded.
    #[serde(default = "default_unavailable")]
    pub unavailable: String,
    #[serde(default)]
    pub cards: BTreeMap<String, String>,
    #[serde(default)]
    pub replies: BTreeMap<String, Reply>,
    #[serde(default)]
    pub prefixes: Vec<PrefixRule>,
}

fn default_fallback() -> String {
    "Your response: '{action}' was not recognized. Please try again..".to_string()
}

fn default_unavailable() -> String {
    "Sorry, the '{card}' menu is not available right now. Please try again later.".to_string()
}

impl MenuTable {
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_HELPDESK).context("Built-in helpdesk menu is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read menu file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to load menu from {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let menu: MenuTable = toml::from_str(content).context("Failed to parse menu")?;
        menu.validate()?;
        info!(
            "Loaded menu: {} cards, {} replies, {} prefix rules",
            menu.cards.len(),
            menu.replies.len(),
            menu.prefixes.len()
        );
        Ok(menu)
    }

    fn validate(&self) -> Result<()> {
        if self.root_card.trim().is_empty() {
            anyhow::bail!("Menu has no root card");
        }
        if !self.fallback.contains(ACTION_PLACEHOLDER) {
            anyhow::bail!("Fallback message must contain {}", ACTION_PLACEHOLDER);
        }

        for (id, card) in &self.cards {
            if id.is_empty() || card.trim().is_empty() {
                anyhow::bail!("Card entry '{}' = '{}' is incomplete", id, card);
            }
            if self.replies.contains_key(id) {
                anyhow::bail!("Identifier '{}' is mapped to both a card and a reply", id);
            }
        }
        if self.replies.contains_key("") {
            anyhow::bail!("Reply with an empty identifier");
        }

        for (i, rule) in self.prefixes.iter().enumerate() {
            if rule.prefix.is_empty() {
                anyhow::bail!("Prefix rule #{} has an empty prefix", i + 1);
            }
            if !rule.message.contains(ITEM_PLACEHOLDER) {
                anyhow::bail!(
                    "Prefix rule '{}' message must contain {}",
                    rule.prefix,
                    ITEM_PLACEHOLDER
                );
            }
            // An earlier rule whose prefix starts this one would always win.
            if let Some(earlier) = self.prefixes[..i]
                .iter()
                .find(|e| rule.prefix.starts_with(e.prefix.as_str()))
            {
                anyhow::bail!(
                    "Prefix rule '{}' is shadowed by earlier rule '{}'",
                    rule.prefix,
                    earlier.prefix
                );
            }
        }

        Ok(())
    }

    /// Decide the answer for an action identifier.
    pub fn dispatch(&self, action: &str) -> Response {
        if let Some(card) = self.cards.get(action) {
            return Response::Card(card.clone());
        }

        if let Some(reply) = self.replies.get(action) {
            return Response::Confirmation {
                message: reply.message.clone(),
                follow_up: reply.follow_up.clone(),
            };
        }

        for rule in &self.prefixes {
            if let Some(item) = rule.strip(action) {
                return Response::Confirmation {
                    message: rule.message.replace(ITEM_PLACEHOLDER, item),
                    follow_up: rule.follow_up.clone(),
                };
            }
        }

        Response::Fallback(self.fallback.replace(ACTION_PLACEHOLDER, action))
    }

    pub fn unavailable_message(&self, card: &str) -> String {
        self.unavailable.replace(CARD_PLACEHOLDER, card)
    }

    /// Every card file the menu can send.
    pub fn referenced_cards(&self) -> BTreeSet<&str> {
        let mut cards = BTreeSet::new();
        cards.insert(self.root_card.as_str());
        cards.extend(self.cards.values().map(String::as_str));
        cards.extend(
            self.replies
                .values()
                .filter_map(|r| r.follow_up.as_deref()),
        );
        cards.extend(self.prefixes.iter().filter_map(|r| r.follow_up.as_deref()));
        cards
    }

    /// Number of exact entries and prefix rules.
    pub fn entry_count(&self) -> usize {
        self.cards.len() + self.replies.len() + self.prefixes.len()
    }
}

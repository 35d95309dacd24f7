use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::menu::MenuTable;

/// Read-only directory of Adaptive Card documents, keyed by file name.
/// Cards are read from disk on every call so edits show up without a restart.
#[derive(Debug, Clone)]
pub struct CardStore {
    dir: PathBuf,
}

/// Result of cross-checking a menu against the cards on disk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Cards the menu references that could not be loaded.
    pub missing_cards: Vec<String>,
    /// `(card, action)` buttons whose identifier falls through to the fallback.
    pub unrouted_actions: Vec<(String, String)>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.missing_cards.is_empty() && self.unrouted_actions.is_empty()
    }
}

impl CardStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Load and parse a card by file name.
    pub async fn load(&self, name: &str) -> Result<Value> {
        // Only bare file names inside the store.
        if Path::new(name).file_name().and_then(|f| f.to_str()) != Some(name) {
            anyhow::bail!("Invalid card name: '{}'", name);
        }

        let path = self.dir.join(name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read card file: {}", path.display()))?;

        debug!("Loaded card {} ({} bytes)", name, content.len());

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse card file: {}", path.display()))
    }

    /// Check that every card the menu can send exists and that every button on
    /// those cards has a route other than the fallback.
    pub async fn check(&self, menu: &MenuTable) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();

        for name in menu.referenced_cards() {
            let card = match self.load(name).await {
                Ok(card) => card,
                Err(e) => {
                    warn!("Card {} is unavailable: {:#}", name, e);
                    report.missing_cards.push(name.to_string());
                    continue;
                }
            };

            for action in submit_actions(&card) {
                if menu.dispatch(&action).is_fallback() {
                    warn!("Button '{}' on card {} has no route", action, name);
                    report.unrouted_actions.push((name.to_string(), action));
                }
            }
        }

        if report.is_clean() {
            info!(
                "All {} menu cards present in {}",
                menu.referenced_cards().len(),
                self.dir.display()
            );
        }

        report
    }
}

/// Collect the `data.action` identifiers of every `Action.Submit` in a card,
/// including nested action sets and `Action.ShowCard` sub-cards.
pub fn submit_actions(card: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_submit_actions(card, &mut found);
    found
}

fn collect_submit_actions(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("Action.Submit") {
                if let Some(action) = map
                    .get("data")
                    .and_then(|d| d.get("action"))
                    .and_then(Value::as_str)
                {
                    if !found.iter().any(|a| a == action) {
                        found.push(action.to_string());
                    }
                }
            }
            for child in map.values() {
                collect_submit_actions(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_submit_actions(item, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shipped_cards() -> CardStore {
        CardStore::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("cards"))
    }

    #[tokio::test]
    async fn test_load_card() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"type": "AdaptiveCard"}"#).unwrap();

        let store = CardStore::new(dir.path());
        let card = store.load("a.json").await.unwrap();
        assert_eq!(card["type"], "AdaptiveCard");
    }

    #[tokio::test]
    async fn test_load_reads_fresh_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let store = CardStore::new(dir.path());

        std::fs::write(&path, r#"{"version": "1.2"}"#).unwrap();
        assert_eq!(store.load("a.json").await.unwrap()["version"], "1.2");

        std::fs::write(&path, r#"{"version": "1.3"}"#).unwrap();
        assert_eq!(store.load("a.json").await.unwrap()["version"], "1.3");
    }

    #[tokio::test]
    async fn test_missing_card_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::new(dir.path());
        let err = store.load("nope.json").await.unwrap_err();
        assert!(format!("{:#}", err).contains("nope.json"));
    }

    #[tokio::test]
    async fn test_malformed_card_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = CardStore::new(dir.path());
        assert!(store.load("bad.json").await.is_err());
    }

    #[tokio::test]
    async fn test_path_outside_store_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::new(dir.path().join("cards"));
        std::fs::write(dir.path().join("secret.json"), "{}").unwrap();
        assert!(store.load("../secret.json").await.is_err());
        assert!(store.load("").await.is_err());
    }

    #[test]
    fn test_submit_actions_nested() {
        let card = json!({
            "type": "AdaptiveCard",
            "body": [
                {"type": "TextBlock", "text": "Pick one"},
                {"type": "ActionSet", "actions": [
                    {"type": "Action.Submit", "title": "A", "data": {"action": "a"}}
                ]}
            ],
            "actions": [
                {"type": "Action.Submit", "title": "B", "data": {"action": "b"}},
                {"type": "Action.OpenUrl", "url": "https://example.com"},
                {"type": "Action.Submit", "title": "No data"},
                {"type": "Action.ShowCard", "card": {
                    "type": "AdaptiveCard",
                    "actions": [
                        {"type": "Action.Submit", "data": {"action": "c"}},
                        {"type": "Action.Submit", "data": {"action": "a"}}
                    ]
                }}
            ]
        });
        assert_eq!(submit_actions(&card), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_check_reports_problems() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("root.json"),
            json!({"actions": [
                {"type": "Action.Submit", "data": {"action": "start"}},
                {"type": "Action.Submit", "data": {"action": "typo"}}
            ]})
            .to_string(),
        )
        .unwrap();

        let menu = MenuTable::parse(
            "root_card = \"root.json\"\ngreeting = \"hi\"\n[cards]\nstart = \"start.json\"\n",
        )
        .unwrap();
        let report = CardStore::new(dir.path()).check(&menu).await;

        assert_eq!(report.missing_cards, vec!["start.json".to_string()]);
        assert_eq!(
            report.unrouted_actions,
            vec![("root.json".to_string(), "typo".to_string())]
        );
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_shipped_cards_match_helpdesk_menu() {
        let menu = MenuTable::builtin().unwrap();
        let report = shipped_cards().check(&menu).await;
        assert_eq!(report, ConsistencyReport::default());
    }

    #[tokio::test]
    async fn test_every_shipped_card_is_referenced() {
        let menu = MenuTable::builtin().unwrap();
        let referenced = menu.referenced_cards();
        let store = shipped_cards();

        let mut entries = tokio::fs::read_dir(store.directory()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            assert!(referenced.contains(name.as_str()), "{} is never sent", name);
        }
    }
}

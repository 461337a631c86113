//! Recorded session documents.

use anyhow::{Context as _, Result};
use serde::Deserialize;
use std::path::Path;
use tactus_contacts::ContactBatch;
use tactus_recognizers::{DragConfig, HoldConfig, TapConfig};
use tactus_targets::RectTarget;

/// A named rectangular listener.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTarget {
    pub name: String,
    #[serde(flatten)]
    pub rect: RectTarget,
}

/// One recognizer to register on every target.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerEntry<C> {
    #[serde(default)]
    pub config: C,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub exclusive: bool,
}

impl<C: Default> Default for RecognizerEntry<C> {
    fn default() -> Self {
        Self {
            config: C::default(),
            priority: None,
            exclusive: false,
        }
    }
}

/// Recognizers to register. A missing section registers all three with defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Recognizers {
    pub tap: Option<RecognizerEntry<TapConfig>>,
    pub hold: Option<RecognizerEntry<HoldConfig>>,
    pub drag: Option<RecognizerEntry<DragConfig>>,
}

impl Default for Recognizers {
    fn default() -> Self {
        Self {
            tap: Some(RecognizerEntry::default()),
            hold: Some(RecognizerEntry::default()),
            drag: Some(RecognizerEntry::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub targets: Vec<SessionTarget>,
    #[serde(default)]
    pub recognizers: Recognizers,
    pub batches: Vec<ContactBatch>,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session {}", path.display()))?;
        let session: Session = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse session {}", path.display()))?;
        anyhow::ensure!(
            session
                .batches
                .windows(2)
                .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms),
            "batches in {} are not in timestamp order",
            path.display()
        );
        Ok(session)
    }

    /// Timestamp of the last batch.
    pub fn end_ms(&self) -> u64 {
        self.batches.last().map_or(0, |b| b.timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_session() {
        let json = r#"{
            "targets": [{ "name": "button", "x": 0.1, "y": 0.1, "width": 0.2, "height": 0.1 }],
            "batches": [
                { "timestamp_ms": 0, "added": [{ "id": 1, "x": 0.15, "y": 0.12, "timestamp_ms": 0 }] },
                { "timestamp_ms": 90, "removed": [{ "id": 1, "x": 0.15, "y": 0.12, "timestamp_ms": 90 }] }
            ]
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.targets[0].name, "button");
        assert_eq!(session.targets[0].rect.width, 0.2);
        assert_eq!(session.batches.len(), 2);
        assert_eq!(session.end_ms(), 90);
        assert!(session.recognizers.tap.is_some());
        assert!(session.recognizers.drag.is_some());
    }

    #[test]
    fn test_recognizer_section_selects_recognizers() {
        let json = r#"{
            "targets": [],
            "recognizers": { "hold": { "config": { "hold_ms": 800 }, "priority": 2 } },
            "batches": []
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert!(session.recognizers.tap.is_none());
        let hold = session.recognizers.hold.unwrap();
        assert_eq!(hold.config.hold_ms, 800);
        assert_eq!(hold.priority, Some(2));
        assert!(!hold.exclusive);
    }
}

//! Append-only conversation record.
//!
//! Three producers append in arrival order: system notices, parsed model
//! content, and speech-to-text finals. There is no reorder, delete, or
//! merge operation; derived views are computed from snapshots.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker label for system notices.
pub const SYSTEM_SPEAKER: &str = "System";

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptItem {
    pub speaker: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

/// Shared append-only transcript log. Cloning shares the underlying list.
#[derive(Clone, Default)]
pub struct TranscriptLog {
    items: Arc<Mutex<Vec<TranscriptItem>>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, speaker: impl Into<String>, text: impl Into<String>, is_user: bool) {
        let item = TranscriptItem {
            speaker: speaker.into(),
            text: text.into(),
            is_user,
            timestamp: Utc::now(),
        };
        self.lock().push(item);
    }

    pub fn append_system(&self, text: impl Into<String>) {
        self.append(SYSTEM_SPEAKER, text, false);
    }

    /// Ordered copy of all entries.
    pub fn snapshot(&self) -> Vec<TranscriptItem> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TranscriptItem>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

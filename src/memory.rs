//! Short-term conversation memory

use std::collections::VecDeque;

/// Default number of turns kept
pub const DEFAULT_CAPACITY: usize = 32;

/// One user utterance and the assistant's reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// Bounded log of recent turns; the oldest turn is evicted first
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ConversationMemory {
    /// Memory holding at most `capacity` turns (minimum 1)
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a completed turn
    pub fn save_context(&mut self, user: &str, assistant: &str) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            user: user.to_string(),
            assistant: assistant.to_string(),
        });
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn retrieve_context(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// All retained turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

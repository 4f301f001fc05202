use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

pub const MAX_CHAT_LEN: usize = 50;
pub const DEFAULT_CHAT_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: String,
    pub text: String,
}

/// Keeps the most recent `capacity` lines, oldest first.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
}

impl Default for ChatLog {
    fn default() -> Self {
        ChatLog::with_capacity(DEFAULT_CHAT_CAPACITY)
    }
}

impl ChatLog {
    pub fn with_capacity(capacity: usize) -> ChatLog {
        let capacity = capacity.max(1);
        ChatLog { entries: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, sender: &str, text: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ChatEntry { sender: sender.to_string(), text: text.to_string() });
    }

    pub fn entries(&self) -> Vec<ChatEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Input-side rules for an outgoing line.
pub fn validate_outgoing(text: &str) -> Result<String, ChatError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::Empty);
    }
    let len = text.chars().count();
    if len > MAX_CHAT_LEN {
        return Err(ChatError::TooLong { len, max: MAX_CHAT_LEN });
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod test {
    use crate::chat::{validate_outgoing, ChatLog, MAX_CHAT_LEN};
    use crate::error::ChatError;

    #[test]
    fn test_oldest_line_evicted() {
        let mut log = ChatLog::with_capacity(3);
        for i in 0..5 {
            log.push("Host", &format!("line {}", i));
        }
        let texts: Vec<String> = log.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_outgoing_validation() {
        assert_eq!(validate_outgoing("  good game  "), Ok("good game".to_string()));
        assert_eq!(validate_outgoing("   "), Err(ChatError::Empty));
        let long = "é".repeat(MAX_CHAT_LEN + 1);
        assert_eq!(validate_outgoing(&long), Err(ChatError::TooLong { len: MAX_CHAT_LEN + 1, max: MAX_CHAT_LEN }));
        assert!(validate_outgoing(&"é".repeat(MAX_CHAT_LEN)).is_ok());
    }
}

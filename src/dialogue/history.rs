//! Rolling conversation history and prompt context assembly.

use std::collections::VecDeque;

/// One user utterance and the reply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// The last `capacity` exchanges, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    exchanges: VecDeque<Exchange>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an exchange, evicting the oldest beyond capacity.
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.exchanges.len() >= self.capacity {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    /// Generator context: system prompt, history and the new input, ending
    /// with an open `{assistant_name}:` turn.
    pub fn build_context(&self, system_prompt: &str, input: &str, assistant_name: &str) -> String {
        let mut parts = Vec::with_capacity(self.exchanges.len() * 2 + 3);
        parts.push(format!("System: {system_prompt}\n"));
        for exchange in &self.exchanges {
            parts.push(format!("User: {}", exchange.user));
            parts.push(format!("{assistant_name}: {}", exchange.assistant));
        }
        parts.push(format!("User: {input}"));
        parts.push(format!("{assistant_name}:"));
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_exchange_is_evicted_first() {
        let mut history = ConversationHistory::new(2);
        history.push("one", "1");
        history.push("two", "2");
        history.push("three", "3");

        let users: Vec<&str> = history.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, ["two", "three"]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = ConversationHistory::new(0);
        history.push("hello", "hi");
        assert!(history.is_empty());
    }

    #[test]
    fn context_layout() {
        let mut history = ConversationHistory::new(5);
        history.push("hello", "Good evening.");
        let context = history.build_context("Be brief.", "time?", "Atlas");
        assert_eq!(
            context,
            "System: Be brief.\n\nUser: hello\nAtlas: Good evening.\nUser: time?\nAtlas:"
        );
    }
}

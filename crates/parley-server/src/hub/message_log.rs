//! Append-only message log.

use serde_json::Value;

/// Ordered history of `PUT MESSAGE` payloads, seeded with one sentinel.
///
/// Never shrinks and never reorders. Reads hand out owned copies, so a
/// reader can iterate while the log keeps growing.
#[derive(Debug)]
pub struct MessageLog {
    messages: Vec<Value>,
}

impl MessageLog {
    /// Log containing only `seed`.
    pub fn new(seed: Value) -> Self {
        Self {
            messages: vec![seed],
        }
    }

    /// Append a payload to the tail.
    pub fn append(&mut self, message: Value) {
        self.messages.push(message);
    }

    /// Owned copy of every entry, oldest first.
    pub fn all(&self) -> Vec<Value> {
        self.messages.clone()
    }

    /// The log as a JSON array, ready to send.
    pub fn to_value(&self) -> Value {
        Value::Array(self.all())
    }

    /// Number of entries, including the seed.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`: the seed is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(Value::String("Initial message".to_owned()))
    }
}

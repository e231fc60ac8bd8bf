//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;

use roomcast::websockets::WebSocketMessage;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion;

impl MessageAssertion {
    /// Drains everything queued for `name` so far
    pub fn for_client(setup: &mut TestSetup, name: &str) -> ReceivedMessages {
        let client = setup.client_mut(name);
        let mut messages = vec![];
        while let Ok(text) = client.outbound.try_recv() {
            let message: WebSocketMessage = serde_json::from_str(&text)
                .unwrap_or_else(|e| panic!("{name} received invalid frame {text}: {e}"));
            messages.push(message);
        }
        ReceivedMessages {
            client: name.to_string(),
            messages,
        }
    }
}

/// Frames one client received, in arrival order
pub struct ReceivedMessages {
    client: String,
    pub messages: Vec<WebSocketMessage>,
}

impl ReceivedMessages {
    pub fn labels(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.label.as_str()).collect()
    }

    pub fn received_nothing(self) {
        assert!(
            self.messages.is_empty(),
            "{} should have received nothing, got {:?}",
            self.client,
            self.labels()
        );
    }

    /// Asserts the exact label sequence
    pub fn received_labels(self, expected: &[&str]) -> Self {
        assert_eq!(
            self.labels(),
            expected,
            "{} received wrong message sequence",
            self.client
        );
        self
    }

    pub fn count(&self, label: &str) -> usize {
        self.messages.iter().filter(|m| m.label == label).count()
    }

    /// Payload of the only message carrying `label`
    pub fn single(&self, label: &str) -> &Value {
        let matching: Vec<&WebSocketMessage> =
            self.messages.iter().filter(|m| m.label == label).collect();
        assert_eq!(
            matching.len(),
            1,
            "{} should have received exactly one {label}",
            self.client
        );
        &matching[0].data
    }
}

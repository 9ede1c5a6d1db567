//! Registration state types

use super::schema::FieldSchema;
use crate::messages::Texts;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Session identity
// ============================================================================

/// Opaque identity of the remote party (the private chat the bot talks in)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Registration conversation state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegState {
    /// No registration in progress
    #[default]
    Initial,

    /// Waiting for the value of the field at `index` in the schema
    AwaitingField { index: usize },

    /// All fields collected, summary shown, waiting for confirm or restart
    Confirming,

    /// Confirmed, waiting for a photo or document proving the deposit
    AwaitingProof,
}

impl RegState {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            RegState::Initial => "initial",
            RegState::AwaitingField { .. } => "awaiting_field",
            RegState::Confirming => "confirming",
            RegState::AwaitingProof => "awaiting_proof",
        }
    }
}

impl fmt::Display for RegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegState::AwaitingField { index } => write!(f, "awaiting_field({index})"),
            other => f.write_str(other.name()),
        }
    }
}

// ============================================================================
// Collected fields
// ============================================================================

/// A collected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

/// Ordered mapping from field name to collected value.
///
/// Insertion order is kept; setting an existing name overwrites in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(Vec<FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.value = value,
            None => self.0.push(FieldValue {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.name.as_str())
    }
}

/// One conversation: identity, state and the values gathered so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: RegState,
    pub fields: Fields,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: RegState::Initial,
            fields: Fields::new(),
        }
    }
}

// ============================================================================
// Engine context
// ============================================================================

/// What to do with text while a proof of payment is expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProofTextPolicy {
    /// Drop the message without a reply
    #[default]
    Ignore,
    /// Remind the user that a screenshot or file is expected
    Reprompt,
}

/// Deployment configuration shared by every session (immutable)
#[derive(Debug, Clone)]
pub struct RegContext {
    pub schema: FieldSchema,
    pub texts: Texts,
    pub proof_text_policy: ProofTextPolicy,
}

impl RegContext {
    pub fn new(schema: FieldSchema, texts: Texts) -> Self {
        Self {
            schema,
            texts,
            proof_text_policy: ProofTextPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_proof_text_policy(mut self, policy: ProofTextPolicy) -> Self {
        self.proof_text_policy = policy;
        self
    }
}

//! Core data models shared by the retrieval and chat pipeline.
//!
//! These types represent the scored chunks and conversation messages that
//! flow from the retriever through prompt assembly to the model client.

use serde::{Deserialize, Serialize};

/// A chunk paired with its lexical relevance score for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredChunk {
    /// Position of the chunk in document order.
    pub index: usize,
    pub text: String,
    /// Total count of query-term occurrences in `text`.
    pub score: usize,
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single role-tagged message handed to the chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

//! Conversation assembly for the chat model.
//!
//! Builds the `[system, user]` message pair for one request. Three shapes
//! exist:
//!
//! | Retrieval | Sources | System message |
//! |-----------|---------|----------------|
//! | off | (ignored) | [`PLAIN_SYSTEM_PROMPT`] |
//! | on | non-empty | handbook template with the excerpts inlined |
//! | on | empty | [`FALLBACK_SYSTEM_PROMPT`] |
//!
//! Only the grounded shape reports cited sources.

use crate::models::Message;

/// System prompt used when retrieval is switched off.
pub const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// System prompt used when retrieval is on but found nothing.
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant";

const EXCERPTS_BEGIN: &str = "--- EMPLOYEE HANDBOOK EXCERPTS ---";
const EXCERPTS_END: &str = "--- END OF EXCERPTS ---";

/// Messages for the model call plus the excerpts to report back as citations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub messages: Vec<Message>,
    pub cited_sources: Vec<String>,
}

/// Build the conversation for `query`.
pub fn assemble(query: &str, retrieval_enabled: bool, sources: Vec<String>) -> AssembledPrompt {
    if !retrieval_enabled {
        return AssembledPrompt {
            messages: vec![Message::system(PLAIN_SYSTEM_PROMPT), Message::user(query)],
            cited_sources: Vec::new(),
        };
    }

    if sources.is_empty() {
        return AssembledPrompt {
            messages: vec![
                Message::system(FALLBACK_SYSTEM_PROMPT),
                Message::user(query),
            ],
            cited_sources: Vec::new(),
        };
    }

    AssembledPrompt {
        messages: vec![
            Message::system(grounded_system_prompt(&sources)),
            Message::user(query),
        ],
        cited_sources: sources,
    }
}

/// Handbook instruction with the excerpts concatenated verbatim.
fn grounded_system_prompt(sources: &[String]) -> String {
    format!(
        "You are a helpful assistant answering questions about the company based on its employee handbook.\n\
         Use ONLY the following information from the handbook to answer the user's question.\n\
         If you can't find relevant information in the provided context, say so clearly.\n\
         {}\n\
         {}\n\
         {}",
        EXCERPTS_BEGIN,
        sources.concat(),
        EXCERPTS_END
    )
}

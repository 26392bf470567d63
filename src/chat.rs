//! The `answer` operation: retrieve, assemble, call the model.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::llm::ChatModel;
use crate::prompt::assemble;
use crate::retriever::Retriever;

/// Error kinds surfaced to callers of [`ChatService::answer`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    ModelCallFailed(String),
}

impl ChatError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::InvalidInput(_) => "InvalidInput",
            ChatError::ModelCallFailed(_) => "ModelCallFailed",
        }
    }
}

/// A model reply and the handbook excerpts it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub sources: Vec<String>,
}

/// Ties the retriever, prompt assembly and the chat model together.
pub struct ChatService {
    retriever: Arc<Retriever>,
    model: Arc<dyn ChatModel>,
    /// Deadline for retrieval, including a first-time document load.
    load_timeout: Duration,
}

impl ChatService {
    pub fn new(
        retriever: Arc<Retriever>,
        model: Arc<dyn ChatModel>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            model,
            load_timeout,
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Answer `message`, grounding the model in handbook excerpts when
    /// `use_rag` is set.
    ///
    /// With `use_rag` off the document is never touched and `sources` is
    /// always empty. Retrieval problems degrade to an ungrounded answer;
    /// only an empty message or a failed model call is an error.
    pub async fn answer(&self, message: &str, use_rag: bool) -> Result<ChatReply, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::InvalidInput(
                "message must not be empty".to_string(),
            ));
        }

        let sources = if use_rag {
            match tokio::time::timeout(self.load_timeout, self.retriever.retrieve(message)).await {
                Ok(sources) => sources,
                Err(_) => {
                    warn!(
                        timeout_secs = self.load_timeout.as_secs(),
                        "retrieval timed out; answering without sources"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let prompt = assemble(message, use_rag, sources);
        debug!(
            use_rag,
            sources = prompt.cited_sources.len(),
            model = self.model.model_name(),
            "calling chat model"
        );

        let reply = self.model.complete(&prompt.messages).await.map_err(|e| {
            error!(error = %e, "model call failed");
            ChatError::ModelCallFailed(e.to_string())
        })?;

        Ok(ChatReply {
            reply,
            sources: prompt.cited_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::llm::ModelError;
    use crate::models::{Message, Role};
    use crate::prompt::{FALLBACK_SYSTEM_PROMPT, PLAIN_SYSTEM_PROMPT};
    use crate::retriever::{DocumentLoader, DocumentStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct TextLoader(Option<&'static str>);

    #[async_trait]
    impl DocumentLoader for TextLoader {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        async fn load(&self) -> Result<String, ExtractError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| ExtractError::NotFound("handbook.pdf".into()))
        }
    }

    /// Records the last conversation and replies with a fixed string.
    #[derive(Default)]
    struct EchoModel {
        seen: Mutex<Vec<Message>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[Message]) -> Result<String, ModelError> {
            *self.seen.lock().unwrap() = messages.to_vec();
            if self.fail {
                return Err(ModelError::Api {
                    status: 401,
                    body: "bad key".to_string(),
                });
            }
            Ok("ok".to_string())
        }
    }

    const HANDBOOK: &str = "Employees receive twenty vacation days per year. \
        Parking is free in the north garage.";

    fn service(doc: Option<&'static str>, model: Arc<EchoModel>) -> ChatService {
        let retriever = Arc::new(Retriever::new(Box::new(TextLoader(doc)), 50, 3));
        ChatService::new(retriever, model, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn empty_message_is_invalid_input() {
        let svc = service(Some(HANDBOOK), Arc::new(EchoModel::default()));
        let err = svc.answer("   ", true).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[tokio::test]
    async fn grounded_answer_cites_sources() {
        let model = Arc::new(EchoModel::default());
        let svc = service(Some(HANDBOOK), model.clone());

        let reply = svc.answer("How many vacation days?", true).await.unwrap();
        assert_eq!(reply.reply, "ok");
        assert_eq!(reply.sources.len(), 1);
        assert!(reply.sources[0].contains("vacation"));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].role, Role::System);
        assert!(seen[0].content.contains(&reply.sources[0]));
        assert_eq!(seen[1], Message::user("How many vacation days?"));
    }

    #[tokio::test]
    async fn rag_off_never_loads_document() {
        let model = Arc::new(EchoModel::default());
        let svc = service(Some(HANDBOOK), model.clone());

        let reply = svc.answer("How many vacation days?", false).await.unwrap();
        assert!(reply.sources.is_empty());
        assert_eq!(svc.retriever().status(), DocumentStatus::Unloaded);
        assert_eq!(model.seen.lock().unwrap()[0].content, PLAIN_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn unavailable_document_falls_back_to_generic_prompt() {
        let model = Arc::new(EchoModel::default());
        let svc = service(None, model.clone());

        let reply = svc.answer("How many vacation days?", true).await.unwrap();
        assert!(reply.sources.is_empty());
        assert_eq!(model.seen.lock().unwrap()[0].content, FALLBACK_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn no_match_falls_back_to_generic_prompt() {
        let model = Arc::new(EchoModel::default());
        let svc = service(Some(HANDBOOK), model.clone());

        let reply = svc.answer("quarterly revenue targets", true).await.unwrap();
        assert!(reply.sources.is_empty());
        assert_eq!(model.seen.lock().unwrap()[0].content, FALLBACK_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn model_failure_is_surfaced() {
        let model = Arc::new(EchoModel {
            fail: true,
            ..EchoModel::default()
        });
        let svc = service(Some(HANDBOOK), model);

        let err = svc.answer("How many vacation days?", true).await.unwrap_err();
        assert_eq!(err.kind(), "ModelCallFailed");
        assert!(err.to_string().contains("401"));
    }
}

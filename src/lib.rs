//! # Handbook RAG
//!
//! A minimal retrieval-augmented chat backend that answers questions about
//! a single reference document (an employee handbook).
//!
//! Questions are matched against the document by plain keyword frequency;
//! the best excerpts are inlined into the system prompt of a chat-completion
//! call, and returned to the caller as citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │  Document  │──▶│  Chunker  │──▶│  Scorer  │──▶│ Retriever│
//! │ PDF / text │   │ 800 chars │   │ keywords │   │  top 3   │
//! └────────────┘   └───────────┘   └──────────┘   └────┬─────┘
//!                                                      ▼
//!                   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!                   │   HTTP   │◀──│   Chat   │◀──│  Prompt  │
//!                   │POST /chat│   │  model   │   │ assembly │
//!                   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export AZURE_INFERENCE_SDK_ENDPOINT=https://models.inference.ai.azure.com
//! export AZURE_INFERENCE_SDK_KEY=...
//! handbook search "vacation policy"     # inspect retrieval, no model call
//! handbook ask "How many vacation days do I get?"
//! handbook serve                        # POST /chat on 127.0.0.1:3001
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF / text extraction |
//! | [`chunk`] | Text chunking |
//! | [`search`] | Keyword scoring and ranking |
//! | [`retriever`] | Lazy, single-flight document cache |
//! | [`prompt`] | Conversation assembly |
//! | [`llm`] | Chat-completion client |
//! | [`chat`] | The `answer` operation |
//! | [`server`] | HTTP server |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod search;
pub mod server;

//! Lazily-loaded, single-flight document retriever.
//!
//! The [`Retriever`] owns the reference document for the whole process. The
//! first query triggers extraction and chunking; the result is cached and
//! never invalidated. Later queries are scored against the cached chunks.
//!
//! # States
//!
//! ```text
//!             retrieve()            Ok
//! Unloaded ───────────────▶ Loading ─────▶ Loaded (terminal)
//!    ▲                        │  │
//!    └───── task aborted ─────┘  │ Err
//!                                ▼
//!                           Unavailable ──retrieve()──▶ Loading
//! ```
//!
//! `Unavailable` is not permanent: every call made while the document is
//! unavailable attempts the load again, so a handbook dropped into place
//! after startup is picked up without a restart.
//!
//! Loading is single-flight. One caller spawns a task that runs the
//! [`DocumentLoader`] while the others wait on the load gate; waiters that
//! queued behind a completed attempt take its outcome instead of starting
//! another one. A caller that gives up waiting (for example on a request
//! deadline) leaves the task running, so a slow extraction still lands in
//! the cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::extract::{read_document, ExtractError};
use crate::models::ScoredChunk;
use crate::search::{rank, score_chunks};

/// Source of the reference document's plain text.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Human-readable location of the document, used in logs.
    fn describe(&self) -> String;

    /// Extract the full document text.
    async fn load(&self) -> Result<String, ExtractError>;
}

/// Loads the document from a file on disk.
///
/// `.pdf` files go through PDF extraction; anything else is read as UTF-8.
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<String, ExtractError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_document(&path))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))?
    }
}

/// The extracted document and its chunks.
#[derive(Debug)]
pub struct LoadedDocument {
    pub text: String,
    pub chunks: Vec<String>,
    /// SHA-256 of `text`, hex encoded.
    pub digest: String,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedDocument {
    fn new(text: String, chunk_size: usize) -> Self {
        let chunks = chunk_text(&text, chunk_size);
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self {
            text,
            chunks,
            digest,
            loaded_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
enum DocumentState {
    Unloaded,
    Loading,
    Loaded(Arc<LoadedDocument>),
    Unavailable { reason: String },
}

/// Snapshot of the document state, as reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DocumentStatus {
    Unloaded,
    Loading,
    Loaded {
        chunks: usize,
        chars: usize,
        digest: String,
        loaded_at: DateTime<Utc>,
    },
    Unavailable {
        reason: String,
    },
}

/// Marks the state `Loading` for the duration of one load task.
///
/// If the task ends without recording an outcome (the loader panicked, or
/// the runtime shut down mid-load), the state falls back to `Unloaded` so the
/// next caller can retry.
struct LoadingGuard {
    shared: Arc<Shared>,
    finished: bool,
}

impl LoadingGuard {
    fn begin(shared: Arc<Shared>) -> Self {
        shared.set_state(DocumentState::Loading);
        Self {
            shared,
            finished: false,
        }
    }

    fn finish(mut self, next: DocumentState) {
        self.shared.set_state(next);
        self.finished = true;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.set_state(DocumentState::Unloaded);
        }
    }
}

/// State shared between the retriever and its detached load tasks.
struct Shared {
    loader: Box<dyn DocumentLoader>,
    chunk_size: usize,
    state: RwLock<DocumentState>,
    /// Number of load attempts that ran to completion.
    attempts: AtomicU64,
}

impl Shared {
    fn set_state(&self, next: DocumentState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn loaded(&self) -> Option<Arc<LoadedDocument>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            DocumentState::Loaded(doc) => Some(Arc::clone(doc)),
            _ => None,
        }
    }

    /// Run one load attempt to completion and record its outcome.
    async fn load(self: Arc<Self>) -> Option<Arc<LoadedDocument>> {
        let guard = LoadingGuard::begin(Arc::clone(&self));
        debug!(source = %self.loader.describe(), "loading document");

        let outcome = match self.loader.load().await {
            Ok(text) => {
                let doc = Arc::new(LoadedDocument::new(text, self.chunk_size));
                info!(
                    source = %self.loader.describe(),
                    chunks = doc.chunks.len(),
                    "document loaded and chunked"
                );
                guard.finish(DocumentState::Loaded(Arc::clone(&doc)));
                Some(doc)
            }
            Err(e) => {
                warn!(source = %self.loader.describe(), error = %e, "document unavailable");
                guard.finish(DocumentState::Unavailable {
                    reason: e.to_string(),
                });
                None
            }
        };
        self.attempts.fetch_add(1, Ordering::AcqRel);

        outcome
    }
}

/// Scores the cached document chunks against incoming queries.
pub struct Retriever {
    shared: Arc<Shared>,
    top_k: usize,
    /// Held by the running load task until its outcome is recorded.
    load_gate: Arc<Mutex<()>>,
}

impl Retriever {
    pub fn new(loader: Box<dyn DocumentLoader>, chunk_size: usize, top_k: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                loader,
                chunk_size,
                state: RwLock::new(DocumentState::Unloaded),
                attempts: AtomicU64::new(0),
            }),
            top_k,
            load_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Build a retriever reading `document.path` with the configured bounds.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Box::new(FileLoader::new(&config.document.path)),
            config.chunking.chunk_size,
            config.retrieval.top_k,
        )
    }

    pub fn status(&self) -> DocumentStatus {
        match &*self.shared.state.read().unwrap_or_else(PoisonError::into_inner) {
            DocumentState::Unloaded => DocumentStatus::Unloaded,
            DocumentState::Loading => DocumentStatus::Loading,
            DocumentState::Loaded(doc) => DocumentStatus::Loaded {
                chunks: doc.chunks.len(),
                chars: doc.text.chars().count(),
                digest: doc.digest.clone(),
                loaded_at: doc.loaded_at,
            },
            DocumentState::Unavailable { reason } => DocumentStatus::Unavailable {
                reason: reason.clone(),
            },
        }
    }

    /// Return the cached document, loading it first if needed.
    ///
    /// The load itself runs on a detached task: dropping this future stops
    /// the wait, not the load, and the outcome is cached for later callers.
    /// Returns `None` when the document could not be extracted.
    pub async fn ensure_loaded(&self) -> Option<Arc<LoadedDocument>> {
        if let Some(doc) = self.shared.loaded() {
            return Some(doc);
        }

        let seen = self.shared.attempts.load(Ordering::Acquire);
        let gate = Arc::clone(&self.load_gate).lock_owned().await;

        // Someone finished an attempt while we queued; take their outcome.
        if self.shared.attempts.load(Ordering::Acquire) != seen {
            return self.shared.loaded();
        }
        if let Some(doc) = self.shared.loaded() {
            return Some(doc);
        }

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let outcome = shared.load().await;
            drop(gate);
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "document load task failed");
                None
            }
        }
    }

    /// Rank document chunks against `query`, best first, with scores.
    pub async fn retrieve_scored(&self, query: &str) -> Vec<ScoredChunk> {
        match self.ensure_loaded().await {
            Some(doc) => rank(score_chunks(&doc.chunks, query), self.top_k),
            None => Vec::new(),
        }
    }

    /// Return up to `top_k` relevant excerpts for `query`.
    ///
    /// Empty when the document is unavailable, the query has no usable
    /// terms, or nothing matched.
    pub async fn retrieve(&self, query: &str) -> Vec<String> {
        self.retrieve_scored(query)
            .await
            .into_iter()
            .map(|c| c.text)
            .collect()
    }
}

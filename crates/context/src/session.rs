//! Conversational session
//!
//! A session owns its memory and processes one turn at a time. Each turn
//! is classified, dispatched to the retrieval path for its tier and
//! answered; both sides of the exchange are written to memory.

use crate::pipeline::QueryEngine;
use crate::router::ComplexityTier;
use chrono::{DateTime, Utc};
use lexroute_common::errors::{AppError, Result};
use lexroute_common::memory::ConversationMemory;
use lexroute_common::metrics;
use lexroute_common::models::{ConversationTurn, Document};
use lexroute_search::SubqueryLedger;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// First AI turn of every session
pub const GREETING: &str =
    "Welcome to the Legal Assistant Bot. How can I help you today? Write `exit` to quit.";

/// Reply for tiers that get no retrieval
pub const OUT_OF_SCOPE_REPLY: &str = "I'm here to assist you with Legal queries. Please refrain yourself from asking question outside this scope and chit-chatting.";

/// Closing message shown when the sentinel is received
pub const FAREWELL: &str = "Chat ended! See ya.";

/// Case-insensitive input that ends a session
pub const EXIT_SENTINEL: &str = "exit";

pub fn is_exit_sentinel(query: &str) -> bool {
    query.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Retrieval output handed to the response generator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseContext {
    /// Out-of-scope tiers retrieve nothing
    None,
    /// Fused multi-query documents
    Documents { documents: Vec<Document> },
    /// Multi-hop transcript and the records behind it
    MultiHop { transcript: String, ledger: SubqueryLedger },
}

impl ResponseContext {
    /// Text of every document that backed the answer
    pub fn retrieved_contexts(&self) -> Vec<String> {
        match self {
            ResponseContext::None => Vec::new(),
            ResponseContext::Documents { documents } => {
                documents.iter().map(|d| d.content().to_string()).collect()
            }
            ResponseContext::MultiHop { ledger, .. } => {
                ledger.documents().map(|d| d.content().to_string()).collect()
            }
        }
    }
}

/// Result of one handled turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub tier: ComplexityTier,
    pub context: ResponseContext,
    pub response: String,
    /// True when classification failed and the default tier was used
    pub classification_fallback: bool,
}

/// Single-writer conversation state
pub struct Session {
    engine: Arc<QueryEngine>,
    memory: ConversationMemory,
    last_ledger: SubqueryLedger,
    closed: bool,
    /// Generate an answer for every tier instead of the canned reply
    answer_every_tier: bool,
    turns_handled: usize,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Open a session seeded with the greeting turn
    pub async fn start(engine: Arc<QueryEngine>) -> Self {
        let mut memory = engine.new_memory();
        if let Err(e) = memory.append(ConversationTurn::ai(GREETING)).await {
            tracing::warn!(error = %e, "Greeting stored without summary refresh");
        }

        Self {
            engine,
            memory,
            last_ledger: SubqueryLedger::new(),
            closed: false,
            answer_every_tier: false,
            turns_handled: 0,
            created_at: Utc::now(),
        }
    }

    /// Open a session for offline evaluation.
    ///
    /// Out-of-scope tiers still skip retrieval, but the query is answered
    /// by the response generator with empty context.
    pub async fn start_for_evaluation(engine: Arc<QueryEngine>) -> Self {
        let mut session = Self::start(engine).await;
        session.answer_every_tier = true;
        session
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Sub-query records of the most recent multi-hop turn, kept even when it failed
    pub fn last_ledger(&self) -> &SubqueryLedger {
        &self.last_ledger
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn turns_handled(&self) -> usize {
        self.turns_handled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Handle one user query.
    ///
    /// The exit sentinel closes the session and returns
    /// [`AppError::SessionClosed`] without contacting the oracle, as does
    /// any query sent to an already closed session.
    pub async fn handle_turn(&mut self, query: &str) -> Result<TurnOutcome> {
        if self.closed {
            return Err(AppError::SessionClosed);
        }
        if is_exit_sentinel(query) {
            self.closed = true;
            tracing::info!(turns = self.turns_handled, "Session closed by user");
            return Err(AppError::SessionClosed);
        }

        let start = Instant::now();
        let query = query.trim();

        let (tier, classification_fallback) =
            match self.engine.router().classify(query, &self.memory).await {
                Ok(tier) => (tier, false),
                Err(
                    e @ (AppError::Classification { .. }
                    | AppError::OracleTimeout { .. }
                    | AppError::OracleParse { .. }),
                ) => {
                    tracing::warn!(error = %e, "Classification failed, using default tier");
                    metrics::record_route(ComplexityTier::default().as_str());
                    (ComplexityTier::default(), true)
                }
                Err(e) => return Err(e),
            };

        if tier.is_out_of_scope() && !self.answer_every_tier {
            self.remember(ConversationTurn::ai(OUT_OF_SCOPE_REPLY)).await;
            let response = OUT_OF_SCOPE_REPLY.to_string();
            return Ok(self.finish(start, tier, ResponseContext::None, response, classification_fallback));
        }

        let context = match &tier {
            ComplexityTier::Complex => ResponseContext::Documents {
                documents: self.engine.expander().expand(query, &self.memory).await?,
            },
            ComplexityTier::MultiHop => {
                self.last_ledger = SubqueryLedger::new();
                self.engine
                    .orchestrator()
                    .run(query, &self.memory, &mut self.last_ledger)
                    .await?;
                ResponseContext::MultiHop {
                    transcript: self.last_ledger.render(),
                    ledger: self.last_ledger.clone(),
                }
            }
            ComplexityTier::SimpleConversation | ComplexityTier::Unrecognized(_) => ResponseContext::None,
        };

        self.remember(ConversationTurn::human(query)).await;

        let (documents, transcript) = match &context {
            ResponseContext::Documents { documents } => (documents.as_slice(), ""),
            ResponseContext::MultiHop { transcript, .. } => (&[][..], transcript.as_str()),
            ResponseContext::None => (&[][..], ""),
        };
        let response = self
            .engine
            .responder()
            .generate(&self.memory, documents, transcript)
            .await?;

        self.remember(ConversationTurn::ai(response.clone())).await;

        Ok(self.finish(start, tier, context, response, classification_fallback))
    }

    /// Append to memory; the turn is kept even if the summary refresh fails
    async fn remember(&mut self, turn: ConversationTurn) {
        if let Err(e) = self.memory.append(turn).await {
            tracing::warn!(error = %e, "Turn stored without summary refresh");
        }
    }

    fn finish(
        &mut self,
        start: Instant,
        tier: ComplexityTier,
        context: ResponseContext,
        response: String,
        classification_fallback: bool,
    ) -> TurnOutcome {
        self.turns_handled += 1;
        metrics::record_turn(start.elapsed().as_secs_f64(), tier.as_str());
        tracing::info!(
            tier = %tier,
            turn = self.turns_handled,
            contexts = context.retrieved_contexts().len(),
            "Turn handled"
        );

        TurnOutcome {
            tier,
            context,
            response,
            classification_fallback,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("memory", &self.memory)
            .field("closed", &self.closed)
            .field("turns_handled", &self.turns_handled)
            .field("created_at", &self.created_at)
            .finish()
    }
}

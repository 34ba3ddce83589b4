//! LexRoute Context Engine
//!
//! Turns a user query into an answer:
//! - Complexity routing
//! - Tier dispatch to multi-query or multi-hop retrieval
//! - Answer generation over the fused context
//! - Session turn handling and batch evaluation

pub mod evaluation;
pub mod pipeline;
pub mod responder;
pub mod router;
pub mod session;
pub mod telemetry;

pub use evaluation::{BatchEvaluator, EvaluationRecord, EvaluationRow};
pub use pipeline::QueryEngine;
pub use router::{ComplexityRouter, ComplexityTier};
pub use session::{ResponseContext, Session, TurnOutcome};

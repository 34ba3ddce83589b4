//! Core data model shared by every crate
//!
//! - `Document`: immutable retrieved text plus scalar metadata
//! - `ConversationTurn`: one human or AI utterance in a session

mod conversation;
mod document;

pub use conversation::{ConversationTurn, Role};
pub use document::{Document, MetadataValue, RankedList};

//! Windowed conversation memory with a rolling summary
//!
//! Every turn is retained (optionally capped), the most recent `window`
//! turns are kept verbatim for prompts, and everything older lives only in
//! a summary that is refreshed on every append past the window.

use crate::config::MemoryConfig;
use crate::errors::Result;
use crate::metrics;
use crate::models::ConversationTurn;
use crate::oracle::{Oracle, PromptTemplate};
use std::fmt;
use std::sync::Arc;

/// Default summarisation prompt; `{conversation}` receives the prior
/// summary followed by the current window
pub const SUMMARY_PROMPT: PromptTemplate = PromptTemplate::from_static(
    "You summarise conversations between a human and a legal assistant chatbot. \
Write a short, clear paragraph that keeps the facts, tone and direction of the \
conversation and drops repetition. Another system will read this summary in \
place of the older turns, so it must stand on its own.

Conversation:
{conversation}

Summary:",
);

/// Conversation history owned by a single session
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
    window: usize,
    max_history: Option<usize>,
    appended: usize,
    summary: String,
    summarizer: Arc<dyn Oracle>,
    template: PromptTemplate,
}

impl ConversationMemory {
    /// Memory keeping `2 * recall_depth` turns verbatim
    pub fn new(summarizer: Arc<dyn Oracle>, recall_depth: usize) -> Self {
        Self {
            turns: Vec::new(),
            window: recall_depth * 2,
            max_history: None,
            appended: 0,
            summary: String::new(),
            summarizer,
            template: SUMMARY_PROMPT,
        }
    }

    pub fn from_config(summarizer: Arc<dyn Oracle>, config: &MemoryConfig) -> Self {
        let memory = Self::new(summarizer, config.recall_depth);
        match config.max_history {
            Some(cap) => memory.with_max_history(cap),
            None => memory,
        }
    }

    /// Cap the retained history. The cap never drops below the window.
    pub fn with_max_history(mut self, cap: usize) -> Self {
        self.max_history = Some(cap.max(self.window));
        self
    }

    pub fn with_summary_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Store a turn, then refresh the summary once past the window.
    ///
    /// The turn is kept even when summarisation fails; the previous
    /// summary stays in place and the error is returned.
    pub async fn append(&mut self, turn: ConversationTurn) -> Result<()> {
        self.turns.push(turn);
        self.appended += 1;

        if let Some(cap) = self.max_history {
            if self.turns.len() > cap {
                let excess = self.turns.len() - cap;
                self.turns.drain(..excess);
            }
        }

        if !self.exceeds_window() {
            return Ok(());
        }

        let conversation = format!(
            "Previous Conversation Summary: {}\nLatest Turns:\n{}",
            self.summary,
            pretty_print(self.windowed_view())
        );
        let prompt = self.template.render(&[("conversation", &conversation)]);

        match self.summarizer.complete(&prompt).await {
            Ok(summary) => {
                metrics::record_summary(true);
                tracing::debug!(turns = self.appended, "Conversation summary refreshed");
                self.summary = summary;
                Ok(())
            }
            Err(e) => {
                metrics::record_summary(false);
                tracing::warn!(turns = self.appended, error = %e, "Summary refresh failed, keeping previous");
                Err(e)
            }
        }
    }

    /// Last `window` turns in arrival order, or every turn when fewer
    pub fn windowed_view(&self) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(self.window);
        &self.turns[start..]
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Retained turns (all of them unless a history cap applies)
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Turns appended over the lifetime of the session
    pub fn len(&self) -> usize {
        self.appended
    }

    pub fn is_empty(&self) -> bool {
        self.appended == 0
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn exceeds_window(&self) -> bool {
        self.appended > self.window
    }
}

/// Newline-joined `"{role}: {content}"` lines
pub fn pretty_print(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt rendering used for the `{memory}` and `{chat_history}` variables
impl fmt::Display for ConversationMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exceeds_window() {
            write!(
                f,
                "Last {} turns of the Conversation:\n\n{}\n\nPrevious Conversation Summary: {}",
                self.window,
                pretty_print(self.windowed_view()),
                self.summary
            )
        } else {
            write!(f, "Latest Conversation:\n\n{}", pretty_print(self.windowed_view()))
        }
    }
}

impl fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("turns", &self.turns.len())
            .field("appended", &self.appended)
            .field("window", &self.window)
            .field("max_history", &self.max_history)
            .field("summary", &self.summary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::models::Role;
    use crate::oracle::{ScriptedOracle, ScriptedReply};

    fn numbered_summaries() -> Arc<ScriptedOracle> {
        Arc::new(ScriptedOracle::new(
            (1..=20).map(|i| ScriptedReply::Text(format!("summary {}", i))).collect(),
        ))
    }

    async fn fill(memory: &mut ConversationMemory, count: usize) {
        for i in 0..count {
            let turn = if i % 2 == 0 {
                ConversationTurn::ai(format!("answer {}", i))
            } else {
                ConversationTurn::human(format!("question {}", i))
            };
            memory.append(turn).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_window_view_after_overflow() {
        let oracle = numbered_summaries();
        let mut memory = ConversationMemory::new(oracle, 2);
        fill(&mut memory, 5).await;

        let view: Vec<_> = memory.windowed_view().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(view, vec!["question 1", "answer 2", "question 3", "answer 4"]);
        assert_eq!(memory.turns().len(), 5);
    }

    #[tokio::test]
    async fn test_summary_starts_past_window_and_chains() {
        let oracle = numbered_summaries();
        let mut memory = ConversationMemory::new(oracle.clone(), 2);

        fill(&mut memory, 4).await;
        assert!(oracle.prompts().is_empty());
        assert_eq!(memory.summary(), "");

        memory.append(ConversationTurn::human("fifth")).await.unwrap();
        assert_eq!(oracle.prompts().len(), 1);
        assert_eq!(memory.summary(), "summary 1");
        assert!(oracle.prompts()[0].contains("Previous Conversation Summary: \nLatest Turns:\n"));

        memory.append(ConversationTurn::ai("sixth")).await.unwrap();
        assert_eq!(oracle.prompts().len(), 2);
        assert!(oracle.prompts()[1].contains("Previous Conversation Summary: summary 1\n"));
        assert!(oracle.prompts()[1].contains("ai: sixth"));
        assert_eq!(memory.summary(), "summary 2");
    }

    #[tokio::test]
    async fn test_failed_summary_keeps_turn_and_previous_summary() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            ScriptedReply::Text("kept".into()),
            ScriptedReply::Timeout,
        ]));
        let mut memory = ConversationMemory::new(oracle, 1);

        memory.append(ConversationTurn::ai("hello")).await.unwrap();
        memory.append(ConversationTurn::human("q1")).await.unwrap();
        memory.append(ConversationTurn::ai("a1")).await.unwrap();
        assert_eq!(memory.summary(), "kept");

        let err = memory.append(ConversationTurn::human("q2")).await.unwrap_err();
        assert!(matches!(err, AppError::OracleTimeout { .. }));
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.windowed_view().last().map(|t| t.role), Some(Role::Human));
        assert_eq!(memory.summary(), "kept");
    }

    #[tokio::test]
    async fn test_history_cap_preserves_window_semantics() {
        let oracle = numbered_summaries();
        let mut memory = ConversationMemory::new(oracle.clone(), 1).with_max_history(1);
        fill(&mut memory, 4).await;

        // cap is raised to the window
        assert_eq!(memory.turns().len(), 2);
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.windowed_view().len(), 2);
        assert_eq!(oracle.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_rendering() {
        let oracle = numbered_summaries();
        let mut memory = ConversationMemory::new(oracle, 1);

        memory.append(ConversationTurn::ai("Welcome.")).await.unwrap();
        assert_eq!(memory.to_string(), "Latest Conversation:\n\nai: Welcome.");

        memory.append(ConversationTurn::human("Define bail.")).await.unwrap();
        memory.append(ConversationTurn::ai("Release pending trial.")).await.unwrap();
        assert_eq!(
            memory.to_string(),
            "Last 2 turns of the Conversation:\n\nhuman: Define bail.\nai: Release pending trial.\n\nPrevious Conversation Summary: summary 1"
        );
    }
}

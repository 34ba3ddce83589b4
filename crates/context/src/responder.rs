//! Final answer generation
//!
//! Builds the answer prompt from the conversation, the fused documents
//! (numbered by rank) and the multi-hop transcript.

use lexroute_common::errors::Result;
use lexroute_common::memory::ConversationMemory;
use lexroute_common::models::Document;
use lexroute_common::oracle::{Oracle, PromptTemplate};
use std::fmt::Write as _;
use std::sync::Arc;

/// Default answer prompt
pub const ANSWER_PROMPT: PromptTemplate = PromptTemplate::from_static(
    "You are a legal assistant. Answer the user's latest message using only the documents \
below. Cite the provisions you rely on by section number. If the documents do not contain \
the answer, say so plainly instead of guessing.

{chat_history}

Retrieved documents:{context}
{multi_hop_context}

Answer:",
);

/// Numbered document block; starts with a newline even when empty
pub fn render_context(documents: &[Document]) -> String {
    let mut context = String::from("\n");
    for (rank, document) in documents.iter().enumerate() {
        let _ = writeln!(context, "Relevant Document: {}::\n{}", rank + 1, document.content());
    }
    context
}

/// Produces the assistant reply for a turn
pub struct ResponseGenerator {
    oracle: Arc<dyn Oracle>,
    template: PromptTemplate,
}

impl ResponseGenerator {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            template: ANSWER_PROMPT,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub async fn generate(
        &self,
        memory: &ConversationMemory,
        documents: &[Document],
        multi_hop_context: &str,
    ) -> Result<String> {
        let chat_history = memory.to_string();
        let context = render_context(documents);
        let prompt = self.template.render(&[
            ("chat_history", &chat_history),
            ("context", &context),
            ("multi_hop_context", multi_hop_context),
        ]);

        let answer = self.oracle.complete(&prompt).await?;
        tracing::debug!(
            documents = documents.len(),
            multi_hop = !multi_hop_context.is_empty(),
            answer_len = answer.len(),
            "Response generated"
        );
        Ok(answer)
    }
}

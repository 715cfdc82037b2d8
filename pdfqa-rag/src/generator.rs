//! Answer generator trait and the offline extractive generator.

use async_trait::async_trait;

use crate::error::Result;
use crate::prompt::{CONTEXT_SEPARATOR, DONT_KNOW_SENTINEL, context_from_prompt};

/// Turns a grounding prompt into an answer.
///
/// Implementations are opaque to the pipeline: prompt string in, answer
/// string out. Failures must be reported as
/// [`RagError::Generation`](crate::RagError::Generation).
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Name of the model or strategy behind this generator.
    fn name(&self) -> &str;
}

/// A generator that answers with the most similar retrieved passage.
///
/// It reads the context block back out of the prompt and returns its first
/// passage verbatim, or [`DONT_KNOW_SENTINEL`] when there is none. Used when
/// no language model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let passage = context_from_prompt(prompt)
            .and_then(|context| context.split(CONTEXT_SEPARATOR).map(str::trim).find(|p| !p.is_empty()));
        Ok(passage.map_or_else(|| DONT_KNOW_SENTINEL.to_string(), str::to_string))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::build_prompt;

    #[tokio::test]
    async fn answers_with_first_passage() {
        let prompt = build_prompt("Alpha beta gamma.\n\nDelta epsilon.", "What is alpha?");
        assert_eq!(ExtractiveGenerator.generate(&prompt).await.unwrap(), "Alpha beta gamma.");
    }

    #[tokio::test]
    async fn empty_context_means_dont_know() {
        let prompt = build_prompt("", "Anything?");
        assert_eq!(ExtractiveGenerator.generate(&prompt).await.unwrap(), DONT_KNOW_SENTINEL);
    }
}

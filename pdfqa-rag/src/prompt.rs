//! Grounding context assembly and the answer prompt.

use crate::document::SearchResult;

/// Reply the generator must give when the context is insufficient.
pub const DONT_KNOW_SENTINEL: &str = "I don't know based on the given context.";

/// Reply the generator must give when the question's subject is not in the document.
pub const NOT_FROM_DOCUMENT_SENTINEL: &str =
    "The question or topic is not from the PDF you provided.";

/// Separator between retrieved chunks inside the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub(crate) const CONTEXT_HEADER: &str = "Context:";
pub(crate) const QUESTION_HEADER: &str = "Question:";

/// Join retrieved chunk texts with a blank line, keeping retrieval order.
pub fn assemble_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Build the instruction prompt handed to the answer generator.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert assistant answering questions based on the provided PDF context.

{CONTEXT_HEADER}
{context}

{QUESTION_HEADER}
{question}

Instructions:
- Answer the question using only the information from the context.
- If the context does not contain enough information, reply: \"{DONT_KNOW_SENTINEL}\"
- If the question or topic is not present in the provided PDF or its chunks, reply: \"{NOT_FROM_DOCUMENT_SENTINEL}\"
- Use clear and simple English in your response.
- Do not make up information.

Provide a detailed and accurate answer.
"
    )
}

/// Recover the context block from a prompt produced by [`build_prompt`].
pub(crate) fn context_from_prompt(prompt: &str) -> Option<&str> {
    let start = prompt.find(CONTEXT_HEADER)? + CONTEXT_HEADER.len();
    let end = prompt.rfind(QUESTION_HEADER)?;
    (start <= end).then(|| prompt[start..end].trim())
}

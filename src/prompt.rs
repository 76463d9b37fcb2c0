//! Prompt assembly and the "I DON'T KNOW" sentinel contract.
//!
//! [`assemble`] renders the grounded prompt sent to the generator. The
//! generator is instructed to reply with exactly [`SENTINEL`] when the material
//! does not contain the answer; callers detect that with [`is_no_answer`] and
//! switch to [`ungrounded_prompt`] (see [`resolve_prompt`]).

use crate::document::Chunk;

/// Literal reply meaning "no grounded answer available".
pub const SENTINEL: &str = "I DON'T KNOW";

const STYLE_RULES: &str = "\
Do not include introductory or concluding phrases. Avoid numbered lists or bullet points.
The user's goal is to build a concept map to visually explain the response.
To support this goal, provide a well-structured response in multiple paragraphs.
Each paragraph should cover a central aspect or topic of the answer.
Each paragraph must contain fewer than 10 sentences, and the full response should consist of 2 paragraphs total.
When multiple facts refer to the same entity or are logically connected (e.g., observations, causes, consequences), write them as a single compound sentence. Use explicit conjunctions or subordinating structures to preserve the connection.
Do not split logically linked ideas into separate sentences, especially when they share the same subject or concept.
Avoid pronouns, relative clauses, and vague references such as \"this\", \"which\", \"they\", or \"such\".
Instead, always restate the subject explicitly to maintain clarity and enable consistent annotation.
If the same concept appears in multiple sentences, use exactly the same wording to refer to it, to ensure proper linking in the concept map.
Use precise, noun-based terminology for key entities, and clear, verb-based phrases for relationships.";

/// Renders the grounded prompt: chunk texts joined by blank lines, the
/// verbatim question, the style rules and the sentinel instruction.
pub fn assemble(question: &str, top_chunks: &[Chunk]) -> String {
    let material = top_chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let mut prompt = String::with_capacity(material.len() + STYLE_RULES.len() + 512);
    prompt.push_str("Based on the following material retrieved from PDF documents:\n");
    prompt.push_str(&material);
    prompt.push_str(
        "\nWrite a structured, technically accurate explanation that addresses the question: \"",
    );
    prompt.push_str(question);
    prompt.push_str("\".\n");
    prompt.push_str(STYLE_RULES);
    prompt.push_str(&format!(
        "\nIf the answer is not present in the material, you must say only \"{SENTINEL}\" and nothing else.\n"
    ));
    prompt
}

/// True when `reply` is the sentinel, optionally followed by one period.
pub fn is_no_answer(reply: &str) -> bool {
    let reply = reply.trim();
    reply == SENTINEL || reply.strip_suffix('.') == Some(SENTINEL)
}

/// Prompt used when retrieval produced no grounded context.
pub fn ungrounded_prompt(question: &str) -> String {
    format!(
        "Write a structured, technically accurate explanation that addresses the question: \"{question}\".\n{STYLE_RULES}\n"
    )
}

/// Caller side of the sentinel contract: fall back to the ungrounded prompt on
/// the sentinel, otherwise prefix the grounded context to the question.
pub fn resolve_prompt(context: &str, question: &str) -> String {
    if is_no_answer(context) {
        ungrounded_prompt(question)
    } else {
        format!("{context}\n\n{question}")
    }
}

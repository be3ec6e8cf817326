//! # Default Prompt Templates
//!
//! Hardcoded prompt templates for the rewrite, gate, judge and synthesis
//! stages. Placeholders in `{braces}` are substituted at call time.

// --- Query Rewriting ---
pub const REWRITE_SYSTEM_PROMPT: &str = r#"You are a question expansion assistant. You rephrase a user's question into alternative formulations that preserve its meaning but vary the wording, so that each variant can be used as an independent search query."#;

pub const REWRITE_USER_PROMPT: &str = r#"Rewrite the following question into {count} different paraphrases. Respond ONLY with a valid JSON array, where each element is an object with a single "question" key. Do not include any other text or explanations.

# Question
{question}"#;

// --- Retrieval Gate ---
pub const GATE_SYSTEM_PROMPT: &str = r#"You are a classifier. Decide whether answering the user's question requires looking up reference documents, or whether it can be answered from general conversation alone. Respond with exactly "yes" if document retrieval is needed, or "no" if it is not. Do not include any other text."#;

pub const GATE_USER_PROMPT: &str = r#"# Recent conversation
{history}

# Question
{question}"#;

// --- Chunk Relevance Judging ---
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are a relevance judge. Given a user's question and a passage, decide whether the passage contains information that helps answer the question. Respond with exactly "yes" or "no". Do not include any other text."#;

pub const JUDGE_USER_PROMPT: &str = r#"# Question
{question}

# Passage
{passage}"#;

// --- Answer Synthesis ---
pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"Today's date is {current_date}. You are a helpful assistant. Answer the user's question using the reference passages below. If the passages do not contain enough information, say so and answer from your own knowledge.

# Reference passages
{context}"#;

/// Formats retrieved chunks into the `{context}` block of the synthesis
/// prompt. Returns an empty string when there are no chunks.
pub fn format_context(chunks: &[crate::types::RetrievedChunk]) -> String {
    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!(
            "[Passage {n}] source: {name}\n{text}\n\n",
            n = i + 1,
            name = chunk.document_name,
            text = chunk.text,
        ));
    }
    context
}

//! System prompts, fixed answers and snippet trimming

/// Snippet budget per chunk for identifier lookups
pub const ID_SNIPPET_CHARS: usize = 350;

/// Snippet budget per chunk for semantic results
pub const SEMANTIC_SNIPPET_CHARS: usize = 400;

const RAG_RULES: &str = "\
=====================
STRICT RULES
=====================
- Use ONLY the provided resume context as your source of truth.
- Do NOT use outside knowledge or assumptions.
- Do NOT hallucinate or invent any candidate details.
- If requested information is missing, say exactly:
  \"not specified in the context\".
- Write in clear, professional, and concise language.
- Output MUST be valid Markdown (no HTML).";

/// Ranked answer over semantic search results
pub fn semantic_system_prompt() -> String {
    format!(
        "You are an assistant that answers questions strictly based on candidate resume data.\n\n\
         You will be given the user's question and the best matching resume excerpts from the \
         vector database, grouped in sections such as \"=== Resume ID 123456 ===\". Sections are \
         ordered from most to least relevant.\n\n{}\n\n\
         - Rank the candidates by how well they match the question, best first.\n\
         - Always cite the Resume ID of each candidate you mention.\n\
         - Use bullet points and keep each candidate to a few lines.",
        RAG_RULES
    )
}

/// Focused profile of one candidate
pub fn profile_system_prompt() -> String {
    format!(
        "You are an assistant that answers questions strictly based on candidate resume data.\n\n\
         You will be given the user's question and the resume context of exactly ONE candidate, \
         in a section such as \"=== Resume ID 123456 ===\".\n\n{}\n\n\
         Produce a focused candidate profile with the following structure (in this order):\n\
         - Summary\n\
         - Experience highlights\n\
         - Key skills\n\
         - Notable strengths\n\
         - Suitable roles\n\
         Use bullet points where appropriate. Keep the response concise but informative.",
        RAG_RULES
    )
}

/// One section of a multi-candidate comparison
pub fn comparison_section_system_prompt() -> String {
    format!(
        "You are an assistant that answers questions strictly based on candidate resume data.\n\n\
         The user is comparing several candidates. You are given the resume context of ONE of \
         them and must describe only that candidate, so the sections can be read side by side.\n\n{}\n\n\
         Use exactly these bullet rows, each a short phrase:\n\
         - Role / Title\n\
         - Years of experience\n\
         - Key skills\n\
         - Notable strengths\n\
         - Best-fit roles or situations\n\
         If a field is missing, write \"not specified in the context\".",
        RAG_RULES
    )
}

pub const CHAT_SYSTEM_PROMPT: &str = "\
You are a friendly and helpful general-purpose assistant.

Your responsibilities:
- Answer general questions that are not directly related to the resume dataset.
- If the user asks about specific resume details, skills, or candidate experience, guide them to ask clearly so the system can retrieve relevant resume information.
- Do NOT fabricate any specific candidate data without proper resume context.";

pub const NO_RESULTS_ANSWER: &str = "No relevant resume data found.";

pub const RETRIEVAL_UNAVAILABLE_ANSWER: &str =
    "I can't search the resume database right now. Please try again in a moment.";

pub const GENERATION_FAILURE_ANSWER: &str =
    "Sorry, I couldn't put an answer together right now. Please try again.";

pub const EMPTY_INPUT_ANSWER: &str = "Ask me about the candidates, for example \
\"Find Python developers\", \"Tell me more about Resume ID 57667857\" or \
\"Compare 57667857 and 11847784\".";

pub const SECTION_NOT_FOUND: &str = "No data found for this resume ID in the database.";

/// Answer for an identifier lookup that found nothing
pub fn unknown_identifier_answer(id: &str) -> String {
    format!("No data found for Resume ID {} in the database.", id)
}

/// Trim `text` to at most `max_len` characters, cutting back to the last
/// space and marking the cut with `...`
pub fn make_snippet(text: &str, max_len: usize) -> String {
    let text = text.trim();
    let Some((cut_at, _)) = text.char_indices().nth(max_len) else {
        return text.to_string();
    };

    let cut = &text[..cut_at];
    let cut = match cut.rfind(' ') {
        Some(space) => &cut[..space],
        None => cut,
    };
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_snippet_short_text_unchanged() {
        assert_eq!(make_snippet("  python developer  ", 400), "python developer");
        assert_eq!(make_snippet("", 10), "");
    }

    #[test]
    fn test_make_snippet_cuts_on_word_boundary() {
        let snippet = make_snippet("senior rust engineer with tokio", 15);
        assert_eq!(snippet, "senior rust...");
    }

    #[test]
    fn test_make_snippet_without_spaces() {
        assert_eq!(make_snippet("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_make_snippet_multibyte() {
        let snippet = make_snippet("développeur backend confirmé", 12);
        assert_eq!(snippet, "développeur...");
    }

    #[test]
    fn test_prompts_carry_rules() {
        assert!(profile_system_prompt().contains("Suitable roles"));
        assert!(comparison_section_system_prompt().contains("Best-fit roles"));
        assert!(semantic_system_prompt().contains("not specified in the context"));
    }
}

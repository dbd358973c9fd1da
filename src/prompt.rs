//! Prompt text

/// Tutor instructions prefixed onto every user message.
///
/// Answer-style selection (table, summary, bullets, quiz) lives entirely in
/// this text; no code inspects the question or the answer's shape.
pub const INSTRUCTION_PROMPT: &str = "
You are an AI based tutor, who can help study the user on the basis of documents, where the user can ask particular question and get the answer in the format they wants,

Carefully analyze the following text. and follow the instructions and then only answer the questions:

* If the user asks for comparisions and differences provide a response that shows the results in a tabular form.
* If the user ask for summary of a certain concept, answer the question in just two concise paragraphs.
* If the user asks for a detailed answer, use bullet points and formatted text to answer the question.
* Also help the user to have to study through quiz in Multiple Choice Questions format, where you would ask a question and test the user proficiency, must not give correct options.
";

/// Question-answering template wrapped around the retrieved context
const TEXT_QA_TEMPLATE: &str = "Context information is below.
---------------------
{context_str}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {query_str}
Answer: ";

/// Instruction prompt immediately followed by the user's text, unmodified
pub fn compose_query(message: &str) -> String {
    let mut query = String::with_capacity(INSTRUCTION_PROMPT.len() + message.len());
    query.push_str(INSTRUCTION_PROMPT);
    query.push_str(message);
    query
}

/// Render the final LLM prompt from the kept passages and the query
pub fn render_qa_prompt<'a>(passages: impl IntoIterator<Item = &'a str>, query: &str) -> String {
    let context = passages.into_iter().collect::<Vec<_>>().join("\n\n");

    // Single pass over the template; substituted text is never rescanned
    let mut prompt = String::with_capacity(TEXT_QA_TEMPLATE.len() + context.len() + query.len());
    let mut rest = TEXT_QA_TEMPLATE;
    while let Some(open) = rest.find('{') {
        prompt.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context_str}") {
            prompt.push_str(&context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{query_str}") {
            prompt.push_str(query);
            rest = after;
        } else {
            prompt.push('{');
            rest = &tail[1..];
        }
    }
    prompt.push_str(rest);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_is_plain_concatenation() {
        let message = "  compare X and Y\n";
        let query = compose_query(message);
        assert_eq!(query, format!("{}{}", INSTRUCTION_PROMPT, message));
        assert!(query.ends_with(message));
    }

    #[test]
    fn test_compose_empty_message() {
        assert_eq!(compose_query(""), INSTRUCTION_PROMPT);
    }

    #[test]
    fn test_render_qa_prompt() {
        let prompt = render_qa_prompt(
            ["Paris is the capital of France.", "Berlin is in Germany."],
            "What is the capital of France?",
        );

        assert!(prompt.starts_with("Context information is below."));
        assert!(prompt.contains("Paris is the capital of France.\n\nBerlin is in Germany."));
        assert!(prompt.ends_with("Query: What is the capital of France?\nAnswer: "));
    }

    #[test]
    fn test_render_does_not_expand_placeholders_in_query() {
        let prompt = render_qa_prompt(["ctx"], "what is {context_str}?");
        assert!(prompt.contains("Query: what is {context_str}?"));
        assert!(prompt.contains("---------------------\nctx\n---------------------"));
    }

    #[test]
    fn test_render_does_not_expand_placeholders_in_passages() {
        let prompt = render_qa_prompt(
            ["Templates use {query_str} and {context_str} markers."],
            "Q?",
        );

        assert!(prompt.contains("Templates use {query_str} and {context_str} markers."));
        assert!(!prompt.contains("use Q?"));
        assert!(prompt.ends_with("Query: Q?\nAnswer: "));
        assert_eq!(prompt.matches("Q?").count(), 1);
    }
}

//! Prompt assembly for extraction tasks.
//!
//! Prompts stay minimal: an instruction line, a few worked examples, and the
//! field-relevant slice of the document. Context is capped so small models
//! are never handed more text than they can use.

use crate::models::FieldSpec;

/// Maximum characters of document context included in a prompt.
pub const MAX_CONTEXT_CHARS: usize = 12_000;

/// Assemble the prompt for one field from its context lines.
pub fn build_prompt(field: &FieldSpec, context: &[String]) -> String {
    let mut prompt = String::from(field.instruction);

    if !field.examples.is_empty() {
        prompt.push_str("\n\nExamples:");
        for example in field.examples {
            prompt.push_str("\nText: ");
            prompt.push_str(example.text);
            prompt.push_str("\nExtraction: ");
            prompt.push_str(example.result);
        }
    }

    let joined = context.join("\n");
    prompt.push_str("\n\nText to analyze:\n");
    prompt.push_str(truncate_utf8(&joined, MAX_CONTEXT_CHARS));
    prompt.push_str("\n\nExtraction:");
    prompt
}

/// Truncate to a byte budget without splitting a UTF-8 character.
fn truncate_utf8(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BUILTIN_FIELDS;

    #[test]
    fn prompt_contains_instruction_examples_and_context() {
        let field = BUILTIN_FIELDS.iter().find(|f| f.name == "date").unwrap();
        let prompt = build_prompt(field, &["6 January 1986. Dear Friends,".to_string()]);
        assert!(prompt.contains("Extract the date"));
        assert!(prompt.contains("1986-01-06"));
        assert!(prompt.contains("Text to analyze:\n6 January 1986. Dear Friends,"));
        assert!(prompt.ends_with("Extraction:"));
    }

    #[test]
    fn long_context_is_capped() {
        let field = BUILTIN_FIELDS.iter().find(|f| f.name == "description").unwrap();
        let context = vec!["line of body text".repeat(100); 100];
        let prompt = build_prompt(field, &context);
        assert!(prompt.len() < MAX_CONTEXT_CHARS + 2_000);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo wörld".repeat(50);
        let cut = truncate_utf8(&text, 101);
        assert!(cut.len() <= 101);
        assert!(text.starts_with(cut));
    }
}

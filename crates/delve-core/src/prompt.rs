//! Prompt assembly and the snippet listing shown when generation is unavailable.

use std::fmt::Write;

use delve_index::clean_code;
use delve_memory::Chunk;

/// A reranked chunk ready for the prompt: labelled by file name, comments stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnippet {
    pub name: String,
    pub code: String,
}

impl ContextSnippet {
    #[must_use]
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let name = match chunk.basename() {
            "" => "unknown".to_owned(),
            base => base.to_owned(),
        };
        Self {
            name,
            code: clean_code(&chunk.text),
        }
    }
}

#[must_use]
pub fn build_prompt(query: &str, snippets: &[ContextSnippet]) -> String {
    let context = snippets
        .iter()
        .map(|s| format!("Source: {}\nCode:\n{}", s.name, s.code))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a professional coding assistant. Use the following code snippets to answer \
         the user's question.\n\
         Detailed and accurate answers are prioritized. If you don't know, say so.\n\n\
         Question: {query}\n\n\
         Code Context:\n{context}\n\n\
         Answer:"
    )
}

/// Markdown listing of the retrieved snippets, each cut to `max_chars` characters.
#[must_use]
pub fn format_fallback(snippets: &[ContextSnippet], max_chars: usize) -> String {
    let mut out = String::from(
        "### Note: Ollama is not running\n\n\
         I couldn't connect to the local AI model (Ollama). \
         Here are the most relevant code snippets I found:\n\n",
    );
    for (i, snippet) in snippets.iter().enumerate() {
        let excerpt: String = snippet.code.chars().take(max_chars).collect();
        let _ = write!(
            out,
            "**{}. {}**\n```\n{excerpt}...\n```\n\n",
            i + 1,
            snippet.name
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(name: &str, code: &str) -> ContextSnippet {
        ContextSnippet {
            name: name.into(),
            code: code.into(),
        }
    }

    #[test]
    fn snippet_uses_basename_and_cleaned_code() {
        let chunk = Chunk {
            id: "chunk_0".into(),
            text: "# comment\nprint(\"Hello\")\n".into(),
            source_path: "/repo/scripts/hello.py".into(),
        };
        let s = ContextSnippet::from_chunk(&chunk);
        assert_eq!(s.name, "hello.py");
        assert_eq!(s.code, "print(\"Hello\")");
    }

    #[test]
    fn prompt_contains_question_and_labelled_context() {
        let prompt = build_prompt(
            "what does main do?",
            &[snippet("main.rs", "fn main() {}"), snippet("lib.rs", "pub mod a;")],
        );
        assert!(prompt.starts_with("You are a professional coding assistant."));
        assert!(prompt.contains("Question: what does main do?\n\nCode Context:\n"));
        assert!(prompt.contains("Source: main.rs\nCode:\nfn main() {}\n\nSource: lib.rs"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn prompt_with_no_context_still_asks() {
        let prompt = build_prompt("anything?", &[]);
        assert!(prompt.contains("Code Context:\n\n\nAnswer:"));
    }

    #[test]
    fn fallback_lists_numbered_truncated_snippets() {
        let long = "x".repeat(1000);
        let text = format_fallback(&[snippet("a.rs", &long), snippet("b.rs", "short")], 800);
        assert!(text.starts_with("### Note: Ollama is not running"));
        assert!(text.contains(&format!("**1. a.rs**\n```\n{}...\n```", "x".repeat(800))));
        assert!(!text.contains(&"x".repeat(801)));
        assert!(text.contains("**2. b.rs**\n```\nshort...\n```"));
    }

    #[test]
    fn fallback_truncates_on_char_boundaries() {
        let text = format_fallback(&[snippet("u.txt", "ééé")], 2);
        assert!(text.contains("```\néé...\n```"));
    }
}

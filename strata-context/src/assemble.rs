//! Bounded context assembly for retrieved passages.
//!
//! Takes ranked passages straight out of a similarity query and produces the
//! prompt context handed to a downstream generation step: each passage is
//! rendered with a provenance header, passages are concatenated in rank
//! order, and the total output never exceeds the caller's character budget.
//! A passage that would overflow the budget is omitted whole; chunk text is
//! never truncated mid-passage, so a later, smaller passage may still fit.
//!
//! The returned [`AssembledContext`] also lists the ids of every included
//! record so callers can cite their sources.

use serde::Serialize;

/// A ranked passage, as produced by a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    /// Stable record identifier, returned for citation.
    pub id: String,
    /// Source path of the originating document.
    pub source: String,
    /// Index of the chunk within its document.
    pub chunk_index: usize,
    /// The chunk text.
    pub text: String,
}

/// The assembled context string plus the ids of the records it includes,
/// in the order they appear.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub text: String,
    pub included: Vec<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

fn render(passage: &Passage) -> String {
    format!(
        "passage: {{\"source\": \"{}\", \"chunk\": {}}}\n{}\n\n",
        passage.source, passage.chunk_index, passage.text
    )
}

/// Assemble ranked passages into a context string of at most `max_chars`
/// characters. Deterministic for identical input and budget.
pub fn assemble(passages: &[Passage], max_chars: usize) -> AssembledContext {
    let mut text = String::new();
    let mut included = Vec::new();
    let mut used = 0usize;

    for passage in passages {
        let block = render(passage);
        let block_chars = block.chars().count();
        if used + block_chars > max_chars {
            continue;
        }
        used += block_chars;
        text.push_str(&block);
        included.push(passage.id.clone());
    }

    AssembledContext { text, included }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, text: &str) -> Passage {
        Passage {
            id: id.to_string(),
            source: "models/orders.yml".to_string(),
            chunk_index: 0,
            text: text.to_string(),
        }
    }

    #[test]
    fn includes_passages_in_rank_order() {
        let passages = vec![passage("a", "first"), passage("b", "second")];
        let context = assemble(&passages, 10_000);

        assert_eq!(context.included, vec!["a", "b"]);
        let first = context.text.find("first").unwrap();
        let second = context.text.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn headers_carry_provenance() {
        let passages = vec![Passage {
            id: "a".to_string(),
            source: "macros/dedupe.sql".to_string(),
            chunk_index: 3,
            text: "select 1".to_string(),
        }];
        let context = assemble(&passages, 10_000);

        assert!(
            context
                .text
                .contains("passage: {\"source\": \"macros/dedupe.sql\", \"chunk\": 3}")
        );
    }

    #[test]
    fn never_exceeds_budget() {
        let passages: Vec<Passage> = (0..20)
            .map(|i| passage(&format!("p{i}"), &"x".repeat(120)))
            .collect();
        for budget in [0, 50, 200, 500, 1000] {
            let context = assemble(&passages, budget);
            assert!(context.text.chars().count() <= budget);
        }
    }

    #[test]
    fn overflowing_passage_is_omitted_whole() {
        let passages = vec![passage("big", &"x".repeat(500)), passage("small", "tiny")];
        let context = assemble(&passages, 100);

        // The large passage is dropped entirely, never cut; the smaller
        // lower-ranked passage still fits.
        assert_eq!(context.included, vec!["small"]);
        assert!(!context.text.contains("xxx"));
        assert!(context.text.contains("tiny"));
    }

    #[test]
    fn included_text_is_never_truncated() {
        let passages = vec![passage("a", &"y".repeat(80)), passage("b", &"z".repeat(80))];
        let context = assemble(&passages, 150);

        assert!(!context.included.is_empty());
        for id in &context.included {
            let body = if id == "a" { "y".repeat(80) } else { "z".repeat(80) };
            assert!(context.text.contains(&body));
        }
    }

    #[test]
    fn empty_input_yields_empty_context() {
        let context = assemble(&[], 1000);
        assert!(context.is_empty());
        assert!(context.text.is_empty());
    }

    #[test]
    fn zero_budget_includes_nothing() {
        let passages = vec![passage("a", "anything")];
        let context = assemble(&passages, 0);
        assert!(context.is_empty());
    }
}

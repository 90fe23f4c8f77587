use crate::error::Result;
use crate::gemini_service::Completer;
use crate::models::{Answer, Chunk};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

pub struct Answerer {
    completer: Arc<dyn Completer>,
}

impl Answerer {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    pub async fn answer(&self, chunks: &[Chunk], query: &str) -> Result<Answer> {
        let context = build_context(chunks);
        let prompt = build_prompt(query, &context);

        log::debug!("Requesting answer grounded on {} chunks", chunks.len());
        let output_text = self.completer.complete(&prompt).await?;
        Ok(Answer { output_text })
    }
}

impl Answer {
    /// The answer body, without the trailing `SOURCES:` section.
    pub fn display_text(&self) -> &str {
        match last_sources_marker(&self.output_text) {
            Some(marker) => self.output_text[..marker.start()].trim(),
            None => self.output_text.trim(),
        }
    }
}

/// The final `SOURCES:` marker. Upper case matches anywhere; other casings
/// only count at the start of a line, so prose like "energy sources:" is kept.
fn last_sources_marker(text: &str) -> Option<regex::Match<'_>> {
    sources_marker().find_iter(text).last()
}

/// Resolves the identifiers listed after the answer's `SOURCES:` marker to the
/// retrieved chunks, keeping retrieval order. When the marker is missing or
/// names nothing that was retrieved, every retrieved chunk is returned.
pub fn get_sources(answer: &Answer, retrieved: &[Chunk]) -> Vec<Chunk> {
    let Some(marker) = last_sources_marker(&answer.output_text) else {
        log::debug!("Answer has no SOURCES section, citing all retrieved chunks");
        return retrieved.to_vec();
    };

    let cited: HashSet<(u32, u32)> = source_id()
        .captures_iter(&answer.output_text[marker.end()..])
        .filter_map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
        .collect();

    let sources: Vec<Chunk> = retrieved
        .iter()
        .filter(|c| cited.contains(&(c.metadata.page, c.metadata.chunk)))
        .cloned()
        .collect();

    if sources.is_empty() {
        log::debug!("No cited source matched a retrieved chunk, citing all retrieved chunks");
        return retrieved.to_vec();
    }
    sources
}

fn build_context(chunks: &[Chunk]) -> String {
    let mut context = String::new();

    for chunk in chunks {
        context.push_str(&format!(
            "Content: {}\nSource: {}\n\n",
            chunk.content,
            chunk.source_id()
        ));
    }

    context
}

fn build_prompt(query: &str, context: &str) -> String {
    format!(
        r#"You are an assistant that answers questions about a single uploaded document, using only the excerpts provided below.

INSTRUCTIONS:
1. Answer the question using ONLY the information in the excerpts
2. Do not add information that is not present in the excerpts
3. If the excerpts do not contain enough information, say that you do not know instead of making up an answer
4. Finish with a line of the form "SOURCES: <source>, <source>" listing only the sources you actually used
5. Each excerpt's source is written as page-chunk, for example 2-0; copy it exactly

EXCERPTS:
{context}
QUESTION: {query}

ANSWER:"#
    )
}

fn sources_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:SOURCES|^[ \t]*(?i:sources))[ \t]*:")
            .expect("sources marker pattern is valid")
    })
}

fn source_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*-\s*(\d+)").expect("source id pattern is valid"))
}

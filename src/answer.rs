use crate::candidates::{Candidate, MIN_CANDIDATES};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    drugs: Vec<DrugEntry>,
}

#[derive(Debug, Deserialize)]
struct DrugEntry {
    #[serde(default)]
    ranking: Option<Value>,
    name: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(Vec<Candidate>),
    Rejected { path: PathBuf, reason: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Balanced-brace spans, string-aware, ordered by opening brace.
fn object_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&text[start..=start + offset]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    spans
}

fn legacy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// First balanced object that deserializes; the outermost braces are the
/// last resort.
fn extract_payload(text: &str) -> Option<AnswerPayload> {
    object_spans(text)
        .into_iter()
        .chain(legacy_span(text))
        .find_map(|span| serde_json::from_str::<AnswerPayload>(span).ok())
}

fn contains_cjk(s: &str) -> bool {
    s.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

fn ranking_of(entry: &DrugEntry, position: usize) -> u32 {
    let parsed = match &entry.ranking {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(position as u32 + 1)
}

/// Applies the acceptance rules to raw answer text.
pub fn parse_answer(text: &str) -> Result<Vec<Candidate>, String> {
    let payload = extract_payload(text).ok_or("no JSON object with a `drugs` list")?;
    let first = payload.drugs.first().ok_or("`drugs` list is empty")?;
    if first.name.contains("drug") || first.name.contains("Drug") {
        return Err(format!("placeholder candidate name `{}`", first.name));
    }
    if contains_cjk(&first.name) {
        return Err(format!("candidate name `{}` contains CJK characters", first.name));
    }
    if payload.drugs.len() < MIN_CANDIDATES {
        return Err(format!(
            "only {} candidates, need at least {}",
            payload.drugs.len(),
            MIN_CANDIDATES
        ));
    }
    Ok(payload
        .drugs
        .iter()
        .enumerate()
        .map(|(i, entry)| Candidate::new(ranking_of(entry, i), entry.name.trim(), entry.explanation.trim()))
        .collect())
}

pub fn validate_answer(path: &Path, text: &str) -> Verdict {
    match parse_answer(text) {
        Ok(candidates) => Verdict::Accepted(candidates),
        Err(reason) => Verdict::Rejected {
            path: path.to_path_buf(),
            reason,
        },
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An answer is only usable with at least this many candidates.
pub const MIN_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DockingOutcome {
    #[default]
    Pending,
    Energy(f64),
    /// The docking engine itself failed.
    Failed(String),
    /// The candidate never reached the engine (no structure, conversion failed).
    Skipped(String),
}

impl DockingOutcome {
    pub fn energy(&self) -> Option<f64> {
        match self {
            Self::Energy(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_favorable(&self) -> bool {
        matches!(self, Self::Energy(value) if *value < 0.0)
    }
}

impl fmt::Display for DockingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Energy(value) => write!(f, "{value} kcal/mol"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub ranking: u32,
    pub name: String,
    pub explanation: String,
    pub outcome: DockingOutcome,
}

impl Candidate {
    pub fn new(ranking: u32, name: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            ranking,
            name: name.into(),
            explanation: explanation.into(),
            outcome: DockingOutcome::Pending,
        }
    }

    /// Name usable as a path component.
    pub fn file_stem(&self) -> String {
        self.name.trim().replace(['/', '\\'], "_")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CandidateRow {
    ranking: u32,
    name: String,
    explanation: String,
}

#[derive(Debug, Serialize)]
struct ScoredRow<'a> {
    ranking: u32,
    name: &'a str,
    explanation: &'a str,
    energy: Option<f64>,
}

/// `ranking,name,explanation` table written once an answer is accepted.
pub fn candidates_to_csv(candidates: &[Candidate]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for candidate in candidates {
        writer.serialize(CandidateRow {
            ranking: candidate.ranking,
            name: candidate.name.clone(),
            explanation: candidate.explanation.clone(),
        })?;
    }
    writer.into_inner().context("Failed to flush candidate table")
}

/// Final table; `energy` is left empty when docking produced no real value.
pub fn scored_to_csv(candidates: &[Candidate]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for candidate in candidates {
        writer.serialize(ScoredRow {
            ranking: candidate.ranking,
            name: &candidate.name,
            explanation: &candidate.explanation,
            energy: candidate.outcome.energy(),
        })?;
    }
    writer.into_inner().context("Failed to flush ranked table")
}

pub fn candidates_from_csv(text: &str) -> Result<Vec<Candidate>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    reader
        .deserialize::<CandidateRow>()
        .map(|row| {
            let row = row.context("Malformed candidate table row")?;
            Ok(Candidate::new(row.ranking, row.name, row.explanation))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ScoredRecord {
    ranking: u32,
    name: String,
    explanation: String,
    energy: Option<f64>,
}

/// Reads a final table back. Rows without an energy come back as skipped.
pub fn scored_from_csv(text: &str) -> Result<Vec<Candidate>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    reader
        .deserialize::<ScoredRecord>()
        .map(|row| {
            let row = row.context("Malformed ranked table row")?;
            let mut candidate = Candidate::new(row.ranking, row.name, row.explanation);
            candidate.outcome = match row.energy {
                Some(energy) => DockingOutcome::Energy(energy),
                None => DockingOutcome::Skipped("no energy recorded".to_string()),
            };
            Ok(candidate)
        })
        .collect()
}

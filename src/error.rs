use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status} for {url}")]
    Status {
        service: &'static str,
        status: u16,
        url: String,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stage `{stage}` failed for {key}: {source:#}")]
    Stage {
        stage: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("answer for {key} rejected ({path:?}): {reason}")]
    AnswerRejected {
        key: String,
        path: PathBuf,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("no structure similar to the query sequence of {0}")]
    NoStructure(String),

    #[error("answer for {key} still rejected after {attempts} attempts: {reason}")]
    AnswerAttemptsExhausted {
        key: String,
        attempts: u32,
        reason: String,
    },

    #[error("run {key} gave up after {attempts} attempts, last failure: {last}")]
    RunAttemptsExhausted {
        key: String,
        attempts: u32,
        last: String,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn stage(stage: &'static str, key: &str, source: anyhow::Error) -> Self {
        Self::Stage {
            stage,
            key: key.to_string(),
            source,
        }
    }

    /// Wraps a collaborator failure, keeping any typed error it carried.
    pub fn from_tool(stage: &'static str, key: &str, source: anyhow::Error) -> Self {
        match source.downcast::<PipelineError>() {
            Ok(typed) => typed,
            Err(other) => Self::stage(stage, key, other),
        }
    }

    /// Fatal errors stop the supervisor; everything else earns a restart.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            Self::Config(_)
            | Self::Template(_)
            | Self::NoStructure(_)
            | Self::AnswerAttemptsExhausted { .. }
            | Self::RunAttemptsExhausted { .. } => true,
            Self::Http(_) | Self::Io { .. } | Self::Stage { .. } | Self::AnswerRejected { .. } => {
                false
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_codes() {
        let not_found = PipelineError::Status {
            service: "rcsb",
            status: 404,
            url: "https://files.rcsb.org/download/XXXX.pdb".into(),
        };
        assert!(not_found.is_fatal());

        let throttled = PipelineError::Status {
            service: "openai",
            status: 429,
            url: "https://api.openai.com/v1/chat/completions".into(),
        };
        assert!(!throttled.is_fatal());

        let unavailable = PipelineError::Status {
            service: "pubchem",
            status: 503,
            url: "https://pubchem.ncbi.nlm.nih.gov".into(),
        };
        assert!(!unavailable.is_fatal());
    }

    #[test]
    fn rejection_is_retryable_but_exhaustion_is_not() {
        let rejected = PipelineError::AnswerRejected {
            key: "1C8K".into(),
            path: PathBuf::from("data/answer/1C8K.txt"),
            reason: "only 4 candidates".into(),
        };
        assert!(!rejected.is_fatal());

        let exhausted = PipelineError::AnswerAttemptsExhausted {
            key: "1C8K".into(),
            attempts: 5,
            reason: "only 4 candidates".into(),
        };
        assert!(exhausted.is_fatal());
    }

    #[test]
    fn typed_errors_survive_tool_wrapping() {
        let typed = anyhow::Error::from(PipelineError::Status {
            service: "rcsb",
            status: 404,
            url: "https://files.rcsb.org/download/ZZZZ.pdb".into(),
        });
        let err = PipelineError::from_tool("download", "ZZZZ", typed);
        assert!(matches!(err, PipelineError::Status { status: 404, .. }));

        let plain = PipelineError::from_tool("download", "ZZZZ", anyhow::anyhow!("reset"));
        assert!(matches!(plain, PipelineError::Stage { stage: "download", .. }));
    }

    #[test]
    fn stage_failures_are_retryable() {
        let err = PipelineError::stage("docking", "1C8K", anyhow::anyhow!("vina exited 1"));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("docking"));
    }
}

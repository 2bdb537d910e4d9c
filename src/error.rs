//! Gateway error taxonomy.
//!
//! Three categories, matching what the caller needs to decide on retry:
//! invalid input is never retried; an embedding failure is safe to retry
//! wholesale because no index state was touched; an index failure carries
//! the step that failed so the caller knows whether to retry the whole
//! ingest or just re-drive activation.

use thiserror::Error;

/// Pipeline step during which an index call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStep {
    Upsert,
    Activate,
    Search,
}

impl IndexStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStep::Upsert => "upsert",
            IndexStep::Activate => "activate",
            IndexStep::Search => "search",
        }
    }
}

impl std::fmt::Display for IndexStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Client error; `code` is the machine-readable token surfaced in the
    /// HTTP error body (e.g. `missing_fields`).
    #[error("invalid input: {code}")]
    InvalidInput { code: &'static str },

    /// The embedding collaborator failed. No index state was mutated, so
    /// retrying the whole operation is safe.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    /// The vector index collaborator failed at `step`. A failure at
    /// `activate` after a successful upsert leaves the documented
    /// transient state: retry activation with the same version rather
    /// than re-ingesting.
    #[error("index unavailable during {step}: {source}")]
    IndexUnavailable {
        step: IndexStep,
        #[source]
        source: anyhow::Error,
    },
}

impl GatewayError {
    pub fn missing_fields() -> Self {
        GatewayError::InvalidInput {
            code: "missing_fields",
        }
    }

    pub fn index(step: IndexStep, source: anyhow::Error) -> Self {
        GatewayError::IndexUnavailable { step, source }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

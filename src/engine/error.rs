use thiserror::Error;

/// Failures that abort a whole insight request.
///
/// Per-insight failures never surface here; the composer folds them into an
/// error-flagged `InsightResult` instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported stat '{0}'")]
    UnsupportedStat(String),
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),
    #[error("invalid line '{0}': must be a finite number")]
    InvalidLine(String),
    #[error("invalid direction '{0}': expected over/under")]
    InvalidDirection(String),
    #[error("invalid {field} '{value}': expected an integer id")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("unknown sport '{0}'")]
    UnknownSport(String),
    #[error("player {0} not found")]
    PlayerNotFound(i64),
    #[error("team {0} not found")]
    TeamNotFound(i64),
    #[error("upstream data source failed: {0}")]
    Upstream(String),
}

impl EngineError {
    /// Malformed request: stat, identifier, line or direction.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedStat(_)
                | EngineError::MissingIdentifier(_)
                | EngineError::InvalidLine(_)
                | EngineError::InvalidDirection(_)
                | EngineError::InvalidIdentifier { .. }
                | EngineError::UnknownSport(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::PlayerNotFound(_) | EngineError::TeamNotFound(_))
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Upstream(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(EngineError::UnsupportedStat("blorp".into()).is_input_error());
        assert!(EngineError::InvalidDirection("sideways".into()).is_input_error());
        assert!(EngineError::TeamNotFound(3).is_not_found());
        let upstream: EngineError = anyhow::anyhow!("disk gone").into();
        assert!(!upstream.is_input_error());
        assert!(!upstream.is_not_found());
        assert_eq!(upstream.to_string(), "upstream data source failed: disk gone");
    }
}

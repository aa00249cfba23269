use std::fmt;
use std::time::Duration;

/// Classified AI-backend failure — tells the gateway *why* the call failed
/// so it can pick the right user message and breaker accounting.
#[derive(Debug)]
pub enum BackendError {
    /// Circuit breaker is open; the backend was not contacted.
    ServiceUnavailable { retry_in: Duration },
    /// The call outlived its deadline. The in-flight request is abandoned,
    /// not cancelled; any late result is discarded.
    Timeout,
    /// The backend refused the content on safety grounds. Non-retryable;
    /// the offending payload is preserved for audit when it was audio.
    SafetyBlocked { detail: String },
    /// Anything else — network, 5xx, malformed response. Retry-eligible.
    Transient { message: String },
}

/// Substrings in backend failure text that indicate a safety block rather
/// than a transient fault.
const SAFETY_MARKERS: &[&str] = &["safety", "blocked", "harm_category", "prohibited"];

impl BackendError {
    /// Classify a raw backend failure into the taxonomy.
    pub fn classify(err: &anyhow::Error) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if SAFETY_MARKERS.iter().any(|m| lowered.contains(m)) {
            BackendError::SafetyBlocked { detail: message }
        } else {
            BackendError::Transient { message }
        }
    }

    /// Fixed user-facing reply for each failure class.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::ServiceUnavailable { .. } => {
                "Je suis un peu débordée là, redonne-moi une minute et réessaie.".to_string()
            }
            BackendError::Timeout => {
                "Désolée, ça m'a pris trop de temps. Tu peux reformuler?".to_string()
            }
            BackendError::SafetyBlocked { .. } => {
                "Je ne peux pas répondre à ça, désolée.".to_string()
            }
            BackendError::Transient { .. } => {
                "Oups, petit souci de mon côté. Réessaie dans un instant.".to_string()
            }
        }
    }

    /// Whether the same request may be retried against the backend.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout | BackendError::Transient { .. }
        )
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ServiceUnavailable { retry_in } => {
                write!(f, "backend unavailable (circuit open, retry in {:?})", retry_in)
            }
            BackendError::Timeout => write!(f, "backend call timed out"),
            BackendError::SafetyBlocked { detail } => write!(f, "safety blocked: {}", detail),
            BackendError::Transient { message } => write!(f, "transient backend error: {}", message),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_markers_classify_as_blocked() {
        let err = anyhow::anyhow!("candidate blocked: SAFETY");
        assert!(matches!(
            BackendError::classify(&err),
            BackendError::SafetyBlocked { .. }
        ));
    }

    #[test]
    fn other_failures_are_transient() {
        let err = anyhow::anyhow!("connection reset by peer");
        let classified = BackendError::classify(&err);
        assert!(matches!(classified, BackendError::Transient { .. }));
        assert!(classified.is_retryable());
    }

    #[test]
    fn safety_block_is_not_retryable() {
        let blocked = BackendError::SafetyBlocked {
            detail: "prompt safety categories: HARM_CATEGORY_HARASSMENT".into(),
        };
        assert!(!blocked.is_retryable());
    }
}

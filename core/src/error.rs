use thiserror::Error;

/// Failures the CLI needs to tell apart from generic storage errors.
///
/// These travel inside `anyhow::Error`; callers recover them with
/// `err.downcast_ref::<JournalError>()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JournalError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Voice input is not available here. Type the description instead.")]
    DictationUnavailable,
}

impl JournalError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn meal_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Meal",
            id: id.into(),
        }
    }

    pub fn flareup_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Flare-up",
            id: id.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// True when `err` wraps a [`JournalError::NotFound`].
#[must_use]
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<JournalError>()
        .is_some_and(JournalError::is_not_found)
}

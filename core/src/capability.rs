use serde::Serialize;

/// An environment feature that may or may not be present.
///
/// Call sites match on this once instead of probing the environment
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }

    #[must_use]
    pub fn supported(self) -> Option<T> {
        match self {
            Self::Supported(v) => Some(v),
            Self::Unsupported => None,
        }
    }

    #[must_use]
    pub fn as_ref(&self) -> Capability<&T> {
        match self {
            Self::Supported(v) => Capability::Supported(v),
            Self::Unsupported => Capability::Unsupported,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unsupported, Self::Supported)
    }
}

use serde::{Deserialize, Serialize};

/// Broad category of a [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Capacity,
}

/// Errors returned by session operations. None of them are fatal; the
/// session keeps running unless the operation itself ended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameError {
    /// Operation not valid in the current state.
    Validation(String),
    /// Actor lacks the right to perform the operation.
    Authorization(String),
    /// Unknown player or session.
    NotFound(String),
    /// Roster full, or roster size unsupported at start.
    Capacity(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Capacity(_) => ErrorKind::Capacity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::Authorization(m) | Self::NotFound(m) | Self::Capacity(m) => {
                m
            },
        }
    }

    pub fn session_gone() -> Self {
        Self::NotFound("Game is no longer running".to_string())
    }
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for GameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = GameError::Capacity("Cannot add more players".to_string());
        assert_eq!(err.to_string(), "Cannot add more players");
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            GameError::Validation(String::new()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            GameError::Authorization(String::new()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(GameError::session_gone().kind(), ErrorKind::NotFound);
    }
}

use thiserror::Error;

/// A platform tag that does not name one of the six supported platforms.
/// Raised at the string boundary (route parameters, stored documents);
/// nothing downstream ever guesses a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

use secrecy::SecretString;

// -------------------------------------------------------------------------------------------------
// Auth
// -------------------------------------------------------------------------------------------------
/// Supported forms of authentication
pub enum Auth {
    /// No authentication
    Unauthenticated,

    /// Authenticate with a GitHub Personal Access Token, sent as a bearer token
    PersonalAccessToken(SecretString),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Unauthenticated => write!(f, "Unauthenticated"),
            Auth::PersonalAccessToken(_) => write!(f, "PersonalAccessToken(<redacted>)"),
        }
    }
}

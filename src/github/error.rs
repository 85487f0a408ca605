use chrono::Duration;
use super::models;

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum Error {
    RateLimited {
        /// The client error returned by GitHub
        client_error: models::ClientError,

        /// The duration to wait until trying again
        wait: Option<Duration>,
    },
    PageLimitExceeded {
        /// The listing that was being walked
        url: String,

        /// The page limit in effect
        max_pages: usize,
    },
    UrlParseError(url::ParseError),
    UrlSlashError(String),
    ReqwestError(reqwest::Error),
    InvalidTokenEnvVar(String),
}

impl Error {
    /// Is this error worth retrying?
    ///
    /// Transport failures and server-side errors are; everything else, including rate limiting,
    /// is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ReqwestError(e) => match e.status() {
                Some(status) => status.is_server_error(),
                None => e.is_timeout() || e.is_connect() || e.is_request(),
            },
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RateLimited{client_error, ..} => write!(f, "request was rate-limited: {}", client_error.message),
            Error::PageLimitExceeded{url, max_pages} => write!(f, "listing {url} has more than {max_pages} pages"),
            Error::UrlParseError(e) => write!(f, "error parsing URL: {e}"),
            Error::UrlSlashError(p) => write!(f, "error building URL: component {p:?} contains a slash"),
            Error::ReqwestError(e) => write!(f, "error making request: {e}"),
            Error::InvalidTokenEnvVar(v) => write!(f, "error loading token: ill-formed value of {v} environment variable"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RateLimited{..} => None,
            Error::PageLimitExceeded{..} => None,
            Error::UrlParseError(e) => Some(e),
            Error::UrlSlashError(_) => None,
            Error::ReqwestError(e) => Some(e),
            Error::InvalidTokenEnvVar(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::ReqwestError(e)
    }
}

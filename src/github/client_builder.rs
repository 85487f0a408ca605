use reqwest::{IntoUrl, Url};
use secrecy::SecretString;

use super::{Auth, Client, Error, Result};

// -------------------------------------------------------------------------------------------------
// ClientBuilder
// -------------------------------------------------------------------------------------------------
pub struct ClientBuilder {
    base_url: reqwest::Url,
    auth: Auth,
}

impl ClientBuilder {
    const USER_AGENT: &str = "repometrics";

    pub fn new() -> Self {
        ClientBuilder {
            base_url: Url::parse("https://api.github.com").expect("default base URL should parse"),
            auth: Auth::Unauthenticated,
        }
    }

    pub fn base_url<T: IntoUrl>(mut self, url: T) -> Result<Self> {
        self.base_url = url.into_url().map_err(Error::ReqwestError)?;
        Ok(self)
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Use the personal access token in the given environment variable, if it is set.
    ///
    /// An unset variable leaves the current authentication alone.
    pub fn personal_access_token_from_env(self, env_var: &str) -> Result<Self> {
        match std::env::var(env_var) {
            Err(std::env::VarError::NotPresent) => Ok(self),
            Err(std::env::VarError::NotUnicode(_s)) => {
                Err(Error::InvalidTokenEnvVar(env_var.to_string()))
            }
            Ok(val) => Ok(self.auth(Auth::PersonalAccessToken(SecretString::from(val)))),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.auth, Auth::Unauthenticated)
    }

    pub fn build(self) -> Result<Client> {
        let inner = reqwest::ClientBuilder::new()
            .user_agent(Self::USER_AGENT)
            .build()
            .map_err(Error::ReqwestError)?;
        Ok(Client {
            base_url: self.base_url,
            auth: self.auth,
            inner,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

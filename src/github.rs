mod auth;
mod client;
mod client_builder;
mod error;
mod fetch_policy;
pub mod models;

pub use auth::Auth;
pub use client::Client;
pub use client_builder::ClientBuilder;
pub use error::Error;
pub use fetch_policy::FetchPolicy;

pub type Result<T> = std::result::Result<T, Error>;

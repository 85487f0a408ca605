use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use reqwest;
use reqwest::{header, header::HeaderValue, StatusCode, Url};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::models::{Commit, PullRequest, Release};
use super::{Auth, Error, FetchPolicy, Result};

// -------------------------------------------------------------------------------------------------
// Client
// -------------------------------------------------------------------------------------------------
pub struct Client {
    pub(super) base_url: Url,
    pub(super) inner: reqwest::Client,
    pub(super) auth: Auth,
}

impl Client {
    /// Walk the commit listing of `owner/repo`, restricted to commits authored at or after
    /// `since`, handing each non-empty page to `f`.
    pub async fn for_each_commit_page<F>(
        &self,
        owner: &str,
        repo: &str,
        since: DateTime<Utc>,
        policy: &FetchPolicy,
        f: F,
    ) -> Result<usize>
    where
        F: FnMut(Vec<Commit>),
    {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.for_each_page(&["repos", owner, repo, "commits"], &[("since", &since)], policy, f)
            .await
    }

    /// Walk the closed pull request listing of `owner/repo`, handing each non-empty page to `f`.
    ///
    /// Closed pull requests include both merged and unmerged ones.
    pub async fn for_each_closed_pull_page<F>(
        &self,
        owner: &str,
        repo: &str,
        policy: &FetchPolicy,
        f: F,
    ) -> Result<usize>
    where
        F: FnMut(Vec<PullRequest>),
    {
        self.for_each_page(&["repos", owner, repo, "pulls"], &[("state", "closed")], policy, f)
            .await
    }

    /// Get the first page of releases of `owner/repo`.
    pub async fn get_releases(
        &self,
        owner: &str,
        repo: &str,
        policy: &FetchPolicy,
    ) -> Result<Vec<Release>> {
        self.get_page(&["repos", owner, repo, "releases"], &[], 1, policy)
            .await
    }

    /// Fetch a single page of a listing.
    pub async fn get_page<T>(
        &self,
        path_parts: &[&str],
        params: &[(&str, &str)],
        page: usize,
        policy: &FetchPolicy,
    ) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let per_page = policy.per_page.to_string();
        let page = page.to_string();
        let mut all_params = params.to_vec();
        all_params.push(("per_page", &per_page));
        all_params.push(("page", &page));

        let url = self.make_url(path_parts, &all_params)?;
        let response = self.get_url_with_retries(url, policy).await?;
        let body = response.json().await.map_err(Error::ReqwestError)?;
        Ok(body)
    }

    /// Walk a page-numbered listing starting at page 1, handing each non-empty page to `f`.
    ///
    /// Walking stops at the first empty page or the first short page, whichever comes first.
    /// Returns the number of non-empty pages seen.
    pub async fn for_each_page<T, F>(
        &self,
        path_parts: &[&str],
        params: &[(&str, &str)],
        policy: &FetchPolicy,
        mut f: F,
    ) -> Result<usize>
    where
        T: serde::de::DeserializeOwned,
        F: FnMut(Vec<T>),
    {
        let mut page = 1;
        loop {
            if page > policy.max_pages {
                let url = self.make_url(path_parts, params)?;
                return Err(Error::PageLimitExceeded {
                    url: url.to_string(),
                    max_pages: policy.max_pages,
                });
            }

            let items: Vec<T> = self.get_page(path_parts, params, page, policy).await?;
            let num_items = items.len();
            debug!("Page {page} of /{} had {num_items} items", path_parts.join("/"));
            if num_items == 0 {
                return Ok(page - 1);
            }
            f(items);
            if policy.is_last_page(num_items) {
                return Ok(page);
            }
            page += 1;
        }
    }
}

// private implementation
impl Client {
    /// Construct a `Url` from the given path parts and query parameters.
    ///
    /// Path parts are appended to any path the base URL already has, so that GitHub Enterprise
    /// base URLs like `https://github.example.com/api/v3` work.
    fn make_url(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::UrlParseError(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty();
            for p in path_parts {
                if p.contains('/') {
                    return Err(Error::UrlSlashError(p.to_string()));
                }
                segments.push(p);
            }
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn get_url_with_retries(&self, url: Url, policy: &FetchPolicy) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.get_url(url.clone()).await {
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    attempt += 1;
                    warn!(
                        "Request to {url} failed: {e}; retrying in {:?} (attempt {attempt} of {})",
                        policy.retry_delay, policy.max_retries
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    async fn get_url(&self, url: Url) -> Result<reqwest::Response> {
        debug!("GET {url}");

        // build request, handling authentication if any
        let request_builder = self
            .inner
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        let request_builder = match &self.auth {
            Auth::PersonalAccessToken(token) => request_builder.bearer_auth(token.expose_secret()),
            Auth::Unauthenticated => request_builder,
        };

        // send request and wait for response
        let response = request_builder.send().await.map_err(Error::ReqwestError)?;

        // Check for rate limiting.
        //
        // Instead of using an HTTP 429 response code, GitHub uses 403 and sets the
        // `x-ratelimit-remaining` header to 0, or sends a `Retry-After` header for secondary
        // rate limits. Either way the wait is reported, never acted on.
        if response.status() == StatusCode::FORBIDDEN {
            if let Some(retry_after) = response.headers().get("Retry-After") {
                let wait = atoi::atoi::<i64>(retry_after.as_bytes()).map(Duration::seconds);
                let client_error = response.json().await.map_err(Error::ReqwestError)?;
                return Err(Error::RateLimited { client_error, wait });
            }

            if let Some(b"0") = response
                .headers()
                .get("x-ratelimit-remaining")
                .map(HeaderValue::as_bytes)
            {
                let wait = || -> Option<Duration> {
                    let date = response.headers().get("date")?.to_str().ok()?;
                    let date = DateTime::parse_from_rfc2822(date).ok()?.with_timezone(&Utc);

                    let reset_time = response
                        .headers()
                        .get("x-ratelimit-reset")?
                        .to_str()
                        .ok()?
                        .parse::<i64>()
                        .ok()?;
                    let reset_time = Utc.timestamp_opt(reset_time, 0).single()?;

                    Some(reset_time - date)
                }();

                let client_error = response.json().await.map_err(Error::ReqwestError)?;
                return Err(Error::RateLimited { client_error, wait });
            }
        }

        response.error_for_status().map_err(Error::ReqwestError)
    }
}

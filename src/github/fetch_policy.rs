use std::time::Duration;

// -------------------------------------------------------------------------------------------------
// FetchPolicy
// -------------------------------------------------------------------------------------------------
/// Controls how paginated listings are fetched.
///
/// Walking stops at the first empty page or at the first page with fewer than `per_page` items.
/// Walking more than `max_pages` pages is an error rather than a silent truncation.
///
/// Only transient failures (transport errors and HTTP 5xx responses) are retried, and by default
/// they are not retried at all. Rate-limited responses are never retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
    /// The `per_page` query parameter sent with each request
    pub per_page: usize,

    /// The most pages that will be requested from a single listing
    pub max_pages: usize,

    /// How many times a transient failure is retried before giving up
    pub max_retries: u32,

    /// How long to wait between attempts
    pub retry_delay: Duration,
}

impl FetchPolicy {
    /// GitHub refuses `per_page` values above this.
    pub const MAX_PER_PAGE: usize = 100;

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.clamp(1, Self::MAX_PER_PAGE);
        self
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Is a page with `num_items` items the last one of a listing?
    pub fn is_last_page(&self, num_items: usize) -> bool {
        num_items < self.per_page
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            per_page: Self::MAX_PER_PAGE,
            max_pages: 1000,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn per_page_is_clamped() {
        assert_eq!(FetchPolicy::default().per_page(0).per_page, 1);
        assert_eq!(FetchPolicy::default().per_page(500).per_page, 100);
        assert_eq!(FetchPolicy::default().per_page(30).per_page, 30);
    }

    #[test]
    fn short_pages_are_last() {
        let policy = FetchPolicy::default();
        assert!(policy.is_last_page(0));
        assert!(policy.is_last_page(50));
        assert!(!policy.is_last_page(100));
    }

    #[test]
    fn no_retries_by_default() {
        assert_eq!(FetchPolicy::default().max_retries, 0);
    }
}

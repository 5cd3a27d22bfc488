//! Cached `Date` header values.
//!
//! Formatting an RFC 7231 date on every response is wasteful when thousands of responses share
//! the same second. [`DateService`] renders the value once per second and hands out clones of
//! the cached [`HeaderValue`].

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use http::HeaderValue;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

pub struct DateService {
    current: ArcSwapOption<CachedDate>,
}

struct CachedDate {
    second: u64,
    value: HeaderValue,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(DateService::new);

impl DateService {
    pub fn global() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new() -> Self {
        Self { current: ArcSwapOption::empty() }
    }

    /// Returns the current date, formatted for the `Date` header.
    pub fn http_date(&self) -> Option<HeaderValue> {
        let second = unix_second();

        if let Some(cached) = &*self.current.load()
            && cached.second == second
        {
            return Some(cached.value.clone());
        }

        let value = render()?;
        self.current.store(Some(Arc::new(CachedDate { second, value: value.clone() })));
        Some(value)
    }
}

impl fmt::Debug for DateService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("DateService").field("current", &(*current).as_ref().map(|cached| &cached.value)).finish()
    }
}

fn unix_second() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default()
}

fn render() -> Option<HeaderValue> {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);

    match HeaderValue::from_maybe_shared(Bytes::from_owner(buf)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(cause = %e, "rendered an invalid date header");
            None
        }
    }
}

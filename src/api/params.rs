//! Query string parameters shared by the listing endpoints
//!
//! Numbers are parsed leniently: a missing or malformed value falls back
//! to the default instead of rejecting the request.

use serde::Deserialize;

fn lenient_i64(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// `?first=&after=` forward pagination (user listings)
#[derive(Debug, Default, Deserialize)]
pub struct ForwardPage {
    pub first: Option<String>,
    pub after: Option<String>,
}

impl ForwardPage {
    pub fn first(&self) -> i64 {
        lenient_i64(self.first.as_deref()).unwrap_or(0)
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }
}

/// `?search=&first=&after=` for the global user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub search: Option<String>,
    #[serde(flatten)]
    pub page: ForwardPage,
}

/// `?last=&before=` backward pagination (content listings)
#[derive(Debug, Default, Deserialize)]
pub struct BackwardPage {
    pub last: Option<String>,
    pub before: Option<String>,
}

impl BackwardPage {
    pub fn last(&self) -> i64 {
        lenient_i64(self.last.as_deref()).unwrap_or(0)
    }

    pub fn before(&self) -> Option<i64> {
        lenient_i64(self.before.as_deref())
    }
}

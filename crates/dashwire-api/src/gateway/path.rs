// URL construction: API base resolution, endpoint merging, query appending.

use std::borrow::Cow;

use url::{Url, form_urlencoded};

use crate::error::Error;

/// Base path used when none (or an unusable one) is configured.
pub const DEFAULT_API_BASE: &str = "/api";

/// Endpoints already under this prefix are never re-prefixed.
const API_PREFIX: &str = "/api/";

/// `scheme://…` check, matching `^[a-z][a-z0-9+.-]*://` case-insensitively.
pub fn is_absolute_url(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// ── ApiBase ─────────────────────────────────────────────────────────

/// Where API endpoints live: an absolute URL or a path on the server origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiBase {
    Absolute(Url),
    Relative(String),
}

impl Default for ApiBase {
    fn default() -> Self {
        Self::Relative(DEFAULT_API_BASE.to_owned())
    }
}

impl ApiBase {
    /// Normalise a configured base.
    ///
    /// Blank → `/api`. Absolute URLs keep their origin; a bare `/` path
    /// becomes `/api`. Relative values gain a leading slash. Trailing
    /// slashes are always stripped.
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Ok(Self::default());
        };

        if is_absolute_url(raw) {
            let mut url = Url::parse(raw)?;
            let path = normalize_base_path(url.path());
            url.set_path(&path);
            url.set_query(None);
            url.set_fragment(None);
            return Ok(Self::Absolute(url));
        }

        let rooted = if raw.starts_with('/') {
            Cow::Borrowed(raw)
        } else {
            Cow::Owned(format!("/{raw}"))
        };
        Ok(Self::Relative(normalize_base_path(&rooted)))
    }

    /// The base's path component (`/api`, `/v2/api`, …).
    pub fn path(&self) -> &str {
        match self {
            Self::Absolute(url) => url.path(),
            Self::Relative(path) => path,
        }
    }

    /// Resolve `endpoint` against this base.
    ///
    /// Absolute endpoints pass through. Relative results stay relative (the
    /// gateway joins them onto the server origin). Endpoints already rooted
    /// at the API prefix are kept as-is, so resolving twice is harmless.
    pub fn resolve(&self, endpoint: &str) -> Result<String, Error> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::EmptyEndpoint);
        }
        if is_absolute_url(endpoint) {
            return Ok(endpoint.to_owned());
        }

        let split = endpoint.find(['?', '#']).unwrap_or(endpoint.len());
        let (path, suffix) = endpoint.split_at(split);

        match self {
            Self::Absolute(base) => {
                let mut url = base.clone();
                url.set_path(&merge_path(base.path(), path));
                Ok(format!("{url}{suffix}"))
            }
            Self::Relative(base) => Ok(format!("{}{suffix}", merge_path(base, path))),
        }
    }
}

fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_BASE.to_owned()
    } else {
        trimmed.to_owned()
    }
}

fn merge_path(base: &str, endpoint: &str) -> String {
    let endpoint = if endpoint.starts_with('/') {
        Cow::Borrowed(endpoint)
    } else {
        Cow::Owned(format!("/{endpoint}"))
    };
    let base = base.trim_end_matches('/');

    let under_base = !base.is_empty()
        && endpoint
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
    if under_base || endpoint.starts_with(API_PREFIX) {
        return endpoint.into_owned();
    }

    format!("{base}{endpoint}")
}

// ── Query ───────────────────────────────────────────────────────────

/// One query value. `Null` entries are dropped when the URL is built.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl QueryValue {
    fn to_param(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::UInt(n) => Some(n.to_string()),
            Self::Float(n) => Some(n.to_string()),
            Self::Str(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::UInt(value.into())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Query mapping: key → one or more values, in caller order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    entries: Vec<(String, Vec<QueryValue>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `key` to a single value, replacing any earlier mapping.
    pub fn set(self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.set_all(key, [value])
    }

    /// Map `key` to a list of values, replacing any earlier mapping.
    pub fn set_all<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryValue>,
    {
        let key = key.into();
        let values: Vec<QueryValue> = values.into_iter().map(Into::into).collect();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((key, values)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[QueryValue])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Append `query` to `url`, keeping any fragment.
///
/// Each mapped key first loses its pre-existing occurrences, then gains one
/// parameter per non-null value in order.
pub fn append_query(url: &str, query: &Query) -> String {
    let (without_hash, hash) = match url.split_once('#') {
        Some((head, hash)) => (head, Some(hash)),
        None => (url, None),
    };
    let (path, existing) = match without_hash.split_once('?') {
        Some((path, existing)) => (path, Some(existing)),
        None => (without_hash, None),
    };

    let mut params: Vec<(String, String)> = existing
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    for (key, values) in query.entries() {
        params.retain(|(k, _)| k != key);
        params.extend(
            values
                .iter()
                .filter_map(QueryValue::to_param)
                .map(|v| (key.to_owned(), v)),
        );
    }

    let query_string = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();

    let mut next = if query_string.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query_string}")
    };
    if let Some(hash) = hash.filter(|h| !h.is_empty()) {
        next.push('#');
        next.push_str(hash);
    }
    next
}

//! Canonical form for feed and site URLs.
//!
//! The normalized string is the registry's dedup key, so every transformation
//! here must be idempotent: `normalize(normalize(x)) == normalize(x)`.

use std::sync::OnceLock;

use regex::Regex;
use url::{Host, Url};

use crate::errors::{ShelfError, ShelfResult};

fn repeated_slashes() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/{2,}").expect("static regex is valid"))
}

/// Normalize a feed or site URL into its canonical string.
///
/// Lowercases scheme and host, drops default ports, fragments, empty query
/// strings and the trailing dot of a fully-qualified host, collapses
/// repeated slashes in the path and trims surrounding whitespace. Inputs
/// without a scheme are read as `http://`, and the `feed:` pseudo-scheme is
/// unwrapped.
pub fn normalize(raw: &str) -> ShelfResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ShelfError::Normalization("empty URL".to_string()));
    }

    let candidate = unwrap_feed_scheme(trimmed);
    let candidate = if candidate.contains("://") {
        candidate.to_string()
    } else {
        format!("http://{}", candidate)
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| ShelfError::Normalization(format!("{}: {}", trimmed, e)))?;

    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.trim_end_matches('.').is_empty() => {
            Some(domain.trim_end_matches('.').to_string())
        }
        Some(Host::Domain(_)) | None => None,
        Some(_) => url.host_str().map(str::to_string),
    };
    let host =
        host.ok_or_else(|| ShelfError::Normalization(format!("{}: missing host", trimmed)))?;
    if url.host_str() != Some(host.as_str()) {
        url.set_host(Some(&host))
            .map_err(|e| ShelfError::Normalization(format!("{}: {}", trimmed, e)))?;
    }

    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }

    let path = url.path().to_string();
    let collapsed = repeated_slashes().replace_all(&path, "/");
    if collapsed != path {
        url.set_path(&collapsed);
    }

    Ok(url.to_string())
}

/// Normalize an optional link, treating blank and unparseable values as absent.
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| normalize(value).ok())
}

/// Strip every leading `feed:` (or `feed://`) wrapper, however many are stacked.
fn unwrap_feed_scheme(mut url: &str) -> &str {
    while url.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("feed:")) {
        let rest = &url[5..];
        url = rest.strip_prefix("//").unwrap_or(rest);
    }
    url
}

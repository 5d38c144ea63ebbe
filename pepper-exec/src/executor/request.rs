use std::sync::LazyLock;

use pepper_core::RequestSpec;
use regex::Regex;

use super::http::{HttpError, HttpRequestParts};

// RFC 9110 token characters.
static TCHAR_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").ok());

fn is_token(s: &str) -> bool {
    match TCHAR_RE.as_ref() {
        Some(re) => re.is_match(s),
        None => !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic()),
    }
}

/// Turns an expanded working request into wire parts.
///
/// The method must be a valid HTTP token and the URL must be absolute.
pub(crate) fn finalize(spec: RequestSpec) -> Result<HttpRequestParts, HttpError> {
    let method = spec.method.trim();
    if !is_token(method) {
        return Err(HttpError::InvalidRequest(format!("invalid method `{method}`")));
    }

    let url = url::Url::parse(spec.url.trim())
        .map_err(|e| HttpError::InvalidRequest(format!("invalid url `{}`: {e}", spec.url)))?;

    for name in spec.headers.keys() {
        if !is_token(name) {
            return Err(HttpError::InvalidRequest(format!("invalid header name `{name}`")));
        }
    }

    Ok(HttpRequestParts {
        method: method.to_string(),
        url,
        headers: spec.headers,
        body: spec.body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(method: &str, url: &str) -> RequestSpec {
        RequestSpec {
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn finalizes_valid_request() {
        let mut s = spec("POST", "https://api.test/login");
        s.headers.insert("Content-Type".into(), "application/json".into());
        s.body = b"{}".to_vec();
        let parts = finalize(s).unwrap();
        assert_eq!(parts.method, "POST");
        assert_eq!(parts.url.as_str(), "https://api.test/login");
        assert_eq!(parts.headers["Content-Type"], "application/json");
        assert_eq!(parts.body, b"{}");
    }

    #[test]
    fn rejects_bad_method() {
        let err = finalize(spec("GE T", "https://api.test/")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidRequest(_)));
        assert!(finalize(spec("", "https://api.test/")).is_err());
    }

    #[test]
    fn rejects_relative_or_unexpanded_url() {
        assert!(finalize(spec("GET", "/user")).is_err());
        assert!(finalize(spec("GET", "${base}/user")).is_err());
    }

    #[test]
    fn rejects_bad_header_name() {
        let mut s = spec("GET", "https://api.test/");
        s.headers.insert("X Bad".into(), "1".into());
        assert!(finalize(s).is_err());
    }
}

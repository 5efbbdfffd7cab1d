//! Cookie access and credential resolution.
//!
//! Credentials are read once, when the host environment is set up, and then
//! injected into the API client. Nothing reads cookies at request time.

use std::collections::HashMap;

/// Cookie holding the CSRF token.
pub const CSRF_COOKIE: &str = "ct0";

/// Cookie holding the guest token.
pub const GUEST_COOKIE: &str = "gt";

// ============================================================================
// Cookie Reader
// ============================================================================

/// Read-only access to cookies of the host page.
pub trait CookieReader: Send + Sync {
    /// Returns the value of the named cookie, if present.
    fn read_cookie(&self, name: &str) -> Option<String>;
}

/// Cookies parsed from a `Cookie` request header.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `name=value; name2=value2` header string.
    ///
    /// Malformed pairs are skipped. Later duplicates replace earlier ones.
    pub fn parse(header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.trim_matches('"').to_string()))
            .collect();
        Self { cookies }
    }

    /// Adds a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Formats the jar as a `Cookie` header value, sorted by name.
    pub fn to_header(&self) -> String {
        let mut pairs: Vec<_> = self.cookies.iter().collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Number of cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true if the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieReader for CookieJar {
    fn read_cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Auth material for the host API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// CSRF token (also marks a signed-in session).
    pub csrf: Option<String>,
    /// Guest token for signed-out access.
    pub guest: Option<String>,
}

impl Credentials {
    /// Creates empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads both tokens from cookies.
    pub fn resolve(reader: &dyn CookieReader) -> Self {
        Self {
            csrf: reader.read_cookie(CSRF_COOKIE),
            guest: reader.read_cookie(GUEST_COOKIE),
        }
    }

    /// Sets the CSRF token.
    pub fn with_csrf(mut self, csrf: impl Into<String>) -> Self {
        self.csrf = Some(csrf.into());
        self
    }

    /// Sets the guest token.
    pub fn with_guest(mut self, guest: impl Into<String>) -> Self {
        self.guest = Some(guest.into());
        self
    }

    /// Returns true if a signed-in session is present.
    pub fn has_session(&self) -> bool {
        self.csrf.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let jar = CookieJar::parse("ct0=abc; gt=123 ; lang=en; broken; =novalue");
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.read_cookie("ct0").as_deref(), Some("abc"));
        assert_eq!(jar.read_cookie("gt").as_deref(), Some("123"));
        assert_eq!(jar.read_cookie("missing"), None);
    }

    #[test]
    fn test_empty_value_is_absent() {
        let jar = CookieJar::parse("ct0=; gt=1");
        assert_eq!(jar.read_cookie("ct0"), None);
    }

    #[test]
    fn test_to_header() {
        let jar = CookieJar::new().with_cookie("b", "2").with_cookie("a", "1");
        assert_eq!(jar.to_header(), "a=1; b=2");
    }

    #[test]
    fn test_resolve_credentials() {
        let creds = Credentials::resolve(&CookieJar::parse("ct0=csrf; gt=guest"));
        assert_eq!(creds, Credentials::new().with_csrf("csrf").with_guest("guest"));
        assert!(creds.has_session());

        let creds = Credentials::resolve(&CookieJar::new());
        assert!(!creds.has_session());
        assert_eq!(creds.guest, None);
    }
}

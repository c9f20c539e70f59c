//! Request-scoped cookie state.
//!
//! The manager reads the incoming `Cookie` header and queues `Set-Cookie`
//! values; the HTTP layer copies the queue onto the response.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "DVSESSID";

/// Value written when a session cookie is invalidated.
pub const INVALIDATED: &str = "-1";

/// A cookie to send back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// `None` makes it a browser-session cookie
    pub expires: Option<DateTime<Utc>>,
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
}

impl SetCookie {
    /// Renders the `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        let mut out = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(expires) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }

    /// Whether the browser drops this cookie on receipt.
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= Utc::now())
    }
}

/// Cookies of one request/response pair.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    incoming: HashMap<String, String>,
    outgoing: Vec<SetCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` request header (`a=1; b=2`).
    pub fn from_header(header: &str) -> Self {
        let incoming = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect();

        Self {
            incoming,
            outgoing: Vec::new(),
        }
    }

    /// Current value of a cookie, preferring one set during this request.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.outgoing
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
            .or_else(|| self.incoming.get(name).map(String::as_str))
    }

    /// Queues a cookie, replacing one of the same name queued earlier.
    pub fn set(&mut self, cookie: SetCookie) {
        self.outgoing.retain(|c| c.name != cookie.name);
        self.outgoing.push(cookie);
    }

    pub fn outgoing(&self) -> &[SetCookie] {
        &self.outgoing
    }

    pub fn take_outgoing(&mut self) -> Vec<SetCookie> {
        std::mem::take(&mut self.outgoing)
    }
}

/// What the manager knows about the current request.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub jar: CookieJar,
    /// Client address, embedded in newly minted ids
    pub client_host: String,
}

impl SessionContext {
    pub fn new(jar: CookieJar, client_host: impl Into<String>) -> Self {
        Self {
            jar,
            client_host: client_host.into(),
        }
    }

    /// Session id presented by the browser, if any.
    ///
    /// Empty and invalidated values count as absent.
    pub fn session_id(&self) -> Option<&str> {
        self.jar
            .get(SESSION_COOKIE)
            .filter(|v| !v.is_empty() && *v != INVALIDATED)
    }
}

/// Expiry an hour in the past, used to purge a cookie.
pub(crate) fn purge_time() -> DateTime<Utc> {
    Utc::now() - Duration::seconds(3600)
}

//! Per-request session manager.
//!
//! Decides whether the session named by a request cookie lives on this
//! node or another, calls the owning session server, and falls back to the
//! durable store through the local server when the owner does not answer.

pub mod cookie;
pub mod manager;

pub use cookie::{CookieJar, SessionContext, SetCookie, INVALIDATED, SESSION_COOKIE};
pub use manager::SessionManager;

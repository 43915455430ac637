//! Browser session identity
//!
//! One session per page load: the id is generated once and rides along on
//! every delivered batch and every correlated API call.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
pub fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Utc::now().timestamp_millis() as f64
    }
}

/// Identity of one page load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Creation time, milliseconds since the Unix epoch
    pub created_at: f64,
    pub user_agent: String,
    pub url: String,
    pub referrer: String,
}

impl Session {
    /// Create a session with a fresh id
    pub fn new(
        user_agent: impl Into<String>,
        url: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now_ms(),
            user_agent: user_agent.into(),
            url: url.into(),
            referrer: referrer.into(),
        }
    }

    /// Create a session from the current browser window
    #[cfg(target_arch = "wasm32")]
    pub fn from_window() -> Self {
        let (user_agent, url, referrer) = crate::browser::page_identity();
        Self::new(user_agent, url, referrer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new("ua", "https://example.com", "");
        let b = Session::new("ua", "https://example.com", "");
        assert_ne!(a.id, b.id);
        assert!(a.created_at > 0.0);
    }
}

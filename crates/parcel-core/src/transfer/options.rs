//! Per-request libcurl options derived from a settings snapshot.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::Settings;

/// Options applied to every curl handle a client creates.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Connect timeout, and how long a transfer may stall below 1 byte/s.
    pub timeout: Duration,
    pub buffer_size: usize,
    pub connection_pooling: bool,
    /// Only honoured for full-body GETs; ranged requests never ask for compression.
    pub compression: bool,
    pub user_agent: String,
    /// Caller-supplied headers (cookies, auth, referer) sent verbatim.
    pub headers: HashMap<String, String>,
}

impl RequestOptions {
    pub fn from_settings(settings: &Settings, headers: HashMap<String, String>) -> Self {
        Self {
            timeout: settings.timeout(),
            buffer_size: settings.buffer_size.max(1024),
            connection_pooling: settings.enable_connection_pooling,
            compression: settings.enable_compression,
            user_agent: settings.user_agent.clone(),
            headers,
        }
    }

    /// Configure `easy` for `url`: redirects, timeouts, buffer, reuse, headers.
    pub(crate) fn apply(&self, easy: &mut curl::easy::Easy, url: &str) -> Result<(), curl::Error> {
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.timeout)?;
        // Abort stalled transfers instead of imposing a wall-clock limit on large bodies.
        easy.low_speed_limit(1)?;
        easy.low_speed_time(self.timeout)?;
        easy.buffer_size(self.buffer_size)?;
        easy.forbid_reuse(!self.connection_pooling)?;
        easy.useragent(&self.user_agent)?;

        if !self.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), HashMap::new())
    }
}

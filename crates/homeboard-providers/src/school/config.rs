//! School calendar source configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

/// Configuration for the school calendar feed.
#[derive(Debug, Clone)]
pub struct SchoolConfig {
    /// The feed's POST endpoint.
    pub endpoint: String,
    /// Calendar id sent as `calendarId`.
    pub calendar_id: String,
    /// Day name (e.g. "Day 1") to the text shown for it. Names not in
    /// this table are ignored.
    pub schedule: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl SchoolConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(endpoint: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            calendar_id: calendar_id.into(),
            schedule: BTreeMap::new(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_day(mut self, name: impl Into<String>, details: impl Into<String>) -> Self {
        self.schedule.insert(name.into(), details.into());
        self
    }

    pub fn with_schedule(mut self, schedule: BTreeMap<String, String>) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| format!("invalid school endpoint '{}': {e}", self.endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("school endpoint must be http(s), got '{}'", url.scheme()));
        }
        if self.calendar_id.trim().is_empty() {
            return Err("school calendar_id is required".to_string());
        }
        if self.schedule.is_empty() {
            return Err("school schedule is empty, no day would ever be shown".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SchoolConfig {
        SchoolConfig::new("https://school.example/api/calendar/events", "district-main")
            .with_day("Day 1", "John: P.E.\nDorris: Music")
    }

    #[test]
    fn builder() {
        let config = valid().with_day("Day 2", "John: Art").with_timeout(Duration::from_secs(3));
        assert_eq!(config.schedule.len(), 2);
        assert_eq!(config.schedule["Day 1"], "John: P.E.\nDorris: Music");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn validation() {
        assert!(valid().validate().is_ok());

        let mut bad = valid();
        bad.endpoint = "not a url".to_string();
        assert!(bad.validate().is_err());

        let mut bad = valid();
        bad.endpoint = "ftp://school.example/feed".to_string();
        assert!(bad.validate().unwrap_err().contains("http"));

        let mut bad = valid();
        bad.calendar_id = " ".to_string();
        assert!(bad.validate().is_err());

        let empty = SchoolConfig::new("https://school.example/feed", "x");
        assert!(empty.validate().unwrap_err().contains("schedule"));
    }
}

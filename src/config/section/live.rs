//! `[live]` section configuration.
//!
//! ```toml
//! [live]
//! highlight = true                      # Initial highlight preference
//! stylesheet_poll_interval_ms = 50      # Browser-side stylesheet poll period
//! stylesheet_poll_attempts = 100        # Polls before giving up on a stylesheet
//! reject_pending_on_disconnect = false  # Fail requests whose pages all closed
//! ```

use serde::{Deserialize, Serialize};

/// Live document settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSection {
    /// Whether highlighting starts enabled.
    pub highlight: bool,

    pub stylesheet_poll_interval_ms: u64,

    /// Upper bound on polls for a newly inserted stylesheet.
    pub stylesheet_poll_attempts: u32,

    /// Reject a pending request once none of its target clients remain.
    /// Off by default: such requests stay pending.
    pub reject_pending_on_disconnect: bool,
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            highlight: true,
            stylesheet_poll_interval_ms: 50,
            stylesheet_poll_attempts: 100,
            reject_pending_on_disconnect: false,
        }
    }
}

impl LiveSection {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.stylesheet_poll_interval_ms == 0 {
            return Err("live.stylesheet_poll_interval_ms must be greater than 0".into());
        }
        if self.stylesheet_poll_attempts == 0 {
            return Err("live.stylesheet_poll_attempts must be greater than 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_live_section_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.live, LiveSection::default());
        assert!(config.live.highlight);
        assert!(!config.live.reject_pending_on_disconnect);
    }

    #[test]
    fn test_live_section_overrides() {
        let config = test_parse_config(
            "[live]\nhighlight = false\nstylesheet_poll_interval_ms = 10\nstylesheet_poll_attempts = 3\nreject_pending_on_disconnect = true",
        );
        assert!(!config.live.highlight);
        assert_eq!(config.live.stylesheet_poll_interval_ms, 10);
        assert_eq!(config.live.stylesheet_poll_attempts, 3);
        assert!(config.live.reject_pending_on_disconnect);
    }

    #[test]
    fn test_live_section_zero_attempts_rejected() {
        let config = test_parse_config("[live]\nstylesheet_poll_attempts = 0");
        assert!(config.live.validate().is_err());
    }
}

//! Status message model
//!
//! One unit of the progress/log stream: severity, text, timestamp, and the
//! optional exception and progress attachments.

use std::fmt;

use chrono::NaiveDateTime;

/// Message severity.
///
/// Total order used for filtering: DEBUG < INFO < WARN < ERROR < FATAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            _ => Err(format!("Invalid message level: {}", s)),
        }
    }
}

/// Failure detail attached to a message.
///
/// Absence on a [`StatusMessage`] means no failure is associated with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDetail {
    /// Human-readable error text
    pub error_text: String,

    /// Subsystem or component that raised the failure
    pub origin: String,

    /// Free-form diagnostic text
    pub trace: String,
}

/// Progress snapshot for one counted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Whole-number percentage, `round(processed / max(total, 1) * 100)`.
    ///
    /// May exceed 100 when the underlying task emits more steps than it
    /// declared, or when `total` is 0 (unknown). Informational in both cases.
    pub percentage: u32,

    /// Steps processed so far, monotonic within one operation
    pub processed: u32,

    /// Declared step count; 0 means unknown
    pub total: u32,
}

impl Progress {
    /// Compute a snapshot with the rounding rule above.
    pub fn compute(processed: u32, total: u32) -> Self {
        let denominator = total.max(1);
        let percentage = ((processed as f64 * 100.0) / denominator as f64).round() as u32;
        Self {
            percentage,
            processed,
            total,
        }
    }
}

/// One unit of the status stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: Level,
    pub message: String,
    pub timestamp: NaiveDateTime,
    pub exception: Option<ExceptionDetail>,
    pub progress: Option<Progress>,
}

impl StatusMessage {
    /// Create a message stamped with the current server clock (second
    /// precision).
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        use chrono::Timelike;
        let now = chrono::Utc::now().naive_utc();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);
        Self {
            level,
            message: message.into(),
            timestamp,
            exception: None,
            progress: None,
        }
    }

    pub fn with_exception(mut self, exception: ExceptionDetail) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.format("%d/%m/%Y %H:%M:%S"))?;
        if let Some(p) = &self.progress {
            write!(f, " - ({}/{} - {}%)", p.processed, p.total, p.percentage)?;
        }
        write!(f, " - {} - {}", self.level, self.message)?;
        if let Some(e) = &self.exception {
            write!(f, "\n{} - {}\n{}", e.error_text, e.origin, e.trace)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_level_round_trip() {
        for level in [
            Level::Debug,
            Level::Info,
            Level::Warn,
            Level::Error,
            Level::Fatal,
        ] {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Fatal);
        assert!("VERBOSE".parse::<Level>().is_err());
    }

    #[test]
    fn test_new_truncates_to_seconds() {
        let msg = StatusMessage::new(Level::Info, "hello");
        use chrono::Timelike;
        assert_eq!(msg.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_display_with_progress_and_exception() {
        let timestamp =
            NaiveDateTime::parse_from_str("2026-08-24T10:30:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let msg = StatusMessage {
            level: Level::Error,
            message: "item failed".to_string(),
            timestamp,
            exception: Some(ExceptionDetail {
                error_text: "boom".to_string(),
                origin: "installer".to_string(),
                trace: "step 3".to_string(),
            }),
            progress: Some(Progress::compute(3, 10)),
        };
        let rendered = msg.to_string();
        assert_eq!(
            rendered,
            "24/08/2026 10:30:00 - (3/10 - 30%) - ERROR - item failed\nboom - installer\nstep 3"
        );
    }

    #[test]
    fn test_display_plain() {
        let timestamp =
            NaiveDateTime::parse_from_str("2026-08-24T10:30:00", "%Y-%m-%dT%H:%M:%S").unwrap();
        let msg = StatusMessage {
            level: Level::Info,
            message: "Installing package: /tmp/pkg".to_string(),
            timestamp,
            exception: None,
            progress: None,
        };
        assert_eq!(
            msg.to_string(),
            "24/08/2026 10:30:00 - INFO - Installing package: /tmp/pkg"
        );
    }
}

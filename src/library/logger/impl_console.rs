use crate::library::logger::interface::{LogLevel, Logger};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LoggerConsole {
    namespace: Option<String>,
    timezone: chrono::FixedOffset,
    min_level: LogLevel,
}

impl LoggerConsole {
    pub fn new(timezone: chrono::FixedOffset, min_level: LogLevel) -> Self {
        Self {
            namespace: None,
            timezone,
            min_level,
        }
    }

    fn format_line(&self, level: LogLevel, message: &str) -> String {
        let utc_now = Utc::now();
        let local_time = utc_now.with_timezone(&self.timezone);
        let formatted = local_time.format("%Y-%m-%d %I:%M:%S%.3f %p");
        match &self.namespace {
            Some(namespace) => format!(
                "[{}] {} {}: {}",
                formatted,
                level.as_str(),
                namespace,
                message
            ),
            None => format!("[{}] {} {}", formatted, level.as_str(), message),
        }
    }
}

impl Logger for LoggerConsole {
    fn log(
        &self,
        level: LogLevel,
        message: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if level < self.min_level {
            return Ok(());
        }

        let line = self.format_line(level, message);
        match level {
            LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
        Ok(())
    }

    fn with_namespace(&self, namespace: &str) -> Arc<dyn Logger + Send + Sync> {
        let new_namespace = match &self.namespace {
            Some(current) => format!("{}:{}", current, namespace),
            None => namespace.to_string(),
        };

        Arc::new(LoggerConsole {
            namespace: Some(new_namespace),
            timezone: self.timezone,
            min_level: self.min_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> chrono::FixedOffset {
        chrono::FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_namespaces_are_joined() {
        let logger = LoggerConsole::new(utc(), LogLevel::Debug);
        let nested = LoggerConsole {
            namespace: Some("pipeline:worker".to_string()),
            ..logger.clone()
        };

        let line = nested.format_line(LogLevel::Info, "ready");
        assert!(line.ends_with("INFO pipeline:worker: ready"));

        let line = logger.format_line(LogLevel::Error, "boom");
        assert!(line.ends_with("ERROR boom"));
    }

    #[test]
    fn test_levels_below_threshold_are_skipped() {
        let logger = LoggerConsole::new(utc(), LogLevel::Error);
        assert!(logger.debug("hidden").is_ok());
        assert!(logger.with_namespace("a").info("hidden").is_ok());
        assert!(LogLevel::Debug < LogLevel::Info && LogLevel::Info < LogLevel::Error);
    }
}

//! Centralized logging configuration for the emulator.
//!
//! Diagnostics from the interpreter hot loop cannot afford formatting work
//! unless someone asked for it, so every call site is guarded by a cheap
//! atomic check against this module's global configuration.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Different logging categories (Su, Dma, Task, Interrupts, Stubs)
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{LogConfig, LogLevel, LogCategory};
//!
//! // Enable task dispatch diagnostics
//! LogConfig::global().set_level(LogCategory::Task, LogLevel::Info);
//!
//! // Check if logging is enabled for a category
//! if LogConfig::global().should_log(LogCategory::Task, LogLevel::Info) {
//!     eprintln!("Task: something happened");
//! }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to u8 for atomic storage
    fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from u8 for atomic loading
    fn from_u8(val: u8) -> Self {
        match val {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// Scalar unit execution (instruction execution, PC tracing)
    Su,
    /// DMA transfers between SP memory and RDRAM
    Dma,
    /// Task dispatch (HLE handoff, task types)
    Task,
    /// Interrupts (MI interrupt raises, BREAK)
    Interrupts,
    /// Unimplemented features/stubs
    Stubs,
}

/// Global logging configuration
pub struct LogConfig {
    /// Global log level (applies to all categories unless overridden)
    global_level: AtomicU8,
    /// Scalar-unit-specific log level
    su_level: AtomicU8,
    /// DMA-specific log level
    dma_level: AtomicU8,
    /// Task-dispatch-specific log level
    task_level: AtomicU8,
    /// Interrupt-specific log level
    interrupt_level: AtomicU8,
    /// Stub/unimplemented feature log level
    stub_level: AtomicU8,
}

impl LogConfig {
    /// Create a new LogConfig with all logging disabled
    const fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            su_level: AtomicU8::new(LogLevel::Off as u8),
            dma_level: AtomicU8::new(LogLevel::Off as u8),
            task_level: AtomicU8::new(LogLevel::Off as u8),
            interrupt_level: AtomicU8::new(LogLevel::Off as u8),
            stub_level: AtomicU8::new(LogLevel::Off as u8),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: LogConfig = LogConfig::new();
        &INSTANCE
    }

    /// Set the global log level (applies to all categories unless overridden)
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level.to_u8(), Ordering::Relaxed);
    }

    /// Get the global log level
    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.atomic_for(category)
            .store(level.to_u8(), Ordering::Relaxed);
    }

    /// Get log level for a specific category
    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.atomic_for(category).load(Ordering::Relaxed))
    }

    fn atomic_for(&self, category: LogCategory) -> &AtomicU8 {
        match category {
            LogCategory::Su => &self.su_level,
            LogCategory::Dma => &self.dma_level,
            LogCategory::Task => &self.task_level,
            LogCategory::Interrupts => &self.interrupt_level,
            LogCategory::Stubs => &self.stub_level,
        }
    }

    /// Check if a message should be logged for the given category and level
    ///
    /// Returns true if:
    /// 1. The category-specific level is set and >= the message level, OR
    /// 2. The category-specific level is Off AND the global level >= the message level
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            // Category has a specific level set
            level <= category_level
        } else {
            // Fall back to global level
            level <= self.get_global_level()
        }
    }

    /// Initialize logging from environment variables.
    ///
    /// Each variable takes a level name ("warn", "trace", ...) or "1" as a
    /// shorthand for the listed default level.
    pub fn init_from_env(&self) {
        use std::env;

        let env_mappings = [
            ("RSP_LOG", None, LogLevel::Info),
            ("RSP_LOG_TASKS", Some(LogCategory::Task), LogLevel::Info),
            ("RSP_LOG_DMA", Some(LogCategory::Dma), LogLevel::Debug),
            ("RSP_LOG_IRQ", Some(LogCategory::Interrupts), LogLevel::Info),
            ("RSP_LOG_STUBS", Some(LogCategory::Stubs), LogLevel::Info),
            ("RSP_TRACE_PC", Some(LogCategory::Su), LogLevel::Trace),
        ];

        for (env_var, category, default_level) in env_mappings.iter() {
            if let Ok(val) = env::var(env_var) {
                let level = match val.as_str() {
                    "1" | "true" | "TRUE" => *default_level,
                    other => match LogLevel::parse(other) {
                        Some(level) => level,
                        None => continue,
                    },
                };
                match category {
                    Some(category) => self.set_level(*category, level),
                    None => self.set_global_level(level),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("bogus"), None);
    }

    #[test]
    fn test_category_level_overrides_global() {
        // Fresh instance rather than the global singleton so tests don't
        // interfere with each other.
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Dma, LogLevel::Trace);

        assert!(config.should_log(LogCategory::Dma, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Task, LogLevel::Info));
        assert!(config.should_log(LogCategory::Task, LogLevel::Error));
    }

    #[test]
    fn test_off_category_falls_back_to_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Debug);

        assert!(config.should_log(LogCategory::Su, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Su, LogLevel::Trace));
    }
}

//! Bump-allocating game logger
//!
//! Log entries own their strings; temporary formatting goes through a bump
//! arena that is reset after each message. Captured entries are read back
//! through a guard type.

use bumpalo::Bump;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::{self, Write as FmtWrite};
use std::ops::Deref;

/// Verbosity level for game output
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum VerbosityLevel {
    /// Silent - no output during combat
    Silent = 0,
    /// Minimal - only outcomes and warnings
    Minimal = 1,
    /// Normal - declarations and damage totals (default)
    #[default]
    Normal = 2,
    /// Verbose - every combat mutation
    Verbose = 3,
}

/// Output destination for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// Output only to stdout (default)
    #[default]
    Stdout,
    /// Capture only to in-memory buffer (no stdout)
    Memory,
    /// Both stdout and in-memory buffer
    Both,
}

/// A log entry with owned strings (no lifetime parameters)
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Verbosity level of this log entry
    pub level: VerbosityLevel,
    /// Log message (owned)
    pub message: String,
    /// Optional category ("combat", "warning")
    pub category: Option<String>,
}

/// Guard type that provides read-only access to log entries
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> LogGuard<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.guard.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    /// Entries tagged with `category`
    pub fn in_category<'b>(&'b self, category: &'b str) -> impl Iterator<Item = &'b LogEntry> + 'b {
        self.guard
            .iter()
            .filter(move |entry| entry.category.as_deref() == Some(category))
    }
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Centralized logger using bump allocation for temporary formatting
pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,

    /// Bump allocator for temporary string formatting, reset after each use
    format_bump: RefCell<Bump>,

    /// Captured log entries (owned strings)
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    /// Create a new logger with default verbosity (Normal)
    pub fn new() -> Self {
        Self::with_verbosity(VerbosityLevel::default())
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            output_mode: OutputMode::default(),
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Capture to memory only (suppresses stdout)
    pub fn enable_capture(&mut self) {
        self.output_mode = OutputMode::Memory;
    }

    pub fn disable_capture(&mut self) {
        self.output_mode = OutputMode::Stdout;
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.output_mode, OutputMode::Memory | OutputMode::Both)
    }

    /// Print buffered logs that verbosity allows, then clear the buffer
    pub fn flush_buffer(&mut self) {
        let buffer = self.log_buffer.borrow();
        for entry in buffer.iter() {
            if entry.level <= self.verbosity {
                self.log_to_stdout(entry.level, &entry.message);
            }
        }
        drop(buffer);
        self.clear_logs();
    }

    /// Get access to captured log entries
    ///
    /// ```ignore
    /// let warnings = logger.logs().in_category("warning").count();
    /// ```
    pub fn logs(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.log_buffer.borrow(),
        }
    }

    pub fn clear_logs(&mut self) {
        self.log_buffer.borrow_mut().clear();
        self.format_bump.borrow_mut().reset();
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    #[inline]
    fn log_to_stdout(&self, level: VerbosityLevel, message: &str) {
        if level == VerbosityLevel::Minimal {
            println!("{}", message);
        } else {
            println!("  {}", message);
        }
    }

    #[inline]
    fn wants(&self, level: VerbosityLevel) -> bool {
        level <= self.verbosity || self.is_capturing()
    }

    fn emit(&self, level: VerbosityLevel, category: Option<&str>, message: &str) {
        let should_capture = self.is_capturing();
        let should_output = matches!(self.output_mode, OutputMode::Stdout | OutputMode::Both);

        if should_capture {
            self.log_buffer.borrow_mut().push(LogEntry {
                level,
                message: message.to_string(),
                category: category.map(str::to_string),
            });
        }

        if should_output && level <= self.verbosity {
            self.log_to_stdout(level, message);
        }
    }

    /// Format into the bump arena and emit, skipping formatting entirely
    /// when nothing would consume the message
    fn emit_fmt(&self, level: VerbosityLevel, category: Option<&str>, args: fmt::Arguments<'_>) {
        if !self.wants(level) {
            return;
        }
        let mut bump = self.format_bump.borrow_mut();
        {
            let mut buf = bumpalo::collections::String::new_in(&bump);
            if buf.write_fmt(args).is_err() {
                return;
            }
            self.emit(level, category, buf.as_str());
        }
        bump.reset();
    }

    /// Log at Minimal level
    #[inline]
    pub fn minimal(&self, message: &str) {
        if self.wants(VerbosityLevel::Minimal) {
            self.emit(VerbosityLevel::Minimal, None, message);
        }
    }

    /// Log at Normal level
    #[inline]
    pub fn normal(&self, message: &str) {
        if self.wants(VerbosityLevel::Normal) {
            self.emit(VerbosityLevel::Normal, None, message);
        }
    }

    /// Log at Verbose level
    #[inline]
    pub fn verbose(&self, message: &str) {
        if self.wants(VerbosityLevel::Verbose) {
            self.emit(VerbosityLevel::Verbose, None, message);
        }
    }

    /// Inconsistent reference or other recoverable problem
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit_fmt(VerbosityLevel::Minimal, Some("warning"), args);
    }

    /// Combat mutation trace (declarations, blocks, damage, removals)
    ///
    /// Compiled out without the `verbose-logging` feature
    pub fn combat(&self, args: fmt::Arguments<'_>) {
        #[cfg(feature = "verbose-logging")]
        self.emit_fmt(VerbosityLevel::Verbose, Some("combat"), args);
        #[cfg(not(feature = "verbose-logging"))]
        let _ = args;
    }

    /// Combat summary line (totals, outcomes)
    pub fn combat_summary(&self, args: fmt::Arguments<'_>) {
        self.emit_fmt(VerbosityLevel::Normal, Some("combat"), args);
    }
}

impl Default for GameLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GameLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLogger")
            .field("verbosity", &self.verbosity)
            .field("output_mode", &self.output_mode)
            .field("log_count", &self.log_buffer.borrow().len())
            .finish()
    }
}

impl Clone for GameLogger {
    /// Clones settings only; captured entries stay with the original
    fn clone(&self) -> Self {
        GameLogger {
            verbosity: self.verbosity,
            output_mode: self.output_mode,
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }
}

// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for robolog.
//!
//! Provides error types for packet-stream operations:
//! - Corrupt-stream detection (bad magic, out-of-sequence sources)
//! - Tag mismatches while parsing records
//! - Invalid use of the reader API
//! - Seeks past the end of a stream
//! - Underlying I/O failures

use std::fmt;

/// Errors that can occur while reading a packet stream.
#[derive(Debug, Clone)]
pub enum StreamError {
    /// The stream violates the container format
    Format {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// A record tag did not match the expected tag
    TagMismatch {
        /// Tag that was expected
        expected: String,
        /// Tag that was found
        found: String,
    },

    /// The reader API was used incorrectly
    Usage {
        /// What the caller did wrong
        message: String,
    },

    /// A seek target does not exist in the stream
    OutOfRange {
        /// Source id that was requested
        source: u32,
        /// Sequence number that was requested
        sequence: usize,
    },

    /// Underlying I/O failure
    Io {
        /// Error message
        message: String,
    },
}

impl StreamError {
    /// Create a format violation error.
    pub fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        StreamError::Format {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a tag mismatch error.
    pub fn tag_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        StreamError::TagMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        StreamError::Usage {
            message: message.into(),
        }
    }

    /// Create an out-of-range seek error.
    pub fn out_of_range(source: u32, sequence: usize) -> Self {
        StreamError::OutOfRange { source, sequence }
    }

    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        StreamError::Io {
            message: message.into(),
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            StreamError::Format { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            StreamError::TagMismatch { expected, found } => {
                vec![("expected", expected.clone()), ("found", found.clone())]
            }
            StreamError::Usage { message } => vec![("message", message.clone())],
            StreamError::OutOfRange { source, sequence } => vec![
                ("source", source.to_string()),
                ("sequence", sequence.to_string()),
            ],
            StreamError::Io { message } => vec![("message", message.clone())],
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Format { context, message } => {
                write!(f, "Corrupt stream in {context}: {message}")
            }
            StreamError::TagMismatch { expected, found } => {
                write!(
                    f,
                    "Tag mismatch: expected tag '{expected}', found tag '{found}'"
                )
            }
            StreamError::Usage { message } => {
                write!(f, "Invalid use of packet stream: {message}")
            }
            StreamError::OutOfRange { source, sequence } => {
                write!(
                    f,
                    "Frame {sequence} of source {source} is not present in the stream"
                )
            }
            StreamError::Io { message } => write!(f, "I/O error: {message}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for robolog operations.
pub type Result<T> = std::result::Result<T, StreamError>;

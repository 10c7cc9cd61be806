//! Error taxonomy for reading and writing syndication documents.
//!
//! Every failure carries enough context to locate the problem: structural
//! errors and date errors record the byte position in the input, nested
//! failures record which construct was being read when the inner error
//! escaped.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced while reading or writing Atom and AtomPub documents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The XML was malformed or an element had an unexpected shape.
    #[error("structural error at byte {position}: {message}")]
    Structural {
        /// Human-readable description of what was wrong.
        message: String,
        /// Byte offset into the input where the problem was detected.
        position: u64,
    },

    /// A text construct carried a `type` attribute outside
    /// `text` / `html` / `xhtml`.
    #[error("unsupported content type {value:?} on {path}")]
    UnsupportedContentType {
        /// Path of the element whose `type` attribute was rejected.
        path: String,
        /// The offending attribute value.
        value: String,
    },

    /// A date value matched neither accepted RFC 3339 pattern.
    #[error("unparsable date {value:?} at byte {position}")]
    UnparsableDate {
        /// The raw (trimmed) text that failed to parse.
        value: String,
        /// Byte offset of the containing element.
        position: u64,
    },

    /// Captured extension markup for one entity exceeded the configured cap.
    #[error("extension data exceeded the {limit}-byte limit")]
    ExtensionSizeExceeded {
        /// The configured cap in bytes.
        limit: usize,
    },

    /// A caller-supplied factory or generator failed its capability check.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An error escaped a nested read; names the construct being read.
    #[error("error reading {context} at byte {position}")]
    Nested {
        /// The construct being read when the inner error occurred.
        context: &'static str,
        /// Byte offset where the nested read started failing.
        position: u64,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn structural(message: impl Into<String>, position: u64) -> Self {
        Error::Structural {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn nested(context: &'static str, position: u64, source: Error) -> Self {
        Error::Nested {
            context,
            position,
            source: Box::new(source),
        }
    }
}

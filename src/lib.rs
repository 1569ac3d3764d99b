//! # Recode - iconv-style character set conversion
//!
//! A character set conversion library built around stateful handles. Each
//! [`Handle`] binds one (source encoding, destination encoding) pair to a
//! codec primitive and an internal output buffer that grows on demand, so
//! arbitrary-length inputs convert through a primitive that only fills a
//! fixed-size destination per step.
//!
//! ## Features
//!
//! - **Handle-owned buffers** that grow on overflow and are reused across
//!   calls, with a zero-copy borrowed result or a detached copy
//! - **iconv-style identifiers** including `//TRANSLIT` and `//IGNORE`
//!   modifier suffixes and common code page aliases (`CP932`, `CP1251`, ...)
//! - **Closed error taxonomy** so callers branch on kind, not on strings
//! - **Pluggable codec primitives** behind the [`Codec`] trait, with an
//!   `encoding_rs`-backed implementation built in
//!
//! ## Quick Start
//!
//! ```rust
//! use recode::Handle;
//!
//! // Open a handle for conversion from UTF-8 to CP932.
//! let mut handle = Handle::open("CP932", "UTF-8")?;
//!
//! let sjis = handle.convert("あいうえお".as_bytes())?;
//! assert_eq!(sjis, [0x82, 0xA0, 0x82, 0xA2, 0x82, 0xA4, 0x82, 0xA6, 0x82, 0xA8]);
//!
//! handle.close()?;
//! # Ok::<(), recode::Error>(())
//! ```
//!
//! A handle is single-owner and not thread-safe by design: every operation
//! takes `&mut self`, so concurrent conversion requires one handle per
//! worker. There is no shared state across handles.

#![deny(missing_docs)]

use std::fmt;

mod buffer;
pub mod codec;

pub use codec::{Codec, StepStatus, Transcoder, canonical_name};

use buffer::OutputBuffer;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Default ceiling on a handle's output buffer growth (1 GiB).
///
/// The underlying grow/retry loop would otherwise expand without bound on
/// adversarial input; [`Handle::open_with_limit`] overrides the ceiling.
pub const DEFAULT_MAX_OUTPUT: usize = 1 << 30;

/// Errors that can occur while opening, using, or closing a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Use of a handle that is closed
    InvalidHandle,
    /// The encoding pair could not be realized at open time
    OpenFailed {
        /// Destination identifier as given by the caller
        to: String,
        /// Source identifier as given by the caller
        from: String,
        /// Diagnostic from the codec primitive's name resolution
        reason: String,
    },
    /// The source contains bytes that are not valid in the source encoding,
    /// or a character the destination encoding cannot represent
    InvalidSequence,
    /// The source ends in the middle of a multibyte sequence
    IncompleteSequence,
    /// The output buffer growth ceiling was exceeded
    ConversionTooLarge {
        /// The ceiling, in bytes
        limit: usize,
    },
    /// Opaque passthrough of a codec primitive diagnostic
    Primitive(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle => write!(f, "invalid handle"),
            Error::OpenFailed { to, from, reason } => {
                write!(
                    f,
                    "cannot open conversion from {:?} to {:?}: {}",
                    from, to, reason
                )
            }
            Error::InvalidSequence => {
                write!(f, "invalid byte sequence in source encoding")
            }
            Error::IncompleteSequence => {
                write!(f, "source ends with an incomplete multibyte sequence")
            }
            Error::ConversionTooLarge { limit } => {
                write!(f, "conversion output exceeds the {}-byte ceiling", limit)
            }
            Error::Primitive(message) => write!(f, "codec error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

struct Inner {
    codec: Box<dyn Codec>,
    buf: OutputBuffer,
}

/// A handle for character set conversion.
///
/// A handle is either *open* or *closed*: every call on a closed handle
/// fails with [`Error::InvalidHandle`], and a closed handle cannot be
/// reopened. Dropping an open handle releases its resources too; explicit
/// [`close`](Handle::close) exists so that double-close bugs surface as
/// errors instead of passing silently.
///
/// ```rust
/// use recode::Handle;
///
/// let mut handle = Handle::open("UTF-8", "CP932")?;
/// let utf8 = handle.convert(&[0x82, 0xA0])?;
/// assert_eq!(utf8, "あ".as_bytes());
/// handle.close()?;
/// assert!(handle.close().is_err());
/// # Ok::<(), recode::Error>(())
/// ```
pub struct Handle {
    to: String,
    from: String,
    inner: Option<Inner>,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("to", &self.to)
            .field("from", &self.from)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Handle {
    /// Open a handle for conversion from `from_code` to `to_code`.
    ///
    /// `to_code` may carry a `//TRANSLIT` (substitute `?` for unconvertible
    /// characters) or `//IGNORE` (drop invalid and unconvertible units)
    /// suffix; identifier syntax is otherwise delegated to the codec
    /// primitive. Fails with [`Error::OpenFailed`] when the pair cannot be
    /// realized.
    pub fn open(to_code: &str, from_code: &str) -> Result<Handle> {
        Handle::open_with_limit(to_code, from_code, DEFAULT_MAX_OUTPUT)
    }

    /// Open a handle with an explicit ceiling on output buffer growth.
    ///
    /// A conversion whose output would not fit in `max_output` bytes fails
    /// with [`Error::ConversionTooLarge`] instead of growing further.
    pub fn open_with_limit(to_code: &str, from_code: &str, max_output: usize) -> Result<Handle> {
        let codec = Transcoder::open(to_code, from_code)?;
        Ok(Handle {
            to: to_code.to_string(),
            from: from_code.to_string(),
            inner: Some(Inner {
                codec: Box::new(codec),
                buf: OutputBuffer::new(max_output),
            }),
        })
    }

    /// Build a handle over a caller-supplied codec primitive.
    ///
    /// The identifiers are recorded verbatim for the accessors; their
    /// interpretation is entirely up to `codec`.
    pub fn with_codec(to_code: &str, from_code: &str, codec: Box<dyn Codec>) -> Handle {
        Handle {
            to: to_code.to_string(),
            from: from_code.to_string(),
            inner: Some(Inner {
                codec,
                buf: OutputBuffer::new(DEFAULT_MAX_OUTPUT),
            }),
        }
    }

    /// Destination encoding identifier this handle was opened with.
    pub fn to_code(&self) -> &str {
        &self.to
    }

    /// Source encoding identifier this handle was opened with.
    pub fn from_code(&self) -> &str {
        &self.from
    }

    /// Whether the handle is still open.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Perform character set conversion, borrowing the result.
    ///
    /// The returned slice points into the handle's internal buffer: it is
    /// valid until the next conversion or close on this handle, which the
    /// borrow checker enforces. The buffer is overwritten, not appended to,
    /// on every call; successive borrowed results reuse the same storage.
    /// Use [`convert`](Handle::convert) for a result that outlives further
    /// handle activity.
    ///
    /// An empty source yields an empty result without invoking the codec.
    /// On failure no partial output is returned, and the handle stays open.
    pub fn convert_borrowed(&mut self, src: &[u8]) -> Result<&[u8]> {
        let inner = self.inner.as_mut().ok_or(Error::InvalidHandle)?;
        if src.is_empty() {
            return Ok(&[]);
        }
        inner.buf.convert(&mut *inner.codec, src)
    }

    /// Perform character set conversion, returning an independent copy.
    ///
    /// Same semantics as [`convert_borrowed`](Handle::convert_borrowed),
    /// except the result is detached from the handle's internal buffer and
    /// stays valid indefinitely.
    pub fn convert(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        self.convert_borrowed(src).map(|bytes| bytes.to_vec())
    }

    /// Close the handle, releasing the codec primitive and internal buffer.
    ///
    /// Closing an already-closed handle fails with [`Error::InvalidHandle`];
    /// double-close is a caller bug worth catching, not a no-op. Closing
    /// after a failed conversion still succeeds.
    pub fn close(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(Error::InvalidHandle),
        }
    }
}

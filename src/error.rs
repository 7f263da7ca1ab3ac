//! Unified error type for both decoding and encoding.

use thiserror::Error;

/// Everything that can go wrong while reading or writing an Ogg stream.
#[derive(Debug, Error)]
pub enum OggError {
    /// The underlying byte source ended before a complete page could be read.
    #[error("short read: byte source ended mid-page")]
    ShortRead,
    /// The four-byte capture pattern `OggS` was not found where expected.
    #[error("bad capture pattern")]
    BadCapturePattern,
    /// The page's stream structure version was not the only version this crate understands.
    #[error("unsupported stream structure version {0}")]
    BadVersion(u8),
    /// A page's computed CRC32 did not match the one stored in its header.
    #[error("page checksum mismatch")]
    ChecksumError,
    /// A page arrived whose sequence number was not the expected next one for its serial.
    ///
    /// This crate never returns this variant from its own code paths: a sequence gap is
    /// handled as a logged, silent continuation-reset (see [`crate::stream_in::StreamIn`]).
    /// It exists for API completeness against callers that build their own `StreamIn`.
    #[error("page sequence gap on serial {serial}: expected {expected}, got {actual}")]
    PageSequenceGap {
        /// The logical stream's serial number.
        serial: u32,
        /// The page sequence number that was expected next.
        expected: u32,
        /// The page sequence number actually observed.
        actual: u32,
    },
    /// `open()` was called with a serial the physical decoder has not observed a BOS page for.
    #[error("unknown serial {0} on open")]
    UnknownSerialOnOpen(u32),
    /// `open()` was called twice for the same serial without an intervening `close()`.
    #[error("serial {0} is already open")]
    DoubleOpen(u32),
    /// An operation was attempted against a serial that is not currently open.
    #[error("serial {0} is not open")]
    ClosedResource(u32),
    /// Seeking was requested on a byte source that does not support it.
    ///
    /// Unreachable in this crate's own API surface: seek methods are only defined in the
    /// `impl<R: Read + Seek>` block, so calling them on a non-seekable source is a compile
    /// error rather than a runtime one. Kept for completeness against a hypothetical
    /// dynamically-typed source.
    #[error("seeking is not supported by this byte source")]
    SeekUnsupported,
    /// The pending lacing table exceeded 255 entries without being flushed.
    ///
    /// Never constructed by this crate: [`crate::stream_out::StreamOut`] always splits
    /// pending data into page-sized chunks before the table can overflow.
    #[error("encoder lacing table overflow on serial {0}")]
    EncoderOverflow(u32),
    /// Wraps an I/O error from the underlying byte source or sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

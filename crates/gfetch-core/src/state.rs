//! Request state machine and error codes

use core::fmt;

/// State of a request as it moves through the engine.
///
/// Each state is owned by either the user thread or the channel's worker
/// thread; ownership changes hands only at the channel queue hand-off
/// points. The documented shortcut is `Opening` directly to `Fetching`
/// when the request already carries a buffer, which skips the `Opened`
/// round-trip through the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    /// Pool slot unused.
    Initial = 0,

    /// Queued on a channel, not yet assigned a lane.
    Allocated = 1,

    /// Worker is opening the file and querying its size.
    Opening = 2,

    /// Opened without a buffer; callback runs so the caller can inspect
    /// the content size and supply one.
    Opened = 3,

    /// Worker is reading bytes into the caller buffer.
    Fetching = 4,

    /// A chunk has arrived; callback runs to consume it.
    Fetched = 5,

    /// Explicitly paused; callback runs every pump cycle until resumed
    /// or cancelled.
    Paused = 6,

    /// Terminal error state; callback runs once with `finished` set.
    Failed = 7,
}

impl RequestState {
    /// True for the states handled on the worker side.
    #[inline]
    pub const fn is_worker_side(&self) -> bool {
        matches!(self, RequestState::Opening | RequestState::Fetching)
    }

    /// True once the request can only be recycled.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Failed)
    }
}

impl From<u8> for RequestState {
    fn from(v: u8) -> Self {
        match v {
            1 => RequestState::Allocated,
            2 => RequestState::Opening,
            3 => RequestState::Opened,
            4 => RequestState::Fetching,
            5 => RequestState::Fetched,
            6 => RequestState::Paused,
            7 => RequestState::Failed,
            _ => RequestState::Initial,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Initial => "initial",
            RequestState::Allocated => "allocated",
            RequestState::Opening => "opening",
            RequestState::Opened => "opened",
            RequestState::Fetching => "fetching",
            RequestState::Fetched => "fetched",
            RequestState::Paused => "paused",
            RequestState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Why a request failed, surfaced on every response.
///
/// `ErrorCode::None` means no error so far. Every other value arrives
/// on exactly one terminal callback with `finished` set; nothing is
/// retried by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ErrorCode {
    /// No error.
    #[default]
    None = 0,

    /// The file could not be opened.
    NotFound = 1,

    /// The request reached the fetching state with no buffer supplied.
    NoBuffer = 2,

    /// Whole-file load into a buffer smaller than the content, or a
    /// chunk size larger than the buffer.
    BufferTooSmall = 3,

    /// The platform loader returned fewer bytes than requested.
    UnexpectedEof = 4,

    /// The caller cancelled the request.
    Cancelled = 5,

    /// Unclassified platform failure.
    Unknown = 6,
}

impl ErrorCode {
    /// True for any value other than `None`.
    #[inline]
    pub const fn is_err(&self) -> bool {
        !matches!(self, ErrorCode::None)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::None => "no error",
            ErrorCode::NotFound => "file not found",
            ErrorCode::NoBuffer => "no buffer supplied",
            ErrorCode::BufferTooSmall => "buffer too small",
            ErrorCode::UnexpectedEof => "unexpected end of file",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Unknown => "unknown error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_side_states() {
        assert!(RequestState::Opening.is_worker_side());
        assert!(RequestState::Fetching.is_worker_side());
        assert!(!RequestState::Opened.is_worker_side());
        assert!(!RequestState::Fetched.is_worker_side());
        assert!(!RequestState::Paused.is_worker_side());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestState::Failed.is_terminal());
        assert!(!RequestState::Fetched.is_terminal());
    }

    #[test]
    fn test_state_round_trip_u8() {
        for s in [
            RequestState::Initial,
            RequestState::Allocated,
            RequestState::Opening,
            RequestState::Opened,
            RequestState::Fetching,
            RequestState::Fetched,
            RequestState::Paused,
            RequestState::Failed,
        ] {
            assert_eq!(RequestState::from(s as u8), s);
        }
    }

    #[test]
    fn test_error_code_is_err() {
        assert!(!ErrorCode::None.is_err());
        assert!(ErrorCode::Cancelled.is_err());
        assert!(ErrorCode::NotFound.is_err());
    }
}

use std::error;
use std::fmt;

/// Errors related to LDAP probe communication.
///
/// One LDAP attempt fully succeeds or fully fails; no variant implies
/// a retry.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// The TCP connection could not be established.
    ConnectError(String),

    /// The socket failed after a successful connect.
    NetworkError(String),

    /// The shared request deadline expired.
    Timeout,

    /// Bad tag, bad length, or otherwise malformed TLV data from the
    /// server.
    ProtocolError(String),

    /// A caller-supplied parameter could not be interpreted, e.g. a
    /// malformed hex paging cookie.  Nothing reaches the wire.
    RequestFormatError(String),

    /// Well-formed BindResponse with a nonzero resultCode.
    BindFailed { code: i64, message: String },

    /// Well-formed operation response with a nonzero resultCode.
    OperationFailed { code: i64, message: String },

    /// The filter string falls outside the supported
    /// presence/equality subset.
    UnsupportedFilter(String),

    /// Response reassembly exceeded the buffer cap.
    ResponseTooLarge,

    /// The origin gate refused the target before any socket opened.
    OriginRefused(String),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectError(ref s) => write!(f, "connect error: {s}"),
            Error::NetworkError(ref s) => write!(f, "network error: {s}"),
            Error::Timeout => write!(f, "request deadline expired"),
            Error::ProtocolError(ref s) => write!(f, "protocol error: {s}"),
            Error::RequestFormatError(ref s) => write!(f, "bad request parameter: {s}"),
            Error::BindFailed { code, ref message } => {
                write!(f, "bind failed: {message} ({code})")
            }
            Error::OperationFailed { code, ref message } => {
                write!(f, "operation failed: {message} ({code})")
            }
            Error::UnsupportedFilter(ref s) => write!(f, "unsupported filter: {s}"),
            Error::ResponseTooLarge => write!(f, "response exceeds buffer cap"),
            Error::OriginRefused(ref s) => write!(f, "origin refused: {s}"),
        }
    }
}

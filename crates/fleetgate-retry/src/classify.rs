/// Classification of an upstream failure, independent of the provider
/// adapter that produced it.
///
/// Mirrors the matrix in the gateway's retry policy: connection-level and
/// timeout failures are retryable, as are upstream 429/5xx responses.
/// Other 4xx, malformed responses, and auth failures are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Timeout,
    DeadlineExceeded,
    Status(u16),
    Malformed,
    Auth,
    Other,
}

impl UpstreamErrorKind {
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamErrorKind::ConnectionRefused
            | UpstreamErrorKind::ConnectionReset
            | UpstreamErrorKind::Timeout
            | UpstreamErrorKind::DeadlineExceeded => true,
            UpstreamErrorKind::Status(code) => matches!(code, 429 | 500 | 502 | 503 | 504),
            UpstreamErrorKind::Malformed | UpstreamErrorKind::Auth | UpstreamErrorKind::Other => {
                false
            }
        }
    }
}

/// Convenience wrapper so callers holding a classifier function don't need
/// to import the enum method directly.
pub fn is_retryable(kind: &UpstreamErrorKind) -> bool {
    kind.is_retryable()
}

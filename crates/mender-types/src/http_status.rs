//! Status-code-to-string table for logging non-success server responses.
//!
//! Non-success HTTP statuses returned by the update server are logged with a
//! human-readable description alongside the server-provided error string, if
//! any, rather than a bare numeric code.

/// Describes a known HTTP status relevant to the update-server protocol.
/// Unrecognized codes fall back to a generic description rather than failing.
pub fn describe_status(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ if (200..300).contains(&status) => "Success",
        _ if (400..500).contains(&status) => "Client Error",
        _ if (500..600).contains(&status) => "Server Error",
        _ => "Unknown Status",
    }
}

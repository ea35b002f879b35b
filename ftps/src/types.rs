//! # Types
//!
//! Error type, reply record and the small enums shared by the session modules

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

use super::Status;

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is the library-global error type; every failing step of a session
/// returns one of these to its immediate caller.
#[derive(Debug, Error)]
pub enum FtpError {
    /// Dial, accept or control channel I/O failed
    #[error("Connection error: {0}")]
    ConnectionError(std::io::Error),
    /// Host name didn't resolve to any address
    #[error("Could not resolve host '{0}'")]
    UnresolvedHost(String),
    /// TLS handshake or record layer failure
    #[error("Secure error: {0}")]
    SecureError(String),
    /// Certificate, private key or root CA material could not be loaded
    #[error("Invalid certificate material at '{}': {reason}", path.display())]
    InvalidCertificate { path: PathBuf, reason: String },
    /// The server replied with a code other than the expected one.
    /// Contains the literal reply.
    #[error("Invalid response: expected {expected}, got {response}")]
    UnexpectedResponse { expected: u32, response: Response },
    /// The response syntax is invalid
    #[error("Response contains an invalid syntax")]
    BadResponse,
    /// No non-loopback IPv4 address is configured on this host
    #[error("Could not find a non-loopback IPv4 address for active mode")]
    NoLocalAddress,
    /// Local file couldn't be opened, created, read or written
    #[error("Local I/O error on '{}': {source}", path.display())]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A data channel of the wrong kind was handed over for the mode in effect
    #[error("Data channel mismatch: session is in {expected:?} mode, got a channel for {found:?} mode")]
    ChannelMismatch { expected: Mode, found: Mode },
    /// Control channel is not open
    #[error("Not connected")]
    NotConnected,
    /// `connect` was called on a session which already connected
    #[error("Session is already connected")]
    AlreadyConnected,
}

/// A reply read from the control channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Command which produced the reply; empty for the greeting and for transfer confirmations
    pub command: String,
    /// Numeric reply code, as sent by the server
    pub code: u32,
    /// Raw reply, all lines included
    pub body: Vec<u8>,
}

/// Ordered replies of a composite operation and what the operation produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange<T> {
    pub responses: Vec<Response>,
    pub output: T,
}

/// Connection mode for data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Client listens, server connects (PORT)
    Active,
    /// Server listens, client connects (PASV)
    Passive,
}

/// Way the bytes flow on a file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

/// Features returned by FEAT command (key, maybe value)
pub type Features = HashMap<String, Option<String>>;

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message())
    }
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(command: impl Into<String>, code: u32, body: Vec<u8>) -> Self {
        Self {
            command: command.into(),
            code,
            body,
        }
    }

    /// Reply code as [`Status`]
    pub fn status(&self) -> Status {
        Status::from(self.code)
    }

    /// Get response as string
    pub fn as_string(&self) -> Result<String, FromUtf8Error> {
        String::from_utf8(self.body.clone()).map(|x| x.trim_end().to_string())
    }

    /// Reply text without the leading reply codes. Lines of a multi-line reply
    /// are joined with `\n`.
    pub fn message(&self) -> String {
        let code = self.code.to_string();
        String::from_utf8_lossy(&self.body)
            .lines()
            .map(|line| {
                let line = line.trim_end_matches('\r');
                match line.strip_prefix(code.as_str()) {
                    Some(rest) if rest.starts_with(' ') || rest.starts_with('-') => &rest[1..],
                    Some("") => "",
                    _ => line,
                }
            })
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

impl<T> Exchange<T> {
    pub fn new(responses: Vec<Response>, output: T) -> Self {
        Self { responses, output }
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fmt_error() {
        assert_eq!(
            FtpError::ConnectionError(std::io::Error::new(std::io::ErrorKind::NotFound, "omar"))
                .to_string()
                .as_str(),
            "Connection error: omar"
        );
        assert_eq!(
            FtpError::UnexpectedResponse {
                expected: Status::RequestedFileActionOk.code(),
                response: Response::new(
                    "RMD /tmp",
                    550,
                    b"550 Can't remove directory\r\n".to_vec()
                ),
            }
            .to_string()
            .as_str(),
            "Invalid response: expected 250, got [550] Can't remove directory"
        );
        assert_eq!(
            FtpError::ChannelMismatch {
                expected: Mode::Passive,
                found: Mode::Active
            }
            .to_string()
            .as_str(),
            "Data channel mismatch: session is in Passive mode, got a channel for Active mode"
        );
        assert_eq!(
            FtpError::InvalidCertificate {
                path: PathBuf::from("/tmp/cert.pem"),
                reason: "no certificates found".to_string()
            }
            .to_string()
            .as_str(),
            "Invalid certificate material at '/tmp/cert.pem': no certificates found"
        );
    }

    #[test]
    fn response() {
        let response = Response::new("", 220, b"220 ready\r\n".to_vec());
        assert_eq!(response.status(), Status::Ready);
        assert_eq!(response.as_string().unwrap(), "220 ready");
        assert_eq!(response.message(), "ready");
        assert!(response.command.is_empty());
    }

    #[test]
    fn should_strip_codes_from_multiline_message() {
        let response = Response::new(
            "FEAT",
            211,
            b"211-Features:\r\n UTF8\r\n SIZE\r\n211 End\r\n".to_vec(),
        );
        assert_eq!(response.message(), "Features:\n UTF8\n SIZE\nEnd");
    }

    #[test]
    fn fmt_response() {
        let response = Response::new(
            "MKD omar",
            550,
            b"550 Can't create directory: File exists\r\n".to_vec(),
        );
        assert_eq!(
            response.to_string().as_str(),
            "[550] Can't create directory: File exists"
        );
    }
}

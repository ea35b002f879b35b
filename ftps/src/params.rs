//! # Params
//!
//! The immutable parameter set a [`crate::Session`] is built from

use std::path::PathBuf;
use std::time::Duration;

/// How TLS is layered over the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureMode {
    /// TLS from the first byte of the control connection
    Implicit,
    /// Plain control connection upgraded with `AUTH TLS`
    Explicit,
}

/// Session parameters.
///
/// Built once by the caller and never changed for the lifetime of the session.
///
/// ```rust
/// use ftps::{Parameters, SecureMode};
///
/// let params = Parameters::new("ftp.example.com", 21)
///     .credentials("user", "secret")
///     .secure(SecureMode::Explicit)
///     .always_trust(true)
///     .keep_alive(true);
/// assert!(params.is_secure());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// `None` for plain FTP
    pub security: Option<SecureMode>,
    /// Client certificate (PEM)
    pub cert: Option<PathBuf>,
    /// Client certificate private key (PEM)
    pub key: Option<PathBuf>,
    /// Root CA to trust (PEM)
    pub root_ca: Option<PathBuf>,
    /// Skip peer certificate verification
    pub always_trust: bool,
    pub passive: bool,
    /// Local port to listen on in active mode
    pub listen_port: u16,
    /// Keep the control connection open after a data operation
    pub keep_alive: bool,
    /// Dial budget for the control channel
    pub connect_timeout: Duration,
    /// TCP keep-alive interval for the control channel
    pub tcp_keepalive: Duration,
    /// Read/write deadline on the data channel; `None` waits forever
    pub transfer_timeout: Option<Duration>,
}

impl Parameters {
    /// Parameters for a plain, passive, anonymous session; no keep-alive.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: String::new(),
            password: String::new(),
            security: None,
            cert: None,
            key: None,
            root_ca: None,
            always_trust: false,
            passive: true,
            listen_port: 0,
            keep_alive: false,
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Duration::from_secs(30),
            transfer_timeout: None,
        }
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn secure(mut self, mode: SecureMode) -> Self {
        self.security = Some(mode);
        self
    }

    /// Client certificate and its private key
    pub fn certificate(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self.key = Some(key.into());
        self
    }

    pub fn root_ca(mut self, root_ca: impl Into<PathBuf>) -> Self {
        self.root_ca = Some(root_ca.into());
        self
    }

    pub fn always_trust(mut self, always_trust: bool) -> Self {
        self.always_trust = always_trust;
        self
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }

    /// Use active mode, listening on `port`
    pub fn active(mut self, port: u16) -> Self {
        self.passive = false;
        self.listen_port = port;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn transfer_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn is_secure(&self) -> bool {
        self.security.is_some()
    }

    pub fn is_implicit(&self) -> bool {
        self.security == Some(SecureMode::Implicit)
    }

    pub fn is_explicit(&self) -> bool {
        self.security == Some(SecureMode::Explicit)
    }

    /// Client certificate and key, only when both paths are set and non-empty
    pub fn client_identity(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key))
                if !cert.as_os_str().is_empty() && !key.as_os_str().is_empty() =>
            {
                Some((cert, key))
            }
            _ => None,
        }
    }

    /// Root CA path, if set and non-empty
    pub fn root_ca_path(&self) -> Option<&PathBuf> {
        self.root_ca
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

//! # Tls
//!
//! Rustls client configuration and the TLS stream wrapper used on both channels

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
};

use crate::{FtpError, FtpResult, Parameters};

/// Crypto provider restricted to the AEAD part of the legacy FTPS baseline
/// (ECDHE key exchange, AES-128/256).
fn crypto_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: vec![
            ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        ],
        ..ring::default_provider()
    }
}

/// Builds TLS client streams for the control and data channels of one session.
///
/// The client config is shared, so data channels can resume the control channel's TLS session.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    domain: ServerName<'static>,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TlsConnector({:?})", self.domain)
    }
}

impl TlsConnector {
    /// Assemble the TLS configuration from the session parameters.
    ///
    /// - client certificate and root CA are only loaded when both certificate and key are set;
    /// - without a root CA the bundled web PKI roots are trusted;
    /// - `always_trust` disables peer certificate verification, but root CA material must
    ///   still parse.
    pub fn from_params(params: &Parameters) -> FtpResult<Self> {
        let provider = Arc::new(crypto_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(&[&rustls::version::TLS12])
            .map_err(|e| FtpError::SecureError(e.to_string()))?;

        let mut identity = None;
        let mut roots = None;
        if let Some((cert, key)) = params.client_identity() {
            identity = Some((load_certs(cert)?, load_private_key(key)?));
            if let Some(root_ca) = params.root_ca_path() {
                roots = Some(load_root_store(root_ca)?);
            }
        }

        let builder = if params.always_trust {
            warn!("peer certificate verification is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AlwaysTrust { provider }))
        } else {
            let roots = roots.unwrap_or_else(|| {
                RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned())
            });
            debug!("trusting {} root certificates", roots.len());
            builder.with_root_certificates(roots)
        };

        let config = match identity {
            Some((certs, key)) => {
                debug!("using client certificate");
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| FtpError::SecureError(e.to_string()))?
            }
            None => builder.with_no_client_auth(),
        };

        Self::new(Arc::new(config), &params.host)
    }

    /// Connector for `domain` using a ready made client configuration
    pub fn new(config: Arc<ClientConfig>, domain: &str) -> FtpResult<Self> {
        let domain = ServerName::try_from(domain.to_string())
            .map_err(|e| FtpError::SecureError(format!("invalid server name '{domain}': {e}")))?;
        Ok(Self { config, domain })
    }

    /// Wrap `stream` into a TLS client and run the handshake to completion.
    ///
    /// `pending` holds bytes already read from the socket, which belong to the TLS layer.
    pub fn connect(&self, mut stream: TcpStream, pending: &[u8]) -> FtpResult<TlsStream> {
        let mut conn = ClientConnection::new(Arc::clone(&self.config), self.domain.clone())
            .map_err(|e| FtpError::SecureError(e.to_string()))?;
        if !pending.is_empty() {
            debug!("replaying {} buffered bytes into TLS layer", pending.len());
            let mut pending = pending;
            while !pending.is_empty() {
                conn.read_tls(&mut pending)
                    .map_err(|e| FtpError::SecureError(e.to_string()))?;
            }
        }
        while conn.is_handshaking() {
            conn.complete_io(&mut stream)
                .map_err(|e| FtpError::SecureError(format!("TLS handshake failed: {e}")))?;
        }
        trace!(
            "TLS handshake completed: {:?} {:?}",
            conn.protocol_version(),
            conn.negotiated_cipher_suite().map(|suite| suite.suite())
        );
        Ok(TlsStream::from(StreamOwned::new(conn, stream)))
    }
}

/// Tls stream wrapper. Sends `close_notify` when dropped, unless already closed.
#[derive(Debug)]
pub struct TlsStream {
    stream: StreamOwned<ClientConnection, TcpStream>,
    closed: bool,
}

impl TlsStream {
    /// Get ref to underlying tcp stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Close the TLS layer first, then the socket.
    /// Both steps are always attempted; the first error is returned.
    pub fn close(mut self) -> io::Result<()> {
        self.closed = true;
        let notify = self.send_close_notify();
        let shutdown = self.stream.sock.shutdown(Shutdown::Both);
        trace!("TLS stream closed");
        notify.and(shutdown)
    }

    fn send_close_notify(&mut self) -> io::Result<()> {
        self.stream.conn.send_close_notify();
        while self.stream.conn.wants_write() {
            self.stream.conn.write_tls(&mut self.stream.sock)?;
        }
        Ok(())
    }
}

impl From<StreamOwned<ClientConnection, TcpStream>> for TlsStream {
    fn from(stream: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            // many servers drop the data connection without close_notify
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                debug!("peer closed TLS stream without close_notify");
                Ok(0)
            }
            result => result,
        }
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for TlsStream {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.send_close_notify() {
                error!("Failed to shutdown TLS stream: {}", err);
            } else {
                debug!("TLS stream shut down");
            }
        }
    }
}

/// Accepts any server certificate. Handshake signatures are still checked.
#[derive(Debug)]
struct AlwaysTrust {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AlwaysTrust {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// -- pem loading

fn invalid(path: &Path, reason: impl ToString) -> FtpError {
    FtpError::InvalidCertificate {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open_pem(path: &Path) -> FtpResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| invalid(path, e))
}

fn load_certs(path: &Path) -> FtpResult<Vec<CertificateDer<'static>>> {
    let mut reader = open_pem(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(path, e))?;
    if certs.is_empty() {
        return Err(invalid(path, "no certificate found"));
    }
    debug!("loaded {} certificates from {}", certs.len(), path.display());
    Ok(certs)
}

fn load_private_key(path: &Path) -> FtpResult<PrivateKeyDer<'static>> {
    let mut reader = open_pem(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| invalid(path, e))?
        .ok_or_else(|| invalid(path, "no private key found"))
}

fn load_root_store(path: &Path) -> FtpResult<RootCertStore> {
    let mut store = RootCertStore::empty();
    for cert in load_certs(path)? {
        store.add(cert).map_err(|e| invalid(path, e))?;
    }
    Ok(store)
}

#[cfg(test)]
mod test {

    use std::fs;
    use std::net::TcpListener;
    use std::thread;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::test_server::{MockStream, SelfSigned};

    fn write_identity(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let identity = SelfSigned::generate();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        fs::write(&cert, identity.cert_pem()).unwrap();
        fs::write(&key, identity.key_pem()).unwrap();
        (cert, key)
    }

    #[test]
    fn should_build_default_connector() {
        crate::log_init();
        let connector = TlsConnector::from_params(&Parameters::new("localhost", 21)).unwrap();
        assert_eq!(
            connector.domain,
            ServerName::try_from("localhost".to_string()).unwrap()
        );
        assert!(!connector.config.client_auth_cert_resolver.has_certs());
    }

    #[test]
    fn should_accept_ip_address_as_server_name() {
        assert!(TlsConnector::from_params(&Parameters::new("127.0.0.1", 21)).is_ok());
    }

    #[test]
    fn should_load_client_certificate_and_root_ca() {
        crate::log_init();
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_identity(&dir);
        let params = Parameters::new("localhost", 21)
            .certificate(&cert, &key)
            .root_ca(&cert);
        let connector = TlsConnector::from_params(&params).unwrap();
        assert!(connector.config.client_auth_cert_resolver.has_certs());
        let params = params.always_trust(true);
        assert!(TlsConnector::from_params(&params).is_ok());
    }

    #[test]
    fn should_skip_root_ca_without_client_certificate() {
        let params = Parameters::new("localhost", 21).root_ca("/this/does/not/exist.pem");
        assert!(TlsConnector::from_params(&params).is_ok());
    }

    /// Server side of a handshake on a loopback listener; `true` when it failed
    fn spawn_tls_server() -> (std::net::SocketAddr, thread::JoinHandle<bool>) {
        let config = SelfSigned::generate().server_config();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            MockStream::accept_tls(stream, &config).is_err()
        });
        (addr, handle)
    }

    #[test]
    fn should_complete_handshake_without_buffered_bytes() {
        crate::log_init();
        let (addr, server) = spawn_tls_server();
        let connector =
            TlsConnector::from_params(&Parameters::new("localhost", 21).always_trust(true))
                .unwrap();
        let stream = connector
            .connect(TcpStream::connect(addr).unwrap(), &[])
            .unwrap();
        drop(stream);
        assert!(!server.join().unwrap());
    }

    #[test]
    fn should_feed_buffered_bytes_to_tls_layer() {
        crate::log_init();
        let (addr, server) = spawn_tls_server();
        let connector =
            TlsConnector::from_params(&Parameters::new("localhost", 21).always_trust(true))
                .unwrap();
        // fatal handshake_failure alert, already read off the socket with the `234` reply
        let pending = [0x15, 0x03, 0x03, 0x00, 0x02, 0x02, 0x28];
        match connector.connect(TcpStream::connect(addr).unwrap(), &pending) {
            Err(FtpError::SecureError(reason)) => {
                assert!(reason.contains("alert"), "unexpected reason: {reason}")
            }
            other => panic!("expected SecureError, got {other:?}"),
        }
        assert!(server.join().unwrap());
    }

    #[test]
    fn should_fail_on_missing_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let (_, key) = write_identity(&dir);
        let missing = dir.path().join("missing.pem");
        let params = Parameters::new("localhost", 21).certificate(&missing, &key);
        match TlsConnector::from_params(&params) {
            Err(FtpError::InvalidCertificate { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected InvalidCertificate, got {other:?}"),
        }
    }

    #[test]
    fn should_fail_on_key_file_without_key() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = write_identity(&dir);
        // the certificate file holds no private key
        let params = Parameters::new("localhost", 21).certificate(&cert, &cert);
        assert!(matches!(
            TlsConnector::from_params(&params),
            Err(FtpError::InvalidCertificate { .. })
        ));
    }

    #[test]
    fn should_fail_on_malformed_root_ca_even_when_always_trusting() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_identity(&dir);
        let root_ca = dir.path().join("root.pem");
        fs::write(&root_ca, "this is not a certificate").unwrap();
        let params = Parameters::new("localhost", 21)
            .certificate(&cert, &key)
            .root_ca(&root_ca)
            .always_trust(true);
        match TlsConnector::from_params(&params) {
            Err(FtpError::InvalidCertificate { path, .. }) => assert_eq!(path, root_ca),
            other => panic!("expected InvalidCertificate, got {other:?}"),
        }
    }

    #[test]
    fn should_restrict_cipher_suites() {
        let provider = crypto_provider();
        assert_eq!(provider.cipher_suites.len(), 4);
        assert!(provider
            .cipher_suites
            .iter()
            .all(|suite| suite.version() == &rustls::version::TLS12));
    }
}

//! # Test server
//!
//! Scripted FTP server running on a background thread. Each test drives the control
//! channel line by line and checks what the session sent.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use pretty_assertions::assert_eq;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};

use crate::session::{join_port, split_port};
use crate::Parameters;

/// Self signed certificate for `localhost`
pub struct SelfSigned {
    cert: rcgen::Certificate,
}

impl SelfSigned {
    pub fn generate() -> Self {
        Self {
            cert: rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap(),
        }
    }

    pub fn cert_pem(&self) -> String {
        self.cert.serialize_pem().unwrap()
    }

    pub fn key_pem(&self) -> String {
        self.cert.serialize_private_key_pem()
    }

    pub fn server_config(&self) -> Arc<ServerConfig> {
        let cert = CertificateDer::from(self.cert.serialize_der().unwrap());
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
            self.cert.serialize_private_key_der(),
        ));
        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
        Arc::new(config)
    }
}

/// Server side stream, plain or TLS
pub enum MockStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl MockStream {
    /// Run the server side of the handshake on `stream`
    pub fn accept_tls(mut stream: TcpStream, config: &Arc<ServerConfig>) -> io::Result<Self> {
        let mut conn = ServerConnection::new(Arc::clone(config))
            .map_err(|e| io::Error::new(ErrorKind::Other, e))?;
        while conn.is_handshaking() {
            conn.complete_io(&mut stream)?;
        }
        Ok(Self::Tls(Box::new(StreamOwned::new(conn, stream))))
    }

    /// Write `bytes` and close the stream
    pub fn send(mut self, bytes: &[u8]) {
        self.write_all(bytes).unwrap();
        self.flush().unwrap();
        self.close();
    }

    /// Read until the peer closes, then close the stream
    pub fn receive(mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes).unwrap();
        self.close();
        bytes
    }

    fn close(self) {
        match self {
            Self::Plain(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            Self::Tls(mut stream) => {
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    if stream.conn.write_tls(&mut stream.sock).is_err() {
                        break;
                    }
                }
                let _ = stream.sock.shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => match stream.read(buf) {
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(0),
                result => result,
            },
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

/// Control channel as seen by the server script
pub struct MockControl {
    reader: Option<BufReader<MockStream>>,
    tls: Arc<ServerConfig>,
    received: Vec<String>,
}

impl MockControl {
    fn reader(&mut self) -> &mut BufReader<MockStream> {
        self.reader.as_mut().unwrap()
    }

    /// Send a reply; embedded `\r\n` make multi-line replies
    pub fn reply(&mut self, line: &str) {
        let stream = self.reader().get_mut();
        stream.write_all(format!("{line}\r\n").as_bytes()).unwrap();
        stream.flush().unwrap();
    }

    /// Next command line, without its line terminator
    pub fn recv(&mut self) -> String {
        let mut line = String::new();
        self.reader().read_line(&mut line).unwrap();
        assert!(!line.is_empty(), "client closed the control channel");
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        self.received.push(line.clone());
        line
    }

    pub fn expect(&mut self, command: &str) {
        let line = self.recv();
        assert_eq!(line.as_str(), command);
    }

    pub fn expect_reply(&mut self, command: &str, reply: &str) {
        self.expect(command);
        self.reply(reply);
    }

    pub fn greet(&mut self) {
        self.reply("220 Mock FTP server ready");
    }

    pub fn login(&mut self, user: &str, password: &str) {
        self.expect_reply(&format!("USER {user}"), "331 Password required");
        self.expect_reply(&format!("PASS {password}"), "230 User logged in");
    }

    pub fn quit(&mut self) {
        self.expect_reply("QUIT", "221 Goodbye");
    }

    /// Wrap the control channel in TLS, after `AUTH TLS` was answered
    pub fn upgrade(&mut self) {
        let reader = self.reader.take().unwrap();
        assert!(reader.buffer().is_empty());
        let MockStream::Plain(stream) = reader.into_inner() else {
            panic!("control channel is already secure");
        };
        let stream = MockStream::accept_tls(stream, &self.tls).unwrap();
        self.reader = Some(BufReader::new(stream));
    }

    /// Answer `PASV` advertising 10.0.0.5, which the session must ignore
    pub fn passive(&mut self) -> TcpListener {
        self.expect("PASV");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (msb, lsb) = split_port(listener.local_addr().unwrap().port());
        self.reply(&format!(
            "227 Entering Passive Mode (10,0,0,5,{msb},{lsb})"
        ));
        listener
    }

    /// Answer `PORT` and return the announced address
    pub fn active(&mut self) -> SocketAddr {
        let line = self.recv();
        let argument = line.strip_prefix("PORT ").unwrap();
        let numbers = argument
            .split(',')
            .map(|n| n.parse::<u8>().unwrap())
            .collect::<Vec<u8>>();
        assert_eq!(numbers.len(), 6);
        self.reply("200 PORT command successful");
        let ip = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
        SocketAddr::V4(SocketAddrV4::new(ip, join_port(numbers[4], numbers[5])))
    }

    /// Accept the passive data connection
    pub fn accept_data(&self, listener: &TcpListener, secure: bool) -> MockStream {
        let (stream, _) = listener.accept().unwrap();
        self.data_stream(stream, secure)
    }

    /// Connect to the address announced with `PORT`
    pub fn connect_data(&self, addr: SocketAddr, secure: bool) -> MockStream {
        let stream = TcpStream::connect(addr).unwrap();
        self.data_stream(stream, secure)
    }

    fn data_stream(&self, stream: TcpStream, secure: bool) -> MockStream {
        if secure {
            MockStream::accept_tls(stream, &self.tls).unwrap()
        } else {
            MockStream::Plain(stream)
        }
    }
}

/// Handle on a running mock server
pub struct MockServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl MockServer {
    /// Plain control channel
    pub fn spawn<F>(script: F) -> Self
    where
        F: FnOnce(&mut MockControl) + Send + 'static,
    {
        Self::start(false, script)
    }

    /// TLS from the first byte of the control channel
    pub fn spawn_implicit<F>(script: F) -> Self
    where
        F: FnOnce(&mut MockControl) + Send + 'static,
    {
        Self::start(true, script)
    }

    fn start<F>(implicit: bool, script: F) -> Self
    where
        F: FnOnce(&mut MockControl) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let tls = SelfSigned::generate().server_config();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let stream = if implicit {
                match MockStream::accept_tls(stream, &tls) {
                    Ok(stream) => stream,
                    Err(_) => return Vec::new(),
                }
            } else {
                MockStream::Plain(stream)
            };
            let mut ctrl = MockControl {
                reader: Some(BufReader::new(stream)),
                tls,
                received: Vec::new(),
            };
            script(&mut ctrl);
            ctrl.received
        });
        Self { addr, handle }
    }

    /// Parameters pointing at this server
    pub fn params(&self) -> Parameters {
        Parameters::new("127.0.0.1", self.addr.port())
    }

    /// Wait for the script to end; returns every command line it received
    pub fn join(self) -> Vec<String> {
        match self.handle.join() {
            Ok(received) => received,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

//! # Session
//!
//! A blocking FTP/FTPS session: control channel lifecycle, command/response engine
//! and the composite operations built on top of it.

mod channel;
mod data_stream;
mod tls;
mod transfer;

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;

pub use channel::{join_port, local_ipv4, split_port, DataChannel};
pub use data_stream::DataStream;
use socket2::{SockRef, TcpKeepalive};
pub use tls::{TlsConnector, TlsStream};

use crate::command::{feat, Command, ProtectionLevel};
use crate::{Direction, Exchange, Features, FtpError, FtpResult, Mode, Parameters, Response, Status};

/// Whether the server greeted the session. Only moves from `Offline` to `Online`;
/// a session that quit stays `Online` and is discarded by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Offline,
    Online,
}

/// An FTP session, driven one command at a time.
///
/// Composite operations ([`Session::list`], [`Session::download`], [`Session::upload`]) send
/// `QUIT` once done unless [`Parameters::keep_alive`] is set.
#[derive(Debug)]
pub struct Session {
    params: Parameters,
    state: SessionState,
    reader: Option<BufReader<DataStream>>,
    tls: Option<TlsConnector>,
    /// Resolved address of the control host; passive data connections go here
    remote_ip: Option<IpAddr>,
    welcome_msg: Option<String>,
    features: Features,
}

impl Session {
    /// A new, offline session
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            state: SessionState::Offline,
            reader: None,
            tls: None,
            remote_ip: None,
            welcome_msg: None,
            features: Features::new(),
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the control channel is still open
    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Data channel mode in effect
    pub fn mode(&self) -> Mode {
        if self.params.passive {
            Mode::Passive
        } else {
            Mode::Active
        }
    }

    /// Message of the `220` greeting
    pub fn welcome_message(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    /// Features advertised by the server; filled by [`Session::negotiate_options`]
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Whether the control channel is TLS wrapped
    pub fn is_secure(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| reader.get_ref().is_secure())
            .unwrap_or(false)
    }

    /// Dial the server, apply implicit TLS if configured and read the `220` greeting.
    ///
    /// TLS material is loaded before dialing. A session connects once.
    pub fn connect(&mut self) -> FtpResult<Response> {
        if self.state == SessionState::Online {
            return Err(FtpError::AlreadyConnected);
        }
        let tls = if self.params.is_secure() {
            Some(self.tls_connector()?)
        } else {
            None
        };
        let addr = self.resolve()?;
        debug!("Connecting to {} ({addr})", self.params.host);
        let stream = TcpStream::connect_timeout(&addr, self.params.connect_timeout)
            .map_err(FtpError::ConnectionError)?;
        SockRef::from(&stream)
            .set_tcp_keepalive(&TcpKeepalive::new().with_time(self.params.tcp_keepalive))
            .map_err(FtpError::ConnectionError)?;
        self.remote_ip = Some(addr.ip());

        let stream = match tls {
            Some(tls) if self.params.is_implicit() => {
                debug!("Implicit TLS, securing control channel");
                DataStream::Ssl(Box::new(tls.connect(stream, &[])?))
            }
            _ => DataStream::Tcp(stream),
        };
        self.reader = Some(BufReader::new(stream));

        debug!("Reading server response...");
        match self.read_response("", Status::Ready.code()) {
            Ok(response) => {
                let welcome_msg = response.message();
                debug!("Server READY; response: {welcome_msg:?}");
                self.welcome_msg = Some(welcome_msg);
                self.state = SessionState::Online;
                Ok(response)
            }
            Err(err) => {
                self.reader = None;
                Err(err)
            }
        }
    }

    /// Wrap the plain control channel in TLS. No-op when already secured.
    pub fn secure_upgrade(&mut self) -> FtpResult<()> {
        match self.reader.as_ref() {
            None => return Err(FtpError::NotConnected),
            Some(reader) if reader.get_ref().is_secure() => {
                debug!("Control channel is already secured");
                return Ok(());
            }
            Some(_) => {}
        }
        let tls = self.tls_connector()?;
        let Some(reader) = self.reader.take() else {
            return Err(FtpError::NotConnected);
        };
        let pending = reader.buffer().to_vec();
        match reader.into_inner() {
            DataStream::Tcp(stream) => {
                let stream = tls.connect(stream, &pending)?;
                self.reader = Some(BufReader::new(DataStream::Ssl(Box::new(stream))));
                debug!("Control channel secured");
                Ok(())
            }
            stream => {
                self.reader = Some(BufReader::new(stream));
                Ok(())
            }
        }
    }

    /// Send a single command line and require `expected` as reply code.
    /// Any numeric code is accepted; [`Status`] converts into one.
    pub fn command(&mut self, text: &str, expected: impl Into<u32>) -> FtpResult<Response> {
        let cmd = Command::Custom(text.to_string());
        self.perform(&cmd)?;
        self.read_response(&cmd.to_string(), expected.into())
    }

    /// `AUTH TLS` (explicit mode only), then `USER`/`PASS`.
    pub fn authenticate(&mut self) -> FtpResult<Vec<Response>> {
        let mut responses = Vec::with_capacity(3);
        if self.params.is_explicit() {
            responses.push(self.exec(Command::Auth, Status::AuthOk)?);
            self.secure_upgrade()?;
        }
        let user = self.params.user.clone();
        let password = self.params.password.clone();
        responses.push(self.exec(Command::User(user), Status::NeedPassword)?);
        responses.push(self.exec(Command::Pass(password), Status::LoggedIn)?);
        debug!("Logged in as {}", self.params.user);
        Ok(responses)
    }

    /// `SYST`, `FEAT`, `OPTS UTF8 ON`, `PROT P` (secure sessions only), `TYPE I`.
    pub fn negotiate_options(&mut self) -> FtpResult<Vec<Response>> {
        let mut responses = Vec::with_capacity(5);
        responses.push(self.exec(Command::Syst, Status::Name)?);

        let response = self.exec(Command::Feat, Status::System)?;
        let lines = String::from_utf8_lossy(&response.body)
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect::<Vec<String>>();
        match feat::parse_features(&lines) {
            Ok(features) => self.features = features,
            Err(err) => warn!("Could not parse FEAT reply: {err}"),
        }
        responses.push(response);

        responses.push(self.exec(
            Command::Opts("UTF8".to_string(), Some("ON".to_string())),
            Status::CommandOk,
        )?);
        if self.params.is_secure() {
            responses.push(self.exec(Command::Prot(ProtectionLevel::Private), Status::CommandOk)?);
        }
        responses.push(self.exec(Command::TypeImage, Status::CommandOk)?);
        Ok(responses)
    }

    pub fn mkdir(&mut self, path: &str) -> FtpResult<Response> {
        self.exec(Command::Mkd(path.to_string()), Status::PathCreated)
    }

    pub fn rmdir(&mut self, path: &str) -> FtpResult<Response> {
        self.exec(Command::Rmd(path.to_string()), Status::RequestedFileActionOk)
    }

    /// Remove a file. The reply must be `200`.
    pub fn delete(&mut self, path: &str) -> FtpResult<Response> {
        self.exec(Command::Dele(path.to_string()), Status::CommandOk)
    }

    /// `RNFR` then `RNTO`; stops at the first unexpected reply.
    pub fn rename(&mut self, from: &str, to: &str) -> FtpResult<Vec<Response>> {
        let mut responses = Vec::with_capacity(2);
        responses.push(self.exec(
            Command::RenameFrom(from.to_string()),
            Status::RequestFilePending,
        )?);
        responses.push(self.exec(Command::RenameTo(to.to_string()), Status::RequestedFileActionOk)?);
        Ok(responses)
    }

    /// `QUIT`, then close the control channel whatever the reply.
    /// Every later command fails with [`FtpError::NotConnected`].
    pub fn quit(&mut self) -> FtpResult<Response> {
        debug!("Quitting stream");
        let result = self.exec(Command::Quit, Status::Closing);
        if let Some(reader) = self.reader.take() {
            if let Err(err) = reader.into_inner().close() {
                warn!("Failed to close control channel: {err}");
            }
        }
        result
    }

    /// Long listing of `path` as text.
    pub fn list(&mut self, path: &str) -> FtpResult<Exchange<String>> {
        debug!("Listing {path}");
        let result = self.data_operation(Command::List(path.to_string()), |session, channel| {
            session
                .read_all(channel)
                .map(|(response, bytes)| (response, String::from_utf8_lossy(&bytes).into_owned()))
        });
        self.finish(result)
    }

    /// Retrieve `remote` into the local file `local`; the output is the byte count.
    pub fn download(&mut self, local: &Path, remote: &str) -> FtpResult<Exchange<u64>> {
        debug!("Downloading {remote} to {}", local.display());
        let result = self.data_operation(Command::Retr(remote.to_string()), |session, channel| {
            session.stream_transfer(Direction::Download, local, channel)
        });
        self.finish(result)
    }

    /// Store the local file `local` at `remote`; the output is the byte count.
    pub fn upload(&mut self, local: &Path, remote: &str) -> FtpResult<Exchange<u64>> {
        debug!("Uploading {} to {remote}", local.display());
        let result = self.data_operation(Command::Store(remote.to_string()), |session, channel| {
            session.stream_transfer(Direction::Upload, local, channel)
        });
        self.finish(result)
    }

    /// Retrieve `remote` into any writer
    pub fn download_into<W>(&mut self, remote: &str, writer: &mut W) -> FtpResult<Exchange<u64>>
    where
        W: Write + ?Sized,
    {
        let result = self.data_operation(Command::Retr(remote.to_string()), |session, channel| {
            session.read_into(channel, writer)
        });
        self.finish(result)
    }

    /// Store the content of any reader at `remote`
    pub fn upload_from<R>(&mut self, reader: &mut R, remote: &str) -> FtpResult<Exchange<u64>>
    where
        R: Read + ?Sized,
    {
        let result = self.data_operation(Command::Store(remote.to_string()), |session, channel| {
            session.write_from(channel, reader)
        });
        self.finish(result)
    }

    // -- private

    /// Negotiate a data channel, issue `cmd` (reply `150`), then run `transfer` on the channel
    fn data_operation<T, F>(&mut self, cmd: Command, transfer: F) -> FtpResult<Exchange<T>>
    where
        F: FnOnce(&mut Self, DataChannel) -> FtpResult<(Response, T)>,
    {
        let (negotiation, channel) = self.open_data_channel()?;
        let opening = self.exec(cmd, Status::AboutToSend)?;
        let (confirmation, output) = transfer(self, channel)?;
        Ok(Exchange::new(
            vec![negotiation, opening, confirmation],
            output,
        ))
    }

    /// Quit the session after a composite operation, unless keep-alive is set.
    /// On failure the original error wins over the quit outcome.
    fn finish<T>(&mut self, result: FtpResult<Exchange<T>>) -> FtpResult<Exchange<T>> {
        if self.params.keep_alive {
            return result;
        }
        match result {
            Ok(mut exchange) => {
                exchange.responses.push(self.quit()?);
                Ok(exchange)
            }
            Err(err) => {
                if let Err(quit_err) = self.quit() {
                    warn!("Failed to quit session after error: {quit_err}");
                }
                Err(err)
            }
        }
    }

    /// Connector shared by the control and data channels of this session
    fn tls_connector(&mut self) -> FtpResult<TlsConnector> {
        if let Some(tls) = self.tls.as_ref() {
            return Ok(tls.clone());
        }
        let tls = TlsConnector::from_params(&self.params)?;
        self.tls = Some(tls.clone());
        Ok(tls)
    }

    fn resolve(&self) -> FtpResult<SocketAddr> {
        (self.params.host.as_str(), self.params.port)
            .to_socket_addrs()
            .map_err(|_| FtpError::UnresolvedHost(self.params.host.clone()))?
            .next()
            .ok_or_else(|| FtpError::UnresolvedHost(self.params.host.clone()))
    }

    /// Send `cmd` and read its reply
    fn exec(&mut self, cmd: Command, expected: Status) -> FtpResult<Response> {
        self.perform(&cmd)?;
        self.read_response(&cmd.to_string(), expected.code())
    }

    /// Write data to stream with command to perform
    fn perform(&mut self, cmd: &Command) -> FtpResult<()> {
        if self.state != SessionState::Online {
            return Err(FtpError::NotConnected);
        }
        trace!("CC OUT: {}", cmd.to_log());
        let stream = self.reader.as_mut().ok_or(FtpError::NotConnected)?.get_mut();
        stream
            .write_all(cmd.to_wire().as_bytes())
            .and_then(|_| stream.flush())
            .map_err(FtpError::ConnectionError)
    }

    /// Read a (possibly multi-line) reply and check its code
    fn read_response(&mut self, command: &str, expected: u32) -> FtpResult<Response> {
        let response = self.read_reply(command)?;
        if response.code == expected {
            Ok(response)
        } else {
            Err(FtpError::UnexpectedResponse { expected, response })
        }
    }

    /// Read a (possibly multi-line) reply, whatever its code
    fn read_reply(&mut self, command: &str) -> FtpResult<Response> {
        let mut line = Vec::new();
        self.read_line(&mut line)?;
        trace!("CC IN: {:?}", String::from_utf8_lossy(&line));
        if line.len() < 4 {
            return Err(FtpError::BadResponse);
        }
        let code = code_from_buffer(&line)?;
        let mut body = line.clone();

        // multi-line reply: `xyz-` opens, `xyz ` closes
        if line[3] == b'-' {
            let terminator = [line[0], line[1], line[2], b' '];
            loop {
                line.clear();
                self.read_line(&mut line)?;
                trace!("CC IN: {:?}", String::from_utf8_lossy(&line));
                body.extend_from_slice(&line);
                if line.len() >= 4 && line[0..4] == terminator {
                    break;
                }
            }
        }

        Ok(Response::new(command, code, body))
    }

    /// Read bytes from reader until 0x0A; end of stream is an error
    fn read_line(&mut self, line: &mut Vec<u8>) -> FtpResult<usize> {
        let read = self
            .reader
            .as_mut()
            .ok_or(FtpError::NotConnected)?
            .read_until(0x0A, line)
            .map_err(FtpError::ConnectionError)?;
        if read == 0 {
            return Err(FtpError::ConnectionError(
                std::io::ErrorKind::UnexpectedEof.into(),
            ));
        }
        Ok(read)
    }
}

/// Get code from the first three bytes of a reply line
fn code_from_buffer(buf: &[u8]) -> FtpResult<u32> {
    std::str::from_utf8(&buf[0..3])
        .map_err(|_| FtpError::BadResponse)?
        .parse::<u32>()
        .map_err(|_| FtpError::BadResponse)
}

//! # Channel
//!
//! Data channel negotiation: `PORT` (active) and `PASV` (passive)

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use super::Session;
use crate::command::Command;
use crate::regex::PASV_PORT_RE;
use crate::{FtpError, FtpResult, Mode, Response, Status};

/// A negotiated data channel, not yet carrying any byte
#[derive(Debug)]
pub enum DataChannel {
    /// Active mode: local listener the server connects to
    Listening(TcpListener),
    /// Passive mode: connection dialed to the server
    Connected(TcpStream),
}

impl DataChannel {
    /// Mode this kind of channel belongs to
    pub fn mode(&self) -> Mode {
        match self {
            DataChannel::Listening(_) => Mode::Active,
            DataChannel::Connected(_) => Mode::Passive,
        }
    }

    /// Resolve the channel into a connected stream, accepting the server connection
    /// when listening. `accept_timeout` bounds the wait for the server; `None` blocks.
    pub(crate) fn open(self, mode: Mode, accept_timeout: Option<Duration>) -> FtpResult<TcpStream> {
        match (mode, self) {
            (Mode::Active, DataChannel::Listening(listener)) => accept(listener, accept_timeout),
            (Mode::Passive, DataChannel::Connected(stream)) => Ok(stream),
            (expected, channel) => Err(FtpError::ChannelMismatch {
                expected,
                found: channel.mode(),
            }),
        }
    }
}

/// Accept exactly one connection; the listener is closed afterwards
fn accept(listener: TcpListener, timeout: Option<Duration>) -> FtpResult<TcpStream> {
    let stream = match timeout {
        None => listener.accept().map(|(stream, _)| stream),
        Some(timeout) => {
            listener
                .set_nonblocking(true)
                .map_err(FtpError::ConnectionError)?;
            let start = Instant::now();
            loop {
                match listener.accept() {
                    Ok((stream, _)) => break Ok(stream),
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        if start.elapsed() > timeout {
                            break Err(std::io::ErrorKind::TimedOut.into());
                        }
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    Err(e) => break Err(e),
                }
            }
        }
    }
    .map_err(FtpError::ConnectionError)?;
    stream
        .set_nonblocking(false)
        .map_err(FtpError::ConnectionError)?;
    trace!(
        "Accepted data connection from {:?}",
        stream.peer_addr().ok()
    );
    Ok(stream)
}

/// Split a port into its (most significant, least significant) bytes
pub fn split_port(port: u16) -> (u8, u8) {
    ((port >> 8) as u8, (port & 0xff) as u8)
}

/// Rebuild a port from its (most significant, least significant) bytes
pub fn join_port(msb: u8, lsb: u8) -> u16 {
    (u16::from(msb) << 8) | u16::from(lsb)
}

/// `h1,h2,h3,h4,p1,p2` argument for `PORT`
pub fn port_argument(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    let (msb, lsb) = split_port(port);
    format!("{h1},{h2},{h3},{h4},{msb},{lsb}")
}

/// First non-loopback IPv4 address configured on this host
pub fn local_ipv4() -> FtpResult<Ipv4Addr> {
    let interfaces = get_if_addrs::get_if_addrs().map_err(FtpError::ConnectionError)?;
    interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => {
                trace!("Using address {ip} of interface {}", iface.name);
                Some(ip)
            }
            IpAddr::V6(_) => None,
        })
        .ok_or(FtpError::NoLocalAddress)
}

/// Decode the data port from a `227` reply. The advertised address is ignored.
pub(crate) fn parse_passive_port(response: &Response) -> FtpResult<u16> {
    let message = response.message();
    trace!("PASV response: {message}");
    let caps = PASV_PORT_RE
        .captures(&message)
        .ok_or(FtpError::BadResponse)?;
    trace!(
        "Server advertised {}.{}.{}.{}",
        &caps[1],
        &caps[2],
        &caps[3],
        &caps[4]
    );
    let msb = caps[5].parse::<u8>().map_err(|_| FtpError::BadResponse)?;
    let lsb = caps[6].parse::<u8>().map_err(|_| FtpError::BadResponse)?;
    Ok(join_port(msb, lsb))
}

impl Session {
    /// Open a local listener and announce it with `PORT`.
    pub fn active_listen(&mut self) -> FtpResult<(Response, DataChannel)> {
        debug!("Starting local tcp listener...");
        let ip = local_ipv4()?;
        let listener =
            TcpListener::bind((ip, self.params.listen_port)).map_err(FtpError::ConnectionError)?;
        let port = listener
            .local_addr()
            .map_err(FtpError::ConnectionError)?
            .port();
        debug!("Active mode, listening on {ip}:{port}");

        let response = self.exec(Command::Port(port_argument(ip, port)), Status::CommandOk)?;
        Ok((response, DataChannel::Listening(listener)))
    }

    /// Enter passive mode and dial the data port.
    ///
    /// The connection goes to the control host's own address; the address in the reply is
    /// often unroutable behind NAT.
    pub fn passive_open(&mut self) -> FtpResult<(Response, DataChannel)> {
        let response = self.exec(Command::Pasv, Status::PassiveMode)?;
        let port = parse_passive_port(&response)?;
        let ip = self.remote_ip.ok_or(FtpError::NotConnected)?;
        let addr = SocketAddr::new(ip, port);
        debug!("Passive mode, connecting to {addr}");
        let stream = TcpStream::connect_timeout(&addr, self.params.connect_timeout)
            .map_err(FtpError::ConnectionError)?;
        Ok((response, DataChannel::Connected(stream)))
    }

    /// Negotiate a data channel for the configured mode
    pub fn open_data_channel(&mut self) -> FtpResult<(Response, DataChannel)> {
        match self.mode() {
            Mode::Active => self.active_listen(),
            Mode::Passive => self.passive_open(),
        }
    }
}

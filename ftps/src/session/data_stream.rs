//! # Data Stream
//!
//! The byte stream both channels are carried on, plain or TLS wrapped

use std::io::{Read, Result, Write};
use std::net::{Shutdown, TcpStream};

use super::tls::TlsStream;

/// Data Stream used for communications. It can be both of type Tcp in case of plain communication or Ssl in case of FTPS
#[derive(Debug)]
pub enum DataStream {
    Tcp(TcpStream),
    Ssl(Box<TlsStream>),
}

impl DataStream {
    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            DataStream::Tcp(ref stream) => stream,
            DataStream::Ssl(ref stream) => stream.get_ref(),
        }
    }

    /// Whether the stream is TLS wrapped
    pub fn is_secure(&self) -> bool {
        matches!(self, DataStream::Ssl(_))
    }

    /// Close the stream. A TLS stream sends `close_notify` before the socket is shut down.
    pub fn close(self) -> Result<()> {
        match self {
            DataStream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            DataStream::Ssl(stream) => stream.close(),
        }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.read(buf),
            DataStream::Ssl(ref mut stream) => stream.read(buf),
        }
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.write(buf),
            DataStream::Ssl(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.flush(),
            DataStream::Ssl(ref mut stream) => stream.flush(),
        }
    }
}

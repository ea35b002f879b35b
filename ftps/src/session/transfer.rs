//! # Transfer
//!
//! Moves bytes over a negotiated data channel and collects the transfer confirmation

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;

use super::{DataChannel, DataStream, Session};
use crate::{Direction, FtpError, FtpResult, Response, Status};

const BUFFER_SIZE: usize = 64 * 1024;

impl Session {
    /// Read the whole data channel into memory, then the `226` confirmation.
    pub fn read_all(&mut self, channel: DataChannel) -> FtpResult<(Response, Vec<u8>)> {
        let mut bytes = Vec::new();
        let (response, _) = self.transfer(channel, |stream| {
            pump(
                stream,
                &mut bytes,
                FtpError::ConnectionError,
                FtpError::ConnectionError,
            )
        })?;
        Ok((response, bytes))
    }

    /// Stream a local file to or from the data channel.
    ///
    /// The channel is opened (and secured) before the local file is touched.
    pub fn stream_transfer(
        &mut self,
        direction: Direction,
        local: &Path,
        channel: DataChannel,
    ) -> FtpResult<(Response, u64)> {
        let local_err = |source: io::Error| FtpError::LocalIo {
            path: local.to_path_buf(),
            source,
        };
        match direction {
            Direction::Download => self.transfer(channel, |stream| {
                let mut file = File::create(local).map_err(local_err)?;
                pump(stream, &mut file, FtpError::ConnectionError, local_err)
            }),
            Direction::Upload => self.transfer(channel, |stream| {
                let mut file = File::open(local).map_err(local_err)?;
                pump(&mut file, stream, local_err, FtpError::ConnectionError)
            }),
        }
    }

    /// Copy the data channel into `writer`
    pub fn read_into<W>(&mut self, channel: DataChannel, writer: &mut W) -> FtpResult<(Response, u64)>
    where
        W: Write + ?Sized,
    {
        self.transfer(channel, |stream| {
            pump(stream, writer, FtpError::ConnectionError, FtpError::ConnectionError)
        })
    }

    /// Copy `reader` into the data channel
    pub fn write_from<R>(&mut self, channel: DataChannel, reader: &mut R) -> FtpResult<(Response, u64)>
    where
        R: Read + ?Sized,
    {
        self.transfer(channel, |stream| {
            pump(reader, stream, FtpError::ConnectionError, FtpError::ConnectionError)
        })
    }

    /// Open the channel, run `f` on it, close it, then read the `226` confirmation.
    ///
    /// When `f` fails on a data channel error the confirmation is not read. On a local
    /// file error the server still closes the transfer, so its reply is consumed whatever
    /// the code and the local error is returned.
    fn transfer<F>(&mut self, channel: DataChannel, f: F) -> FtpResult<(Response, u64)>
    where
        F: FnOnce(&mut DataStream) -> FtpResult<u64>,
    {
        let mut stream = self.open_data_stream(channel)?;
        let result = f(&mut stream);
        if let Err(err) = stream.close() {
            warn!("Failed to close data channel: {err}");
        }
        let transferred = match result {
            Ok(transferred) => transferred,
            Err(err @ FtpError::LocalIo { .. }) => {
                match self.read_reply("") {
                    Ok(reply) => debug!("Transfer closed after local error: {reply}"),
                    Err(drain_err) => warn!("Could not read reply of aborted transfer: {drain_err}"),
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        debug!("Transferred {transferred} bytes");
        let response = self.read_response("", Status::ClosingDataConnection.code())?;
        Ok((response, transferred))
    }

    /// Connect the channel and apply the session's security and deadlines to it
    fn open_data_stream(&mut self, channel: DataChannel) -> FtpResult<DataStream> {
        let stream = channel.open(self.mode(), self.params.transfer_timeout)?;
        if let Some(timeout) = self.params.transfer_timeout {
            stream
                .set_read_timeout(Some(timeout))
                .map_err(FtpError::ConnectionError)?;
            stream
                .set_write_timeout(Some(timeout))
                .map_err(FtpError::ConnectionError)?;
        }
        if self.params.is_secure() {
            trace!("Securing data channel");
            let tls = self.tls_connector()?;
            Ok(DataStream::Ssl(Box::new(tls.connect(stream, &[])?)))
        } else {
            Ok(DataStream::Tcp(stream))
        }
    }
}

/// Copy `reader` into `writer` until end of stream.
///
/// Same loop as [`std::io::copy`], which can't tell a read error from a write error;
/// here each side gets its own mapping so a local file failure surfaces as
/// [`FtpError::LocalIo`] and a socket failure as [`FtpError::ConnectionError`].
fn pump<R, W, RE, WE>(reader: &mut R, writer: &mut W, read_err: RE, write_err: WE) -> FtpResult<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    RE: Fn(io::Error) -> FtpError,
    WE: Fn(io::Error) -> FtpError,
{
    let mut buffer = vec![0; BUFFER_SIZE];
    let mut total = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        writer.write_all(&buffer[..read]).map_err(&write_err)?;
        total += read as u64;
    }
    writer.flush().map_err(write_err)?;
    Ok(total)
}

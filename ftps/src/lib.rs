#![crate_name = "ftps"]
#![crate_type = "lib"]

//! # ftps
//!
//! A blocking FTP client engine with FTPS support, built on [rustls](https://github.com/rustls/rustls).
//!
//! A [`Session`] drives one control connection to a server, one command at a time:
//!
//! - plain FTP, implicit FTPS (TLS from the first byte) or explicit FTPS (`AUTH TLS`);
//! - client certificates, custom root CA or no peer verification at all;
//! - active (`PORT`) or passive (`PASV`) data channels, secured with `PROT P` on FTPS;
//! - listing, download, upload, directory management, rename and delete.
//!
//! Every step returns the server replies it consumed, so callers can inspect codes and
//! messages of composite operations.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ftps::{Parameters, SecureMode, Session};
//!
//! let params = Parameters::new("ftp.example.com", 21)
//!     .credentials("demo", "password")
//!     .secure(SecureMode::Explicit)
//!     .keep_alive(true);
//! let mut session = Session::new(params);
//! session.connect().unwrap();
//! session.authenticate().unwrap();
//! session.negotiate_options().unwrap();
//! let listing = session.list("/").unwrap();
//! println!("{}", listing.output);
//! session.quit().unwrap();
//! ```
//!
//! ## Keep-alive
//!
//! Unless [`Parameters::keep_alive`] is set, [`Session::list`], [`Session::download`] and
//! [`Session::upload`] send `QUIT` when done, success or failure.

#![doc(html_playground_url = "https://play.rust-lang.org")]

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
pub(crate) mod command;
mod params;
mod regex;
mod session;
mod status;
#[cfg(test)]
mod test_server;

// -- public
pub mod types;

// -- secure deps
pub use rustls;

// -- export
pub use params::{Parameters, SecureMode};
pub use session::{
    join_port, local_ipv4, split_port, DataChannel, DataStream, Session, SessionState,
    TlsConnector, TlsStream,
};
pub use status::Status;
pub use types::{Direction, Exchange, Features, FtpError, FtpResult, Mode, Response};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

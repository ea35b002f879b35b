//! # Command
//!
//! The set of FTP commands issued by a session

pub mod feat;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Ask the server to secure the control channel with TLS
    Auth,
    /// Remove file at specified path
    Dele(String),
    /// List the features supported by the server
    Feat,
    /// Long listing (hidden entries included) of the specified path
    List(String),
    /// Make directory
    Mkd(String),
    /// Set an option on the server (name, value)
    Opts(String, Option<String>),
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Address (`h1,h2,h3,h4,p1,p2`) the server should connect to (active mode)
    Port(String),
    /// Set protection level for the data channel
    Prot(ProtectionLevel),
    /// Quit
    Quit,
    /// Select file to rename
    RenameFrom(String),
    /// Rename selected file to
    RenameTo(String),
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Put file at specified path
    Store(String),
    /// Ask the server for its operating system
    Syst,
    /// Switch to image (binary) transfer type
    TypeImage,
    /// Provide user to login as
    User(String),
    /// Any other command line, sent as is
    Custom(String),
}

/// Protection level; argument for `Prot` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    Clear,
    Private,
}

impl Command {
    /// Command line as sent on the wire, `\r\n` terminated
    pub fn to_wire(&self) -> String {
        format!("{self}\r\n")
    }

    /// Command line as it may be logged; secrets are masked
    pub fn to_log(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ******".to_string(),
            cmd => cmd.to_string(),
        }
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "AUTH TLS"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::Feat => write!(f, "FEAT"),
            Self::List(p) => write!(f, "LIST -aL {p}"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Opts(name, Some(value)) => write!(f, "OPTS {name} {value}"),
            Self::Opts(name, None) => write!(f, "OPTS {name}"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Port(addr) => write!(f, "PORT {addr}"),
            Self::Prot(level) => write!(f, "PROT {level}"),
            Self::Quit => write!(f, "QUIT"),
            Self::RenameFrom(p) => write!(f, "RNFR {p}"),
            Self::RenameTo(p) => write!(f, "RNTO {p}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::Syst => write!(f, "SYST"),
            Self::TypeImage => write!(f, "TYPE I"),
            Self::User(u) => write!(f, "USER {u}"),
            Self::Custom(line) => write!(f, "{line}"),
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "C"),
            Self::Private => write!(f, "P"),
        }
    }
}

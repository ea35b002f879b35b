//! # FTP Regex
//!
//! Regular expressions to parse FTP replies

use lazy_regex::{Lazy, Regex};

/// Extracts address and port octets from the PASV reply (`h1,h2,h3,h4,p1,p2`).
pub static PASV_PORT_RE: Lazy<Regex> = lazy_regex!(r"(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)");

use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use ftps::{Parameters, SecureMode};

#[derive(FromArgs)]
#[argh(description = "Interactive FTP/FTPS client.
Security modes: `implicit` (TLS from the first byte, usually port 990) or `explicit` (AUTH TLS)")]
pub struct Args {
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
    #[argh(
        option,
        short = 'P',
        default = "21",
        description = "control port (default: 21)"
    )]
    pub port: u16,
    #[argh(
        option,
        short = 'u',
        description = "username; the password is prompted for"
    )]
    pub user: Option<String>,
    #[argh(
        option,
        short = 's',
        from_str_fn(parse_secure_mode),
        description = "enable FTPS: implicit or explicit"
    )]
    pub secure: Option<SecureMode>,
    #[argh(option, description = "client certificate (PEM)")]
    pub cert: Option<PathBuf>,
    #[argh(option, description = "client certificate private key (PEM)")]
    pub key: Option<PathBuf>,
    #[argh(option, description = "root CA to trust (PEM)")]
    pub root_ca: Option<PathBuf>,
    #[argh(switch, description = "do not verify the server certificate")]
    pub always_trust: bool,
    #[argh(
        option,
        short = 'a',
        description = "use active mode, listening on this local port"
    )]
    pub active: Option<u16>,
    #[argh(
        switch,
        short = 'k',
        description = "keep the session open after each transfer"
    )]
    pub keep_alive: bool,
    #[argh(option, description = "data channel read/write timeout in seconds")]
    pub transfer_timeout: Option<u64>,
    #[argh(positional, description = "host to connect to, optionally as host:port")]
    pub host: Option<String>,
}

fn parse_secure_mode(s: &str) -> Result<SecureMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "implicit" => Ok(SecureMode::Implicit),
        "explicit" => Ok(SecureMode::Explicit),
        _ => Err(format!("invalid security mode `{s}`: expected implicit or explicit")),
    }
}

impl Args {
    /// Session parameters for `remote` (`host` or `host:port`) from the command line flags
    pub fn params(&self, remote: &str) -> Result<Parameters, String> {
        let (host, port) = match remote.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| format!("invalid port `{port}`"))?,
            ),
            None => (remote, self.port),
        };
        let mut params = Parameters::new(host, port)
            .always_trust(self.always_trust)
            .keep_alive(self.keep_alive)
            .transfer_timeout(self.transfer_timeout.map(Duration::from_secs));
        if let Some(user) = self.user.as_deref() {
            let password = rpassword::prompt_password("Password: ")
                .map_err(|err| format!("Could not read password: {err}"))?;
            params = params.credentials(user, password);
        }
        if let Some(mode) = self.secure {
            params = params.secure(mode);
        }
        if let (Some(cert), Some(key)) = (self.cert.as_ref(), self.key.as_ref()) {
            params = params.certificate(cert, key);
        }
        if let Some(root_ca) = self.root_ca.as_ref() {
            params = params.root_ca(root_ca);
        }
        if let Some(listen_port) = self.active {
            params = params.active(listen_port);
        }
        Ok(params)
    }
}

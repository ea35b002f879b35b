//! Connect to a public FTPS test server with explicit TLS, list the root directory
//! and download a file into memory.
//!
//! The server certificate is checked against Mozilla's root certificates (webpki-roots).

use ftps::{Parameters, SecureMode, Session};

fn main() {
    let params = Parameters::new("test.rebex.net", 21)
        .credentials("demo", "password")
        .secure(SecureMode::Explicit)
        .keep_alive(true);
    let mut session = Session::new(params);

    session.connect().unwrap();
    session.authenticate().unwrap();
    session.negotiate_options().unwrap();

    let listing = session.list("/").unwrap();
    print!("{}", listing.output);

    let mut readme = Vec::new();
    let exchange = session.download_into("readme.txt", &mut readme).unwrap();
    println!("readme.txt: {} bytes", exchange.output);

    // Terminate the connection to the server.
    let _ = session.quit();
}

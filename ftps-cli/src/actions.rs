use std::path::Path;

use ftps::{Parameters, Session};

/// Connect, login and negotiate the session options
pub fn connect(params: Parameters) -> Option<Session> {
    let mut session = Session::new(params);
    if let Err(err) = session.connect() {
        eprintln!("Failed to connect to remote: {}", err);
        return None;
    }
    if let Some(msg) = session.welcome_message() {
        println!("{}", msg);
    }
    if let Err(err) = session.authenticate() {
        eprintln!("LOGIN error: {}", err);
        let _ = session.quit();
        return None;
    }
    if let Err(err) = session.negotiate_options() {
        eprintln!("Failed to negotiate session options: {}", err);
        let _ = session.quit();
        return None;
    }
    println!("OK");
    Some(session)
}

pub fn quit(session: Option<Session>) {
    if let Some(mut session) = session {
        if session.is_connected() {
            match session.quit() {
                Ok(_) => println!("OK"),
                Err(err) => eprintln!("Failed to disconnect from remote: {}", err),
            }
        }
    }
}

pub fn feat(session: &Session) {
    let mut features = session.features().iter().collect::<Vec<_>>();
    features.sort();
    for (name, value) in features {
        match value {
            Some(value) => println!("{name} {value}"),
            None => println!("{name}"),
        }
    }
}

pub fn list(session: &mut Session, path: Option<&str>) {
    match session.list(path.unwrap_or(".")) {
        Ok(exchange) => print!("{}", exchange.output),
        Err(err) => eprintln!("LIST error: {}", err),
    }
}

pub fn get(session: &mut Session, file: &str, dest: &Path) {
    match session.download(dest, file) {
        Ok(exchange) => println!("OK: {} bytes", exchange.output),
        Err(err) => eprintln!("GET error: {}", err),
    }
}

pub fn put(session: &mut Session, local: &Path, dest: &str) {
    match session.upload(local, dest) {
        Ok(exchange) => println!("OK: {} bytes", exchange.output),
        Err(err) => eprintln!("PUT error: {}", err),
    }
}

pub fn mkdir(session: &mut Session, dir: &str) {
    match session.mkdir(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("MKDIR error: {}", err),
    }
}

pub fn rename(session: &mut Session, src: &str, dest: &str) {
    match session.rename(src, dest) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RENAME error: {}", err),
    }
}

pub fn rm(session: &mut Session, file: &str) {
    match session.delete(file) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RM error: {}", err),
    }
}

pub fn rmdir(session: &mut Session, dir: &str) {
    match session.rmdir(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RMDIR error: {}", err),
    }
}

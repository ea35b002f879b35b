//! # ftps
//!
//! Interactive FTP/FTPS client, built on the `ftps` engine
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io;
use std::io::Write;
use std::str::FromStr;

use actions::*;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use ftps::{Parameters, Session};
use log::LevelFilter;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

fn usage() {
    println!("Available commands:");
    println!("CONNECT <host[:port]>               Connect to remote host, with the command line options");
    println!("FEAT                                Print the features supported by the server");
    println!("GET <file> <dest>                   Download `file` to `dest`");
    println!("HELP                                Print this help");
    println!("LIST [dir]                          List files. If directory is not provided, current directory is used");
    println!("MKDIR <dir>                         Create directory");
    println!("PUT <file> <dest>                   Upload local file `file` to `dest`");
    println!("QUIT                                Quit ftps");
    println!("RENAME <source> <dest>              Rename file `source` to `dest`");
    println!("RM <file>                           Remove file");
    println!("RMDIR <dir>                         Remove directory");
}

fn input() -> Command {
    loop {
        print!(">> ");
        let _ = io::stdout().flush();
        let mut input: String = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => return Command::Quit,
            Ok(_) => {}
        }
        // Try to create command
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return cmd,
            Err(err) => println!("{err}"),
        }
    }
}

fn main() {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("ftps {APP_VERSION} - developed by {APP_AUTHORS}");
        return;
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();
    // Main loop
    let mut params: Option<Parameters> = None;
    let mut session: Option<Session> = None;

    // connect if host is specified
    if let Some(host) = args.host.as_deref() {
        open(&args, host, &mut params, &mut session);
    }

    loop {
        match input() {
            Command::Quit => {
                // Break if quit
                quit(session);
                break;
            }
            Command::Help => usage(),
            Command::Connect(host) => open(&args, host.as_str(), &mut params, &mut session),
            cmd => perform(params.as_ref(), &mut session, cmd),
        }
    }
}

fn open(args: &Args, host: &str, params: &mut Option<Parameters>, session: &mut Option<Session>) {
    quit(session.take());
    match args.params(host) {
        Ok(p) => {
            *session = connect(p.clone());
            *params = Some(p);
        }
        Err(err) => eprintln!("{err}"),
    }
}

fn perform(params: Option<&Parameters>, session: &mut Option<Session>, command: Command) {
    let Some(params) = params else {
        eprintln!("Can't perform command: you must connect to remote first");
        return;
    };
    // without keep-alive the previous transfer closed the session
    let connected = session.as_ref().map(Session::is_connected).unwrap_or(false);
    if !connected {
        *session = connect(params.clone());
    }
    let Some(ftp) = session.as_mut() else {
        return;
    };
    match command {
        Command::Feat => feat(ftp),
        Command::Get(file, dest) => get(ftp, file.as_str(), dest.as_path()),
        Command::List(p) => list(ftp, p.as_deref()),
        Command::Mkdir(p) => mkdir(ftp, p.as_str()),
        Command::Put(src, dest) => put(ftp, src.as_path(), dest.as_str()),
        Command::Rename(src, dest) => rename(ftp, src.as_str(), dest.as_str()),
        Command::Rm(file) => rm(ftp, file.as_str()),
        Command::Rmdir(dir) => rmdir(ftp, dir.as_str()),
        Command::Connect(_) | Command::Help | Command::Quit => {
            eprintln!("Something unexpected happened")
        }
    }
}

//! Connect to a host, authenticate, and report how it went.
//!
//! Without `--password`, every secret the server asks for (key passphrase,
//! keyboard-interactive prompts, password) is read from stdin.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example connect -- --host localhost --user your_username
//! cargo run --example connect -- --host 10.0.0.5 --user admin --key ~/.ssh/id_ed25519
//! cargo run --example connect -- --host localhost --user admin --password secret --strict
//! ```

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use sshlink::{HostKeyPolicy, SessionBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    println!("Connecting to {}:{} as {}...", args.host, args.port, args.user);

    let mut builder = SessionBuilder::new(&args.host)
        .port(args.port)
        .user(&args.user)
        .timeout(Duration::from_secs(args.timeout));

    if let Some(password) = &args.password {
        builder = builder.password(password);
    } else {
        builder = builder.credential_callback(|prompt: &str| {
            print!("{} ", prompt.trim_end());
            io::stdout().flush()?;
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
        });
    }
    if let Some(key) = &args.key {
        builder = builder.private_key(key);
    }
    if let Some(path) = &args.known_hosts {
        builder = builder.known_hosts_path(path);
    }
    if args.strict {
        builder = builder.host_key_policy(HostKeyPolicy::RejectUnknown);
    }

    let mut session = builder.connect()?;

    if let Some(method) = session.auth_method() {
        println!("Authenticated using {}", method);
    }
    if let Some(fingerprint) = session.fingerprint() {
        let status = if fingerprint.is_known() { "known" } else { "unknown" };
        println!("Server key {} ({})", fingerprint, status);
    }

    println!("Closing connection...");
    session.disconnect();
    println!("Done!");

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    key: Option<PathBuf>,
    known_hosts: Option<PathBuf>,
    strict: bool,
    timeout: u64,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 22u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "root".to_string());
        let mut password = None;
        let mut key = None;
        let mut known_hosts = None;
        let mut strict = false;
        let mut timeout = 30u64;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(22);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = Some(args[i].clone());
                    }
                }
                "--key" | "-k" => {
                    i += 1;
                    if i < args.len() {
                        key = Some(PathBuf::from(&args[i]));
                    }
                }
                "--known-hosts" => {
                    i += 1;
                    if i < args.len() {
                        known_hosts = Some(PathBuf::from(&args[i]));
                    }
                }
                "--strict" => strict = true,
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            password,
            key,
            known_hosts,
            strict,
            timeout,
        }
    }

    fn print_help() {
        println!(
            r#"sshlink connect example

USAGE:
    cargo run --example connect -- [OPTIONS]

OPTIONS:
    -h, --host <HOST>        Target host [default: localhost]
    -p, --port <PORT>        SSH port [default: 22]
    -u, --user <USER>        Username [default: $USER]
    -P, --password <PASS>    Password (otherwise prompted on stdin)
    -k, --key <PATH>         Private key to use instead of agent/default keys
    --known-hosts <PATH>     known_hosts file [default: ~/.ssh/known_hosts]
    --strict                 Refuse hosts missing from known_hosts
    -t, --timeout <SECS>     Connection timeout [default: 30]
    --help                   Print this help message
"#
        );
    }
}

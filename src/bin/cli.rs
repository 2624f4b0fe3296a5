//! ssdbc CLI Client
//!
//! Command-line interface for issuing single commands to an SSDB server.

use std::process;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use ssdbc::{Argument, Client, ClientConfig, Command, Reply};
use tracing_subscriber::{fmt, EnvFilter};

/// ssdbc CLI
#[derive(Parser, Debug)]
#[command(name = "ssdbc-cli")]
#[command(about = "CLI for SSDB-protocol key-value stores")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8888")]
    port: u16,

    /// Password sent with `auth` after connecting
    #[arg(short, long)]
    auth: Option<String>,

    /// Socket read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Check whether a key exists
    Exists {
        /// The key to check
        key: String,
    },

    /// Get a field of a hash
    Hget {
        hash: String,
        key: String,
    },

    /// Set a field of a hash
    Hset {
        hash: String,
        key: String,
        value: String,
    },

    /// Dump a whole hash
    Hgetall {
        hash: String,
    },

    /// Send any command and print the raw reply
    Raw {
        /// Command name
        name: String,

        /// Arguments, sent as text
        args: Vec<String>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,ssdbc=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut builder = ClientConfig::builder()
        .host(&args.host)
        .port(args.port)
        .max_connections(1)
        .batch_workers(1);
    if let Some(password) = &args.auth {
        builder = builder.password(password);
    }
    if args.timeout_ms > 0 {
        let timeout = Duration::from_millis(args.timeout_ms);
        builder = builder
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .write_timeout(timeout);
    }
    let config = builder.build();

    tracing::debug!("ssdbc-cli v{} -> {}", ssdbc::VERSION, config.address());

    let client = match Client::connect(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&client, args.command) {
        eprintln!("(error) {}", e);
        process::exit(1);
    }
}

fn run(client: &Client, command: Commands) -> ssdbc::Result<()> {
    match command {
        Commands::Get { key } => print_value(client.get(&key)?),
        Commands::Set { key, value } => print_bool(client.set(&key, value)?),
        Commands::Del { key } => print_bool(client.del(&key)?),
        Commands::Exists { key } => print_bool(client.exists(&key)?),
        Commands::Hget { hash, key } => print_value(client.hget(&hash, &key)?),
        Commands::Hset { hash, key, value } => print_bool(client.hset(&hash, &key, value)?),
        Commands::Hgetall { hash } => {
            for (key, value) in client.hgetall(&hash)? {
                println!("{} => {}", lossy(&key), lossy(&value));
            }
        }
        Commands::Raw { name, args } => {
            let args = args.into_iter().map(Argument::from).collect();
            let command = Command::with_args(name, args);
            let kind = command.kind();
            match client.execute(&command)?.interpret(kind)? {
                Reply::Empty => println!("(not found)"),
                Reply::Done => println!("ok"),
                Reply::Bool(b) => print_bool(b),
                Reply::Int(n) => println!("(integer) {}", n),
                Reply::Pairs(pairs) => {
                    for (key, value) in pairs {
                        println!("{} => {}", lossy(&key), lossy(&value));
                    }
                }
                Reply::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        println!("{}) {}", i + 1, lossy(item));
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_value(value: Option<Bytes>) {
    match value {
        Some(v) => println!("{}", lossy(&v)),
        None => println!("(not found)"),
    }
}

fn print_bool(value: bool) {
    println!("{}", if value { "true" } else { "false" });
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{stdin, stdout, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use dns_wire::protocol::types::{Message, ResourceRecord};

mod description;
mod hex;

use description::MessageDescription;

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// Encode and decode DNS messages in the RFC 1035 wire format.
///
/// Logs go to stderr, filtered by `RUST_LOG`.
struct Args {
    /// Format of log output
    #[clap(long, value_enum, default_value_t = LogFormat::Plain, env = "DNSMSG_LOG_FORMAT")]
    log_format: LogFormat,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a message from a description file (YAML, TOML, or JSON)
    /// and write it to stdout in wire format
    Encode {
        /// Path to the description file
        #[clap(value_parser)]
        file: PathBuf,

        /// Write hex digits rather than raw octets
        #[clap(long, action(clap::ArgAction::SetTrue))]
        hex: bool,
    },

    /// Read a wire format message from stdin and print it
    Decode {
        /// Read hex digits rather than raw octets
        #[clap(long, action(clap::ArgAction::SetTrue))]
        hex: bool,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

fn begin_logging(format: LogFormat) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Plain => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn encode(file: &Path, hex: bool) {
    let description = match MessageDescription::load(file) {
        Ok(description) => description,
        Err(err) => {
            eprintln!("error reading message description: {err}");
            process::exit(1);
        }
    };

    let octets = match description.to_message().and_then(|message| message.to_octets()) {
        Ok(octets) => octets,
        Err(err) => {
            eprintln!("error encoding message: {err}");
            process::exit(1);
        }
    };

    tracing::debug!(len = octets.len(), "encoded message");

    let written = if hex {
        writeln!(stdout(), "{}", hex::encode(&octets))
    } else {
        stdout().write_all(&octets)
    };
    if let Err(err) = written {
        eprintln!("error writing message to stdout: {err}");
        process::exit(1);
    }
}

fn decode(hex: bool) {
    let mut buf = Vec::new();
    if let Err(err) = stdin().read_to_end(&mut buf) {
        eprintln!("error reading message from stdin: {err}");
        process::exit(1);
    }

    if hex {
        let decoded = std::str::from_utf8(&buf)
            .map_err(|err| err.to_string())
            .and_then(|s| hex::decode(s).map_err(|err| err.to_string()));
        match decoded {
            Ok(octets) => buf = octets,
            Err(err) => {
                eprintln!("error reading hex from stdin: {err}");
                process::exit(1);
            }
        }
    }

    match Message::from_octets(&buf) {
        Ok(message) => print_message(&message),
        Err(err) => {
            eprintln!("error decoding message: {err}");
            process::exit(1);
        }
    }
}

fn print_message(message: &Message) {
    let header = &message.header;
    println!(
        ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
        header.flags.opcode, header.flags.rcode, header.id
    );
    println!(
        ";; flags: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
        header.flags, header.qdcount, header.ancount, header.nscount, header.arcount
    );

    if !message.questions.is_empty() {
        println!("\n;; QUESTION SECTION");
        for question in &message.questions {
            println!("{question}");
        }
    }

    print_section("ANSWER", &message.answers);
}

fn print_section(heading: &str, rrs: &[ResourceRecord]) {
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {heading} SECTION");
    for rr in rrs {
        println!("{rr}");
    }
}

fn main() {
    let args = Args::parse();

    begin_logging(args.log_format);

    match args.command {
        Command::Encode { file, hex } => encode(&file, hex),
        Command::Decode { hex } => decode(hex),
    }
}

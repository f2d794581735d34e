use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::process;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use dns_client::connection::{Connection, QueryError, QueryResult};
use dns_client::net::{TcpTransport, UdpTransport};
use dns_wire::protocol::types::{Message, RecordType};

fn print_section(message: &Message, rtype: RecordType) {
    let rrs = message.records_of(rtype);
    if rrs.is_empty() {
        return;
    }

    println!("\n;; {rtype}");
    for rr in rrs {
        println!("{rr}");
    }
}

fn print_message(message: &Message) {
    println!(";; STATUS: {}", message.status);

    if !message.questions.is_empty() {
        println!("\n;; QUESTION");
        for question in &message.questions {
            println!("{question}");
        }
    }

    for rtype in [
        RecordType::A,
        RecordType::AAAA,
        RecordType::CNAME,
        RecordType::NS,
        RecordType::MX,
        RecordType::TXT,
        RecordType::SRV,
        RecordType::SOA,
    ] {
        print_section(message, rtype);
    }

    let mut unknown: Vec<RecordType> = message
        .records
        .keys()
        .filter(|rtype| rtype.is_unknown())
        .copied()
        .collect();
    unknown.sort();
    for rtype in unknown {
        print_section(message, rtype);
    }
}

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// DNS stub lookup utility: sends one query to one nameserver and
/// prints the response.
struct Args {
    /// Domain name to query
    #[clap(value_parser)]
    domain: String,

    /// Record type to query
    #[clap(default_value = "A", value_parser)]
    qtype: String,

    /// Record class to query
    #[clap(default_value = "IN", value_parser)]
    qclass: String,

    /// Nameserver to send the query to
    #[clap(short, long, default_value = "1.1.1.1", value_parser)]
    server: IpAddr,

    /// Nameserver port
    #[clap(short, long, default_value_t = 53, value_parser)]
    port: u16,

    /// Query over TCP rather than UDP
    #[clap(long, action(clap::ArgAction::SetTrue))]
    tcp: bool,
}

async fn run_tcp(addr: SocketAddr, identifier: &str) -> Result<QueryResult, String> {
    let (transport, mut reader) = TcpTransport::connect(addr)
        .await
        .map_err(|err| format!("could not connect: {err}"))?;
    let mut conn = Connection::new(transport);
    let mut rx = conn.query(identifier).await;

    let mut buf = [0u8; 4096];
    loop {
        tokio::select! {
            outcome = &mut rx => {
                return Ok(outcome.unwrap_or(Err(QueryError::TransportFailure)));
            }
            read = reader.read(&mut buf) => match read {
                Ok(0) | Err(_) => conn.handle_close(),
                Ok(n) => conn.handle_input(&buf[..n]),
            }
        }
    }
}

async fn run_udp(addr: SocketAddr, identifier: &str) -> Result<QueryResult, String> {
    let (transport, socket) = UdpTransport::connect(addr)
        .await
        .map_err(|err| format!("could not connect: {err}"))?;
    let mut conn = Connection::new(transport);
    let mut rx = conn.query(identifier).await;

    let mut buf = [0u8; 4096];
    loop {
        tokio::select! {
            outcome = &mut rx => {
                return Ok(outcome.unwrap_or(Err(QueryError::TransportFailure)));
            }
            read = socket.recv(&mut buf) => match read {
                Ok(n) => conn.handle_input(&buf[..n]),
                Err(_) => conn.handle_close(),
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let addr = SocketAddr::new(args.server, args.port);
    let identifier = format!("{}:{}:{}", args.domain, args.qtype, args.qclass);

    let lookup = if args.tcp {
        timeout(Duration::from_secs(5), run_tcp(addr, &identifier)).await
    } else {
        timeout(Duration::from_secs(5), run_udp(addr, &identifier)).await
    };

    match lookup {
        Ok(Ok(Ok(message))) => print_message(&message),
        Ok(Ok(Err(err))) => {
            eprintln!("query failed: {err}");
            process::exit(1);
        }
        Ok(Err(err)) => {
            eprintln!("{err}");
            process::exit(1);
        }
        Err(_) => {
            eprintln!("query timed out");
            process::exit(1);
        }
    }
}

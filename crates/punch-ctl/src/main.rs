//! punch-ctl: command-line interface for the punchd rendezvous server.

use anyhow::{Context, Result};

mod cmd;

use cmd::http::Monitor;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SERVER: &str = "127.0.0.1:19993";

fn print_usage() {
    println!("Usage: punch-ctl [options] <command>");
    println!();
    println!("Commands:");
    println!("  status                 Show server status and protocol counters");
    println!("  peers                  List registered peers");
    println!("  register <key>         Register <key> (hex) from this host");
    println!("  resolve <key>...       Look up one or more keys (hex)");
    println!();
    println!("Options:");
    println!("  --port <port>          Monitor port (default: {})", DEFAULT_PORT);
    println!("  --user <name>          Monitor user (default: admin)");
    println!("  --pass <password>      Monitor password (default: admin)");
    println!("  --server <host:port>   Rendezvous server (default: {})", DEFAULT_SERVER);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut user = "admin".to_string();
    let mut pass = "admin".to_string();
    let mut server = DEFAULT_SERVER.to_string();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--user" => {
                i += 1;
                user = args.get(i).context("--user requires a value")?.clone();
            }
            "--pass" => {
                i += 1;
                pass = args.get(i).context("--pass requires a value")?.clone();
            }
            "--server" => {
                i += 1;
                server = args.get(i).context("--server requires a value")?.clone();
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    // The monitor runs on the same host as the rendezvous socket.
    let host = server
        .rsplit_once(':')
        .map(|(h, _)| h.to_string())
        .unwrap_or_else(|| server.clone());
    let monitor = Monitor { host, port, user, pass };

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(&monitor).await,
        ["peers"] => cmd::status::cmd_peers(&monitor).await,
        ["register", key] => cmd::udp::cmd_register(&server, key).await,
        ["resolve", keys @ ..] => cmd::udp::cmd_resolve(&server, keys).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

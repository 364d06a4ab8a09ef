//! surge-ctl — command-line interface for the surge daemon.

use anyhow::{Context, Result};

mod cmd;

use cmd::pool;

const DEFAULT_PORT: u16 = 9100;

fn print_usage() {
    println!("Usage: surge-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                 Show pool state, target and connection counts");
    println!("  set <peers> [options]  Set the target connection count");
    println!("      --timeout <ms>     How long the target holds (default: {})", pool::DEFAULT_TIMEOUT_MS);
    println!("      --burst <n>        Connection attempts per burst, 0 for unlimited (default: 0)");
    println!("      --wait <ms>        Pause between bursts (default: 0)");
    println!("  stop                   Stop the pool and close connected sockets");
    println!("  restart                Resume a stopped pool");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => pool::cmd_status(port).await,
        ["set", rest @ ..] => pool::cmd_set(port, pool::parse_set_args(rest)?).await,
        ["stop"] => pool::cmd_stop(port).await,
        ["restart"] => pool::cmd_restart(port).await,
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

mod harness;

use std::time::Duration;

use clap::{Parser, Subcommand};

use harness::SimulationOptions;

#[derive(Parser)]
#[command(
    name = "turnstile",
    about = "Turnstile — fair allocation of scarce tickets over a shared store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed inventory and drive simulated concurrent callers
    Run {
        /// Tickets to seed before the run
        #[arg(long, default_value = "5")]
        tickets: usize,

        /// Concurrent callers to launch
        #[arg(long, default_value = "10")]
        callers: usize,

        /// Send callers through the admission queue
        #[arg(long)]
        queue: bool,

        /// Milliseconds between turn polls
        #[arg(long, default_value = "100")]
        poll_interval_ms: u64,

        /// Poll budget per caller
        #[arg(long, default_value = "100")]
        max_attempts: u32,

        /// Queue-entry TTL in milliseconds
        #[arg(long, default_value = "20000")]
        ttl_ms: u64,

        /// Delay between consecutive caller starts, in milliseconds
        #[arg(long, default_value = "10")]
        stagger_ms: u64,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "TURNSTILE_STORAGE")]
        storage: String,
    },

    /// Seed ticket inventory only
    Seed {
        #[arg(long, default_value = "30")]
        tickets: usize,

        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "TURNSTILE_STORAGE")]
        storage: String,
    },

    /// Print the current ticket state as JSON lines
    Show {
        /// Storage backend: "memory" or "sqlite:<path>"
        #[arg(long, default_value = "memory", env = "TURNSTILE_STORAGE")]
        storage: String,
    },

    /// Print version information
    Version,
}

fn open_store(storage: &str) -> std::sync::Arc<dyn turnstile_core::store::DocumentStore> {
    match harness::create_store(storage) {
        Ok(store) => store,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            tickets,
            callers,
            queue,
            poll_interval_ms,
            max_attempts,
            ttl_ms,
            stagger_ms,
            storage,
        } => {
            let store = open_store(&storage);
            let options = SimulationOptions {
                tickets,
                callers,
                use_queue: queue,
                poll_interval: Duration::from_millis(poll_interval_ms),
                max_poll_attempts: max_attempts,
                queue_ttl: Duration::from_millis(ttl_ms),
                stagger: Duration::from_millis(stagger_ms),
            };
            if let Err(err) = harness::run_simulation(store, options).await {
                eprintln!("run failed: {err}");
                std::process::exit(1);
            }
        }
        Commands::Seed { tickets, storage } => {
            let store = open_store(&storage);
            if let Err(err) = harness::seed_tickets(store.as_ref(), tickets) {
                eprintln!("seed failed: {err}");
                std::process::exit(1);
            }
        }
        Commands::Show { storage } => {
            let store = open_store(&storage);
            if let Err(err) = harness::print_tickets(store.as_ref()) {
                eprintln!("show failed: {err}");
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("turnstile {}", env!("CARGO_PKG_VERSION"));
            println!("Fair allocation of scarce tickets over a shared store");
        }
    }
}

use clap::Parser;
use log::info;
use server::network::Server;
use server::scenario::HuntDirector;
use server::sim::Simulation;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (simulation updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of connected observers
    #[arg(short, long, default_value = "32")]
    max_observers: usize,

    /// Seed for the demo scenario director
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Run without the demo scenario (empty world)
    #[arg(long)]
    no_scenario: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let tick_duration = Duration::from_secs_f32(1.0 / args.tick_rate as f32);

    info!("Starting server on {} at {}Hz", address, args.tick_rate);

    let sim = Simulation::new();
    let director = if args.no_scenario {
        None
    } else {
        Some(Box::new(HuntDirector::new(args.seed)) as Box<dyn server::scenario::Director + Send>)
    };

    let mut server = Server::new(&address, tick_duration, args.max_observers, sim, director).await?;
    server.run().await?;

    Ok(())
}

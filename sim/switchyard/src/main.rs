use std::env;
use switchyard::cli::initialize_from_arguments;

/// Without arguments, main runs the ping-pong simulation
#[tokio::main]
async fn main() {
    println!("Switchyard v{}", env!("CARGO_PKG_VERSION"));
    initialize_from_arguments().await;
    println!("Done");
}

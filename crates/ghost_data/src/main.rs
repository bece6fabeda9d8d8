use clap::Parser;

use ghost_data::config::CliArgs;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    if let Err(err) = ghost_data::run(cli).await {
        eprintln!("ghost data build failed: {}", err);
        std::process::exit(1);
    }
}

use pub_coordinator::common::config::CliArgs;
use pub_coordinator::coordinator_start;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let cli = CliArgs::parse_from(&args);
    coordinator_start(&cli).await
}

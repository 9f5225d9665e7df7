use bazaar_gateway::config::Args;
use bazaar_gateway::error::GatewayError;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let args = Args::parse();
    bazaar_gateway::init_tracing(&args.log_level);

    bazaar_gateway::run(args).await
}

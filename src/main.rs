use optout_runner::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::app::run().await
}

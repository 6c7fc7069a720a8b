mod args;
mod index;
mod lease;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    args::Args::parse_and_run().await
}

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    matching_engine::run::run(matching_engine::arguments::Arguments::parse()).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clubhouse_lib::run().await
}

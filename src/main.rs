#[tokio::main]
async fn main() -> anyhow::Result<()> {
    searchdesk::run().await
}

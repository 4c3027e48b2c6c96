#[tokio::main]
async fn main() -> anyhow::Result<()> {
    orderpiqr_picker::run().await
}

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    vsproj_cli::main_entry().await
}

// Binary entry point for umlgate
// This is a thin wrapper that delegates to the library implementation

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    umlgate::shell::run().await
}

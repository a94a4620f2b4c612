use anyhow::Result;
use monetizekit::cli::{actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action: Action = start()?;
    action.execute().await
}

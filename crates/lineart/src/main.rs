mod cli;
mod paths;
mod run;
mod script;

use anyhow::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli).await
}

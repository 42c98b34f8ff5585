// src/main.rs

use treeload::{cli, logging, prepare, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("treeload error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    let invocation = prepare(&args)?;
    logging::init_logging(args.log_level, invocation.options.verbose)?;
    run(invocation).await
}

// src/main.rs

use kubevali::errors::FATAL_EXIT_CODE;
use kubevali::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("kubevali error: {err:?}");
            std::process::exit(FATAL_EXIT_CODE);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}

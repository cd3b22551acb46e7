// src/main.rs

use scipipe::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("scipipe error: {err:?}");
        std::process::exit(scipipe::errors::EXIT_CONFIG);
    }

    if let Err(err) = run(args).await {
        eprintln!("scipipe error: {err}");
        std::process::exit(err.exit_code());
    }
}

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = gourmet::cli::Cli::parse();
    if let Err(e) = gourmet::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

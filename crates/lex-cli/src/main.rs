use clap::Parser;

mod cli;
mod commands;
mod progress;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // Help/version requests are not failures.
            if error.use_stderr() {
                eprintln!("{error}");
                std::process::exit(1);
            }
            println!("{error}");
            return;
        }
    };

    if let Err(error) = run(cli).await {
        eprintln!("lmx error: {error:#}");
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        cli::Commands::Discover(args) => commands::discover::handle(args, cli.quiet).await,
        cli::Commands::Status(args) => commands::status::handle(args).await,
        cli::Commands::Resume(args) => commands::resume::handle(args).await,
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("LEXMEX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

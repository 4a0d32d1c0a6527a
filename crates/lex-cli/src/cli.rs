//! Command-line definitions for `lmx`.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "lmx",
    version,
    about = "SCJN legislation scraping pipeline",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log debug detail.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover and scrape documents from the legislation portal.
    Discover(DiscoverArgs),
    /// List saved checkpoints.
    Status(StatusArgs),
    /// Inspect a checkpoint for a previous session.
    Resume(ResumeArgs),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Maximum documents to discover (0 = unlimited).
    #[arg(long, default_value_t = 100)]
    pub max_results: usize,

    /// Filter by category (LEY, CODIGO, REGLAMENTO, …).
    #[arg(long)]
    pub category: Option<String>,

    /// Filter by scope (FEDERAL, ESTATAL, …).
    #[arg(long)]
    pub scope: Option<String>,

    /// Filter by status (VIGENTE, ABROGADA, …).
    #[arg(long)]
    pub status: Option<String>,

    /// Storage root for documents and embeddings.
    #[arg(long, default_value = "scjn_data")]
    pub output_dir: String,

    /// Checkpoint directory.
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Concurrent detail downloads.
    #[arg(long, default_value_t = 3)]
    pub concurrency: usize,

    /// Requests per second against the portal.
    #[arg(long, default_value_t = 0.5)]
    pub rate_limit: f64,

    /// Skip reform-PDF downloads.
    #[arg(long)]
    pub skip_pdfs: bool,

    /// Walk every result page, not just the first.
    #[arg(long)]
    pub all_pages: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Checkpoint directory.
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Session to inspect.
    #[arg(long, required = true)]
    pub session_id: String,

    /// Checkpoint directory.
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn discover_defaults() {
        let cli = Cli::try_parse_from(["lmx", "discover"]).unwrap();
        let Commands::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(args.max_results, 100);
        assert_eq!(args.concurrency, 3);
        assert!((args.rate_limit - 0.5).abs() < f64::EPSILON);
        assert!(!args.skip_pdfs);
        assert!(!args.all_pages);
    }

    #[test]
    fn resume_requires_session_id() {
        assert!(Cli::try_parse_from(["lmx", "resume"]).is_err());
        assert!(Cli::try_parse_from(["lmx", "resume", "--session-id", "abc"]).is_ok());
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["lmx"]).is_err());
    }
}

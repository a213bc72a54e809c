//! Command-line interface definitions for the agent scraper.
//!
//! All options mirror a settings-file key; a flag given on the command
//! line overrides the file (see [`crate::config::Settings::apply_cli`]).

use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Walk a listing search and export JSON + CSV
/// realtor_agents "https://www.realtor.com/realestateagents/minneapolis_mn"
///
/// # One agent, with change detection against the stored snapshot
/// realtor_agents --monitoring "https://www.realtor.com/realestateagents/jane-doe"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Seed URLs: listing search pages or direct agent profile pages
    #[arg(required = true)]
    pub seeds: Vec<String>,

    /// Optional path to a settings YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output directory for exported files
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Comma-separated export formats: json,csv,xml
    #[arg(short, long)]
    pub formats: Option<String>,

    /// Maximum number of agent profiles to process (for quick tests)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Maximum listing pages to walk per seed
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Worker pool size for concurrent profile fetches
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Enable incremental change detection against the snapshot
    #[arg(long)]
    pub monitoring: bool,

    /// Fetch the per-agent details sub-page for deep fields
    #[arg(long)]
    pub full_details: bool,

    /// Path to the snapshot file used by --monitoring
    #[arg(long)]
    pub snapshot: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "realtor_agents",
            "https://www.realtor.com/realestateagents/minneapolis_mn",
            "--output-dir",
            "./out",
            "--limit",
            "10",
        ]);
        assert_eq!(cli.seeds.len(), 1);
        assert_eq!(cli.output_dir.as_deref(), Some("./out"));
        assert_eq!(cli.limit, Some(10));
        assert!(!cli.monitoring);
    }

    #[test]
    fn test_multiple_seeds() {
        let cli = Cli::parse_from([
            "realtor_agents",
            "https://example.com/a",
            "https://example.com/b",
        ]);
        assert_eq!(cli.seeds.len(), 2);
    }

    #[test]
    fn test_seed_is_required() {
        assert!(Cli::try_parse_from(["realtor_agents"]).is_err());
    }
}

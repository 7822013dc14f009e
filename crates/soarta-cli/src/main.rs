#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Translate {
            input,
            output,
            max_firings,
            queries,
            no_queries,
        } => commands::translate::run_translate_command(input, output, max_firings, queries, no_queries),
        Commands::Analyze { input, format } => commands::analyze::run_analyze_command(input, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cli::ReportFormat;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn translate_defaults() {
        let cli = Cli::try_parse_from(["soarta", "translate", "agent.soar"]).unwrap();
        let Commands::Translate {
            output,
            max_firings,
            queries,
            no_queries,
            ..
        } = cli.command
        else {
            panic!("expected translate");
        };
        assert_eq!(output, None);
        assert_eq!(max_firings, 10);
        assert_eq!(queries, None);
        assert!(!no_queries);
    }

    #[test]
    fn queries_and_no_queries_conflict() {
        let parsed = Cli::try_parse_from([
            "soarta",
            "translate",
            "agent.soar",
            "--queries",
            "agent.q",
            "--no-queries",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn analyze_accepts_json() {
        let cli = Cli::try_parse_from(["soarta", "analyze", "agent.soar", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Analyze {
                format: ReportFormat::Json,
                ..
            }
        ));
    }
}

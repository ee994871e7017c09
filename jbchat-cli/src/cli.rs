//! Command-line arguments.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jbchat_model::ModelProvider;
use jbchat_rag::ExtractionRule;

/// Ask questions about a JBrowse 2 configuration file and the JBrowse documentation.
#[derive(Parser, Debug, Clone)]
#[command(name = "jbchat", version, about, long_about = None)]
pub struct Cli {
    /// Path to the JBrowse configuration file to query [env: CONFIG]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Host URL of your JBrowse session [env: HOST]
    #[arg(short = 't', long, global = true)]
    pub host: Option<String>,

    /// Model provider: openai or gemini
    #[arg(short, long, global = true, default_value = "gemini")]
    pub model: ModelProvider,

    /// Answer one prompt and exit instead of starting the interactive loop
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Documentation page to index (repeatable)
    #[arg(long = "docs", value_name = "URL", global = true)]
    pub docs: Vec<String>,

    /// Do not index any documentation
    #[arg(long, global = true, conflicts_with = "docs")]
    pub no_docs: bool,

    /// Rule selecting the track records in the configuration file
    #[arg(long, value_name = "RULE", global = true, default_value = ".tracks[]")]
    pub records: ExtractionRule,

    /// Number of passages retrieved per question
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Print answer text as it arrives instead of at tool boundaries
    #[arg(long, global = true)]
    pub incremental: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,

        /// Minutes of inactivity after which a conversation is dropped
        #[arg(long, default_value_t = 30)]
        session_ttl_mins: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["jbchat"]).unwrap();
        assert_eq!(cli.model, ModelProvider::Gemini);
        assert_eq!(cli.records, ExtractionRule::tracks());
        assert!(cli.prompt.is_none() && cli.command.is_none());
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "jbchat",
            "-c",
            "hg38.json",
            "-t",
            "https://jbrowse.example",
            "-m",
            "openai",
            "-p",
            "which tracks?",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("hg38.json")));
        assert_eq!(cli.host.as_deref(), Some("https://jbrowse.example"));
        assert_eq!(cli.model, ModelProvider::OpenAI);
        assert_eq!(cli.prompt.as_deref(), Some("which tracks?"));
    }

    #[test]
    fn serve_accepts_global_flags() {
        let args = ["jbchat", "serve", "--addr", "0.0.0.0:8080", "--no-docs", "-c", "c.json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.no_docs);
        assert_eq!(
            cli.command,
            Some(Command::Serve { addr: "0.0.0.0:8080".parse().unwrap(), session_ttl_mins: 30 })
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["jbchat", "-m", "claude"]).is_err());
        assert!(Cli::try_parse_from(["jbchat", "--records", "tracks"]).is_err());
        assert!(Cli::try_parse_from(["jbchat", "--docs", "https://a", "--no-docs"]).is_err());
    }
}

//! Resolved run settings: flags first, then `CONFIG` / `HOST`, then defaults.

use std::path::PathBuf;

use jbchat_agent::{DialogueConfig, FlushPolicy};
use jbchat_model::ModelProvider;
use jbchat_rag::{DEFAULT_DOCS_URL, ExtractionRule, RagConfig, SourceDescriptor};

use crate::cli::Cli;

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";
pub const DEFAULT_HOST: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub host: String,
    pub provider: ModelProvider,
    pub docs: Vec<String>,
    pub records: ExtractionRule,
    pub top_k: Option<usize>,
    pub flush_policy: FlushPolicy,
}

impl Settings {
    /// Resolve against the process environment.
    pub fn from_cli(cli: &Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve with `env` standing in for the process environment.
    pub fn resolve(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let config_path = cli
            .config
            .clone()
            .or_else(|| env("CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let host =
            cli.host.clone().or_else(|| env("HOST")).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let docs = if cli.no_docs {
            Vec::new()
        } else if cli.docs.is_empty() {
            vec![DEFAULT_DOCS_URL.to_string()]
        } else {
            cli.docs.clone()
        };

        Self {
            config_path,
            host,
            provider: cli.model,
            docs,
            records: cli.records.clone(),
            top_k: cli.top_k,
            flush_policy: if cli.incremental {
                FlushPolicy::Incremental
            } else {
                FlushPolicy::Boundaries
            },
        }
    }

    /// The configuration file name as given, used in links and prompts.
    pub fn config_name(&self) -> String {
        self.config_path.display().to_string()
    }

    /// Track records first, then documentation.
    pub fn sources(&self) -> Vec<SourceDescriptor> {
        let mut sources = vec![SourceDescriptor::records(&self.config_path, self.records.clone())];
        if !self.docs.is_empty() {
            sources.push(SourceDescriptor::web(self.docs.iter().cloned()));
        }
        sources
    }

    pub fn rag_config(&self) -> jbchat_rag::Result<RagConfig> {
        let builder = RagConfig::builder();
        match self.top_k {
            Some(k) => builder.top_k(k).build(),
            None => builder.build(),
        }
    }

    pub fn dialogue_config(&self) -> jbchat_agent::Result<DialogueConfig> {
        DialogueConfig::builder()
            .host(self.host.as_str())
            .config_name(self.config_name())
            .flush_policy(self.flush_policy)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jbchat").chain(args.iter().copied())).unwrap()
    }

    fn env_of(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn defaults_without_flags_or_env() {
        let settings = Settings::resolve(&cli(&[]), env_of(&[]));
        assert_eq!(settings.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(settings.host, DEFAULT_HOST);
        assert_eq!(settings.docs, [DEFAULT_DOCS_URL]);
        assert_eq!(settings.flush_policy, FlushPolicy::Boundaries);
    }

    #[test]
    fn env_fills_in_missing_flags() {
        let env = env_of(&[("CONFIG", "env.json"), ("HOST", "http://env-host")]);
        let settings = Settings::resolve(&cli(&[]), env);
        assert_eq!(settings.config_path, PathBuf::from("env.json"));
        assert_eq!(settings.host, "http://env-host");
    }

    #[test]
    fn flags_win_over_env() {
        let settings = Settings::resolve(
            &cli(&["-c", "flag.json", "-t", "http://flag-host"]),
            env_of(&[("CONFIG", "env.json"), ("HOST", "http://env-host")]),
        );
        assert_eq!(settings.config_path, PathBuf::from("flag.json"));
        assert_eq!(settings.host, "http://flag-host");
    }

    #[test]
    fn host_flag_leaves_config_alone() {
        let settings =
            Settings::resolve(&cli(&["-t", "http://flag-host"]), env_of(&[("CONFIG", "env.json")]));
        assert_eq!(settings.config_path, PathBuf::from("env.json"));
        assert_eq!(settings.host, "http://flag-host");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let settings = Settings::resolve(&cli(&[]), env_of(&[("CONFIG", ""), ("HOST", "  ")]));
        assert_eq!(settings.config_path, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(settings.host, DEFAULT_HOST);
    }

    #[test]
    fn sources_follow_docs_flags() {
        let settings = Settings::resolve(&cli(&["--no-docs"]), env_of(&[]));
        assert_eq!(settings.sources().len(), 1);

        let args = cli(&["--docs", "https://a/", "--docs", "https://b/"]);
        let settings = Settings::resolve(&args, env_of(&[]));
        assert_eq!(settings.sources()[1], SourceDescriptor::web(["https://a/", "https://b/"]));
    }

    #[test]
    fn derived_configs() {
        let args = cli(&["--top-k", "6", "--incremental", "-c", "hg38.json"]);
        let settings = Settings::resolve(&args, env_of(&[]));
        assert_eq!(settings.rag_config().unwrap().top_k, 6);
        let dialogue = settings.dialogue_config().unwrap();
        assert_eq!(dialogue.config_name, "hg38.json");
        assert_eq!(dialogue.flush_policy, FlushPolicy::Incremental);
        assert!(Settings::resolve(&cli(&["--top-k", "0"]), env_of(&[])).rag_config().is_err());
    }
}

//! CLI argument parsing using clap 4.x derive macros

use clap::Parser;
use shellwise_core::Config;
use std::path::PathBuf;

/// Your shell, with a model one keystroke away
///
/// Press the trigger chord (Ctrl+G by default) at the prompt, describe what
/// you want, and review the suggested commands before anything runs.
#[derive(Parser, Debug)]
#[command(name = "shellwise")]
#[command(author, about, long_about = None)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model name (overrides endpoint.model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Endpoint base URL (overrides endpoint.base_url)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// openai or ollama (overrides endpoint.provider)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,

    /// Shell to launch instead of $SHELL
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default()?,
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.endpoint.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.endpoint.base_url = base_url.clone();
        }
        if let Some(provider) = &self.provider {
            config.endpoint.provider = provider.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let cli = Cli::parse_from([
            "shellwise",
            "--model",
            "qwen2.5-coder",
            "--provider",
            "ollama",
            "--base-url",
            "http://gpu-box:11434",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.endpoint.model, "qwen2.5-coder");
        assert_eq!(config.endpoint.provider, "ollama");
        assert_eq!(config.endpoint.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn test_no_flags_keep_defaults() {
        let cli = Cli::parse_from(["shellwise"]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.endpoint.model, Config::default().endpoint.model);
        assert!(!cli.print_config);
    }
}

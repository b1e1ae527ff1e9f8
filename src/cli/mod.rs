use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::FileConfig;

mod run;

pub use run::{Session, execute};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "susi",
    version,
    about = "Tool-calling chat client for OpenAI-compatible servers"
)]
pub struct Cli {
    /// OpenAI-compatible API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key ("_" or empty sends no Authorization header)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Directory backing the file tools (in-memory when unset)
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Stream model output token by token
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub stream: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive conversation (default)
    Chat,
    /// Send one prompt and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// List models served by the backend
    Models,
    /// Load a model (llama.cpp style)
    Load {
        #[arg(value_name = "MODEL")]
        name: String,
    },
    /// Pull a model, falling back to load
    Pull {
        #[arg(value_name = "MODEL")]
        name: String,
    },
    /// Delete a model
    Delete {
        #[arg(value_name = "MODEL")]
        name: String,
    },
    /// Send the system prompt alone and report token usage
    Warmup,
}

impl Cli {
    /// Command-line values as the highest-precedence config layer.
    pub fn config_layer(&self) -> FileConfig {
        FileConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            store_root: self.store_root.clone(),
            stream: self.stream.then_some(true),
            ..Default::default()
        }
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Help,
    Tools,
    Undo,
    Reset,
    Quit,
    Unknown(String),
    Prompt(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => ReplCommand::Empty,
            "/help" => ReplCommand::Help,
            "/tools" => ReplCommand::Tools,
            "/undo" => ReplCommand::Undo,
            "/reset" => ReplCommand::Reset,
            "/quit" | "/exit" => ReplCommand::Quit,
            _ if line.starts_with('/') => ReplCommand::Unknown(line.to_string()),
            _ => ReplCommand::Prompt(line.to_string()),
        }
    }
}

pub fn print_help() {
    println!(
        "/help   Show help\n/tools  List available tools\n/undo   Drop the last exchange\n/reset  Start a new conversation\n/quit   Quit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_chat() {
        let cli = Cli::try_parse_from(["susi"]).unwrap();
        assert_eq!(cli.command(), Command::Chat);
        assert!(!cli.stream);
        assert_eq!(cli.config_layer(), FileConfig::default());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "susi", "ask", "what", "time", "--model", "llama3", "--stream",
        ])
        .unwrap();
        assert_eq!(
            cli.command(),
            Command::Ask {
                prompt: vec!["what".into(), "time".into()]
            }
        );
        let layer = cli.config_layer();
        assert_eq!(layer.model.as_deref(), Some("llama3"));
        assert_eq!(layer.stream, Some(true));
    }

    #[test]
    fn model_management_takes_positional_name() {
        let cli = Cli::try_parse_from(["susi", "pull", "qwen2.5:7b"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Pull {
                name: "qwen2.5:7b".into()
            }
        );
        assert!(Cli::try_parse_from(["susi", "ask"]).is_err());
    }

    #[test]
    fn repl_commands() {
        assert_eq!(ReplCommand::parse("  "), ReplCommand::Empty);
        assert_eq!(ReplCommand::parse("/undo"), ReplCommand::Undo);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(
            ReplCommand::parse("/frobnicate"),
            ReplCommand::Unknown("/frobnicate".into())
        );
        assert_eq!(
            ReplCommand::parse(" hello there "),
            ReplCommand::Prompt("hello there".into())
        );
    }
}

//! Interactive read-eval-print loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::config::Config;
use crate::registry::CommandRegistry;

/// Split a command line into whitespace-separated tokens.
///
/// The first token names the command; the full token list is handed to it
/// as its arguments.
#[must_use]
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// The interactive shell driving a command registry.
pub struct Repl {
    registry: CommandRegistry,
    prompt: String,
}

impl Repl {
    #[must_use]
    pub fn new(registry: CommandRegistry, config: &Config) -> Self {
        Self {
            registry,
            prompt: config.prompt(),
        }
    }

    /// Read and dispatch command lines until `exit` or end of input.
    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
        let history = history_path();
        if let Some(path) = &history {
            // Missing history is normal on first start.
            let _ = editor.load_history(path);
        }

        println!("Crucible shell. Type 'help' for available commands, 'exit' to leave.");

        loop {
            match editor.readline(&self.prompt) {
                Ok(line) => {
                    let tokens = tokenize(&line);
                    if tokens.is_empty() {
                        continue;
                    }
                    if let Err(error) = editor.add_history_entry(line.as_str()) {
                        debug!("Failed to record history entry: {}", error);
                    }
                    if tokens[0] == "exit" {
                        break;
                    }
                    self.registry.dispatch(&tokens);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(error) => {
                    warn!("Failed to read input: {}", error);
                    break;
                }
            }
        }

        if let Some(path) = &history {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(error) = editor.save_history(path) {
                warn!("Failed to save history to {}: {}", path.display(), error);
            }
        }

        Ok(())
    }
}

/// History file under the user's crucible directory.
fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".crucible").join("history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(
            tokenize("loadplugin demo.lua"),
            vec!["loadplugin", "demo.lua"]
        );
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  a \t b   c  "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tokenize_empty_line() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t ").is_empty());
    }

    #[test]
    fn test_repl_uses_configured_prompt() {
        let config = Config::default();
        let repl = Repl::new(CommandRegistry::new(), &config);
        assert_eq!(repl.prompt, "[crucible]> ");
    }
}

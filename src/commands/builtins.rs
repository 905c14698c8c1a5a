//! The built-in command set registered at startup.
//!
//! Built-ins print their own usage and error lines; the shell loop treats
//! them like any other command.

use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::commands::Command;
use crate::engine::LuaEngine;
use crate::registry::CommandRegistry;
use crate::shell;

/// Register every built-in command.
///
/// `script_budget` caps the `lua` command's evaluation time the same way it
/// caps script plugins.
pub fn register_builtins(
    registry: &mut CommandRegistry,
    script_budget: Option<Duration>,
) -> Result<()> {
    registry.register_command(Rc::new(HelpCommand));
    registry.register_command(Rc::new(ExitCommand));
    registry.register_command(Rc::new(ClearCommand));
    registry.register_command(Rc::new(LsCommand));
    registry.register_command(Rc::new(OpenCommand));
    registry.register_command(Rc::new(LoadPluginCommand));
    registry.register_command(Rc::new(UnloadPluginCommand));
    registry.register_command(Rc::new(ExecCommand));
    registry.register_command(Rc::new(LuaCommand::new(script_budget)?));
    Ok(())
}

struct HelpCommand;

impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "List available commands"
    }

    fn run(&self, registry: &mut CommandRegistry, _args: &[String]) {
        println!("Available commands:");
        for name in registry.command_names() {
            let description = registry
                .get_command(&name)
                .map(|command| command.description().to_string())
                .unwrap_or_default();
            println!("  {:<14} {}", name, description);
        }
    }
}

/// The shell loop watches for the `exit` token itself; the command exists
/// so `help` lists it and dispatching it is not an error.
struct ExitCommand;

impl Command for ExitCommand {
    fn name(&self) -> &str {
        "exit"
    }

    fn description(&self) -> &str {
        "Leave the shell"
    }

    fn run(&self, _registry: &mut CommandRegistry, _args: &[String]) {}
}

struct ClearCommand;

impl Command for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn description(&self) -> &str {
        "Clear the screen"
    }

    fn run(&self, _registry: &mut CommandRegistry, _args: &[String]) {
        print!("\x1b[2J\x1b[1;1H");
        let _ = std::io::stdout().flush();
    }
}

struct LsCommand;

impl Command for LsCommand {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List directory contents"
    }

    fn run(&self, _registry: &mut CommandRegistry, args: &[String]) {
        let target = args.get(1).map(String::as_str).unwrap_or(".");
        match std::fs::read_dir(target) {
            Ok(entries) => {
                let mut names: Vec<String> = entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                for name in names {
                    println!("{}", name);
                }
            }
            Err(error) => eprintln!("ls: cannot read '{}': {}", target, error),
        }
    }
}

struct OpenCommand;

impl Command for OpenCommand {
    fn name(&self) -> &str {
        "open"
    }

    fn description(&self) -> &str {
        "Print the contents of a file"
    }

    fn run(&self, _registry: &mut CommandRegistry, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("Usage: open <file>");
            return;
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => print!("{}", contents),
            Err(error) => eprintln!("open: cannot read '{}': {}", path, error),
        }
    }
}

struct LoadPluginCommand;

impl Command for LoadPluginCommand {
    fn name(&self) -> &str {
        "loadplugin"
    }

    fn description(&self) -> &str {
        "Load a plugin from a file"
    }

    fn run(&self, registry: &mut CommandRegistry, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("Usage: loadplugin <path>");
            return;
        };
        match registry.load_plugin(Path::new(path)) {
            Ok(()) => println!("Loaded plugin: {}", path),
            Err(error) => eprintln!("Failed to load plugin: {}", error),
        }
    }
}

struct UnloadPluginCommand;

impl Command for UnloadPluginCommand {
    fn name(&self) -> &str {
        "unloadplugin"
    }

    fn description(&self) -> &str {
        "Unload a previously loaded plugin"
    }

    fn run(&self, registry: &mut CommandRegistry, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("Usage: unloadplugin <path>");
            return;
        };
        if registry.unload_plugin(Path::new(path)) {
            println!("Unloaded plugin: {}", path);
        } else {
            eprintln!("No plugin loaded from: {}", path);
        }
    }
}

struct ExecCommand;

impl Command for ExecCommand {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Run a program and capture its output"
    }

    fn run(&self, _registry: &mut CommandRegistry, args: &[String]) {
        let Some(program) = args.get(1) else {
            println!("Usage: exec <program> [args...]");
            return;
        };
        match shell::run_captured(program, &args[2..]) {
            Ok(output) => {
                if !output.stdout.is_empty() {
                    println!("Stdout:");
                    print!("{}", output.stdout);
                }
                if !output.stderr.is_empty() {
                    println!("Stderr:");
                    print!("{}", output.stderr);
                }
                if output.exit_code != 0 {
                    println!("Command exited with status {}", output.exit_code);
                }
            }
            Err(error) => eprintln!("exec: {:#}", error),
        }
    }
}

/// Evaluates ad hoc Lua in a persistent sandboxed interpreter.
///
/// The interpreter lives as long as the command does, so globals set in one
/// invocation are visible in the next.
struct LuaCommand {
    engine: LuaEngine,
}

impl LuaCommand {
    fn new(budget: Option<Duration>) -> Result<Self> {
        let engine = LuaEngine::new(budget)
            .context("Failed to create the interpreter for the lua command")?;
        Ok(Self { engine })
    }
}

impl Command for LuaCommand {
    fn name(&self) -> &str {
        "lua"
    }

    fn description(&self) -> &str {
        "Evaluate a Lua snippet"
    }

    fn run(&self, _registry: &mut CommandRegistry, args: &[String]) {
        if args.len() < 2 {
            println!("Usage: lua <code>");
            return;
        }
        let source = args[1..].join(" ");
        if let Err(error) = self.engine.execute(&source) {
            eprintln!("lua: {}", error);
        }
    }
}

//! Central registry for commands and the plugins that provide them.
//!
//! The registry keeps two tables. Commands are indexed by name, with the
//! first registration of a name winning; plugins are indexed by the exact
//! path they were loaded from. Each plugin record remembers which commands
//! the plugin registered during initialization so that unloading can sweep
//! out anything the plugin's shutdown forgot to remove. A command provided
//! by a plugin must never outlive that plugin.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::plugins::native::NativePlugin;
use crate::plugins::script::ScriptPlugin;
use crate::plugins::{Plugin, PluginError};

/// A loaded plugin plus the commands it registered while initializing.
///
/// The weak references let unloading distinguish a command this plugin
/// registered from an unrelated command that later reused the same name.
struct PluginRecord {
    // Declared first so the weak references drop while the plugin's code
    // is still mapped; freeing a weak count reads the command's vtable,
    // which for a native plugin lives in the library `plugin` unmaps.
    registered: Vec<(String, Weak<dyn Command>)>,
    plugin: Box<dyn Plugin>,
}

/// Owner of all commands and plugins for one shell session.
///
/// Dropping the registry unloads every remaining plugin, so native
/// libraries are closed and script interpreters torn down in an orderly
/// fashion at exit.
pub struct CommandRegistry {
    commands: HashMap<String, Rc<dyn Command>>,
    plugins: HashMap<PathBuf, PluginRecord>,
    script_budget: Option<Duration>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
            plugins: HashMap::new(),
            script_budget: None,
        }
    }

    /// Cap the wall-clock time each script plugin call may consume.
    pub fn set_script_budget(&mut self, budget: Option<Duration>) {
        self.script_budget = budget;
    }

    /// Register a command under its own name.
    ///
    /// Returns false without replacing anything when the name is already
    /// taken or empty.
    pub fn register_command(&mut self, command: Rc<dyn Command>) -> bool {
        let name = command.name().to_string();
        if name.is_empty() {
            warn!("Refusing to register a command with an empty name");
            return false;
        }
        match self.commands.entry(name) {
            Entry::Occupied(entry) => {
                warn!(
                    "Command '{}' is already registered; keeping the first registration",
                    entry.key()
                );
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(command);
                true
            }
        }
    }

    /// Remove a command by name. Returns false if no such command exists.
    pub fn unregister_command(&mut self, name: &str) -> bool {
        if self.commands.remove(name).is_some() {
            true
        } else {
            warn!("Cannot unregister unknown command '{}'", name);
            false
        }
    }

    #[must_use]
    pub fn get_command(&self, name: &str) -> Option<Rc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// All registered command names, sorted.
    #[must_use]
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Paths of all currently loaded plugins, sorted.
    #[must_use]
    pub fn plugin_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.plugins.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Look up `args[0]` and run the matching command.
    ///
    /// The command is cloned out of the table before running, so a command
    /// may register and unregister freely while it executes, including
    /// removing itself. That protects the registry's tables only; a native
    /// command that unloads its own plugin would unmap the code it is
    /// still running. Returns false for an unknown name.
    pub fn dispatch(&mut self, args: &[String]) -> bool {
        let Some(name) = args.first() else {
            return false;
        };
        let Some(command) = self.commands.get(name).cloned() else {
            println!("Unknown command: {}", name);
            return false;
        };
        command.run(self, args);
        true
    }

    /// Load a plugin from a file, picking the loader by extension.
    ///
    /// `.lua` files become sandboxed script plugins; `.so`, `.dll`, and
    /// `.dylib` files are opened as native libraries. The path is the
    /// plugin's identity, so loading the same path twice is rejected until
    /// the first instance is unloaded.
    pub fn load_plugin(&mut self, path: &Path) -> Result<(), PluginError> {
        if self.plugins.contains_key(path) {
            return Err(PluginError::AlreadyLoaded {
                path: path.to_path_buf(),
            });
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let plugin: Box<dyn Plugin> = match extension {
            "lua" => Box::new(ScriptPlugin::load(path, self.script_budget)?),
            "so" | "dll" | "dylib" => Box::new(NativePlugin::load(path)?),
            _ => {
                return Err(PluginError::UnsupportedExtension {
                    path: path.to_path_buf(),
                })
            }
        };

        let name = plugin.name();
        self.install(path.to_path_buf(), plugin)?;
        info!("Loaded plugin '{}' from {}", name, path.display());
        Ok(())
    }

    /// Unload the plugin identified by `path`.
    ///
    /// The plugin's shutdown hook runs first and may unregister its own
    /// commands; any it leaves behind are swept out afterwards. A shutdown
    /// error is logged but never blocks the unload. Returns false if no
    /// plugin is loaded from that path.
    pub fn unload_plugin(&mut self, path: &Path) -> bool {
        let Some(mut record) = self.plugins.remove(path) else {
            warn!("No plugin loaded from {}", path.display());
            return false;
        };

        let name = record.plugin.name();
        if let Err(error) = record.plugin.shutdown(self) {
            warn!("Plugin '{}' failed to shut down cleanly: {:#}", name, error);
        }

        for (command_name, original) in &record.registered {
            let still_present = match (self.commands.get(command_name), original.upgrade()) {
                (Some(current), Some(original)) => Rc::ptr_eq(current, &original),
                _ => false,
            };
            if still_present {
                debug!(
                    "Removing command '{}' left behind by plugin '{}'",
                    command_name, name
                );
                self.commands.remove(command_name);
            }
        }

        info!("Unloaded plugin '{}'", name);
        true
    }

    /// Initialize a constructed plugin and record it.
    ///
    /// If initialization fails the plugin is discarded without running its
    /// shutdown hook, and every command it managed to register is removed
    /// again.
    fn install(&mut self, path: PathBuf, mut plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let before: HashSet<String> = self.commands.keys().cloned().collect();

        if let Err(reason) = plugin.initialize(self) {
            let added: Vec<String> = self
                .commands
                .keys()
                .filter(|name| !before.contains(*name))
                .cloned()
                .collect();
            for name in added {
                debug!("Rolling back command '{}' from failed plugin", name);
                self.commands.remove(&name);
            }
            return Err(PluginError::Initialize { path, reason });
        }

        let registered = self
            .commands
            .iter()
            .filter(|(name, _)| !before.contains(*name))
            .map(|(name, command)| (name.clone(), Rc::downgrade(command)))
            .collect();

        self.plugins.insert(path, PluginRecord { registered, plugin });
        Ok(())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandRegistry {
    fn drop(&mut self) {
        let paths: Vec<PathBuf> = self.plugins.keys().cloned().collect();
        for path in paths {
            self.unload_plugin(&path);
        }
    }
}

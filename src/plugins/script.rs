//! Script plugins running inside sandboxed Lua interpreters.
//!
//! Each `.lua` plugin owns a private [`LuaEngine`]. On load the script runs
//! top to bottom; it may call the injected `register_command(name,
//! description, callback)` and `unregister_command(name)` globals at the
//! top level, inside its optional `initialize`/`shutdown` hooks, or from a
//! command callback. Those calls cannot touch the host registry directly
//! while Lua is on the stack, so they queue operations that the host
//! applies as soon as control returns.
//!
//! Callbacks are never held as borrowed `mlua` handles. Each registered
//! command stores its callback in the interpreter's named registry under a
//! `<plugin>::<command>` key and fetches it fresh on every run; the key is
//! cleared when the command is dropped.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use mlua::{Function, Lua, Value};
use tracing::warn;

use crate::commands::Command;
use crate::engine::LuaEngine;
use crate::plugins::{Plugin, PluginError};
use crate::registry::CommandRegistry;

/// Registry operation requested from inside Lua, applied once control
/// returns to the host.
enum PendingOp {
    Register {
        name: String,
        description: String,
        key: String,
    },
    Unregister {
        name: String,
    },
}

type PendingQueue = Rc<RefCell<Vec<PendingOp>>>;

/// A plugin backed by a Lua script and its private interpreter.
pub struct ScriptPlugin {
    stem: String,
    engine: Rc<LuaEngine>,
    pending: PendingQueue,
}

impl ScriptPlugin {
    /// Create an interpreter, inject the registration API, and run the
    /// script's top level.
    ///
    /// A script that fails here leaves nothing behind: queued operations
    /// were never applied, and the interpreter is dropped whole.
    pub fn load(path: &Path, budget: Option<Duration>) -> Result<Self, PluginError> {
        let engine = LuaEngine::new(budget).map_err(|error| PluginError::Engine {
            path: path.to_path_buf(),
            message: format!("{:#}", error),
        })?;
        let engine = Rc::new(engine);

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("script")
            .to_string();

        let pending: PendingQueue = Rc::new(RefCell::new(Vec::new()));
        install_registration_api(&engine, &stem, &pending).map_err(|source| {
            PluginError::ScriptExec {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let chunk = fs::read_to_string(path).map_err(|source| PluginError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;

        engine.arm_budget();
        engine
            .lua()
            .load(&chunk)
            .set_name(path.display().to_string())
            .exec()
            .map_err(|source| PluginError::ScriptExec {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            stem,
            engine,
            pending,
        })
    }
}

impl Plugin for ScriptPlugin {
    fn name(&self) -> String {
        self.engine.arm_budget();
        plugin_name(self.engine.lua(), &self.stem)
    }

    fn initialize(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        // Registrations queued while the top level first ran.
        apply_pending(&self.pending, &self.engine, registry);

        if let Some(hook) = self.engine.global_function("initialize") {
            self.engine.arm_budget();
            let result = hook.call::<_, ()>(());
            apply_pending(&self.pending, &self.engine, registry);
            result.map_err(|error| anyhow::anyhow!("script initialize failed: {}", error))?;
        }
        Ok(())
    }

    fn shutdown(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        let result = match self.engine.global_function("shutdown") {
            Some(hook) => {
                self.engine.arm_budget();
                hook.call::<_, ()>(())
                    .map_err(|error| anyhow::anyhow!("script shutdown failed: {}", error))
            }
            None => Ok(()),
        };
        // Unregistrations queued by the hook apply even when it failed.
        apply_pending(&self.pending, &self.engine, registry);
        result
    }
}

/// A command whose behavior lives in a Lua function.
struct ScriptCommand {
    name: String,
    description: String,
    key: String,
    engine: Rc<LuaEngine>,
    pending: PendingQueue,
}

impl Command for ScriptCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self, registry: &mut CommandRegistry, args: &[String]) {
        let lua = self.engine.lua();
        let callback: Function = match lua.named_registry_value(&self.key) {
            Ok(callback) => callback,
            Err(error) => {
                eprintln!("{}: stored callback is gone: {}", self.name, error);
                return;
            }
        };
        let arguments = match lua.create_sequence_from(args.iter().cloned()) {
            Ok(table) => table,
            Err(error) => {
                eprintln!("{}: failed to build argument table: {}", self.name, error);
                return;
            }
        };

        self.engine.arm_budget();
        if let Err(error) = callback.call::<_, ()>(arguments) {
            eprintln!("{}: script error: {}", self.name, error);
        }

        // The callback may have registered or unregistered commands.
        apply_pending(&self.pending, &self.engine, registry);
    }
}

impl Drop for ScriptCommand {
    fn drop(&mut self) {
        if let Err(error) = self.engine.lua().unset_named_registry_value(&self.key) {
            warn!("Failed to clear stored callback '{}': {}", self.key, error);
        }
    }
}

/// Inject `register_command` and `unregister_command` into the sandbox.
///
/// The closures capture the pending queue and the file stem only, never the
/// engine handle, so the interpreter is not kept alive by its own globals.
fn install_registration_api(
    engine: &LuaEngine,
    stem: &str,
    pending: &PendingQueue,
) -> mlua::Result<()> {
    let lua = engine.lua();

    let register = {
        let stem = stem.to_string();
        let queue = Rc::clone(pending);
        lua.create_function(
            move |lua, (name, description, callback): (String, String, Function)| {
                let key = storage_key(&plugin_name(lua, &stem), &name);
                lua.set_named_registry_value(&key, callback)?;
                queue.borrow_mut().push(PendingOp::Register {
                    name,
                    description,
                    key,
                });
                Ok(())
            },
        )?
    };
    lua.globals().set("register_command", register)?;

    let unregister = {
        let queue = Rc::clone(pending);
        lua.create_function(move |_, name: String| {
            queue.borrow_mut().push(PendingOp::Unregister { name });
            Ok(())
        })?
    };
    lua.globals().set("unregister_command", unregister)?;

    Ok(())
}

/// Drain queued registry operations after a return from script code.
fn apply_pending(pending: &PendingQueue, engine: &Rc<LuaEngine>, registry: &mut CommandRegistry) {
    // Move the batch out so the queue is free while the ops apply.
    let batch: Vec<PendingOp> = pending.borrow_mut().drain(..).collect();
    for op in batch {
        match op {
            PendingOp::Register {
                name,
                description,
                key,
            } => {
                let command = Rc::new(ScriptCommand {
                    name,
                    description,
                    key,
                    engine: Rc::clone(engine),
                    pending: Rc::clone(pending),
                });
                // If the name is already taken the new command drops right
                // here, clearing its stored callback again.
                registry.register_command(command);
            }
            PendingOp::Unregister { name } => {
                registry.unregister_command(&name);
            }
        }
    }
}

/// The plugin's display name.
///
/// Scripts may define `get_plugin_name()`; when it is missing, fails, or
/// returns an empty string, the file stem is used instead. Host-side
/// callers arm the budget before calling in; the registration closure
/// runs inside an already armed script call and must not reset its
/// clock.
fn plugin_name(lua: &Lua, stem: &str) -> String {
    let Ok(Value::Function(get_name)) = lua.globals().get::<_, Value>("get_plugin_name") else {
        return stem.to_string();
    };
    match get_name.call::<_, String>(()) {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => stem.to_string(),
        Err(error) => {
            warn!("get_plugin_name failed: {}", error);
            stem.to_string()
        }
    }
}

fn storage_key(plugin: &str, command: &str) -> String {
    format!("{}::{}", plugin, command)
}

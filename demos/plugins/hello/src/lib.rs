//! Minimal native plugin: registers a single `hello` command.
//!
//! Build with `cargo build` in `demos/plugins`, then load the produced
//! shared library from the shell with `loadplugin`.

use std::rc::Rc;

use anyhow::Result;

use crucible::commands::Command;
use crucible::plugins::Plugin;
use crucible::registry::CommandRegistry;

struct HelloCommand;

impl Command for HelloCommand {
    fn name(&self) -> &str {
        "hello"
    }

    fn description(&self) -> &str {
        "Say hello from a native plugin"
    }

    fn run(&self, _registry: &mut CommandRegistry, _args: &[String]) {
        println!("Hello from the native hello plugin!");
    }
}

struct HelloPlugin;

impl Plugin for HelloPlugin {
    fn name(&self) -> String {
        "hello_plugin".to_string()
    }

    fn initialize(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        registry.register_command(Rc::new(HelloCommand));
        Ok(())
    }

    fn shutdown(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        registry.unregister_command("hello");
        Ok(())
    }
}

/// # Safety
///
/// Called by the host loader once per load; ownership of the returned
/// instance transfers to the caller.
#[no_mangle]
pub unsafe fn create_plugin() -> *mut dyn Plugin {
    Box::into_raw(Box::new(HelloPlugin) as Box<dyn Plugin>)
}

/// # Safety
///
/// `plugin` must be a pointer previously returned by [`create_plugin`],
/// passed at most once.
#[no_mangle]
pub unsafe fn destroy_plugin(plugin: *mut dyn Plugin) {
    if !plugin.is_null() {
        drop(Box::from_raw(plugin));
    }
}

//! Native plugin registering an `echo` command that prints its arguments.

use std::rc::Rc;

use anyhow::Result;

use crucible::commands::Command;
use crucible::plugins::Plugin;
use crucible::registry::CommandRegistry;

struct EchoCommand;

impl Command for EchoCommand {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Print the arguments back"
    }

    fn run(&self, _registry: &mut CommandRegistry, args: &[String]) {
        println!("{}", args[1..].join(" "));
    }
}

struct EchoPlugin;

impl Plugin for EchoPlugin {
    fn name(&self) -> String {
        "echo_plugin".to_string()
    }

    fn initialize(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        registry.register_command(Rc::new(EchoCommand));
        Ok(())
    }

    fn shutdown(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        registry.unregister_command("echo");
        Ok(())
    }
}

/// # Safety
///
/// Called by the host loader once per load; ownership of the returned
/// instance transfers to the caller.
#[no_mangle]
pub unsafe fn create_plugin() -> *mut dyn Plugin {
    Box::into_raw(Box::new(EchoPlugin) as Box<dyn Plugin>)
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

//! Command abstraction and the built-in command set.

pub mod builtins;

pub use builtins::register_builtins;

use crate::registry::CommandRegistry;

/// A named, invocable action.
///
/// Commands come from three places: the built-in set registered at startup,
/// native plugin modules, and script plugins. All three are dispatched
/// uniformly through the registry.
pub trait Command {
    /// Unique name used for lookup and dispatch.
    fn name(&self) -> &str;

    /// One-line description shown by `help`.
    fn description(&self) -> &str;

    /// Invoke the command.
    ///
    /// By convention `args[0]` is the command's own name. Failures are
    /// reported as diagnostic output rather than returned, so dispatch
    /// stays uniform across command variants. The registry is passed in so
    /// commands that manage plugins or enumerate the command set need no
    /// stored back-reference.
    fn run(&self, registry: &mut CommandRegistry, args: &[String]);
}

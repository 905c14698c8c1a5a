//! Plugin contracts and loaders.
//!
//! A plugin is an extension unit loaded from the filesystem at runtime:
//! either a compiled shared library (`.so`/`.dll`/`.dylib`) or a Lua script
//! (`.lua`). Both forms register commands into the
//! [`CommandRegistry`](crate::registry::CommandRegistry) during
//! `initialize` and are expected to unregister them again in `shutdown`.

pub mod native;
pub mod script;

use std::path::PathBuf;

use anyhow::Result;

use crate::registry::CommandRegistry;

/// Lifecycle contract implemented by every plugin variant.
///
/// `initialize` runs exactly once after a successful load, `shutdown`
/// exactly once before the plugin is discarded. A plugin's registry
/// identity is the path it was loaded from, not the name it reports; two
/// paths may well yield plugins with the same declared name.
pub trait Plugin {
    /// Declared plugin name, used for logging and script-side key scoping.
    fn name(&self) -> String;

    /// Register commands into `registry`.
    fn initialize(&mut self, registry: &mut CommandRegistry) -> Result<()>;

    /// Unregister commands from `registry`. Errors are logged by the
    /// registry and never block the unload.
    fn shutdown(&mut self, registry: &mut CommandRegistry) -> Result<()>;
}

/// Constructor signature a native module exports as [`CREATE_SYMBOL`].
///
/// Native modules are Rust cdylibs built against this crate. Trait-object
/// layout is not a stable ABI, so a module must be compiled by the same
/// toolchain and crucible version as the host that loads it.
pub type PluginConstructor = unsafe fn() -> *mut dyn Plugin;

/// Destructor signature a native module exports as [`DESTROY_SYMBOL`].
///
/// Takes ownership of the instance produced by the constructor. The
/// destructor lives inside the module, so it must run before the module
/// handle is closed.
pub type PluginDestructor = unsafe fn(*mut dyn Plugin);

/// Exported name of the native plugin constructor.
pub const CREATE_SYMBOL: &[u8] = b"create_plugin";

/// Exported name of the native plugin destructor.
pub const DESTROY_SYMBOL: &[u8] = b"destroy_plugin";

/// Errors produced while loading a plugin from disk.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("a plugin is already loaded from {}", .path.display())]
    AlreadyLoaded { path: PathBuf },

    #[error("unsupported plugin type: {}", .path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("plugin at {} failed to initialize: {:#}", .path.display(), .reason)]
    Initialize { path: PathBuf, reason: anyhow::Error },

    #[error("failed to open plugin library {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("plugin library {} does not export `{}`: {}", .path.display(), .symbol, .source)]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        source: libloading::Error,
    },

    #[error("plugin constructor in {} returned a null instance", .path.display())]
    NullInstance { path: PathBuf },

    #[error("failed to create script interpreter for {}: {}", .path.display(), .message)]
    Engine { path: PathBuf, message: String },

    #[error("failed to read script {}: {}", .path.display(), .source)]
    ScriptRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("script {} failed to run: {}", .path.display(), .source)]
    ScriptExec { path: PathBuf, source: mlua::Error },
}

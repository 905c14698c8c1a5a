//! Native plugins loaded from shared libraries.
//!
//! A native plugin library exports two C-style entry points: a constructor
//! that returns an owned `*mut dyn Plugin` and a destructor that takes it
//! back. The destructor must run while the library is still mapped, so the
//! record keeps the [`Library`] handle alive until after the instance has
//! been destroyed.
//!
//! Plugins must be built against the same host crate with the same
//! toolchain; the trait object layout behind these entry points is not a
//! stable ABI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use libloading::Library;
use tracing::debug;

use crate::plugins::{
    Plugin, PluginConstructor, PluginDestructor, PluginError, CREATE_SYMBOL, DESTROY_SYMBOL,
};
use crate::registry::CommandRegistry;

/// A plugin instance owned by the host, together with the library that
/// produced it.
pub struct NativePlugin {
    instance: *mut dyn Plugin,
    destroy: PluginDestructor,
    path: PathBuf,
    // Declared last so the handle is released only after the instance is
    // destroyed.
    _library: Library,
}

impl NativePlugin {
    /// Open a shared library and construct its plugin instance.
    ///
    /// Fails cleanly if the file cannot be opened, either entry point is
    /// missing, or the constructor returns null; nothing is left loaded in
    /// any of those cases and the same path may be retried later.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        // Safety: opening a library runs its initializers. That is inherent
        // to native plugins; the plugin contract requires them to be safe.
        let library = unsafe { Library::new(path) }.map_err(|source| PluginError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        // Safety: the symbol types must match what the plugin exported.
        // Both sides build against the same crate, which pins them.
        let constructor: PluginConstructor = unsafe {
            library
                .get::<PluginConstructor>(CREATE_SYMBOL)
                .map(|symbol| *symbol)
                .map_err(|source| PluginError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: "create_plugin",
                    source,
                })?
        };
        let destroy: PluginDestructor = unsafe {
            library
                .get::<PluginDestructor>(DESTROY_SYMBOL)
                .map(|symbol| *symbol)
                .map_err(|source| PluginError::MissingSymbol {
                    path: path.to_path_buf(),
                    symbol: "destroy_plugin",
                    source,
                })?
        };

        // Safety: the constructor hands over sole ownership of the instance.
        let instance = unsafe { constructor() };
        if instance.is_null() {
            return Err(PluginError::NullInstance {
                path: path.to_path_buf(),
            });
        }

        debug!("Opened native plugin library {}", path.display());
        Ok(Self {
            instance,
            destroy,
            path: path.to_path_buf(),
            _library: library,
        })
    }
}

impl Plugin for NativePlugin {
    fn name(&self) -> String {
        // Safety: `instance` is non-null and valid until drop.
        unsafe { (*self.instance).name() }
    }

    fn initialize(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        // Safety: `instance` is non-null, valid until drop, and exclusively
        // owned by this record.
        unsafe { (*self.instance).initialize(registry) }
    }

    fn shutdown(&mut self, registry: &mut CommandRegistry) -> Result<()> {
        // Safety: as in `initialize`.
        unsafe { (*self.instance).shutdown(registry) }
    }
}

impl Drop for NativePlugin {
    fn drop(&mut self) {
        debug!(
            "Destroying native plugin instance from {}",
            self.path.display()
        );
        // Safety: the destructor comes from the same library that built the
        // instance, and `_library` is still mapped; it closes only after
        // this body returns.
        unsafe { (self.destroy)(self.instance) };
    }
}

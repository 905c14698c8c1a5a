#[cfg(test)]
mod script_plugin_tests {
    use crucible::plugins::script::ScriptPlugin;
    use crucible::plugins::{Plugin, PluginError};
    use crucible::registry::CommandRegistry;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_greeter_plugin_full_lifecycle() {
        let dir = tempdir().unwrap();
        let script = r##"
function get_plugin_name()
    return 'greeter'
end

local witness = nil

function initialize()
    register_command('greet', 'says hi', function(args)
        witness = args[2] .. '_witness'
        register_command(witness, 'proof of a greeting', function(a) end)
    end)
end

function shutdown()
    unregister_command('greet')
    if witness then
        unregister_command(witness)
    end
end
"##;
        let path = write_script(&dir, "greeter.lua", script);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();

        let greet = registry.get_command("greet").unwrap();
        assert_eq!(greet.description(), "says hi");
        drop(greet);

        // The callback sees the command name at index 1 and the first
        // argument at index 2.
        assert!(registry.dispatch(&args(&["greet", "world"])));
        assert!(registry.get_command("world_witness").is_some());

        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("greet").is_none());
        assert!(registry.get_command("world_witness").is_none());
        assert!(!registry.unload_plugin(&path));
    }

    #[test]
    fn test_top_level_registration_swept_on_unload() {
        let dir = tempdir().unwrap();
        let script = r##"
register_command('early', 'registered at the top level', function(args) end)
"##;
        let path = write_script(&dir, "early.lua", script);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();
        assert!(registry.get_command("early").is_some());

        // No shutdown hook; the registry sweeps the command out itself.
        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("early").is_none());
    }

    #[test]
    fn test_duplicate_path_rejected_until_unloaded() {
        let dir = tempdir().unwrap();
        let path = write_script(
            &dir,
            "dup.lua",
            "register_command('dup', 'from the first load', function(args) end)",
        );

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::AlreadyLoaded { .. })
        ));
        // The rejected load must not disturb the first one's commands.
        assert!(registry.get_command("dup").is_some());
        assert_eq!(registry.plugin_paths().len(), 1);

        assert!(registry.unload_plugin(&path));
        registry.load_plugin(&path).unwrap();
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempdir().unwrap();
        let path = write_script(&dir, "plugin.txt", "x = 1");

        let mut registry = CommandRegistry::new();
        let before = registry.command_names();
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::UnsupportedExtension { .. })
        ));
        assert_eq!(registry.command_names(), before);
        assert!(registry.plugin_paths().is_empty());
    }

    #[test]
    fn test_broken_script_can_be_fixed_and_reloaded() {
        let dir = tempdir().unwrap();
        let path = write_script(&dir, "fixable.lua", "this is not lua ((");

        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::ScriptExec { .. })
        ));
        assert!(registry.plugin_paths().is_empty());

        std::fs::write(&path, "register_command('fixed', 'works now', function(args) end)")
            .unwrap();
        registry.load_plugin(&path).unwrap();
        assert!(registry.get_command("fixed").is_some());
    }

    #[test]
    fn test_callback_error_does_not_poison_the_registry() {
        let dir = tempdir().unwrap();
        let script = r##"
function initialize()
    register_command('boom', 'always fails', function(args)
        local f = nil
        f(1)
    end)
end
"##;
        let path = write_script(&dir, "boom.lua", script);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();

        // The error is reported, not propagated.
        assert!(registry.dispatch(&args(&["boom"])));
        assert!(registry.dispatch(&args(&["boom"])));
        assert!(registry.get_command("boom").is_some());

        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("boom").is_none());
    }

    #[test]
    fn test_duplicate_command_name_keeps_first() {
        let dir = tempdir().unwrap();
        let script = r##"
function initialize()
    register_command('help', 'impostor help', function(args) end)
    register_command('genuine', 'its own command', function(args) end)
end
"##;
        let path = write_script(&dir, "impostor.lua", script);

        let mut registry = CommandRegistry::new();
        crucible::commands::register_builtins(&mut registry, None).unwrap();

        // A name collision is a diagnostic, not a load failure.
        registry.load_plugin(&path).unwrap();
        let help = registry.get_command("help").unwrap();
        assert_eq!(help.description(), "List available commands");
        drop(help);
        assert!(registry.get_command("genuine").is_some());

        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("genuine").is_none());
        assert!(registry.get_command("help").is_some());
    }

    #[test]
    fn test_reload_starts_a_fresh_interpreter() {
        let dir = tempdir().unwrap();
        let script = r##"
count = 0

function initialize()
    register_command('bump', 'increments a counter', function(args)
        count = count + 1
        if count == 1 then
            register_command('first_bump', 'appears on the first bump only', function(a) end)
        end
    end)
end

function shutdown()
    unregister_command('bump')
    unregister_command('first_bump')
end
"##;
        let path = write_script(&dir, "counter.lua", script);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();
        registry.dispatch(&args(&["bump"]));
        assert!(registry.get_command("first_bump").is_some());
        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("first_bump").is_none());

        // A reload runs a brand new interpreter, so the counter restarts.
        registry.load_plugin(&path).unwrap();
        assert!(registry.get_command("first_bump").is_none());
        registry.dispatch(&args(&["bump"]));
        assert!(registry.get_command("first_bump").is_some());
    }

    #[test]
    fn test_failed_initialize_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let script = r##"
function initialize()
    register_command('early', 'registered before the failure', function(args) end)
    local boom = nil
    boom()
end
"##;
        let path = write_script(&dir, "failing.lua", script);

        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::Initialize { .. })
        ));
        assert!(registry.get_command("early").is_none());
        assert!(registry.plugin_paths().is_empty());
    }

    #[test]
    fn test_budget_aborts_runaway_top_level() {
        let dir = tempdir().unwrap();
        let path = write_script(&dir, "spin.lua", "while true do end");

        let mut registry = CommandRegistry::new();
        registry.set_script_budget(Some(Duration::from_millis(50)));

        let error = registry.load_plugin(&path).unwrap_err();
        assert!(matches!(error, PluginError::ScriptExec { .. }));
        assert!(
            error.to_string().contains("budget"),
            "unexpected error: {}",
            error
        );
    }

    #[test]
    fn test_budget_aborts_runaway_callback() {
        let dir = tempdir().unwrap();
        let script = r##"
function initialize()
    register_command('spin', 'never returns on its own', function(args)
        while true do end
    end)
end
"##;
        let path = write_script(&dir, "spinner.lua", script);

        let mut registry = CommandRegistry::new();
        registry.set_script_budget(Some(Duration::from_millis(50)));
        registry.load_plugin(&path).unwrap();

        // Returns instead of hanging; the budget error is reported.
        assert!(registry.dispatch(&args(&["spin"])));
        assert!(registry.get_command("spin").is_some());
    }

    #[test]
    fn test_name_hook_runs_on_a_fresh_budget() {
        let dir = tempdir().unwrap();
        let script = r##"
function get_plugin_name()
    local spin = 0
    for i = 1, 50000 do
        spin = spin + i
    end
    return 'deliberate'
end
"##;
        let path = write_script(&dir, "idler.lua", script);

        let plugin = ScriptPlugin::load(&path, Some(Duration::from_millis(100))).unwrap();
        std::thread::sleep(Duration::from_millis(150));

        // The loop trips the instruction hook; a clock armed on entry has
        // barely started, so the declared name comes back, not the stem.
        assert_eq!(plugin.name(), "deliberate");
    }

    #[test]
    fn test_shutdown_error_does_not_block_unload() {
        let dir = tempdir().unwrap();
        let script = r##"
function initialize()
    register_command('lingering', 'left for the sweep', function(args) end)
end

function shutdown()
    local f = nil
    f()
end
"##;
        let path = write_script(&dir, "flaky.lua", script);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();

        assert!(registry.unload_plugin(&path));
        assert!(registry.get_command("lingering").is_none());
        assert!(registry.plugin_paths().is_empty());
    }

    #[test]
    fn test_plugin_name_defaults_to_file_stem() {
        let dir = tempdir().unwrap();
        let path = write_script(
            &dir,
            "anon.lua",
            "register_command('whoami', 'from an unnamed plugin', function(args) end)",
        );

        let mut registry = CommandRegistry::new();
        registry.load_plugin(&path).unwrap();
        assert!(registry.get_command("whoami").is_some());
        assert!(registry.unload_plugin(&path));
    }
}

#[cfg(test)]
mod native_plugin_tests {
    use crucible::plugins::PluginError;
    use crucible::registry::CommandRegistry;
    use std::path::Path;
    use tempfile::tempdir;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_nonexistent_library_fails_to_open() {
        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.load_plugin(Path::new("/no/such/plugin.so")),
            Err(PluginError::Open { .. })
        ));
    }

    #[test]
    fn test_garbage_library_fails_and_path_stays_free() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.so");
        std::fs::write(&path, b"definitely not a shared object").unwrap();

        let mut registry = CommandRegistry::new();
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::Open { .. })
        ));
        // The failure recorded nothing, so a retry is another open failure
        // rather than a duplicate-path rejection.
        assert!(matches!(
            registry.load_plugin(&path),
            Err(PluginError::Open { .. })
        ));
    }

    /// Round-trips the hello demo module when one has been built.
    ///
    /// Run `cargo build` inside `demos/plugins` first and point
    /// `CRUCIBLE_HELLO_PLUGIN` at the produced shared library.
    #[test]
    fn test_demo_module_roundtrip() {
        let Ok(path) = std::env::var("CRUCIBLE_HELLO_PLUGIN") else {
            eprintln!("skipping: set CRUCIBLE_HELLO_PLUGIN to the built hello demo library");
            return;
        };
        let path = Path::new(&path);

        let mut registry = CommandRegistry::new();
        registry.load_plugin(path).unwrap();
        assert!(registry.get_command("hello").is_some());
        assert!(registry.dispatch(&args(&["hello"])));

        assert!(registry.unload_plugin(path));
        assert!(registry.get_command("hello").is_none());

        // The library can be opened again after a full unload.
        registry.load_plugin(path).unwrap();
        assert!(registry.get_command("hello").is_some());
    }
}

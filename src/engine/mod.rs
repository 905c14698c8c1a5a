//! Sandboxed Lua engine for script plugins and ad hoc evaluation.
//!
//! Every script plugin owns one isolated [`LuaEngine`] so a misbehaving
//! script cannot reach another plugin's state. The interpreter opens only
//! the `math`, `string`, and `table` standard libraries; `io`, `os`,
//! `debug`, and `package` are withheld, and the base library's chunk
//! loaders (`dofile`, `loadfile`, `load`) are stripped at startup. Two
//! host facilities are injected on top: `print`, rewired to the host's
//! stdout, and `shell.run(command)`, the single audited escape hatch that
//! runs a command line through the system shell and returns its exit
//! status.
//!
//! The library whitelist is policy, not contract; adjust
//! [`sandbox_libraries`] to widen or narrow what scripts may touch.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mlua::{Function, HookTriggers, Lua, LuaOptions, MultiValue, StdLib, Value};

/// Standard libraries opened for sandboxed interpreters.
fn sandbox_libraries() -> StdLib {
    StdLib::MATH | StdLib::STRING | StdLib::TABLE
}

/// Instructions executed between budget checks when a budget is set.
const BUDGET_CHECK_INTERVAL: u32 = 10_000;

/// A sandboxed Lua interpreter owned by one script plugin (or by the `lua`
/// built-in command).
pub struct LuaEngine {
    lua: Lua,
    budget_clock: Option<Rc<Cell<Instant>>>,
}

impl LuaEngine {
    /// Create a sandboxed interpreter.
    ///
    /// With `budget` set, an instruction-count hook aborts any script call
    /// that runs longer than the given wall-clock limit with an "execution
    /// budget exceeded" error. The clock is re-armed at every entry into
    /// script code, so idle time between calls is never billed.
    pub fn new(budget: Option<Duration>) -> Result<Self> {
        let lua = Lua::new_with(sandbox_libraries(), LuaOptions::default())
            .context("Failed to create Lua interpreter")?;

        let budget_clock = budget.map(|limit| Self::install_budget_hook(&lua, limit));

        Self::strip_loaders(&lua).context("Failed to remove Lua chunk loaders")?;
        Self::install_print(&lua).context("Failed to install print")?;
        Self::install_shell(&lua).context("Failed to install shell.run")?;

        Ok(Self { lua, budget_clock })
    }

    /// Evaluate Lua source.
    ///
    /// Used for ad hoc evaluation; the script plugin bridge drives the raw
    /// handle directly so it can name chunks after their files.
    pub fn execute(&self, source: &str) -> Result<()> {
        self.arm_budget();
        self.lua
            .load(source)
            .exec()
            .map_err(|e| anyhow::anyhow!("Lua error: {}", e))
    }

    /// Reset the budget clock. Called at every entry into script code.
    pub fn arm_budget(&self) {
        if let Some(clock) = &self.budget_clock {
            clock.set(Instant::now());
        }
    }

    /// The raw interpreter handle, used by the script plugin bridge.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Look up a global by name, returning it only if it is a function.
    #[must_use]
    pub fn global_function(&self, name: &str) -> Option<Function<'_>> {
        match self.lua.globals().get::<_, Value>(name) {
            Ok(Value::Function(function)) => Some(function),
            _ => None,
        }
    }

    fn install_budget_hook(lua: &Lua, limit: Duration) -> Rc<Cell<Instant>> {
        let clock = Rc::new(Cell::new(Instant::now()));
        let hook_clock = Rc::clone(&clock);
        lua.set_hook(
            HookTriggers {
                every_nth_instruction: Some(BUDGET_CHECK_INTERVAL),
                ..HookTriggers::default()
            },
            move |_, _| {
                if hook_clock.get().elapsed() > limit {
                    Err(mlua::Error::RuntimeError(format!(
                        "execution budget of {:?} exceeded",
                        limit
                    )))
                } else {
                    Ok(())
                }
            },
        );
        clock
    }

    /// Remove the base library's chunk loaders.
    ///
    /// The base library comes with the interpreter no matter which
    /// [`StdLib`] flags are passed, and `dofile`, `loadfile`, and `load`
    /// read and run arbitrary files. Only those three are removed; the
    /// rest of the base library stays.
    fn strip_loaders(lua: &Lua) -> mlua::Result<()> {
        lua.load(
            r#"
            dofile = nil
            loadfile = nil
            load = nil
        "#,
        )
        .exec()
    }

    fn install_print(lua: &Lua) -> mlua::Result<()> {
        let print = lua.create_function(|_, args: MultiValue| {
            let line = args
                .into_iter()
                .map(|value| display_value(&value))
                .collect::<Vec<_>>()
                .join("\t");
            println!("{}", line);
            Ok(())
        })?;
        lua.globals().set("print", print)
    }

    fn install_shell(lua: &Lua) -> mlua::Result<()> {
        let run = lua.create_function(|_, command_line: String| {
            crate::shell::run_status(&command_line).map_err(mlua::Error::external)
        })?;
        let shell = lua.create_table()?;
        shell.set("run", run)?;
        lua.globals().set("shell", shell)
    }
}

/// Lua-flavored rendering for `print` arguments.
fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().into_owned(),
        other => format!("{:?}", other),
    }
}

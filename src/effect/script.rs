//! Script Language
//!
//! Techniques and passes carry a `Script` annotation: a semicolon delimited
//! list of `Key=Value` commands that sequence render target switches, clears,
//! loops, passes and draws.
//!
//! ```text
//! RenderColorTarget0=ScnMap; RenderDepthStencilTarget=DepthBuffer;
//! ClearSetColor=ClearColor; Clear=Color;
//! LoopByCount=Count; LoopGetIndex=Index; Pass=Blur; LoopEnd=;
//! ```
//!
//! Parsing happens once per technique or pass. Execution walks the command
//! list with a [`LoopCounter`] stack that belongs to one execution, never to
//! the technique itself, so the same technique can run several times in a
//! frame.

use std::fmt;

/// Command kinds recognized by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptCommandType {
    /// Switch color attachment `N` (0..=3).
    SetRenderColorTarget(u8),
    SetRenderDepthStencilTarget,
    ClearSetColor,
    ClearSetDepth,
    Clear,
    ScriptExternal,
    ExecutePass,
    LoopByCount,
    LoopGetIndex,
    LoopEnd,
    Draw,
}

impl ScriptCommandType {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "RenderColorTarget" | "RenderColorTarget0" => Self::SetRenderColorTarget(0),
            "RenderColorTarget1" => Self::SetRenderColorTarget(1),
            "RenderColorTarget2" => Self::SetRenderColorTarget(2),
            "RenderColorTarget3" => Self::SetRenderColorTarget(3),
            "RenderDepthStencilTarget" => Self::SetRenderDepthStencilTarget,
            "ClearSetColor" => Self::ClearSetColor,
            "ClearSetDepth" => Self::ClearSetDepth,
            "Clear" => Self::Clear,
            "ScriptExternal" => Self::ScriptExternal,
            "Pass" => Self::ExecutePass,
            "LoopByCount" => Self::LoopByCount,
            "LoopGetIndex" => Self::LoopGetIndex,
            "LoopEnd" => Self::LoopEnd,
            "Draw" => Self::Draw,
            _ => return None,
        })
    }

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::SetRenderColorTarget(0) => "RenderColorTarget0",
            Self::SetRenderColorTarget(1) => "RenderColorTarget1",
            Self::SetRenderColorTarget(2) => "RenderColorTarget2",
            Self::SetRenderColorTarget(_) => "RenderColorTarget3",
            Self::SetRenderDepthStencilTarget => "RenderDepthStencilTarget",
            Self::ClearSetColor => "ClearSetColor",
            Self::ClearSetDepth => "ClearSetDepth",
            Self::Clear => "Clear",
            Self::ScriptExternal => "ScriptExternal",
            Self::ExecutePass => "Pass",
            Self::LoopByCount => "LoopByCount",
            Self::LoopGetIndex => "LoopGetIndex",
            Self::LoopEnd => "LoopEnd",
            Self::Draw => "Draw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptCommand {
    pub ty: ScriptCommandType,
    pub argument: String,
}

impl fmt::Display for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={};", self.ty.key(), self.argument)
    }
}

/// A parsed command list plus the implicit clear markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub commands: Vec<ScriptCommand>,
    /// Index of the first `Pass` reached after the color target was reset
    /// to the viewport without a `Clear=Color`.
    pub clear_color_index: Option<usize>,
    /// Same as `clear_color_index` for depth.
    pub clear_depth_index: Option<usize>,
    pub has_script_external: bool,
}

impl Script {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ScriptCommand> {
        self.commands.get(index)
    }

    /// Serializes the command list back into script source.
    #[must_use]
    pub fn to_source(&self) -> String {
        self.commands.iter().map(ToString::to_string).collect()
    }
}

/// Parses script source.
///
/// Unknown keys and segments without `=` are skipped. A trailing segment
/// without a terminating `;` is accepted.
#[must_use]
pub fn parse_script(source: &str) -> Script {
    let mut script = Script::default();
    let mut viewport_color_cleared = true;
    let mut viewport_depth_cleared = true;

    for segment in source.split(';') {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let Some(ty) = ScriptCommandType::from_key(key.trim()) else {
            log::trace!("Unknown script key \"{}\" is ignored", key.trim());
            continue;
        };
        let argument = if ty == ScriptCommandType::LoopEnd {
            String::new()
        } else {
            value.trim().to_string()
        };

        match ty {
            ScriptCommandType::SetRenderColorTarget(0) if argument.is_empty() => {
                viewport_color_cleared = false;
                viewport_depth_cleared = false;
            }
            ScriptCommandType::Clear if argument == "Color" => viewport_color_cleared = true,
            ScriptCommandType::Clear if argument == "Depth" => viewport_depth_cleared = true,
            ScriptCommandType::ScriptExternal => script.has_script_external = true,
            ScriptCommandType::ExecutePass => {
                let index = script.commands.len();
                if !viewport_color_cleared && script.clear_color_index.is_none() {
                    script.clear_color_index = Some(index);
                }
                if !viewport_depth_cleared && script.clear_depth_index.is_none() {
                    script.clear_depth_index = Some(index);
                }
            }
            _ => {}
        }
        script.commands.push(ScriptCommand { ty, argument });
    }
    script
}

/// Builds the implicit technique script that runs every pass in order.
#[must_use]
pub fn default_technique_script<'a>(pass_names: impl IntoIterator<Item = &'a str>) -> String {
    pass_names
        .into_iter()
        .map(|name| format!("Pass={name};"))
        .collect()
}

/// Implicit script of a pass without a `Script` annotation.
pub const DEFAULT_PASS_SCRIPT: &str = "Draw=Geometry;";

// ─── Interpreter ─────────────────────────────────────────────────────────────

/// One active `LoopByCount` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopCounter {
    pub name: String,
    /// Number of iterations.
    pub last: usize,
    /// Current iteration.
    pub offset: usize,
    /// Index of the `LoopByCount` command.
    pub goto: usize,
}

/// Whether the interpreter keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlow {
    Continue,
    Stop,
}

/// Receives the commands an interpreter run does not handle itself.
pub trait ScriptHost {
    /// Runs `command`. Loop commands never reach this method.
    fn run_command(&mut self, index: usize, command: &ScriptCommand) -> ScriptFlow;

    /// Iteration count of the parameter `name`.
    fn loop_count(&mut self, name: &str) -> Option<usize>;

    /// Stores the current iteration into the parameter `name`.
    fn set_loop_index(&mut self, name: &str, index: usize);
}

/// Outcome of [`run_script`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRun {
    /// Index of the command that stopped the run, or the script length.
    pub stopped_at: usize,
    pub completed: bool,
}

/// Executes `script` from `start` until it ends or the host stops it.
///
/// Commands inside a loop whose count is zero are skipped. `LoopEnd` with an
/// empty counter stack is logged and ignored.
pub fn run_script(
    script: &Script,
    start: usize,
    counters: &mut Vec<LoopCounter>,
    host: &mut dyn ScriptHost,
) -> ScriptRun {
    let mut index = start;
    while let Some(command) = script.get(index) {
        let skipping = counters.last().is_some_and(|counter| counter.last == 0);
        match command.ty {
            ScriptCommandType::LoopByCount => {
                let count = if skipping {
                    0
                } else {
                    host.loop_count(&command.argument).unwrap_or_else(|| {
                        log::warn!(
                            "Loop counter \"{}\" cannot be resolved; the loop is skipped",
                            command.argument
                        );
                        0
                    })
                };
                counters.push(LoopCounter {
                    name: command.argument.clone(),
                    last: count,
                    offset: 0,
                    goto: index,
                });
            }
            ScriptCommandType::LoopEnd => match counters.last_mut() {
                Some(counter) => {
                    counter.offset += 1;
                    if counter.offset < counter.last {
                        index = counter.goto;
                    } else {
                        counters.pop();
                    }
                }
                None => log::warn!("LoopEnd at {index} has no matching LoopByCount"),
            },
            _ if skipping => {}
            ScriptCommandType::LoopGetIndex => match counters.last() {
                Some(counter) => {
                    let offset = counter.offset;
                    host.set_loop_index(&command.argument, offset);
                }
                None => log::warn!(
                    "LoopGetIndex=\"{}\" at {index} is outside of any loop",
                    command.argument
                ),
            },
            _ => {
                if host.run_command(index, command) == ScriptFlow::Stop {
                    return ScriptRun {
                        stopped_at: index,
                        completed: false,
                    };
                }
            }
        }
        index += 1;
    }
    ScriptRun {
        stopped_at: script.len(),
        completed: true,
    }
}

//! Line-oriented pointer scripts that stand in for a live joystick.
//!
//! ```text
//! # comment
//! move 150 75
//! wait 500ms
//! reset
//! stop
//! ```

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use session::PointerEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Pointer(PointerEvent),
    Wait(Duration),
    Stop,
}

pub fn parse_script(input: &str) -> Result<Vec<ScriptStep>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((index + 1, line))
        })
        .map(|(number, line)| {
            parse_step(line).with_context(|| format!("script line {number}: '{line}'"))
        })
        .collect()
}

fn parse_step(line: &str) -> Result<ScriptStep> {
    let mut words = line.split_whitespace();
    let keyword = words.next().unwrap_or_default().to_ascii_lowercase();
    let step = match keyword.as_str() {
        "move" => {
            let x = parse_coordinate(words.next(), "x")?;
            let y = parse_coordinate(words.next(), "y")?;
            ScriptStep::Pointer(PointerEvent::Moved { x, y })
        }
        "reset" => ScriptStep::Pointer(PointerEvent::Reset),
        "stop" => ScriptStep::Stop,
        "wait" => {
            let rest: Vec<&str> = words.by_ref().collect();
            if rest.is_empty() {
                bail!("wait requires a duration");
            }
            let duration = humantime::parse_duration(&rest.join(" "))
                .map_err(|err| anyhow!("invalid wait duration: {err}"))?;
            return Ok(ScriptStep::Wait(duration));
        }
        other => bail!("unknown script command '{other}'; expected move, reset, wait, or stop"),
    };
    if let Some(extra) = words.next() {
        bail!("unexpected trailing argument '{extra}'");
    }
    Ok(step)
}

fn parse_coordinate(value: Option<&str>, axis: &str) -> Result<f32> {
    let value = value.ok_or_else(|| anyhow!("move requires {axis} coordinate"))?;
    let parsed: f32 = value
        .parse()
        .map_err(|_| anyhow!("invalid {axis} coordinate '{value}'"))?;
    if !parsed.is_finite() {
        bail!("{axis} coordinate must be finite");
    }
    Ok(parsed)
}

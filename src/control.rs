// src/control.rs

//! Line-oriented control console.
//!
//! After startup the process reads commands such as `start dev`,
//! `stop dev tests` or `status` from stdin, one per line.

use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start(Vec<String>),
    Stop(Vec<String>),
    Clean(Vec<String>),
    /// An empty id list resets every watched build.
    Reset(Vec<String>),
    Status,
    BuildOnce(Vec<String>),
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start <id>...       start watching builds
  stop <id>...        stop watching builds
  clean <id>...       delete build outputs (watch keeps running)
  reset [<id>...]     clean, stop and start again with fresh config
  status              list watched builds
  build-once <id>...  compile builds once without watching
  help                show this text
  quit                stop everything and exit";

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };
        let ids: Vec<String> = words.map(str::to_string).collect();

        match verb.to_lowercase().as_str() {
            "start" => with_ids(verb, ids, ControlCommand::Start),
            "stop" => with_ids(verb, ids, ControlCommand::Stop),
            "clean" => with_ids(verb, ids, ControlCommand::Clean),
            "build-once" | "once" => with_ids(verb, ids, ControlCommand::BuildOnce),
            "reset" => Ok(ControlCommand::Reset(ids)),
            "status" => Ok(ControlCommand::Status),
            "help" | "?" => Ok(ControlCommand::Help),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(format!("unknown command `{other}` (try `help`)")),
        }
    }
}

fn with_ids(
    verb: &str,
    ids: Vec<String>,
    cmd: fn(Vec<String>) -> ControlCommand,
) -> Result<ControlCommand, String> {
    if ids.is_empty() {
        Err(format!("`{verb}` needs at least one build id"))
    } else {
        Ok(cmd(ids))
    }
}

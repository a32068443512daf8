//! Line commands accepted on stdin while watching.

use std::str::FromStr;

/// A control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Enable,
    Disable,
    Toggle,
    Status,
    Rescan,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enable" | "on" => Ok(Self::Enable),
            "disable" | "off" => Ok(Self::Disable),
            "toggle" => Ok(Self::Toggle),
            "status" => Ok(Self::Status),
            "rescan" => Ok(Self::Rescan),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!(
                "unknown command '{other}' (expected enable, disable, toggle, status, rescan, quit)"
            )),
        }
    }
}

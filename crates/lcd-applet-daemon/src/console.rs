//! Emulator command console.
//!
//! Reads one command per line from stdin and drives the emulated display
//! manager, the way a user would plug panels in and press buttons.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread::JoinHandle;

use lcd_applet_hw::{Buttons, DeviceClass, EmulatorControl};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::snapshot::write_snapshots;

const HELP: &str = "commands: attach <class>, detach <class>, enable, disable, close, \
service up|down, press <class> <buttons>, release <class>, terminate, snapshot, help";

/// Errors from parsing a console line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("unknown device class: {0}")]
    InvalidClass(String),

    #[error("invalid button list: {0}")]
    InvalidButtons(String),

    #[error("expected 'up' or 'down', got {0}")]
    InvalidServiceState(String),
}

/// One console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Attach(DeviceClass),
    Detach(DeviceClass),
    Enable,
    Disable,
    Close,
    Service(bool),
    Press(DeviceClass, Buttons),
    Release(DeviceClass),
    Terminate,
    Snapshot,
    Help,
}

fn parse_class(arg: Option<&str>) -> Result<DeviceClass, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument("class"))?;
    arg.parse()
        .map_err(|_| CommandError::InvalidClass(arg.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;

        match name.to_lowercase().as_str() {
            "attach" | "plug" => Ok(Command::Attach(parse_class(words.next())?)),
            "detach" | "unplug" => Ok(Command::Detach(parse_class(words.next())?)),
            "enable" => Ok(Command::Enable),
            "disable" => Ok(Command::Disable),
            "close" => Ok(Command::Close),
            "service" => match words.next() {
                Some("up") | Some("start") => Ok(Command::Service(true)),
                Some("down") | Some("stop") => Ok(Command::Service(false)),
                Some(other) => Err(CommandError::InvalidServiceState(other.to_string())),
                None => Err(CommandError::MissingArgument("up|down")),
            },
            "press" => {
                let class = parse_class(words.next())?;
                let list = words.next().ok_or(CommandError::MissingArgument("buttons"))?;
                let buttons =
                    Buttons::parse(list).ok_or_else(|| CommandError::InvalidButtons(list.to_string()))?;
                Ok(Command::Press(class, buttons))
            }
            "release" => Ok(Command::Release(parse_class(words.next())?)),
            "terminate" | "quit" => Ok(Command::Terminate),
            "snapshot" => Ok(Command::Snapshot),
            "help" | "?" => Ok(Command::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl Command {
    /// Runs the command against the emulator.
    pub fn apply(&self, control: &EmulatorControl, snapshot_dir: &Path) {
        match *self {
            Command::Attach(class) => control.attach(class),
            Command::Detach(class) => control.detach(class),
            Command::Enable => control.set_applet_enabled(true),
            Command::Disable => control.set_applet_enabled(false),
            Command::Close => control.close_connection(),
            Command::Service(up) => control.set_service_available(up),
            Command::Press(class, buttons) => control.press(class, buttons),
            Command::Release(class) => control.release(class),
            Command::Terminate => control.terminate_applet(),
            Command::Snapshot => match write_snapshots(control, snapshot_dir) {
                Ok(paths) if paths.is_empty() => info!("No frames submitted yet"),
                Ok(_) => {}
                Err(e) => warn!("Snapshot failed: {:#}", e),
            },
            Command::Help => info!("{}", HELP),
        }
    }
}

/// Starts the console on its own thread. The thread ends at end of input.
pub fn spawn(control: EmulatorControl, snapshot_dir: PathBuf) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("lcd-console".to_string())
        .spawn(move || {
            info!("Emulator console ready ({})", HELP);
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Console read error: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        debug!("Console command: {:?}", command);
                        command.apply(&control, &snapshot_dir);
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            debug!("Console input closed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcd_applet_hw::{Driver, Emulator};

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "attach mono".parse::<Command>(),
            Ok(Command::Attach(DeviceClass::Monochrome))
        );
        assert_eq!(
            "detach color".parse::<Command>(),
            Ok(Command::Detach(DeviceClass::Color))
        );
        assert_eq!("service down".parse::<Command>(), Ok(Command::Service(false)));
        assert_eq!(
            "press qvga left+ok".parse::<Command>(),
            Ok(Command::Press(DeviceClass::Color, Buttons::LEFT | Buttons::OK))
        );
        assert_eq!(
            "release monochrome".parse::<Command>(),
            Ok(Command::Release(DeviceClass::Monochrome))
        );
        assert_eq!("  Terminate ".parse::<Command>(), Ok(Command::Terminate));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "attach".parse::<Command>(),
            Err(CommandError::MissingArgument("class"))
        );
        assert_eq!(
            "attach plasma".parse::<Command>(),
            Err(CommandError::InvalidClass("plasma".to_string()))
        );
        assert_eq!(
            "press mono jump".parse::<Command>(),
            Err(CommandError::InvalidButtons("jump".to_string()))
        );
        assert_eq!(
            "service sideways".parse::<Command>(),
            Err(CommandError::InvalidServiceState("sideways".to_string()))
        );
        assert_eq!(
            "reboot".parse::<Command>(),
            Err(CommandError::Unknown("reboot".to_string()))
        );
    }

    #[test]
    fn test_apply_drives_emulator() {
        let mut emulator = Emulator::new();
        emulator.init().unwrap();
        let control = emulator.control();
        let dir = std::env::temp_dir();

        Command::Attach(DeviceClass::Color).apply(&control, &dir);
        Command::Attach(DeviceClass::Monochrome).apply(&control, &dir);
        assert_eq!(
            control.attached(),
            vec![DeviceClass::Monochrome, DeviceClass::Color]
        );

        Command::Detach(DeviceClass::Color).apply(&control, &dir);
        assert_eq!(control.attached(), vec![DeviceClass::Monochrome]);

        Command::Service(false).apply(&control, &dir);
        assert!(emulator.connect(&lcd_applet_hw::ConnectContext {
            name: "console test".to_string(),
            autostartable: false,
            capabilities: lcd_applet_hw::Capabilities::MONOCHROME,
            on_notify: None,
        })
        .is_err());
    }
}

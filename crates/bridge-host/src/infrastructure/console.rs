//! Line-based control console for the headless host.
//!
//! Stands in for the tray menu and the global hotkey: each line on stdin is
//! one command. Input commands (`key`, `move`, ...) are pushed through the
//! [`ChannelInputSource`], so they travel the same path as captured input.
//!
//! ```text
//! remote            switch input to the client
//! local             switch input back to this machine
//! release           emergency release (always returns to local)
//! status            print connection state, routing mode, latency
//! key <vk>          tap a key (virtual-key code, decimal or 0x hex)
//! move <dx> <dy>    move the pointer
//! click <button>    click left|right|middle|x1|x2
//! scroll <delta>    turn the wheel
//! quit              shut down
//! ```

use std::sync::Arc;

use bridge_core::MouseButton;
use bridge_net::ConnectionState;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::application::route_input::{InputRouter, RoutingMode};
use crate::infrastructure::input_capture::channel::ChannelInputSource;
use crate::infrastructure::input_capture::RawInputEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Switch(RoutingMode),
    Release,
    Status,
    Key(i32),
    Move(i32, i32),
    Click(MouseButton),
    Scroll(i32),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` takes no arguments")]
    TakesNoArguments(String),
    #[error("`{command}` expects {expected}")]
    BadArguments {
        command: &'static str,
        expected: &'static str,
    },
}

/// Parses one console line. Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands or malformed arguments.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let bad = |command, expected| CommandError::BadArguments { command, expected };

    let verb = verb.to_ascii_lowercase();
    let command = match (verb.as_str(), args.as_slice()) {
        ("remote", []) => ConsoleCommand::Switch(RoutingMode::Remote),
        ("local", []) => ConsoleCommand::Switch(RoutingMode::Local),
        ("release", []) => ConsoleCommand::Release,
        ("status", []) => ConsoleCommand::Status,
        ("help" | "?", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("key", [vk]) => ConsoleCommand::Key(parse_int(vk).ok_or(bad("key", "a key code"))?),
        ("move", [dx, dy]) => match (parse_int(dx), parse_int(dy)) {
            (Some(dx), Some(dy)) => ConsoleCommand::Move(dx, dy),
            _ => return Err(bad("move", "two integers")),
        },
        ("click", [button]) => {
            ConsoleCommand::Click(parse_button(button).ok_or(bad("click", BUTTONS))?)
        }
        ("scroll", [delta]) => {
            ConsoleCommand::Scroll(parse_int(delta).ok_or(bad("scroll", "an integer"))?)
        }
        ("key", _) => return Err(bad("key", "a key code")),
        ("move", _) => return Err(bad("move", "two integers")),
        ("click", _) => return Err(bad("click", BUTTONS)),
        ("scroll", _) => return Err(bad("scroll", "an integer")),
        ("remote" | "local" | "release" | "status" | "help" | "?" | "quit" | "exit", _) => {
            return Err(CommandError::TakesNoArguments(verb.clone()))
        }
        _ => return Err(CommandError::Unknown(verb.clone())),
    };
    Ok(Some(command))
}

const BUTTONS: &str = "left|right|middle|x1|x2";

fn parse_int(text: &str) -> Option<i32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn parse_button(text: &str) -> Option<MouseButton> {
    match text.to_ascii_lowercase().as_str() {
        "left" => Some(MouseButton::Left),
        "right" => Some(MouseButton::Right),
        "middle" => Some(MouseButton::Middle),
        "x1" => Some(MouseButton::X1),
        "x2" => Some(MouseButton::X2),
        _ => None,
    }
}

/// What the console needs to act on commands.
pub struct Console {
    pub router: Arc<Mutex<InputRouter>>,
    pub source: Arc<ChannelInputSource>,
    pub state: watch::Receiver<ConnectionState>,
    pub latency: watch::Receiver<Option<u32>>,
}

impl Console {
    /// Reads commands from `input` until end of input, `quit`, or `cancel`.
    /// `quit` cancels `cancel`.
    pub async fn run<R>(&self, input: R, cancel: CancellationToken)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "console input failed");
                    break;
                }
            };
            match parse_command(&line) {
                Ok(Some(ConsoleCommand::Quit)) => {
                    cancel.cancel();
                    break;
                }
                Ok(Some(command)) => self.execute(command).await,
                Ok(None) => {}
                Err(e) => println!("{e}"),
            }
        }
        debug!("console closed");
    }

    /// Carries out one command.
    pub async fn execute(&self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Switch(mode) => {
                if let Err(e) = self.router.lock().await.switch_mode(mode).await {
                    println!("switch to {mode} failed: {e}");
                }
            }
            ConsoleCommand::Release => self.router.lock().await.emergency_release().await,
            ConsoleCommand::Status => {
                let mode = self.router.lock().await.mode();
                let state = *self.state.borrow();
                match *self.latency.borrow() {
                    Some(ms) => println!("{state}, routing {mode}, latency {ms} ms"),
                    None => println!("{state}, routing {mode}"),
                }
            }
            ConsoleCommand::Key(vk_code) => self.inject(&[
                RawInputEvent::KeyDown { vk_code },
                RawInputEvent::KeyUp { vk_code },
            ]),
            ConsoleCommand::Move(dx, dy) => self.inject(&[RawInputEvent::MouseMove { dx, dy }]),
            ConsoleCommand::Click(button) => self.inject(&[
                RawInputEvent::MouseButtonDown { button },
                RawInputEvent::MouseButtonUp { button },
            ]),
            ConsoleCommand::Scroll(delta) => self.inject(&[RawInputEvent::MouseWheel { delta }]),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => {}
        }
    }

    fn inject(&self, events: &[RawInputEvent]) {
        for event in events {
            if let Err(e) = self.source.inject(*event) {
                warn!(error = %e, "console input not delivered");
                return;
            }
        }
    }
}

const HELP: &str = "\
commands: remote | local | release | status | key <vk> | move <dx> <dy> | \
click <left|right|middle|x1|x2> | scroll <delta> | quit";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::InputSource;

    #[test]
    fn test_parse_mode_and_control_commands() {
        assert_eq!(
            parse_command("remote"),
            Ok(Some(ConsoleCommand::Switch(RoutingMode::Remote)))
        );
        assert_eq!(
            parse_command("  LOCAL "),
            Ok(Some(ConsoleCommand::Switch(RoutingMode::Local)))
        );
        assert_eq!(parse_command("release"), Ok(Some(ConsoleCommand::Release)));
        assert_eq!(parse_command("quit"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_parse_input_commands() {
        assert_eq!(parse_command("key 0x41"), Ok(Some(ConsoleCommand::Key(0x41))));
        assert_eq!(parse_command("key 65"), Ok(Some(ConsoleCommand::Key(65))));
        assert_eq!(parse_command("move -5 12"), Ok(Some(ConsoleCommand::Move(-5, 12))));
        assert_eq!(
            parse_command("click Right"),
            Ok(Some(ConsoleCommand::Click(MouseButton::Right)))
        );
        assert_eq!(parse_command("scroll -120"), Ok(Some(ConsoleCommand::Scroll(-120))));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(parse_command("jump"), Err(CommandError::Unknown(_))));
        assert!(matches!(
            parse_command("move 1"),
            Err(CommandError::BadArguments { command: "move", .. })
        ));
        assert!(matches!(
            parse_command("click sideways"),
            Err(CommandError::BadArguments { command: "click", .. })
        ));
        assert!(matches!(
            parse_command("remote now"),
            Err(CommandError::TakesNoArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_console_key_command_injects_press_and_release() {
        // Arrange
        let source = Arc::new(ChannelInputSource::new());
        let mut captured = source.start().expect("start");
        let (router, _notices) = InputRouter::new(source.clone());
        let (_state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (_latency_tx, latency) = watch::channel(None);
        let console = Console {
            router: Arc::new(Mutex::new(router)),
            source,
            state,
            latency,
        };

        // Act
        console
            .run(&b"key 0x20\nquit\nkey 0x21\n"[..], CancellationToken::new())
            .await;

        // Assert – nothing after `quit` is executed
        assert_eq!(
            captured.try_recv().ok(),
            Some(RawInputEvent::KeyDown { vk_code: 0x20 })
        );
        assert_eq!(
            captured.try_recv().ok(),
            Some(RawInputEvent::KeyUp { vk_code: 0x20 })
        );
        assert!(captured.try_recv().is_err());
    }
}

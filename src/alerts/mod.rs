use std::io::Write;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::AlertConfig;
use crate::signal::Signal;

/// Sound and voice notification for tradeable signals. Fire-and-forget.
pub trait AlertEmitter: Send + Sync {
    fn notify(&self, signal: Signal);
}

/// Terminal bell plus a log line.
#[derive(Debug, Default)]
pub struct LogAlert;

impl AlertEmitter for LogAlert {
    fn notify(&self, signal: Signal) {
        info!("🔔 {} SIGNAL, prepare the entry", signal);
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

/// Runs an optional sound command and an optional speech command.
///
/// Both are split on whitespace; the speech command receives the message as
/// its final argument (e.g. `espeak -v pt-br` or `say`).
pub struct CommandAlert {
    sound: Option<Vec<String>>,
    speech: Option<Vec<String>>,
    buy_message: String,
    sell_message: String,
}

impl CommandAlert {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            sound: config.sound_command.as_deref().and_then(split_command),
            speech: config.speech_command.as_deref().and_then(split_command),
            buy_message: config.buy_message.clone(),
            sell_message: config.sell_message.clone(),
        }
    }

    pub fn message_for(&self, signal: Signal) -> Option<&str> {
        match signal {
            Signal::Buy => Some(&self.buy_message),
            Signal::Sell => Some(&self.sell_message),
            Signal::Wait => None,
        }
    }

    fn spawn(argv: &[String], extra: Option<&str>) {
        let Some((program, args)) = argv.split_first() else {
            return;
        };
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(extra) = extra {
            command.arg(extra);
        }

        match command.spawn() {
            Ok(mut child) => {
                let program = program.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            warn!("⚠️ Alert command `{}` exited with {}", program, status)
                        }
                        Err(e) => warn!("⚠️ Alert command `{}` failed: {}", program, e),
                        _ => {}
                    }
                });
            }
            Err(e) => warn!("⚠️ Could not start alert command `{}`: {}", program, e),
        }
    }
}

impl AlertEmitter for CommandAlert {
    fn notify(&self, signal: Signal) {
        let Some(message) = self.message_for(signal) else {
            return;
        };
        info!("🔔 {} SIGNAL: {}", signal, message);

        if let Some(sound) = &self.sound {
            Self::spawn(sound, None);
        }
        if let Some(speech) = &self.speech {
            Self::spawn(speech, Some(message));
        }
    }
}

fn split_command(raw: &str) -> Option<Vec<String>> {
    let argv: Vec<String> = raw.split_whitespace().map(ToString::to_string).collect();
    if argv.is_empty() {
        None
    } else {
        Some(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(speech: Option<&str>) -> AlertConfig {
        AlertConfig {
            sound_command: Some("   ".to_string()),
            speech_command: speech.map(ToString::to_string),
            buy_message: "buy now".to_string(),
            sell_message: "sell now".to_string(),
        }
    }

    #[test]
    fn test_blank_commands_are_ignored() {
        let alert = CommandAlert::new(&config(None));
        assert!(alert.sound.is_none());
        assert!(alert.speech.is_none());
    }

    #[test]
    fn test_messages_per_signal() {
        let alert = CommandAlert::new(&config(Some("say -r 200")));
        assert_eq!(alert.speech.as_deref(), Some(&["say".to_string(), "-r".into(), "200".into()][..]));
        assert_eq!(alert.message_for(Signal::Buy), Some("buy now"));
        assert_eq!(alert.message_for(Signal::Sell), Some("sell now"));
        assert_eq!(alert.message_for(Signal::Wait), None);
    }

    #[tokio::test]
    async fn test_missing_program_does_not_panic() {
        let alert = CommandAlert::new(&config(Some("definitely-not-a-tts-engine-xyz")));
        alert.notify(Signal::Buy);
        alert.notify(Signal::Wait);
    }
}

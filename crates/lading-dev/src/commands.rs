//! Operator commands.
//!
//! Interactive sessions accept exactly two commands, one per line:
//! `restart` tears the build session down and rebuilds from scratch,
//! `stop` ends the process cleanly. Anything else re-prompts.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::DevResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Restart,
    Stop,
}

impl Command {
    /// Parse one input line; `None` means re-prompt.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "restart" => Some(Command::Restart),
            "stop" => Some(Command::Stop),
            _ => None,
        }
    }
}

/// Consume `input` line by line, forwarding parsed commands.
///
/// The loop exits on `stop`, on end of input, or when the receiving side
/// of the channel is gone.
pub async fn command_loop<R>(input: R, commands: mpsc::Sender<Command>) -> DevResult<()>
where
    R: AsyncBufRead + Unpin,
{
    tracing::info!("commands: restart | stop");

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Some(command) => {
                let stop = command == Command::Stop;
                if commands.send(command).await.is_err() {
                    break;
                }
                if stop {
                    break;
                }
            }
            None => {
                if !line.trim().is_empty() {
                    tracing::warn!(input = %line.trim(), "unrecognized command");
                }
                tracing::info!("commands: restart | stop");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("restart"), Some(Command::Restart));
        assert_eq!(Command::parse("  STOP  "), Some(Command::Stop));
        assert_eq!(Command::parse("quit"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn test_loop_forwards_commands_and_exits_on_stop() {
        let input: &[u8] = b"nonsense\nrestart\nstop\nrestart\n";
        let (tx, mut rx) = mpsc::channel(8);

        command_loop(input, tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(Command::Restart));
        assert_eq!(rx.recv().await, Some(Command::Stop));
        // Nothing after stop: the loop exited before the trailing restart
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_loop_ends_at_end_of_input() {
        let input: &[u8] = b"invalid\n";
        let (tx, mut rx) = mpsc::channel(8);

        command_loop(input, tx).await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}

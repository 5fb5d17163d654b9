use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

/// User-initiated transport commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportCommand {
    Next,
    Previous,
    TogglePause,
}

/// Single-slot mailbox between the transport controller and the
/// synchronizer. The newest unconsumed command replaces any older one.
#[derive(Clone, Debug)]
pub struct CommandSlot {
    tx: Sender<TransportCommand>,
    rx: Receiver<TransportCommand>,
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSlot {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Never blocks.
    pub fn send(&self, cmd: TransportCommand) {
        let mut cmd = cmd;
        loop {
            match self.tx.try_send(cmd) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) => {
                    if let Ok(stale) = self.rx.try_recv() {
                        log::debug!("{:?} replaced unconsumed {:?}", rejected, stale);
                    }
                    cmd = rejected;
                }
                // Unreachable while this slot holds a receiver.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    pub fn take(&self) -> Option<TransportCommand> {
        self.rx.try_recv().ok()
    }

    pub fn wait(&self, timeout: Duration) -> Option<TransportCommand> {
        match self.rx.recv_timeout(timeout) {
            Ok(cmd) => Some(cmd),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

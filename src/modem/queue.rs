use super::guard;
use super::session::Session;
use crate::error::{ModemError, ModemResult};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub(crate) struct PendingCommand {
    pub(crate) text: String,
    pub(crate) queued_at: Instant,
}

// The one command currently awaiting its terminal reply. The session holds
// `Option<OutstandingExchange>`; `Some` is the write lock.
#[derive(Debug, Clone)]
pub(crate) struct OutstandingExchange {
    pub(crate) command: String,
    pub(crate) issued_at: Instant,
}

// FIFO of commands waiting for the link. Unbounded unless a limit is set.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    items: VecDeque<PendingCommand>,
    limit: Option<usize>,
}

impl CommandQueue {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            limit,
        }
    }

    pub(crate) fn push(&mut self, text: String) -> ModemResult<()> {
        self.ensure_room(1)?;
        self.items.push_back(PendingCommand {
            text,
            queued_at: Instant::now(),
        });
        Ok(())
    }

    // Queue a command sequence atomically: either all of it fits or none is queued.
    pub(crate) fn push_all(&mut self, commands: Vec<String>) -> ModemResult<()> {
        self.ensure_room(commands.len())?;
        let now = Instant::now();
        self.items.extend(commands.into_iter().map(|text| PendingCommand {
            text,
            queued_at: now,
        }));
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Option<PendingCommand> {
        self.items.pop_front()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn ensure_room(&self, extra: usize) -> ModemResult<()> {
        match self.limit {
            Some(limit) if self.items.len() + extra > limit => {
                Err(ModemError::QueueFull(self.items.len()))
            }
            _ => Ok(()),
        }
    }
}

impl Session {
    // Send the next queued command unless an exchange is still outstanding.
    pub(crate) fn try_send(&mut self) {
        if self.outstanding.is_some() {
            return;
        }
        let Some(next) = guard(&self.shared.commands).pop() else {
            return;
        };

        info!(command = %next.text, "writing command");
        debug!(
            queued_ms = next.queued_at.elapsed().as_millis() as u64,
            "command left queue"
        );
        let wire = format!("{}\r\n", next.text);
        if let Err(err) = self.transport.write(wire.as_bytes()) {
            // Leave the exchange outstanding; the watchdog recovers the link.
            warn!(command = %next.text, error = %err, "writing command failed");
        }

        let now = Instant::now();
        self.outstanding = Some(OutstandingExchange {
            command: next.text.clone(),
            issued_at: now,
        });
        self.last_command = next.text;
        self.last_command_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::session::testing::{fast_config, test_session};

    #[test]
    fn queue_is_fifo() {
        let mut queue = CommandQueue::new(None);
        queue.push("AT".into()).unwrap();
        queue.push_all(vec!["AT+GSN".into(), "AT+CGNSPWR=1".into()]).unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().text, "AT");
        assert_eq!(queue.pop().unwrap().text, "AT+GSN");
        assert_eq!(queue.pop().unwrap().text, "AT+CGNSPWR=1");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn bounded_queue_rejects_whole_sequence() {
        let mut queue = CommandQueue::new(Some(3));
        queue.push("AT".into()).unwrap();
        let err = queue
            .push_all(vec!["A".into(), "B".into(), "C".into()])
            .unwrap_err();
        assert!(matches!(err, ModemError::QueueFull(1)));
        assert_eq!(queue.len(), 1);
        queue.push_all(vec!["A".into(), "B".into()]).unwrap();
        assert!(queue.push("C".into()).is_err());
    }

    #[test]
    fn clear_reports_dropped_commands() {
        let mut queue = CommandQueue::new(None);
        queue.push_all(vec!["A".into(), "B".into()]).unwrap();
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn writer_holds_back_while_exchange_outstanding() {
        let (mut session, sim) = test_session(fast_config());
        sim.set_echo(false);
        session.shared.enqueue_all(vec!["AT".into(), "AT+CGATT=1".into()]).unwrap();

        session.try_send();
        session.try_send();
        assert_eq!(sim.written(), vec!["AT".to_string()]);
        assert_eq!(session.outstanding.as_ref().unwrap().command, "AT");

        session.drain_input();
        assert!(session.outstanding.is_none());
        session.try_send();
        assert_eq!(sim.written(), vec!["AT".to_string(), "AT+CGATT=1".to_string()]);
        assert_eq!(session.last_command, "AT+CGATT=1");
    }
}

use super::dispatch::IDENTITY_QUERY;
use super::guard;
use super::session::Session;
use crate::error::{ModemError, ModemResult};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

// No-op command used to check that the modem still answers.
pub(crate) const LIVENESS_PROBE: &str = "AT";

impl Session {
    // Probe an idle link; power-cycle a link that stopped answering.
    pub(crate) fn health_check(&mut self) -> ModemResult<()> {
        let threshold = self.shared.config.health_timeout;
        if self.last_health.elapsed() <= threshold || self.last_command_at.elapsed() <= threshold {
            return Ok(());
        }

        if let Some(exchange) = &self.outstanding {
            let err = ModemError::ExchangeTimeout {
                waited: exchange.issued_at.elapsed(),
            };
            warn!(command = %exchange.command, error = %err, "modem unresponsive");
            return self.power_toggle();
        }

        let mut commands = guard(&self.shared.commands);
        if commands.is_empty() {
            debug!("link idle; probing modem");
            commands.push(LIVENESS_PROBE.to_string())?;
        }
        Ok(())
    }

    // Hard-restart the modem and restore the session on a fresh link.
    pub(crate) fn power_toggle(&mut self) -> ModemResult<()> {
        error!("power-cycling modem");
        let now = Instant::now();
        self.last_health = now;
        self.last_command_at = now;

        let config = self.shared.config.clone();
        if let Err(err) = self.power.pulse(config.power_pulse) {
            error!(error = %ModemError::PowerControl(err), "power pulse failed");
        }

        self.outstanding = None;
        let dropped = guard(&self.shared.commands).clear();
        if dropped > 0 {
            debug!(dropped, "discarded queued commands");
        }
        if let Some(token) = self.current_request.take()
            && guard(&self.shared.http).requeue(token)
        {
            info!(%token, "requeued in-flight HTTP request");
        }

        self.transport.close();
        thread::sleep(config.settle_delay);
        self.transport
            .reopen(&config.serial_port, config.baud_rate)
            .map_err(|err| ModemError::transport("reopening serial port", err))?;
        thread::sleep(config.settle_delay);

        self.reinit();
        Ok(())
    }

    // Replay network, GNSS and identity setup after a restart.
    fn reinit(&mut self) {
        let mut commands = guard(&self.shared.intent).replay_commands();
        if guard(&self.shared.identity).is_none() {
            commands.push(IDENTITY_QUERY.to_string());
        }
        if commands.is_empty() {
            return;
        }

        info!(count = commands.len(), "replaying session setup");
        if let Err(err) = self.shared.enqueue_all(commands) {
            warn!(error = %err, "could not replay session setup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::HttpMethod;
    use crate::modem::NetworkConfig;
    use crate::modem::queue::OutstandingExchange;
    use crate::modem::session::testing::{fast_config, test_session};
    use std::time::Duration;

    fn age(session: &mut Session, by: Duration) {
        let past = Instant::now().checked_sub(by).unwrap();
        session.last_health = past;
        session.last_command_at = past;
    }

    #[test]
    fn quiet_link_gets_exactly_one_probe() {
        let (mut session, sim) = test_session(fast_config());
        age(&mut session, Duration::from_secs(31));

        session.health_check().unwrap();
        session.health_check().unwrap();
        assert_eq!(guard(&session.shared.commands).len(), 1);
        assert_eq!(guard(&session.shared.commands).pop().unwrap().text, LIVENESS_PROBE);
        assert_eq!(sim.power_cycles(), 0);
    }

    #[test]
    fn recent_traffic_suppresses_probe() {
        let (mut session, _sim) = test_session(fast_config());
        session.last_health = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();

        session.health_check().unwrap();
        assert!(guard(&session.shared.commands).is_empty());
    }

    #[test]
    fn pending_commands_suppress_probe() {
        let (mut session, _sim) = test_session(fast_config());
        session.shared.enqueue("AT+CGATT=1").unwrap();
        age(&mut session, Duration::from_secs(31));

        session.health_check().unwrap();
        assert_eq!(guard(&session.shared.commands).len(), 1);
    }

    #[test]
    fn stuck_exchange_power_cycles_and_replays() {
        let (mut session, sim) = test_session(fast_config());
        session
            .shared
            .configure_network(NetworkConfig {
                apn: "super".to_string(),
                username: String::new(),
                password: String::new(),
            })
            .unwrap();
        session.shared.start_network().unwrap();
        session.shared.start_gnss(1).unwrap();
        let token = guard(&session.shared.http).register(HttpMethod::Get, "http://example.com");
        session.drive_next();

        session.outstanding = Some(OutstandingExchange {
            command: "AT+HTTPACTION=0".to_string(),
            issued_at: Instant::now(),
        });
        age(&mut session, Duration::from_secs(31));

        session.health_check().unwrap();
        assert_eq!(sim.power_cycles(), 1);
        assert!(sim.is_open());
        assert!(session.outstanding.is_none());
        assert!(session.current_request.is_none());
        assert_eq!(guard(&session.shared.http).pending_len(), 1);

        let replay: Vec<String> = std::iter::from_fn(|| guard(&session.shared.commands).pop())
            .map(|command| command.text)
            .collect();
        assert_eq!(replay.len(), 11);
        assert_eq!(replay[0], "AT+CMEE=1");
        assert_eq!(replay[9], "AT+CGNSURC=1");
        assert_eq!(replay[10], IDENTITY_QUERY);

        session.drive_next();
        assert_eq!(session.current_request, Some(token));
    }
}

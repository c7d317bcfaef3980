use super::{Shared, guard};
use crate::error::{ModemError, ModemResult};
use tracing::info;

// Bearer profile used for every data connection and HTTP session.
pub(crate) const BEARER_PROFILE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub apn: String,
    pub username: String,
    pub password: String,
}

// What the caller has asked the modem to be doing. Replayed after a power cycle.
#[derive(Debug, Clone, Default)]
pub(crate) struct Intent {
    pub(crate) network: Option<NetworkConfig>,
    pub(crate) network_active: bool,
    pub(crate) gnss_active: bool,
    pub(crate) gnss_rate: u8,
}

impl Intent {
    // Commands that bring the modem back to this intent after a restart.
    pub(crate) fn replay_commands(&self) -> Vec<String> {
        let mut commands = Vec::new();
        if self.network_active
            && let Some(network) = &self.network
        {
            commands.extend(network_start_commands(network));
        }
        if self.gnss_active && self.gnss_rate != 0 {
            commands.extend(gnss_start_commands(self.gnss_rate));
        }
        commands
    }
}

pub(crate) fn network_start_commands(network: &NetworkConfig) -> Vec<String> {
    vec![
        "AT+CMEE=1".to_string(),
        "AT+CGATT=1".to_string(),
        "AT+CGACT=1,1".to_string(),
        "AT+CGPADDR=1".to_string(),
        bearer_param("APN", &network.apn),
        bearer_param("USER", &network.username),
        bearer_param("PWD", &network.password),
        format!("AT+SAPBR=1,{BEARER_PROFILE}"),
    ]
}

fn bearer_param(name: &str, value: &str) -> String {
    format!("AT+SAPBR=3,{BEARER_PROFILE},\"{name}\",\"{value}\"")
}

pub(crate) fn network_stop_commands() -> Vec<String> {
    vec![format!("AT+SAPBR=0,{BEARER_PROFILE}")]
}

pub(crate) fn gnss_start_commands(rate: u8) -> Vec<String> {
    vec!["AT+CGNSPWR=1".to_string(), format!("AT+CGNSURC={rate}")]
}

pub(crate) fn gnss_stop_commands() -> Vec<String> {
    vec!["AT+CGNSPWR=0".to_string()]
}

impl Shared {
    pub(crate) fn configure_network(&self, network: NetworkConfig) -> ModemResult<()> {
        let mut intent = guard(&self.intent);
        if intent.network_active {
            return Err(ModemError::NetworkActive);
        }
        info!(apn = %network.apn, "network configured");
        intent.network = Some(network);
        Ok(())
    }

    pub(crate) fn start_network(&self) -> ModemResult<()> {
        let mut intent = guard(&self.intent);
        if intent.network.is_none() {
            return Err(ModemError::NetworkNotConfigured);
        }
        self.queue_network_start(&mut intent)
    }

    // Bring the bearer up unless it is unconfigured or already started.
    // Check and start happen under one intent lock.
    pub(crate) fn start_network_if_needed(&self) -> ModemResult<bool> {
        let mut intent = guard(&self.intent);
        if intent.network.is_none() || intent.network_active {
            return Ok(false);
        }
        self.queue_network_start(&mut intent)?;
        Ok(true)
    }

    fn queue_network_start(&self, intent: &mut Intent) -> ModemResult<()> {
        let network = intent
            .network
            .clone()
            .ok_or(ModemError::NetworkNotConfigured)?;
        self.enqueue_all(network_start_commands(&network))?;
        intent.network_active = true;
        info!(apn = %network.apn, "network start queued");
        Ok(())
    }

    pub(crate) fn stop_network(&self) -> ModemResult<()> {
        let mut intent = guard(&self.intent);
        intent.network_active = false;
        self.enqueue_all(network_stop_commands())?;
        info!("network stop queued");
        Ok(())
    }

    pub(crate) fn start_gnss(&self, rate: u8) -> ModemResult<()> {
        let mut intent = guard(&self.intent);
        self.enqueue_all(gnss_start_commands(rate))?;
        intent.gnss_active = true;
        intent.gnss_rate = rate;
        info!(rate, "GNSS start queued");
        Ok(())
    }

    pub(crate) fn stop_gnss(&self) -> ModemResult<()> {
        let mut intent = guard(&self.intent);
        intent.gnss_active = false;
        intent.gnss_rate = 0;
        self.enqueue_all(gnss_stop_commands())?;
        info!("GNSS stop queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn network() -> NetworkConfig {
        NetworkConfig {
            apn: "super".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }

    #[test]
    fn network_sequence_order() {
        assert_eq!(
            network_start_commands(&network()),
            vec![
                "AT+CMEE=1",
                "AT+CGATT=1",
                "AT+CGACT=1,1",
                "AT+CGPADDR=1",
                "AT+SAPBR=3,1,\"APN\",\"super\"",
                "AT+SAPBR=3,1,\"USER\",\"\"",
                "AT+SAPBR=3,1,\"PWD\",\"\"",
                "AT+SAPBR=1,1",
            ]
        );
        assert_eq!(network_stop_commands(), vec!["AT+SAPBR=0,1"]);
    }

    #[test]
    fn concurrent_lazy_starts_queue_one_bring_up() {
        let shared = std::sync::Arc::new(Shared::new(SessionConfig::default()));
        shared.configure_network(network()).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let shared = std::sync::Arc::clone(&shared);
                std::thread::spawn(move || shared.start_network_if_needed().unwrap())
            })
            .collect();
        let started = workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|started| *started)
            .count();

        assert_eq!(started, 1);
        assert_eq!(guard(&shared.commands).len(), 8);
    }

    #[test]
    fn start_network_requires_configuration() {
        let shared = Shared::new(SessionConfig::default());
        assert!(matches!(shared.start_network(), Err(ModemError::NetworkNotConfigured)));
        assert!(!shared.start_network_if_needed().unwrap());

        shared.configure_network(network()).unwrap();
        shared.start_network().unwrap();
        assert!(!shared.start_network_if_needed().unwrap());
        assert_eq!(guard(&shared.commands).len(), 8);
        assert!(matches!(
            shared.configure_network(network()),
            Err(ModemError::NetworkActive)
        ));

        shared.stop_network().unwrap();
        assert!(shared.configure_network(network()).is_ok());
    }

    #[test]
    fn replay_follows_intent() {
        let shared = Shared::new(SessionConfig::default());
        assert!(guard(&shared.intent).replay_commands().is_empty());

        shared.configure_network(network()).unwrap();
        shared.start_network().unwrap();
        shared.start_gnss(2).unwrap();
        let replay = guard(&shared.intent).replay_commands();
        assert_eq!(replay.len(), 10);
        assert_eq!(replay[8], "AT+CGNSPWR=1");
        assert_eq!(replay[9], "AT+CGNSURC=2");

        shared.stop_gnss().unwrap();
        assert_eq!(guard(&shared.intent).replay_commands().len(), 8);
    }
}

//! Paced, health-checked access to a [`RegistryLookup`].

use std::sync::Arc;
use std::time::Duration;

use livestock_map_building_models::RegistryEntry;
use livestock_map_schedule::Sleeper;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{RegistryError, RegistryLookup};

/// Pacing and health-check settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryPolicy {
    /// Pause between consecutive lookups.
    pub delay_secs: f64,
    /// An extra pause follows every this many lookups (0 disables).
    pub long_pause_every: u64,
    /// Length of the extra pause.
    pub long_pause_secs: f64,
    /// The reference address is re-checked before every this many lookups
    /// within a batch (0 checks only at the start of the batch).
    pub health_check_every: usize,
    /// Known address used for health checks.
    pub health_check_address: String,
    /// Number of entries the reference address is expected to yield.
    pub health_check_expected: usize,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            delay_secs: 0.8,
            long_pause_every: 250,
            long_pause_secs: 60.0,
            health_check_every: 20,
            health_check_address: "Postweg 227 Lunteren".to_string(),
            health_check_expected: 3,
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl RegistryPolicy {
    #[must_use]
    pub fn delay(&self) -> Duration {
        seconds(self.delay_secs)
    }

    #[must_use]
    pub fn long_pause(&self) -> Duration {
        seconds(self.long_pause_secs)
    }
}

#[derive(Debug, Default)]
struct GatewayState {
    lookups: u64,
}

/// Serializes every lookup through one lock so that pacing holds across all
/// callers sharing the gateway.
pub struct RegistryGateway {
    lookup: Arc<dyn RegistryLookup>,
    sleeper: Arc<dyn Sleeper>,
    policy: RegistryPolicy,
    state: Mutex<GatewayState>,
}

impl std::fmt::Debug for RegistryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryGateway")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RegistryGateway {
    #[must_use]
    pub fn new(
        lookup: Arc<dyn RegistryLookup>,
        sleeper: Arc<dyn Sleeper>,
        policy: RegistryPolicy,
    ) -> Self {
        Self {
            lookup,
            sleeper,
            policy,
            state: Mutex::new(GatewayState::default()),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// Total lookups issued through this gateway, health checks included.
    pub async fn lookups_performed(&self) -> u64 {
        self.state.lock().await.lookups
    }

    /// Looks up every address in order, returning one result list per
    /// address.
    ///
    /// The reference address is checked before the first lookup and again
    /// before every `health_check_every`th.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::Malfunction`] if a health check fails; no further
    ///   lookups are made.
    /// * [`RegistryError::Transport`] if a lookup fails.
    /// * [`RegistryError::Cancelled`] if shutdown interrupts a pause.
    pub async fn lookup_all(
        &self,
        addresses: &[String],
    ) -> Result<Vec<Vec<RegistryEntry>>, RegistryError> {
        let mut results = Vec::with_capacity(addresses.len());
        if addresses.is_empty() {
            return Ok(results);
        }

        for (i, address) in addresses.iter().enumerate() {
            let every = self.policy.health_check_every;
            if i == 0 || (every > 0 && i % every == 0) {
                self.check_health().await?;
            }

            log::info!("registry lookup {}/{}: {address}", i + 1, addresses.len());
            results.push(self.paced_lookup(address).await?);
        }

        Ok(results)
    }

    /// Looks up the reference address and compares the result count.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Malfunction`] on a count mismatch or when the
    /// registry cannot be reached, [`RegistryError::Transport`] if the
    /// registry rejects the request or answers with an unreadable page, and
    /// [`RegistryError::Cancelled`] if shutdown interrupts a pause.
    pub async fn check_health(&self) -> Result<(), RegistryError> {
        let expected = self.policy.health_check_expected;
        let actual = match self.paced_lookup(&self.policy.health_check_address).await {
            Ok(entries) => entries.len(),
            Err(RegistryError::Transport(e)) if !e.is_transport() => {
                log::error!("Registry health check request rejected: {e}");
                return Err(e.into());
            }
            Err(RegistryError::Cancelled(e)) => return Err(e.into()),
            Err(e) => {
                log::warn!("Registry health check request failed: {e}");
                0
            }
        };

        if actual == expected {
            Ok(())
        } else {
            log::error!(
                "Registry health check failed for '{}': expected {expected}, got {actual}",
                self.policy.health_check_address,
            );
            Err(RegistryError::Malfunction { expected, actual })
        }
    }

    async fn paced_lookup(&self, address: &str) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut state = self.state.lock().await;

        if state.lookups > 0 {
            self.sleeper.sleep(self.policy.delay()).await?;
        }

        let result = self.lookup.lookup(address).await;
        state.lookups += 1;

        let every = self.policy.long_pause_every;
        if every > 0 && state.lookups % every == 0 {
            log::info!(
                "{} registry lookups done, pausing for {:?}",
                state.lookups,
                self.policy.long_pause(),
            );
            self.sleeper.sleep(self.policy.long_pause()).await?;
        }

        result
    }
}

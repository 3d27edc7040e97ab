//! Registry for all configured carrier providers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::Carrier;
use crate::ports::TrackingProvider;

/// Registry that resolves providers by carrier.
pub struct ProviderRegistry {
    providers: HashMap<Carrier, Arc<dyn TrackingProvider>>,
}

impl ProviderRegistry {
    /// Build a registry from the provided list. A later provider for the same
    /// carrier replaces an earlier one.
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn TrackingProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.carrier(), provider))
            .collect();
        Self { providers }
    }

    /// Carriers with a registered provider, in slug order.
    #[must_use]
    pub fn carriers(&self) -> Vec<Carrier> {
        Carrier::ALL
            .into_iter()
            .filter(|carrier| self.providers.contains_key(carrier))
            .collect()
    }

    /// Look up the provider for `carrier`.
    #[must_use]
    pub fn provider(&self, carrier: Carrier) -> Option<&Arc<dyn TrackingProvider>> {
        self.providers.get(&carrier)
    }
}

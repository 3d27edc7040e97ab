use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use serde::Deserialize;
use shiptrack_core::{plugin::ProviderRegistry, ports::TrackingProvider, transport::HttpTransport};
use shiptrack_provider_fedex::{FedexCredentials, FedexProvider};
use shiptrack_provider_landmark::{LandmarkCredentials, LandmarkProvider};
use shiptrack_provider_ontrac::OnTracProvider;
use shiptrack_provider_ups::{UpsCredentials, UpsProvider};
use shiptrack_provider_usps::{EventCodeLists, EventCodeTable, UspsCredentials, UspsProvider};

/// Contents of `shiptrack.toml`. Only carriers with a table get a provider.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) fedex: Option<FedexConfig>,
    pub(crate) landmark: Option<LandmarkConfig>,
    pub(crate) ontrac: Option<OnTracConfig>,
    pub(crate) ups: Option<UpsConfig>,
    pub(crate) usps: Option<UspsConfig>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FedexConfig {
    #[serde(flatten)]
    pub(crate) credentials: FedexCredentials,
    pub(crate) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LandmarkConfig {
    #[serde(flatten)]
    pub(crate) credentials: LandmarkCredentials,
    pub(crate) url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OnTracConfig {
    pub(crate) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpsConfig {
    #[serde(flatten)]
    pub(crate) credentials: UpsCredentials,
    pub(crate) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UspsConfig {
    #[serde(flatten)]
    pub(crate) credentials: UspsCredentials,
    pub(crate) url: Option<String>,
    /// Replaces the built-in event code table when present.
    pub(crate) event_codes: Option<EventCodeLists>,
}

impl Config {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub(crate) fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build one provider per configured carrier, all sharing `transport`.
    pub(crate) fn registry(self, transport: &Arc<dyn HttpTransport>) -> Result<ProviderRegistry> {
        let mut providers: Vec<Arc<dyn TrackingProvider>> = Vec::new();

        if let Some(fedex) = self.fedex {
            let mut provider = FedexProvider::new(fedex.credentials, Arc::clone(transport));
            if let Some(url) = fedex.url {
                provider = provider.with_url(url);
            }
            providers.push(Arc::new(provider));
        }
        if let Some(landmark) = self.landmark {
            let mut provider = LandmarkProvider::new(landmark.credentials, Arc::clone(transport));
            if let Some(url) = landmark.url {
                provider = provider.with_url(url);
            }
            providers.push(Arc::new(provider));
        }
        if let Some(ontrac) = self.ontrac {
            let mut provider = OnTracProvider::new(Arc::clone(transport));
            if let Some(url) = ontrac.url {
                provider = provider.with_url(url);
            }
            providers.push(Arc::new(provider));
        }
        if let Some(ups) = self.ups {
            let mut provider = UpsProvider::new(ups.credentials, Arc::clone(transport));
            if let Some(url) = ups.url {
                provider = provider.with_url(url);
            }
            providers.push(Arc::new(provider));
        }
        if let Some(usps) = self.usps {
            let mut provider = UspsProvider::new(usps.credentials, Arc::clone(transport));
            if let Some(url) = usps.url {
                provider = provider.with_url(url);
            }
            if let Some(lists) = usps.event_codes {
                let codes = EventCodeTable::try_from(lists).context("invalid [usps.event_codes]")?;
                provider = provider.with_codes(Arc::new(codes));
            }
            providers.push(Arc::new(provider));
        }

        Ok(ProviderRegistry::new(providers))
    }
}

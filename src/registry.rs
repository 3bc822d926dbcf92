use std::collections::HashMap;

use crate::config::SiteConfig;
use crate::error::{DispatchError, RegistryError};

/// Read-only lookup from site domain to backend.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
    by_domain: HashMap<String, usize>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<SiteConfig>) -> Result<Self, RegistryError> {
        let mut by_domain = HashMap::with_capacity(sites.len());
        for (index, site) in sites.iter().enumerate() {
            if site.domain.trim().is_empty() {
                return Err(RegistryError::EmptyDomain(site.address.clone()));
            }
            if by_domain.insert(site.domain.clone(), index).is_some() {
                return Err(RegistryError::DuplicateDomain(site.domain.clone()));
            }
        }

        Ok(Self { sites, by_domain })
    }

    pub fn resolve(&self, domain: &str) -> Result<&SiteConfig, DispatchError> {
        self.by_domain
            .get(domain)
            .map(|&index| &self.sites[index])
            .ok_or_else(|| DispatchError::UnknownSite(domain.to_string()))
    }

    /// Sites in configuration order.
    pub fn all(&self) -> &[SiteConfig] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

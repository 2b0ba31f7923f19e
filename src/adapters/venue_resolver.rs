//! Config-driven venue suffix resolver.
//!
//! `[screener] venue_suffixes = NSE=.NS, BSE=.BO, LSE=.L` maps an exchange
//! hint onto the suffix the history provider expects. An empty suffix
//! (`NASDAQ=`) means the bare symbol.

use crate::domain::config_validation::SCREENER;
use crate::domain::error::ScreenerError;
use crate::domain::universe::SymbolInput;
use crate::ports::config_port::ConfigPort;
use crate::ports::resolver_port::SymbolResolver;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct VenueResolver {
    suffixes: BTreeMap<String, String>,
    strict: bool,
}

impl VenueResolver {
    /// With `strict`, a symbol whose exchange hint has no mapping is unresolved
    /// instead of falling back to the bare symbol.
    pub fn new(suffixes: BTreeMap<String, String>, strict: bool) -> Self {
        let suffixes = suffixes
            .into_iter()
            .map(|(k, v)| (k.trim().to_uppercase(), v.trim().to_string()))
            .collect();
        VenueResolver { suffixes, strict }
    }

    pub fn parse_suffixes(raw: &str) -> Result<BTreeMap<String, String>, String> {
        let mut map = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (venue, suffix) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected VENUE=SUFFIX, got '{}'", entry))?;
            let venue = venue.trim();
            if venue.is_empty() {
                return Err(format!("empty venue in '{}'", entry));
            }
            map.insert(venue.to_uppercase(), suffix.trim().to_string());
        }
        Ok(map)
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScreenerError> {
        let raw = config
            .get_string(SCREENER, "venue_suffixes")
            .unwrap_or_default();
        let suffixes = Self::parse_suffixes(&raw)
            .map_err(|reason| ScreenerError::config_invalid(SCREENER, "venue_suffixes", reason))?;
        let strict = config.get_bool(SCREENER, "strict_venues", false);
        Ok(Self::new(suffixes, strict))
    }

    pub fn venues(&self) -> impl Iterator<Item = (&str, &str)> {
        self.suffixes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl SymbolResolver for VenueResolver {
    fn resolve(&self, input: &SymbolInput) -> Option<String> {
        if let Some(pre) = &input.fetch_symbol {
            return Some(pre.clone());
        }
        let Some(exchange) = &input.exchange else {
            return Some(input.symbol.clone());
        };
        match self.suffixes.get(&exchange.trim().to_uppercase()) {
            Some(suffix) if input.symbol.ends_with(suffix.as_str()) => Some(input.symbol.clone()),
            Some(suffix) => Some(format!("{}{}", input.symbol, suffix)),
            None if self.strict => None,
            None => Some(input.symbol.clone()),
        }
    }
}

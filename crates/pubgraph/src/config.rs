//! Hub configuration.
//!
//! Only consulted when a hub opens an empty store: the treasury and the
//! initial whitelists become the hub's first operations. A store that
//! already holds events keeps whatever governance state it recorded.

use serde::Deserialize;

use pubgraph_access::BPS_MAX;
use pubgraph_core::Address;

use crate::error::{Error, Result};

/// Configuration for a [`Hub`](crate::Hub).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawHubConfig")]
pub struct HubConfig {
    /// Receiver of the protocol fee. Zero disables the fee.
    pub treasury: Address,
    /// Protocol fee in basis points.
    pub treasury_fee_bps: u16,
    pub collect_modules: Vec<Address>,
    pub reference_modules: Vec<Address>,
    pub currencies: Vec<Address>,
    /// Re-hash the whole event log when opening.
    pub verify_chain_on_open: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            treasury: Address::ZERO,
            treasury_fee_bps: 0,
            collect_modules: Vec::new(),
            reference_modules: Vec::new(),
            currencies: Vec::new(),
            verify_chain_on_open: true,
        }
    }
}

impl HubConfig {
    /// Parse a JSON config. Addresses are `0x`-prefixed hex strings.
    ///
    /// ```json
    /// {
    ///   "treasury": "0x00000000000000000000000000000000000000aa",
    ///   "treasury_fee_bps": 250,
    ///   "collect_modules": ["0x..."]
    /// }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn treasury(mut self, treasury: Address, fee_bps: u16) -> Self {
        self.treasury = treasury;
        self.treasury_fee_bps = fee_bps;
        self
    }

    pub fn collect_module(mut self, module: Address) -> Self {
        self.collect_modules.push(module);
        self
    }

    pub fn reference_module(mut self, module: Address) -> Self {
        self.reference_modules.push(module);
        self
    }

    pub fn currency(mut self, currency: Address) -> Self {
        self.currencies.push(currency);
        self
    }

    /// Whether applying this config to a fresh hub changes anything.
    pub(crate) fn has_genesis(&self) -> bool {
        !self.treasury.is_zero()
            || self.treasury_fee_bps != 0
            || !self.collect_modules.is_empty()
            || !self.reference_modules.is_empty()
            || !self.currencies.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawHubConfig {
    treasury: Option<String>,
    treasury_fee_bps: u16,
    collect_modules: Vec<String>,
    reference_modules: Vec<String>,
    currencies: Vec<String>,
    verify_chain_on_open: bool,
}

impl Default for RawHubConfig {
    fn default() -> Self {
        Self {
            treasury: None,
            treasury_fee_bps: 0,
            collect_modules: Vec::new(),
            reference_modules: Vec::new(),
            currencies: Vec::new(),
            verify_chain_on_open: true,
        }
    }
}

fn parse_address(field: &str, s: &str) -> std::result::Result<Address, String> {
    Address::from_hex(s).map_err(|e| format!("{field}: {s:?} is not an address ({e})"))
}

fn parse_all(field: &str, list: &[String]) -> std::result::Result<Vec<Address>, String> {
    list.iter().map(|s| parse_address(field, s)).collect()
}

impl TryFrom<RawHubConfig> for HubConfig {
    type Error = String;

    fn try_from(raw: RawHubConfig) -> std::result::Result<Self, String> {
        if raw.treasury_fee_bps > BPS_MAX {
            return Err(format!(
                "treasury_fee_bps: {} exceeds {}",
                raw.treasury_fee_bps, BPS_MAX
            ));
        }
        Ok(Self {
            treasury: match raw.treasury {
                Some(s) => parse_address("treasury", &s)?,
                None => Address::ZERO,
            },
            treasury_fee_bps: raw.treasury_fee_bps,
            collect_modules: parse_all("collect_modules", &raw.collect_modules)?,
            reference_modules: parse_all("reference_modules", &raw.reference_modules)?,
            currencies: parse_all("currencies", &raw.currencies)?,
            verify_chain_on_open: raw.verify_chain_on_open,
        })
    }
}

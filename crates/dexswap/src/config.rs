use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ConfigError;
use crate::oracle::RateSource;

/// Widget configuration. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwapConfig {
    /// Exchange contract that performs the swap and receives the allowance.
    pub exchange_contract_id: String,

    pub oracles: OracleAddresses,

    /// Connector passed to `getRate`; the default means "no intermediate hop".
    pub connector: Address,

    /// JSON-RPC endpoint used for read-only oracle calls.
    pub rpc_url: String,

    /// Seconds added to the current time to form the swap deadline.
    pub deadline_window_secs: u64,

    pub swap_gas_limit: u64,

    /// Default slippage in tenths of a percent (25 = 2.5%).
    pub default_slippage_tenths: u32,

    /// Slippage choices offered to the user, in tenths of a percent.
    pub slippage_options: Vec<u32>,

    /// Token list positions selected when the widget mounts.
    pub default_pair: [usize; 2],

    pub toast_auto_close_ms: u64,
}

/// Oracle contract address for each rate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleAddresses {
    pub saucer_swap: Address,
    pub pangolin: Address,
}

impl OracleAddresses {
    pub fn address_of(&self, source: RateSource) -> Address {
        match source {
            RateSource::SaucerSwap => self.saucer_swap,
            RateSource::Pangolin => self.pangolin,
        }
    }
}

/// SaucerSwap rate oracle on Hedera testnet.
pub const SAUCERSWAP_ORACLE: Address = Address([
    0xe2, 0xdc, 0x61, 0xbd, 0x0f, 0x55, 0x0f, 0x3e, 0x42, 0x08, 0xfa, 0x0f, 0x39, 0x85, 0x74, 0x34, 0x02, 0x93, 0x43, 0x51,
]);

/// Pangolin rate oracle on Hedera testnet.
pub const PANGOLIN_ORACLE: Address = Address([
    0x2e, 0xe6, 0x39, 0xe1, 0xb3, 0x59, 0x5a, 0x47, 0x7a, 0x84, 0xf2, 0x64, 0x53, 0x41, 0x4e, 0xb2, 0x14, 0x1a, 0x02, 0x38,
]);

impl Default for OracleAddresses {
    fn default() -> Self {
        Self {
            saucer_swap: SAUCERSWAP_ORACLE,
            pangolin: PANGOLIN_ORACLE,
        }
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            exchange_contract_id: "0.0.1112771".to_string(),
            oracles: OracleAddresses::default(),
            connector: Address::NO_CONNECTOR,
            rpc_url: "https://testnet.hashio.io/api".to_string(),
            deadline_window_secs: 1000,
            swap_gas_limit: 900_000,
            default_slippage_tenths: 25,
            slippage_options: vec![10, 20, 25, 35, 50],
            default_pair: [1, 7],
            toast_auto_close_ms: 6000,
        }
    }
}

impl SwapConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SwapConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange_contract_id.trim().is_empty() {
            return Err(ConfigError::Invalid("exchangeContractId is empty".to_string()));
        }
        if self.swap_gas_limit == 0 {
            return Err(ConfigError::Invalid("swapGasLimit must be positive".to_string()));
        }
        if self.deadline_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "deadlineWindowSecs must be positive".to_string(),
            ));
        }
        if !self.slippage_options.contains(&self.default_slippage_tenths) {
            return Err(ConfigError::Invalid(format!(
                "defaultSlippageTenths {} is not among slippageOptions {:?}",
                self.default_slippage_tenths, self.slippage_options
            )));
        }
        if self.slippage_options.iter().any(|&s| s >= 1000) {
            return Err(ConfigError::Invalid(
                "slippage options must be below 100%".to_string(),
            ));
        }
        Ok(())
    }

    pub fn toast_auto_close(&self) -> Duration {
        Duration::from_millis(self.toast_auto_close_ms)
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::abi::{self, AbiValue, FunctionCall, ParamType};
use crate::address::Address;
use crate::config::SwapConfig;
use crate::error::OracleError;

/// The liquidity sources the widget compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateSource {
    SaucerSwap,
    Pangolin,
}

impl RateSource {
    /// All sources, in display order.
    pub const ALL: [RateSource; 2] = [RateSource::SaucerSwap, RateSource::Pangolin];

    pub fn name(&self) -> &'static str {
        match self {
            RateSource::SaucerSwap => "saucerSwap",
            RateSource::Pangolin => "pangolin",
        }
    }

    /// Identifier the exchange contract expects as the first swap argument.
    pub fn aggregator_id(&self) -> &'static str {
        match self {
            RateSource::SaucerSwap => "SaucerSwapV2",
            RateSource::Pangolin => "Pangolin",
        }
    }

    /// Pool fee in thousandths.
    pub fn fee_promille(&self) -> u32 {
        match self {
            RateSource::SaucerSwap => 5,
            RateSource::Pangolin => 5,
        }
    }
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A successful `getRate` answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRate {
    pub rate: BigUint,
    pub weight: BigUint,
}

/// Latest quote per source. `None` means the query failed, `Some(0)` means no liquidity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateQuotes {
    quotes: BTreeMap<RateSource, Option<BigUint>>,
}

impl RateQuotes {
    /// Every source marked absent.
    pub fn cleared() -> Self {
        Self {
            quotes: RateSource::ALL.iter().map(|s| (*s, None)).collect(),
        }
    }

    pub fn set(&mut self, source: RateSource, rate: Option<BigUint>) {
        self.quotes.insert(source, rate);
    }

    pub fn get(&self, source: RateSource) -> Option<&BigUint> {
        self.quotes.get(&source).and_then(|r| r.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (RateSource, Option<&BigUint>)> {
        self.quotes.iter().map(|(s, r)| (*s, r.as_ref()))
    }

    pub fn is_all_absent(&self) -> bool {
        self.quotes.values().all(|r| r.is_none())
    }
}

impl Default for RateQuotes {
    fn default() -> Self {
        Self::cleared()
    }
}

impl FromIterator<(RateSource, Option<BigUint>)> for RateQuotes {
    fn from_iter<I: IntoIterator<Item = (RateSource, Option<BigUint>)>>(iter: I) -> Self {
        let mut quotes = Self::cleared();
        for (source, rate) in iter {
            quotes.set(source, rate);
        }
        quotes
    }
}

/// A source of comparative exchange rates.
#[async_trait]
pub trait RateOracle: Send + Sync {
    async fn get_rate(
        &self,
        src: &Address,
        dst: &Address,
        connector: &Address,
    ) -> Result<OracleRate, OracleError>;
}

/// Read-only contract call transport (an `eth_call` against the latest block).
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, OracleError>;
}

pub const GET_RATE_SIGNATURE: &str = "getRate(address,address,address)";

/// Custom errors declared by the oracle contracts.
const ORACLE_ERRORS: [&str; 3] = [
    "ConnectorShouldBeNone()",
    "PoolNotFound()",
    "PoolWithConnectorNotFound()",
];

/// Human-readable description of revert data.
///
/// Recognizes the oracle's custom errors and the standard `Error(string)`.
pub fn describe_revert(data: &[u8]) -> String {
    if data.len() < 4 {
        return "execution reverted".to_string();
    }
    let selector = &data[..4];

    for name in ORACLE_ERRORS {
        if abi::selector_from_signature(name) == selector {
            return name.trim_end_matches("()").to_string();
        }
    }

    if abi::selector_from_signature("Error(string)") == selector {
        if let Ok(values) = abi::decode_values(&[ParamType::String], &data[4..]) {
            if let Some(reason) = values[0].as_str() {
                return reason.to_string();
            }
        }
    }

    format!("unknown revert 0x{}", hex::encode(data))
}

/// `getRate` on a deployed oracle contract.
pub struct OnchainRateOracle<T: CallTransport> {
    address: Address,
    transport: Arc<T>,
}

impl<T: CallTransport> OnchainRateOracle<T> {
    pub fn new(address: Address, transport: Arc<T>) -> Self {
        Self { address, transport }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

#[async_trait]
impl<T: CallTransport> RateOracle for OnchainRateOracle<T> {
    async fn get_rate(
        &self,
        src: &Address,
        dst: &Address,
        connector: &Address,
    ) -> Result<OracleRate, OracleError> {
        let call = FunctionCall::new(
            GET_RATE_SIGNATURE,
            vec![
                AbiValue::Address(*src),
                AbiValue::Address(*dst),
                AbiValue::Address(*connector),
            ],
        )?;
        let output = self.transport.call(&self.address, &call.calldata()?).await?;

        let values = abi::decode_values(&[ParamType::Uint(256), ParamType::Uint(256)], &output)?;
        match (values[0].as_uint(), values[1].as_uint()) {
            (Some(rate), Some(weight)) => Ok(OracleRate {
                rate: rate.clone(),
                weight: weight.clone(),
            }),
            _ => Err(OracleError::InvalidResponse(
                "getRate did not return (uint256,uint256)".to_string(),
            )),
        }
    }
}

/// Fans a rate query out to every configured source.
///
/// Sources are asked for the same pair concurrently. A source that fails
/// shows up as an absent quote and never aborts the batch.
#[derive(Clone)]
pub struct OracleClient {
    oracles: Vec<(RateSource, Arc<dyn RateOracle>)>,
    connector: Address,
}

impl OracleClient {
    pub fn new(connector: Address) -> Self {
        Self {
            oracles: Vec::new(),
            connector,
        }
    }

    /// Register (or replace) the oracle for `source`.
    pub fn with_oracle(mut self, source: RateSource, oracle: Arc<dyn RateOracle>) -> Self {
        self.oracles.retain(|(s, _)| *s != source);
        self.oracles.push((source, oracle));
        self.oracles.sort_by_key(|(s, _)| *s);
        self
    }

    /// One on-chain oracle per source, at the addresses from `config`.
    pub fn onchain<T: CallTransport + 'static>(config: &SwapConfig, transport: Arc<T>) -> Self {
        RateSource::ALL
            .iter()
            .fold(Self::new(config.connector), |client, source| {
                let oracle = OnchainRateOracle::new(
                    config.oracles.address_of(*source),
                    Arc::clone(&transport),
                );
                client.with_oracle(*source, Arc::new(oracle))
            })
    }

    pub fn sources(&self) -> impl Iterator<Item = RateSource> + '_ {
        self.oracles.iter().map(|(s, _)| *s)
    }

    /// Query every source concurrently and collect each outcome.
    ///
    /// Sources without an oracle, and sources whose query fails, are absent.
    pub async fn fetch_rates(&self, src: &Address, dst: &Address) -> RateQuotes {
        tracing::debug!(%src, %dst, sources = self.oracles.len(), "fetching rates");

        let queries = self.oracles.iter().map(|(source, oracle)| {
            let oracle = Arc::clone(oracle);
            let connector = self.connector;
            async move { (*source, oracle.get_rate(src, dst, &connector).await) }
        });

        join_all(queries)
            .await
            .into_iter()
            .map(|(source, outcome)| match outcome {
                Ok(quote) => {
                    tracing::debug!(%source, rate = %quote.rate, weight = %quote.weight, "rate received");
                    (source, Some(quote.rate))
                }
                Err(e) => {
                    tracing::warn!(%source, error = %e, "rate query failed");
                    (source, None)
                }
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use super::mocks::FixedOracle;
    use super::*;

    struct RecordingTransport {
        response: Result<Vec<u8>, String>,
        seen: Mutex<Vec<(Address, Vec<u8>)>>,
    }

    #[async_trait]
    impl CallTransport for RecordingTransport {
        async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, OracleError> {
            self.seen.lock().unwrap().push((*to, data.to_vec()));
            self.response.clone().map_err(OracleError::Reverted)
        }
    }

    fn rate_output(rate: u64, weight: u64) -> Vec<u8> {
        let params = [ParamType::Uint(256), ParamType::Uint(256)];
        abi::encode_values(
            &params,
            &[
                AbiValue::Uint(BigUint::from(rate)),
                AbiValue::Uint(BigUint::from(weight)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_source_constants() {
        assert_eq!(RateSource::SaucerSwap.aggregator_id(), "SaucerSwapV2");
        assert_eq!(RateSource::Pangolin.aggregator_id(), "Pangolin");
        assert_eq!(RateSource::Pangolin.fee_promille(), 5);
        assert_eq!(RateSource::SaucerSwap.to_string(), "saucerSwap");
    }

    #[test]
    fn test_describe_revert() {
        let pool_not_found = abi::selector_from_signature("PoolNotFound()");
        assert_eq!(describe_revert(&pool_not_found), "PoolNotFound");

        let sig = abi::parse_signature("Error(string)").unwrap();
        let data = abi::encode_call(&sig, &[AbiValue::String("paused".to_string())]).unwrap();
        assert_eq!(describe_revert(&data), "paused");

        assert_eq!(describe_revert(&[]), "execution reverted");
        assert_eq!(describe_revert(&[1, 2, 3, 4]), "unknown revert 0x01020304");
    }

    #[tokio::test]
    async fn test_onchain_oracle_encodes_and_decodes() {
        let transport = Arc::new(RecordingTransport {
            response: Ok(rate_output(42, 3)),
            seen: Mutex::new(Vec::new()),
        });
        let oracle_addr = Address([0x11; 20]);
        let oracle = OnchainRateOracle::new(oracle_addr, Arc::clone(&transport));

        let src = Address([0x01; 20]);
        let dst = Address([0x02; 20]);
        let quote = oracle.get_rate(&src, &dst, &Address::NO_CONNECTOR).await.unwrap();
        assert_eq!(quote.rate, BigUint::from(42u32));
        assert_eq!(quote.weight, BigUint::from(3u32));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (to, data) = &seen[0];
        assert_eq!(*to, oracle_addr);

        let sig = abi::parse_signature(GET_RATE_SIGNATURE).unwrap();
        let args = abi::decode_call(&sig, data).unwrap();
        assert_eq!(args[0].as_address(), Some(&src));
        assert_eq!(args[1].as_address(), Some(&dst));
        assert_eq!(args[2].as_address(), Some(&Address::NO_CONNECTOR));
    }

    #[tokio::test]
    async fn test_onchain_oracle_short_response() {
        let transport = Arc::new(RecordingTransport {
            response: Ok(vec![0u8; 32]),
            seen: Mutex::new(Vec::new()),
        });
        let oracle = OnchainRateOracle::new(Address::ZERO, transport);
        let result = oracle
            .get_rate(&Address::ZERO, &Address::ZERO, &Address::NO_CONNECTOR)
            .await;
        assert!(matches!(result, Err(OracleError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_sources() {
        let saucer = FixedOracle::failing("PoolNotFound");
        let pangolin = FixedOracle::rate(900);
        let client = OracleClient::new(Address::NO_CONNECTOR)
            .with_oracle(RateSource::SaucerSwap, saucer.clone())
            .with_oracle(RateSource::Pangolin, pangolin.clone());

        let quotes = client.fetch_rates(&Address::ZERO, &Address::ZERO).await;
        assert_eq!(quotes.get(RateSource::SaucerSwap), None);
        assert_eq!(quotes.get(RateSource::Pangolin), Some(&BigUint::from(900u32)));
        assert_eq!(saucer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pangolin.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_failure_is_all_absent() {
        let client = OracleClient::new(Address::NO_CONNECTOR)
            .with_oracle(RateSource::SaucerSwap, FixedOracle::failing("down"))
            .with_oracle(RateSource::Pangolin, FixedOracle::failing("down"));

        let quotes = client.fetch_rates(&Address::ZERO, &Address::ZERO).await;
        assert!(quotes.is_all_absent());
    }

    #[tokio::test]
    async fn test_unconfigured_source_is_absent() {
        let client = OracleClient::new(Address::NO_CONNECTOR)
            .with_oracle(RateSource::Pangolin, FixedOracle::rate(0));

        let quotes = client.fetch_rates(&Address::ZERO, &Address::ZERO).await;
        assert_eq!(quotes.get(RateSource::SaucerSwap), None);
        assert_eq!(quotes.get(RateSource::Pangolin), Some(&BigUint::from(0u32)));
        assert!(!quotes.is_all_absent());
    }

    #[test]
    fn test_onchain_client_uses_configured_addresses() {
        let transport = Arc::new(RecordingTransport {
            response: Ok(Vec::new()),
            seen: Mutex::new(Vec::new()),
        });
        let client = OracleClient::onchain(&SwapConfig::default(), transport);
        assert_eq!(client.sources().collect::<Vec<_>>(), RateSource::ALL.to_vec());
    }
}

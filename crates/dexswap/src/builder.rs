use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;
use time::macros::format_description;

use crate::abi::{AbiValue, FunctionCall};
use crate::address::Address;
use crate::config::SwapConfig;
use crate::error::{BuildError, UnitsError};
use crate::oracle::RateSource;
use crate::ranking::RankedRate;
use crate::token::Token;
use crate::units::parse_units;

pub const SWAP_SIGNATURE: &str = "swap(string,address,address,uint256,uint256,uint256,bool)";

/// Largest slippage, in tenths, that still leaves something to receive.
pub const MAX_SLIPPAGE_TENTHS: u32 = 999;

/// Slippage tolerance in tenths of a percent (25 = 2.5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Slippage(u32);

impl Slippage {
    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    /// Parse a percentage with at most one decimal place, e.g. `"2.5"`.
    ///
    /// Rejects anything at or above 100%.
    pub fn from_percent(percent: &str) -> Result<Self, UnitsError> {
        let tenths = parse_units(percent, 1)?;
        u32::try_from(tenths)
            .ok()
            .filter(|t| *t <= MAX_SLIPPAGE_TENTHS)
            .map(Self)
            .ok_or_else(|| UnitsError::InvalidAmount(percent.to_string()))
    }

    pub fn tenths(&self) -> u32 {
        self.0
    }
}

impl Default for Slippage {
    fn default() -> Self {
        Self(25)
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}%", self.0 / 10)
        } else {
            write!(f, "{}.{}%", self.0 / 10, self.0 % 10)
        }
    }
}

/// What the user asked for at the moment they pressed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub token_one: Token,
    pub token_two: Token,
    pub amount_one: String,
    pub amount_two: String,
    /// True when amount two was entered last, making it the exact side.
    pub fee_on_transfer: bool,
    pub slippage: Slippage,
}

/// Ordered arguments of the exchange's `swap` function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapParameters {
    pub source: RateSource,
    pub aggregator_id: String,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: BigUint,
    pub amount_out: BigUint,
    pub deadline: u64,
    pub fee_on_transfer: bool,
}

impl SwapParameters {
    pub fn abi_args(&self) -> Vec<AbiValue> {
        vec![
            AbiValue::String(self.aggregator_id.clone()),
            AbiValue::Address(self.token_in),
            AbiValue::Address(self.token_out),
            AbiValue::Uint(self.amount_in.clone()),
            AbiValue::Uint(self.amount_out.clone()),
            AbiValue::Uint(BigUint::from(self.deadline)),
            AbiValue::Bool(self.fee_on_transfer),
        ]
    }
}

/// A contract call ready to hand to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub contract_id: String,
    pub gas_limit: u64,
    pub call: FunctionCall,
}

/// Token allowance the exchange needs before it can pull `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalRequest {
    /// Ledger-native id of the token being approved.
    pub token_id: String,
    /// Filled in from the wallet's account at submission time.
    pub owner: Option<String>,
    pub spender: String,
    pub amount: BigUint,
}

/// Everything needed to submit one swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSwap {
    pub params: SwapParameters,
    pub approval: ApprovalRequest,
    pub transaction: TransactionRequest,
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0)
}

fn format_deadline(deadline: u64) -> String {
    i64::try_from(deadline)
        .ok()
        .and_then(|secs| time::OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|dt| {
            dt.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
            ))
            .ok()
        })
        .unwrap_or_else(|| deadline.to_string())
}

/// Build the approval and swap requests for `intent`, priced by `best`.
///
/// The side the user edited last is exact; the other side absorbs slippage
/// and the pool fee:
///
/// - fee-on-transfer off: send exactly amount one, accept at least
///   `amount_two * (1000 - slippage - fee) / 1000`
/// - fee-on-transfer on: receive exactly amount two, send up to
///   `amount_one * (1000 + slippage + fee) / 1000`
///
/// All arithmetic is on base units and truncates.
pub fn build_swap(
    intent: &SwapIntent,
    best: Option<&RankedRate>,
    config: &SwapConfig,
    now_unix: u64,
) -> Result<PreparedSwap, BuildError> {
    let best = best.filter(|b| !b.rate.is_zero()).ok_or(BuildError::NoRate)?;
    let source = best.source;

    let slippage_tenths = intent.slippage.tenths();
    let fee_promille = source.fee_promille();
    let adjustment = slippage_tenths
        .checked_add(fee_promille)
        .filter(|a| *a < 1000)
        .ok_or(BuildError::SlippageTooHigh {
            slippage_tenths,
            fee_promille,
        })?;

    let entered_in = parse_units(&intent.amount_one, intent.token_one.decimals)?;
    if entered_in.is_zero() {
        return Err(BuildError::ZeroAmount);
    }
    let entered_out = parse_units(&intent.amount_two, intent.token_two.decimals)?;

    let (amount_in, amount_out) = if intent.fee_on_transfer {
        (entered_in * (1000 + adjustment) / 1000u32, entered_out)
    } else {
        (entered_in, entered_out * (1000 - adjustment) / 1000u32)
    };

    let params = SwapParameters {
        source,
        aggregator_id: source.aggregator_id().to_string(),
        token_in: intent.token_one.solidity_address,
        token_out: intent.token_two.solidity_address,
        amount_in,
        amount_out,
        deadline: now_unix.saturating_add(config.deadline_window_secs),
        fee_on_transfer: intent.fee_on_transfer,
    };

    let call = FunctionCall::new(SWAP_SIGNATURE, params.abi_args())
        .map_err(|e| BuildError::Encoding(e.to_string()))?;

    tracing::debug!(
        source = %source,
        amount_in = %params.amount_in,
        amount_out = %params.amount_out,
        fee_on_transfer = params.fee_on_transfer,
        deadline = %format_deadline(params.deadline),
        "swap built"
    );

    Ok(PreparedSwap {
        approval: ApprovalRequest {
            token_id: intent.token_one.address.clone(),
            owner: None,
            spender: config.exchange_contract_id.clone(),
            amount: params.amount_in.clone(),
        },
        transaction: TransactionRequest {
            contract_id: config.exchange_contract_id.clone(),
            gas_limit: config.swap_gas_limit,
            call,
        },
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi;
    use crate::token::fixtures;

    const NOW: u64 = 1_700_000_000;

    fn intent(amount_one: &str, amount_two: &str, fee_on_transfer: bool) -> SwapIntent {
        SwapIntent {
            token_one: fixtures::token("HBAR", 8, 1),
            token_two: fixtures::token("USDC", 6, 3),
            amount_one: amount_one.to_string(),
            amount_two: amount_two.to_string(),
            fee_on_transfer,
            slippage: Slippage::from_tenths(25),
        }
    }

    fn best() -> RankedRate {
        RankedRate {
            source: RateSource::SaucerSwap,
            rate: BigUint::from(500_000_000_000_000_000u64),
        }
    }

    #[test]
    fn test_slippage_parse_and_display() {
        assert_eq!(Slippage::from_percent("2.5").unwrap().tenths(), 25);
        assert_eq!(Slippage::from_percent("1").unwrap().tenths(), 10);
        assert_eq!(Slippage::from_tenths(35).to_string(), "3.5%");
        assert_eq!(Slippage::from_tenths(50).to_string(), "5%");
        assert!(Slippage::from_percent("x").is_err());
        assert_eq!(Slippage::from_percent("99.9").unwrap().tenths(), 999);
        assert!(Slippage::from_percent("100").is_err());
        assert!(Slippage::from_percent("429496729.5").is_err());
    }

    #[test]
    fn test_extreme_slippage_is_rejected_not_wrapped() {
        let mut swap_intent = intent("1", "1", false);
        swap_intent.slippage = Slippage::from_tenths(u32::MAX);
        assert_eq!(
            build_swap(&swap_intent, Some(&best()), &SwapConfig::default(), NOW),
            Err(BuildError::SlippageTooHigh {
                slippage_tenths: u32::MAX,
                fee_promille: 5
            })
        );
    }

    #[test]
    fn test_huge_deadline_window_saturates() {
        let config = SwapConfig {
            deadline_window_secs: u64::MAX,
            ..SwapConfig::default()
        };
        let prepared = build_swap(&intent("1", "1", false), Some(&best()), &config, NOW).unwrap();
        assert_eq!(prepared.params.deadline, u64::MAX);
    }

    #[test]
    fn test_exact_input_deflates_received() {
        let prepared = build_swap(&intent("10", "4.5", false), Some(&best()), &SwapConfig::default(), NOW)
            .unwrap();
        let params = &prepared.params;

        // 10 HBAR at 8 decimals, sent unchanged
        assert_eq!(params.amount_in, BigUint::from(1_000_000_000u64));
        // 4.5 USDC = 4_500_000, times 970/1000
        assert_eq!(params.amount_out, BigUint::from(4_365_000u64));
        assert!(!params.fee_on_transfer);
        assert_eq!(prepared.approval.amount, params.amount_in);
    }

    #[test]
    fn test_exact_output_inflates_sent() {
        let prepared = build_swap(&intent("10", "4.5", true), Some(&best()), &SwapConfig::default(), NOW)
            .unwrap();
        let params = &prepared.params;

        // 1_000_000_000 times 1030/1000
        assert_eq!(params.amount_in, BigUint::from(1_030_000_000u64));
        assert_eq!(params.amount_out, BigUint::from(4_500_000u64));
        assert!(params.fee_on_transfer);
        assert_eq!(prepared.approval.amount, BigUint::from(1_030_000_000u64));
    }

    #[test]
    fn test_truncates_not_rounds() {
        // 0.000001 USDC = 1 base unit; 1 * 970 / 1000 = 0
        let prepared = build_swap(&intent("1", "0.000001", false), Some(&best()), &SwapConfig::default(), NOW)
            .unwrap();
        assert_eq!(prepared.params.amount_out, BigUint::zero());

        // 0.00000001 HBAR = 1 base unit; 1 * 1030 / 1000 = 1
        let prepared = build_swap(&intent("0.00000001", "1", true), Some(&best()), &SwapConfig::default(), NOW)
            .unwrap();
        assert_eq!(prepared.params.amount_in, BigUint::from(1u32));
    }

    #[test]
    fn test_deadline_uses_configured_window() {
        let mut config = SwapConfig::default();
        let prepared = build_swap(&intent("1", "1", false), Some(&best()), &config, NOW).unwrap();
        assert_eq!(prepared.params.deadline, NOW + 1000);

        config.deadline_window_secs = 1200;
        let prepared = build_swap(&intent("1", "1", false), Some(&best()), &config, NOW).unwrap();
        assert_eq!(prepared.params.deadline, NOW + 1200);
    }

    #[test]
    fn test_uses_best_source_identity() {
        let pangolin = RankedRate {
            source: RateSource::Pangolin,
            rate: BigUint::from(1u32),
        };
        let prepared =
            build_swap(&intent("1", "1", false), Some(&pangolin), &SwapConfig::default(), NOW).unwrap();
        assert_eq!(prepared.params.aggregator_id, "Pangolin");
        assert_eq!(prepared.params.source, RateSource::Pangolin);
    }

    #[test]
    fn test_requests_target_exchange() {
        let config = SwapConfig::default();
        let swap_intent = intent("2", "1", false);
        let prepared = build_swap(&swap_intent, Some(&best()), &config, NOW).unwrap();

        assert_eq!(prepared.transaction.contract_id, "0.0.1112771");
        assert_eq!(prepared.transaction.gas_limit, 900_000);
        assert_eq!(prepared.approval.spender, "0.0.1112771");
        assert_eq!(prepared.approval.token_id, swap_intent.token_one.address);
        assert_eq!(prepared.approval.owner, None);

        let sig = abi::parse_signature(SWAP_SIGNATURE).unwrap();
        let calldata = prepared.transaction.call.calldata().unwrap();
        let args = abi::decode_call(&sig, &calldata).unwrap();
        assert_eq!(args, prepared.params.abi_args());
        assert_eq!(args[0].as_str(), Some("SaucerSwapV2"));
        assert_eq!(args[1].as_address(), Some(&swap_intent.token_one.solidity_address));
        assert_eq!(args[2].as_address(), Some(&swap_intent.token_two.solidity_address));
        assert_eq!(args[5].as_uint(), Some(&BigUint::from(NOW + 1000)));
        assert_eq!(args[6].as_bool(), Some(false));
    }

    #[test]
    fn test_preconditions() {
        let config = SwapConfig::default();
        assert_eq!(
            build_swap(&intent("1", "1", false), None, &config, NOW),
            Err(BuildError::NoRate)
        );

        let zero_rate = RankedRate {
            source: RateSource::SaucerSwap,
            rate: BigUint::zero(),
        };
        assert_eq!(
            build_swap(&intent("1", "1", false), Some(&zero_rate), &config, NOW),
            Err(BuildError::NoRate)
        );

        assert_eq!(
            build_swap(&intent("0", "1", false), Some(&best()), &config, NOW),
            Err(BuildError::ZeroAmount)
        );
        assert_eq!(
            build_swap(&intent("", "1", false), Some(&best()), &config, NOW),
            Err(BuildError::Amount(UnitsError::Empty))
        );

        let mut greedy = intent("1", "1", false);
        greedy.slippage = Slippage::from_tenths(995);
        assert_eq!(
            build_swap(&greedy, Some(&best()), &config, NOW),
            Err(BuildError::SlippageTooHigh {
                slippage_tenths: 995,
                fee_promille: 5
            })
        );
    }

    #[test]
    fn test_format_deadline() {
        assert_eq!(format_deadline(1_766_151_741), "2025-12-19 13:42:21 UTC");
    }
}

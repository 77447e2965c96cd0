use num_bigint::BigUint;
use num_traits::Zero;

use crate::address::Address;
use crate::builder::{build_swap, PreparedSwap, Slippage, SwapIntent};
use crate::config::SwapConfig;
use crate::error::{BuildError, ConfigError, Error, UnitsError};
use crate::oracle::{OracleClient, RateQuotes, RateSource};
use crate::ranking::{best_rate, has_usable_rate, rank_rates, RankedRate};
use crate::token::{Token, TokenList, TokenRegistry};
use crate::units::{convert_rate, format_rounded, parse_units, pow10, scale_rate, RATE_DECIMALS};

/// Places shown for an amount computed from the best price.
const COMPUTED_AMOUNT_PLACES: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

/// A rate request for one pair, tagged with its position in the query order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuery {
    pub seq: u64,
    pub src: Address,
    pub dst: Address,
}

impl RateQuery {
    pub async fn fetch(&self, client: &OracleClient) -> RateQuotes {
        client.fetch_rates(&self.src, &self.dst).await
    }
}

/// Swap form state.
///
/// One store owns the pair, the amounts, the slippage and the latest quotes.
/// Each transition below is the only way that state changes:
///
/// - pair changed (`select_token`, `switch_tokens`): amounts reset, quotes cleared
/// - rates requested (`begin_rate_query`): quotes cleared, new sequence number
/// - rates resolved (`apply_rates`): applied only for the latest sequence number
/// - amount edited (`edit_amount_one`, `edit_amount_two`): counterpart recomputed
/// - slippage or wallet connection changed
pub struct SwapWidget<R: TokenRegistry = TokenList> {
    tokens: R,
    config: SwapConfig,
    token_one: Token,
    token_two: Token,
    amount_one: String,
    amount_two: String,
    fee_on_transfer: bool,
    slippage: Slippage,
    quotes: RateQuotes,
    ranked: Vec<RankedRate>,
    query_seq: u64,
    wallet_connected: bool,
}

impl<R: TokenRegistry> SwapWidget<R> {
    /// Mount the widget on the configured default pair.
    ///
    /// Falls back to the first two tokens when the default pair is out of range.
    pub fn new(tokens: R, config: SwapConfig) -> Result<Self, Error> {
        let [one, two] = config.default_pair;
        let pair = match (tokens.token(one), tokens.token(two)) {
            (Some(a), Some(b)) => Some((a.clone(), b.clone())),
            _ => match (tokens.token(0), tokens.token(1)) {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            },
        };
        let (token_one, token_two) = pair.ok_or_else(|| {
            Error::TokenRegistry(format!(
                "need at least two tokens, registry has {}",
                tokens.len()
            ))
        })?;

        Ok(Self {
            slippage: Slippage::from_tenths(config.default_slippage_tenths),
            tokens,
            config,
            token_one,
            token_two,
            amount_one: "0".to_string(),
            amount_two: "0".to_string(),
            fee_on_transfer: false,
            quotes: RateQuotes::cleared(),
            ranked: Vec::new(),
            query_seq: 0,
            wallet_connected: false,
        })
    }

    pub fn token_one(&self) -> &Token {
        &self.token_one
    }

    pub fn token_two(&self) -> &Token {
        &self.token_two
    }

    pub fn amount_one(&self) -> &str {
        &self.amount_one
    }

    pub fn amount_two(&self) -> &str {
        &self.amount_two
    }

    /// True when amount two is the exact side (the user edited it last).
    pub fn fee_on_transfer(&self) -> bool {
        self.fee_on_transfer
    }

    pub fn slippage(&self) -> Slippage {
        self.slippage
    }

    pub fn quotes(&self) -> &RateQuotes {
        &self.quotes
    }

    pub fn ranked_rates(&self) -> &[RankedRate] {
        &self.ranked
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn tokens(&self) -> &R {
        &self.tokens
    }

    /// Replace one side of the pair with the token at `index`.
    pub fn select_token(&mut self, side: Side, index: usize) -> Result<RateQuery, Error> {
        let token = self
            .tokens
            .token(index)
            .cloned()
            .ok_or_else(|| Error::TokenRegistry(format!("no token at position {index}")))?;
        match side {
            Side::One => self.token_one = token,
            Side::Two => self.token_two = token,
        }
        self.reset_amounts();
        Ok(self.begin_rate_query())
    }

    /// Swap the two sides of the pair.
    pub fn switch_tokens(&mut self) -> RateQuery {
        std::mem::swap(&mut self.token_one, &mut self.token_two);
        self.reset_amounts();
        self.begin_rate_query()
    }

    /// Clear every quote and issue a new query for the current pair.
    pub fn begin_rate_query(&mut self) -> RateQuery {
        self.quotes = RateQuotes::cleared();
        self.ranked.clear();
        self.query_seq += 1;
        tracing::debug!(seq = self.query_seq, pair = %self.pair_label(), "rate query started");
        RateQuery {
            seq: self.query_seq,
            src: self.token_one.solidity_address,
            dst: self.token_two.solidity_address,
        }
    }

    /// Apply the result of query `seq`. Results of superseded queries are dropped.
    pub fn apply_rates(&mut self, seq: u64, quotes: RateQuotes) -> bool {
        if seq != self.query_seq {
            tracing::warn!(seq, latest = self.query_seq, "discarding stale rate response");
            return false;
        }
        self.ranked = rank_rates(&quotes);
        self.quotes = quotes;
        tracing::debug!(seq, best = %self.best_rate_display(), "rates applied");

        // Reprice the approximate side against the new best rate.
        if self.fee_on_transfer {
            self.amount_one = self.counterpart(&self.amount_two, Side::Two);
        } else {
            self.amount_two = self.counterpart(&self.amount_one, Side::One);
        }
        true
    }

    /// The user typed into the first amount field.
    pub fn edit_amount_one(&mut self, text: &str) -> Result<(), UnitsError> {
        validate_amount(text)?;
        self.amount_one = text.to_string();
        self.amount_two = self.counterpart(text, Side::One);
        self.fee_on_transfer = false;
        Ok(())
    }

    /// The user typed into the second amount field.
    pub fn edit_amount_two(&mut self, text: &str) -> Result<(), UnitsError> {
        validate_amount(text)?;
        self.amount_two = text.to_string();
        self.amount_one = self.counterpart(text, Side::Two);
        self.fee_on_transfer = true;
        Ok(())
    }

    pub fn set_slippage(&mut self, slippage: Slippage) -> Result<(), Error> {
        if !self.config.slippage_options.contains(&slippage.tenths()) {
            return Err(Error::Config(ConfigError::Invalid(format!(
                "slippage {slippage} is not an offered option"
            ))));
        }
        self.slippage = slippage;
        Ok(())
    }

    pub fn set_wallet_connected(&mut self, connected: bool) {
        self.wallet_connected = connected;
    }

    pub fn best_rate(&self) -> Option<&RankedRate> {
        best_rate(&self.ranked)
    }

    /// Best rate rendered for display, `"0"` when no source answered.
    pub fn best_rate_display(&self) -> String {
        convert_rate(
            self.best_rate().map(|b| &b.rate),
            self.token_one.decimals,
            self.token_two.decimals,
        )
    }

    /// Every present quote, best first, rendered for display.
    pub fn all_rates_display(&self) -> Vec<(RateSource, String)> {
        self.ranked
            .iter()
            .map(|r| {
                (
                    r.source,
                    convert_rate(Some(&r.rate), self.token_one.decimals, self.token_two.decimals),
                )
            })
            .collect()
    }

    /// Amount fields accept input only once a non-zero price is known.
    pub fn inputs_enabled(&self) -> bool {
        has_usable_rate(&self.ranked)
    }

    pub fn can_swap(&self) -> bool {
        self.wallet_connected
            && self.inputs_enabled()
            && parse_units(&self.amount_one, self.token_one.decimals).is_ok_and(|a| !a.is_zero())
    }

    pub fn intent(&self) -> SwapIntent {
        SwapIntent {
            token_one: self.token_one.clone(),
            token_two: self.token_two.clone(),
            amount_one: self.amount_one.clone(),
            amount_two: self.amount_two.clone(),
            fee_on_transfer: self.fee_on_transfer,
            slippage: self.slippage,
        }
    }

    pub fn prepare_swap(&self, now_unix: u64) -> Result<PreparedSwap, BuildError> {
        build_swap(&self.intent(), self.best_rate(), &self.config, now_unix)
    }

    fn reset_amounts(&mut self) {
        self.amount_one = "0".to_string();
        self.amount_two = "0".to_string();
        self.fee_on_transfer = false;
    }

    /// Amount on the other side of `edited`, priced at the best rate.
    fn counterpart(&self, text: &str, edited: Side) -> String {
        let Some(best) = self.best_rate() else {
            return "0".to_string();
        };
        let price = scale_rate(&best.rate, self.token_one.decimals, self.token_two.decimals);
        if price.is_zero() {
            return "0".to_string();
        }
        let Ok(amount) = parse_units(text, RATE_DECIMALS) else {
            return "0".to_string();
        };

        let unit = pow10(u32::from(RATE_DECIMALS));
        let value: BigUint = match edited {
            Side::One => amount * &price / &unit,
            Side::Two => amount * &unit / &price,
        };
        format_rounded(&value, RATE_DECIMALS, COMPUTED_AMOUNT_PLACES)
    }

    fn pair_label(&self) -> String {
        format!("{}/{}", self.token_one.ticker, self.token_two.ticker)
    }
}

/// Empty input is allowed (the field was cleared); anything else must parse.
fn validate_amount(text: &str) -> Result<(), UnitsError> {
    match parse_units(text, RATE_DECIMALS) {
        Ok(_) | Err(UnitsError::Empty) => Ok(()),
        Err(e) => Err(e),
    }
}

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::Error;

/// Highest decimal precision a token may declare.
pub const MAX_TOKEN_DECIMALS: u8 = 18;

/// A swappable token as listed in the external token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub icon: String,
    /// Ledger-native token id (e.g. `0.0.456858`), used for allowance approval.
    pub address: String,
    /// EVM address used in contract calls and oracle queries.
    pub solidity_address: Address,
    pub decimals: u8,
}

/// Read-only, position-indexed token registry.
pub trait TokenRegistry {
    fn token(&self, index: usize) -> Option<&Token>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory token list, loaded once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct TokenList {
    tokens: Vec<Token>,
}

impl TokenList {
    pub fn new(tokens: Vec<Token>) -> Result<Self, Error> {
        for token in &tokens {
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(Error::TokenRegistry(format!(
                    "{} declares {} decimals (max {MAX_TOKEN_DECIMALS})",
                    token.ticker, token.decimals
                )));
            }
        }
        Ok(Self { tokens })
    }

    /// Parse a JSON array of tokens.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let tokens: Vec<Token> =
            serde_json::from_str(json).map_err(|e| Error::TokenRegistry(e.to_string()))?;
        Self::new(tokens)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Position of the first token with the given ticker.
    pub fn position_of(&self, ticker: &str) -> Option<usize> {
        self.tokens
            .iter()
            .position(|t| t.ticker.eq_ignore_ascii_case(ticker))
    }
}

impl TokenRegistry for TokenList {
    fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn token(ticker: &str, decimals: u8, seed: u8) -> Token {
        Token {
            name: format!("{ticker} token"),
            ticker: ticker.to_string(),
            icon: String::new(),
            address: format!("0.0.{}", 1000 + u32::from(seed)),
            solidity_address: Address([seed; 20]),
            decimals,
        }
    }

    /// Eight tokens, so the default pair (1, 7) resolves.
    pub fn list() -> TokenList {
        let tokens = vec![
            token("HBAR", 8, 1),
            token("SAUCE", 6, 2),
            token("USDC", 6, 3),
            token("PBAR", 8, 4),
            token("DAI", 18, 5),
            token("WETH", 8, 6),
            token("XSAUCE", 6, 7),
            token("HST", 8, 8),
        ];
        TokenList::new(tokens).unwrap()
    }
}

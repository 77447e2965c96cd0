pub mod abi;
pub mod address;
pub mod builder;
pub mod config;
pub mod error;
pub mod notify;
pub mod oracle;
pub mod ranking;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod submit;
pub mod token;
pub mod units;
pub mod widget;

use error::Error;

// Re-exports for convenience
pub use address::Address;
pub use builder::{build_swap, unix_now, PreparedSwap, Slippage, SwapIntent, SwapParameters};
pub use config::SwapConfig;
pub use notify::{Notification, NotificationLog, Notifier, Severity};
pub use oracle::{OracleClient, RateOracle, RateQuotes, RateSource};
pub use ranking::{rank_rates, RankedRate};
pub use submit::{SubmissionController, SubmissionState, SwapOutcome, Wallet};
pub use token::{Token, TokenList, TokenRegistry};
pub use widget::{RateQuery, Side, SwapWidget};

/// Query every oracle for the widget's current pair and apply the result.
///
/// The widget stays borrowed until the quotes arrive. Hosts that keep taking
/// input meanwhile should split this into `SwapWidget::begin_rate_query`,
/// `RateQuery::fetch` and `SwapWidget::apply_rates`, which drops responses to
/// superseded queries.
pub async fn refresh_rates<R: TokenRegistry>(widget: &mut SwapWidget<R>, client: &OracleClient) {
    let query = widget.begin_rate_query();
    let quotes = query.fetch(client).await;
    widget.apply_rates(query.seq, quotes);
}

/// Build the swap from the widget's current state and hand it to the wallet.
pub async fn swap<R: TokenRegistry>(
    widget: &SwapWidget<R>,
    controller: &SubmissionController,
    now_unix: u64,
) -> Result<SwapOutcome, Error> {
    let prepared = widget.prepare_swap(now_unix)?;
    Ok(controller.submit(prepared).await?)
}

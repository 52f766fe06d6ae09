//! Minimal interactive console, the binary's order-entry surface. Reads
//! commands from stdin, mutates the session store and feeds the submission
//! bridge; a richer front-end would hold the same two handles.

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{Cluster, find_market};
use crate::execution::SubmitRequest;
use crate::market_data::types::{OrderKind, Side};
use crate::state::store::Store;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SelectMarket(String),
    /// Limit when a price is given, market otherwise.
    Submit {
        side: Side,
        size: f64,
        price: Option<f64>,
    },
    ShowOrders,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("market") => {
                let name = parts.next().ok_or("usage: market <NAME>")?;
                Ok(Command::SelectMarket(name.to_string()))
            }
            Some("buy") => Self::parse_order(Side::Buy, parts),
            Some("sell") => Self::parse_order(Side::Sell, parts),
            Some("orders") => Ok(Command::ShowOrders),
            Some("quit") | Some("exit") => Ok(Command::Quit),
            Some(other) => Err(format!("unknown command: {other}")),
            None => Err("empty command".to_string()),
        }
    }

    fn parse_order<'a>(
        side: Side,
        mut parts: impl Iterator<Item = &'a str>,
    ) -> Result<Command, String> {
        let size = parts
            .next()
            .ok_or("usage: buy|sell <size> [price]")?
            .parse::<f64>()
            .map_err(|_| "size must be a number".to_string())?;
        let price = match parts.next() {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|_| "price must be a number".to_string())?,
            ),
            None => None,
        };
        Ok(Command::Submit { side, size, price })
    }
}

/// Read commands until stdin closes or `quit`.
pub async fn run_console(
    store: Store,
    submit_tx: mpsc::Sender<SubmitRequest>,
    cluster: Cluster,
) -> anyhow::Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    info!("console ready (market / buy / sell / orders / quit)");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Command::parse(line) {
            Ok(Command::SelectMarket(name)) => match find_market(cluster, &name) {
                Some(market) => {
                    store.select_market(market.name.clone());
                    info!(market = %market.name, "market selected");
                }
                None => warn!(market = %name, "unknown market"),
            },
            Ok(Command::Submit { side, size, price }) => {
                let mut form = store.trade_form();
                form.side = side;
                form.kind = if price.is_some() {
                    OrderKind::Limit
                } else {
                    OrderKind::Market
                };
                form.price = price;
                form.base_size = Some(size);
                let request = SubmitRequest {
                    market: store.selected_market(),
                    form,
                };
                if submit_tx.send(request).await.is_err() {
                    warn!("submit channel closed, console shutting down");
                    return Ok(());
                }
            }
            Ok(Command::ShowOrders) => {
                for order in store.open_orders() {
                    info!(
                        order_id = %order.order_id,
                        market = %order.market,
                        side = %order.side,
                        price = order.price,
                        size = order.size,
                        "open order"
                    );
                }
            }
            Ok(Command::Quit) => {
                info!("console quit");
                return Ok(());
            }
            Err(err) => warn!(%err, "bad command"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_command() {
        assert_eq!(
            Command::parse("market SOL-PERP"),
            Ok(Command::SelectMarket("SOL-PERP".to_string()))
        );
        assert!(Command::parse("market").is_err());
    }

    #[test]
    fn limit_and_market_orders() {
        assert_eq!(
            Command::parse("buy 0.5 60000"),
            Ok(Command::Submit {
                side: Side::Buy,
                size: 0.5,
                price: Some(60000.0),
            })
        );
        assert_eq!(
            Command::parse("sell 2"),
            Ok(Command::Submit {
                side: Side::Sell,
                size: 2.0,
                price: None,
            })
        );
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(Command::parse("buy lots").is_err());
        assert!(Command::parse("buy 1 cheap").is_err());
        assert!(Command::parse("hodl").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn quit_aliases() {
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("exit"), Ok(Command::Quit));
    }
}

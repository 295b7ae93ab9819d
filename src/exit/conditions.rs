//! Invalidation conditions
//!
//! Free-text conditions from an exit plan, parsed into something the monitor
//! can evaluate each cycle.

use super::MarketFlags;
use rust_decimal::Decimal;
use std::str::FromStr;

/// An evaluable invalidation condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationCondition {
    /// Fires when the price trades below the level
    PriceBelow(Decimal),
    /// Fires when the price trades above the level
    PriceAbove(Decimal),
    /// Fires when the market state evaluator raises the named flag
    Flag(String),
}

const BELOW_WORDS: &[&str] = &["below", "under", "<"];
const ABOVE_WORDS: &[&str] = &["above", "over", ">"];
/// Subjects that name the traded price
const PRICE_WORDS: &[&str] = &["price", "close", "closes", "closing", "mark", "candle"];
/// Subjects that name an indicator rather than the price
const INDICATOR_WORDS: &[&str] = &[
    "rsi", "macd", "funding", "volume", "volatility", "oi", "interest", "atr", "adx", "stoch",
    "dominance", "ratio", "rate", "index",
];

impl InvalidationCondition {
    /// Parse a condition such as "price below 48000" or "volatility spike"
    ///
    /// Anything that is not a recognisable price level becomes a named flag.
    pub fn parse(text: &str) -> Self {
        Self::parse_for(text, "")
    }

    /// Like [`parse`](Self::parse), also accepting the base asset of
    /// `symbol` as a price subject ("BTC breaks below 47500" for BTCUSDT)
    pub fn parse_for(text: &str, symbol: &str) -> Self {
        let normalized = text.trim().to_lowercase();
        let tokens: Vec<&str> = normalized
            .split(|c: char| c.is_whitespace() || c == ':')
            .filter(|t| !t.is_empty())
            .collect();
        let symbol = symbol.to_lowercase();

        for (i, token) in tokens.iter().enumerate() {
            let below = BELOW_WORDS.contains(token);
            let above = ABOVE_WORDS.contains(token);
            if !below && !above {
                continue;
            }
            if !is_price_subject(&tokens[..i], &symbol) {
                break;
            }
            if let Some(level) = tokens[i + 1..].iter().find_map(|t| parse_level(t)) {
                return if below {
                    Self::PriceBelow(level)
                } else {
                    Self::PriceAbove(level)
                };
            }
        }

        Self::Flag(tokens.join("_"))
    }

    /// Whether the condition holds at `price` given the current flags
    pub fn is_met(&self, price: Decimal, flags: &MarketFlags) -> bool {
        match self {
            Self::PriceBelow(level) => price < *level,
            Self::PriceAbove(level) => price > *level,
            Self::Flag(name) => flags.contains(name),
        }
    }
}

/// Whether the words before the comparison refer to the traded price
fn is_price_subject(subject: &[&str], symbol: &str) -> bool {
    if subject.iter().any(|t| INDICATOR_WORDS.contains(t)) {
        return false;
    }
    subject.is_empty()
        || subject.iter().any(|t| {
            PRICE_WORDS.contains(t)
                || (t.len() >= 3 && !symbol.is_empty() && symbol.starts_with(*t))
        })
}

/// Parse "48000", "$48,000" or "48000." as a positive level
fn parse_level(token: &str) -> Option<Decimal> {
    let cleaned: String = token
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    Decimal::from_str(&cleaned)
        .ok()
        .filter(|level| *level > Decimal::ZERO)
}

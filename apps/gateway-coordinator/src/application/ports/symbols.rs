//! Canonical ⇄ broker symbol translation for dot-delimited brokers.
//!
//! Forex pairs are `EUR/USD` canonically and `EUR.USD` at the broker. A
//! pair is two three-letter ASCII codes; anything else passes through
//! unchanged in both directions, so share classes such as `BRK.B` survive.
//!
//! The broker side cannot tell a pair from a canonical ticker that is itself
//! two three-letter codes joined by a dot: `ABC.DEF` always reads back as
//! `ABC/DEF`. Canonical symbols of that shape therefore do not round-trip.

/// Canonical symbol to broker symbol.
#[must_use]
pub fn to_dotted(canonical: &str) -> String {
    match split_pair(canonical, '/') {
        Some((base, quote)) => format!("{base}.{quote}"),
        None => canonical.to_string(),
    }
}

/// Broker symbol to canonical symbol.
#[must_use]
pub fn from_dotted(broker: &str) -> String {
    match split_pair(broker, '.') {
        Some((base, quote)) => format!("{base}/{quote}"),
        None => broker.to_string(),
    }
}

/// Whether a canonical symbol is a currency pair.
#[must_use]
pub fn is_currency_pair(canonical: &str) -> bool {
    split_pair(canonical, '/').is_some()
}

fn split_pair(symbol: &str, delimiter: char) -> Option<(&str, &str)> {
    let (base, quote) = symbol.split_once(delimiter)?;
    (is_currency_code(base) && is_currency_code(quote)).then_some((base, quote))
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forex_pair_maps_to_dot() {
        assert_eq!(to_dotted("EUR/USD"), "EUR.USD");
        assert_eq!(from_dotted("EUR.USD"), "EUR/USD");
    }

    #[test]
    fn stocks_pass_through() {
        assert_eq!(to_dotted("AAPL"), "AAPL");
        assert_eq!(from_dotted("AAPL"), "AAPL");
    }

    #[test]
    fn share_class_is_not_a_pair() {
        assert_eq!(from_dotted("BRK.B"), "BRK.B");
        assert_eq!(to_dotted("BRK.B"), "BRK.B");
    }

    #[test]
    fn dotted_three_letter_ticker_reads_back_as_pair() {
        assert_eq!(to_dotted("ABC.DEF"), "ABC.DEF");
        assert_eq!(from_dotted(&to_dotted("ABC.DEF")), "ABC/DEF");
    }

    #[test]
    fn pair_detection() {
        assert!(is_currency_pair("GBP/JPY"));
        assert!(!is_currency_pair("GBPJPY"));
        assert!(!is_currency_pair("GB/JPY"));
    }
}

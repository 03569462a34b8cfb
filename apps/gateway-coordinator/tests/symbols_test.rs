//! Property tests for canonical ⇄ broker symbol translation.

use proptest::prelude::*;

use gateway_coordinator::application::ports::symbols::{from_dotted, is_currency_pair, to_dotted};

proptest! {
    #[test]
    fn currency_pairs_round_trip(base in "[A-Z]{3}", quote in "[A-Z]{3}") {
        let canonical = format!("{base}/{quote}");
        let broker = to_dotted(&canonical);

        prop_assert_eq!(&broker, &format!("{base}.{quote}"));
        prop_assert_eq!(from_dotted(&broker), canonical.clone());
        prop_assert!(is_currency_pair(&canonical));
    }

    #[test]
    fn plain_tickers_pass_through(ticker in "[A-Z]{1,5}") {
        prop_assert_eq!(to_dotted(&ticker), ticker.clone());
        prop_assert_eq!(from_dotted(&ticker), ticker.clone());
        prop_assert!(!is_currency_pair(&ticker));
    }

    #[test]
    fn share_classes_survive_both_directions(root in "[A-Z]{1,4}", class in "[A-Z]") {
        let symbol = format!("{root}.{class}");

        prop_assert_eq!(from_dotted(&symbol), symbol.clone());
        prop_assert_eq!(to_dotted(&symbol), symbol.clone());
    }
}

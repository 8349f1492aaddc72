#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use adradar_contracts::bid::Bid;
use adradar_contracts::display::{DisplayKind, SlotDisplay};

pub const NO_INFORMATION_TEXT: &str = "No information found for this ad";

pub const CPM_DIGITS: usize = 3;

/// Digits of the full decimal expansion of any finite `f64`.
const EXACT_DIGITS: usize = 1100;

/// Fixed-point text for `value`, rounding exact halves away from zero the
/// way page scripts print prices (`0.0625` becomes `0.063`).
pub fn to_fixed(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let exact = format!("{:.*}", EXACT_DIGITS, value.abs());
    let Some((whole, frac)) = exact.split_once('.') else {
        return format!("{value:.digits$}");
    };
    let tie = frac.as_bytes().get(digits) == Some(&b'5')
        && frac.bytes().skip(digits + 1).all(|b| b == b'0');
    if !tie {
        return format!("{value:.digits$}");
    }

    let mut kept: Vec<u8> = whole.bytes().chain(frac.bytes().take(digits)).collect();
    let mut i = kept.len();
    loop {
        if i == 0 {
            kept.insert(0, b'1');
            break;
        }
        i -= 1;
        if kept[i] == b'9' {
            kept[i] = b'0';
        } else {
            kept[i] += 1;
            break;
        }
    }

    let split = kept.len() - digits;
    let mut out = String::with_capacity(kept.len() + 2);
    if value.is_sign_negative() {
        out.push('-');
    }
    out.extend(kept[..split].iter().map(|&b| b as char));
    if digits > 0 {
        out.push('.');
        out.extend(kept[split..].iter().map(|&b| b as char));
    }
    out
}

pub fn winning_bid_text(bid: &Bid) -> String {
    format!(
        "CPM of {} {} paid via {}",
        to_fixed(bid.cpm(), CPM_DIGITS),
        bid.currency(),
        bid.bidder()
    )
}

pub fn non_winning_bid_text(bid: &Bid) -> String {
    format!(
        "CPM of at least {} {}",
        to_fixed(bid.cpm(), CPM_DIGITS),
        bid.currency()
    )
}

/// Picks what to show for a slot from its live bids, given in insertion order.
///
/// Winning bids always take precedence, most recent first. Otherwise the
/// highest cpm is shown, unless currencies differ, in which case prices are
/// not comparable and the first bid seen is shown instead.
pub fn select_display(bids: &[&Bid]) -> SlotDisplay {
    if let Some(winner) = latest_winning(bids) {
        return SlotDisplay {
            kind: DisplayKind::Winning,
            text: winning_bid_text(winner),
            priced: true,
            bid: Some(winner.clone()),
        };
    }

    let Some(first) = bids.first() else {
        return SlotDisplay {
            kind: DisplayKind::NoInformation,
            text: NO_INFORMATION_TEXT.to_string(),
            priced: false,
            bid: None,
        };
    };

    let currencies: BTreeSet<&str> = bids.iter().map(|b| b.currency()).collect();
    let shown = if currencies.len() > 1 {
        *first
    } else {
        // Ties go to the later bid.
        bids.iter()
            .copied()
            .fold(*first, |best, b| if best.cpm() > b.cpm() { best } else { b })
    };
    SlotDisplay {
        kind: DisplayKind::LowerBound,
        text: non_winning_bid_text(shown),
        priced: true,
        bid: Some(shown.clone()),
    }
}

/// Greatest `time` among winning bids; ties keep the earliest inserted.
fn latest_winning<'a>(bids: &[&'a Bid]) -> Option<&'a Bid> {
    bids.iter()
        .copied()
        .filter(|b| b.won())
        .fold(None, |best: Option<&Bid>, b| match best {
            Some(current) if current.time() >= b.time() => Some(current),
            _ => Some(b),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adradar_contracts::bid::UnitCode;
    use adradar_contracts::TimestampMs;

    fn bid(cpm: f64, currency: &str, won: bool, time: u64, bidder: &str) -> Bid {
        Bid::v1(
            UnitCode::new("unit").unwrap(),
            bidder.to_string(),
            cpm,
            currency.to_string(),
            won,
            "pbjs".to_string(),
            TimestampMs(time),
        )
        .unwrap()
    }

    #[test]
    fn at_display_01_no_bids_means_no_information() {
        let d = select_display(&[]);
        assert_eq!(d.kind, DisplayKind::NoInformation);
        assert_eq!(d.text, NO_INFORMATION_TEXT);
        assert!(!d.priced);
    }

    #[test]
    fn at_display_02_mixed_currencies_show_first_inserted() {
        let usd = bid(1.5, "USD", false, 0, "a");
        let eur = bid(2.0, "EUR", false, 1, "b");
        let d = select_display(&[&usd, &eur]);
        assert_eq!(d.text, "CPM of at least 1.500 USD");
        assert_eq!(d.bid.as_ref(), Some(&usd));
    }

    #[test]
    fn at_display_03_same_currency_shows_highest_cpm() {
        let low = bid(1.5, "USD", false, 0, "a");
        let high = bid(2.0, "USD", false, 1, "b");
        let d = select_display(&[&low, &high]);
        assert_eq!(d.kind, DisplayKind::LowerBound);
        assert_eq!(d.text, "CPM of at least 2.000 USD");
    }

    #[test]
    fn at_display_04_winner_beats_higher_cpm() {
        let loser = bid(5.0, "USD", false, 0, "a");
        let winner = bid(1.0, "USD", true, 0, "rubicon");
        let d = select_display(&[&loser, &winner]);
        assert_eq!(d.kind, DisplayKind::Winning);
        assert_eq!(d.text, "CPM of 1.000 USD paid via rubicon");
    }

    #[test]
    fn at_display_05_latest_winner_and_stable_ties() {
        let early = bid(1.0, "USD", true, 10, "early");
        let late = bid(2.0, "USD", true, 20, "late");
        let tie = bid(3.0, "USD", true, 20, "tie");
        assert_eq!(select_display(&[&early, &late, &tie]).bid.unwrap().bidder(), "late");
    }

    #[test]
    fn at_display_06_equal_cpm_prefers_later_bid() {
        let a = bid(2.0, "USD", false, 0, "a");
        let b = bid(2.0, "USD", false, 1, "b");
        assert_eq!(select_display(&[&a, &b]).bid.unwrap().bidder(), "b");
    }

    #[test]
    fn at_display_07_exact_halves_round_up() {
        assert_eq!(to_fixed(0.0625, 3), "0.063");
        assert_eq!(to_fixed(1.0625, 3), "1.063");
        assert_eq!(to_fixed(0.3125, 3), "0.313");
        assert_eq!(to_fixed(-0.0625, 3), "-0.063");
        assert_eq!(to_fixed(9.5, 0), "10");
        assert_eq!(to_fixed(2.5, 0), "3");
        // Not exact halves in binary; plain nearest rounding applies.
        assert_eq!(to_fixed(1.0005, 3), "1.000");
        assert_eq!(to_fixed(0.9995, 3), "1.000");
        assert_eq!(to_fixed(1.25, 3), "1.250");

        let b = bid(0.0625, "USD", false, 0, "a");
        assert_eq!(non_winning_bid_text(&b), "CPM of at least 0.063 USD");
        let w = bid(1.0625, "EUR", true, 0, "ix");
        assert_eq!(winning_bid_text(&w), "CPM of 1.063 EUR paid via ix");
    }
}

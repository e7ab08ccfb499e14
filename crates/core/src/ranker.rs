//! Opportunity ranking.
//!
//! Candidates are ordered by outstanding debt, largest first. The debt is
//! compared as a 256-bit integer, never as a string. Ties keep feed order.

use liquidator_api::Position;

/// Order candidates by descending debt amount (stable).
pub fn rank(mut positions: Vec<Position>) -> Vec<Position> {
    positions.sort_by(|a, b| b.debt_amount.cmp(&a.debt_amount));
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn position(id: &str, debt: u64) -> Position {
        Position {
            account_id: id.to_string(),
            health_factor: 0.9,
            collateral_asset_id: "0xC".to_string(),
            debt_asset_id: "0xD".to_string(),
            debt_amount: U256::from(debt),
        }
    }

    fn ids(positions: &[Position]) -> Vec<&str> {
        positions.iter().map(|p| p.account_id.as_str()).collect()
    }

    #[test]
    fn test_largest_debt_first() {
        let ranked = rank(vec![position("0xAAA", 1000), position("0xBBB", 5000)]);
        assert_eq!(ids(&ranked), vec!["0xBBB", "0xAAA"]);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        let ranked = rank(vec![
            position("a", 900),
            position("b", 1000),
            position("c", 85),
        ]);
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_ties_keep_feed_order() {
        let ranked = rank(vec![
            position("first", 10),
            position("big", 50),
            position("second", 10),
            position("third", 10),
        ]);
        assert_eq!(ids(&ranked), vec!["big", "first", "second", "third"]);
    }

    #[test]
    fn test_wide_amounts() {
        let mut huge = position("huge", 0);
        huge.debt_amount = U256::from(u128::MAX) * U256::from(4u8);
        let ranked = rank(vec![position("small", u64::MAX), huge]);
        assert_eq!(ids(&ranked), vec!["huge", "small"]);
    }

    #[test]
    fn test_empty() {
        assert!(rank(Vec::new()).is_empty());
    }

    #[test]
    fn test_permutation_sorted_and_stable() {
        // Deterministic pseudo-random input with many duplicate amounts
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let input: Vec<Position> = (0..200)
            .map(|i| {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                position(&format!("{i}"), seed % 25)
            })
            .collect();

        let ranked = rank(input.clone());
        assert_eq!(ranked.len(), input.len());

        let mut sorted_ids: Vec<_> = ids(&ranked);
        sorted_ids.sort();
        let mut input_ids: Vec<_> = ids(&input);
        input_ids.sort();
        assert_eq!(sorted_ids, input_ids);

        for pair in ranked.windows(2) {
            assert!(pair[0].debt_amount >= pair[1].debt_amount);
            if pair[0].debt_amount == pair[1].debt_amount {
                let a: usize = pair[0].account_id.parse().unwrap();
                let b: usize = pair[1].account_id.parse().unwrap();
                assert!(a < b, "tie order changed: {a} before {b}");
            }
        }
    }
}

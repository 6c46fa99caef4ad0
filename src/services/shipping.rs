//! Proportional split of a purchase's shipping cost over its lines.

/// Splits `total_cost` over lines in proportion to their quantities.
///
/// Every line but the last gets `floor(total_cost * qty / total_qty)`; the
/// last line takes whatever is left, so the shares always sum to
/// `total_cost`. When the quantities sum to zero every share is zero.
pub fn allocate_shipping(total_cost: i64, quantities: &[i32]) -> Vec<i64> {
    let total_quantity: i128 = quantities.iter().map(|q| i128::from(*q)).sum();
    if quantities.is_empty() {
        return Vec::new();
    }
    if total_quantity == 0 {
        return vec![0; quantities.len()];
    }

    let last = quantities.len() - 1;
    let mut shares = Vec::with_capacity(quantities.len());
    let mut allocated: i64 = 0;
    for quantity in &quantities[..last] {
        let share = (i128::from(total_cost) * i128::from(*quantity)).div_euclid(total_quantity);
        // |share| <= |total_cost| when quantities are non-negative
        let share = share as i64;
        allocated += share;
        shares.push(share);
    }
    shares.push(total_cost - allocated);
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn remainder_goes_to_last_line() {
        assert_eq!(
            allocate_shipping(100_000, &[1, 1, 1]),
            vec![33_333, 33_333, 33_334]
        );
    }

    #[test]
    fn single_line_takes_everything() {
        assert_eq!(allocate_shipping(15_000, &[10]), vec![15_000]);
    }

    #[test]
    fn splits_by_quantity_share() {
        assert_eq!(allocate_shipping(30_000, &[10, 5]), vec![20_000, 10_000]);
        assert_eq!(allocate_shipping(100_000, &[10, 10]), vec![50_000, 50_000]);
    }

    #[test]
    fn order_decides_who_absorbs_rounding() {
        assert_eq!(allocate_shipping(10, &[1, 2]), vec![3, 7]);
        assert_eq!(allocate_shipping(10, &[2, 1]), vec![6, 4]);
    }

    #[test]
    fn zero_total_quantity_drops_the_cost() {
        // Nothing to carry the cost; it is not attributed to any line.
        assert_eq!(allocate_shipping(5_000, &[0, 0]), vec![0, 0]);
        assert!(allocate_shipping(5_000, &[]).is_empty());
    }

    #[test]
    fn zero_cost_allocates_zeros() {
        assert_eq!(allocate_shipping(0, &[3, 4, 5]), vec![0, 0, 0]);
    }

    proptest! {
        #[test]
        fn shares_sum_to_total(
            total in 0i64..10_000_000_000,
            quantities in prop::collection::vec(0i32..100_000, 1..20),
        ) {
            prop_assume!(quantities.iter().any(|q| *q > 0));
            let shares = allocate_shipping(total, &quantities);
            prop_assert_eq!(shares.len(), quantities.len());
            prop_assert_eq!(shares.iter().sum::<i64>(), total);
        }

        #[test]
        fn leading_shares_are_floored_and_non_negative(
            total in 0i64..1_000_000,
            quantities in prop::collection::vec(1i32..1_000, 1..10),
        ) {
            let shares = allocate_shipping(total, &quantities);
            let total_quantity: i64 = quantities.iter().map(|q| i64::from(*q)).sum();
            for (share, quantity) in shares.iter().zip(&quantities).take(quantities.len() - 1) {
                prop_assert_eq!(*share, total * i64::from(*quantity) / total_quantity);
            }
            prop_assert!(shares.iter().all(|s| *s >= 0));
        }
    }
}

//! Deterministic round-robin schedule generation
//!
//! A round-robin over `n` participants with `k`-player matches is every
//! distinct `k`-subset of participant indices exactly once, emitted in
//! lexicographic order of the index tuples (registration order).

/// Number of matches in a round-robin: C(n, k).
///
/// Saturates at `u64::MAX` instead of overflowing.
pub fn calculate_match_count(participant_count: usize, group_size: usize) -> u64 {
    if group_size == 0 || group_size > participant_count {
        return 0;
    }
    let n = participant_count as u128;
    let k = group_size.min(participant_count - group_size) as u128;
    let mut result = 1u128;
    for i in 0..k {
        // result * (n - i) / (i + 1) stays integral at every step, and result
        // fits in u64 between steps so the product fits in u128
        result = result * (n - i) / (i + 1);
        if result > u128::from(u64::MAX) {
            return u64::MAX;
        }
    }
    result as u64
}

/// Generate every `group_size`-subset of `0..participant_count`.
///
/// Each group is ascending; groups are in lexicographic order.
pub fn generate_all_groups(participant_count: usize, group_size: usize) -> Vec<Vec<usize>> {
    let n = participant_count;
    let k = group_size;
    if k == 0 || k > n {
        return Vec::new();
    }

    let total = calculate_match_count(n, k);
    let mut groups = Vec::with_capacity(usize::try_from(total).unwrap_or(0));
    let mut current: Vec<usize> = (0..k).collect();

    loop {
        groups.push(current.clone());

        // Rightmost position that can still be advanced
        let Some(pos) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            break;
        };
        current[pos] += 1;
        for i in pos + 1..k {
            current[i] = current[i - 1] + 1;
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_tournament() {
        assert!(generate_all_groups(0, 2).is_empty());
        assert!(generate_all_groups(1, 2).is_empty());
        assert!(generate_all_groups(2, 3).is_empty());
        assert!(generate_all_groups(5, 0).is_empty());
    }

    #[test]
    fn test_two_players() {
        assert_eq!(generate_all_groups(2, 2), vec![vec![0, 1]]);
    }

    #[test]
    fn test_pairs_order() {
        assert_eq!(
            generate_all_groups(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
    }

    #[test]
    fn test_triples_order() {
        assert_eq!(
            generate_all_groups(4, 3),
            vec![vec![0, 1, 2], vec![0, 1, 3], vec![0, 2, 3], vec![1, 2, 3]]
        );
    }

    #[test]
    fn test_match_count_round_robin() {
        assert_eq!(calculate_match_count(10, 2), 45);
        assert_eq!(calculate_match_count(10, 3), 120);
        assert_eq!(calculate_match_count(3, 3), 1);
        assert_eq!(calculate_match_count(2, 3), 0);
        assert_eq!(calculate_match_count(0, 0), 0);
    }

    #[test]
    fn test_match_count_saturates() {
        assert_eq!(calculate_match_count(usize::MAX, 5), u64::MAX);
        assert_eq!(calculate_match_count(68, 34), u64::MAX);
    }

    #[test]
    fn test_match_count_near_u64_limit_is_exact() {
        // Intermediate products pass u64 well before the result does
        assert_eq!(calculate_match_count(67, 33), 14_226_520_737_620_288_370);
        assert_eq!(calculate_match_count(67, 34), 14_226_520_737_620_288_370);
    }

    #[test]
    fn test_pairing_determinism() {
        assert_eq!(generate_all_groups(9, 3), generate_all_groups(9, 3));
    }

    proptest! {
        #[test]
        fn prop_groups_match_binomial(n in 0usize..14, k in 1usize..5) {
            let groups = generate_all_groups(n, k);
            prop_assert_eq!(groups.len() as u64, calculate_match_count(n, k));

            let unique: HashSet<_> = groups.iter().cloned().collect();
            prop_assert_eq!(unique.len(), groups.len());

            for g in &groups {
                prop_assert_eq!(g.len(), k);
                prop_assert!(g.windows(2).all(|w| w[0] < w[1]));
                prop_assert!(g.iter().all(|&i| i < n));
            }
            prop_assert!(groups.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Standing {
    pub(crate) rank: i64,
    pub(crate) percentile: f64,
}

/// Comparative standing of one percentage against the full submitted
/// population for the same test pattern, the attempt itself included.
///
/// Rank is competition style: ties share a rank and the next distinct score
/// skips the shared positions. Percentile is the share of the rest of the
/// population scoring strictly below; a population of one is the 100th
/// percentile by definition. Derivable from stored attempts alone, so
/// re-running it over a grown population re-ranks everyone consistently.
pub(crate) fn standing(percentage: f64, population: &[f64]) -> Standing {
    let above = population.iter().filter(|p| **p > percentage).count() as i64;
    let below = population.iter().filter(|p| **p < percentage).count();

    let percentile = if population.len() <= 1 {
        100.0
    } else {
        below as f64 * 100.0 / (population.len() - 1) as f64
    };

    Standing { rank: 1 + above, percentile }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_attempt_population() {
        let standing = standing(42.0, &[42.0]);
        assert_eq!(standing.rank, 1);
        assert_eq!(standing.percentile, 100.0);
    }

    #[test]
    fn ties_share_competition_rank() {
        // 90, 80, 80, 60: both 80s rank 2, the 60 ranks 4.
        let population = [90.0, 80.0, 80.0, 60.0];
        assert_eq!(standing(80.0, &population).rank, 2);
        assert_eq!(standing(60.0, &population).rank, 4);
        assert_eq!(standing(90.0, &population).rank, 1);
    }

    #[test]
    fn percentile_counts_strictly_below() {
        let population = [90.0, 80.0, 80.0, 60.0];
        let s = standing(80.0, &population);
        // Only the 60 is strictly below, out of three others.
        assert!((s.percentile - 100.0 / 3.0).abs() < 1e-9);

        let top = standing(90.0, &population);
        assert_eq!(top.percentile, 100.0);

        let bottom = standing(60.0, &population);
        assert_eq!(bottom.percentile, 0.0);
    }

    #[test]
    fn recomputing_over_grown_population_reranks() {
        let before = standing(75.0, &[75.0, 50.0]);
        assert_eq!(before.rank, 1);

        let after = standing(75.0, &[75.0, 50.0, 95.0]);
        assert_eq!(after.rank, 2);
        assert_eq!(after.percentile, 50.0);
    }
}

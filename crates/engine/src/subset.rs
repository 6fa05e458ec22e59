//! Bounded depth-first subset-sum search used by the split/merge pass.

use crate::progress::CancelToken;

/// One poolable item: an opaque key (a position in the caller's slice) and
/// its amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub key: usize,
    pub cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Keys of the first subset found, in descending-amount order.
    Found(Vec<usize>),
    NotFound,
    Cancelled,
}

/// Finds a subset of a pool whose total lands within tolerance of a target.
///
/// The first subset found wins; this is not an optimal-subset search. The pool
/// is explored largest amount first so sums settle quickly, and the depth cap
/// keeps the exponential worst case small.
#[derive(Debug, Clone)]
pub struct SubsetSearch<'a> {
    max_depth: usize,
    tolerance_cents: i64,
    min_items: usize,
    cancel: Option<&'a CancelToken>,
}

impl<'a> SubsetSearch<'a> {
    /// `tolerance_cents` is an exclusive bound: a sum matches when
    /// `|sum - target| < tolerance_cents`.
    pub fn new(max_depth: usize, tolerance_cents: i64) -> Self {
        Self {
            max_depth,
            tolerance_cents,
            min_items: 1,
            cancel: None,
        }
    }

    /// Subsets smaller than this are never accepted.
    pub fn with_min_items(mut self, min_items: usize) -> Self {
        self.min_items = min_items;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn find(&self, pool: &[Candidate], target_cents: i64) -> SearchOutcome {
        if self.max_depth == 0 || self.min_items > self.max_depth {
            return SearchOutcome::NotFound;
        }

        let mut sorted = pool.to_vec();
        // Stable: equal amounts keep the caller's (date-proximity) order.
        sorted.sort_by(|a, b| b.cents.cmp(&a.cents));

        let mut picked = Vec::with_capacity(self.max_depth.min(pool.len()));
        match self.descend(&sorted, target_cents, 0, self.max_depth, 0, &mut picked) {
            Step::Found => SearchOutcome::Found(picked.iter().map(|&i| sorted[i].key).collect()),
            Step::Exhausted => SearchOutcome::NotFound,
            Step::Cancelled => SearchOutcome::Cancelled,
        }
    }

    fn descend(
        &self,
        pool: &[Candidate],
        target: i64,
        start: usize,
        depth_left: usize,
        sum: i64,
        picked: &mut Vec<usize>,
    ) -> Step {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Step::Cancelled;
        }
        if picked.len() >= self.min_items && (sum - target).abs() < self.tolerance_cents {
            return Step::Found;
        }
        if depth_left == 0 || sum - target > self.tolerance_cents {
            return Step::Exhausted;
        }

        let ceiling = target + self.tolerance_cents;
        for i in start..pool.len() {
            let next = sum + pool[i].cents;
            if next > ceiling {
                continue;
            }
            picked.push(i);
            match self.descend(pool, target, i + 1, depth_left - 1, next, picked) {
                Step::Exhausted => {
                    picked.pop();
                }
                done => return done,
            }
        }
        Step::Exhausted
    }
}

enum Step {
    Found,
    Exhausted,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(amounts: &[i64]) -> Vec<Candidate> {
        amounts
            .iter()
            .enumerate()
            .map(|(key, &cents)| Candidate { key, cents })
            .collect()
    }

    fn keys(outcome: SearchOutcome) -> Vec<usize> {
        match outcome {
            SearchOutcome::Found(mut k) => {
                k.sort_unstable();
                k
            }
            other => panic!("expected a subset, got {other:?}"),
        }
    }

    #[test]
    fn finds_full_pool_for_split_scenario() {
        let search = SubsetSearch::new(4, 1).with_min_items(2);
        let found = keys(search.find(&pool(&[3000, 4000, 3000]), 10000));
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn returns_first_found_not_smallest() {
        // Descending order tries 60 first, then 60+30+10 before 50+50.
        let search = SubsetSearch::new(4, 1).with_min_items(2);
        let found = search.find(&pool(&[5000, 5000, 6000, 3000, 1000]), 10000);
        assert_eq!(found, SearchOutcome::Found(vec![2, 3, 4]));
    }

    #[test]
    fn respects_depth_cap() {
        let amounts = [2500, 2500, 2500, 2500];
        assert!(matches!(
            SubsetSearch::new(4, 1).find(&pool(&amounts), 10000),
            SearchOutcome::Found(_)
        ));
        assert_eq!(
            SubsetSearch::new(2, 1).find(&pool(&amounts), 10000),
            SearchOutcome::NotFound
        );
    }

    #[test]
    fn tolerance_is_exclusive() {
        let search = SubsetSearch::new(3, 1).with_min_items(2);
        assert_eq!(search.find(&pool(&[5000, 4999]), 10000), SearchOutcome::NotFound);

        let loose = SubsetSearch::new(3, 2).with_min_items(2);
        assert!(matches!(loose.find(&pool(&[5000, 4999]), 10000), SearchOutcome::Found(_)));
    }

    #[test]
    fn min_items_rejects_single_exact_item() {
        let search = SubsetSearch::new(4, 1).with_min_items(2);
        assert_eq!(search.find(&pool(&[10000]), 10000), SearchOutcome::NotFound);
        assert_eq!(
            SubsetSearch::new(4, 1).find(&pool(&[10000]), 10000),
            SearchOutcome::Found(vec![0])
        );
    }

    #[test]
    fn skips_oversized_items_but_keeps_searching() {
        let search = SubsetSearch::new(3, 1).with_min_items(2);
        let found = keys(search.find(&pool(&[20000, 7000, 3000]), 10000));
        assert_eq!(found, vec![1, 2]);
    }

    #[test]
    fn zero_depth_never_matches() {
        assert_eq!(SubsetSearch::new(0, 1).find(&pool(&[100, 100]), 200), SearchOutcome::NotFound);
    }

    #[test]
    fn empty_pool() {
        assert_eq!(
            SubsetSearch::new(4, 1).with_min_items(2).find(&[], 100),
            SearchOutcome::NotFound
        );
    }

    #[test]
    fn cancellation_stops_search() {
        let token = CancelToken::new();
        token.cancel();
        let search = SubsetSearch::new(4, 1).with_cancel(&token);
        assert_eq!(search.find(&pool(&[100, 200]), 300), SearchOutcome::Cancelled);
    }
}

//! Weighted random choice of the quote shown on the home page.
//!
//! Selection runs on every request against the full `(id, weight)`
//! projection; nothing is cached.

use rand::{
  Rng,
  distributions::{Distribution, WeightedIndex},
};

/// The weight actually used for sampling. Stored weights below 1 are corrupt
/// and count as 1 so the quote is never excluded.
pub fn effective_weight(weight: i64) -> u64 { weight.max(1).unsigned_abs() }

/// Pick one id from `candidates` (pairs of `(quote_id, weight)`) with
/// probability proportional to its effective weight.
///
/// Returns `None` only for an empty slice.
pub fn pick<R>(candidates: &[(i64, i64)], rng: &mut R) -> Option<i64>
where
  R: Rng + ?Sized,
{
  if candidates.is_empty() {
    return None;
  }
  let index =
    match WeightedIndex::new(candidates.iter().map(|&(_, w)| effective_weight(w))) {
      Ok(weights) => weights.sample(rng),
      // The weights overflow u64 when summed; fall back to a uniform pick.
      Err(_) => rng.gen_range(0..candidates.len()),
    };
  Some(candidates[index].0)
}

#[cfg(test)]
mod tests {
  use rand::{SeedableRng, rngs::StdRng};

  use super::*;

  fn rng() -> StdRng { StdRng::seed_from_u64(0x5eed) }

  #[test]
  fn empty_input_selects_nothing() {
    assert_eq!(pick(&[], &mut rng()), None);
  }

  #[test]
  fn single_candidate_is_always_chosen() {
    let mut rng = rng();
    for _ in 0..50 {
      assert_eq!(pick(&[(7, 3)], &mut rng), Some(7));
    }
  }

  #[test]
  fn non_positive_weights_count_as_one() {
    assert_eq!(effective_weight(0), 1);
    assert_eq!(effective_weight(-40), 1);
    assert_eq!(effective_weight(5), 5);

    let candidates = [(1, 0), (2, -5), (3, i64::MIN)];
    let mut rng = rng();
    let mut seen = [0usize; 3];
    for _ in 0..3_000 {
      let id = pick(&candidates, &mut rng).unwrap();
      seen[(id - 1) as usize] += 1;
    }
    assert!(seen.iter().all(|&n| n > 800), "counts: {seen:?}");
  }

  #[test]
  fn heavier_quotes_win_proportionally() {
    let candidates = [(1, 1), (2, 9)];
    let mut rng = rng();
    let heavy = (0..10_000)
      .filter(|_| pick(&candidates, &mut rng) == Some(2))
      .count();
    assert!((8_700..=9_300).contains(&heavy), "heavy picked {heavy} times");
  }
}

use rand::Rng;

/// Picks one candidate with probability proportional to its count.
///
/// Candidates are walked in the order given, against a single uniform
/// draw in `[0, total)`:
/// - exactly one `f64` is taken from `rng` per call
/// - the first candidate whose cumulative count exceeds the draw wins
///
/// The same candidates and the same random stream therefore always give
/// the same pick.
///
/// Returns `None` if there are no candidates or every count is zero.
pub(crate) fn weighted_choice<'a, T, R>(candidates: &'a [(T, u64)], rng: &mut R) -> Option<&'a T>
where
	R: Rng + ?Sized,
{
	let total: u64 = candidates.iter().map(|(_, count)| count).sum();
	if total == 0 {
		return None;
	}

	let point = rng.random::<f64>() * total as f64;

	let mut cumulative = 0u64;
	for (item, count) in candidates {
		cumulative += count;
		if point < cumulative as f64 {
			return Some(item);
		}
	}

	// Only reachable through float rounding right at the top of the range.
	candidates.iter().rev().find(|(_, count)| *count > 0).map(|(item, _)| item)
}

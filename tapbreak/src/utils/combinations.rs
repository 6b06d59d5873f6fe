use itertools::Itertools;

/// Number of ways to choose `k` items out of `n`, saturating at `usize::MAX`.
pub fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    // acc is C(n, i) after step i
    let count = (0..k).fold(1u128, |acc, i| acc * (n - i) as u128 / (i + 1) as u128);
    usize::try_from(count).unwrap_or(usize::MAX)
}

/// Every `k`-subset of `0..n` as a bit mask, in lexicographic order of the
/// sorted index lists: `{0,1,..,k-1}` first, `{n-k,..,n-1}` last.
pub fn subset_masks(n: usize, k: usize) -> Vec<u64> {
    assert!(n <= u64::BITS as usize, "index range too wide for a mask");
    (0..n)
        .combinations(k)
        .map(|idx| idx.iter().fold(0u64, |mask, &i| mask | (1u64 << i)))
        .collect()
}

use bytes::Bytes;

/// Resolves a `[start, end]` argument window the way Redis-family command
/// tables specify key positions: non-negative indices count from the
/// front, negative indices count from the end (`-1` is the last element),
/// and the window is inclusive on both ends. Returns an empty slice if the
/// resolved window is out of order or `argv` is too short to contain it.
pub fn arg_window(argv: &[Bytes], start: isize, end: isize) -> &[Bytes] {
    let len = argv.len() as isize;
    let resolve = |i: isize| -> isize {
        if i < 0 {
            len + i
        } else {
            i
        }
    };
    let start = resolve(start).max(0);
    let end = resolve(end).min(len - 1);
    if start > end || start >= len || end < 0 {
        return &[];
    }
    &argv[start as usize..=end as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(n: usize) -> Vec<Bytes> {
        (0..n).map(|i| Bytes::from(i.to_string())).collect()
    }

    #[test]
    fn positive_bounds_are_inclusive() {
        let a = argv(5);
        let w = arg_window(&a, 1, 3);
        assert_eq!(w, &a[1..=3]);
    }

    #[test]
    fn negative_end_counts_from_the_back() {
        let a = argv(5);
        let w = arg_window(&a, 0, -1);
        assert_eq!(w, &a[..]);
    }

    #[test]
    fn negative_start_and_end() {
        let a = argv(6);
        let w = arg_window(&a, -3, -1);
        assert_eq!(w, &a[3..=5]);
    }

    #[test]
    fn out_of_order_window_is_empty() {
        let a = argv(5);
        assert!(arg_window(&a, 3, 1).is_empty());
    }

    #[test]
    fn window_past_the_end_is_empty() {
        let a = argv(3);
        assert!(arg_window(&a, 5, 10).is_empty());
    }
}

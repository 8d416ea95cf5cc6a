use std::cmp::Ordering;

/// Key ordering for an index, fixed at tree construction. Keys are opaque
/// byte strings; the comparator decides their order.
pub type KeyComparator = fn(&[u8], &[u8]) -> Ordering;

/// Lexicographic byte order.
pub fn default_comparator(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Reversed lexicographic byte order.
pub fn reverse_comparator(a: &[u8], b: &[u8]) -> Ordering {
    b.cmp(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparators() {
        assert_eq!(default_comparator(b"abc", b"abd"), Ordering::Less);
        assert_eq!(default_comparator(b"abc", b"abc"), Ordering::Equal);
        assert_eq!(reverse_comparator(b"abc", b"abd"), Ordering::Greater);
    }
}

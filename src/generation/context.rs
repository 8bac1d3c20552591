//! Sliding context window over prior chapter material.

/// Bounded-recency selection used when feeding prior outlines and chapters
/// back into prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    size: usize,
}

impl ContextWindow {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The trailing `min(len, size)` elements; empty when size is zero
    pub fn latest<'a, T>(&self, seq: &'a [T]) -> &'a [T] {
        latest(seq, self.size)
    }
}

pub fn latest<T>(seq: &[T], n: usize) -> &[T] {
    &seq[seq.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_latest_basic() {
        let seq = [1, 2, 3, 4, 5];
        assert_eq!(latest(&seq, 3), &[3, 4, 5]);
        assert_eq!(latest(&seq, 10), &seq);
        assert!(latest(&seq, 0).is_empty());
    }

    #[test]
    fn test_window_on_empty() {
        let seq: [u8; 0] = [];
        assert!(ContextWindow::new(3).latest(&seq).is_empty());
    }

    proptest! {
        #[test]
        fn test_latest_is_bounded_suffix(seq in proptest::collection::vec(any::<u16>(), 0..50), n in 0usize..60) {
            let window = ContextWindow::new(n).latest(&seq);
            prop_assert_eq!(window.len(), seq.len().min(n));
            prop_assert!(seq.ends_with(window));
        }
    }
}

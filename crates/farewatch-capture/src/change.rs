//! Forwards a snapshot only when its content differs from the previous one.

/// Remembers the last fragment list seen.
#[derive(Debug, Default, Clone)]
pub struct ChangeDetector {
    last: Option<Vec<String>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and remembers `fragments` if they differ from the last call.
    pub fn is_changed(&mut self, fragments: &[String]) -> bool {
        if self.last.as_deref() == Some(fragments) {
            return false;
        }
        self.last = Some(fragments.to_vec());
        true
    }

    /// Forget the last snapshot so the next one always counts as changed.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_snapshot_is_changed() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_changed(&frags(&["R$ 15,00"])));
    }

    #[test]
    fn test_identical_snapshot_is_not_changed() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_changed(&frags(&["R$ 15,00", "2,5 km"])));
        assert!(!detector.is_changed(&frags(&["R$ 15,00", "2,5 km"])));
        assert!(detector.is_changed(&frags(&["R$ 16,00", "2,5 km"])));
    }

    #[test]
    fn test_order_matters() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_changed(&frags(&["a", "b"])));
        assert!(detector.is_changed(&frags(&["b", "a"])));
    }

    #[test]
    fn test_empty_snapshot_after_content_is_changed() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_changed(&frags(&["a"])));
        assert!(detector.is_changed(&[]));
        assert!(!detector.is_changed(&[]));
    }

    #[test]
    fn test_reset() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_changed(&frags(&["a"])));
        detector.reset();
        assert!(detector.is_changed(&frags(&["a"])));
    }
}

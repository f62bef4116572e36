//! Explicit warning accumulator threaded through a run.

use crate::model::Discrepancy;
use tracing::warn;

/// Soft failures and detected drift collected during one run.
///
/// Every recorded warning is also emitted through `tracing`. The final
/// [`Warnings::count`] is the signal that something changed.
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(message);
    }

    /// Records each discrepancy as a warning, in order.
    pub fn record_discrepancies(&mut self, discrepancies: &[Discrepancy]) {
        for discrepancy in discrepancies {
            self.warn(discrepancy.to_string());
        }
    }

    /// Appends warnings gathered elsewhere (e.g. by a concurrent task)
    /// without logging them a second time.
    pub fn merge(&mut self, other: Warnings) {
        self.messages.extend(other.messages);
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiscrepancyKind;

    #[test]
    fn test_warn_and_merge_keep_order() {
        let mut first = Warnings::new();
        first.warn("one");

        let mut second = Warnings::new();
        second.warn("two");
        second.warn("three");

        first.merge(second);
        assert_eq!(first.count(), 3);
        assert_eq!(first.messages(), &["one", "two", "three"]);
    }

    #[test]
    fn test_record_discrepancies() {
        let mut warnings = Warnings::new();
        warnings.record_discrepancies(&[Discrepancy {
            kind: DiscrepancyKind::FileVanished,
            location: "app".to_string(),
            message: "File 'index.js' no longer present in 'app'".to_string(),
        }]);

        assert_eq!(warnings.count(), 1);
        assert!(warnings.messages()[0].starts_with("[file-vanished]"));
    }
}

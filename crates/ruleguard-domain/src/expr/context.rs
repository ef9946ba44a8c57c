//! Evaluation context shared by every node of a compiled expression.

/// Collects failure reasons while a condition tree evaluates.
///
/// Reasons explain a fail outcome to the user; they are diagnostics only and
/// never feed back into the result.
#[derive(Debug, Default)]
pub struct ExpressionContext {
    reasons: Vec<String>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn take_reasons(&mut self) -> Vec<String> {
        std::mem::take(&mut self.reasons)
    }
}

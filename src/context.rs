use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Per-call invocation context: an optional deadline, a cancellation token and the span the
/// call is traced under.
///
/// Contexts are cheap to clone. A context without a deadline and with a token nobody cancels
/// lets a call wait as long as the pool and the server allow.
#[derive(Clone, Debug)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    span: Span,
}

impl Context {
    pub fn background() -> Context {
        Context {
            deadline: None,
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Bounds the call to `timeout` from now, keeping an earlier deadline if there is one.
    pub fn with_timeout(self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Keeps whichever of the current and the given deadline comes first.
    pub fn with_deadline(mut self, deadline: Instant) -> Context {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Replaces the cancellation token. Pass `parent.child_token()` to keep an outer token in
    /// charge as well.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Context {
        self.cancel = token;
        self
    }

    pub fn with_span(mut self, span: Span) -> Context {
        self.span = span;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the token is cancelled; pends forever otherwise.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Whether the deadline, if any, has already passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .map_or(false, |deadline| deadline <= Instant::now())
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_wins() {
        let now = Instant::now();
        let ctx = Context::background()
            .with_timeout(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(5));

        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
        assert!(!ctx.is_expired());

        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(ctx.is_expired());
    }

    #[tokio::test]
    async fn background_has_no_deadline() {
        let ctx = Context::background();

        assert_eq!(ctx.deadline(), None);
        assert!(!ctx.is_expired());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let ctx = Context::background().with_cancellation(token.clone());
        let clone = ctx.clone();

        token.cancel();

        assert!(clone.is_cancelled());
        clone.cancelled().await;
    }
}

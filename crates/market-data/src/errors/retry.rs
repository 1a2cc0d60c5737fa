/// Classification for retry policy.
///
/// Used by the fallback resolver to decide what to do after a provider call fails.
///
/// # Behavior Summary
///
/// | Class | Retry same provider? | Try next provider? |
/// |-------|---------------------|--------------------|
/// | `WithBackoff` | Yes, until the retry budget is spent | Yes, afterwards |
/// | `NextProvider` | No | Yes |
/// | `Never` | No | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Transient failure (rate limiting, outage, timeout).
    /// Retry the same provider after an exponential backoff delay.
    WithBackoff,

    /// The provider gave a conclusive answer for this symbol (unknown symbol,
    /// unusable payload). Retrying it won't help, but another provider might.
    NextProvider,

    /// Resolver-level outcome. Nothing left to try.
    Never,
}

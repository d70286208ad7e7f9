//! Multi-rule decision evaluation.
//!
//! The evaluator walks an ordered list of rule references, resolving each
//! rule's discriminator and counting the request against its window. Every
//! referenced rule must pass for the request to be admitted (AND semantics,
//! short-circuiting on the first deny). Any internal failure along the way
//! becomes a deny rather than an error: a misconfigured limit must never
//! fall open.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::discriminator::{DiscriminatorResolver, RequestContext};
use crate::error::TurnstileError;
use crate::rules::RuleCatalog;
use crate::store::WindowCounterStore;

/// The outcome of evaluating a request against its rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// On denial, names the blocking rule or the failure that forced the
    /// deny; empty when allowed
    pub message: String,
    /// On an over-limit denial, time until the blocking window resets
    pub retry_after: Option<Duration>,
}

impl Decision {
    /// An admitting decision.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: String::new(),
            retry_after: None,
        }
    }

    /// A denying decision.
    pub fn deny(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
            retry_after,
        }
    }
}

/// Orchestrates rule lookup, discriminator resolution, and window counting
/// into a single admission decision.
///
/// Holds no per-request state; safe to share behind an `Arc` across any
/// number of concurrent request handlers. A configuration reload swaps the
/// whole catalog atomically via [`swap_catalog`](Evaluator::swap_catalog).
pub struct Evaluator {
    catalog: RwLock<Arc<RuleCatalog>>,
    resolver: Arc<DiscriminatorResolver>,
    store: Arc<WindowCounterStore>,
    clock: Arc<dyn Clock>,
}

impl Evaluator {
    /// Create an evaluator using the system clock.
    pub fn new(
        catalog: Arc<RuleCatalog>,
        resolver: Arc<DiscriminatorResolver>,
        store: Arc<WindowCounterStore>,
    ) -> Self {
        Self::with_clock(catalog, resolver, store, Arc::new(SystemClock))
    }

    /// Create an evaluator with an explicit time source.
    pub fn with_clock(
        catalog: Arc<RuleCatalog>,
        resolver: Arc<DiscriminatorResolver>,
        store: Arc<WindowCounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            resolver,
            store,
            clock,
        }
    }

    /// Replace the rule catalog with a new sealed one.
    ///
    /// In-flight evaluations finish against the catalog they started with.
    pub fn swap_catalog(&self, catalog: Arc<RuleCatalog>) {
        *self.catalog.write() = catalog;
    }

    /// The counter store backing this evaluator.
    pub fn store(&self) -> &Arc<WindowCounterStore> {
        &self.store
    }

    /// Evaluate an ordered list of rule references against a request.
    ///
    /// Always returns a [`Decision`]; request-time failures (unknown rule,
    /// unresolvable discriminator, store error) are converted into denials
    /// with the diagnostic embedded in the message for the caller to log.
    pub fn evaluate<S: AsRef<str>>(&self, rule_refs: &[S], context: &RequestContext) -> Decision {
        let catalog = self.catalog.read().clone();
        let now = self.clock.now();

        for rule_ref in rule_refs {
            let name = rule_ref.as_ref();

            let definition = match catalog.lookup(name) {
                Ok(definition) => definition,
                Err(e) => return self.deny_on_error(name, e),
            };

            let discriminator = match self.resolver.resolve(&definition.discriminator, context) {
                Ok(value) => value,
                Err(e) => return self.deny_on_error(name, e),
            };

            let usage = match self.store.increment_and_check(
                name,
                &discriminator,
                &definition.limiter,
                now,
            ) {
                Ok(usage) => usage,
                Err(e) => return self.deny_on_error(name, e),
            };

            if usage.count > u64::from(definition.limiter.max_requests()) {
                warn!(
                    rule = name,
                    discriminator = %discriminator,
                    count = usage.count,
                    limit = definition.limiter.max_requests(),
                    "Rate limit exceeded"
                );
                return Decision::deny(
                    format!(
                        "rule '{}': rate limit exceeded, retry after {}s",
                        name,
                        usage.window_remaining.as_secs()
                    ),
                    Some(usage.window_remaining),
                );
            }

            trace!(
                rule = name,
                discriminator = %discriminator,
                count = usage.count,
                "Rule passed"
            );
        }

        Decision::allow()
    }

    /// Fail closed: convert an internal error into a deny decision.
    fn deny_on_error(&self, rule: &str, error: TurnstileError) -> Decision {
        warn!(rule = rule, error = %error, "Denying request on evaluation failure");
        Decision::deny(format!("rule '{}': {}", rule, error), None)
    }
}

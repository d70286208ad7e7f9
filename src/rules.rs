//! Rule definitions and the sealed rule catalog.
//!
//! Rules are registered once at startup through a [`CatalogBuilder`] and then
//! sealed into an immutable [`RuleCatalog`]. After sealing, lookups are plain
//! reads of an immutable map and need no synchronization; a configuration
//! reload is an atomic swap of a whole new catalog, never in-place mutation.

use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TurnstileError};

/// The limiting algorithm and its parameters for one rule.
///
/// Tagged variant so that additional algorithms (sliding window, token
/// bucket) can be added without touching the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterKind {
    /// Fixed window: counts reset at aligned boundaries of `window` duration.
    FixedWindow {
        /// Maximum requests allowed within one window
        max_requests: u32,
        /// Duration of one window
        window: Duration,
    },
}

impl LimiterKind {
    /// The admission ceiling for this limiter.
    pub fn max_requests(&self) -> u32 {
        match self {
            LimiterKind::FixedWindow { max_requests, .. } => *max_requests,
        }
    }

    /// Validate algorithm parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            LimiterKind::FixedWindow {
                max_requests,
                window,
            } => {
                if *max_requests == 0 {
                    return Err("max_requests must be positive".to_string());
                }
                if window.is_zero() {
                    return Err("window duration must be positive".to_string());
                }
                Ok(())
            }
        }
    }
}

/// The partitioning dimension for a rule's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscriminatorKind {
    /// Partition by the caller-supplied client token
    ClientToken,
    /// Partition by the request's source address
    RemoteAddress,
    /// Partition by a host-registered custom resolver, identified by id
    Custom(String),
}

/// A named rate limit rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    /// Unique rule name, referenced by resource annotations
    pub name: String,
    /// Limiting algorithm and parameters
    pub limiter: LimiterKind,
    /// How counters for this rule are partitioned
    pub discriminator: DiscriminatorKind,
}

impl RuleDefinition {
    /// Convenience constructor for a fixed-window rule.
    pub fn fixed_window(
        name: impl Into<String>,
        max_requests: u32,
        window: Duration,
        discriminator: DiscriminatorKind,
    ) -> Self {
        Self {
            name: name.into(),
            limiter: LimiterKind::FixedWindow {
                max_requests,
                window,
            },
            discriminator,
        }
    }
}

/// Builder for a [`RuleCatalog`].
///
/// Registration happens during startup on a single thread by contract.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    rules: HashMap<String, RuleDefinition>,
}

impl CatalogBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule definition.
    ///
    /// Fails with [`TurnstileError::DuplicateRuleName`] if the name is
    /// already taken, or [`TurnstileError::InvalidRule`] if the algorithm
    /// parameters are not positive.
    pub fn register(&mut self, def: RuleDefinition) -> Result<()> {
        if let Err(reason) = def.limiter.validate() {
            return Err(TurnstileError::InvalidRule {
                name: def.name,
                reason,
            });
        }
        if self.rules.contains_key(&def.name) {
            return Err(TurnstileError::DuplicateRuleName(def.name));
        }
        self.rules.insert(def.name.clone(), def);
        Ok(())
    }

    /// Seal the catalog, making it immutable.
    pub fn seal(self) -> RuleCatalog {
        info!(rules = self.rules.len(), "Sealed rule catalog");
        RuleCatalog { rules: self.rules }
    }
}

/// An immutable registry of named rule definitions.
///
/// Concurrent lookups after sealing require no locks; share it behind an
/// `Arc` and swap the whole object to reload.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: HashMap<String, RuleDefinition>,
}

impl RuleCatalog {
    /// Look up a rule definition by name.
    pub fn lookup(&self, name: &str) -> Result<&RuleDefinition> {
        self.rules
            .get(name)
            .ok_or_else(|| TurnstileError::RuleNotFound(name.to_string()))
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog contains no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

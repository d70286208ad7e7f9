//! Discriminator resolution from opaque request context.
//!
//! The caller assembles a [`RequestContext`] from whatever transport it
//! fronts (query parameter, header, peer address); the resolver only ever
//! reads named string fields from it. There is no implicit fallback: a
//! missing raw value is an error the evaluator turns into a deny.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TurnstileError};
use crate::rules::DiscriminatorKind;

/// Context field read for [`DiscriminatorKind::ClientToken`].
pub const CLIENT_TOKEN_FIELD: &str = "client_token";
/// Context field read for [`DiscriminatorKind::RemoteAddress`].
pub const REMOTE_ADDRESS_FIELD: &str = "remote_address";

/// Opaque key-value request context supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    values: HashMap<String, String>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client token field.
    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.values.insert(CLIENT_TOKEN_FIELD.to_string(), token.into());
        self
    }

    /// Set the remote address field.
    pub fn with_remote_address(mut self, addr: impl Into<String>) -> Self {
        self.values
            .insert(REMOTE_ADDRESS_FIELD.to_string(), addr.into());
        self
    }

    /// Set an arbitrary field, e.g. for custom resolvers.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Read a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// A host-registered resolver for a custom discriminator.
///
/// Returns `None` when the context lacks whatever the resolver needs, which
/// the engine treats as a missing discriminator value (fail-closed).
pub type CustomResolverFn = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// Extracts partition keys from request context given a discriminator kind.
///
/// Custom resolvers are registered once at startup; afterwards the resolver
/// is read-only and safe to share behind an `Arc`.
#[derive(Default)]
pub struct DiscriminatorResolver {
    custom: HashMap<String, CustomResolverFn>,
}

impl std::fmt::Debug for DiscriminatorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscriminatorResolver")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DiscriminatorResolver {
    /// Create a resolver with only the built-in kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom resolver under the given id.
    pub fn register_custom(
        &mut self,
        id: impl Into<String>,
        resolver: impl Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    ) {
        self.custom.insert(id.into(), Arc::new(resolver));
    }

    /// Resolve a discriminator value from the context.
    ///
    /// Fails with [`TurnstileError::MissingDiscriminatorValue`] when the
    /// required raw value is absent, or
    /// [`TurnstileError::UnsupportedCustomDiscriminator`] when a custom kind
    /// has no registered resolver.
    pub fn resolve(&self, kind: &DiscriminatorKind, context: &RequestContext) -> Result<String> {
        match kind {
            DiscriminatorKind::ClientToken => Self::require_field(context, CLIENT_TOKEN_FIELD),
            DiscriminatorKind::RemoteAddress => Self::require_field(context, REMOTE_ADDRESS_FIELD),
            DiscriminatorKind::Custom(id) => {
                let resolver = self.custom.get(id).ok_or_else(|| {
                    TurnstileError::UnsupportedCustomDiscriminator(id.clone())
                })?;
                resolver(context).ok_or_else(|| {
                    TurnstileError::MissingDiscriminatorValue(format!(
                        "custom discriminator '{}' resolved nothing",
                        id
                    ))
                })
            }
        }
    }

    fn require_field(context: &RequestContext, field: &str) -> Result<String> {
        context
            .get(field)
            .map(str::to_string)
            .ok_or_else(|| TurnstileError::MissingDiscriminatorValue(field.to_string()))
    }
}

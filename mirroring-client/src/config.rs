//! The configuration contract (§4.9, §6): the typed, validated shape of the `mirroring.*` keys.
//!
//! Turning environment variables, `.properties`, or TOML into this struct is out of scope; this
//! module only owns the struct, its builder, and `validate()`.

use mirroring_errors::MirroringError;

/// A connection-impl selector: either the ecosystem default driver or a named one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionImpl {
    Default,
    Named(String),
}

impl ConnectionImpl {
    pub fn parse(value: &str) -> Self {
        if value == "default" {
            ConnectionImpl::Default
        } else {
            ConnectionImpl::Named(value.to_string())
        }
    }
}

/// The validated shape of `mirroring.*`. Built via [`MirroringTableConfigBuilder`]; `validate()`
/// checks the cross-field rules in §4.9 that a plain struct literal can't enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroringTableConfig {
    pub primary_connection_impl: ConnectionImpl,
    pub secondary_connection_impl: ConnectionImpl,
    pub primary_prefix: Option<String>,
    pub secondary_prefix: Option<String>,
    pub mismatch_detector_impl: Option<String>,
    pub flow_controller_impl: Option<String>,
    pub write_error_consumer_impl: Option<String>,
    pub flow_controller_max_outstanding_requests: Option<u32>,
    /// Retained for a caller's own buffered-writer layer; not interpreted by this crate.
    pub buffered_mutator_bytes_to_flush: Option<u64>,
}

const KEY_SEPARATOR: char = '.';

impl MirroringTableConfig {
    pub fn builder() -> MirroringTableConfigBuilder {
        MirroringTableConfigBuilder::default()
    }

    /// Checks the cross-field rules of §4.9:
    /// - both connection-impl keys must be set (enforced by the builder's required fields);
    /// - if the two connection impls are equal, at least one prefix must be set, and when both are
    ///   set they must differ;
    /// - a prefix must never end in the key-separator character;
    /// - `max-outstanding-requests`, if present, must be positive (the builder already stores it
    ///   as a `u32`, so only zero needs rejecting here).
    pub fn validate(&self) -> Result<(), MirroringError> {
        for prefix in [&self.primary_prefix, &self.secondary_prefix].into_iter().flatten() {
            if prefix.ends_with(KEY_SEPARATOR) {
                return Err(MirroringError::Config(format!(
                    "prefix {prefix:?} must not end with {KEY_SEPARATOR:?}"
                )));
            }
        }

        if self.primary_connection_impl == self.secondary_connection_impl {
            match (&self.primary_prefix, &self.secondary_prefix) {
                (None, None) => {
                    return Err(MirroringError::Config(
                        "primary and secondary connection impls are identical; at least one of \
                         mirroring.primary.prefix / mirroring.secondary.prefix must be set"
                            .to_string(),
                    ))
                }
                (Some(p), Some(s)) if p == s => {
                    return Err(MirroringError::Config(format!(
                        "primary and secondary prefixes must differ, both were {p:?}"
                    )))
                }
                _ => {}
            }
        }

        if self.flow_controller_max_outstanding_requests == Some(0) {
            return Err(MirroringError::Config(
                "mirroring.flow-controller.max-outstanding-requests must be a positive integer"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Builds a [`MirroringTableConfig`]. Both connection impls are required; everything else
/// defaults to unset.
#[derive(Debug, Default)]
pub struct MirroringTableConfigBuilder {
    primary_connection_impl: Option<ConnectionImpl>,
    secondary_connection_impl: Option<ConnectionImpl>,
    primary_prefix: Option<String>,
    secondary_prefix: Option<String>,
    mismatch_detector_impl: Option<String>,
    flow_controller_impl: Option<String>,
    write_error_consumer_impl: Option<String>,
    flow_controller_max_outstanding_requests: Option<u32>,
    buffered_mutator_bytes_to_flush: Option<u64>,
}

impl MirroringTableConfigBuilder {
    pub fn primary_connection_impl(mut self, value: impl AsRef<str>) -> Self {
        self.primary_connection_impl = Some(ConnectionImpl::parse(value.as_ref()));
        self
    }

    pub fn secondary_connection_impl(mut self, value: impl AsRef<str>) -> Self {
        self.secondary_connection_impl = Some(ConnectionImpl::parse(value.as_ref()));
        self
    }

    pub fn primary_prefix(mut self, value: impl Into<String>) -> Self {
        self.primary_prefix = Some(value.into());
        self
    }

    pub fn secondary_prefix(mut self, value: impl Into<String>) -> Self {
        self.secondary_prefix = Some(value.into());
        self
    }

    pub fn mismatch_detector_impl(mut self, value: impl Into<String>) -> Self {
        self.mismatch_detector_impl = Some(value.into());
        self
    }

    pub fn flow_controller_impl(mut self, value: impl Into<String>) -> Self {
        self.flow_controller_impl = Some(value.into());
        self
    }

    pub fn write_error_consumer_impl(mut self, value: impl Into<String>) -> Self {
        self.write_error_consumer_impl = Some(value.into());
        self
    }

    pub fn flow_controller_max_outstanding_requests(mut self, value: u32) -> Self {
        self.flow_controller_max_outstanding_requests = Some(value);
        self
    }

    pub fn buffered_mutator_bytes_to_flush(mut self, value: u64) -> Self {
        self.buffered_mutator_bytes_to_flush = Some(value);
        self
    }

    /// Builds and validates the config in one step; `validate()` remains available separately for
    /// callers who construct the struct fields directly.
    pub fn build(self) -> Result<MirroringTableConfig, MirroringError> {
        let primary_connection_impl = self.primary_connection_impl.ok_or_else(|| {
            MirroringError::Config("mirroring.primary.connection.impl is required".to_string())
        })?;
        let secondary_connection_impl = self.secondary_connection_impl.ok_or_else(|| {
            MirroringError::Config("mirroring.secondary.connection.impl is required".to_string())
        })?;

        let config = MirroringTableConfig {
            primary_connection_impl,
            secondary_connection_impl,
            primary_prefix: self.primary_prefix,
            secondary_prefix: self.secondary_prefix,
            mismatch_detector_impl: self.mismatch_detector_impl,
            flow_controller_impl: self.flow_controller_impl,
            write_error_consumer_impl: self.write_error_consumer_impl,
            flow_controller_max_outstanding_requests: self.flow_controller_max_outstanding_requests,
            buffered_mutator_bytes_to_flush: self.buffered_mutator_bytes_to_flush,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MirroringTableConfigBuilder {
        MirroringTableConfig::builder()
            .primary_connection_impl("default")
            .secondary_connection_impl("hbase2")
    }

    #[test]
    fn distinct_connection_impls_need_no_prefix() {
        assert!(base().build().is_ok());
    }

    #[test]
    fn equal_connection_impls_with_no_prefix_fails() {
        let result = MirroringTableConfig::builder()
            .primary_connection_impl("default")
            .secondary_connection_impl("default")
            .build();
        assert!(matches!(result, Err(MirroringError::Config(_))));
    }

    #[test]
    fn equal_connection_impls_with_distinct_prefixes_succeeds() {
        let result = MirroringTableConfig::builder()
            .primary_connection_impl("default")
            .secondary_connection_impl("default")
            .primary_prefix("p")
            .secondary_prefix("s")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn equal_connection_impls_with_equal_prefixes_fails() {
        let result = MirroringTableConfig::builder()
            .primary_connection_impl("default")
            .secondary_connection_impl("default")
            .primary_prefix("p")
            .secondary_prefix("p")
            .build();
        assert!(matches!(result, Err(MirroringError::Config(_))));
    }

    #[test]
    fn prefix_ending_in_separator_fails() {
        let result = base().primary_prefix("p.").build();
        assert!(matches!(result, Err(MirroringError::Config(_))));
    }

    #[test]
    fn zero_max_outstanding_requests_fails() {
        let result = base().flow_controller_max_outstanding_requests(0).build();
        assert!(matches!(result, Err(MirroringError::Config(_))));
    }

    #[test]
    fn missing_connection_impl_fails() {
        let result = MirroringTableConfig::builder()
            .secondary_connection_impl("default")
            .build();
        assert!(matches!(result, Err(MirroringError::Config(_))));
    }
}

//! Bridge configuration.

/// Settings for a [`crate::Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Prefix for the reserved system command names (`"<ns>:log"`).
    /// Default: none, the names are `log`, `wait_secs` and `wait_frames`.
    pub system_namespace: Option<String>,

    /// Resume the script once a forwarded command completes successfully.
    /// Default: true
    pub resume_after_forward: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            system_namespace: None,
            resume_after_forward: true,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the namespace for system command names.
    pub fn system_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.system_namespace = Some(namespace.into());
        self
    }

    /// Enable or disable resuming after forwarded commands.
    pub fn resume_after_forward(mut self, enabled: bool) -> Self {
        self.resume_after_forward = enabled;
        self
    }

    /// Full name of a reserved system command.
    pub(crate) fn system_command_name(&self, base: &str) -> String {
        match self.system_namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}:{base}"),
            _ => base.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert!(config.system_namespace.is_none());
        assert!(config.resume_after_forward);
        assert_eq!(config.system_command_name("log"), "log");
    }

    #[test]
    fn test_namespaced_names() {
        let config = BridgeConfig::new()
            .system_namespace("router")
            .resume_after_forward(false);
        assert_eq!(config.system_command_name("wait_secs"), "router:wait_secs");
        assert!(!config.resume_after_forward);
    }

    #[test]
    fn test_empty_namespace_is_ignored() {
        let config = BridgeConfig::new().system_namespace("");
        assert_eq!(config.system_command_name("wait_frames"), "wait_frames");
    }
}

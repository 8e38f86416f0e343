//! Mode gate and tool registry.

use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::bridge::RequestBridge;
use crate::error::{RegistryError, ToolError};
use crate::format::{ToolOutput, format};
use crate::tools::{ToolDescriptor, catalog};

/// Operating mode, read once at startup. Each mode includes every tier below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    #[default]
    Core,
    Advanced,
    Internal,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Core, Mode::Advanced, Mode::Internal];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Core => "core",
            Mode::Advanced => "advanced",
            Mode::Internal => "internal",
        }
    }

    pub fn includes(self, tier: Tier) -> bool {
        tier.rank() <= self.rank()
    }

    pub fn is_advanced(self) -> bool {
        self.includes(Tier::Advanced)
    }

    pub fn is_internal(self) -> bool {
        self.includes(Tier::Internal)
    }

    fn rank(self) -> u8 {
        match self {
            Mode::Core => 0,
            Mode::Advanced => 1,
            Mode::Internal => 2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Core,
    Advanced,
    Internal,
}

impl Tier {
    fn rank(self) -> u8 {
        match self {
            Tier::Core => 0,
            Tier::Advanced => 1,
            Tier::Internal => 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDescriptor>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every catalog entry whose tier the mode includes.
    pub fn for_mode(mode: Mode) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for (tier, descriptor) in catalog() {
            if mode.includes(tier) {
                registry.register(descriptor)?;
            }
        }
        tracing::info!(mode = %mode, tools = registry.len(), "tool registry built");
        Ok(registry)
    }

    /// Registering a name twice is rejected rather than shadowing the first tool.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.tools.contains_key(descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name.to_string()));
        }
        self.order.push(descriptor.name);
        self.tools.insert(descriptor.name, descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run one tool call: validate and shape, forward once, format the envelope.
    pub async fn invoke(
        &self,
        bridge: &RequestBridge,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        let descriptor = self.get(name).ok_or_else(|| {
            ToolError::new("unknown_tool", format!("Unknown tool '{name}'"))
                .with_field("name")
                .with_docs_hint("Call tools/list; some tools require a higher TREASURY_MCP_MODE.")
        })?;
        let spec = descriptor.build_request(args)?;
        let envelope = bridge.execute(&spec).await?;
        Ok(format(&envelope))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::bridge::testing::StubTransport;
    use crate::environment::EnvironmentResolver;

    const CORE: [&str; 11] = [
        "health_check",
        "get_system_status",
        "get_agent_identity",
        "get_agent_stats",
        "get_agent_activity",
        "get_treasury_balance",
        "execute_payroll",
        "get_payroll",
        "process_payment",
        "test_treasury",
        "send_agent_message",
    ];
    const ADVANCED: [&str; 4] = [
        "facilitator_health",
        "facilitator_validate",
        "facilitator_verify",
        "facilitator_settle",
    ];
    const INTERNAL: [&str; 5] = [
        "internal_payment_callback",
        "auth_signup",
        "auth_login",
        "auth_profile",
        "get_dashboard",
    ];

    fn names(mode: Mode) -> BTreeSet<&'static str> {
        ToolRegistry::for_mode(mode).unwrap().names().into_iter().collect()
    }

    #[test]
    fn each_mode_registers_exactly_its_tier_union() {
        let core: BTreeSet<_> = CORE.into_iter().collect();
        let advanced: BTreeSet<_> = core.iter().copied().chain(ADVANCED).collect();
        let internal: BTreeSet<_> = advanced.iter().copied().chain(INTERNAL).collect();

        assert_eq!(names(Mode::Core), core);
        assert_eq!(names(Mode::Advanced), advanced);
        assert_eq!(names(Mode::Internal), internal);
    }

    #[test]
    fn modes_are_ordered_by_inclusion() {
        for mode in Mode::ALL {
            assert!(mode.includes(Tier::Core));
        }
        assert!(!Mode::Core.is_advanced());
        assert!(Mode::Advanced.is_advanced() && !Mode::Advanced.is_internal());
        assert!(Mode::Internal.is_advanced() && Mode::Internal.is_internal());
        assert_eq!(Mode::default(), Mode::Core);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::for_mode(Mode::Core).unwrap();
        let (_, health) = catalog().into_iter().next().unwrap();
        assert_eq!(
            registry.register(health),
            Err(RegistryError::DuplicateTool("health_check".to_string()))
        );
        assert_eq!(registry.len(), CORE.len());
    }

    #[tokio::test]
    async fn missing_required_field_makes_no_network_call() {
        let stub = Arc::new(StubTransport::default());
        let bridge = RequestBridge::new(EnvironmentResolver::default(), stub.clone());
        let registry = ToolRegistry::for_mode(Mode::Core).unwrap();
        let args = json!({ "recipients": [{ "walletAddress": format!("0x{}", "b".repeat(40)), "amount": 1 }] });

        let err = registry
            .invoke(&bridge, "execute_payroll", args.as_object().unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.code, "validation_failed");
        assert_eq!(err.field.as_deref(), Some("xPayment"));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn backend_500_is_formatted_output_not_a_failure() {
        let stub = StubTransport::responding(500, r#"{"error":"ledger unavailable"}"#);
        let bridge = RequestBridge::new(EnvironmentResolver::default(), stub.clone());
        let registry = ToolRegistry::for_mode(Mode::Core).unwrap();

        let output = registry
            .invoke(&bridge, "get_treasury_balance", &Map::new())
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(output.text()).unwrap();
        assert_eq!(parsed["status"], json!(500));
        assert_eq!(parsed["data"], json!({"error": "ledger unavailable"}));
        assert!(!output.is_error);
    }

    #[tokio::test]
    async fn tools_outside_the_mode_are_unknown() {
        let stub = Arc::new(StubTransport::default());
        let bridge = RequestBridge::new(EnvironmentResolver::default(), stub.clone());
        let registry = ToolRegistry::for_mode(Mode::Advanced).unwrap();

        let err = registry
            .invoke(&bridge, "auth_login", &Map::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, "unknown_tool");
        assert_eq!(stub.calls(), 0);
    }
}

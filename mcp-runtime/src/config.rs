use clap::Args;

use crate::environment::{Environment, EnvironmentResolver, EnvironmentTable};
use crate::registry::Mode;

/// Process-wide settings. Flags fall back to environment variables; all of
/// them are read once at startup.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeArgs {
    /// Tool tier to expose: core, advanced (adds facilitator tools), internal (adds auth/callback tools)
    #[arg(long, env = "TREASURY_MCP_MODE", value_enum, default_value_t = Mode::Core)]
    pub mode: Mode,

    /// Backend environment used when a tool call does not name one
    #[arg(long, env = "TREASURY_ENV", value_enum)]
    pub environment: Option<Environment>,

    /// Base URL override; wins over every environment
    #[arg(long, env = "TREASURY_API_URL")]
    pub api_url: Option<String>,

    /// Base URL used when an environment has no table entry
    #[arg(long, env = "TREASURY_DEFAULT_BASE_URL")]
    pub default_base_url: Option<String>,
}

/// Constructed once from [`RuntimeArgs`] and shared read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub mode: Mode,
    pub default_environment: Option<Environment>,
    pub base_url_override: Option<String>,
    pub default_base_url: Option<String>,
}

impl From<RuntimeArgs> for RuntimeConfig {
    fn from(args: RuntimeArgs) -> Self {
        Self {
            mode: args.mode,
            default_environment: args.environment,
            base_url_override: args.api_url,
            default_base_url: args.default_base_url,
        }
    }
}

impl RuntimeConfig {
    pub fn resolver(&self) -> EnvironmentResolver {
        EnvironmentResolver::new(EnvironmentTable::default())
            .with_default_environment(self.default_environment)
            .with_default_base_url(self.default_base_url.clone())
            .with_base_url_override(self.base_url_override.clone())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::environment::{DEVELOPMENT_URL, STAGING_URL};

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        runtime: RuntimeArgs,
    }

    fn parse(argv: &[&str]) -> RuntimeConfig {
        let mut full = vec!["treasury-mcp"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().runtime.into()
    }

    #[test]
    fn flags_map_onto_config() {
        let config = parse(&[
            "--mode",
            "internal",
            "--environment",
            "development",
            "--api-url",
            "http://127.0.0.1:4000",
        ]);
        assert_eq!(config.mode, Mode::Internal);
        assert_eq!(config.default_environment, Some(Environment::Development));
        assert_eq!(config.base_url_override.as_deref(), Some("http://127.0.0.1:4000"));
        assert_eq!(
            config.resolver().resolve(Some("production"), None).unwrap(),
            "http://127.0.0.1:4000"
        );
    }

    #[test]
    fn default_environment_feeds_the_resolver() {
        let config = RuntimeConfig {
            default_environment: Some(Environment::Development),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.resolver().resolve(None, None).unwrap(), DEVELOPMENT_URL);
        assert_eq!(
            RuntimeConfig::default().resolver().resolve(None, None).unwrap(),
            STAGING_URL
        );
    }

    #[test]
    fn unknown_mode_is_rejected_at_startup() {
        let result = TestCli::try_parse_from(["treasury-mcp", "--mode", "root"]);
        assert!(result.is_err());
    }
}

//! # gateway-tools
//!
//! Tool providers shipped with the gateway.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ToolRegistry                                │
//! ├──────────────────────────────────────────────┤
//! │  calculator  calculate(expression)           │
//! │  wikipedia   get_summary(title)              │
//! │              search(q, limit?)               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Custom-logic providers implement [`agent_core::ToolProvider`] directly.
//! HTTP APIs are described declaratively with [`RestProvider`].

pub mod calculator;
pub mod error;
pub mod rest;
pub mod wikipedia;

pub use calculator::CalculatorProvider;
pub use error::{Result, ToolKitError};
pub use rest::{ParamLocation, RestEndpoint, RestProvider};

use agent_core::ToolRegistry;

/// Registry holding every built-in provider
pub fn default_registry(client: reqwest::Client) -> agent_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(CalculatorProvider)?;
    registry.register(wikipedia::provider(client))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolCatalog;

    #[test]
    fn test_default_registry_contents() {
        let registry = default_registry(reqwest::Client::new()).unwrap();
        assert_eq!(registry.list_providers(), vec!["calculator", "wikipedia"]);

        let names: Vec<String> = registry.list_tools().iter().map(|t| t.full_name()).collect();
        assert_eq!(
            names,
            vec!["calculator.calculate", "wikipedia.get_summary", "wikipedia.search"]
        );
    }
}

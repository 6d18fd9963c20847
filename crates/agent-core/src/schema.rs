//! Function-Schema Adapter
//!
//! Turns a catalog snapshot into the model-facing function list and the
//! reverse map used to route tool calls back to (provider, tool).
//!
//! Flat names join provider and tool with [`SEPARATOR`] because common
//! function-calling APIs only accept `[a-zA-Z0-9_-]` in function names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{AgentError, Result};
use crate::tool::ToolDescriptor;

/// Joins provider and tool in a flat function name
pub const SEPARATOR: &str = "__";

/// Function definition inside a [`FunctionSchema`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One entry of the `tools` array sent to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

/// A concrete (provider, tool) pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolRef {
    pub provider: String,
    pub tool: String,
}

impl ToolRef {
    pub fn new(provider: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            tool: tool.into(),
        }
    }
}

impl std::fmt::Display for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.provider, self.tool)
    }
}

/// Which rule resolved a requested function name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Exact hit in the reverse map
    Exact,
    /// Split on the first [`SEPARATOR`]
    Separator,
    /// Split on the first `.`
    Dotted,
    /// Bare tool name matched a catalog entry
    Fuzzy,
    /// Nothing matched; provider left empty
    Unresolved,
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Flat function name for a (provider, tool) pair
pub fn flatten_name(provider: &str, tool: &str) -> String {
    format!("{}{SEPARATOR}{}", sanitize(provider), sanitize(tool))
}

/// Reverse lookup from flat name to (provider, tool), in catalog order
#[derive(Clone, Debug, Default)]
pub struct NameMap {
    entries: Vec<(String, ToolRef)>,
    index: HashMap<String, usize>,
}

impl NameMap {
    /// Exact lookup
    pub fn get(&self, flat_name: &str) -> Option<&ToolRef> {
        self.index.get(flat_name).map(|&i| &self.entries[i].1)
    }

    /// Entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolRef)> {
        self.entries.iter().map(|(name, target)| (name.as_str(), target))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, flat_name: String, target: ToolRef) -> Result<()> {
        if let Some(&existing) = self.index.get(&flat_name) {
            return Err(AgentError::NameCollision {
                flat_name,
                first: self.entries[existing].1.to_string(),
                second: target.to_string(),
            });
        }
        self.index.insert(flat_name.clone(), self.entries.len());
        self.entries.push((flat_name, target));
        Ok(())
    }

    /// Map a model-supplied function name to a (provider, tool) pair.
    ///
    /// Rules, first match wins: exact flat name, split on the separator,
    /// split on a dot, bare tool name. A bare name shared by several
    /// providers goes to the first one in catalog order. When nothing
    /// matches, the provider is empty and invocation fails downstream.
    pub fn resolve(&self, requested: &str) -> (ToolRef, Resolution) {
        if let Some(target) = self.get(requested) {
            return (target.clone(), Resolution::Exact);
        }

        if let Some((provider, tool)) = requested.split_once(SEPARATOR) {
            return (ToolRef::new(provider, tool), Resolution::Separator);
        }

        if let Some((provider, tool)) = requested.split_once('.') {
            return (ToolRef::new(provider, tool), Resolution::Dotted);
        }

        if let Some((_, target)) = self.iter().find(|(_, target)| target.tool == requested) {
            tracing::info!(requested, resolved = %target, "Fuzzy-resolved bare tool name");
            return (target.clone(), Resolution::Fuzzy);
        }

        tracing::warn!(requested, "Could not resolve tool name");
        (ToolRef::new("", requested), Resolution::Unresolved)
    }
}

/// Function list plus reverse map for one catalog snapshot
#[derive(Clone, Debug, Default)]
pub struct FunctionSet {
    pub schemas: Vec<FunctionSchema>,
    pub names: NameMap,
}

impl FunctionSet {
    /// Build from a snapshot. Fails on names that cannot be flattened
    /// unambiguously and on two tools sharing one flat name.
    pub fn build(tools: &[ToolDescriptor]) -> Result<Self> {
        let mut set = Self::default();

        for tool in tools {
            if tool.provider.is_empty() || tool.name.is_empty() {
                return Err(AgentError::InvalidName(format!(
                    "empty provider or tool name in '{}'",
                    tool.full_name()
                )));
            }
            let provider = sanitize(&tool.provider);
            if provider.contains(SEPARATOR) || provider.ends_with('_') {
                return Err(AgentError::InvalidName(format!(
                    "provider '{}' would blur the separator '{SEPARATOR}'",
                    tool.provider
                )));
            }

            let flat_name = flatten_name(&tool.provider, &tool.name);
            set.names
                .insert(flat_name.clone(), ToolRef::new(&tool.provider, &tool.name))?;
            set.schemas.push(FunctionSchema {
                kind: "function".into(),
                function: FunctionDefinition {
                    name: flat_name,
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            });
        }

        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

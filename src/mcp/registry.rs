// ChatLLM API -- mcp/registry
//! Registry of remote tool descriptors, keyed by tool name.
//!
//! Filled from `tools/list`; consumers (agents, routes) look tools up by name
//! and get them back in the order they asked for.

use std::collections::HashMap;

use super::client::{McpClient, ToolDescriptor};
use super::error::McpError;

#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor under its own name.
    pub fn register(&mut self, tool: ToolDescriptor) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// All descriptors, sorted by name.
    pub fn all(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self.tools.values().cloned().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Descriptors for `names`, in the requested order. Unknown names are skipped.
    pub fn by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<ToolDescriptor> {
        names
            .iter()
            .filter_map(|n| self.tools.get(n.as_ref()).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Build a registry from the server's current tool list.
    pub async fn fetch(client: &McpClient) -> Result<Self, McpError> {
        let listed = client.list_tools().await?;
        Ok(listed.into_iter().collect())
    }
}

impl FromIterator<ToolDescriptor> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolDescriptor>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

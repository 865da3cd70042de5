//! Per-instance extension capability registry
//!
//! Extensions contribute locally-dispatched keywords to a router. They are
//! handed in at construction and registered only when the configuration
//! carries a matching `extensions.<name>` section; each router owns its own
//! registry, nothing is shared between instances.

use std::collections::BTreeMap;

use serde_json::Value;

use arpeggio_protocol::Kwargs;
use arpeggio_utils::Result;

/// A named set of locally-registered keywords
pub trait Extension: Send + Sync {
    /// Registry name, matched against the `extensions` config section
    fn name(&self) -> &str;

    /// Keyword names this extension exposes
    fn keywords(&self) -> Vec<String>;

    /// Declared argument names of one keyword
    fn arguments(&self, _keyword: &str) -> Vec<String> {
        Vec::new()
    }

    /// Called once at registration with the extension's config settings
    fn register(&mut self, _settings: &BTreeMap<String, String>) -> Result<()> {
        Ok(())
    }

    /// Execute one of this extension's keywords
    fn execute(&self, keyword: &str, args: &[Value], kwargs: &Kwargs) -> Result<Option<Value>>;
}

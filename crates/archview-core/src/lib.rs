pub mod assemble;
pub mod error;
pub mod index;
pub mod policy;
pub mod router;
pub mod store;
pub mod visibility;

#[cfg(test)]
mod proptest;
#[cfg(test)]
mod testing;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

pub use assemble::{assemble, PrunedView};
pub use error::{Error, Result};
pub use index::{ContainmentIndex, Link, PartId};
pub use policy::{Follow, Level, ViewPolicy};
pub use router::{RoutedRelations, Router};
pub use store::{ModelFile, ModelStore};
pub use visibility::{Selection, Visibility};

// --- Types ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PartKind {
    Domain,
    Module,
    Component,
    /// Peer module owned outside the modeled system. Always top-level.
    External,
}

impl PartKind {
    /// Domains and modules own child parts.
    pub fn is_container(self) -> bool {
        matches!(self, PartKind::Domain | PartKind::Module)
    }

    /// Whether a part of this kind may be the endpoint of a relation in a model
    /// file. Routed relations may also end on the domain they collapsed into.
    pub fn is_relation_end(self) -> bool {
        !matches!(self, PartKind::Domain)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PartKind::Domain => "domain",
            PartKind::Module => "module",
            PartKind::Component => "component",
            PartKind::External => "external",
        }
    }
}

/// A node of the containment tree. Ingestion hands these over nested; the
/// index flattens them into an arena.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub uid: String,
    pub label: String,
    pub kind: PartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Part>,
}

impl Part {
    pub fn new(uid: impl Into<String>, label: impl Into<String>, kind: PartKind) -> Self {
        Self {
            uid: uid.into(),
            label: label.into(),
            kind,
            description: None,
            children: Vec::new(),
        }
    }

    pub fn domain(uid: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(uid, label, PartKind::Domain)
    }

    pub fn module(uid: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(uid, label, PartKind::Module)
    }

    pub fn component(uid: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(uid, label, PartKind::Component)
    }

    pub fn external(uid: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(uid, label, PartKind::External)
    }

    pub fn with_children(mut self, children: Vec<Part>) -> Self {
        self.children = children;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    /// Synchronous request.
    Ask,
    /// Fire-and-forget message.
    Tell,
    /// Subscription; the target listens to the source and is drawn reversed.
    Listen,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Ask => "ask",
            RelationType::Tell => "tell",
            RelationType::Listen => "listen",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Directed edge between two relation ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Set on routed relations whose endpoints were swapped by the reversal fallback.
    #[serde(default, skip_serializing_if = "is_false")]
    pub reversed: bool,
}

impl Relation {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: RelationType) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            description: None,
            resources: Vec::new(),
            tags: Vec::new(),
            reversed: false,
        }
    }

    pub fn ask(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, RelationType::Ask)
    }

    pub fn tell(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, RelationType::Tell)
    }

    pub fn listen(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(source, target, RelationType::Listen)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resources(mut self, resources: &[&str]) -> Self {
        self.resources = resources.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --{}--> {}", self.source, self.kind, self.target)?;
        if let Some(description) = &self.description {
            write!(f, " ({})", description)?;
        }
        Ok(())
    }
}

/// A full or pruned system graph. Pruning returns the same shape, so emitters
/// never need to know which one they are rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct System {
    /// Timestamp or version marker of the ingested snapshot.
    #[serde(default)]
    pub version: String,
    /// Top-level domains and external peer modules, in model order.
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl System {
    /// Look up a part anywhere in the tree.
    pub fn find(&self, uid: &str) -> Option<&Part> {
        let mut stack: Vec<&Part> = self.parts.iter().rev().collect();
        while let Some(part) = stack.pop() {
            if part.uid == uid {
                return Some(part);
            }
            stack.extend(part.children.iter().rev());
        }
        None
    }

    /// All uids in pre-order.
    pub fn uids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&Part> = self.parts.iter().rev().collect();
        while let Some(part) = stack.pop() {
            out.push(part.uid.as_str());
            stack.extend(part.children.iter().rev());
        }
        out
    }
}

// --- Pruning ---

/// Compute a partial view of `system` under `policy`.
///
/// Each call builds its own index and output; the source graph is only read,
/// so concurrent calls against one `System` need no locking.
#[instrument(skip_all, fields(version = %system.version))]
pub fn prune(system: &System, policy: &ViewPolicy) -> Result<PrunedView> {
    let index = ContainmentIndex::build(system)?;
    let links = index.links(&system.relations)?;

    let visibility = Visibility::resolve(&index, policy, &links);
    let routed = Router::new(&index, &visibility, policy).route(&system.relations, &links);
    let visibility = visibility.with_forced(&index, &routed.forced);

    let view = assemble(&index, &visibility, routed.relations)?;
    debug!(
        parts = view.system.uids().len(),
        relations = view.system.relations.len(),
        selected = view.selected.len(),
        "pruned view assembled"
    );
    Ok(view)
}

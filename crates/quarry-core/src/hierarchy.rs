//! Depth-bounded map of which model each attribute path leads to

use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::schema::{AttributeSpec, ModelId};
use serde::Serialize;
use std::collections::BTreeMap;

/// One node of the hierarchy: a resolved model plus its reachable children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub model: ModelId,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, HierarchyChild>,
}

/// Child entry of a hierarchy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum HierarchyChild {
    Node(HierarchyNode),
    /// Dynamic zone: one node per component kind
    Zone(BTreeMap<ModelId, HierarchyNode>),
}

impl HierarchyNode {
    /// Node with no children
    pub fn terminal(model: ModelId) -> Self {
        Self {
            model,
            children: BTreeMap::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, attr: &str) -> Option<&HierarchyChild> {
        self.children.get(attr)
    }

    /// Child node of a relation, component or media attribute
    pub fn node(&self, attr: &str) -> Option<&HierarchyNode> {
        match self.children.get(attr) {
            Some(HierarchyChild::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// Child node of one component kind inside a dynamic zone
    pub fn zone(&self, attr: &str, kind: &ModelId) -> Option<&HierarchyNode> {
        match self.children.get(attr) {
            Some(HierarchyChild::Zone(kinds)) => kinds.get(kind),
            _ => None,
        }
    }

    /// Number of levels along the longest path, counting this node
    pub fn depth(&self) -> u32 {
        let deepest = self
            .children
            .values()
            .map(|child| match child {
                HierarchyChild::Node(node) => node.depth(),
                HierarchyChild::Zone(kinds) => kinds.values().map(|n| n.depth()).max().unwrap_or(0),
            })
            .max()
            .unwrap_or(0);
        deepest + 1
    }
}

/// Builds hierarchy trees from the schema
pub struct HierarchyBuilder<'a> {
    registry: &'a dyn SchemaRegistry,
    excluded: &'a [ModelId],
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, excluded: &'a [ModelId]) -> Self {
        Self { registry, excluded }
    }

    /// Build the hierarchy rooted at `model` with `depth` levels
    pub fn build(&self, model: &ModelId, depth: u32) -> Result<HierarchyNode> {
        let model = self.registry.canonical(model)?;
        if depth <= 1 {
            return Ok(HierarchyNode::terminal(model));
        }

        let schema = self.registry.model(&model)?;
        let mut children = BTreeMap::new();

        for attr in schema.mixed_attributes() {
            let child = match &attr.spec {
                AttributeSpec::Scalar => continue,
                AttributeSpec::Component { target, .. } | AttributeSpec::Relation { target } => {
                    self.branch(target, depth - 1)?.map(HierarchyChild::Node)
                }
                AttributeSpec::DynamicZone { components } => {
                    let mut kinds = BTreeMap::new();
                    for kind in components {
                        if let Some(node) = self.branch(kind, depth - 1)? {
                            kinds.insert(kind.clone(), node);
                        }
                    }
                    (!kinds.is_empty()).then_some(HierarchyChild::Zone(kinds))
                }
                AttributeSpec::Media { .. } => Some(HierarchyChild::Node(HierarchyNode::terminal(
                    self.registry.media_model(),
                ))),
            };

            if let Some(child) = child {
                children.insert(attr.name.clone(), child);
            }
        }

        Ok(HierarchyNode { model, children })
    }

    /// Child branch, absent where population would skip the target
    fn branch(&self, target: &ModelId, depth: u32) -> Result<Option<HierarchyNode>> {
        if depth > 1 && self.excluded.contains(target) {
            return Ok(None);
        }
        self.build(target, depth).map(Some)
    }
}

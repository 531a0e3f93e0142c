//! Content-model schema types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique identifier for a content model (e.g. `api::article.article`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(pub String);

impl ModelId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for ModelId {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

/// Kind of content model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelKind {
    #[default]
    CollectionType,
    SingleType,
    /// Embedded structure, only reachable through a parent record
    Component,
}

/// Schema of a single attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AttributeSpec {
    Scalar,
    Relation {
        target: ModelId,
    },
    Component {
        target: ModelId,
        #[serde(default)]
        repeatable: bool,
    },
    #[serde(rename = "dynamiczone")]
    DynamicZone {
        components: BTreeSet<ModelId>,
    },
    Media {
        #[serde(default)]
        multiple: bool,
    },
}

/// Fieldless attribute classification used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Scalar,
    Relation,
    Component,
    DynamicZone,
    Media,
}

impl AttributeKind {
    /// Order in which child attributes are descended during traversal
    pub const DESCENT_ORDER: [AttributeKind; 4] = [
        AttributeKind::Component,
        AttributeKind::DynamicZone,
        AttributeKind::Relation,
        AttributeKind::Media,
    ];
}

impl AttributeSpec {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::Scalar => AttributeKind::Scalar,
            Self::Relation { .. } => AttributeKind::Relation,
            Self::Component { .. } => AttributeKind::Component,
            Self::DynamicZone { .. } => AttributeKind::DynamicZone,
            Self::Media { .. } => AttributeKind::Media,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar)
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Relation { .. })
    }

    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component { .. })
    }

    pub fn is_dynamic_zone(&self) -> bool {
        matches!(self, Self::DynamicZone { .. })
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Media { .. })
    }
}

/// A named attribute on a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(flatten)]
    pub spec: AttributeSpec,
}

/// A content model: a named record type with a fixed attribute schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Unique identifier
    pub uid: ModelId,

    /// Collection type, single type or component
    #[serde(default)]
    pub kind: ModelKind,

    /// Records carry sibling translations under `localizations`
    #[serde(default)]
    pub localized: bool,

    /// Provided by a plugin rather than the application itself
    #[serde(default)]
    pub extension: bool,

    /// Attributes in declaration order
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Model {
    /// Create a new collection-type model with no attributes
    pub fn new(uid: impl Into<ModelId>) -> Self {
        Self {
            uid: uid.into(),
            kind: ModelKind::CollectionType,
            localized: false,
            extension: false,
            attributes: Vec::new(),
        }
    }

    /// Create a new component model
    pub fn component(uid: impl Into<ModelId>) -> Self {
        Self {
            kind: ModelKind::Component,
            ..Self::new(uid)
        }
    }

    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn localized(mut self) -> Self {
        self.localized = true;
        self
    }

    pub fn extension(mut self) -> Self {
        self.extension = true;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            spec,
        });
        self
    }

    pub fn with_scalar(self, name: impl Into<String>) -> Self {
        self.with_attribute(name, AttributeSpec::Scalar)
    }

    pub fn with_relation(self, name: impl Into<String>, target: impl Into<ModelId>) -> Self {
        self.with_attribute(
            name,
            AttributeSpec::Relation {
                target: target.into(),
            },
        )
    }

    pub fn with_component(
        self,
        name: impl Into<String>,
        target: impl Into<ModelId>,
        repeatable: bool,
    ) -> Self {
        self.with_attribute(
            name,
            AttributeSpec::Component {
                target: target.into(),
                repeatable,
            },
        )
    }

    pub fn with_dynamic_zone<I, M>(self, name: impl Into<String>, components: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ModelId>,
    {
        self.with_attribute(
            name,
            AttributeSpec::DynamicZone {
                components: components.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn with_media(self, name: impl Into<String>, multiple: bool) -> Self {
        self.with_attribute(name, AttributeSpec::Media { multiple })
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.spec)
    }

    /// Non-scalar attributes, in declaration order
    pub fn mixed_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.spec.is_scalar())
    }

    /// Attributes of one kind, in declaration order
    pub fn attributes_of_kind(&self, kind: AttributeKind) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.spec.kind() == kind)
    }

    pub fn is_component(&self) -> bool {
        self.kind == ModelKind::Component
    }
}

//! DOM-like node snapshots delivered by the host
//!
//! The host serializes whatever it knows about the element a signal originated
//! from. Every field is optional so detached or anonymous nodes still parse.

use serde::{Deserialize, Serialize};

/// Bounding geometry of an element, in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The `class` attribute as the host reported it.
///
/// Some elements (SVG in particular) expose an animated token list instead of
/// a plain string; anything that is not a string is treated as no classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassAttr {
    Tokens(String),
    Other(serde_json::Value),
}

impl Default for ClassAttr {
    fn default() -> Self {
        ClassAttr::Tokens(String::new())
    }
}

impl ClassAttr {
    /// Whitespace-separated class tokens, empty for non-string values
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            ClassAttr::Tokens(s) => s.split_whitespace().collect(),
            ClassAttr::Other(_) => Vec::new(),
        }
    }
}

/// Snapshot of a DOM-like element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    /// Tag name (case-insensitive)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub class: ClassAttr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `type` attribute for `<input>` elements
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Visible text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// ARIA role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content_editable: bool,
    /// `data-*` attributes in discovery order, without the `data-` prefix
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,
    /// Stable identity assigned by the host, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Node>>,
}

impl Node {
    /// Create a node with just a tag name
    pub fn new(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = ClassAttr::Tokens(class.to_string());
        self
    }

    pub fn with_type(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_parent(mut self, parent: Node) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Lowercased tag name, if any
    pub fn tag_name(&self) -> Option<String> {
        self.tag
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase)
    }

    /// Whether this node is the document root container
    pub fn is_document_root(&self) -> bool {
        matches!(self.tag_name().as_deref(), Some("body") | Some("html"))
    }

    /// Whether this node is a password input; its values must never leave the pipeline
    pub fn is_password_input(&self) -> bool {
        self.tag_name().as_deref() == Some("input")
            && self
                .input_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("password"))
    }

    /// Non-empty `id` attribute
    pub fn id_attr(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty `name` attribute
    pub fn name_attr(&self) -> Option<&str> {
        self.name.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_deserialization() {
        let json = r#"{
            "tag": "INPUT",
            "id": "email",
            "class": "field wide",
            "type": "email",
            "data": [["track", "signup"]],
            "parent": { "tag": "form", "id": "signup" }
        }"#;

        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.tag_name().as_deref(), Some("input"));
        assert_eq!(node.class.tokens(), vec!["field", "wide"]);
        assert_eq!(node.data, vec![("track".to_string(), "signup".to_string())]);
        assert_eq!(node.parent.unwrap().id.as_deref(), Some("signup"));
    }

    #[test]
    fn test_non_string_class_is_empty() {
        let json = r#"{ "tag": "svg", "class": { "baseVal": "icon", "animVal": "icon" } }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(node.class.tokens().is_empty());
    }

    #[test]
    fn test_password_detection_is_case_insensitive() {
        let node = Node::new("input").with_type("PassWord");
        assert!(node.is_password_input());
        assert!(!Node::new("textarea").with_type("password").is_password_input());
    }
}

//! Element classification
//!
//! Maps a DOM-like node to a stable semantic type (`button`, `email_input`,
//! `div_tab`, ...) plus a readable identifier and a structural path. Everything
//! here is a pure function of the node snapshot.

use crate::dom::Node;
use crate::types::TargetDescriptor;

/// Returned when a node is absent or carries nothing to describe
pub const UNKNOWN: &str = "unknown";

/// Maximum characters of text content kept in an identifier
const TEXT_EXCERPT_CHARS: usize = 40;

/// Separator between path levels
const PATH_SEPARATOR: &str = " > ";

/// Explicit tag-to-type table, checked first
fn tag_type(tag: &str) -> Option<&'static str> {
    let t = match tag {
        "button" => "button",
        "a" => "link",
        "img" => "image",
        "video" => "video",
        "audio" => "audio",
        "canvas" => "canvas",
        "svg" => "svg",
        "select" => "dropdown",
        "textarea" => "textarea",
        "h1" => "heading_1",
        "h2" => "heading_2",
        "h3" => "heading_3",
        "h4" => "heading_4",
        "h5" => "heading_5",
        "h6" => "heading_6",
        "form" => "form",
        "table" => "table",
        "nav" => "navigation",
        "iframe" => "iframe",
        _ => return None,
    };
    Some(t)
}

/// `<input type=...>` sub-table; unknown or missing types fall back to `text_input`
fn input_type(input_type: Option<&str>) -> &'static str {
    let Some(t) = input_type else {
        return "text_input";
    };
    match t.trim().to_ascii_lowercase().as_str() {
        "text" => "text_input",
        "email" => "email_input",
        "password" => "password_input",
        "number" => "number_input",
        "tel" => "phone_input",
        "url" => "url_input",
        "search" => "search_input",
        "checkbox" => "checkbox",
        "radio" => "radio_button",
        "range" => "slider",
        "color" => "color_picker",
        "date" => "date_picker",
        "datetime-local" => "datetime_picker",
        "month" => "month_picker",
        "week" => "week_picker",
        "time" => "time_picker",
        "file" => "file_upload",
        "submit" => "submit_button",
        "reset" => "reset_button",
        "button" => "input_button",
        "image" => "image_button",
        "hidden" => "hidden_input",
        _ => "text_input",
    }
}

/// Classify a node into its semantic type.
///
/// Priority: tag table, content-editable flag, input type, ARIA role
/// (`"<tag>_<role>"`), then the raw tag name.
pub fn classify(node: Option<&Node>) -> String {
    let Some(node) = node else {
        return UNKNOWN.to_string();
    };
    let Some(tag) = node.tag_name() else {
        return UNKNOWN.to_string();
    };

    if let Some(t) = tag_type(&tag) {
        return t.to_string();
    }

    if node.content_editable {
        return "rich_text_editor".to_string();
    }

    if tag == "input" {
        return input_type(node.input_type.as_deref()).to_string();
    }

    if let Some(role) = node.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        return format!("{}_{}", tag, role.to_ascii_lowercase());
    }

    tag
}

/// Build a human-readable identifier:
/// `tag#id.class1.class2[name="..."][data-key="value"] "text excerpt"`
pub fn identify(node: Option<&Node>) -> String {
    let Some(node) = node else {
        return UNKNOWN.to_string();
    };

    let mut out = String::new();

    if let Some(tag) = node.tag_name() {
        out.push_str(&tag);
    }
    if let Some(id) = node.id_attr() {
        out.push('#');
        out.push_str(id);
    }
    let classes = node.class.tokens();
    if !classes.is_empty() {
        out.push('.');
        out.push_str(&classes.join("."));
    }
    if let Some(name) = node.name_attr() {
        out.push_str(&format!("[name=\"{}\"]", name));
    }
    for (key, value) in &node.data {
        out.push_str(&format!("[data-{}=\"{}\"]", key, value));
    }
    if let Some(excerpt) = node.text.as_deref().and_then(text_excerpt) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("\"{}\"", excerpt));
    }

    if out.is_empty() {
        UNKNOWN.to_string()
    } else {
        out
    }
}

/// Structural path from the outermost ancestor below the document root down to
/// the node itself, one `tag#id.firstClass` segment per level.
pub fn path(node: Option<&Node>) -> String {
    let Some(node) = node else {
        return UNKNOWN.to_string();
    };
    if node.is_document_root() {
        return node.tag_name().unwrap_or_else(|| UNKNOWN.to_string());
    }

    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if n.is_document_root() {
            break;
        }
        segments.push(path_segment(n));
        current = n.parent.as_deref();
    }
    segments.reverse();
    segments.join(PATH_SEPARATOR)
}

/// Classifier output bundled for an event record
pub fn describe(node: &Node) -> TargetDescriptor {
    TargetDescriptor {
        element_type: classify(Some(node)),
        identifier: identify(Some(node)),
        path: path(Some(node)),
    }
}

fn path_segment(node: &Node) -> String {
    let mut segment = node.tag_name().unwrap_or_else(|| UNKNOWN.to_string());
    if let Some(id) = node.id_attr() {
        segment.push('#');
        segment.push_str(id);
    }
    if let Some(first) = node.class.tokens().first() {
        segment.push('.');
        segment.push_str(first);
    }
    segment
}

/// Collapse whitespace and cut to the excerpt length, appending an ellipsis
fn text_excerpt(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() > TEXT_EXCERPT_CHARS {
        let cut: String = collapsed.chars().take(TEXT_EXCERPT_CHARS).collect();
        Some(format!("{}...", cut))
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ClassAttr;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tag_table_wins() {
        assert_eq!(classify(Some(&Node::new("BUTTON"))), "button");
        assert_eq!(classify(Some(&Node::new("a"))), "link");
        assert_eq!(classify(Some(&Node::new("select"))), "dropdown");
        assert_eq!(classify(Some(&Node::new("h3"))), "heading_3");
        assert_eq!(classify(Some(&Node::new("nav"))), "navigation");
    }

    #[test]
    fn test_content_editable_before_input_table() {
        let mut div = Node::new("div");
        div.content_editable = true;
        assert_eq!(classify(Some(&div)), "rich_text_editor");
    }

    #[test]
    fn test_input_sub_table() {
        let cases = [
            ("email", "email_input"),
            ("password", "password_input"),
            ("checkbox", "checkbox"),
            ("range", "slider"),
            ("datetime-local", "datetime_picker"),
            ("made-up", "text_input"),
        ];
        for (ty, expected) in cases {
            assert_eq!(classify(Some(&Node::new("input").with_type(ty))), expected);
        }
        assert_eq!(classify(Some(&Node::new("input"))), "text_input");
    }

    #[test]
    fn test_role_fallback_then_tag() {
        let mut div = Node::new("div");
        div.role = Some("Tab".to_string());
        assert_eq!(classify(Some(&div)), "div_tab");
        assert_eq!(classify(Some(&Node::new("section"))), "section");
    }

    #[test]
    fn test_missing_tag_is_unknown() {
        assert_eq!(classify(None), UNKNOWN);
        assert_eq!(classify(Some(&Node::default())), UNKNOWN);
    }

    #[test]
    fn test_identify_full_order() {
        let mut node = Node::new("button")
            .with_id("buy")
            .with_class("btn  primary")
            .with_text("  Add   to cart ");
        node.name = Some("purchase".to_string());
        node.data = vec![
            ("track".to_string(), "cta".to_string()),
            ("sku".to_string(), "42".to_string()),
        ];

        assert_eq!(
            identify(Some(&node)),
            r#"button#buy.btn.primary[name="purchase"][data-track="cta"][data-sku="42"] "Add to cart""#
        );
    }

    #[test]
    fn test_identify_truncates_text() {
        let long = "x".repeat(50);
        let node = Node::new("p").with_text(&long);
        let expected = format!("p \"{}...\"", "x".repeat(40));
        assert_eq!(identify(Some(&node)), expected);
    }

    #[test]
    fn test_identify_unknown_when_empty() {
        assert_eq!(identify(None), UNKNOWN);
        assert_eq!(identify(Some(&Node::default())), UNKNOWN);
    }

    #[test]
    fn test_identify_tolerates_non_string_class() {
        let mut svg = Node::new("svg");
        svg.class = ClassAttr::Other(serde_json::json!({ "baseVal": "icon" }));
        assert_eq!(identify(Some(&svg)), "svg");
    }

    #[test]
    fn test_path_stops_below_body() {
        let body = Node::new("body");
        let main = Node::new("main").with_id("content").with_parent(body);
        let list = Node::new("ul").with_class("items menu").with_parent(main);
        let item = Node::new("li").with_parent(list);

        assert_eq!(path(Some(&item)), "main#content > ul.items > li");
    }

    #[test]
    fn test_path_of_root_itself() {
        assert_eq!(path(Some(&Node::new("body"))), "body");
        assert_eq!(path(None), UNKNOWN);
    }
}

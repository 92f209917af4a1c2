use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde::Serialize;
use similar::{capture_diff_slices, Algorithm, DiffTag};

const MAX_REPORTED_CHANGES: usize = 200;
/// Elements nested deeper than this are kept as one opaque node with a digest
/// of their subtree, so every walk over the tree stays bounded.
pub const MAX_DEPTH: usize = 256;
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Simplified DOM used for comparison: elements with sorted attributes and
/// whitespace-collapsed, non-blank text. Scripts, styles and comments are
/// dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DomNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<DomNode>,
    },
    Text(String),
    /// Element at [`MAX_DEPTH`]; its subtree is only compared by digest.
    Truncated {
        tag: String,
        attrs: Vec<(String, String)>,
        digest: u64,
    },
}

impl DomNode {
    pub fn parse(html: &str) -> DomNode {
        let document = Html::parse_document(html);
        convert_element(document.root_element(), 0)
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            DomNode::Element { tag, .. } | DomNode::Truncated { tag, .. } => Some(tag),
            DomNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[DomNode] {
        match self {
            DomNode::Element { children, .. } => children,
            DomNode::Text(_) | DomNode::Truncated { .. } => &[],
        }
    }

    /// Depth of the deepest node below this one.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0usize)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(node.children().iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Follow child indices from this node.
    pub fn descend(&self, indices: &[usize]) -> Option<&DomNode> {
        let mut node = self;
        for idx in indices {
            node = node.children().get(*idx)?;
        }
        Some(node)
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }

    fn label(&self, index: usize) -> String {
        match self {
            DomNode::Element { tag, .. } | DomNode::Truncated { tag, .. } => {
                format!("{tag}[{index}]")
            }
            DomNode::Text(_) => format!("#text[{index}]"),
        }
    }

    fn same_kind(&self, other: &DomNode) -> bool {
        match (self, other) {
            (DomNode::Text(_), DomNode::Text(_)) => true,
            (DomNode::Element { tag: a, .. }, DomNode::Element { tag: b, .. })
            | (DomNode::Truncated { tag: a, .. }, DomNode::Truncated { tag: b, .. }) => a == b,
            _ => false,
        }
    }

    fn short(&self) -> String {
        match self {
            DomNode::Text(text) => clip(text),
            DomNode::Element { .. } | DomNode::Truncated { .. } => clip(&self.to_html()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    TextChanged,
    AttributesChanged,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructuralChange {
    pub kind: ChangeKind,
    /// Readable location such as `html[0]>body[1]>div[2]`.
    pub path: String,
    pub before: Option<String>,
    pub after: Option<String>,
    /// Child indices, in the current tree, of the closest node that holds the change.
    #[serde(skip)]
    pub(crate) anchor: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StructuralDelta {
    pub changes: Vec<StructuralChange>,
    /// Changes found beyond the reporting cap.
    pub omitted: usize,
    /// Smallest region of the current document that contains every change.
    pub subtree: Option<String>,
}

impl StructuralDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.omitted == 0
    }

    pub fn total(&self) -> usize {
        self.changes.len() + self.omitted
    }
}

/// Compare two serialized documents.
pub fn diff_html(before: &str, after: &str) -> StructuralDelta {
    diff_trees(&DomNode::parse(before), &DomNode::parse(after))
}

pub fn diff_trees(before: &DomNode, after: &DomNode) -> StructuralDelta {
    let mut collector = Collector::default();
    let root_label = after.label(0);
    compare_nodes(before, after, &mut Vec::new(), &root_label, &mut collector);

    let subtree = collector
        .common_anchor
        .as_ref()
        .and_then(|anchor| locate_region(after, anchor))
        .map(DomNode::to_html);

    StructuralDelta {
        changes: collector.changes,
        omitted: collector.omitted,
        subtree,
    }
}

#[derive(Default)]
struct Collector {
    changes: Vec<StructuralChange>,
    omitted: usize,
    common_anchor: Option<Vec<usize>>,
}

impl Collector {
    fn record(
        &mut self,
        kind: ChangeKind,
        path: String,
        anchor: &[usize],
        before: Option<String>,
        after: Option<String>,
    ) {
        self.common_anchor = Some(match self.common_anchor.take() {
            None => anchor.to_vec(),
            Some(existing) => existing
                .iter()
                .zip(anchor)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
        if self.changes.len() >= MAX_REPORTED_CHANGES {
            self.omitted += 1;
            return;
        }
        self.changes.push(StructuralChange {
            kind,
            path,
            before,
            after,
            anchor: anchor.to_vec(),
        });
    }
}

fn compare_nodes(
    before: &DomNode,
    after: &DomNode,
    anchor: &mut Vec<usize>,
    path: &str,
    out: &mut Collector,
) {
    match (before, after) {
        (DomNode::Text(old), DomNode::Text(new)) => {
            if old != new {
                out.record(
                    ChangeKind::TextChanged,
                    path.to_string(),
                    anchor,
                    Some(clip(old)),
                    Some(clip(new)),
                );
            }
        }
        (
            DomNode::Element {
                tag: old_tag,
                attrs: old_attrs,
                children: old_children,
            },
            DomNode::Element {
                tag: new_tag,
                attrs: new_attrs,
                children: new_children,
            },
        ) if old_tag == new_tag => {
            if old_attrs != new_attrs {
                out.record(
                    ChangeKind::AttributesChanged,
                    path.to_string(),
                    anchor,
                    Some(format_attrs(old_attrs)),
                    Some(format_attrs(new_attrs)),
                );
            }
            compare_children(old_children, new_children, anchor, path, out);
        }
        (
            DomNode::Truncated {
                tag: old_tag,
                digest: old_digest,
                ..
            },
            DomNode::Truncated {
                tag: new_tag,
                digest: new_digest,
                ..
            },
        ) if old_tag == new_tag && old_digest == new_digest => {}
        _ => {
            out.record(
                ChangeKind::Removed,
                path.to_string(),
                anchor,
                Some(before.short()),
                None,
            );
            out.record(
                ChangeKind::Added,
                path.to_string(),
                anchor,
                None,
                Some(after.short()),
            );
        }
    }
}

fn compare_children(
    before: &[DomNode],
    after: &[DomNode],
    anchor: &mut Vec<usize>,
    path: &str,
    out: &mut Collector,
) {
    let old: Vec<u64> = before.iter().map(DomNode::signature).collect();
    let new: Vec<u64> = after.iter().map(DomNode::signature).collect();

    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        let old_range = op.old_range();
        let new_range = op.new_range();
        match op.tag() {
            DiffTag::Equal => {}
            DiffTag::Delete => {
                for idx in old_range {
                    record_removed(&before[idx], idx, anchor, path, out);
                }
            }
            DiffTag::Insert => {
                for idx in new_range {
                    record_added(&after[idx], idx, anchor, path, out);
                }
            }
            DiffTag::Replace => {
                let pairs = old_range.len().max(new_range.len());
                for offset in 0..pairs {
                    let old_idx = old_range.start + offset;
                    let new_idx = new_range.start + offset;
                    let old_node = (old_idx < old_range.end).then(|| &before[old_idx]);
                    let new_node = (new_idx < new_range.end).then(|| &after[new_idx]);
                    match (old_node, new_node) {
                        (Some(old_node), Some(new_node)) if old_node.same_kind(new_node) => {
                            anchor.push(new_idx);
                            let child_path = format!("{path}>{}", new_node.label(new_idx));
                            compare_nodes(old_node, new_node, anchor, &child_path, out);
                            anchor.pop();
                        }
                        (old_node, new_node) => {
                            if let Some(node) = old_node {
                                record_removed(node, old_idx, anchor, path, out);
                            }
                            if let Some(node) = new_node {
                                record_added(node, new_idx, anchor, path, out);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn record_removed(
    node: &DomNode,
    index: usize,
    parent_anchor: &[usize],
    parent_path: &str,
    out: &mut Collector,
) {
    out.record(
        ChangeKind::Removed,
        format!("{parent_path}>{}", node.label(index)),
        parent_anchor,
        Some(node.short()),
        None,
    );
}

fn record_added(
    node: &DomNode,
    index: usize,
    parent_anchor: &mut Vec<usize>,
    parent_path: &str,
    out: &mut Collector,
) {
    parent_anchor.push(index);
    out.record(
        ChangeKind::Added,
        format!("{parent_path}>{}", node.label(index)),
        parent_anchor,
        None,
        Some(node.short()),
    );
    parent_anchor.pop();
}

/// Resolve the anchor to an element; text nodes step up to their parent.
fn locate_region<'a>(root: &'a DomNode, anchor: &[usize]) -> Option<&'a DomNode> {
    let mut indices = anchor.to_vec();
    loop {
        let node = root.descend(&indices)?;
        if node.tag().is_some() || indices.is_empty() {
            return Some(node);
        }
        indices.pop();
    }
}

fn convert_element(element: ElementRef<'_>, depth: usize) -> DomNode {
    let value = element.value();
    let mut attrs: Vec<(String, String)> = value
        .attrs()
        .map(|(name, val)| (name.to_lowercase(), val.to_string()))
        .collect();
    attrs.sort();

    if depth >= MAX_DEPTH {
        return DomNode::Truncated {
            tag: value.name().to_lowercase(),
            attrs,
            digest: digest_subtree(element),
        };
    }

    let mut children = Vec::new();
    for child in element.children() {
        match child.value() {
            Node::Element(el) => {
                if SKIPPED_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    children.push(convert_element(child_el, depth + 1));
                }
            }
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if !collapsed.is_empty() {
                    children.push(DomNode::Text(collapsed));
                }
            }
            _ => {}
        }
    }

    DomNode::Element {
        tag: value.name().to_lowercase(),
        attrs,
        children,
    }
}

/// Pre-order digest of a scraper subtree. Each element also hashes how many
/// kept children it has, so nesting is part of the digest.
fn digest_subtree(element: ElementRef<'_>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for node in element.descendants() {
        if node.parent().is_some_and(|parent| is_skipped(parent.value())) {
            continue;
        }
        match node.value() {
            Node::Element(el) if !SKIPPED_TAGS.contains(&el.name()) => {
                0u8.hash(&mut hasher);
                el.name().to_lowercase().hash(&mut hasher);
                let mut attrs: Vec<(&str, &str)> = el.attrs().collect();
                attrs.sort();
                attrs.hash(&mut hasher);
                node.children()
                    .filter(|child| is_kept(child.value()))
                    .count()
                    .hash(&mut hasher);
            }
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if !collapsed.is_empty() {
                    1u8.hash(&mut hasher);
                    collapsed.hash(&mut hasher);
                }
            }
            _ => {}
        }
    }
    hasher.finish()
}

fn is_skipped(node: &Node) -> bool {
    matches!(node, Node::Element(el) if SKIPPED_TAGS.contains(&el.name()))
}

fn is_kept(node: &Node) -> bool {
    match node {
        Node::Element(el) => !SKIPPED_TAGS.contains(&el.name()),
        Node::Text(text) => !text.trim().is_empty(),
        _ => false,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_attrs(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn clip(value: &str) -> String {
    const LIMIT: usize = 160;
    if value.chars().count() <= LIMIT {
        value.to_string()
    } else {
        let mut clipped: String = value.chars().take(LIMIT).collect();
        clipped.push('…');
        clipped
    }
}

fn write_html(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(text) => out.push_str(&escape(text, false)),
        DomNode::Element {
            tag,
            attrs,
            children,
        } => {
            write_open_tag(tag, attrs, out);
            if VOID_TAGS.contains(&tag.as_str()) {
                return;
            }
            for child in children {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        DomNode::Truncated { tag, attrs, .. } => {
            write_open_tag(tag, attrs, out);
            out.push('…');
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn write_open_tag(tag: &str, attrs: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }
    out.push('>');
}

fn escape(value: &str, attribute: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>Inbox</title><script>var t = 1;</script></head>
        <body>
          <nav><a href="/inbox">Inbox</a><a href="/sent">Sent</a></nav>
          <main>
            <ul id="messages"><li>Hello</li><li>World</li></ul>
          </main>
        </body></html>"#;

    #[test]
    fn parse_drops_scripts_and_blank_text() {
        let tree = DomNode::parse(PAGE);
        let html = tree.to_html();
        assert!(!html.contains("var t"));
        assert!(html.contains(r#"<ul id="messages"><li>Hello</li><li>World</li></ul>"#));
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let delta = diff_html(PAGE, PAGE);
        assert!(delta.is_empty());
        assert!(delta.subtree.is_none());
    }

    #[test]
    fn added_list_item_is_isolated_to_list() {
        let after = PAGE.replace("<li>World</li>", "<li>World</li><li>New mail</li>");
        let delta = diff_html(PAGE, &after);
        assert_eq!(delta.changes.len(), 1);
        let change = &delta.changes[0];
        assert_eq!(change.kind, ChangeKind::Added);
        assert!(change.path.ends_with("ul[0]>li[2]"), "{}", change.path);
        assert_eq!(delta.subtree.as_deref(), Some("<li>New mail</li>"));
    }

    #[test]
    fn text_change_reports_parent_element_region() {
        let after = PAGE.replace("<li>Hello</li>", "<li>Hello again</li>");
        let delta = diff_html(PAGE, &after);
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].kind, ChangeKind::TextChanged);
        assert_eq!(delta.changes[0].before.as_deref(), Some("Hello"));
        assert_eq!(delta.changes[0].after.as_deref(), Some("Hello again"));
        assert_eq!(delta.subtree.as_deref(), Some("<li>Hello again</li>"));
    }

    #[test]
    fn scattered_changes_widen_region_to_common_ancestor() {
        let after = PAGE
            .replace(r#"<a href="/sent">Sent</a>"#, r#"<a href="/sent">Sent (1)</a>"#)
            .replace("<li>World</li>", "<li>Earth</li>");
        let delta = diff_html(PAGE, &after);
        assert_eq!(delta.changes.len(), 2);
        let region = delta.subtree.expect("region");
        assert!(region.starts_with("<body>"));
        assert!(region.contains("Sent (1)"));
        assert!(region.contains("Earth"));
    }

    #[test]
    fn attribute_change_is_reported() {
        let after = PAGE.replace(r#"id="messages""#, r#"id="messages" class="unread""#);
        let delta = diff_html(PAGE, &after);
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].kind, ChangeKind::AttributesChanged);
        assert!(delta.subtree.unwrap().starts_with(r#"<ul class="unread" id="messages">"#));
    }

    #[test]
    fn removed_node_anchors_on_parent() {
        let after = PAGE.replace("<li>Hello</li>", "");
        let delta = diff_html(PAGE, &after);
        assert_eq!(delta.changes.len(), 1);
        assert_eq!(delta.changes[0].kind, ChangeKind::Removed);
        assert_eq!(delta.subtree.as_deref(), Some(r#"<ul id="messages"><li>World</li></ul>"#));
    }

    fn nested_divs(depth: usize, inner: &str) -> String {
        format!(
            "<html><body>{}{inner}{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        )
    }

    #[test]
    fn deeply_nested_pages_are_cut_off() {
        let before = nested_divs(5000, "old");
        let after = nested_divs(5000, "new");

        let tree = DomNode::parse(&before);
        assert_eq!(tree.depth(), MAX_DEPTH);

        let delta = diff_html(&before, &after);
        let kinds: Vec<ChangeKind> = delta.changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Removed, ChangeKind::Added]);
        assert_eq!(delta.changes[0].path, delta.changes[1].path);
        assert_eq!(delta.subtree.as_deref(), Some("<div>…</div>"));

        assert!(diff_html(&before, &before).is_empty());
    }

    #[test]
    fn truncated_digest_ignores_scripts_and_whitespace() {
        let before = nested_divs(MAX_DEPTH + 10, "<p>same</p>");
        let after = nested_divs(MAX_DEPTH + 10, "<script>x()</script>  <p> same </p>");
        assert!(diff_html(&before, &after).is_empty());
    }

    #[test]
    fn escapes_when_serializing() {
        let tree = DomNode::parse(r#"<p title="a&quot;b">1 &lt; 2</p>"#);
        assert!(tree.to_html().contains(r#"<p title="a&quot;b">1 &lt; 2</p>"#));
    }
}

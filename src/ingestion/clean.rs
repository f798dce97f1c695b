//! HTML-to-text extraction.
//!
//! Script and style content is dropped entirely; block-level elements are
//! separated by blank lines so the chunker can split on paragraph boundaries.

use ego_tree::iter::Edge;
use scraper::node::Node;
use scraper::Html;

/// Elements whose text content is never part of the page's prose.
const IGNORED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Elements that introduce a paragraph boundary around their content.
const BLOCK_ELEMENTS: [&str; 26] = [
    "p", "div", "section", "article", "main", "aside", "header", "footer", "nav", "ul", "ol", "li",
    "table", "tr", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "figure",
    "figcaption",
];

/// Extracts readable text from an HTML document.
///
/// All text under `script`/`style` elements is discarded. Block-level
/// elements contribute a blank-line boundary before and after their content,
/// so the returned string can be split on blank lines to recover paragraphs.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    let mut ignored_depth = 0usize;

    for edge in document.root_element().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Element(element) if is_ignored(element.name()) => ignored_depth += 1,
                Node::Element(element) if element.name() == "br" => out.push('\n'),
                Node::Element(element) if is_block(element.name()) => push_break(&mut out),
                Node::Text(text) if ignored_depth == 0 => out.push_str(&text),
                _ => {}
            },
            Edge::Close(node) => {
                if let Node::Element(element) = node.value() {
                    if is_ignored(element.name()) {
                        ignored_depth -= 1;
                    } else if is_block(element.name()) {
                        push_break(&mut out);
                    }
                }
            }
        }
    }

    out
}

fn is_ignored(name: &str) -> bool {
    IGNORED_ELEMENTS.contains(&name)
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Appends a paragraph boundary unless one is already pending.
fn push_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push_str("\n\n");
    }
}

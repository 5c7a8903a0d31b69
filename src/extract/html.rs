//! HTML to plain text.

use super::normalize_lines;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

/// Elements dropped together with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "nav", "header", "footer", "aside", "svg", "form",
    "template", "iframe", "button", "select",
];

/// Elements that start and end a line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "details", "div", "dl", "dt", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section",
    "summary", "table", "td", "th", "tr", "ul",
];

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

/// Extract readable text from an HTML document.
///
/// The document is parsed into a DOM; scripts, styles, navigation and other page
/// chrome are skipped, and the remaining text nodes are emitted in document order
/// with one line per block element. Entities are decoded by the parser.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::with_capacity(html.len() / 2);
    collect_text(document.root_element(), &mut text);

    let collapsed = SPACES.replace_all(&text, " ");
    normalize_lines(&collapsed, true)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        // Comments, doctypes and processing instructions carry no text.
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if DROPPED_ELEMENTS.contains(&name) {
            continue;
        }
        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            out.push('\n');
        }
        collect_text(child, out);
        if block {
            out.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::html_to_text;

    #[test]
    fn strips_scripts_styles_and_navigation() {
        let html = r#"<html><head><title>T</title><style>body { color: red }</style></head>
<body>
  <nav><a href="/">Home</a> | <a href="/about">About</a></nav>
  <header class="site">Site banner</header>
  <h1>Ownership</h1>
  <script type="text/javascript">trackPageView();</script>
  <p>Each value has an <em>owner</em>.</p>
  <!-- hidden note -->
  <footer>Copyright</footer>
</body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Ownership\n\nEach value has an owner.");
    }

    #[test]
    fn keeps_reading_order_and_decodes_entities() {
        let html = "<ul><li>first &amp; foremost</li><li>second&nbsp;item</li></ul><p>x &lt; y</p>";
        let text = html_to_text(html);
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["first & foremost", "second item", "x < y"]);
    }

    #[test]
    fn header_element_is_not_confused_with_head() {
        let html = "<header>banner</header><p>body text</p>";
        assert_eq!(html_to_text(html), "body text");
    }

    #[test]
    fn collapses_inline_whitespace() {
        assert_eq!(html_to_text("<p>a   \t b\n\n\n\nc</p>"), "a b\n\nc");
    }

    #[test]
    fn attribute_values_never_reach_the_text() {
        let html = r#"<p><a title="a > b" href="/x">Ownership</a> rules.</p>"#;
        assert_eq!(html_to_text(html), "Ownership rules.");
    }

    #[test]
    fn nested_navigation_is_dropped_entirely() {
        let html = "<nav><nav>inner</nav>outer menu</nav><p>Body</p>";
        assert_eq!(html_to_text(html), "Body");
    }

    #[test]
    fn unterminated_script_is_dropped() {
        let html = "<p>Intro</p><script>var secret = 1; function f() {}";
        assert_eq!(html_to_text(html), "Intro");
    }
}

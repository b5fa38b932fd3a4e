use std::collections::{HashMap, HashSet};

use ego_tree::NodeRef;
use lectito_core::{LectitoError, Readability, ReadabilityConfig};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use folio_logging::{folio_debug, folio_info};

use crate::article::{Article, Block, ImageRef, PublishedDate};

const UNTITLED: &str = "Untitled";
const MAX_BYLINE_CHARS: usize = 100;
const LEAD_IMAGE_SCAN_LIMIT: usize = 30;

/// Subtrees that never contribute article content.
fn is_skipped_tag(name: &str) -> bool {
    matches!(
        name,
        "script"
            | "style"
            | "noscript"
            | "iframe"
            | "template"
            | "svg"
            | "nav"
            | "aside"
            | "footer"
            | "form"
            | "button"
            | "select"
    )
}

/// Elements whose boundaries separate words in running text.
fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "blockquote"
            | "pre"
            | "li"
            | "ul"
            | "ol"
            | "dl"
            | "dt"
            | "dd"
            | "table"
            | "tr"
            | "td"
            | "th"
            | "figure"
            | "figcaption"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
            | "address"
    )
}

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Minimum characters of text the chosen content block must hold.
    pub min_text_length: usize,
    /// Maximum share of the chosen block's text that may sit inside links.
    pub max_link_density: f64,
    /// Paragraphs with fewer characters are dropped from the output.
    pub min_paragraph_chars: usize,
    /// Lowest readability score a candidate block may have.
    pub min_score: f64,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            min_text_length: 100,
            max_link_density: 0.5,
            min_paragraph_chars: 11,
            min_score: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("no content block found (best candidate has {text_length} characters, need {min_text_length})")]
    NoContent {
        text_length: usize,
        min_text_length: usize,
    },
    #[error("best content block is mostly links (link density {link_density:.2}, max {max_link_density:.2})")]
    LinkHeavy {
        link_density: f64,
        max_link_density: f64,
    },
    #[error("page does not read as an article (score {score:.1}, need {min_score:.1})")]
    NotReadable { score: f64, min_score: f64 },
    #[error("content block has no readable paragraphs")]
    NoParagraphs,
    #[error("could not parse page: {0}")]
    Malformed(String),
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, base_url: &str) -> Result<Article, ExtractError>;
}

/// Extractor backed by `lectito-core`'s Readability port.
///
/// Lectito scores the candidate containers and returns the cleaned content
/// block plus its metadata. The block must still clear our own text length
/// and link density thresholds before it is walked into [`Block`]s. Metadata
/// lectito does not find (it drops `<script>` before reading JSON-LD) falls
/// back to the page's meta tags, JSON-LD `@graph` entries and byline markup.
#[derive(Debug, Default)]
pub struct ReadabilityExtractor {
    settings: ExtractSettings,
}

impl ReadabilityExtractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }

    fn readability(&self) -> Readability {
        Readability::with_config(
            ReadabilityConfig::builder()
                .char_threshold(self.settings.min_text_length)
                .min_score(self.settings.min_score)
                .preserve_images(true)
                .build(),
        )
    }

    /// Explains a lectito rejection in terms of the page body.
    fn rejection(&self, doc: &Html, err: LectitoError) -> ExtractError {
        let body = select_first(doc, "body").unwrap_or_else(|| doc.root_element());
        let text_length = text_len(body);
        if text_length < self.settings.min_text_length {
            return ExtractError::NoContent {
                text_length,
                min_text_length: self.settings.min_text_length,
            };
        }
        let density = link_density(body);
        if density > self.settings.max_link_density {
            return ExtractError::LinkHeavy {
                link_density: density,
                max_link_density: self.settings.max_link_density,
            };
        }
        match err {
            LectitoError::NotReadable { score, .. } => ExtractError::NotReadable {
                score,
                min_score: self.settings.min_score,
            },
            LectitoError::NoContent => ExtractError::NoContent {
                text_length: 0,
                min_text_length: self.settings.min_text_length,
            },
            other => ExtractError::Malformed(other.to_string()),
        }
    }
}

impl Extractor for ReadabilityExtractor {
    fn extract(&self, html: &str, base_url: &str) -> Result<Article, ExtractError> {
        let doc = Html::parse_document(html);
        let base = Url::parse(base_url).ok();
        let meta = MetaIndex::build(&doc);
        let json_ld = collect_json_ld(&doc);

        let parsed = match &base {
            Some(url) => self.readability().parse_with_url(html, url.as_str()),
            None => self.readability().parse(html),
        };
        let readable = match parsed {
            Ok(readable) => readable,
            Err(err) => {
                folio_debug!("readability rejected {}: {}", base_url, err);
                return Err(self.rejection(&doc, err));
            }
        };

        let content = Html::parse_fragment(&readable.content);
        let root = content.root_element();
        let text_length = text_len(root);
        if text_length < self.settings.min_text_length {
            return Err(ExtractError::NoContent {
                text_length,
                min_text_length: self.settings.min_text_length,
            });
        }
        let density = link_density(root);
        if density > self.settings.max_link_density {
            return Err(ExtractError::LinkHeavy {
                link_density: density,
                max_link_density: self.settings.max_link_density,
            });
        }
        folio_debug!(
            "content block with {} chars, link density {:.2}",
            text_length,
            density
        );

        let mut flow = FlowBuilder::new(base.as_ref(), self.settings.min_paragraph_chars);
        flow.visit_children(*root);
        let blocks = flow.finish();
        if !blocks.iter().any(|b| matches!(b, Block::Paragraph(_))) {
            return Err(ExtractError::NoParagraphs);
        }

        let found = readable.metadata;
        let title = document_title(&doc)
            .or_else(|| found.title.as_deref().map(collapse_whitespace))
            .filter(|t| !t.is_empty())
            .or_else(|| fallback_title(&doc, &meta, &json_ld))
            .unwrap_or_else(|| UNTITLED.to_string());
        let author = found
            .author
            .as_deref()
            .map(collapse_whitespace)
            .filter(|a| !a.is_empty() && a.chars().count() < MAX_BYLINE_CHARS)
            .or_else(|| extract_author(&doc, &meta, &json_ld));
        let published = found
            .date
            .as_deref()
            .map(collapse_whitespace)
            .filter(|d| !d.is_empty())
            .or_else(|| extract_date(&doc, &meta, &json_ld))
            .map(|raw| PublishedDate::parse(&raw));

        let article = Article {
            title,
            author,
            published,
            tags: meta.get(&["keywords"]),
            lead_image: extract_lead_image(&doc, &meta, base.as_ref()),
            source_url: base_url.to_string(),
            blocks,
        };
        folio_info!(
            "extracted '{}': {} paragraphs, {} images",
            article.title,
            article.body_text().len(),
            article.images().count()
        );
        Ok(article)
    }
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

fn select_all<'a>(doc: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// First `content` of each `<meta name|property=...>`, keyed by lowercase name.
struct MetaIndex {
    entries: HashMap<String, String>,
}

impl MetaIndex {
    fn build(doc: &Html) -> Self {
        let mut entries = HashMap::new();
        for meta in select_all(doc, "meta") {
            let element = meta.value();
            let Some(content) = element.attr("content").map(collapse_whitespace) else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            for key in [element.attr("name"), element.attr("property"), element.attr("itemprop")]
                .into_iter()
                .flatten()
            {
                entries
                    .entry(key.trim().to_ascii_lowercase())
                    .or_insert_with(|| content.clone());
            }
        }
        Self { entries }
    }

    fn get(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.entries.get(*key).cloned())
    }
}

/// Flattens every JSON-LD object (top level, arrays and `@graph`) in document order.
fn collect_json_ld(doc: &Html) -> Vec<Value> {
    let mut objects = Vec::new();
    for script in select_all(doc, "script[type=\"application/ld+json\"]") {
        let raw = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            continue;
        };
        flatten_json_ld(value, &mut objects);
    }
    objects
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| flatten_json_ld(item, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

fn json_ld_string(objects: &[Value], key: &str) -> Option<String> {
    objects.iter().find_map(|obj| match obj.get(key)? {
        Value::String(s) => Some(collapse_whitespace(s)).filter(|s| !s.is_empty()),
        _ => None,
    })
}

fn json_ld_author(objects: &[Value]) -> Option<String> {
    fn name_of(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            Value::Array(items) => items.iter().find_map(name_of),
            _ => None,
        }
    }
    objects
        .iter()
        .filter_map(|obj| obj.get("author"))
        .find_map(name_of)
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty())
}

fn document_title(doc: &Html) -> Option<String> {
    select_first(doc, "title")
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn fallback_title(doc: &Html, meta: &MetaIndex, json_ld: &[Value]) -> Option<String> {
    meta.get(&["og:title", "twitter:title"])
        .or_else(|| json_ld_string(json_ld, "headline"))
        .or_else(|| {
            select_first(doc, "h1")
                .map(|h| collapse_whitespace(&h.text().collect::<String>()))
                .filter(|t| !t.is_empty())
        })
}

fn extract_author(doc: &Html, meta: &MetaIndex, json_ld: &[Value]) -> Option<String> {
    meta.get(&["author", "article:author", "og:article:author", "byline"])
        .or_else(|| json_ld_author(json_ld))
        .or_else(|| {
            ["[rel=author]", ".author", ".byline", "[itemprop=author]"]
                .iter()
                .flat_map(|sel| select_all(doc, sel))
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .find(|text| !text.is_empty() && text.chars().count() < MAX_BYLINE_CHARS)
        })
}

fn extract_date(doc: &Html, meta: &MetaIndex, json_ld: &[Value]) -> Option<String> {
    meta.get(&["article:published_time", "pubdate", "publishdate", "date"])
        .or_else(|| json_ld_string(json_ld, "datePublished"))
        .or_else(|| {
            let time = select_first(doc, "time")?;
            time.value()
                .attr("datetime")
                .map(collapse_whitespace)
                .filter(|d| !d.is_empty())
                .or_else(|| Some(collapse_whitespace(&time.text().collect::<String>())))
                .filter(|d| !d.is_empty())
        })
}

fn extract_lead_image(doc: &Html, meta: &MetaIndex, base: Option<&Url>) -> Option<String> {
    if let Some(og) = meta.get(&["og:image"]) {
        if let Some(url) = resolve_url(&og, base) {
            return Some(url);
        }
    }
    select_all(doc, "img")
        .into_iter()
        .take(LEAD_IMAGE_SCAN_LIMIT)
        .find_map(|img| image_source(img).and_then(|src| resolve_url(src, base)))
}

/// Characters of visible text, ignoring skipped subtrees.
fn text_len(element: ElementRef<'_>) -> usize {
    visible_text(element).chars().filter(|c| !c.is_whitespace()).count()
}

fn link_density(element: ElementRef<'_>) -> f64 {
    let total = text_len(element);
    if total == 0 {
        return 0.0;
    }
    let linked: usize = element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .map(text_len)
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible_text(*element, &mut out);
    out
}

fn collect_visible_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if is_skipped_tag(el.name()) => {}
            Node::Element(el) if el.name() == "br" => out.push(' '),
            Node::Element(el) if is_block_tag(el.name()) => {
                out.push(' ');
                collect_visible_text(child, out);
                out.push(' ');
            }
            Node::Element(_) => collect_visible_text(child, out),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Document flow
// ---------------------------------------------------------------------------

struct FlowBuilder<'u> {
    base: Option<&'u Url>,
    min_paragraph_chars: usize,
    blocks: Vec<Block>,
    pending: String,
    seen_images: HashSet<String>,
}

impl<'u> FlowBuilder<'u> {
    fn new(base: Option<&'u Url>, min_paragraph_chars: usize) -> Self {
        Self {
            base,
            min_paragraph_chars,
            blocks: Vec::new(),
            pending: String::new(),
            seen_images: HashSet::new(),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_pending();
        self.blocks
    }

    fn visit_children(&mut self, node: NodeRef<'_, Node>) {
        for child in node.children() {
            self.visit_node(child);
        }
    }

    fn visit_node(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(text) => {
                self.pending.push_str(text);
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element);
                }
            }
            _ => {}
        }
    }

    fn visit_element(&mut self, element: ElementRef<'_>) {
        let tag = element.value().name();
        match tag {
            t if is_skipped_tag(t) => {}
            "h1" | "h2" | "h3" | "h4" => {
                self.flush_pending();
                let text = collapse_whitespace(&visible_text(element));
                if !text.is_empty() {
                    let level = tag[1..].parse().unwrap_or(2);
                    self.blocks.push(Block::Heading { level, text });
                }
                self.collect_images(element);
            }
            "p" | "blockquote" | "li" | "pre" | "dd" | "h5" | "h6" => {
                self.flush_pending();
                self.push_paragraph(&visible_text(element));
                self.collect_images(element);
            }
            "figcaption" => {
                let captions_an_image = element
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(|figure| has_image(figure));
                if !captions_an_image {
                    self.flush_pending();
                    self.push_paragraph(&visible_text(element));
                }
            }
            "img" => {
                self.flush_pending();
                self.push_image(element);
            }
            "br" => self.pending.push(' '),
            "div" | "section" | "article" | "main" | "header" | "figure" | "ul" | "ol" | "dl"
            | "table" | "tr" | "td" | "th" | "tbody" | "thead" | "picture" | "hr" | "address" => {
                self.flush_pending();
                self.visit_children(*element);
                self.flush_pending();
            }
            _ => self.visit_children(*element),
        }
    }

    fn collect_images(&mut self, element: ElementRef<'_>) {
        let images: Vec<_> = element
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "img")
            .collect();
        for img in images {
            self.push_image(img);
        }
    }

    fn push_paragraph(&mut self, raw: &str) {
        let text = collapse_whitespace(raw);
        if text.chars().count() >= self.min_paragraph_chars {
            self.blocks.push(Block::Paragraph(text));
        }
    }

    fn push_image(&mut self, img: ElementRef<'_>) {
        let Some(url) = image_source(img).and_then(|src| resolve_url(src, self.base)) else {
            return;
        };
        if !self.seen_images.insert(url.clone()) {
            return;
        }
        self.blocks
            .push(Block::Image(ImageRef::new(url).with_caption(image_caption(img))));
    }

    fn flush_pending(&mut self) {
        if self.pending.trim().is_empty() {
            self.pending.clear();
            return;
        }
        let text = std::mem::take(&mut self.pending);
        self.push_paragraph(&text);
    }
}

fn has_image(element: ElementRef<'_>) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "img")
}

/// `src`, unless it is an inline placeholder, then the lazy-loading attributes.
fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    ["src", "data-src", "data-original"]
        .into_iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.to_ascii_lowercase().starts_with("data:"))
}

/// Caption of the enclosing `<figure>`, else the `alt` text.
fn image_caption(img: ElementRef<'_>) -> Option<String> {
    let figure_caption = img
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(3)
        .find(|a| a.value().name() == "figure")
        .and_then(|figure| {
            figure
                .descendants()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "figcaption")
        })
        .map(|cap| collapse_whitespace(&visible_text(cap)))
        .filter(|c| !c.is_empty());
    figure_caption.or_else(|| {
        img.value()
            .attr("alt")
            .map(collapse_whitespace)
            .filter(|alt| !alt.is_empty())
    })
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("data:") {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => base?.join(trimmed).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment_root(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn link_density_counts_anchor_text() {
        let doc = fragment_root(r#"<div id="x">abcd<a href="/">efgh</a></div>"#);
        let div = select_first(&doc, "#x").unwrap();
        assert!((link_density(div) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn relative_sources_resolve_against_base() {
        let base = Url::parse("https://news.example.com/section/story.html").unwrap();
        assert_eq!(
            resolve_url("../img/a.jpg", Some(&base)).as_deref(),
            Some("https://news.example.com/img/a.jpg")
        );
        assert_eq!(
            resolve_url("//cdn.example.com/b.png", Some(&base)).as_deref(),
            Some("https://cdn.example.com/b.png")
        );
        assert_eq!(resolve_url("data:image/png;base64,AAAA", Some(&base)), None);
        assert_eq!(resolve_url("javascript:void(0)", Some(&base)), None);
        assert_eq!(resolve_url("relative.png", None), None);
    }

    #[test]
    fn lazy_image_source_skips_placeholder() {
        let doc = fragment_root(
            r#"<img src="data:image/gif;base64,R0lGOD" data-src="/real.jpg" alt="Real">"#,
        );
        let img = select_first(&doc, "img").unwrap();
        assert_eq!(image_source(img), Some("/real.jpg"));
        assert_eq!(image_caption(img).as_deref(), Some("Real"));
    }

    #[test]
    fn json_ld_graph_is_flattened() {
        let doc = fragment_root(
            r#"<script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[
                {"@type":"WebSite","name":"Site"},
                {"@type":"NewsArticle","headline":"Graph Headline",
                 "author":[{"@type":"Person","name":"Ada Lovelace"}],
                 "datePublished":"2021-06-01T09:00:00Z"}
            ]}
            </script>"#,
        );
        let objects = collect_json_ld(&doc);
        assert_eq!(json_ld_string(&objects, "headline").as_deref(), Some("Graph Headline"));
        assert_eq!(json_ld_author(&objects).as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            json_ld_string(&objects, "datePublished").as_deref(),
            Some("2021-06-01T09:00:00Z")
        );
    }

    #[test]
    fn inline_markup_does_not_split_words() {
        let doc = fragment_root(
            r#"<div id="x"><p>Water is H<sub>2</sub>O, said <a href="/s">Dr. Smith</a>.</p><p>Next<br>line</p></div>"#,
        );
        let div = select_first(&doc, "#x").unwrap();
        assert_eq!(
            collapse_whitespace(&visible_text(div)),
            "Water is H2O, said Dr. Smith. Next line"
        );
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(collapse_whitespace("  a\n\t b  c "), "a b c");
    }
}

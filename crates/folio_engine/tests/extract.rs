use folio_engine::{
    decode_html, Block, ExtractError, ExtractSettings, Extractor, ReadabilityExtractor,
};
use pretty_assertions::assert_eq;

const ARTICLE: &str = include_str!("fixtures/article.html");
const BASE: &str = "https://news.example.com/features/lighthouses";

#[test]
fn fixture_title_and_body_are_extracted() {
    let article = ReadabilityExtractor::default()
        .extract(ARTICLE, BASE)
        .expect("article extracts");

    assert_eq!(article.title, "Lighthouse Keepers of the North Coast");
    let body = article.body_text();
    assert_eq!(body.len(), 3);
    assert!(body[0].starts_with("For more than a century"));
    assert!(body[2].contains("careful ink"));
}

#[test]
fn navigation_sidebar_and_footer_are_dropped() {
    let article = ReadabilityExtractor::default()
        .extract(ARTICLE, BASE)
        .unwrap();
    let all_text = article.body_text().join("\n");
    assert!(!all_text.contains("Trending"));
    assert!(!all_text.contains("Ten things you missed"));
    assert!(!all_text.contains("Copyright"));
    assert!(!all_text.contains("analytics"));
}

#[test]
fn metadata_comes_from_meta_tags() {
    let article = ReadabilityExtractor::default()
        .extract(ARTICLE, BASE)
        .unwrap();
    assert_eq!(article.author.as_deref(), Some("Maren Holt"));
    assert_eq!(
        article.published.as_ref().map(|date| date.display()),
        Some("2023-11-04".to_string())
    );
    assert_eq!(article.tags.as_deref(), Some("history, coast, lighthouses"));
    assert_eq!(
        article.lead_image.as_deref(),
        Some("https://news.example.com/media/lead.jpg")
    );
}

#[test]
fn images_resolve_to_absolute_urls_in_document_order() {
    let article = ReadabilityExtractor::default()
        .extract(ARTICLE, BASE)
        .unwrap();
    let images: Vec<_> = article.images().collect();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].url, "https://news.example.com/media/tower.png");
    assert_eq!(
        images[0].caption.as_deref(),
        Some("The tower at Skarvik, photographed in 1931.")
    );
    assert_eq!(images[1].url, "https://cdn.example.org/img/logbook.jpg");
    assert_eq!(images[1].caption.as_deref(), Some("Logbook page"));
}

#[test]
fn headings_and_images_keep_their_place_in_the_flow() {
    let article = ReadabilityExtractor::default()
        .extract(ARTICLE, BASE)
        .unwrap();
    let kinds: Vec<&str> = article
        .blocks
        .iter()
        .map(|block| match block {
            Block::Heading { .. } => "h",
            Block::Paragraph(_) => "p",
            Block::Image(_) => "img",
        })
        .collect();
    assert_eq!(kinds, vec!["h", "p", "img", "p", "h", "p", "img"]);
}

#[test]
fn empty_body_is_an_extraction_error() {
    let html = "<html><head><title>Nothing here</title></head><body></body></html>";
    let err = ReadabilityExtractor::default()
        .extract(html, BASE)
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoContent { text_length: 0, .. }));
}

#[test]
fn link_farm_is_rejected() {
    let links: String = (0..30)
        .map(|i| format!("<li><a href=\"/p/{i}\">Another headline number {i}</a></li>"))
        .collect();
    let html = format!(
        "<html><head><title>Index</title></head><body><div><ul>{links}</ul></div></body></html>"
    );
    let err = ReadabilityExtractor::default()
        .extract(&html, BASE)
        .unwrap_err();
    assert!(matches!(err, ExtractError::LinkHeavy { .. }));
}

#[test]
fn classed_container_wins_without_semantic_markup() {
    let paragraph = "Plain prose about tides, currents, and the people who measure them every day.";
    let html = format!(
        r#"<html><head><title>Tides</title></head><body>
        <div class="menu"><a href="/a">Section A</a> <a href="/b">Section B</a></div>
        <div class="story-text"><p>{paragraph}</p><p>{paragraph}</p><p>{paragraph}</p></div>
        <div class="comments"><p>Nice article, thanks for writing it up!</p></div>
        </body></html>"#
    );
    let article = ReadabilityExtractor::default()
        .extract(&html, BASE)
        .unwrap();
    assert_eq!(article.body_text(), vec![paragraph; 3]);
}

#[test]
fn threshold_is_configurable() {
    let html = "<html><head><title>Short</title></head><body><article><p>Short but real text.</p></article></body></html>";
    assert!(ReadabilityExtractor::default().extract(html, BASE).is_err());

    let lenient = ReadabilityExtractor::new(ExtractSettings {
        min_text_length: 10,
        ..ExtractSettings::default()
    });
    let article = lenient.extract(html, BASE).unwrap();
    assert_eq!(article.body_text(), vec!["Short but real text."]);
}

#[test]
fn decoded_latin1_page_extracts_accented_title() {
    let mut bytes = b"<html><head><title>Caf\xe9 culture</title></head><body><article><p>".to_vec();
    bytes.extend_from_slice("Espresso ".repeat(20).as_bytes());
    bytes.extend_from_slice(b"</p></article></body></html>");

    let decoded = decode_html(&bytes, Some("text/html; charset=ISO-8859-1"));
    let article = ReadabilityExtractor::default()
        .extract(&decoded.html, BASE)
        .unwrap();
    assert_eq!(article.title, "Caf\u{e9} culture");
}

fn article_page(body: &str) -> String {
    let padding = "Harbour pilots still board every large vessel before it enters the narrow channel. ";
    format!(
        "<html><head><title>Harbour</title></head><body><article><p>{}</p>{body}</article></body></html>",
        padding.repeat(2)
    )
}

#[test]
fn inline_markup_keeps_words_whole() {
    let html = article_page(
        r#"<p>The result was <em>important</em>, said <a href="/people/smith">Dr. Smith</a>. Water is H<sub>2</sub>O and e=mc<sup>2</sup>.</p>"#,
    );
    let article = ReadabilityExtractor::default().extract(&html, BASE).unwrap();
    assert_eq!(
        article.body_text()[1],
        "The result was important, said Dr. Smith. Water is H2O and e=mc2."
    );
}

#[test]
fn minor_headings_read_as_paragraphs() {
    let html = article_page(
        "<h2>Channel rules</h2><h5>Pilots board at the outer buoy.</h5><p>Tugs meet the ship at the breakwater.</p>",
    );
    let article = ReadabilityExtractor::default().extract(&html, BASE).unwrap();
    let headings: Vec<_> = article
        .blocks
        .iter()
        .filter_map(|block| match block {
            Block::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(headings, vec![(2, "Channel rules")]);
    assert!(article
        .body_text()
        .contains(&"Pilots board at the outer buoy.".to_string()));
}

#[test]
fn json_ld_author_fills_in_when_meta_tags_are_missing() {
    let html = article_page("").replace(
        "<title>Harbour</title>",
        r#"<title>Harbour</title><script type="application/ld+json">
        {"@graph":[{"@type":"NewsArticle","author":{"@type":"Person","name":"Ines Vik"},
        "datePublished":"2022-03-09"}]}</script>"#,
    );
    let article = ReadabilityExtractor::default().extract(&html, BASE).unwrap();
    assert_eq!(article.author.as_deref(), Some("Ines Vik"));
    assert_eq!(
        article.published.as_ref().map(|date| date.display()),
        Some("2022-03-09".to_string())
    );
}

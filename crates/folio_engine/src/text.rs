use crate::article::{Article, Block};

/// Plain-text rendering: title, metadata header, then headings and paragraphs.
///
/// Images are omitted. Headings are upper-cased so they stand out without markup.
pub fn render_text(article: &Article) -> String {
    let mut lines: Vec<String> = vec![article.title.clone(), String::new()];

    let mut header = Vec::new();
    if let Some(author) = &article.author {
        header.push(format!("By {author}"));
    }
    if let Some(published) = &article.published {
        header.push(format!("Published: {}", published.display()));
    }
    if let Some(tags) = &article.tags {
        header.push(format!("Tags: {tags}"));
    }
    if !header.is_empty() {
        lines.extend(header);
        lines.push(String::new());
    }

    for block in &article.blocks {
        match block {
            Block::Heading { text, .. } => lines.push(text.to_uppercase()),
            Block::Paragraph(text) => lines.push(text.clone()),
            Block::Image(_) => continue,
        }
        lines.push(String::new());
    }

    let mut text = lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::{ImageRef, PublishedDate};
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_matches_plain_text_format() {
        let article = Article {
            title: "A Title".into(),
            author: Some("Jane Doe".into()),
            published: Some(PublishedDate::parse("2024-02-03T04:05:06Z")),
            tags: Some("rust, pdf".into()),
            lead_image: None,
            source_url: "https://example.com/a".into(),
            blocks: vec![
                Block::Heading {
                    level: 2,
                    text: "Section one".into(),
                },
                Block::Paragraph("First paragraph.".into()),
                Block::Image(ImageRef::new("https://example.com/i.png")),
                Block::Paragraph("Second paragraph.".into()),
            ],
        };

        assert_eq!(
            render_text(&article),
            "A Title\n\nBy Jane Doe\nPublished: 2024-02-03\nTags: rust, pdf\n\nSECTION ONE\n\nFirst paragraph.\n\nSecond paragraph.\n"
        );
    }

    #[test]
    fn missing_metadata_leaves_no_header() {
        let article = Article {
            title: "Only".into(),
            author: None,
            published: None,
            tags: None,
            lead_image: None,
            source_url: String::new(),
            blocks: vec![Block::Paragraph("Body text here.".into())],
        };
        assert_eq!(render_text(&article), "Only\n\nBody text here.\n");
    }
}

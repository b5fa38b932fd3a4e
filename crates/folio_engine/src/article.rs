use bytes::Bytes;
use chrono::{DateTime, NaiveDate};

/// Structured result of content extraction.
///
/// `blocks` keeps the document flow so exporters can interleave images with
/// text; [`Article::body_text`] and [`Article::images`] are projections of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub author: Option<String>,
    pub published: Option<PublishedDate>,
    pub tags: Option<String>,
    pub lead_image: Option<String>,
    pub source_url: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    Image(ImageRef),
}

/// Absolute image URL plus the decoded-later bytes once downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub caption: Option<String>,
    pub payload: Option<Bytes>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            caption: None,
            payload: None,
        }
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDate {
    pub raw: String,
    pub date: Option<NaiveDate>,
}

impl PublishedDate {
    /// Accepts RFC 3339, a `YYYY-MM-DD` prefix or RFC 2822; anything else keeps only `raw`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let date = DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .ok()
            .or_else(|| {
                raw.get(..10)
                    .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            })
            .or_else(|| {
                DateTime::parse_from_rfc2822(raw)
                    .map(|dt| dt.date_naive())
                    .ok()
            });
        Self {
            raw: raw.to_string(),
            date,
        }
    }

    pub fn display(&self) -> String {
        match self.date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => self.raw.clone(),
        }
    }
}

/// Display-oriented digest of an article, sent to the shell before export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArticleSummary {
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub tags: Option<String>,
    /// Representative image of the page, from `og:image` or the first `<img>`.
    pub lead_image: Option<String>,
    pub final_url: String,
    pub paragraph_count: usize,
    pub image_count: usize,
    pub preview: String,
}

impl Article {
    /// Paragraph strings in document order.
    pub fn body_text(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                Block::Paragraph(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Image(image) => Some(image),
            _ => None,
        })
    }

    pub fn images_mut(&mut self) -> impl Iterator<Item = &mut ImageRef> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Image(image) => Some(image),
            _ => None,
        })
    }

    pub fn summary(&self) -> ArticleSummary {
        ArticleSummary {
            title: self.title.clone(),
            author: self.author.clone(),
            published: self.published.as_ref().map(PublishedDate::display),
            tags: self.tags.clone(),
            lead_image: self.lead_image.clone(),
            final_url: self.source_url.clone(),
            paragraph_count: self.body_text().len(),
            image_count: self.images().count(),
            preview: crate::preview::prepare_preview(&crate::text::render_text(self)),
        }
    }
}

//! Structured rich text as stored by the content service
//!
//! A body is a flat list of blocks. Text blocks carry character ranges
//! (`spans`) for inline formatting; offsets count UTF-16 code units, the way
//! the service's editor measures them.
//!
//! HTML output escapes all text and drops links whose target is not a safe
//! URL, so a body never injects markup of its own into a page.

use serde::{Deserialize, Serialize};

use crate::helpers::{html_escape, image_tag, safe_url};

/// Kind of a rich-text block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
    Preformatted,
    ListItem,
    OListItem,
    Image,
    Embed,
    #[serde(other)]
    Unknown,
}

/// Kind of an inline span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Inline formatting over `[start, end)` of a block's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default)]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedData {
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A single rich-text block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Image source
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub oembed: Option<EmbedData>,
}

impl Block {
    #[cfg(test)]
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: BlockKind::Paragraph,
            text: text.to_string(),
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }
    }

    fn is_text(&self) -> bool {
        !matches!(
            self.kind,
            BlockKind::Image | BlockKind::Embed | BlockKind::Unknown
        )
    }
}

/// An ordered rich-text body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText {
    pub blocks: Vec<Block>,
}

impl RichText {
    #[cfg(test)]
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Body made of plain paragraphs
    #[cfg(test)]
    pub fn paragraphs<'a, I: IntoIterator<Item = &'a str>>(texts: I) -> Self {
        Self::new(texts.into_iter().map(Block::paragraph).collect())
    }

    /// Flatten to plain text, one line per text block
    pub fn as_text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| b.is_text())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render to HTML
    pub fn as_html(&self) -> String {
        let mut html = String::new();
        let mut open_list: Option<&'static str> = None;

        for block in &self.blocks {
            let list_tag = match block.kind {
                BlockKind::ListItem => Some("ul"),
                BlockKind::OListItem => Some("ol"),
                _ => None,
            };

            if open_list != list_tag {
                if let Some(tag) = open_list {
                    html.push_str(&format!("</{}>", tag));
                }
                if let Some(tag) = list_tag {
                    html.push_str(&format!("<{}>", tag));
                }
                open_list = list_tag;
            }

            html.push_str(&render_block(block));
        }

        if let Some(tag) = open_list {
            html.push_str(&format!("</{}>", tag));
        }

        html
    }
}

fn render_block(block: &Block) -> String {
    let inline = || render_spans(&block.text, &block.spans);
    match block.kind {
        BlockKind::Paragraph => format!("<p>{}</p>", inline()),
        BlockKind::Heading1 => format!("<h1>{}</h1>", inline()),
        BlockKind::Heading2 => format!("<h2>{}</h2>", inline()),
        BlockKind::Heading3 => format!("<h3>{}</h3>", inline()),
        BlockKind::Heading4 => format!("<h4>{}</h4>", inline()),
        BlockKind::Heading5 => format!("<h5>{}</h5>", inline()),
        BlockKind::Heading6 => format!("<h6>{}</h6>", inline()),
        BlockKind::Preformatted => format!("<pre>{}</pre>", html_escape(&block.text)),
        BlockKind::ListItem | BlockKind::OListItem => format!("<li>{}</li>", inline()),
        BlockKind::Image => {
            let img = block
                .url
                .as_deref()
                .map(|src| image_tag(src, block.alt.as_deref()))
                .unwrap_or_default();
            if img.is_empty() {
                String::new()
            } else {
                format!(r#"<p class="block-img">{}</p>"#, img)
            }
        }
        BlockKind::Embed => {
            // Provider-supplied embed markup is never inlined; link to it instead
            let embed = block.oembed.as_ref();
            let url = embed.and_then(|e| e.embed_url.as_deref()).and_then(safe_url);
            match url {
                Some(url) => {
                    let title = embed
                        .and_then(|e| e.title.as_deref())
                        .unwrap_or(url);
                    format!(
                        r#"<div class="embed"><a href="{}" target="_blank" rel="noopener noreferrer">{}</a></div>"#,
                        html_escape(url),
                        html_escape(title)
                    )
                }
                None => String::new(),
            }
        }
        BlockKind::Unknown => String::new(),
    }
}

fn open_tag(span: &Span) -> String {
    match span.kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Em => "<em>".to_string(),
        SpanKind::Hyperlink => {
            let url = span
                .data
                .as_ref()
                .and_then(|d| d.url.as_deref())
                .and_then(safe_url);
            match url {
                Some(url) => {
                    let external = !url.starts_with('/') && !url.starts_with('#');
                    let blank = span
                        .data
                        .as_ref()
                        .and_then(|d| d.target.as_deref())
                        .map(|t| t == "_blank")
                        .unwrap_or(false);
                    if external && blank {
                        format!(
                            r#"<a href="{}" target="_blank" rel="noopener noreferrer">"#,
                            html_escape(url)
                        )
                    } else {
                        format!(r#"<a href="{}">"#, html_escape(url))
                    }
                }
                None => String::new(),
            }
        }
        SpanKind::Label => {
            let label = span
                .data
                .as_ref()
                .and_then(|d| d.label.as_deref())
                .unwrap_or("");
            format!(r#"<span class="{}">"#, html_escape(label))
        }
        SpanKind::Unknown => String::new(),
    }
}

fn close_tag(span: &Span, opened: &str) -> &'static str {
    if opened.is_empty() {
        return "";
    }
    match span.kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Em => "</em>",
        SpanKind::Hyperlink => "</a>",
        SpanKind::Label => "</span>",
        SpanKind::Unknown => "",
    }
}

/// Byte offset for every UTF-16 offset that falls on a char boundary
fn utf16_to_byte_offsets(text: &str) -> Vec<(usize, usize)> {
    let mut offsets = Vec::with_capacity(text.len() + 1);
    let mut utf16 = 0;
    for (byte, c) in text.char_indices() {
        offsets.push((utf16, byte));
        utf16 += c.len_utf16();
    }
    offsets.push((utf16, text.len()));
    offsets
}

fn byte_offset(offsets: &[(usize, usize)], utf16: usize) -> usize {
    match offsets.binary_search_by_key(&utf16, |(u, _)| *u) {
        Ok(i) => offsets[i].1,
        // inside a surrogate pair or past the end; snap forward
        Err(i) => offsets.get(i).map(|(_, b)| *b).unwrap_or_else(|| {
            offsets.last().map(|(_, b)| *b).unwrap_or(0)
        }),
    }
}

/// Escape `text` and wrap the span ranges in tags, keeping tags properly
/// nested even when spans overlap
fn render_spans(text: &str, spans: &[Span]) -> String {
    let offsets = utf16_to_byte_offsets(text);
    let text_len = text.len();

    let mut spans: Vec<(usize, usize, &Span)> = spans
        .iter()
        .map(|s| {
            let start = byte_offset(&offsets, s.start).min(text_len);
            let end = byte_offset(&offsets, s.end).min(text_len);
            (start, end, s)
        })
        .filter(|(start, end, _)| start < end)
        .collect();
    // outer spans first when they start together
    spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut points: Vec<usize> = spans.iter().flat_map(|(s, e, _)| [*s, *e]).collect();
    points.push(0);
    points.push(text_len);
    points.sort_unstable();
    points.dedup();

    let mut out = String::with_capacity(text.len() + spans.len() * 16);
    // (end, span, opening tag)
    let mut stack: Vec<(usize, &Span, String)> = Vec::new();
    let mut next = 0;

    for window in points.windows(2) {
        let (pos, until) = (window[0], window[1]);

        // close spans ending here, reopening any inner span that outlives them
        if stack.iter().any(|(end, _, _)| *end <= pos) {
            let mut reopen = Vec::new();
            while let Some((end, span, tag)) = stack.pop() {
                out.push_str(close_tag(span, &tag));
                if end > pos {
                    reopen.push((end, span, tag));
                }
                if stack.iter().all(|(end, _, _)| *end > pos) {
                    break;
                }
            }
            while let Some((end, span, tag)) = reopen.pop() {
                out.push_str(&tag);
                stack.push((end, span, tag));
            }
        }

        while next < spans.len() && spans[next].0 == pos {
            let (_, end, span) = spans[next];
            let tag = open_tag(span);
            out.push_str(&tag);
            stack.push((end, span, tag));
            next += 1;
        }

        for (i, line) in text[pos..until].split('\n').enumerate() {
            if i > 0 {
                out.push_str("<br />");
            }
            out.push_str(&html_escape(line));
        }
    }

    while let Some((_, span, tag)) = stack.pop() {
        out.push_str(close_tag(span, &tag));
    }

    out
}

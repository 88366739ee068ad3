//! Draws a composed `Document` onto A4 pages and serializes it with lopdf.
//!
//! Blocks are first laid out into lines (each with a height and a set of draw
//! instructions relative to its top edge), then flowed onto physical pages.
//! Content that does not fit continues on a new page; the continuation keeps
//! the footer and its own page number.

use lopdf::{dictionary, Document as PdfDocument, Object, ObjectId, Stream};
use thiserror::Error;

use super::document::{Block, Document, Page, PageStyle, BRAND};
use super::metrics::{wrap_text, Font};

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const BODY_TOP: f32 = PAGE_HEIGHT - MARGIN;
const BODY_BOTTOM: f32 = 62.0;
const FOOTER_BASELINE: f32 = 32.0;
const COLUMN_GUTTER: f32 = 20.0;
const BULLET_INDENT: f32 = 12.0;
const LEADING: f32 = 1.4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document has no pages")]
    Empty,

    #[error("failed to write PDF: {0}")]
    Write(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgb(f32, f32, f32);

const PRIMARY: Rgb = Rgb(0.31, 0.27, 0.90);
const INK: Rgb = Rgb(0.12, 0.12, 0.16);
const MUTED: Rgb = Rgb(0.42, 0.45, 0.50);
const RULE: Rgb = Rgb(0.85, 0.86, 0.90);
const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: Font,
    size: f32,
    color: Rgb,
}

impl TextStyle {
    const fn new(font: Font, size: f32, color: Rgb) -> Self {
        Self { font, size, color }
    }

    fn line_height(self) -> f32 {
        self.size * LEADING
    }

    fn wrap(self, text: &str, width: f32) -> Vec<String> {
        wrap_text(text, self.font, self.size, width)
    }

    fn width(self, text: &str) -> f32 {
        self.font.metrics().width_pt(text, self.size)
    }
}

const PAGE_TITLE: TextStyle = TextStyle::new(Font::Bold, 18.0, INK);
const PAGE_SUBTITLE: TextStyle = TextStyle::new(Font::Regular, 11.0, MUTED);
const BANNER_TITLE: TextStyle = TextStyle::new(Font::Bold, 16.0, WHITE);
const BANNER_SUBTITLE: TextStyle = TextStyle::new(Font::Regular, 11.0, WHITE);
const HEADING: TextStyle = TextStyle::new(Font::Bold, 12.0, PRIMARY);
const LABEL: TextStyle = TextStyle::new(Font::Bold, 10.0, INK);
const BODY: TextStyle = TextStyle::new(Font::Regular, 10.0, INK);
const QUOTE: TextStyle = TextStyle::new(Font::Regular, 10.0, MUTED);
const FOOTER: TextStyle = TextStyle::new(Font::Regular, 8.0, MUTED);
const COVER_TITLE: TextStyle = TextStyle::new(Font::Bold, 34.0, WHITE);
const COVER_LEAD: TextStyle = TextStyle::new(Font::Bold, 20.0, WHITE);
const COVER_LINE: TextStyle = TextStyle::new(Font::Regular, 12.0, WHITE);

// ────────────────────────────────────────────────────────────────────────────
// Entry point
// ────────────────────────────────────────────────────────────────────────────

pub fn render_pdf(document: &Document) -> Result<Vec<u8>, RenderError> {
    let mut canvases = Vec::new();
    for page in &document.pages {
        match page.style {
            PageStyle::Cover => canvases.push(render_cover(page)),
            PageStyle::Content => canvases.extend(flow_content(page)),
        }
    }
    if canvases.is_empty() {
        return Err(RenderError::Empty);
    }

    for (index, canvas) in canvases.iter_mut().enumerate() {
        if canvas.style == PageStyle::Content {
            canvas.footer(index + 1);
        }
    }

    write_pdf(&canvases)
}

// ────────────────────────────────────────────────────────────────────────────
// Canvas: one physical page worth of content-stream operators
// ────────────────────────────────────────────────────────────────────────────

struct Canvas {
    style: PageStyle,
    ops: String,
}

impl Canvas {
    fn new(style: PageStyle) -> Self {
        Self {
            style,
            ops: String::new(),
        }
    }

    fn text(&mut self, x: f32, baseline: f32, style: TextStyle, text: &str) {
        let Rgb(r, g, b) = style.color;
        self.ops.push_str(&format!(
            "BT /{} {:.1} Tf {r:.3} {g:.3} {b:.3} rg {x:.2} {baseline:.2} Td ({}) Tj ET\n",
            style.font.resource_name(),
            style.size,
            pdf_string(text),
        ));
    }

    fn fill(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        let Rgb(r, g, b) = color;
        self.ops.push_str(&format!(
            "{r:.3} {g:.3} {b:.3} rg {x:.2} {y:.2} {width:.2} {height:.2} re f\n"
        ));
    }

    fn rule(&mut self, x: f32, y: f32, width: f32, color: Rgb) {
        let Rgb(r, g, b) = color;
        let x2 = x + width;
        self.ops.push_str(&format!(
            "{r:.3} {g:.3} {b:.3} RG 0.75 w {x:.2} {y:.2} m {x2:.2} {y:.2} l S\n"
        ));
    }

    /// Draws `line` with its top edge at `top`.
    fn draw_line(&mut self, line: &Line, top: f32) {
        for draw in &line.draws {
            match draw {
                Draw::Text {
                    x,
                    baseline,
                    style,
                    text,
                } => self.text(*x, top - baseline, *style, text),
                Draw::Fill {
                    x,
                    offset,
                    width,
                    height,
                    color,
                } => self.fill(*x, top - offset - height, *width, *height, *color),
                Draw::Rule {
                    x,
                    offset,
                    width,
                    color,
                } => self.rule(*x, top - offset, *width, *color),
            }
        }
    }

    fn footer(&mut self, page_number: usize) {
        self.rule(MARGIN, FOOTER_BASELINE + 12.0, CONTENT_WIDTH, RULE);
        self.text(
            MARGIN,
            FOOTER_BASELINE,
            FOOTER,
            &format!("Generated by {BRAND}"),
        );
        let label = format!("Page {page_number}");
        let x = PAGE_WIDTH - MARGIN - FOOTER.width(&label);
        self.text(x, FOOTER_BASELINE, FOOTER, &label);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lines
// ────────────────────────────────────────────────────────────────────────────

/// Vertical offsets are measured downward from the line's top edge.
#[derive(Debug, Clone)]
enum Draw {
    Text {
        x: f32,
        baseline: f32,
        style: TextStyle,
        text: String,
    },
    Fill {
        x: f32,
        offset: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    Rule {
        x: f32,
        offset: f32,
        width: f32,
        color: Rgb,
    },
}

#[derive(Debug, Clone, Default)]
struct Line {
    height: f32,
    /// Never end a page after this line.
    keep_with_next: bool,
    draws: Vec<Draw>,
}

impl Line {
    fn spacer(height: f32) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    fn text(x: f32, style: TextStyle, text: impl Into<String>) -> Self {
        Self {
            height: style.line_height(),
            keep_with_next: false,
            draws: vec![Draw::Text {
                x,
                baseline: style.size * 1.05,
                style,
                text: text.into(),
            }],
        }
    }

    fn keep(mut self) -> Self {
        self.keep_with_next = true;
        self
    }

    fn is_spacer(&self) -> bool {
        self.draws.is_empty()
    }
}

fn layout_blocks(blocks: &[Block], x: f32, width: f32) -> Vec<Line> {
    blocks
        .iter()
        .flat_map(|block| layout_block(block, x, width))
        .collect()
}

fn layout_block(block: &Block, x: f32, width: f32) -> Vec<Line> {
    match block {
        Block::CoverTitle(text) => centered_lines(text, COVER_TITLE, x, width),
        Block::CoverLine(text) => centered_lines(text, COVER_LINE, x, width),
        Block::PageHeader { title, subtitle } => {
            let mut lines: Vec<Line> = PAGE_TITLE
                .wrap(title, width)
                .into_iter()
                .map(|l| Line::text(x, PAGE_TITLE, l).keep())
                .collect();
            lines.extend(
                PAGE_SUBTITLE
                    .wrap(subtitle, width)
                    .into_iter()
                    .map(|l| Line::text(x, PAGE_SUBTITLE, l).keep()),
            );
            lines.push(Line {
                height: 14.0,
                keep_with_next: true,
                draws: vec![Draw::Rule {
                    x,
                    offset: 6.0,
                    width,
                    color: RULE,
                }],
            });
            lines
        }
        Block::Banner { title, subtitle } => banner(title, subtitle.as_deref(), x, width),
        Block::Heading(text) => {
            let mut lines = vec![Line::spacer(8.0).keep()];
            lines.extend(
                HEADING
                    .wrap(text, width)
                    .into_iter()
                    .map(|l| Line::text(x, HEADING, l).keep()),
            );
            lines.push(Line::spacer(2.0).keep());
            lines
        }
        Block::Label(text) => {
            let mut lines: Vec<Line> = LABEL
                .wrap(text, width)
                .into_iter()
                .map(|l| Line::text(x, LABEL, l).keep())
                .collect();
            lines.push(Line::spacer(1.0).keep());
            lines
        }
        Block::Paragraph(text) => {
            let mut lines: Vec<Line> = BODY
                .wrap(text, width)
                .into_iter()
                .map(|l| Line::text(x, BODY, l))
                .collect();
            lines.push(Line::spacer(4.0));
            lines
        }
        Block::LabelValue { label, value } => label_value(label, value, x, width),
        Block::Bullets(items) => {
            let mut lines = Vec::new();
            for item in items {
                let mut wrapped = BODY.wrap(item, width - BULLET_INDENT).into_iter();
                let Some(first) = wrapped.next() else {
                    continue;
                };
                let mut line = Line::text(x + BULLET_INDENT, BODY, first);
                line.draws.push(Draw::Text {
                    x: x + 2.0,
                    baseline: BODY.size * 1.05,
                    style: TextStyle::new(Font::Regular, BODY.size, PRIMARY),
                    text: "\u{2022}".to_string(),
                });
                lines.push(line);
                lines.extend(wrapped.map(|l| Line::text(x + BULLET_INDENT, BODY, l)));
                lines.push(Line::spacer(2.0));
            }
            lines.push(Line::spacer(3.0));
            lines
        }
        Block::Quote(text) => {
            let mut lines: Vec<Line> = QUOTE
                .wrap(text, width - 14.0)
                .into_iter()
                .map(|l| {
                    let mut line = Line::text(x + 12.0, QUOTE, l);
                    line.draws.insert(
                        0,
                        Draw::Fill {
                            x,
                            offset: 0.0,
                            width: 3.0,
                            height: QUOTE.line_height(),
                            color: PRIMARY,
                        },
                    );
                    line
                })
                .collect();
            lines.push(Line::spacer(6.0));
            lines
        }
        Block::Columns { left, right } => {
            let column_width = (width - COLUMN_GUTTER) / 2.0;
            let left = layout_blocks(left, x, column_width);
            let right = layout_blocks(right, x + column_width + COLUMN_GUTTER, column_width);
            let mut lines = zip_columns(left, right);
            lines.push(Line::spacer(6.0));
            lines
        }
    }
}

fn centered_lines(text: &str, style: TextStyle, x: f32, width: f32) -> Vec<Line> {
    style
        .wrap(text, width)
        .into_iter()
        .map(|l| {
            let offset = ((width - style.width(&l)) / 2.0).max(0.0);
            Line::text(x + offset, style, l)
        })
        .collect()
}

/// Shaded band: the fill rides on the first line and spans the whole group.
fn banner(title: &str, subtitle: Option<&str>, x: f32, width: f32) -> Vec<Line> {
    const PADDING: f32 = 10.0;
    let inner_x = x + 12.0;
    let inner_width = width - 24.0;

    let mut body: Vec<Line> = BANNER_TITLE
        .wrap(title, inner_width)
        .into_iter()
        .map(|l| Line::text(inner_x, BANNER_TITLE, l).keep())
        .collect();
    if let Some(subtitle) = subtitle {
        body.extend(
            BANNER_SUBTITLE
                .wrap(subtitle, inner_width)
                .into_iter()
                .map(|l| Line::text(inner_x, BANNER_SUBTITLE, l).keep()),
        );
    }

    let total = PADDING * 2.0 + body.iter().map(|l| l.height).sum::<f32>();
    let mut lines = vec![Line {
        height: PADDING,
        keep_with_next: true,
        draws: vec![Draw::Fill {
            x,
            offset: 0.0,
            width,
            height: total,
            color: PRIMARY,
        }],
    }];
    lines.extend(body);
    lines.push(Line::spacer(PADDING));
    lines.push(Line::spacer(8.0));
    lines
}

/// `Label: value` with the value hanging under itself when it wraps.
fn label_value(label: &str, value: &str, x: f32, width: f32) -> Vec<Line> {
    let prefix = format!("{label}: ");
    let indent = LABEL.width(&prefix).min(width / 2.0);
    let mut wrapped = BODY.wrap(value, width - indent).into_iter();

    let mut first = Line::text(x, LABEL, prefix);
    if let Some(text) = wrapped.next() {
        first.draws.push(Draw::Text {
            x: x + indent,
            baseline: BODY.size * 1.05,
            style: BODY,
            text,
        });
    }
    let mut lines = vec![first];
    lines.extend(wrapped.map(|l| Line::text(x + indent, BODY, l)));
    lines.push(Line::spacer(3.0));
    lines
}

/// Merges two columns row by row so they can flow across a page break together.
fn zip_columns(left: Vec<Line>, right: Vec<Line>) -> Vec<Line> {
    let rows = left.len().max(right.len());
    let mut left = left.into_iter();
    let mut right = right.into_iter();
    (0..rows)
        .map(|_| match (left.next(), right.next()) {
            (Some(mut l), Some(r)) => {
                l.height = l.height.max(r.height);
                l.keep_with_next |= r.keep_with_next;
                l.draws.extend(r.draws);
                l
            }
            (Some(line), None) | (None, Some(line)) => line,
            (None, None) => Line::default(),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Page flow
// ────────────────────────────────────────────────────────────────────────────

fn render_cover(page: &Page) -> Canvas {
    let mut canvas = Canvas::new(PageStyle::Cover);
    let band_bottom = PAGE_HEIGHT * 0.36;
    canvas.fill(0.0, band_bottom, PAGE_WIDTH, PAGE_HEIGHT * 0.42, PRIMARY);

    let mut top = PAGE_HEIGHT * 0.70;
    let mut lead_done = false;
    for block in &page.blocks {
        let lines = match block {
            Block::CoverLine(text) if !lead_done => {
                lead_done = true;
                let mut lines = vec![Line::spacer(10.0)];
                lines.extend(centered_lines(text, COVER_LEAD, MARGIN, CONTENT_WIDTH));
                lines.push(Line::spacer(6.0));
                lines
            }
            other => layout_block(other, MARGIN, CONTENT_WIDTH),
        };
        for line in &lines {
            canvas.draw_line(line, top);
            top -= line.height;
        }
    }
    canvas
}

fn flow_content(page: &Page) -> Vec<Canvas> {
    let lines = layout_blocks(&page.blocks, MARGIN, CONTENT_WIDTH);
    let body_height = BODY_TOP - BODY_BOTTOM;

    let mut pages = Vec::new();
    let mut current = Canvas::new(PageStyle::Content);
    let mut top = BODY_TOP;
    let mut fresh = true;

    for (index, line) in lines.iter().enumerate() {
        if fresh && line.is_spacer() {
            continue;
        }
        let needed = group_height(&lines[index..]).min(body_height);
        if !fresh && top - needed < BODY_BOTTOM {
            pages.push(std::mem::replace(
                &mut current,
                Canvas::new(PageStyle::Content),
            ));
            top = BODY_TOP;
            fresh = true;
            if line.is_spacer() {
                continue;
            }
        }
        current.draw_line(line, top);
        top -= line.height;
        fresh = false;
    }
    pages.push(current);
    pages
}

/// Height of `lines[0]` plus every following line it is kept together with.
fn group_height(lines: &[Line]) -> f32 {
    let mut height = 0.0;
    for line in lines {
        height += line.height;
        if !line.keep_with_next {
            break;
        }
    }
    height
}

// ────────────────────────────────────────────────────────────────────────────
// Serialization
// ────────────────────────────────────────────────────────────────────────────

fn font_object(font: Font) -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    })
}

fn write_pdf(canvases: &[Canvas]) -> Result<Vec<u8>, RenderError> {
    let mut doc = PdfDocument::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font_object(Font::Regular));
    let bold_id = doc.add_object(font_object(Font::Bold));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Regular.resource_name() => regular_id,
            Font::Bold.resource_name() => bold_id,
        },
    });

    let page_ids: Vec<ObjectId> = canvases
        .iter()
        .map(|canvas| {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                canvas.ops.clone().into_bytes(),
            ));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            })
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|&id| id.into()).collect::<Vec<Object>>(),
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Write(e.to_string()))?;
    Ok(buffer)
}

// ────────────────────────────────────────────────────────────────────────────
// Text encoding
// ────────────────────────────────────────────────────────────────────────────

/// Maps a character to its WinAnsiEncoding byte; `?` when it has none.
fn win_ansi(c: char) -> u8 {
    match c {
        ' '..='~' => c as u8,
        '\t' => b' ',
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '\u{20AC}' => 0x80,
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2122}' => 0x99,
        _ => b'?',
    }
}

/// Body of a PDF literal string. Non-ASCII bytes are octal-escaped so the
/// content stream stays 7-bit.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.chars().map(win_ansi) {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:03o}")),
        }
    }
    out
}

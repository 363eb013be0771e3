//! Structured document PDF generation
//!
//! Invoice-class documents that arrive without a pre-rendered PDF are
//! generated here with printpdf's data-oriented API: a flat list of
//! styled lines laid out top-to-bottom on A4 pages, with the items
//! table in a monospace font at fixed columns.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};

use shared::{DocumentType, LineItem, PartyBlock, PrintJob};

use super::RenderError;

const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;

/// Items table columns (monospace): qty(5) desc(52) price(12)
const COL_QTY: usize = 5;
const COL_DESC: usize = 52;
const COL_PRICE: usize = 12;

struct Line {
    text: String,
    font: BuiltinFont,
    size: f32,
    /// Extra vertical gap above this line, in pt.
    gap_before: f32,
}

impl Line {
    fn new(text: impl Into<String>, font: BuiltinFont, size: f32) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            gap_before: 0.0,
        }
    }

    fn spaced(mut self, gap: f32) -> Self {
        self.gap_before = gap;
        self
    }
}

/// Generate a PDF for an invoice / quote / delivery note / report.
pub fn generate_document_pdf(job: &PrintJob) -> Result<Vec<u8>, RenderError> {
    let title = document_title(job.document_type);
    let lines = layout_lines(job, title);

    let mut doc = PdfDocument::new(title);
    let page_w = Mm(PAGE_W_MM);
    let page_h = Mm(PAGE_H_MM);
    let page_h_pt = page_h.into_pt().0;
    let margin_pt = Mm(MARGIN_MM).into_pt().0;
    let usable_height_pt = page_h_pt - 2.0 * margin_pt;

    let mut pages: Vec<PdfPage> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    let mut y_used: f32 = 0.0;

    for line in &lines {
        let line_height = line.size * 1.35 + line.gap_before;
        if y_used + line_height > usable_height_pt && !ops.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
            y_used = 0.0;
        }
        y_used += line_height;
        let y_pt = page_h_pt - margin_pt - y_used;

        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(margin_pt),
                y: Pt(y_pt),
            },
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(line.size),
            font: line.font,
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(line.text.clone())],
            font: line.font,
        });
        ops.push(Op::EndTextSection);
    }

    if !ops.is_empty() || pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, ops));
    }
    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if bytes.is_empty() {
        return Err(RenderError::Pdf("empty output".into()));
    }
    Ok(bytes)
}

fn document_title(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Invoice => "FACTURE",
        DocumentType::Quote => "DEVIS",
        DocumentType::DeliveryNote => "BON DE LIVRAISON",
        _ => "RAPPORT",
    }
}

fn layout_lines(job: &PrintJob, title: &str) -> Vec<Line> {
    let content = &job.content;
    let mut lines = Vec::new();

    lines.push(Line::new(title, BuiltinFont::HelveticaBold, 22.0));

    if let Some(number) = &content.document_number {
        lines.push(Line::new(
            format!("N° {number}"),
            BuiltinFont::Helvetica,
            12.0,
        ));
    }
    let date = content
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%d/%m/%Y").to_string());
    lines.push(Line::new(date, BuiltinFont::Helvetica, 10.0));

    if let Some(company) = &content.company {
        push_party(&mut lines, company, 14.0);
    }
    if let Some(client) = &content.client {
        lines.push(Line::new("Client :", BuiltinFont::HelveticaBold, 11.0).spaced(10.0));
        push_party(&mut lines, client, 0.0);
    }

    // Items table
    if let Some(items) = &content.items {
        lines.push(
            Line::new(table_row("Qté", "Désignation", "Prix"), BuiltinFont::CourierBold, 10.0)
                .spaced(14.0),
        );
        lines.push(Line::new(
            "-".repeat(COL_QTY + COL_DESC + COL_PRICE),
            BuiltinFont::Courier,
            10.0,
        ));
        for item in items {
            lines.push(Line::new(item_row(item), BuiltinFont::Courier, 10.0));
        }
        lines.push(Line::new(
            "-".repeat(COL_QTY + COL_DESC + COL_PRICE),
            BuiltinFont::Courier,
            10.0,
        ));
    }

    if let Some(total) = content.total {
        lines.push(
            Line::new(
                table_row("", "TOTAL", &format!("{total:.2} EUR")),
                BuiltinFont::CourierBold,
                12.0,
            )
            .spaced(4.0),
        );
    }

    if let Some(footer) = &content.footer {
        lines.push(Line::new(footer, BuiltinFont::Helvetica, 9.0).spaced(18.0));
    }

    lines
}

fn push_party(lines: &mut Vec<Line>, party: &PartyBlock, gap: f32) {
    let mut first = true;
    for field in [&party.name, &party.address, &party.phone, &party.email]
        .into_iter()
        .flatten()
    {
        let mut line = Line::new(field, BuiltinFont::Helvetica, 10.0);
        if first && gap > 0.0 {
            line = line.spaced(gap);
        }
        first = false;
        lines.push(line);
    }
}

fn pad(s: &str, width: usize) -> String {
    let truncated: String = s.chars().take(width).collect();
    format!("{truncated:<width$}")
}

fn pad_right(s: &str, width: usize) -> String {
    let truncated: String = s.chars().take(width).collect();
    format!("{truncated:>width$}")
}

fn table_row(qty: &str, desc: &str, price: &str) -> String {
    format!(
        "{}{}{}",
        pad(qty, COL_QTY),
        pad(desc, COL_DESC),
        pad_right(price, COL_PRICE)
    )
}

fn item_row(item: &LineItem) -> String {
    let qty = if item.quantity.fract() == 0.0 {
        format!("{}", item.quantity as i64)
    } else {
        format!("{}", item.quantity)
    };
    table_row(&qty, &item.description, &format!("{:.2}", item.price))
}

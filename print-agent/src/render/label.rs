//! HTML label rendering
//!
//! Fallback path when a label job carries neither ZPL nor raw data nor
//! a pre-rendered PDF: a self-contained HTML page sized to the exact
//! physical label dimensions, which the spooler driver prints like any
//! other document. Default size 62×29 mm, landscape.

use shared::PrintJob;

const DEFAULT_WIDTH_MM: f64 = 62.0;
const DEFAULT_HEIGHT_MM: f64 = 29.0;

/// Build the label HTML for a job.
pub(super) fn build_label_html(job: &PrintJob) -> String {
    let content = &job.content;
    let width_mm = job.options.label_width_mm.unwrap_or(DEFAULT_WIDTH_MM);
    let height_mm = job.options.label_height_mm.unwrap_or(DEFAULT_HEIGHT_MM);

    let title = content.title.as_deref().unwrap_or("");
    let subtitle = content.subtitle.as_deref().unwrap_or("");
    let sku = content.sku.as_deref().unwrap_or("");
    let price = content
        .price
        .map(|p| format!("{p:.2} €"))
        .unwrap_or_default();
    let barcode = content.barcode.as_deref().unwrap_or("");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
  @page {{
    size: {width_mm}mm {height_mm}mm landscape;
    margin: 0;
  }}
  html, body {{
    width: {width_mm}mm;
    height: {height_mm}mm;
    margin: 0;
    padding: 1mm;
    box-sizing: border-box;
    font-family: Arial, sans-serif;
    overflow: hidden;
  }}
  .title {{ font-size: 3.2mm; font-weight: bold; white-space: nowrap; }}
  .subtitle {{ font-size: 2.4mm; }}
  .row {{ display: flex; justify-content: space-between; font-size: 2.6mm; }}
  .price {{ font-weight: bold; }}
  .barcode {{ font-family: monospace; font-size: 2.8mm; letter-spacing: 0.5mm; text-align: center; }}
</style>
</head>
<body>
  <div class="title">{title}</div>
  <div class="subtitle">{subtitle}</div>
  <div class="row"><span class="sku">{sku}</span><span class="price">{price}</span></div>
  <div class="barcode">{barcode}</div>
</body>
</html>
"#,
        title = escape_html(title),
        subtitle = escape_html(subtitle),
        sku = escape_html(sku),
        price = escape_html(&price),
        barcode = escape_html(barcode),
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

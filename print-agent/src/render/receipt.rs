//! Thermal receipt / ticket renderer
//!
//! Fixed layout: centered store header, rule, document number,
//! timestamp, optional client block, item lines with right-aligned
//! prices, total in EUR, footer. The closing courtesy line only
//! appears on receipts that actually bill something.

use chrono_tz::Tz;
use rm_printer::{Dialect, EscPosBuilder};

use shared::{PrintJob, PrinterDescriptor};

/// Receipts are stamped in the shop's local time.
const RECEIPT_TZ: Tz = chrono_tz::Europe::Paris;

/// Render a receipt or ticket job to ESC/POS bytes.
pub fn render_receipt(job: &PrintJob, printer: &PrinterDescriptor) -> Vec<u8> {
    let dialect = Dialect::for_device_name(&printer.system_name);
    let width = char_width(printer);
    let mut b = EscPosBuilder::new(width, dialect);
    let content = &job.content;

    // Header: store name, double height bold, centered
    b.center();
    if let Some(store_name) = &content.store_name {
        b.double_height_bold();
        b.line(store_name);
        b.reset_style();
    }
    if let Some(address) = &content.store_address {
        b.line(address);
    }
    b.left();
    b.sep_single();

    // Document number, centered
    let number = content
        .ticket_number
        .as_deref()
        .or(content.receipt_number.as_deref());
    if let Some(number) = number {
        b.center();
        b.line(number);
        b.left();
    }

    // Timestamp, left-aligned
    let timestamp = content
        .timestamp
        .clone()
        .unwrap_or_else(|| now_formatted());
    b.line(&timestamp);

    // Client block
    if let Some(client) = &content.client_name {
        match &content.client_phone {
            Some(phone) => b.line(&format!("{client} - {phone}")),
            None => b.line(client),
        };
    }
    b.sep_single();

    // Item lines: "Nx desc" left, price right
    let items = content.items.as_deref().unwrap_or(&[]);
    for item in items {
        let qty = format_quantity(item.quantity);
        b.line_lr(
            &format!("{qty}x {}", item.description),
            &format!("{:.2}", item.price),
        );
    }
    b.sep_single();

    // Total, right-aligned, emphasized
    if let Some(total) = content.total {
        b.right();
        b.double_height_bold();
        b.line(&format!("TOTAL: {total:.2} EUR"));
        b.reset_style();
        b.left();
    }

    if let Some(footer) = &content.footer {
        b.newline();
        b.center();
        b.line(footer);
        b.left();
    }

    if !items.is_empty() {
        b.newline();
        b.center();
        b.line("Merci de votre visite !");
        b.left();
    }

    b.cut_feed(4);
    b.build()
}

/// 58mm paper fits 32 columns, 80mm fits 48.
fn char_width(printer: &PrinterDescriptor) -> usize {
    if printer.capabilities.max_width_mm <= 58 {
        32
    } else {
        48
    }
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{quantity}")
    }
}

fn now_formatted() -> String {
    chrono::Utc::now()
        .with_timezone(&RECEIPT_TZ)
        .format("%d/%m/%Y %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printers::{classify, RawPrinter};

    fn printer(name: &str) -> PrinterDescriptor {
        classify(&RawPrinter {
            name: name.into(),
            ..Default::default()
        })
    }

    fn receipt_job(content: serde_json::Value) -> PrintJob {
        serde_json::from_value(serde_json::json!({
            "id": "J1",
            "printerSystemName": "TM-T88V",
            "documentType": "receipt",
            "content": content,
        }))
        .unwrap()
    }

    fn rendered_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn test_full_receipt_layout() {
        let job = receipt_job(serde_json::json!({
            "storeName": "Chez Martin",
            "storeAddress": "12 rue de la Paix, Lyon",
            "ticketNumber": "T-0042",
            "timestamp": "22/01/2025 14:32",
            "clientName": "Jean Dupont",
            "clientPhone": "+33 6 12 34 56 78",
            "items": [
                {"quantity": 2, "description": "Vitre iPhone 12", "price": 49.90},
                {"quantity": 1, "description": "Coque", "price": 9.99}
            ],
            "total": 109.79,
            "footer": "TVA FR 12 345 678 901"
        }));

        let bytes = render_receipt(&job, &printer("EPSON TM-T88V"));
        let text = rendered_text(&bytes);

        assert!(text.contains("Chez Martin"));
        assert!(text.contains("12 rue de la Paix, Lyon"));
        assert!(text.contains("T-0042"));
        assert!(text.contains("22/01/2025 14:32"));
        assert!(text.contains("Jean Dupont - +33 6 12 34 56 78"));
        assert!(text.contains("2x Vitre iPhone 12"));
        assert!(text.contains("49.90"));
        assert!(text.contains("TOTAL: 109.79 EUR"));
        assert!(text.contains("TVA FR 12 345 678 901"));
        assert!(text.contains("Merci de votre visite !"));
        // EPSON cut-with-feed at the end
        assert!(bytes.windows(3).any(|w| w == [0x1D, 0x56, 0x42]));
    }

    #[test]
    fn test_courtesy_line_needs_items() {
        let job = receipt_job(serde_json::json!({
            "storeName": "Chez Martin",
            "ticketNumber": "T-0001"
        }));
        let text = rendered_text(&render_receipt(&job, &printer("EPSON TM-T88V")));
        assert!(!text.contains("Merci de votre visite !"));
    }

    #[test]
    fn test_star_dialect_selected_by_name() {
        let job = receipt_job(serde_json::json!({
            "storeName": "S",
            "items": [{"quantity": 1, "description": "X", "price": 1.0}]
        }));
        let bytes = render_receipt(&job, &printer("Star TSP143"));
        // STAR cut (ESC d 2), no EPSON GS V
        assert!(bytes.windows(3).any(|w| w == [0x1B, 0x64, 0x02]));
        assert!(!bytes.windows(2).any(|w| w == [0x1D, 0x56]));
    }

    #[test]
    fn test_58mm_printer_uses_narrow_width() {
        let job = receipt_job(serde_json::json!({"storeName": "S"}));
        let bytes = render_receipt(&job, &printer("XPrinter XP-58 Thermal"));
        let text = rendered_text(&bytes);
        // Separator rule matches the 32-column width.
        assert!(text.contains(&"-".repeat(32)));
        assert!(!text.contains(&"-".repeat(48)));
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let job = receipt_job(serde_json::json!({
            "storeName": "S",
            "items": [{"quantity": 1, "description": "X", "price": 1.0}]
        }));
        let text = rendered_text(&render_receipt(&job, &printer("EPSON TM-T88V")));
        // dd/mm/yyyy somewhere in the output
        let has_date = text
            .lines()
            .any(|l| l.len() >= 16 && l.chars().filter(|c| *c == '/').count() == 2);
        assert!(has_date);
    }

    #[test]
    fn test_fractional_quantity_kept() {
        assert_eq!(format_quantity(2.0), "2");
        assert_eq!(format_quantity(0.5), "0.5");
    }
}

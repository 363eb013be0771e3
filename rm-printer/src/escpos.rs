//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.
//!
//! Two dialects are supported. EPSON-compatible printers (the vast
//! majority: TM-series, Rongta, Xprinter, Bixolon...) use the GS V
//! cut family and ESC p for the cash drawer. STAR printers (TSP
//! series) run ESC/POS emulation for text and styling but keep their
//! own cut, drawer and code-page commands.

use crate::encoding::{encode_cp858, text_width};

/// Printer command dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Epson,
    Star,
}

impl Dialect {
    /// Select the dialect from an OS-level device name.
    ///
    /// STAR hardware ships with "Star" or the TSP model family in the
    /// queue name; everything else speaks the EPSON command set.
    pub fn for_device_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("star") || lower.contains("tsp") {
            Dialect::Star
        } else {
            Dialect::Epson
        }
    }
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. All text is
/// encoded as CP858 at append time.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    dialect: Dialect,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize, dialect: Dialect) -> Self {
        let mut buf = Vec::with_capacity(4096);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        match dialect {
            // ESC t 19 - select CP858
            Dialect::Epson => buf.extend_from_slice(&[0x1B, 0x74, 19]),
            // ESC GS t 4 - select CP858 (Star code page numbering)
            Dialect::Star => buf.extend_from_slice(&[0x1B, 0x1D, 0x74, 0x04]),
        }
        Self {
            buf,
            width,
            dialect,
        }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    // === Text Output ===

    /// Write text (CP858 encoded)
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(&encode_cp858(s));
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x01]);
        self
    }

    /// Double width only
    pub fn double_width(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x10]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    /// Double height + bold, the receipt header style
    pub fn double_height_bold(&mut self) -> &mut Self {
        self.double_height().bold()
    }

    /// Reset size and weight
    pub fn reset_style(&mut self) -> &mut Self {
        self.reset_size().bold_off()
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = text_width(left);
        let rw = text_width(right);

        if lw + rw >= self.width {
            // Too long, just print with space
            self.text(left);
            self.text(" ");
            self.line(right);
        } else {
            let spaces = self.width - lw - rw;
            self.text(left);
            self.text(&" ".repeat(spaces));
            self.line(right);
        }
        self
    }

    // === Paper Control ===

    /// Full cut
    pub fn cut(&mut self) -> &mut Self {
        match self.dialect {
            // GS V 0
            Dialect::Epson => self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]),
            // ESC d 2
            Dialect::Star => self.buf.extend_from_slice(&[0x1B, 0x64, 0x02]),
        }
        self
    }

    /// Full cut with feed — feeds n lines then cuts.
    ///
    /// On EPSON this uses GS V 66 n, which lets the printer manage
    /// cutter-to-head distance and wastes less top margin on the next
    /// ticket than separate feed() + cut() calls. STAR has no combined
    /// form, so it feeds then cuts.
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        match self.dialect {
            Dialect::Epson => self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]),
            Dialect::Star => {
                self.feed(lines);
                self.buf.extend_from_slice(&[0x1B, 0x64, 0x02]);
            }
        }
        self
    }

    /// Partial cut (leave a small connection)
    pub fn cut_partial(&mut self) -> &mut Self {
        match self.dialect {
            // GS V 1
            Dialect::Epson => self.buf.extend_from_slice(&[0x1D, 0x56, 0x01]),
            // ESC d 3
            Dialect::Star => self.buf.extend_from_slice(&[0x1B, 0x64, 0x03]),
        }
        self
    }

    // === Cash Drawer ===

    /// Open cash drawer (connector pin 2 on EPSON, drawer 1 on STAR)
    pub fn open_drawer(&mut self) -> &mut Self {
        match self.dialect {
            // ESC p m t1 t2 - pulse on pin m
            Dialect::Epson => self.buf.extend_from_slice(&[0x1B, 0x70, 0x00, 25, 250]),
            // BEL fires drawer 1
            Dialect::Star => self.buf.push(0x07),
        }
        self
    }

    // === QR Code ===

    /// Print a QR code (EPSON GS ( k sequence; STAR accepts it in
    /// ESC/POS emulation)
    ///
    /// Size: 1-16 (module size in dots)
    pub fn qr_code(&mut self, data: &str, size: u8) -> &mut Self {
        let size = size.clamp(1, 16);

        // Function 165: Select model (Model 2)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x31, 0x00]);

        // Function 167: Set module size
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);

        // Function 169: Set error correction (L)
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x31]);

        // Function 180: Store data
        let data_bytes = data.as_bytes();
        let len = data_bytes.len() + 3;
        let p_l = (len & 0xFF) as u8;
        let p_h = ((len >> 8) & 0xFF) as u8;
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
        self.buf.extend_from_slice(data_bytes);

        // Function 181: Print
        self.buf
            .extend_from_slice(&[0x1D, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);

        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Finalize and return the command stream
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_detection() {
        assert_eq!(Dialect::for_device_name("EPSON TM-T88V"), Dialect::Epson);
        assert_eq!(Dialect::for_device_name("Star TSP143"), Dialect::Star);
        assert_eq!(Dialect::for_device_name("tsp650ii"), Dialect::Star);
        assert_eq!(Dialect::for_device_name("Generic POS-80"), Dialect::Epson);
    }

    #[test]
    fn test_builder_basic() {
        let mut b = EscPosBuilder::new(32, Dialect::Epson);
        b.center()
            .double_size()
            .line("Chez Martin")
            .reset_size()
            .left()
            .line("Merci de votre visite !");

        let data = b.build();
        // Init sequence present
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("Chez Martin"));
    }

    #[test]
    fn test_line_lr() {
        let mut b = EscPosBuilder::new(20, Dialect::Epson);
        b.line_lr("1x Café", "2.50");

        let data = b.build();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("1x Caf"));
        assert!(s.contains("2.50"));
    }

    #[test]
    fn test_line_lr_width() {
        let mut b = EscPosBuilder::new(20, Dialect::Epson);
        b.line_lr("left", "right");
        let data = b.build();
        // Find the rendered line and check it spans exactly the width.
        let s = String::from_utf8_lossy(&data);
        let line = s.lines().find(|l| l.contains("left")).unwrap();
        assert_eq!(line.chars().count(), 20);
        assert!(line.ends_with("right"));
    }

    #[test]
    fn test_cut_dialects() {
        let mut epson = EscPosBuilder::new(48, Dialect::Epson);
        epson.cut();
        let data = epson.build();
        assert!(data.windows(3).any(|w| w == [0x1D, 0x56, 0x00]));

        let mut star = EscPosBuilder::new(48, Dialect::Star);
        star.cut();
        let data = star.build();
        assert!(data.windows(3).any(|w| w == [0x1B, 0x64, 0x02]));
        assert!(!data.windows(3).any(|w| w == [0x1D, 0x56, 0x00]));
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10, Dialect::Epson);
        b.sep_double();

        let data = b.build();
        let s = String::from_utf8_lossy(&data);
        assert!(s.contains("=========="));
    }

    #[test]
    fn test_euro_in_totals() {
        let mut b = EscPosBuilder::new(48, Dialect::Epson);
        b.line_lr("TOTAL", "9,99 €");
        let data = b.build();
        assert!(data.contains(&0xD5));
    }
}

//! # rm-printer
//!
//! ESC/POS thermal printer library - low-level command building only.
//!
//! ## Scope
//!
//! This crate handles HOW receipt bytes are produced:
//! - ESC/POS command building (EPSON and STAR dialects)
//! - CP858 encoding for Western European text (accents, €)
//! - Column width / padding helpers for fixed-width layouts
//!
//! Business logic (WHAT to print) stays in the agent:
//! - Receipt and ticket layouts → print-agent renderer
//! - Spooler submission → print-agent spool module
//!
//! ## Example
//!
//! ```
//! use rm_printer::{Dialect, EscPosBuilder};
//!
//! let mut b = EscPosBuilder::new(48, Dialect::Epson);
//! b.center();
//! b.double_height_bold();
//! b.line("Chez Martin");
//! b.reset_style();
//! b.sep_single();
//! b.left();
//! b.line_lr("1x Café", "2.50");
//! b.cut();
//! let bytes = b.build();
//! assert!(!bytes.is_empty());
//! ```

mod encoding;
mod escpos;

pub use encoding::{encode_cp858, pad_text, text_width, truncate_text};
pub use escpos::{Dialect, EscPosBuilder};

//! Printer classification
//!
//! Maps a raw OS printer record to a typed descriptor. Rules are
//! ordered and first-match-wins: thermal → label → laser → dotmatrix
//! → inkjet → generic, matched case-insensitively over
//! name ∪ display name ∪ driver.

use shared::{
    PrinterCapabilities, PrinterDescriptor, PrinterMetadata, PrinterType, Transport,
};

/// Raw printer record as the platform layer reports it.
#[derive(Debug, Clone, Default)]
pub struct RawPrinter {
    pub name: String,
    pub display_name: Option<String>,
    pub driver: Option<String>,
    pub port: Option<String>,
    /// CUPS device URI, when the platform exposes one.
    pub device_uri: Option<String>,
    pub is_default: bool,
    pub status: String,
    pub location: Option<String>,
    pub comment: Option<String>,
}

const THERMAL_KEYWORDS: &[&str] = &[
    "thermal", "receipt", "tm-", "tsp", "pos-58", "pos-80", "pos58", "pos80", "rongta",
    "xprinter", "gprinter", "srp-", "rp-",
];

const LABEL_KEYWORDS: &[&str] = &[
    "label", "zebra", "zpl", "dymo", "ql-", "zd4", "zd6", "gk4", "gx4", "tlp", "labelwriter",
];

const LASER_KEYWORDS: &[&str] = &["laser", "laserjet", "hl-l", "imageclass", "ecosys"];

const DOTMATRIX_KEYWORDS: &[&str] =
    &["dot matrix", "dotmatrix", "lx-", "fx-", "lq-", "impact", "oki ml"];

const INKJET_KEYWORDS: &[&str] = &[
    "inkjet", "deskjet", "officejet", "envy", "pixma", "ecotank", "workforce", "stylus",
];

/// Classify a raw record into an immutable descriptor.
pub fn classify(raw: &RawPrinter) -> PrinterDescriptor {
    let display_name = raw
        .display_name
        .clone()
        .unwrap_or_else(|| raw.name.clone());
    let haystack = format!(
        "{} {} {}",
        raw.name,
        display_name,
        raw.driver.as_deref().unwrap_or("")
    )
    .to_lowercase();

    let printer_type = detect_type(&haystack);
    let transport = detect_transport(raw, &haystack);
    let capabilities = capabilities_for(printer_type, &haystack);

    PrinterDescriptor {
        system_name: raw.name.clone(),
        display_name,
        printer_type,
        transport,
        capabilities,
        metadata: PrinterMetadata {
            is_default: raw.is_default,
            status: if raw.status.is_empty() {
                "unknown".into()
            } else {
                raw.status.clone()
            },
            port_name: raw.port.clone().unwrap_or_default(),
            location: raw.location.clone(),
            comment: raw.comment.clone(),
        },
    }
}

fn detect_type(haystack: &str) -> PrinterType {
    let rules: &[(&[&str], PrinterType)] = &[
        (THERMAL_KEYWORDS, PrinterType::Thermal),
        (LABEL_KEYWORDS, PrinterType::Label),
        (LASER_KEYWORDS, PrinterType::Laser),
        (DOTMATRIX_KEYWORDS, PrinterType::DotMatrix),
        (INKJET_KEYWORDS, PrinterType::Inkjet),
    ];

    for (keywords, printer_type) in rules {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return *printer_type;
        }
    }
    PrinterType::Generic
}

/// Interface detection, in order: port-name substring, device-uri
/// scheme, MAC-tail suffix on the name, wireless keywords, unknown.
fn detect_transport(raw: &RawPrinter, haystack: &str) -> Transport {
    let port = raw.port.as_deref().unwrap_or("").to_lowercase();
    if !port.is_empty() {
        if port.contains("usb") {
            return Transport::Usb;
        }
        if port.starts_with("ip_") || port.contains("tcp") || port.contains("wsd") {
            return Transport::Network;
        }
        if port.contains("bth") || port.contains("bluetooth") {
            return Transport::Bluetooth;
        }
        if port.starts_with("com") {
            return Transport::Serial;
        }
        if port.starts_with("lpt") {
            return Transport::Parallel;
        }
    }

    if let Some(uri) = raw.device_uri.as_deref() {
        if let Some(scheme) = uri.split("://").next() {
            match scheme {
                "usb" | "hp" => return Transport::Usb,
                "ipp" | "ipps" | "http" | "https" | "socket" | "lpd" | "dnssd" => {
                    return Transport::Network;
                }
                "bluetooth" => return Transport::Bluetooth,
                "serial" => return Transport::Serial,
                "parallel" => return Transport::Parallel,
                _ => {}
            }
        }
    }

    if name_has_mac_tail(&raw.name) {
        return Transport::Network;
    }

    if ["wifi", "wi-fi", "wireless", "airprint"]
        .iter()
        .any(|k| haystack.contains(k))
    {
        return Transport::Network;
    }

    Transport::Unknown
}

/// Network printers often advertise with the tail of their MAC in the
/// queue name, e.g. "Brother HL-L2370DW [3c2af4]" or
/// "EPSON WF-3820 (A1B2C3)".
fn name_has_mac_tail(name: &str) -> bool {
    let trimmed = name
        .trim_end()
        .trim_end_matches([')', ']', '}'])
        .trim_end();

    // Colon-separated form: at least two "xx:" groups at the end.
    let colon_tail: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_hexdigit() || *c == ':')
        .collect();
    if colon_tail.chars().filter(|c| *c == ':').count() >= 2 && colon_tail.len() >= 8 {
        return true;
    }

    // Plain form: a trailing run of exactly six hex digits, separated
    // from the model name.
    let hex_tail: Vec<char> = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    if hex_tail.len() != 6 {
        return false;
    }
    // Must not be part of a longer alphanumeric word ("TM-T88000" is
    // a model number, not a MAC).
    match trimmed.chars().rev().nth(6) {
        Some(c) => !c.is_ascii_alphanumeric(),
        None => false,
    }
}

fn capabilities_for(printer_type: PrinterType, haystack: &str) -> PrinterCapabilities {
    match printer_type {
        PrinterType::Thermal => PrinterCapabilities {
            color: false,
            duplex: false,
            paper_sizes: vec!["80mm".into(), "58mm".into()],
            max_width_mm: if haystack.contains("58") { 58 } else { 80 },
            has_cutter: true,
            has_cash_drawer: true,
        },
        PrinterType::Label => PrinterCapabilities {
            color: false,
            duplex: false,
            paper_sizes: vec!["Label".into(), "Continuous".into()],
            max_width_mm: 62,
            has_cutter: false,
            has_cash_drawer: false,
        },
        PrinterType::DotMatrix => PrinterCapabilities {
            color: false,
            duplex: false,
            paper_sizes: vec!["A4".into(), "Letter".into()],
            max_width_mm: 210,
            has_cutter: false,
            has_cash_drawer: false,
        },
        PrinterType::Laser | PrinterType::Inkjet | PrinterType::Generic => PrinterCapabilities {
            color: printer_type == PrinterType::Inkjet || haystack.contains("color"),
            duplex: haystack.contains("duplex") || haystack.contains("dn"),
            paper_sizes: vec!["A4".into(), "Letter".into()],
            max_width_mm: 210,
            has_cutter: false,
            has_cash_drawer: false,
        },
    }
}

//! CP858 encoding utilities for thermal printers
//!
//! Receipt hardware in this fleet prints Western European text:
//! ASCII plus accented Latin plus the euro sign. CP858 covers all of
//! it in a single code page, so there is no run-time page switching;
//! the builder selects CP858 once at init and every character maps to
//! one byte here. Unmappable characters degrade to '?'.

/// Display width of a string in printer columns.
///
/// CP858 is single-width throughout, so this is the character count.
/// Kept as a named function so layout code reads in terms of columns,
/// not chars.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column width.
pub fn truncate_text(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to an exact column width, truncating when too long.
pub fn pad_text(s: &str, width: usize, align_right: bool) -> String {
    let current = text_width(s);
    if current >= width {
        return truncate_text(s, width);
    }
    let spaces = width - current;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Encode UTF-8 text as CP858 bytes.
///
/// ASCII passes through unchanged; Latin extended characters use the
/// table below; anything else becomes '?'.
pub fn encode_cp858(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| {
            if c.is_ascii() {
                c as u8
            } else {
                unicode_to_cp858(c).unwrap_or(b'?')
            }
        })
        .collect()
}

/// Map a Unicode character to its CP858 byte value.
///
/// Returns None for characters outside the code page.
fn unicode_to_cp858(ch: char) -> Option<u8> {
    match ch {
        // Currency / symbols
        '€' => Some(0xD5),
        '£' => Some(0x9C),
        '¥' => Some(0xBE),
        '¢' => Some(0xBD),

        // Spanish essentials
        'ñ' => Some(0xA4),
        'Ñ' => Some(0xA5),
        '¿' => Some(0xA8),
        '¡' => Some(0xAD),

        // Vowels with acute accent
        'á' => Some(0xA0),
        'é' => Some(0x82),
        'í' => Some(0xA1),
        'ó' => Some(0xA2),
        'ú' => Some(0xA3),
        'Á' => Some(0xB5),
        'É' => Some(0x90),
        'Í' => Some(0xD6),
        'Ó' => Some(0xE0),
        'Ú' => Some(0xE9),

        // Vowels with grave accent
        'à' => Some(0x85),
        'è' => Some(0x8A),
        'ì' => Some(0x8D),
        'ò' => Some(0x95),
        'ù' => Some(0x97),
        'À' => Some(0xB7),
        'È' => Some(0xD4),
        'Ì' => Some(0xDE),
        'Ò' => Some(0xE3),
        'Ù' => Some(0xEB),

        // Vowels with circumflex
        'â' => Some(0x83),
        'ê' => Some(0x88),
        'î' => Some(0x8C),
        'ô' => Some(0x93),
        'û' => Some(0x96),
        'Â' => Some(0xB6),
        'Ê' => Some(0xD2),
        'Î' => Some(0xD7),
        'Ô' => Some(0xE2),
        'Û' => Some(0xEA),

        // Diaeresis / umlaut
        'ä' => Some(0x84),
        'ë' => Some(0x89),
        'ï' => Some(0x8B),
        'ö' => Some(0x94),
        'ü' => Some(0x81),
        'ÿ' => Some(0x98),
        'Ä' => Some(0x8E),
        'Ë' => Some(0xD3),
        'Ï' => Some(0xD8),
        'Ö' => Some(0x99),
        'Ü' => Some(0x9A),

        // Other Latin
        'ç' => Some(0x87),
        'Ç' => Some(0x80),
        'ß' => Some(0xE1),
        'ã' => Some(0xC6),
        'õ' => Some(0xE4),
        'Ã' => Some(0xC7),
        'Õ' => Some(0xE5),
        'æ' => Some(0x91),
        'Æ' => Some(0x92),
        'ø' => Some(0x9B),
        'Ø' => Some(0x9D),
        'å' => Some(0x86),
        'Å' => Some(0x8F),

        // Common symbols
        '°' => Some(0xF8),
        '±' => Some(0xF1),
        '§' => Some(0xF5),
        '«' => Some(0xAE),
        '»' => Some(0xAF),
        '©' => Some(0xB8),
        '®' => Some(0xA9),
        'µ' => Some(0xE6),
        '·' => Some(0xFA),
        '½' => Some(0xAB),
        '¼' => Some(0xAC),
        '¾' => Some(0xF3),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("café"), 4);
        assert_eq!(text_width("8,40 €"), 6);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello world", 5), "hello");
        assert_eq!(truncate_text("éléphant", 3), "élé");
    }

    #[test]
    fn test_pad_text() {
        assert_eq!(pad_text("hi", 5, false), "hi   ");
        assert_eq!(pad_text("hi", 5, true), "   hi");
        assert_eq!(pad_text("hello world", 5, false), "hello");
    }

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(encode_cp858("TOTAL: 9.99"), b"TOTAL: 9.99".to_vec());
    }

    #[test]
    fn test_euro_encoded() {
        let bytes = encode_cp858("9,99 €");
        assert_eq!(*bytes.last().unwrap(), 0xD5);
    }

    #[test]
    fn test_french_accents() {
        // "Merci de votre visite !" is pure ASCII, but addresses are not.
        let bytes = encode_cp858("Crèmerie Générale");
        assert!(bytes.contains(&0x8A)); // è
        assert!(bytes.contains(&0x82)); // é
        assert!(!bytes.contains(&b'?'));
    }

    #[test]
    fn test_unmappable_becomes_question_mark() {
        assert_eq!(encode_cp858("中"), vec![b'?']);
    }
}

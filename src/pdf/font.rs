//! Standard PDF fonts and their advance widths.
//!
//! The 12 Latin base fonts need no embedding. Widths come from the Adobe
//! core AFM files for the printable ASCII range; other WinAnsi bytes use a
//! per-family default.

/// One of the 12 standard Latin Type1 fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// Map a family name and style letters (`B`, `I`, `U`) to a font.
    /// Arial is Helvetica; unknown families fall back to Helvetica.
    pub fn resolve(family: &str, style: &str) -> Self {
        let style = style.to_ascii_uppercase();
        let bold = style.contains('B');
        let italic = style.contains('I');
        let family = family.trim().to_ascii_lowercase();

        match (family.as_str(), bold, italic) {
            ("times" | "times-roman" | "times new roman", false, false) => Self::TimesRoman,
            ("times" | "times-roman" | "times new roman", true, false) => Self::TimesBold,
            ("times" | "times-roman" | "times new roman", false, true) => Self::TimesItalic,
            ("times" | "times-roman" | "times new roman", true, true) => Self::TimesBoldItalic,
            ("courier" | "courier new", false, false) => Self::Courier,
            ("courier" | "courier new", true, false) => Self::CourierBold,
            ("courier" | "courier new", false, true) => Self::CourierOblique,
            ("courier" | "courier new", true, true) => Self::CourierBoldOblique,
            (_, false, false) => Self::Helvetica,
            (_, true, false) => Self::HelveticaBold,
            (_, false, true) => Self::HelveticaOblique,
            (_, true, true) => Self::HelveticaBoldOblique,
        }
    }

    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    /// Advance width of a WinAnsi byte in 1/1000 em.
    pub fn byte_width(&self, byte: u8) -> u16 {
        let table = match self {
            Self::Courier | Self::CourierBold | Self::CourierOblique | Self::CourierBoldOblique => {
                return 600;
            }
            Self::Helvetica | Self::HelveticaOblique => &HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => &HELVETICA_BOLD,
            // Bold and italic Times cuts are close enough to the roman.
            Self::TimesRoman | Self::TimesBold | Self::TimesItalic | Self::TimesBoldItalic => {
                &TIMES_ROMAN
            }
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            0xA0 => table[0],
            _ => match self {
                Self::TimesRoman | Self::TimesBold | Self::TimesItalic | Self::TimesBoldItalic => {
                    500
                }
                _ => 556,
            },
        }
    }

    /// Width of WinAnsi-encoded text in points.
    pub fn measure(&self, bytes: &[u8], font_size: f64) -> f64 {
        let units: u32 = bytes.iter().map(|&b| u32::from(self.byte_width(b))).sum();
        f64::from(units) * font_size / 1000.0
    }
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_families_and_styles() {
        assert_eq!(StandardFont::resolve("Arial", ""), StandardFont::Helvetica);
        assert_eq!(StandardFont::resolve("arial", "B"), StandardFont::HelveticaBold);
        assert_eq!(StandardFont::resolve("Times", "BI"), StandardFont::TimesBoldItalic);
        assert_eq!(StandardFont::resolve("Courier", "i"), StandardFont::CourierOblique);
        assert_eq!(StandardFont::resolve("Comic Sans", "U"), StandardFont::Helvetica);
    }

    #[test]
    fn known_widths() {
        assert_eq!(StandardFont::Helvetica.byte_width(b' '), 278);
        assert_eq!(StandardFont::Helvetica.byte_width(b'W'), 944);
        assert_eq!(StandardFont::HelveticaBold.byte_width(b'a'), 556);
        assert_eq!(StandardFont::HelveticaBold.byte_width(b'b'), 611);
        assert_eq!(StandardFont::TimesRoman.byte_width(b'~'), 541);
        assert_eq!(StandardFont::CourierBold.byte_width(b'i'), 600);
    }

    #[test]
    fn measure_scales_with_size() {
        // "Hi" = 722 + 222
        assert!((StandardFont::Helvetica.measure(b"Hi", 10.0) - 9.44).abs() < 1e-9);
        assert!((StandardFont::Courier.measure(b"abc", 12.0) - 21.6).abs() < 1e-9);
    }
}

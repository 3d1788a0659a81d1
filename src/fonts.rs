use std::collections::BTreeSet;

use crate::error::{PdfError, Result};
use crate::sfnt::SfntFont;

/// The four stock Type1 font variants recognized by name prefix. None of
/// these are embedded; Helvetica is always font id 0 and needs no parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
    HelveticaItalic,
    HelveticaBoldItalic,
}

impl BuiltinFont {
    /// Matches a caller-chosen font name against the four recognized
    /// stock-font prefixes, longest/most-specific match first.
    pub fn from_name(name: &str) -> Option<BuiltinFont> {
        match name {
            "Helvetica-BoldItalic" | "Helvetica-BoldOblique" => Some(BuiltinFont::HelveticaBoldItalic),
            "Helvetica-Bold" => Some(BuiltinFont::HelveticaBold),
            "Helvetica-Italic" | "Helvetica-Oblique" => Some(BuiltinFont::HelveticaItalic),
            "Helvetica" => Some(BuiltinFont::Helvetica),
            _ => None,
        }
    }

    pub fn pdf_base_name(&self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
            BuiltinFont::HelveticaItalic => "Helvetica-Oblique",
            BuiltinFont::HelveticaBoldItalic => "Helvetica-BoldOblique",
        }
    }

    /// PDF resource name used in content streams (e.g. `F1`).
    pub fn pdf_name(&self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "F1",
            BuiltinFont::HelveticaBold => "F2",
            BuiltinFont::HelveticaItalic => "F3",
            BuiltinFont::HelveticaBoldItalic => "F4",
        }
    }

    fn widths(&self) -> &'static [u16; 95] {
        match self {
            BuiltinFont::Helvetica | BuiltinFont::HelveticaItalic => &HELVETICA_WIDTHS,
            BuiltinFont::HelveticaBold | BuiltinFont::HelveticaBoldItalic => &HELVETICA_BOLD_WIDTHS,
        }
    }
}

/// Character widths for Helvetica (ASCII 32..=126) in units of 1/1000 em.
/// Source: Adobe Helvetica AFM data. Helvetica-Oblique shares these widths.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722,
    667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944,
    667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222,
    500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334,
    584,
];

/// Character widths for Helvetica-Bold (ASCII 32..=126) in 1/1000 em.
/// Source: Adobe Helvetica-Bold AFM data. Helvetica-BoldOblique shares these.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722, 722, 667,
    611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556,
    278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Default width for characters outside the mapped range (1/1000 em).
const DEFAULT_WIDTH: u16 = 278;

pub struct FontMetrics;

impl FontMetrics {
    pub fn char_width(font: BuiltinFont, ch: char) -> u16 {
        let code = ch as u32;
        if !(32..=126).contains(&code) {
            return DEFAULT_WIDTH;
        }
        font.widths()[(code - 32) as usize]
    }

    pub fn measure_text(text: &str, font: BuiltinFont, font_size: f64) -> f64 {
        let total: u32 = text.chars().map(|ch| Self::char_width(font, ch) as u32).sum();
        total as f64 * font_size / 1000.0
    }

    pub fn line_height(_font: BuiltinFont, font_size: f64) -> f64 {
        font_size * 1.2
    }
}

/// Either a stock Type1 font or a caller-registered TrueType font, keyed by
/// its small integer id (see `FontRegistration`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FontRef {
    Builtin(BuiltinFont),
    Registered(u32),
}

/// The embedding lifecycle of a registered TrueType font. Only `Embedded`
/// fonts may be cited in a page's resource dictionary; only `Registered`
/// fonts may be made current for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontState {
    Registered,
    Used,
    Embedded,
    Referenced,
}

/// A non-stock font the caller has asked to embed. Lazily parses and
/// caches the sfnt the first time any accessor needs metrics; the parsed
/// font and the accumulated used-character set both feed `finalize`.
pub struct FontRegistration {
    pub id: u32,
    pub name: String,
    source: Vec<u8>,
    parsed: Option<SfntFont>,
    pub used_chars: BTreeSet<u32>,
    pub state: FontState,
    /// Object number of the Type0 font dictionary, set once embedded.
    pub type0_obj_num: Option<u32>,
}

impl FontRegistration {
    pub fn new(id: u32, name: String, source: Vec<u8>) -> FontRegistration {
        FontRegistration {
            id,
            name,
            source,
            parsed: None,
            used_chars: BTreeSet::new(),
            state: FontState::Registered,
            type0_obj_num: None,
        }
    }

    /// Records a code point as drawn with this font, advancing
    /// `Registered` to `Used` on first use.
    pub fn record_char(&mut self, ch: char) {
        self.used_chars.insert(ch as u32);
        if self.state == FontState::Registered {
            self.state = FontState::Used;
        }
    }

    /// Parses the source font on first access and caches the result;
    /// later calls are O(1).
    pub fn font(&mut self) -> Result<&SfntFont> {
        if self.parsed.is_none() {
            let bytes = std::mem::take(&mut self.source);
            self.parsed = Some(SfntFont::parse(bytes)?);
        }
        Ok(self.parsed.as_ref().unwrap())
    }

    pub fn mark_embedded(&mut self, type0_obj_num: u32) {
        self.state = FontState::Embedded;
        self.type0_obj_num = Some(type0_obj_num);
    }

    pub fn mark_referenced(&mut self) -> Result<()> {
        if self.state != FontState::Embedded && self.state != FontState::Referenced {
            return Err(PdfError::UnsupportedFont(format!(
                "font {} referenced before being embedded",
                self.name
            )));
        }
        self.state = FontState::Referenced;
        Ok(())
    }
}

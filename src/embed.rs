use std::collections::BTreeSet;

use crate::error::Result;
use crate::glyph_closure::build_subset_plan;
use crate::glyph_closure::SubsetPlan;
use crate::objects::{ObjId, PdfObject};
use crate::sfnt::SfntFont;
use crate::subset::build_subset_font;

/// Font ids are bounded well below the 676-value capacity of the two-letter
/// code embedded in the six-letter subset prefix, to keep headroom.
pub const MAX_FONT_ID: u32 = 624;

/// The seven indirect objects that make up one embedded composite font, plus
/// the resource name used to cite it in a page's `/Font` dictionary.
pub struct EmbeddedFont {
    pub type0_obj: ObjId,
    pub resource_name: String,
    pub objects: Vec<(ObjId, PdfObject)>,
}

/// Encodes `id` (0..=675) as a six-letter subset prefix in the
/// `AAAAAA+BaseFont` form PDF readers expect, per Adobe's convention.
fn subset_prefix(id: u32) -> String {
    let hi = (id / 26) as u8;
    let lo = (id % 26) as u8;
    format!("AAAA{}{}", (b'A' + hi) as char, (b'A' + lo) as char)
}

/// Runs the glyph closure and subset builder for one registered font, then
/// assembles its Type0/CIDFontType2/ToUnicode/CIDSystemInfo/FontDescriptor/
/// CIDToGIDMap/FontFile2 object graph at consecutive object numbers starting
/// at `*next_obj_num`, advancing the counter past them.
pub fn embed_font(
    next_obj_num: &mut u32,
    id: u32,
    name: &str,
    font: &SfntFont,
    used_chars: &BTreeSet<u32>,
) -> Result<EmbeddedFont> {
    log::debug!("embedding font '{name}' (id {id}) with {} used code points", used_chars.len());
    let plan = build_subset_plan(font, used_chars)?;
    log::trace!("glyph closure for '{name}': {} glyphs", plan.len());

    let subset_bytes = build_subset_font(font, &plan)?;
    log::trace!("subset font '{name}': {} bytes", subset_bytes.len());

    let base = *next_obj_num;
    let type0_id = ObjId(base, 0);
    let cidfont_id = ObjId(base + 1, 0);
    let tounicode_id = ObjId(base + 2, 0);
    let cidsysteminfo_id = ObjId(base + 3, 0);
    let descriptor_id = ObjId(base + 4, 0);
    let cidtogid_id = ObjId(base + 5, 0);
    let fontfile2_id = ObjId(base + 6, 0);
    *next_obj_num += 7;

    let base_font_name = format!("{}+{}", subset_prefix(id), name);
    let d = &font.descriptor;

    let type0 = PdfObject::dict(vec![
        ("Type", PdfObject::name("Font")),
        ("Subtype", PdfObject::name("Type0")),
        ("BaseFont", PdfObject::name(&base_font_name)),
        ("Encoding", PdfObject::name("Identity-H")),
        ("DescendantFonts", PdfObject::array(vec![PdfObject::Reference(cidfont_id)])),
        ("ToUnicode", PdfObject::Reference(tounicode_id)),
    ]);

    let mut cidfont_entries = vec![
        ("Type", PdfObject::name("Font")),
        ("Subtype", PdfObject::name("CIDFontType2")),
        ("BaseFont", PdfObject::name(&base_font_name)),
        ("CIDSystemInfo", PdfObject::Reference(cidsysteminfo_id)),
        ("FontDescriptor", PdfObject::Reference(descriptor_id)),
        ("DW", PdfObject::Integer(d.missing_width as i64)),
    ];
    if let Some(w) = build_width_array(font, &plan) {
        cidfont_entries.push(("W", w));
    }
    cidfont_entries.push(("CIDToGIDMap", PdfObject::Reference(cidtogid_id)));
    let cidfont = PdfObject::dict(cidfont_entries);

    let tounicode = PdfObject::stream(vec![], build_to_unicode_cmap());

    let cidsysteminfo = PdfObject::dict(vec![
        ("Registry", PdfObject::literal_string("Adobe")),
        ("Ordering", PdfObject::literal_string("UCS")),
        ("Supplement", PdfObject::Integer(0)),
    ]);

    let descriptor = PdfObject::dict(vec![
        ("Type", PdfObject::name("FontDescriptor")),
        ("FontName", PdfObject::name(&base_font_name)),
        ("Flags", PdfObject::Integer(d.flags as i64)),
        (
            "FontBBox",
            PdfObject::array(d.bbox.iter().map(|&v| PdfObject::Integer(v as i64)).collect()),
        ),
        ("ItalicAngle", PdfObject::Real(d.italic_angle)),
        ("Ascent", PdfObject::Integer(d.ascent as i64)),
        ("Descent", PdfObject::Integer(d.descent as i64)),
        ("CapHeight", PdfObject::Integer(d.cap_height as i64)),
        ("StemV", PdfObject::Integer(d.stem_v as i64)),
        ("MissingWidth", PdfObject::Integer(d.missing_width as i64)),
        ("FontFile2", PdfObject::Reference(fontfile2_id)),
    ]);

    let cidtogid = PdfObject::stream(vec![], build_cid_to_gid_map(&plan));
    let fontfile2 = PdfObject::stream(
        vec![("Length1", PdfObject::Integer(subset_bytes.len() as i64))],
        subset_bytes,
    );

    Ok(EmbeddedFont {
        type0_obj: type0_id,
        resource_name: format!("R{id}"),
        objects: vec![
            (type0_id, type0),
            (cidfont_id, cidfont),
            (tounicode_id, tounicode),
            (cidsysteminfo_id, cidsysteminfo),
            (descriptor_id, descriptor),
            (cidtogid_id, cidtogid),
            (fontfile2_id, fontfile2),
        ],
    })
}

/// Builds `/W [ 1 [ w1 w2 ... w_maxChar ] ]`: one width per code point from
/// 1 through the highest requested code point, using the new GID's advance
/// width (falling back to `.notdef`'s for code points outside the subset).
/// Returns `None` when nothing was requested (no text drawn with the font).
fn build_width_array(font: &SfntFont, plan: &SubsetPlan) -> Option<PdfObject> {
    let &max_char = plan.char_to_new_gid.keys().max()?;
    let mut widths = Vec::with_capacity(max_char as usize);
    for c in 1..=max_char {
        let new_gid = plan.char_to_new_gid.get(&c).copied().unwrap_or(0);
        let old_gid = plan.old_gids[new_gid as usize];
        let width = glyph_width_pdf(font, old_gid).unwrap_or(0);
        widths.push(PdfObject::Integer(width as i64));
    }
    Some(PdfObject::array(vec![PdfObject::Integer(1), PdfObject::array(widths)]))
}

/// Advance width scaled to the 1000-unit em, with the spec's verbatim
/// `>= 65535 -> 0` collapse applied before any truncating cast.
fn glyph_width_pdf(font: &SfntFont, gid: u16) -> Result<u32> {
    let (advance, _) = font.hmtx_entry(gid)?;
    let scaled = (advance as f64 * 1000.0 / font.units_per_em as f64).round() as i64;
    Ok(if scaled >= 65535 { 0 } else { scaled as u32 })
}

/// A 131072-byte big-endian u16 table indexed by Unicode code point
/// (0..0xFFFF); code point c holds the subset's new GID for c, or 0.
fn build_cid_to_gid_map(plan: &SubsetPlan) -> Vec<u8> {
    let mut map = vec![0u8; 131072];
    for (&c, &gid) in &plan.char_to_new_gid {
        if c <= 0xFFFF {
            let idx = c as usize * 2;
            map[idx..idx + 2].copy_from_slice(&gid.to_be_bytes());
        }
    }
    map
}

/// A minimal ToUnicode CMap treating CID and Unicode code point as
/// identical (true here since CIDToGIDMap is keyed directly by code point).
fn build_to_unicode_cmap() -> Vec<u8> {
    concat!(
        "/CIDInit /ProcSet findresource begin\n",
        "12 dict begin\n",
        "begincmap\n",
        "/CIDSystemInfo\n",
        "<< /Registry (Adobe)\n",
        "/Ordering (UCS)\n",
        "/Supplement 0\n",
        ">> def\n",
        "/CMapName /Adobe-Identity-UCS def\n",
        "/CMapType 2 def\n",
        "1 begincodespacerange\n",
        "<0000> <FFFF>\n",
        "endcodespacerange\n",
        "1 beginbfrange\n",
        "<0000> <FFFF> <0000>\n",
        "endbfrange\n",
        "endcmap\n",
        "CMapName currentdict /CMap defineresource pop\n",
        "end\n",
        "end\n",
    )
    .as_bytes()
    .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_prefix_is_six_letters() {
        assert_eq!(subset_prefix(0), "AAAAAA");
        assert_eq!(subset_prefix(1), "AAAAAB");
        assert_eq!(subset_prefix(26), "AAAABA");
        assert_eq!(subset_prefix(MAX_FONT_ID).len(), 6);
    }

    #[test]
    fn cid_to_gid_map_is_fixed_size() {
        let plan = SubsetPlan {
            old_gids: vec![0],
            gid_map: std::collections::HashMap::new(),
            char_to_new_gid: std::collections::BTreeMap::new(),
        };
        assert_eq!(build_cid_to_gid_map(&plan).len(), 131072);
    }

    #[test]
    fn to_unicode_cmap_declares_identity_bfrange() {
        let cmap = String::from_utf8(build_to_unicode_cmap()).unwrap();
        assert!(cmap.contains("<0000> <FFFF> <0000>"));
    }
}

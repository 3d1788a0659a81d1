use std::collections::BTreeSet;

use ttfpdf::bytereader::sfnt_checksum;
use ttfpdf::embed::embed_font;
use ttfpdf::glyph_closure::build_subset_plan;
use ttfpdf::objects::PdfObject;
use ttfpdf::sfnt::SfntFont;
use ttfpdf::subset::build_subset_font;

const MORE_COMPONENTS: u16 = 0x0020;

fn assemble_minimal_sfnt(mut tables: Vec<(&'static str, Vec<u8>)>) -> Vec<u8> {
    tables.sort_by(|a, b| a.0.cmp(b.0));
    let num_tables = tables.len() as u16;
    let header_len = 12 + 16 * tables.len();

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    let mut offset = header_len;
    let mut directory = Vec::new();
    for (tag, data) in &tables {
        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(&sfnt_checksum(data).to_be_bytes());
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += data.len();
    }
    out.extend_from_slice(&directory);
    for (_, data) in &tables {
        out.extend_from_slice(data);
    }
    out
}

fn build_head(index_to_loc_format: i16) -> Vec<u8> {
    let mut t = vec![0u8; 54];
    t[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    t[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    t[18..20].copy_from_slice(&1000u16.to_be_bytes());
    t[50..52].copy_from_slice(&index_to_loc_format.to_be_bytes());
    t
}

fn build_hhea(num_of_hmetrics: u16) -> Vec<u8> {
    let mut t = vec![0u8; 36];
    t[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    t[4..6].copy_from_slice(&800i16.to_be_bytes());
    t[6..8].copy_from_slice(&(-200i16).to_be_bytes());
    t[34..36].copy_from_slice(&num_of_hmetrics.to_be_bytes());
    t
}

fn build_maxp(num_glyphs: u16) -> Vec<u8> {
    let mut t = vec![0u8; 6];
    t[0..4].copy_from_slice(&0x0000_5000u32.to_be_bytes());
    t[4..6].copy_from_slice(&num_glyphs.to_be_bytes());
    t
}

fn build_post() -> Vec<u8> {
    let mut t = vec![0u8; 16];
    t[0..4].copy_from_slice(&0x0003_0000u32.to_be_bytes());
    t
}

fn build_loca_short(byte_offsets: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    for &o in byte_offsets {
        out.extend_from_slice(&((o / 2) as u16).to_be_bytes());
    }
    out
}

fn build_hmtx(entries: &[(u16, i16)]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(advance, lsb) in entries {
        out.extend_from_slice(&advance.to_be_bytes());
        out.extend_from_slice(&lsb.to_be_bytes());
    }
    out
}

/// One format-4 subtable with the given (startChar, endChar, idDelta) runs,
/// wrapped in a one-subtable cmap table (platform 3, encoding 1).
fn build_cmap_format4(segments: &[(u16, u16, i32)]) -> Vec<u8> {
    let seg_count = segments.len() as u16 + 1;
    let mut sub = Vec::new();
    sub.extend_from_slice(&4u16.to_be_bytes()); // format
    sub.extend_from_slice(&0u16.to_be_bytes()); // length (unused by the parser)
    sub.extend_from_slice(&0u16.to_be_bytes()); // language
    sub.extend_from_slice(&(seg_count * 2).to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes());
    for &(_, end, _) in segments {
        sub.extend_from_slice(&end.to_be_bytes());
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    sub.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for &(start, _, _) in segments {
        sub.extend_from_slice(&start.to_be_bytes());
    }
    sub.extend_from_slice(&0xFFFFu16.to_be_bytes());
    for &(_, _, delta) in segments {
        sub.extend_from_slice(&(delta as i16).to_be_bytes());
    }
    sub.extend_from_slice(&1i16.to_be_bytes()); // sentinel idDelta
    for _ in 0..seg_count {
        sub.extend_from_slice(&0u16.to_be_bytes()); // idRangeOffset, always 0
    }

    let mut table = Vec::new();
    table.extend_from_slice(&0u16.to_be_bytes()); // version
    table.extend_from_slice(&1u16.to_be_bytes()); // numTables
    table.extend_from_slice(&3u16.to_be_bytes()); // platformID
    table.extend_from_slice(&1u16.to_be_bytes()); // encodingID
    table.extend_from_slice(&12u32.to_be_bytes()); // offset to the subtable
    table.extend_from_slice(&sub);
    table
}

fn simple_glyph() -> Vec<u8> {
    let mut g = vec![0u8; 10];
    g[0..2].copy_from_slice(&1i16.to_be_bytes());
    g
}

/// A two-glyph font (`.notdef`, `A`) with a cmap mapping U+0041 to GID 1.
fn build_two_glyph_font() -> Vec<u8> {
    let glyf = simple_glyph(); // glyph 0 ('.notdef') has zero length
    let loca = build_loca_short(&[0, 0, 10]);
    let hmtx = build_hmtx(&[(0, 0), (500, 50)]);
    let cmap = build_cmap_format4(&[(0x41, 0x41, 1 - 0x41)]);

    assemble_minimal_sfnt(vec![
        ("cmap", cmap),
        ("glyf", glyf),
        ("head", build_head(0)),
        ("hhea", build_hhea(2)),
        ("hmtx", hmtx),
        ("loca", loca),
        ("maxp", build_maxp(2)),
        ("post", build_post()),
    ])
}

/// A four-glyph font: `.notdef`, `e` (GID 1), a combining acute (GID 2), and
/// `é` (GID 3) as a compound glyph referencing both. Only `é`'s code point is
/// reachable through the cmap; `e` and the accent are reachable solely as
/// compound-glyph dependencies.
fn build_compound_glyph_font() -> Vec<u8> {
    let e = simple_glyph();
    let accent = simple_glyph();
    let mut e_acute = vec![0u8; 10];
    e_acute[0..2].copy_from_slice(&(-1i16).to_be_bytes());
    for (i, &component_gid) in [1u16, 2u16].iter().enumerate() {
        let more = if i == 0 { MORE_COMPONENTS } else { 0 };
        e_acute.extend_from_slice(&more.to_be_bytes());
        e_acute.extend_from_slice(&component_gid.to_be_bytes());
        e_acute.extend_from_slice(&0u16.to_be_bytes()); // 2-byte args, no WORDS flag
    }

    let mut glyf = Vec::new();
    glyf.extend_from_slice(&e); // offset 0, len 10
    glyf.extend_from_slice(&accent); // offset 10, len 10
    glyf.extend_from_slice(&e_acute); // offset 20, len 22

    let loca = build_loca_short(&[0, 0, 10, 20, 42]);
    let hmtx = build_hmtx(&[(0, 0), (500, 50), (200, 0), (550, 40)]);
    let cmap = build_cmap_format4(&[(0x00E9, 0x00E9, 3 - 0x00E9)]);

    assemble_minimal_sfnt(vec![
        ("cmap", cmap),
        ("glyf", glyf),
        ("head", build_head(0)),
        ("hhea", build_hhea(4)),
        ("hmtx", hmtx),
        ("loca", loca),
        ("maxp", build_maxp(4)),
        ("post", build_post()),
    ])
}

#[test]
fn single_char_subset_cmap_agrees_with_cid_to_gid_map() {
    let font = SfntFont::parse(build_two_glyph_font()).unwrap();
    let mut used = BTreeSet::new();
    used.insert(0x41u32);

    let mut next_obj_num = 3u32;
    let embedded = embed_font(&mut next_obj_num, 0, "Test", &font, &used).unwrap();

    let fontfile2 = &embedded.objects[6].1;
    let subset_bytes = match fontfile2 {
        PdfObject::Stream { data, .. } => data.clone(),
        other => panic!("expected FontFile2 stream, got {other:?}"),
    };
    let cidtogid = &embedded.objects[5].1;
    let cidtogid_bytes = match cidtogid {
        PdfObject::Stream { data, .. } => data.clone(),
        other => panic!("expected CIDToGIDMap stream, got {other:?}"),
    };
    assert_eq!(cidtogid_bytes.len(), 131072);
    let cid_to_gid_entry = u16::from_be_bytes([cidtogid_bytes[0x41 * 2], cidtogid_bytes[0x41 * 2 + 1]]);

    let subset_font = SfntFont::parse(subset_bytes).unwrap();
    let decoded_gid = *subset_font.char_to_gid.get(&0x41).expect("subset cmap should still map U+0041");

    assert_eq!(decoded_gid, cid_to_gid_entry, "subset cmap and CIDToGIDMap disagree on the same CID");
    assert_eq!(decoded_gid, 1);
}

#[test]
fn empty_subset_still_produces_a_valid_subset_font() {
    let font = SfntFont::parse(build_two_glyph_font()).unwrap();
    let plan = build_subset_plan(&font, &BTreeSet::new()).unwrap();
    assert_eq!(plan.len(), 1, "only .notdef survives an empty request");

    let subset_bytes = build_subset_font(&font, &plan).unwrap();
    let subset_font = SfntFont::parse(subset_bytes).unwrap();
    assert_eq!(subset_font.num_glyphs, 1);
}

#[test]
fn compound_glyph_subset_renumbers_component_references() {
    let font = SfntFont::parse(build_compound_glyph_font()).unwrap();
    let mut requested = BTreeSet::new();
    requested.insert(0x00E9u32);

    let plan = build_subset_plan(&font, &requested).unwrap();
    assert_eq!(plan.len(), 4, "notdef + e-acute + its two components");
    assert_eq!(plan.char_to_new_gid.get(&0x00E9), Some(&1));

    let subset_bytes = build_subset_font(&font, &plan).unwrap();
    let subset_font = SfntFont::parse(subset_bytes).unwrap();

    let e_acute = subset_font.glyph_bytes(1).unwrap();
    let number_of_contours = i16::from_be_bytes([e_acute[0], e_acute[1]]);
    assert!(number_of_contours < 0, "e-acute must still be a compound glyph");

    let component0_gid = u16::from_be_bytes([e_acute[12], e_acute[13]]);
    let component1_gid = u16::from_be_bytes([e_acute[18], e_acute[19]]);
    assert_eq!(component0_gid, 2, "base 'e' renumbered into the subset");
    assert_eq!(component1_gid, 3, "combining accent renumbered into the subset");
}

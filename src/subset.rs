use crate::bytereader::sfnt_checksum;
use crate::error::{PdfError, Result};
use crate::glyph_closure::SubsetPlan;
use crate::sfnt::SfntFont;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

const PASSTHROUGH_TABLES: &[&str] = &["name", "cvt ", "fpgm", "prep", "gasp"];

/// Rewrites `font` into a minimal, self-consistent sfnt containing only the
/// glyphs named by `plan`. Returns the complete byte stream, ready to be
/// embedded as a PDF `FontFile2` stream.
pub fn build_subset_font(font: &SfntFont, plan: &SubsetPlan) -> Result<Vec<u8>> {
    let (glyf, loca_offsets) = build_glyf(font, plan)?;
    let loca = build_loca(&loca_offsets, font.index_to_loc_format);
    let hmtx = build_hmtx(font, plan)?;
    let cmap = build_cmap(plan);
    let head = patch_head(font)?;
    let hhea = patch_hhea(font, plan.len() as u16)?;
    let maxp = patch_maxp(font, plan.len() as u16)?;
    let post = build_minimal_post();

    let mut tables: Vec<(String, Vec<u8>)> = vec![
        ("cmap".to_string(), cmap),
        ("glyf".to_string(), glyf),
        ("head".to_string(), head),
        ("hhea".to_string(), hhea),
        ("hmtx".to_string(), hmtx),
        ("loca".to_string(), loca),
        ("maxp".to_string(), maxp),
        ("post".to_string(), post),
    ];
    for &tag in PASSTHROUGH_TABLES {
        if let Some(bytes) = font.table_bytes(tag) {
            tables.push((tag.to_string(), bytes.to_vec()));
        }
    }
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    assemble_sfnt(tables)
}

fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Assembles the offset subtable, table directory, and padded table data,
/// then patches `head.checkSumAdjustment` once the whole buffer is known.
fn assemble_sfnt(tables: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let num_tables = tables.len() as u16;
    let mut entries_exp = 1u16;
    let mut entry_selector = 0u16;
    while entries_exp * 2 <= num_tables {
        entries_exp *= 2;
        entry_selector += 1;
    }
    let search_range = entries_exp * 16;
    let range_shift = num_tables * 16 - search_range;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&num_tables.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    let header_len = 12 + 16 * tables.len();
    let mut offset = header_len;
    let mut head_file_offset = None;
    let mut directory = Vec::new();
    for (tag, data) in &tables {
        if tag == "head" {
            head_file_offset = Some(offset);
        }
        let checksum = sfnt_checksum(data);
        let mut tag_bytes = [0u8; 4];
        let bytes = tag.as_bytes();
        tag_bytes[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
        directory.extend_from_slice(&tag_bytes);
        directory.extend_from_slice(&checksum.to_be_bytes());
        directory.extend_from_slice(&(offset as u32).to_be_bytes());
        directory.extend_from_slice(&(data.len() as u32).to_be_bytes());
        offset += pad4(data.len());
    }
    out.extend_from_slice(&directory);

    for (_, data) in &tables {
        out.extend_from_slice(data);
        let padding = pad4(data.len()) - data.len();
        out.extend(std::iter::repeat(0u8).take(padding));
    }

    let head_file_offset =
        head_file_offset.ok_or_else(|| PdfError::UnsupportedFont("required table head absent".into()))?;
    let checksum = sfnt_checksum(&out);
    let adjustment = 0xB1B0_AFBAu32.wrapping_sub(checksum);
    out[head_file_offset + 8..head_file_offset + 12].copy_from_slice(&adjustment.to_be_bytes());

    Ok(out)
}

fn build_glyf(font: &SfntFont, plan: &SubsetPlan) -> Result<(Vec<u8>, Vec<u32>)> {
    let mut glyf = Vec::new();
    let mut loca_offsets = vec![0u32];

    for &old_gid in &plan.old_gids {
        let mut bytes = font.glyph_bytes(old_gid)?.to_vec();
        if bytes.len() >= 10 {
            let number_of_contours = i16::from_be_bytes([bytes[0], bytes[1]]);
            if number_of_contours < 0 {
                rewrite_compound_components(&mut bytes, plan)?;
            }
        }
        glyf.extend_from_slice(&bytes);
        let padding = pad4(bytes.len()) - bytes.len();
        glyf.extend(std::iter::repeat(0u8).take(padding));
        loca_offsets.push(glyf.len() as u32);
    }

    Ok((glyf, loca_offsets))
}

fn rewrite_compound_components(bytes: &mut [u8], plan: &SubsetPlan) -> Result<()> {
    let mut pos = 10usize;
    loop {
        if pos + 4 > bytes.len() {
            return Err(PdfError::CorruptOffset {
                table: "glyf".into(),
                offset: pos,
                len: bytes.len(),
            });
        }
        let flags = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]);
        let old_component_gid = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]);
        let new_component_gid = *plan.gid_map.get(&old_component_gid).ok_or_else(|| {
            PdfError::BadTable(format!(
                "compound glyph references gid {old_component_gid} not in subset plan"
            ))
        })?;
        bytes[pos + 2..pos + 4].copy_from_slice(&new_component_gid.to_be_bytes());
        pos += 4;

        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        pos += if flags & WE_HAVE_A_SCALE != 0 {
            2
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            4
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            8
        } else {
            0
        };

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(())
}

fn build_loca(offsets: &[u32], index_to_loc_format: i16) -> Vec<u8> {
    let mut out = Vec::new();
    for &offset in offsets {
        if index_to_loc_format == 0 {
            out.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        } else {
            out.extend_from_slice(&offset.to_be_bytes());
        }
    }
    out
}

/// Per §4.D: a literal 4-byte copy from the source `hmtx` at `oldGID * 4`,
/// for every GID in the plan (including `.notdef`).
fn build_hmtx(font: &SfntFont, plan: &SubsetPlan) -> Result<Vec<u8>> {
    let hmtx = font
        .table("hmtx")
        .ok_or_else(|| PdfError::UnsupportedFont("required table hmtx absent".into()))?;
    let data = font.raw_data();
    let mut out = Vec::with_capacity(plan.len() * 4);
    for &old_gid in &plan.old_gids {
        let start = hmtx.offset as usize + old_gid as usize * 4;
        let end = start + 4;
        let slice = data.get(start..end).ok_or(PdfError::CorruptOffset {
            table: "hmtx".into(),
            offset: start,
            len: data.len(),
        })?;
        out.extend_from_slice(slice);
    }
    Ok(out)
}

fn patch_head(font: &SfntFont) -> Result<Vec<u8>> {
    let mut bytes = font
        .table_bytes("head")
        .ok_or_else(|| PdfError::UnsupportedFont("required table head absent".into()))?
        .to_vec();
    bytes[8..12].copy_from_slice(&[0, 0, 0, 0]);
    bytes[50..52].copy_from_slice(&(font.index_to_loc_format as u16).to_be_bytes());
    Ok(bytes)
}

fn patch_hhea(font: &SfntFont, num_glyphs: u16) -> Result<Vec<u8>> {
    let mut bytes = font
        .table_bytes("hhea")
        .ok_or_else(|| PdfError::UnsupportedFont("required table hhea absent".into()))?
        .to_vec();
    bytes[34..36].copy_from_slice(&num_glyphs.to_be_bytes());
    Ok(bytes)
}

fn patch_maxp(font: &SfntFont, num_glyphs: u16) -> Result<Vec<u8>> {
    let mut bytes = font
        .table_bytes("maxp")
        .ok_or_else(|| PdfError::UnsupportedFont("required table maxp absent".into()))?
        .to_vec();
    bytes[4..6].copy_from_slice(&num_glyphs.to_be_bytes());
    Ok(bytes)
}

/// A minimal 32-byte format-3 `post` table: no glyph names are provided.
fn build_minimal_post() -> Vec<u8> {
    let mut post = vec![0u8; 32];
    post[0..4].copy_from_slice(&0x0003_0000u32.to_be_bytes());
    post
}

struct CmapRun {
    start_char: u32,
    new_gids: Vec<u16>,
}

/// Groups the subset's code points into runs where both the code point and
/// its new GID advance by exactly one each step — the condition the
/// idDelta-only encoding below relies on to avoid a glyph-index lookup.
fn group_runs(plan: &SubsetPlan) -> Vec<CmapRun> {
    let mut runs: Vec<CmapRun> = Vec::new();
    for (&ch, &gid) in &plan.char_to_new_gid {
        if let Some(last) = runs.last_mut() {
            let last_char = last.start_char + last.new_gids.len() as u32 - 1;
            let last_gid = *last.new_gids.last().unwrap();
            if ch == last_char + 1 && gid == last_gid.wrapping_add(1) {
                last.new_gids.push(gid);
                continue;
            }
        }
        runs.push(CmapRun {
            start_char: ch,
            new_gids: vec![gid],
        });
    }
    runs
}

/// Builds a single format-4 `cmap` subtable covering the subset's code
/// points plus the mandatory `0xFFFF` sentinel segment.
fn build_cmap(plan: &SubsetPlan) -> Vec<u8> {
    let runs = group_runs(plan);
    let seg_count = runs.len() as u16 + 1;

    let mut entries_exp = 1u16;
    let mut entry_selector = 0u16;
    while entries_exp * 2 <= seg_count {
        entries_exp *= 2;
        entry_selector += 1;
    }
    let search_range = entries_exp * 2;
    let range_shift = seg_count * 2 - search_range;

    let array_len: usize = runs.iter().map(|r| r.new_gids.len()).sum();
    let length = 16 + 8 * seg_count as usize + 2 * array_len;

    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&(length as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // language
    out.extend_from_slice(&(seg_count * 2).to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());

    for run in &runs {
        let end_char = run.start_char + run.new_gids.len() as u32 - 1;
        out.extend_from_slice(&(end_char as u16).to_be_bytes());
    }
    out.extend_from_slice(&0xFFFFu16.to_be_bytes());

    out.extend_from_slice(&0u16.to_be_bytes()); // reservedPad

    for run in &runs {
        out.extend_from_slice(&(run.start_char as u16).to_be_bytes());
    }
    out.extend_from_slice(&0xFFFFu16.to_be_bytes());

    for run in &runs {
        let first_new_gid = run.new_gids[0];
        let id_delta = (first_new_gid as i32 - run.start_char as i32) as i16;
        out.extend_from_slice(&id_delta.to_be_bytes());
    }
    out.extend_from_slice(&1i16.to_be_bytes()); // sentinel idDelta

    for _ in 0..seg_count {
        out.extend_from_slice(&0u16.to_be_bytes()); // idRangeOffset, always 0
    }

    for run in &runs {
        for &gid in &run.new_gids {
            out.extend_from_slice(&(gid + 1).to_be_bytes());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn plan_with_chars(chars: &[(u32, u16)]) -> SubsetPlan {
        let mut char_to_new_gid = BTreeMap::new();
        let mut gid_map = HashMap::new();
        gid_map.insert(0u16, 0u16);
        for &(ch, gid) in chars {
            char_to_new_gid.insert(ch, gid);
            gid_map.insert(gid, gid);
        }
        SubsetPlan {
            old_gids: vec![0],
            gid_map,
            char_to_new_gid,
        }
    }

    #[test]
    fn group_runs_merges_contiguous_char_and_gid() {
        let plan = plan_with_chars(&[(0x41, 1), (0x42, 2), (0x43, 3)]);
        let runs = group_runs(&plan);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start_char, 0x41);
        assert_eq!(runs[0].new_gids, vec![1, 2, 3]);
    }

    #[test]
    fn group_runs_splits_on_gid_gap() {
        let plan = plan_with_chars(&[(0x41, 1), (0x42, 5)]);
        let runs = group_runs(&plan);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn cmap_length_field_matches_actual_size() {
        let plan = plan_with_chars(&[(0x41, 1)]);
        let bytes = build_cmap(&plan);
        let declared_length = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        assert_eq!(declared_length, bytes.len());
    }

    #[test]
    fn cmap_seg_count_is_runs_plus_sentinel() {
        let plan = plan_with_chars(&[(0x41, 1), (0x42, 2), (0x50, 10)]);
        let bytes = build_cmap(&plan);
        let seg_count_x2 = u16::from_be_bytes([bytes[6], bytes[7]]);
        assert_eq!(seg_count_x2 / 2, 3); // two runs + sentinel
    }
}

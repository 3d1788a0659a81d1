use std::collections::BTreeMap;

use crate::bytereader::ByteReader;
use crate::error::{PdfError, Result};

const HEAD_MAGIC: u32 = 0x5F0F_3CF5;
const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
const SFNT_VERSION_TRUE: u32 = 0x7472_7565; // 'true'

/// A table directory entry as read from the offset subtable.
#[derive(Debug, Clone)]
pub struct TableDirectoryEntry {
    pub tag: String,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// PDF font-descriptor fields derived from the sfnt tables, scaled to the
/// PDF 1000-unit em.
#[derive(Debug, Clone)]
pub struct FontDescriptorFields {
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub bbox: [i32; 4],
    pub italic_angle: f64,
    pub stem_v: i32,
    pub missing_width: u16,
    pub flags: u32,
}

/// A parsed TrueType font, with enough state retained to drive subsetting:
/// the original bytes, the table directory, decoded metrics, the Unicode
/// cmap, and glyph offsets into `glyf`.
pub struct SfntFont {
    data: Vec<u8>,
    tables: BTreeMap<String, TableDirectoryEntry>,
    pub units_per_em: u16,
    pub index_to_loc_format: i16,
    pub num_glyphs: u16,
    pub num_of_hmetrics: u16,
    pub char_to_gid: BTreeMap<u32, u16>,
    /// `numGlyphs + 1` offsets into `glyf`, in bytes.
    pub loca: Vec<u32>,
    pub descriptor: FontDescriptorFields,
}

impl SfntFont {
    pub fn parse(data: Vec<u8>) -> Result<SfntFont> {
        let mut r = ByteReader::new(&data);
        let version = r.read_u32()?;
        if version != SFNT_VERSION_TRUETYPE && version != SFNT_VERSION_TRUE {
            return Err(PdfError::UnsupportedFont(format!(
                "not a TrueType sfnt (version word 0x{version:08X})"
            )));
        }
        let num_tables = r.read_u16()?;
        r.skip(6)?; // searchRange, entrySelector, rangeShift

        let mut tables = BTreeMap::new();
        for _ in 0..num_tables {
            let tag = r.read_tag()?;
            let checksum = r.read_u32()?;
            let offset = r.read_u32()?;
            let length = r.read_u32()?;
            tables.insert(
                tag.clone(),
                TableDirectoryEntry {
                    tag,
                    checksum,
                    offset,
                    length,
                },
            );
        }

        let head = parse_head(&data, &tables)?;
        let hhea = parse_hhea(&data, &tables)?;
        let num_glyphs = parse_maxp(&data, &tables)?;
        let os2 = parse_os2(&data, &tables)?;
        let post = parse_post(&data, &tables)?;
        let char_to_gid = parse_cmap(&data, &tables)?;
        let loca = parse_loca(&data, &tables, num_glyphs, head.index_to_loc_format)?;

        let (default_advance, _) = read_hmtx_entry(&data, &tables, hhea.num_of_hmetrics, 0)?;

        let cap_height = os2.cap_height.unwrap_or(head.ascent_override.unwrap_or(hhea.ascent));
        let weight_class = os2.weight_class;
        let stem_v = 50 + ((weight_class as f64 / 65.0).powi(2)).round() as i32;

        let mut flags: u32 = 1 << 2; // bit 2: symbolic, always set
        if post.italic_angle != 0.0 {
            flags |= 1 << 6;
        }
        if weight_class >= 600 {
            flags |= 1 << 18;
        }
        if post.is_fixed_pitch {
            flags |= 1 << 0;
        }

        let descriptor = FontDescriptorFields {
            ascent: hhea.ascent,
            descent: hhea.descent,
            cap_height,
            bbox: head.bbox,
            italic_angle: post.italic_angle,
            stem_v,
            missing_width: default_advance,
            flags,
        };

        Ok(SfntFont {
            data,
            tables,
            units_per_em: head.units_per_em,
            index_to_loc_format: head.index_to_loc_format,
            num_glyphs,
            num_of_hmetrics: hhea.num_of_hmetrics,
            char_to_gid,
            loca,
            descriptor,
        })
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }

    pub fn table(&self, tag: &str) -> Option<&TableDirectoryEntry> {
        self.tables.get(tag)
    }

    pub fn table_bytes(&self, tag: &str) -> Option<&[u8]> {
        let entry = self.tables.get(tag)?;
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        self.data.get(start..end)
    }

    /// Byte slice of `glyf` for the given GID, or `None` if it has zero length.
    pub fn glyph_bytes(&self, gid: u16) -> Result<&[u8]> {
        let glyf = self.table("glyf").ok_or_else(|| PdfError::BadTable("glyf".into()))?;
        let gid = gid as usize;
        if gid + 1 >= self.loca.len() {
            return Err(PdfError::CorruptOffset {
                table: "loca".into(),
                offset: gid,
                len: self.loca.len(),
            });
        }
        let start = self.loca[gid] as usize;
        let end = self.loca[gid + 1] as usize;
        if end < start {
            return Err(PdfError::CorruptOffset {
                table: "glyf".into(),
                offset: start,
                len: end,
            });
        }
        let base = glyf.offset as usize;
        self.data
            .get(base + start..base + end)
            .ok_or(PdfError::CorruptOffset {
                table: "glyf".into(),
                offset: base + start,
                len: self.data.len(),
            })
    }

    /// The `(advanceWidth, lsb)` pair for `gid`, honoring the rule that
    /// indices beyond `numberOfHMetrics` share the last advance width.
    pub fn hmtx_entry(&self, gid: u16) -> Result<(u16, i16)> {
        read_hmtx_entry(&self.data, &self.tables, self.num_of_hmetrics, gid)
    }

    /// Advance width scaled to the 1000-unit em.
    pub fn advance_width_pdf(&self, gid: u16) -> Result<u16> {
        let (advance, _) = self.hmtx_entry(gid)?;
        Ok(scale_to_1000_em(advance as i32, self.units_per_em) as u16)
    }
}

struct HeadFields {
    units_per_em: u16,
    bbox: [i32; 4],
    index_to_loc_format: i16,
    // Only used as a cap-height fallback when OS/2 lacks one *and* ascent
    // itself is unavailable from hhea (never happens in practice; kept for
    // symmetry with the descriptor defaulting rule).
    ascent_override: Option<i32>,
}

fn parse_head(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<HeadFields> {
    let entry = tables
        .get("head")
        .ok_or_else(|| PdfError::UnsupportedFont("required table head absent".into()))?;
    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;

    let version = r.read_fixed()?;
    if version != 1.0 {
        return Err(PdfError::BadTable("head".into()));
    }
    r.skip(4)?; // fontRevision
    r.skip(4)?; // checkSumAdjustment
    let magic = r.read_u32()?;
    if magic != HEAD_MAGIC {
        return Err(PdfError::BadTable("head".into()));
    }
    r.skip(2)?; // flags
    let units_per_em = r.read_u16()?;
    r.skip(8)?; // created
    r.skip(8)?; // modified
    let x_min = r.read_i16()? as i32;
    let y_min = r.read_i16()? as i32;
    let x_max = r.read_i16()? as i32;
    let y_max = r.read_i16()? as i32;
    r.skip(2)?; // macStyle
    r.skip(2)?; // lowestRecPPEM
    r.skip(2)?; // fontDirectionHint
    let index_to_loc_format = r.read_i16()?;

    let scale = |v: i32| scale_to_1000_em(v, units_per_em);
    Ok(HeadFields {
        units_per_em,
        bbox: [scale(x_min), scale(y_min), scale(x_max), scale(y_max)],
        index_to_loc_format,
        ascent_override: None,
    })
}

struct HheaFields {
    ascent: i32,
    descent: i32,
    num_of_hmetrics: u16,
}

fn parse_hhea(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<HheaFields> {
    let entry = tables
        .get("hhea")
        .ok_or_else(|| PdfError::UnsupportedFont("required table hhea absent".into()))?;
    let head = tables
        .get("head")
        .ok_or_else(|| PdfError::UnsupportedFont("required table head absent".into()))?;
    let units_per_em = {
        let mut hr = ByteReader::new(data);
        hr.seek(head.offset as usize + 18)?;
        hr.read_u16()?
    };

    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;
    r.skip(4)?; // version
    let ascent_raw = r.read_i16()? as i32;
    let descent_raw = r.read_i16()? as i32;
    r.skip(2)?; // lineGap
    r.skip(2)?; // advanceWidthMax
    r.skip(2)?; // minLeftSideBearing
    r.skip(2)?; // minRightSideBearing
    r.skip(2)?; // xMaxExtent
    r.skip(2)?; // caretSlopeRise
    r.skip(2)?; // caretSlopeRun
    r.skip(2)?; // caretOffset
    r.skip(8)?; // reserved x4
    r.skip(2)?; // metricDataFormat
    let num_of_hmetrics = r.read_u16()?;

    Ok(HheaFields {
        ascent: scale_to_1000_em(ascent_raw, units_per_em),
        descent: scale_to_1000_em(descent_raw, units_per_em),
        num_of_hmetrics,
    })
}

fn parse_maxp(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<u16> {
    let entry = tables
        .get("maxp")
        .ok_or_else(|| PdfError::UnsupportedFont("required table maxp absent".into()))?;
    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;
    r.skip(4)?; // version
    r.read_u16()
}

struct Os2Fields {
    weight_class: u16,
    cap_height: Option<i32>,
}

fn parse_os2(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<Os2Fields> {
    let Some(entry) = tables.get("OS/2") else {
        return Ok(Os2Fields {
            weight_class: 500,
            cap_height: None,
        });
    };
    let head = tables.get("head").ok_or_else(|| PdfError::BadTable("head".into()))?;
    let units_per_em = {
        let mut hr = ByteReader::new(data);
        hr.seek(head.offset as usize + 18)?;
        hr.read_u16()?
    };

    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;
    let version = r.read_u16()?;
    r.skip(2)?; // xAvgCharWidth
    let weight_class = r.read_u16()?;
    r.skip(82)?;
    let cap_height = if version > 1 {
        let raw = r.read_i16()? as i32;
        Some(scale_to_1000_em(raw, units_per_em))
    } else {
        None
    };

    Ok(Os2Fields {
        weight_class,
        cap_height,
    })
}

struct PostFields {
    italic_angle: f64,
    is_fixed_pitch: bool,
}

fn parse_post(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<PostFields> {
    let entry = tables
        .get("post")
        .ok_or_else(|| PdfError::UnsupportedFont("required table post absent".into()))?;
    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;
    r.skip(4)?; // version
    let italic_angle = r.read_fixed()?;
    r.skip(2)?; // underlinePosition
    r.skip(2)?; // underlineThickness
    let is_fixed_pitch = r.read_u32()? != 0;

    Ok(PostFields {
        italic_angle,
        is_fixed_pitch,
    })
}

/// Selection priority for a cmap subtable, lowest wins. Only subtables
/// matching one of these three rules are considered "usable".
fn cmap_priority(platform_id: u16, encoding_id: u16, format: u16) -> Option<u8> {
    match (platform_id, encoding_id, format) {
        (3, 10, 12) => Some(1),
        (3, 1, 4) => Some(2),
        (0, _, 4) => Some(3),
        _ => None,
    }
}

fn parse_cmap(data: &[u8], tables: &BTreeMap<String, TableDirectoryEntry>) -> Result<BTreeMap<u32, u16>> {
    let entry = tables
        .get("cmap")
        .ok_or_else(|| PdfError::UnsupportedFont("required table cmap absent".into()))?;
    let table_start = entry.offset as usize;

    let mut r = ByteReader::new(data);
    r.seek(table_start)?;
    let version = r.read_u16()?;
    if version != 0 {
        return Err(PdfError::BadTable("cmap".into()));
    }
    let num_subtables = r.read_u16()?;

    let mut best: Option<(u8, usize, u16)> = None; // (priority, subtable_offset, format)
    for _ in 0..num_subtables {
        let platform_id = r.read_u16()?;
        let encoding_id = r.read_u16()?;
        let offset = r.read_u32()? as usize;
        let sub_offset = table_start + offset;

        let format = {
            let mut fr = ByteReader::new(data);
            fr.seek(sub_offset)?;
            fr.read_u16()?
        };

        if let Some(priority) = cmap_priority(platform_id, encoding_id, format) {
            if best.as_ref().map(|(p, _, _)| priority < *p).unwrap_or(true) {
                best = Some((priority, sub_offset, format));
            }
        }
    }

    let (_, sub_offset, format) = best.ok_or_else(|| {
        PdfError::UnsupportedFont("no usable cmap subtable (NoUsableCmap)".into())
    })?;

    match format {
        4 => parse_cmap_format4(data, sub_offset),
        12 => parse_cmap_format12(data, sub_offset),
        _ => Err(PdfError::BadTable("cmap".into())),
    }
}

fn parse_cmap_format4(data: &[u8], sub_offset: usize) -> Result<BTreeMap<u32, u16>> {
    let mut r = ByteReader::new(data);
    r.seek(sub_offset)?;
    let _format = r.read_u16()?;
    let _length = r.read_u16()?;
    let _language = r.read_u16()?;
    let seg_count_x2 = r.read_u16()?;
    let seg_count = (seg_count_x2 / 2) as usize;
    r.skip(6)?; // searchRange, entrySelector, rangeShift

    let end_code_offset = r.tell();
    let mut end_code = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        end_code.push(r.read_u16()?);
    }
    let reserved_pad = r.read_u16()?;
    if reserved_pad != 0 {
        return Err(PdfError::BadTable("cmap".into()));
    }
    let mut start_code = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        start_code.push(r.read_u16()?);
    }
    let mut id_delta = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_delta.push(r.read_i16()?);
    }
    let id_range_offset_pos = r.tell();
    let mut id_range_offset = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        id_range_offset.push(r.read_u16()?);
    }
    let _ = end_code_offset;

    let mut map = BTreeMap::new();
    for i in 0..seg_count {
        let start = start_code[i];
        let end = end_code[i];
        if start == 0xFFFF && end == 0xFFFF {
            continue;
        }
        for ch in start..=end {
            let gid = if id_range_offset[i] == 0 {
                (ch.wrapping_add(id_delta[i] as u16)) as u16
            } else {
                let glyph_index_addr = id_range_offset_pos
                    + i * 2
                    + id_range_offset[i] as usize
                    + (ch - start) as usize * 2;
                let mut gr = ByteReader::new(data);
                gr.seek(glyph_index_addr)?;
                let raw = gr.read_u16()?;
                if raw == 0 {
                    0
                } else {
                    raw.wrapping_add(id_delta[i] as u16)
                }
            };
            if gid != 0 {
                map.insert(ch as u32, gid);
            }
            if ch == 0xFFFF {
                break;
            }
        }
    }
    Ok(map)
}

fn parse_cmap_format12(data: &[u8], sub_offset: usize) -> Result<BTreeMap<u32, u16>> {
    let mut r = ByteReader::new(data);
    r.seek(sub_offset)?;
    let _format = r.read_u16()?;
    r.skip(2)?; // reserved
    let _length = r.read_u32()?;
    let _language = r.read_u32()?;
    let num_groups = r.read_u32()?;

    let mut map = BTreeMap::new();
    for _ in 0..num_groups {
        let start_char_code = r.read_u32()?;
        let end_char_code = r.read_u32()?;
        let start_glyph_id = r.read_u32()?;
        for c in start_char_code..=end_char_code {
            let gid = start_glyph_id + (c - start_char_code);
            if gid != 0 && gid <= u16::MAX as u32 {
                map.insert(c, gid as u16);
            }
        }
    }
    Ok(map)
}

fn parse_loca(
    data: &[u8],
    tables: &BTreeMap<String, TableDirectoryEntry>,
    num_glyphs: u16,
    index_to_loc_format: i16,
) -> Result<Vec<u32>> {
    let entry = tables
        .get("loca")
        .ok_or_else(|| PdfError::UnsupportedFont("required table loca absent".into()))?;
    let mut r = ByteReader::new(data);
    r.seek(entry.offset as usize)?;
    let count = num_glyphs as usize + 1;
    let mut offsets = Vec::with_capacity(count);
    match index_to_loc_format {
        0 => {
            for _ in 0..count {
                offsets.push(r.read_u16()? as u32 * 2);
            }
        }
        1 => {
            for _ in 0..count {
                offsets.push(r.read_u32()?);
            }
        }
        _ => return Err(PdfError::BadTable("loca".into())),
    }
    Ok(offsets)
}

/// Reads the `(advanceWidth, lsb)` pair for `gid` out of `hmtx`, honoring
/// the rule that indices at or beyond `num_of_hmetrics` share the last
/// long-metric entry's advance width (with their own lsb, read from the
/// trailing lsb-only array).
fn read_hmtx_entry(
    data: &[u8],
    tables: &BTreeMap<String, TableDirectoryEntry>,
    num_of_hmetrics: u16,
    gid: u16,
) -> Result<(u16, i16)> {
    let entry = tables
        .get("hmtx")
        .ok_or_else(|| PdfError::UnsupportedFont("required table hmtx absent".into()))?;
    let mut r = ByteReader::new(data);
    if gid < num_of_hmetrics {
        r.seek(entry.offset as usize + gid as usize * 4)?;
        let advance = r.read_u16()?;
        let lsb = r.read_i16()?;
        Ok((advance, lsb))
    } else {
        let last_entry_offset = entry.offset as usize + (num_of_hmetrics.saturating_sub(1)) as usize * 4;
        r.seek(last_entry_offset)?;
        let advance = r.read_u16()?;
        let extra = gid - num_of_hmetrics;
        let lsb_offset =
            entry.offset as usize + num_of_hmetrics as usize * 4 + extra as usize * 2;
        r.seek(lsb_offset)?;
        let lsb = r.read_i16()?;
        Ok((advance, lsb))
    }
}

fn scale_to_1000_em(value: i32, units_per_em: u16) -> i32 {
    if units_per_em == 0 {
        return value;
    }
    ((value as f64) * 1000.0 / units_per_em as f64).round() as i32
}

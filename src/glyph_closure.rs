use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::error::Result;
use crate::sfnt::SfntFont;

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Highest code point the core will ever consider for subsetting; anything
/// beyond is dropped silently rather than rejected.
pub const MAX_SUBSET_CODEPOINT: u32 = 0x2FFFF;

/// The ordered set of glyphs to emit, and the map from requested Unicode
/// code points to their position (newGID) in that ordering.
pub struct SubsetPlan {
    /// `old_gids[newGID] == oldGID`. Always starts with `.notdef` (0).
    pub old_gids: Vec<u16>,
    /// oldGID -> newGID, for every glyph present in `old_gids`.
    pub gid_map: HashMap<u16, u16>,
    /// Unicode code point -> newGID, for every requested point that the
    /// font's cmap could actually resolve.
    pub char_to_new_gid: BTreeMap<u32, u16>,
}

impl SubsetPlan {
    pub fn len(&self) -> usize {
        self.old_gids.len()
    }
}

/// Builds the glyph closure: `.notdef`, then every requested code point's
/// glyph in ascending code-point order, then the transitive compound-glyph
/// dependencies of those glyphs in discovery order. See `walk_components`
/// for how a compound glyph's dependency GIDs are parsed out of `glyf`.
pub fn build_subset_plan(font: &SfntFont, requested: &BTreeSet<u32>) -> Result<SubsetPlan> {
    let mut old_gids = vec![0u16];
    let mut gid_map = HashMap::new();
    gid_map.insert(0u16, 0u16);
    let mut char_to_new_gid = BTreeMap::new();
    let mut queue: VecDeque<u16> = VecDeque::new();

    for &cp in requested {
        if cp > MAX_SUBSET_CODEPOINT {
            continue;
        }
        let Some(&gid) = font.char_to_gid.get(&cp) else {
            continue; // missing code points are silently skipped
        };
        let new_gid = *gid_map.entry(gid).or_insert_with(|| {
            old_gids.push(gid);
            queue.push_back(gid);
            (old_gids.len() - 1) as u16
        });
        char_to_new_gid.insert(cp, new_gid);
    }

    while let Some(gid) = queue.pop_front() {
        for dep in walk_components(font, gid)? {
            gid_map.entry(dep).or_insert_with(|| {
                old_gids.push(dep);
                queue.push_back(dep);
                (old_gids.len() - 1) as u16
            });
        }
    }

    Ok(SubsetPlan {
        old_gids,
        gid_map,
        char_to_new_gid,
    })
}

/// Parses a single glyph's component records, returning the component GIDs
/// it directly references. Returns an empty vector for simple glyphs.
fn walk_components(font: &SfntFont, gid: u16) -> Result<Vec<u16>> {
    let bytes = font.glyph_bytes(gid)?;
    if bytes.len() < 10 {
        return Ok(Vec::new());
    }
    let number_of_contours = i16::from_be_bytes([bytes[0], bytes[1]]);
    if number_of_contours >= 0 {
        return Ok(Vec::new());
    }

    let mut deps = Vec::new();
    let mut pos = 10usize; // past numberOfContours + 4x i16 bbox
    loop {
        if pos + 4 > bytes.len() {
            break;
        }
        let flags = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]);
        let component_gid = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]);
        deps.push(component_gid);
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
    Ok(deps)
}

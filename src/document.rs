use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::embed::{embed_font, MAX_FONT_ID};
use crate::error::{PdfError, Result};
use crate::fonts::{BuiltinFont, FontRef, FontRegistration, FontState};
use crate::images::{ImageId, ImageSource};
use crate::objects::{ObjId, PdfObject};
use crate::writer::{escape_pdf_string, PdfWriter};

const PAGES_OBJ: ObjId = ObjId(1, 0);
const RESOURCES_OBJ: ObjId = ObjId(2, 0);
const FIRST_DYNAMIC_OBJ_NUM: u32 = 3;

/// The standard page sizes, plus an escape hatch for an arbitrary point size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Custom { width: f64, height: f64 },
}

impl PageFormat {
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom { width, height } => (*width, *height),
        }
    }
}

struct PageContent {
    width: f64,
    height: f64,
    ops: Vec<u8>,
    used_builtin: BTreeSet<BuiltinFont>,
    used_registered: BTreeSet<u32>,
    used_images: BTreeSet<usize>,
}

/// High-level API for building PDF documents.
///
/// Page content and font/text registrations accumulate in memory; nothing
/// is written to `writer` until [`PdfDocument::finalize`] runs the
/// subsetter over every used font and emits the full object graph in one
/// pass. This is required by the font-embedding model: the set of used
/// code points for a font is only final once no more text can be added.
pub struct PdfDocument<W: Write> {
    writer: PdfWriter<W>,
    info: BTreeMap<String, String>,
    pages: Vec<PageContent>,
    current_page: Option<PageContent>,
    fonts: Vec<FontRegistration>,
    font_names: BTreeMap<String, u32>,
    images: Vec<ImageSource>,
}

impl PdfDocument<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> PdfDocument<W> {
    pub fn new(writer: W) -> io::Result<Self> {
        let mut pdf_writer = PdfWriter::new(writer);
        pdf_writer.write_header()?;

        Ok(PdfDocument {
            writer: pdf_writer,
            info: BTreeMap::new(),
            pages: Vec::new(),
            current_page: None,
            fonts: Vec::new(),
            font_names: BTreeMap::new(),
            images: Vec::new(),
        })
    }

    pub fn set_info(&mut self, key: &str, value: &str) -> &mut Self {
        self.info.insert(key.to_string(), value.to_string());
        self
    }

    /// Registers a TrueType font for later embedding. Returns a `FontRef`
    /// that can be passed to [`PdfDocument::place_text_styled`]. Font ids
    /// are dense and stable, assigned in registration order.
    pub fn register_font(&mut self, name: &str, data: Vec<u8>) -> Result<FontRef> {
        if let Some(&id) = self.font_names.get(name) {
            return Ok(FontRef::Registered(id));
        }
        let id = self.fonts.len() as u32;
        if id > MAX_FONT_ID {
            return Err(PdfError::TooManyFonts {
                attempted: id as usize + 1,
                limit: MAX_FONT_ID as usize + 1,
            });
        }
        log::debug!("registered font '{name}' as id {id}");
        self.fonts.push(FontRegistration::new(id, name.to_string(), data));
        self.font_names.insert(name.to_string(), id);
        Ok(FontRef::Registered(id))
    }

    pub fn begin_page(&mut self, format: PageFormat) -> &mut Self {
        if self.current_page.is_some() {
            self.end_page();
        }
        let (width, height) = format.dimensions();
        self.current_page = Some(PageContent {
            width,
            height,
            ops: Vec::new(),
            used_builtin: BTreeSet::new(),
            used_registered: BTreeSet::new(),
            used_images: BTreeSet::new(),
        });
        self
    }

    /// Registers an already-decoded image supplied by an external
    /// collaborator. Returns a handle usable with [`PdfDocument::place_image`].
    pub fn register_image(&mut self, source: ImageSource) -> ImageId {
        let id = ImageId(self.images.len());
        self.images.push(source);
        id
    }

    /// Paints the image at `(x, y)` (bottom-left origin) scaled to
    /// `width` x `height` in user space.
    pub fn place_image(&mut self, id: ImageId, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        let resource_name = format!("I{}", id.0);
        let page = self.current_page.as_mut().expect("place_image called with no open page");
        page.used_images.insert(id.0);
        let ops = format!(
            "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
            format_coord(width),
            format_coord(height),
            format_coord(x),
            format_coord(y),
            resource_name,
        );
        page.ops.extend_from_slice(ops.as_bytes());
        self
    }

    /// Places text at `(x, y)` (PDF's bottom-left origin) in 12pt Helvetica.
    pub fn place_text(&mut self, text: &str, x: f64, y: f64) -> &mut Self {
        self.place_text_styled(text, x, y, FontRef::Builtin(BuiltinFont::Helvetica), 12.0)
    }

    pub fn place_text_styled(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: FontRef,
        font_size: f64,
    ) -> &mut Self {
        let resource_name = match font {
            FontRef::Builtin(b) => b.pdf_name().to_string(),
            FontRef::Registered(id) => format!("R{id}"),
        };

        let page = self.current_page.as_mut().expect("place_text_styled called with no open page");

        match font {
            FontRef::Builtin(b) => {
                page.used_builtin.insert(b);
            }
            FontRef::Registered(id) => {
                page.used_registered.insert(id);
                if let Some(reg) = self.fonts.get_mut(id as usize) {
                    for ch in text.chars() {
                        reg.record_char(ch);
                    }
                }
            }
        }

        let ops = match font {
            FontRef::Builtin(_) => format!(
                "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
                resource_name,
                format_coord(font_size),
                format_coord(x),
                format_coord(y),
                escape_pdf_string(text),
            ),
            FontRef::Registered(_) => {
                let mut hex = String::with_capacity(text.len() * 4 + 2);
                hex.push('<');
                for ch in text.chars() {
                    let cp = ch as u32;
                    // Identity-H encodes CIDs as 2-byte codes; code points
                    // outside the BMP have no representation here.
                    hex.push_str(&format!("{:04X}", cp.min(0xFFFF)));
                }
                hex.push('>');
                format!(
                    "BT\n/{} {} Tf\n{} {} Td\n{} Tj\nET\n",
                    resource_name,
                    format_coord(font_size),
                    format_coord(x),
                    format_coord(y),
                    hex,
                )
            }
        };
        page.ops.extend_from_slice(ops.as_bytes());
        self
    }

    pub fn end_page(&mut self) -> &mut Self {
        if let Some(page) = self.current_page.take() {
            self.pages.push(page);
        }
        self
    }

    /// Writes every deferred object: subset-embedded fonts, builtin font
    /// dictionaries, page content streams and dictionaries, the shared
    /// resources dictionary, the pages tree, the catalog, and the info
    /// dictionary, followed by the xref table and trailer. Consumes `self`
    /// since no further mutation is meaningful afterward.
    pub fn finalize(mut self) -> Result<W> {
        self.end_page();
        if self.pages.is_empty() {
            let (width, height) = PageFormat::A4.dimensions();
            let mut used_builtin = BTreeSet::new();
            used_builtin.insert(BuiltinFont::Helvetica);
            self.pages.push(PageContent {
                width,
                height,
                ops: Vec::new(),
                used_builtin,
                used_registered: BTreeSet::new(),
                used_images: BTreeSet::new(),
            });
        }
        log::debug!("finalizing document: {} page(s), {} registered font(s)", self.pages.len(), self.fonts.len());

        let mut next_obj_num = FIRST_DYNAMIC_OBJ_NUM;

        let mut used_registered: BTreeSet<u32> = BTreeSet::new();
        let mut used_builtin: BTreeSet<BuiltinFont> = BTreeSet::new();
        let mut used_images: BTreeSet<usize> = BTreeSet::new();
        for page in &self.pages {
            used_registered.extend(page.used_registered.iter().copied());
            used_builtin.extend(page.used_builtin.iter().copied());
            used_images.extend(page.used_images.iter().copied());
        }

        let mut registered_font_objs: BTreeMap<u32, ObjId> = BTreeMap::new();
        for &id in &used_registered {
            let reg = &mut self.fonts[id as usize];
            if reg.state == FontState::Registered {
                continue; // never actually drawn with
            }
            let name = reg.name.clone();
            let used_chars = reg.used_chars.clone();
            let font = reg.font()?;
            let embedded = embed_font(&mut next_obj_num, id, &name, font, &used_chars)?;
            for (obj_id, obj) in &embedded.objects {
                self.writer.write_object(*obj_id, obj)?;
            }
            reg.mark_embedded(embedded.type0_obj.0);
            reg.mark_referenced()?;
            registered_font_objs.insert(id, embedded.type0_obj);
        }

        let mut builtin_font_objs: BTreeMap<BuiltinFont, ObjId> = BTreeMap::new();
        for &font in &used_builtin {
            let id = ObjId(next_obj_num, 0);
            next_obj_num += 1;
            let obj = PdfObject::dict(vec![
                ("Type", PdfObject::name("Font")),
                ("Subtype", PdfObject::name("Type1")),
                ("BaseFont", PdfObject::name(font.pdf_base_name())),
                ("Encoding", PdfObject::name("WinAnsiEncoding")),
            ]);
            self.writer.write_object(id, &obj)?;
            builtin_font_objs.insert(font, id);
        }

        let mut image_objs: BTreeMap<usize, ObjId> = BTreeMap::new();
        for &idx in &used_images {
            let source = std::mem::replace(
                &mut self.images[idx],
                ImageSource { width: 0, height: 0, data: Vec::new(), dict_lines: Vec::new(), dependents: Vec::new() },
            );
            let (obj_id, objects) = write_image_xobject(&mut next_obj_num, source);
            for (id, obj) in &objects {
                self.writer.write_object(*id, obj)?;
            }
            image_objs.insert(idx, obj_id);
        }

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let content_id = ObjId(next_obj_num, 0);
            next_obj_num += 1;
            let page_id = ObjId(next_obj_num, 0);
            next_obj_num += 1;

            self.writer.write_object(content_id, &PdfObject::stream(vec![], page.ops.clone()))?;

            let page_dict = PdfObject::dict(vec![
                ("Type", PdfObject::name("Page")),
                ("Parent", PdfObject::Reference(PAGES_OBJ)),
                (
                    "MediaBox",
                    PdfObject::array(vec![
                        PdfObject::Integer(0),
                        PdfObject::Integer(0),
                        PdfObject::Real(page.width),
                        PdfObject::Real(page.height),
                    ]),
                ),
                ("Contents", PdfObject::Reference(content_id)),
                ("Resources", PdfObject::Reference(RESOURCES_OBJ)),
            ]);
            self.writer.write_object(page_id, &page_dict)?;
            page_ids.push(page_id);
        }

        let mut font_entries: Vec<(String, PdfObject)> = Vec::new();
        for (font, obj_id) in &builtin_font_objs {
            font_entries.push((font.pdf_name().to_string(), PdfObject::Reference(*obj_id)));
        }
        for (&id, &obj_id) in &registered_font_objs {
            font_entries.push((format!("R{id}"), PdfObject::Reference(obj_id)));
        }
        let mut resources_entries = vec![("Font".to_string(), PdfObject::Dictionary(font_entries))];
        if !image_objs.is_empty() {
            let xobject_entries: Vec<(String, PdfObject)> =
                image_objs.iter().map(|(&idx, &obj_id)| (format!("I{idx}"), PdfObject::Reference(obj_id))).collect();
            resources_entries.push(("XObject".to_string(), PdfObject::Dictionary(xobject_entries)));
        }
        let resources = PdfObject::Dictionary(resources_entries);
        self.writer.write_object(RESOURCES_OBJ, &resources)?;

        let kids: Vec<PdfObject> = page_ids.iter().map(|id| PdfObject::Reference(*id)).collect();
        let pages = PdfObject::dict(vec![
            ("Type", PdfObject::name("Pages")),
            ("Kids", PdfObject::Array(kids)),
            ("Count", PdfObject::Integer(page_ids.len() as i64)),
        ]);
        self.writer.write_object(PAGES_OBJ, &pages)?;

        let catalog_id = ObjId(next_obj_num, 0);
        next_obj_num += 1;
        let mut catalog_entries = vec![
            ("Type", PdfObject::name("Catalog")),
            ("Pages", PdfObject::Reference(PAGES_OBJ)),
            ("PageLayout", PdfObject::name("OneColumn")),
        ];
        if let Some(&first_page) = page_ids.first() {
            catalog_entries.push((
                "OpenAction",
                PdfObject::array(vec![PdfObject::Reference(first_page), PdfObject::name("FitH"), PdfObject::Null]),
            ));
        }
        self.writer.write_object(catalog_id, &PdfObject::dict(catalog_entries))?;

        let info_id = ObjId(next_obj_num, 0);
        next_obj_num += 1;
        let mut info_entries: Vec<(&str, PdfObject)> = Vec::new();
        let producer = self.info.get("Producer").cloned().unwrap_or_else(|| "ttfpdf".to_string());
        info_entries.push(("Producer", PdfObject::literal_string(&producer)));
        if let Some(title) = self.info.get("Title") {
            info_entries.push(("Title", PdfObject::literal_string(title)));
        }
        let creation_date = pdf_creation_date();
        info_entries.push(("CreationDate", PdfObject::literal_string(&creation_date)));
        self.writer.write_object(info_id, &PdfObject::dict(info_entries))?;

        log::debug!("finalize complete: {} page object(s) written", page_ids.len());
        self.writer.write_xref_and_trailer(catalog_id, Some(info_id))?;

        Ok(self.writer.into_inner())
    }
}

/// Allocates object numbers for an image and, recursively, its dependents
/// (e.g. a soft mask), returning the image's own object id and every
/// object that needs writing. The first dependent, if any, is linked back
/// via `/SMask`.
fn write_image_xobject(next_obj_num: &mut u32, mut source: ImageSource) -> (ObjId, Vec<(ObjId, PdfObject)>) {
    let dependents = std::mem::take(&mut source.dependents);
    let mut objects = Vec::new();
    let mut smask_id = None;
    for dep in dependents {
        let (dep_id, dep_objects) = write_image_xobject(next_obj_num, dep);
        if smask_id.is_none() {
            smask_id = Some(dep_id);
        }
        objects.extend(dep_objects);
    }

    let obj_id = ObjId(*next_obj_num, 0);
    *next_obj_num += 1;
    let data = std::mem::take(&mut source.data);
    let mut entries: Vec<(String, PdfObject)> =
        source.xobject_dict(data.len()).into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    // xobject_dict() already appended /Length; drop it, the writer computes
    // the real (possibly deflated) length itself.
    entries.retain(|(k, _)| k != "Length");
    if let Some(smask) = smask_id {
        entries.push(("SMask".to_string(), PdfObject::Reference(smask)));
    }
    let dict_entries: Vec<(&str, PdfObject)> = entries.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    objects.push((obj_id, PdfObject::stream(dict_entries, data)));
    (obj_id, objects)
}

/// Formats a coordinate value for PDF content streams.
pub(crate) fn format_coord(v: f64) -> String {
    if v == v.floor() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.4}", v);
        let s = s.trim_end_matches('0');
        let s = s.trim_end_matches('.');
        s.to_string()
    }
}

/// Formats the current time as a PDF date string, `D:YYYYMMDDHHMMSS`.
fn pdf_creation_date() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0) as i64;
    let days = secs.div_euclid(86_400);
    let time_of_day = secs.rem_euclid(86_400);
    let (y, m, d) = civil_from_days(days);
    let (h, mi, s) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);
    format!("D:{:04}{:02}{:02}{:02}{:02}{:02}", y, m, d, h, mi, s)
}

/// Howard Hinnant's days-since-epoch to civil-date algorithm.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

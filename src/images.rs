use crate::objects::PdfObject;

/// Opaque handle to an image registered with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

/// The contract an external image collaborator supplies to the core: already
/// decoded (or already DCT/zlib-compressed) bytes, the dimensions, and the
/// extra dictionary lines the XObject needs (`/ColorSpace`, `/Filter`,
/// `/BitsPerComponent`, and so on). Decoding JPEG SOF markers or PNG IDAT
/// chunks into this shape is the collaborator's job, never the core's.
pub struct ImageSource {
    pub width: u32,
    pub height: u32,
    /// Pre-filtered bytes, written verbatim into the XObject stream.
    pub data: Vec<u8>,
    pub dict_lines: Vec<(String, PdfObject)>,
    /// Dependent XObjects (e.g. a soft mask) emitted alongside this one and
    /// referenced from its dictionary by the collaborator-supplied lines.
    pub dependents: Vec<ImageSource>,
}

impl ImageSource {
    pub fn xobject_dict(&self, data_len: usize) -> Vec<(&str, PdfObject)> {
        let mut entries = vec![
            ("Type", PdfObject::name("XObject")),
            ("Subtype", PdfObject::name("Image")),
            ("Width", PdfObject::Integer(self.width as i64)),
            ("Height", PdfObject::Integer(self.height as i64)),
        ];
        for (key, val) in &self.dict_lines {
            entries.push((key.as_str(), val.clone()));
        }
        entries.push(("Length", PdfObject::Integer(data_len as i64)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xobject_dict_includes_dimensions_and_collaborator_lines() {
        let img = ImageSource {
            width: 10,
            height: 20,
            data: vec![0u8; 4],
            dict_lines: vec![("ColorSpace".to_string(), PdfObject::name("DeviceRGB"))],
            dependents: vec![],
        };
        let dict = img.xobject_dict(img.data.len());
        assert!(dict.iter().any(|(k, _)| *k == "Width"));
        assert!(dict.iter().any(|(k, _)| *k == "ColorSpace"));
    }
}

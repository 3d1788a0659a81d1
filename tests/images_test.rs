use ttfpdf::{ImageSource, PageFormat, PdfDocument};

fn solid_rgb(width: u32, height: u32) -> ImageSource {
    ImageSource {
        width,
        height,
        data: vec![0u8; (width * height * 3) as usize],
        dict_lines: vec![
            ("ColorSpace".to_string(), ttfpdf::objects::PdfObject::name("DeviceRGB")),
            ("BitsPerComponent".to_string(), ttfpdf::objects::PdfObject::Integer(8)),
        ],
        dependents: Vec::new(),
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle.as_bytes())
}

#[test]
fn placed_image_produces_xobject_and_do_operator() {
    let mut doc = PdfDocument::new(Vec::<u8>::new()).unwrap();
    let img = doc.register_image(solid_rgb(10, 10));
    doc.begin_page(PageFormat::Letter);
    doc.place_image(img, 72.0, 72.0, 100.0, 100.0);
    doc.end_page();
    let bytes = doc.finalize().unwrap();

    assert!(contains(&bytes, "/Subtype /Image"));
    assert!(contains(&bytes, "/XObject"));
    assert!(contains(&bytes, "/I0"));
    assert!(contains(&bytes, "/I0 Do"));
    assert!(contains(&bytes, "/ColorSpace /DeviceRGB"));
}

#[test]
fn unused_registered_image_is_not_embedded() {
    let mut doc = PdfDocument::new(Vec::<u8>::new()).unwrap();
    doc.register_image(solid_rgb(10, 10));
    doc.begin_page(PageFormat::Letter);
    doc.place_text("No image here", 20.0, 20.0);
    doc.end_page();
    let bytes = doc.finalize().unwrap();

    assert!(!contains(&bytes, "/Subtype /Image"));
    assert!(!contains(&bytes, "/XObject"));
}

#[test]
fn image_with_soft_mask_dependent_links_smask() {
    let mut doc = PdfDocument::new(Vec::<u8>::new()).unwrap();
    let mut rgba = solid_rgb(4, 4);
    rgba.dependents.push(ImageSource {
        width: 4,
        height: 4,
        data: vec![255u8; 16],
        dict_lines: vec![
            ("ColorSpace".to_string(), ttfpdf::objects::PdfObject::name("DeviceGray")),
            ("BitsPerComponent".to_string(), ttfpdf::objects::PdfObject::Integer(8)),
        ],
        dependents: Vec::new(),
    });

    let img = doc.register_image(rgba);
    doc.begin_page(PageFormat::Letter);
    doc.place_image(img, 0.0, 0.0, 50.0, 50.0);
    doc.end_page();
    let bytes = doc.finalize().unwrap();

    assert!(contains(&bytes, "/SMask"));
    let gray_count = bytes.windows(b"/ColorSpace /DeviceGray".len()).filter(|w| *w == b"/ColorSpace /DeviceGray").count();
    assert_eq!(gray_count, 1);
}

#[test]
fn two_pages_referencing_same_image_share_one_xobject() {
    let mut doc = PdfDocument::new(Vec::<u8>::new()).unwrap();
    let img = doc.register_image(solid_rgb(8, 8));

    doc.begin_page(PageFormat::Letter);
    doc.place_image(img, 10.0, 10.0, 40.0, 40.0);
    doc.end_page();

    doc.begin_page(PageFormat::Letter);
    doc.place_image(img, 20.0, 20.0, 60.0, 60.0);
    doc.end_page();

    let bytes = doc.finalize().unwrap();
    let image_obj_count = bytes.windows(b"/Subtype /Image".len()).filter(|w| *w == b"/Subtype /Image").count();
    assert_eq!(image_obj_count, 1, "same ImageId should only be embedded once");
}

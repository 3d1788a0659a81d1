pub mod bytereader;
pub mod document;
pub mod embed;
pub mod error;
pub mod fonts;
pub mod glyph_closure;
pub mod images;
pub mod objects;
pub mod sfnt;
pub mod subset;
pub mod writer;

pub use document::{PageFormat, PdfDocument};
pub use error::{PdfError, Result};
pub use fonts::{BuiltinFont, FontRef, FontRegistration};
pub use images::{ImageId, ImageSource};
pub use sfnt::SfntFont;

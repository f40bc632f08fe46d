pub mod decode;
pub mod font;

pub use decode::{ACCEPTED_FORMATS, ImageCrateDecoder, ImageDecoder};
pub use font::{FontFace, FontOrigin, FontProvider, FontResolution, SystemFontProvider};

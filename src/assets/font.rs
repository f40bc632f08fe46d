use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a loaded font came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontOrigin {
    /// Read from a caller-supplied path.
    File(PathBuf),
    /// The provider's default face.
    Default,
}

/// Raw font file bytes plus the face index inside them.
#[derive(Clone, Debug)]
pub struct FontFace {
    /// Complete font file contents (TTF/OTF/TTC).
    pub bytes: Arc<Vec<u8>>,
    /// Face index for collections; `0` for single-face files.
    pub index: u32,
    /// Provenance, for diagnostics.
    pub origin: FontOrigin,
}

/// Outcome of a font lookup.
#[derive(Clone, Debug)]
pub struct FontResolution {
    /// Face to shape and draw with; `None` when not even a default exists.
    pub face: Option<Arc<FontFace>>,
    /// `true` when a preferred font was requested but could not be used.
    pub degraded: bool,
}

/// Supplies fonts to the text stage.
///
/// Implementations are owned by the host and shared across compositions.
pub trait FontProvider: Send + Sync {
    /// Resolve `preferred`, falling back to the provider's default face.
    fn resolve(&self, preferred: Option<&Path>) -> FontResolution;
}

/// [`FontProvider`] that reads preferred fonts from disk and falls back to a sans-serif face
/// from the system font database (or an explicitly supplied default).
#[derive(Clone, Debug)]
pub struct SystemFontProvider {
    default: Option<Arc<FontFace>>,
}

impl SystemFontProvider {
    /// Query the system font database for a sans-serif default face.
    pub fn new() -> Self {
        let default = system_sans_serif();
        if default.is_none() {
            tracing::warn!("no system sans-serif font found; overlay text will not be drawn");
        }
        Self { default }
    }

    /// Use `bytes` as the default face instead of querying the system.
    pub fn with_default_font(bytes: Vec<u8>) -> Self {
        Self {
            default: Some(Arc::new(FontFace {
                bytes: Arc::new(bytes),
                index: 0,
                origin: FontOrigin::Default,
            })),
        }
    }

    /// Provider with no default face at all.
    pub fn empty() -> Self {
        Self { default: None }
    }

    /// The default face, if any.
    pub fn default_face(&self) -> Option<&Arc<FontFace>> {
        self.default.as_ref()
    }
}

impl Default for SystemFontProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FontProvider for SystemFontProvider {
    fn resolve(&self, preferred: Option<&Path>) -> FontResolution {
        let Some(path) = preferred else {
            return FontResolution {
                face: self.default.clone(),
                degraded: false,
            };
        };

        match read_font_file(path) {
            Ok(face) => FontResolution {
                face: Some(Arc::new(face)),
                degraded: false,
            },
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "preferred font unavailable, using default");
                FontResolution {
                    face: self.default.clone(),
                    degraded: true,
                }
            }
        }
    }
}

fn read_font_file(path: &Path) -> Result<FontFace, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let mut db = usvg::fontdb::Database::new();
    db.load_font_data(bytes.clone());
    if db.faces().next().is_none() {
        return Err("file contains no parseable font faces".to_string());
    }
    Ok(FontFace {
        bytes: Arc::new(bytes),
        index: 0,
        origin: FontOrigin::File(path.to_path_buf()),
    })
}

fn system_sans_serif() -> Option<Arc<FontFace>> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let families = [
        usvg::fontdb::Family::SansSerif,
        usvg::fontdb::Family::Serif,
        usvg::fontdb::Family::Monospace,
    ];
    let query = usvg::fontdb::Query {
        families: &families,
        weight: usvg::fontdb::Weight::BOLD,
        ..Default::default()
    };
    // Shaping registers the whole file, so only face 0 is guaranteed to match what gets drawn.
    let id = db
        .query(&query)
        .filter(|id| db.face(*id).is_some_and(|f| f.index == 0))
        .or_else(|| db.faces().find(|f| f.index == 0).map(|f| f.id))?;
    let (bytes, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;

    Some(Arc::new(FontFace {
        bytes: Arc::new(bytes),
        index,
        origin: FontOrigin::Default,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_preference_uses_default_without_degrading() {
        let provider = SystemFontProvider::with_default_font(vec![1, 2, 3]);
        let res = provider.resolve(None);
        assert!(!res.degraded);
        assert_eq!(res.face.unwrap().origin, FontOrigin::Default);
    }

    #[test]
    fn missing_preferred_font_degrades_to_default() {
        let provider = SystemFontProvider::with_default_font(vec![1, 2, 3]);
        let res = provider.resolve(Some(Path::new("/nonexistent/font.ttf")));
        assert!(res.degraded);
        assert_eq!(res.face.unwrap().origin, FontOrigin::Default);
    }

    #[test]
    fn unparseable_font_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let res = SystemFontProvider::empty().resolve(Some(&path));
        assert!(res.degraded);
        assert!(res.face.is_none());
    }
}

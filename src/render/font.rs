use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::style::FontWeight;

/// A parsed face plus whether bold must be synthesized for it.
pub struct LoadedFont {
    pub font: Font,
    pub synthetic_bold: bool,
}

/// Locates and caches font faces by family name and weight.
///
/// Faces are discovered by walking the configured directories for `.ttf` and
/// `.otf` files whose file name starts with the family name. A family that
/// cannot be found falls back to the default family; if that is missing too
/// the lookup yields `None` and text measures as zero width.
pub struct FontBook {
    dirs: Vec<PathBuf>,
    default_family: String,
    index: Option<Vec<PathBuf>>,
    registered: HashMap<(String, FontWeight), Arc<LoadedFont>>,
    cache: HashMap<(String, FontWeight), Option<Arc<LoadedFont>>>,
}

impl FontBook {
    pub fn new(dirs: Vec<PathBuf>, default_family: impl Into<String>) -> Self {
        Self {
            dirs,
            default_family: default_family.into(),
            index: None,
            registered: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// A book with no search directories.
    pub fn empty() -> Self {
        Self::new(Vec::new(), "")
    }

    /// Register a face from raw font bytes.
    pub fn register(&mut self, family: &str, weight: FontWeight, bytes: &[u8]) -> Result<(), String> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| e.to_string())?;
        self.registered.insert(
            (normalize(family), weight),
            Arc::new(LoadedFont {
                font,
                synthetic_bold: false,
            }),
        );
        self.cache.clear();
        Ok(())
    }

    pub fn resolve(&mut self, family: &str, weight: FontWeight) -> Option<Arc<LoadedFont>> {
        let key = (normalize(family), weight);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let mut found = self.lookup(&key.0, weight);
        if found.is_none() && !self.default_family.is_empty() {
            let fallback = normalize(&self.default_family);
            if fallback != key.0 {
                debug!("Font '{}' not found, falling back to '{}'", family, self.default_family);
                found = self.lookup(&fallback, weight);
            }
        }
        if found.is_none() {
            warn!("No font face available for '{}'", family);
        }

        self.cache.insert(key, found.clone());
        found
    }

    fn lookup(&mut self, family: &str, weight: FontWeight) -> Option<Arc<LoadedFont>> {
        if let Some(face) = self.registered.get(&(family.to_string(), weight)) {
            return Some(face.clone());
        }
        if let Some(face) = self.registered.get(&(family.to_string(), FontWeight::Normal)) {
            return Some(Arc::new(LoadedFont {
                font: face.font.clone(),
                synthetic_bold: weight != FontWeight::Normal,
            }));
        }

        let candidates: Vec<PathBuf> = self
            .index()
            .iter()
            .filter(|path| file_key(path).starts_with(family))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let (path, exact) = pick_weight(&candidates, family, weight);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read font {}: {}", path.display(), e);
                return None;
            }
        };
        match Font::from_bytes(bytes, FontSettings::default()) {
            Ok(font) => {
                debug!("Loaded font {}", path.display());
                Some(Arc::new(LoadedFont {
                    font,
                    synthetic_bold: !exact && weight != FontWeight::Normal,
                }))
            }
            Err(e) => {
                warn!("Failed to parse font {}: {}", path.display(), e);
                None
            }
        }
    }

    fn index(&mut self) -> &[PathBuf] {
        let dirs = &self.dirs;
        self.index.get_or_insert_with(|| {
            let mut files = Vec::new();
            for dir in dirs {
                for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                    if entry.file_type().is_file() && is_font_file(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
            }
            files.sort();
            debug!("Indexed {} font files", files.len());
            files
        })
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn file_key(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(normalize)
        .unwrap_or_default()
}

/// Choose the best candidate for `weight`; the flag reports an exact match.
fn pick_weight(candidates: &[PathBuf], family: &str, weight: FontWeight) -> (PathBuf, bool) {
    let wanted: &[&str] = match weight {
        FontWeight::Normal => &["regular", ""],
        FontWeight::Bold => &["bold"],
        FontWeight::Black => &["black", "heavy", "extrabold"],
    };

    for suffix in wanted {
        if let Some(path) = candidates.iter().find(|p| {
            let key = file_key(p);
            let rest = &key[family.len().min(key.len())..];
            rest == *suffix
        }) {
            return (path.clone(), true);
        }
    }

    // Fall back to the regular face, or whatever sorts first.
    let regular = candidates
        .iter()
        .find(|p| {
            let key = file_key(p);
            let rest = &key[family.len().min(key.len())..];
            rest.is_empty() || rest == "regular"
        })
        .unwrap_or(&candidates[0]);
    (regular.clone(), false)
}

//! Icon lookup by filesystem probing.
//!
//! Paths are resolved against a configurable root so lookups can be pointed
//! at a scratch directory. A missing icon is `None`, never an error.

use std::path::PathBuf;

const PIXMAPS_DIR: &str = "usr/share/pixmaps";
const HICOLOR_DIR: &str = "usr/share/icons/hicolor";
const SNAP_ICONS_DIR: &str = "var/lib/snapd/desktop/icons";

const PIXMAP_EXTENSIONS: &[&str] = &["png", "svg"];
const HICOLOR_SIZES: &[&str] = &["48x48", "64x64", "scalable"];

#[derive(Debug, Clone)]
pub struct IconResolver {
    root: PathBuf,
}

impl Default for IconResolver {
    fn default() -> Self {
        Self::new("/")
    }
}

impl IconResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Direct pixmap, PNG before SVG
    pub fn pixmap(&self, name: &str) -> Option<PathBuf> {
        PIXMAP_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(PIXMAPS_DIR).join(format!("{}.{}", name, ext)))
            .find(|p| p.exists())
    }

    /// hicolor theme app icon, sizes in preference order, PNG before SVG
    /// within each size
    pub fn hicolor(&self, name: &str) -> Option<PathBuf> {
        HICOLOR_SIZES
            .iter()
            .flat_map(|size| {
                PIXMAP_EXTENSIONS.iter().map(move |ext| {
                    self.root
                        .join(HICOLOR_DIR)
                        .join(size)
                        .join("apps")
                        .join(format!("{}.{}", name, ext))
                })
            })
            .find(|p| p.exists())
    }

    /// Icon exported by snapd for desktop integration
    pub fn snap_desktop(&self, name: &str) -> Option<PathBuf> {
        let path = self
            .root
            .join(SNAP_ICONS_DIR)
            .join(format!("{}_icon.png", name));
        path.exists().then_some(path)
    }

    /// Lookup order for APT packages
    pub fn for_apt(&self, name: &str) -> Option<PathBuf> {
        if !is_safe_file_stem(name) {
            return None;
        }
        self.pixmap(name).or_else(|| self.hicolor(name))
    }

    /// Lookup order for snaps
    pub fn for_snap(&self, name: &str) -> Option<PathBuf> {
        if !is_safe_file_stem(name) {
            return None;
        }
        self.snap_desktop(name).or_else(|| self.pixmap(name))
    }
}

/// Names come from tool output; never let one walk out of the icon dirs
fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

//! Reference-image lookup for style-adapter workflows.
//!
//! The IP-Adapter pipeline conditions on four pre-shot views of each
//! plush species. Curated sets live in `<Animal>_done/` folders; raw
//! sets without the suffix are the fallback. Files are named
//! `{animal}_{view}.png`.

use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Directory name the reference library lives under, searched for
/// upwards from the working directory when not configured explicitly.
pub const DEFAULT_LIBRARY_DIR: &str = "Input_animals";

/// Walk up parent directories from `start` looking for an entry named
/// `name`. Returns the first match, or `None` at the filesystem root.
pub fn find_upwards(name: &str, start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Locate the reference library by searching upwards from the current
/// working directory.
pub fn locate_library() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_upwards(DEFAULT_LIBRARY_DIR, &cwd)
}

/// Reference-image library rooted at a fixed directory.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the reference image for one species and view.
    ///
    /// Looks in `<Animal>_done/` first, then the bare `<Animal>/`
    /// folder. A missing file is an error -- the adapter cannot run
    /// without its references.
    pub fn reference_image(&self, animal: &str, view: &str) -> Result<PathBuf, EngineError> {
        let folder = self.root.join(format!("{}_done", capitalize(animal)));
        let folder = if folder.exists() {
            folder
        } else {
            self.root.join(capitalize(animal))
        };

        let path = folder.join(format!("{}_{view}.png", animal.to_lowercase()));
        if path.exists() {
            Ok(path)
        } else {
            Err(EngineError::MissingAsset(path))
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"png").unwrap();
    }

    #[test]
    fn prefers_the_done_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Dog_done/dog_front.png"));
        touch(&dir.path().join("Dog/dog_front.png"));

        let lib = AssetLibrary::new(dir.path().to_path_buf());
        let path = lib.reference_image("dog", "front").unwrap();
        assert!(path.ends_with("Dog_done/dog_front.png"));
    }

    #[test]
    fn falls_back_to_the_raw_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Cat/cat_side.png"));

        let lib = AssetLibrary::new(dir.path().to_path_buf());
        let path = lib.reference_image("cat", "side").unwrap();
        assert!(path.ends_with("Cat/cat_side.png"));
    }

    #[test]
    fn missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let lib = AssetLibrary::new(dir.path().to_path_buf());
        assert!(lib.reference_image("bear", "back").is_err());
    }

    #[test]
    fn find_upwards_climbs_parents() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Input_animals/marker.png"));
        let deep = dir.path().join("a/b/c");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_upwards("Input_animals", &deep).unwrap();
        assert_eq!(found, dir.path().join("Input_animals"));
    }

    #[test]
    fn find_upwards_gives_up_at_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_upwards("definitely-not-here-xyz", dir.path()).is_none());
    }
}

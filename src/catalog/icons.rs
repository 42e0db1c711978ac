use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing::{debug, warn};

use super::tables::GENDERED_TRAILBLAZERS;
use crate::error::{Result, ScanError};
use crate::model::Trailblazer;

/// Side length avatar icons are normalised to before comparison.
pub const AVATAR_SIZE: u32 = 100;

/// Reference icons used by the template matcher.
pub struct IconSet {
    pub lock: GrayImage,
    pub discard: GrayImage,
    pub databank: GrayImage,
    pub trailblazers: Vec<(Trailblazer, GrayImage)>,
    /// Equipped-by avatars keyed by catalog name. Gendered trailblazers
    /// carry a `#M` / `#F` suffix.
    pub avatars: Vec<(String, GrayImage)>,
}

impl IconSet {
    /// Loads the icon set from `images_dir`.
    ///
    /// Status icons and portraits are required. A missing avatar only
    /// disables equipped-by resolution for that character.
    pub fn load(images_dir: &Path, characters: &[String]) -> Result<Self> {
        let trailblazers = vec![
            (Trailblazer::Caelus, load_gray(&images_dir.join("trailblazer_m.png"))?),
            (Trailblazer::Stelle, load_gray(&images_dir.join("trailblazer_f.png"))?),
        ];

        let avatar_dir = images_dir.join("avatars");
        let mut avatars = Vec::new();
        for key in avatar_keys(characters) {
            let path = avatar_dir.join(format!("{}.png", file_stem(&key)));
            match load_gray(&path) {
                Ok(icon) => avatars.push((key, normalise_avatar(&icon))),
                Err(_) => warn!(avatar = %key, path = %path.display(), "Avatar icon missing"),
            }
        }
        debug!(count = avatars.len(), "Avatar icons loaded");

        Ok(Self {
            lock: load_gray(&images_dir.join("lock.png"))?,
            discard: load_gray(&images_dir.join("discard.png"))?,
            databank: load_gray(&images_dir.join("databank.png"))?,
            trailblazers,
            avatars,
        })
    }
}

/// Catalog character names expanded to one key per avatar icon.
pub fn avatar_keys(characters: &[String]) -> Vec<String> {
    let mut keys = Vec::with_capacity(characters.len() + GENDERED_TRAILBLAZERS.len());
    for name in characters {
        if GENDERED_TRAILBLAZERS.contains(&name.as_str()) {
            for tb in [Trailblazer::Caelus, Trailblazer::Stelle] {
                keys.push(format!("{}{}", name, tb.avatar_suffix()));
            }
        } else {
            keys.push(name.clone());
        }
    }
    keys
}

/// Icon file stem for an avatar key: alphanumerics and `#` only.
pub fn file_stem(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '#')
        .collect()
}

pub fn normalise_avatar(icon: &GrayImage) -> GrayImage {
    imageops::resize(icon, AVATAR_SIZE, AVATAR_SIZE, FilterType::Triangle)
}

fn load_gray(path: &Path) -> Result<GrayImage> {
    image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|_| ScanError::AssetMissing(path.to_path_buf()))
}

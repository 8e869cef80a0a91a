//! Environment name resolution for `out`.

use crate::concourse::OutParams;
use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use std::fs;
use std::path::Path;

const ADJECTIVES: &[&str] = &[
    "amber", "ancient", "autumn", "billowing", "bitter", "bold", "brave", "broken", "calm",
    "cold", "cool", "crimson", "curly", "damp", "dark", "dawn", "delicate", "divine", "dry",
    "empty", "falling", "fancy", "flat", "floral", "fragrant", "frosty", "gentle", "green",
    "hidden", "holy", "icy", "jolly", "late", "lingering", "little", "lively", "long", "misty",
    "morning", "muddy", "nameless", "noisy", "old", "patient", "plain", "polished", "proud",
    "purple", "quiet", "rapid", "red", "restless", "rough", "round", "royal", "shiny",
    "shrill", "shy", "silent", "small", "snowy", "soft", "solitary", "sparkling", "spring",
    "square", "steep", "still", "summer", "super", "sweet", "throbbing", "tight", "tiny",
    "twilight", "wandering", "weathered", "white", "wild", "winter", "wispy", "withered",
    "yellow", "young",
];

const NOUNS: &[&str] = &[
    "art", "band", "bar", "base", "bird", "block", "boat", "bonus", "bread", "breeze", "brook",
    "bush", "butterfly", "cake", "cell", "cherry", "cloud", "credit", "darkness", "dawn",
    "dew", "disk", "dream", "dust", "feather", "field", "fire", "firefly", "flower", "fog",
    "forest", "frog", "frost", "glade", "glitter", "grass", "hall", "hat", "haze", "heart",
    "hill", "king", "lab", "lake", "leaf", "limit", "math", "meadow", "mode", "moon",
    "morning", "mountain", "mouse", "mud", "night", "paper", "pine", "poetry", "pond",
    "queen", "rain", "recipe", "resonance", "rice", "river", "salad", "scene", "sea",
    "shadow", "shape", "silence", "sky", "smoke", "snow", "snowflake", "sound", "star",
    "sun", "sunset", "surf", "term", "thunder", "tooth", "tree", "truth", "union", "unit",
    "violet", "voice", "water", "waterfall", "wave", "wildflower", "wind", "wood",
];

/// Resolve the environment name, first match wins:
/// `params.name`, the `params.name_file` contents, `<state_dir>/name`,
/// then a random `adjective-noun`.
///
/// Relative files are resolved against `sources_dir`.
pub fn resolve(sources_dir: &Path, params: &OutParams) -> Result<String> {
    if !params.name.is_empty() {
        return Ok(params.name.clone());
    }

    let name_file = if !params.name_file.is_empty() {
        Some(sources_dir.join(&params.name_file))
    } else if !params.state_dir.is_empty() {
        Some(sources_dir.join(&params.state_dir).join("name"))
    } else {
        None
    };

    match name_file {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .map_err(|e| anyhow!("Failure reading name file: {}: {}", path.display(), e))?;
            Ok(contents.trim().to_string())
        }
        None => Ok(random_name()),
    }
}

pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("nameless");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("env");
    format!("{}-{}", adjective, noun)
}

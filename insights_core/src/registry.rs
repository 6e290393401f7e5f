use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Hosts that serve the same animated GIF under many token URLs; a repeat
/// GIF from one of these is a duplicate, not a distinct asset.
const DUPLICATE_PRONE_GIF_HOSTS: [&str; 3] = ["ipfs.io", "arweave.net", "nftstorage.link"];

const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".webm", ".mov", ".avi"];

/// Why a candidate image URL was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaVerdict {
    Accepted,
    Placeholder,
    Video,
    DuplicateNumericPattern,
    DuplicateGif,
}

/// Tracks media patterns already seen within one collection, so repeats
/// can be rejected before they reach the registry.
#[derive(Debug, Default)]
pub struct SeenMedia {
    numeric_signatures: HashSet<String>,
    gif_urls: HashSet<String>,
}

impl SeenMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen a candidate URL, recording its patterns when accepted.
    pub fn screen(&mut self, url: &str) -> MediaVerdict {
        if is_placeholder(url) {
            return MediaVerdict::Placeholder;
        }

        let path = url.split('?').next().unwrap_or(url);
        let lower = path.to_lowercase();

        if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return MediaVerdict::Video;
        }

        if lower.ends_with(".gif") && is_duplicate_prone_host(url) {
            if !self.gif_urls.insert(url.to_string()) {
                return MediaVerdict::DuplicateGif;
            }
        }

        if let Some(signature) = numeric_signature(path) {
            if !self.numeric_signatures.insert(signature) {
                return MediaVerdict::DuplicateNumericPattern;
            }
        }

        MediaVerdict::Accepted
    }

    pub fn reset(&mut self) {
        self.numeric_signatures.clear();
        self.gif_urls.clear();
    }
}

/// The sentinel the upstream uses when it has no rendering for a token.
pub fn is_placeholder(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    lower.is_empty() || lower.contains("unavailable") || lower.contains("placeholder")
}

fn is_duplicate_prone_host(url: &str) -> bool {
    DUPLICATE_PRONE_GIF_HOSTS
        .iter()
        .any(|host| url.contains(host))
}

/// Join the digit runs of the URL path into a signature; two URLs differing
/// only in directory layout but repeating the same numbers collide.
fn numeric_signature(path: &str) -> Option<String> {
    // Compiled per call; the loader screens at most a batch at a time
    let digits = Regex::new(r"\d+").ok()?;
    let runs: Vec<&str> = digits.find_iter(path).map(|m| m.as_str()).collect();
    if runs.is_empty() {
        None
    } else {
        Some(runs.join("-"))
    }
}

/// Which side of the token/image pairing an insertion collided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryConflict {
    TokenAlreadyRegistered { token_id: String },
    ImageAlreadyRegistered { image_url: String, token_id: String },
}

/// Bidirectional token_id <-> image_url registry for one collection.
///
/// No two distinct token ids may map to the same image URL and vice
/// versa; a violating pair is rejected and the token discarded.
#[derive(Debug, Default)]
pub struct TokenImageRegistry {
    token_to_image: HashMap<String, String>,
    image_to_token: HashMap<String, String>,
}

impl TokenImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        token_id: &str,
        image_url: &str,
    ) -> std::result::Result<(), RegistryConflict> {
        if self.token_to_image.contains_key(token_id) {
            return Err(RegistryConflict::TokenAlreadyRegistered {
                token_id: token_id.to_string(),
            });
        }

        if let Some(owner) = self.image_to_token.get(image_url) {
            return Err(RegistryConflict::ImageAlreadyRegistered {
                image_url: image_url.to_string(),
                token_id: owner.clone(),
            });
        }

        self.token_to_image
            .insert(token_id.to_string(), image_url.to_string());
        self.image_to_token
            .insert(image_url.to_string(), token_id.to_string());
        debug!("Registered token {} -> {}", token_id, image_url);
        Ok(())
    }

    pub fn contains_token(&self, token_id: &str) -> bool {
        self.token_to_image.contains_key(token_id)
    }

    pub fn len(&self) -> usize {
        self.token_to_image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_image.is_empty()
    }

    pub fn reset(&mut self) {
        self.token_to_image.clear();
        self.image_to_token.clear();
    }
}

/// A source of token image URLs (the v1 token-by-id endpoint in
/// production, scripted fixtures in tests).
#[async_trait]
pub trait TokenImageSource: Send + Sync {
    /// `Ok(None)` means the upstream answered but has no image for the
    /// token; transport-level failures use the error variants so callers
    /// can distinguish retry from skip.
    async fn fetch_token_image(
        &self,
        blockchain: &str,
        contract_address: &str,
        token_id: &str,
    ) -> Result<Option<String>>;
}

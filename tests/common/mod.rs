//! Shared test fixtures: a stub source, a counting key capture, and helpers
//! for building page payloads.
#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use comic_dl::{
    Chapter, ChapterLayout, Config, DownloadConfig, Fetcher, KeyCapture, Result, RetryConfig,
    Source, TitleListing,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A deterministic source serving one title with a configurable chapter list
pub struct StubSource {
    pub title: String,
    pub chapter_names: Vec<String>,
    pub page_count: u32,
    pub encrypted: bool,
    pub list_calls: Arc<AtomicUsize>,
}

impl StubSource {
    pub fn new(chapter_names: &[&str], page_count: u32) -> Self {
        Self {
            title: "Test Title".to_string(),
            chapter_names: chapter_names.iter().map(|s| s.to_string()).collect(),
            page_count,
            encrypted: false,
            list_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }
}

#[async_trait]
impl Source for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, _: &Fetcher, query: &str, page: u32) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "query": query, "page": page, "hits": [self.title] }))
    }

    async fn list_chapters(&self, _: &Fetcher, _title: &str) -> Result<TitleListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TitleListing {
            title: self.title.clone(),
            chapters: self
                .chapter_names
                .iter()
                .enumerate()
                .map(|(index, name)| Chapter {
                    name: name.clone(),
                    url: format!("http://reader.test/{name}"),
                    index,
                })
                .collect(),
        })
    }

    async fn chapter_layout(&self, _: &Fetcher, chapter: &Chapter) -> Result<ChapterLayout> {
        Ok(ChapterLayout {
            page_count: self.page_count,
            file_ext: "png".to_string(),
            encrypted: self.encrypted,
            path_prefix: format!("/{}", chapter.name),
        })
    }

    fn asset_id(&self, chapter: &Chapter) -> String {
        format!("asset_{}", chapter.name)
    }
}

/// Key capture double returning a fixed key and counting invocations
pub struct CountingCapture {
    pub key: Vec<u8>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingCapture {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: key.to_vec(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl KeyCapture for CountingCapture {
    async fn capture(&self, _url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.key.clone())
    }
}

/// Config pointing at a mock mirror, with directories under `root` and a
/// backoff short enough for tests
pub fn test_config(mirror_uri: &str, root: &Path) -> Config {
    Config {
        mirrors: vec![mirror_uri.to_string()],
        download: DownloadConfig {
            output_dir: root.join("comics"),
            cache_dir: root.join("cache"),
            ..DownloadConfig::default()
        },
        retry: RetryConfig {
            backoff_ms: 1,
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

/// A small valid PNG whose pixels encode `seed`, so pages are distinguishable
pub fn png_page(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 6, image::Rgb([seed, seed.wrapping_add(1), 128]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// AES-256-CBC encrypt `plain` the way the origin's in-page decryptor expects
pub fn encrypt_page(plain: &[u8], key: &[u8; 32]) -> Vec<u8> {
    cbc::Encryptor::<aes::Aes256>::new_from_slices(key, b"0000000000000000")
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plain)
}

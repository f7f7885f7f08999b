//! Image fetching and caching.
//!
//! The cache is an explicitly-owned object handed to whichever screen needs
//! it - there is no process-wide singleton. The contract is a keyed fetch:
//! url in, cached-or-downloaded file out, delivered on a channel. Dropping
//! the receiver is the cancellation; a worker finishing a superseded job
//! just fails to send and moves on.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::ImageFormat;
use parking_lot::Mutex;
use reqwest::blocking::Client;
use sha1::{Digest, Sha1};

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: Option<PathBuf>,
    pub max_size_bytes: i64,
    pub default_ttl: Duration,
    pub workers: usize,
    pub http_client: Option<Client>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_size_bytes: 200 * 1024 * 1024,
            default_ttl: Duration::from_secs(6 * 60 * 60),
            workers: 2,
            http_client: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub url: String,
    pub ttl: Option<Duration>,
    /// Skip the cache and re-download even if a fresh entry exists.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub url: String,
    pub media_type: String,
    pub file_path: PathBuf,
    pub size_bytes: i64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResultEntry {
    pub entry: Option<MediaEntry>,
    pub error: Option<anyhow::Error>,
}

struct Job {
    request: Request,
    tx: Sender<ResultEntry>,
}

struct Inner {
    cfg: Config,
    client: Client,
    jobs: Sender<Job>,
    stop: Sender<()>,
    // url -> entry; lives only as long as the cache object itself.
    index: Mutex<HashMap<String, MediaEntry>>,
}

pub struct Cache {
    inner: Arc<Inner>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl Cache {
    pub fn new(cfg: Config) -> Result<Self> {
        let mut cfg = cfg;
        if cfg.workers == 0 {
            cfg.workers = 2;
        }
        let cache_dir = cfg
            .cache_dir
            .clone()
            .or_else(default_cache_dir)
            .context("media: cache dir not configured")?;
        fs::create_dir_all(&cache_dir)?;
        cfg.cache_dir = Some(cache_dir);

        let client = if let Some(client) = cfg.http_client.clone() {
            client
        } else {
            Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("media: build http client")?
        };

        let (job_tx, job_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let inner = Arc::new(Inner {
            cfg,
            client,
            jobs: job_tx,
            stop: stop_tx,
            index: Mutex::new(HashMap::new()),
        });

        let mut handles = Vec::new();
        for _ in 0..inner.cfg.workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let worker_inner = inner.clone();
            handles.push(thread::spawn(move || worker_inner.worker(rx_jobs, rx_stop)));
        }

        Ok(Self { inner, handles })
    }

    /// Queue a fetch. The result arrives on the returned channel; dropping
    /// the receiver cancels delivery.
    pub fn enqueue(&self, request: Request) -> Receiver<ResultEntry> {
        let (tx, rx) = unbounded();
        let job = Job { request, tx };
        let _ = self.inner.jobs.send(job);
        rx
    }

    /// Cached entry for `url`, if present and still on disk. Does not check
    /// freshness; `enqueue` handles TTL-driven refetches.
    pub fn cached(&self, url: &str) -> Option<MediaEntry> {
        let index = self.inner.index.lock();
        index
            .get(url)
            .filter(|entry| entry.file_path.exists())
            .cloned()
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.inner.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn worker(&self, jobs: Receiver<Job>, stop: Receiver<()>) {
        loop {
            crossbeam_channel::select! {
                recv(stop) -> _ => break,
                recv(jobs) -> msg => {
                    match msg {
                        Ok(job) => self.process(job),
                        Err(_) => break,
                    }
                }
            }
        }
    }

    fn process(&self, job: Job) {
        let result = match self.fetch(job.request) {
            Ok(entry) => ResultEntry {
                entry: Some(entry),
                error: None,
            },
            Err(err) => ResultEntry {
                entry: None,
                error: Some(err),
            },
        };
        let _ = job.tx.send(result);
    }

    fn fetch(&self, request: Request) -> Result<MediaEntry> {
        if request.url.is_empty() {
            return Err(anyhow!("media: url required"));
        }

        if let Some(entry) = self.index.lock().get(&request.url) {
            if !request.force && self.is_fresh(entry, request.ttl) && entry.file_path.exists() {
                return Ok(entry.clone());
            }
        }

        let response = self
            .client
            .get(&request.url)
            .send()
            .context("media: download")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("media: request failed: {} - {}", status, body));
        }

        let headers = response.headers().clone();
        let bytes = response.bytes().context("media: body")?.to_vec();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| detect_mime(&bytes));

        let file_path = self.write_file(&bytes)?;
        let entry = MediaEntry {
            url: request.url.clone(),
            media_type: content_type,
            file_path,
            size_bytes: bytes.len() as i64,
            fetched_at: Utc::now(),
        };

        self.prune_if_needed(entry.size_bytes)?;
        self.index.lock().insert(request.url, entry.clone());
        Ok(entry)
    }

    fn is_fresh(&self, entry: &MediaEntry, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.cfg.default_ttl);
        if ttl.is_zero() {
            return false;
        }
        let expiry = entry.fetched_at.checked_add_signed(
            chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0)),
        );
        match expiry {
            Some(expiry) => Utc::now() < expiry,
            None => false,
        }
    }

    fn write_file(&self, data: &[u8]) -> Result<PathBuf> {
        let cache_dir = self.cfg.cache_dir.as_ref().expect("cache dir");
        let filename = format!("{}.bin", sha1_hex(data));
        let path = cache_dir.join(filename);
        fs::write(&path, data).context("media: write")?;
        Ok(path)
    }

    fn prune_if_needed(&self, new_bytes: i64) -> Result<()> {
        let mut index = self.index.lock();
        let mut total: i64 = index.values().map(|entry| entry.size_bytes).sum();
        total += new_bytes;
        if total <= self.cfg.max_size_bytes {
            return Ok(());
        }

        let mut entries: Vec<_> = index
            .values()
            .map(|entry| (entry.fetched_at, entry.url.clone()))
            .collect();
        entries.sort();

        for (_, url) in entries {
            if total <= self.cfg.max_size_bytes {
                break;
            }
            if let Some(entry) = index.remove(&url) {
                total -= entry.size_bytes;
                let _ = fs::remove_file(&entry.file_path);
            }
        }
        Ok(())
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("favespot"))
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn detect_mime(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg".into(),
        Ok(ImageFormat::Png) => "image/png".into(),
        Ok(ImageFormat::Gif) => "image/gif".into(),
        Ok(ImageFormat::WebP) => "image/webp".into(),
        _ => {
            let mut buffer = [0u8; 512];
            let mut cursor = std::io::Cursor::new(bytes);
            let read = cursor.read(&mut buffer).unwrap_or(0);
            tree_magic_mini::from_u8(&buffer[..read]).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> Cache {
        Cache::new(Config {
            cache_dir: Some(dir.to_path_buf()),
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn empty_url_is_rejected() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let rx = cache.enqueue(Request::default());
        let result = rx.recv().unwrap();
        assert!(result.entry.is_none());
        assert!(result.error.unwrap().to_string().contains("url required"));
    }

    #[test]
    fn dropping_the_receiver_is_safe() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        // Cancelled before the worker can deliver; the send just fails.
        drop(cache.enqueue(Request::default()));
        drop(cache);
    }

    #[test]
    fn detect_mime_recognizes_png() {
        let png = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(detect_mime(&png), "image/png");
    }

    #[test]
    fn cached_misses_for_unknown_url() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        assert!(cache.cached("https://example.com/x.png").is_none());
    }
}

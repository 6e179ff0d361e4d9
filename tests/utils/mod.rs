#![allow(dead_code)]

use async_trait::async_trait;
use flagcore::{FeatureFlag, FlagCache, FlagRepository, StoreError};
use log::kv::Key;
use log::{Level, Log, Metadata, Record};
use rand::distr::{Alphanumeric, SampleString};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub fn rand_id(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

/// Loads flags from a YAML fixture under `tests/data`.
pub fn load_flags(file: &str) -> Vec<FeatureFlag> {
    let content = std::fs::read_to_string(format!("tests/data/{file}")).unwrap();
    serde_yaml::from_str(content.as_str()).unwrap()
}

async fn wait(delay: Option<Duration>, token: &CancellationToken) -> Result<(), StoreError> {
    if let Some(delay) = delay {
        tokio::select! {
            _ = token.cancelled() => return Err(StoreError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
    Ok(())
}

#[derive(Default)]
pub struct InMemoryRepository {
    flags: Mutex<HashMap<String, FeatureFlag>>,
    pub get_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_create: AtomicBool,
    /// Number of upcoming `get` calls that report a miss even for stored keys.
    pub missed_gets: AtomicUsize,
    delay: Option<Duration>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flags(flags: Vec<FeatureFlag>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.flags.lock().unwrap();
            for flag in flags {
                map.insert(flag.key.clone(), flag);
            }
        }
        repo
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn stored(&self, key: &str) -> Option<FeatureFlag> {
        self.flags.lock().unwrap().get(key).cloned()
    }

    pub fn count(&self, key: &str) -> usize {
        self.flags
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

#[async_trait]
impl FlagRepository for InMemoryRepository {
    async fn get(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> Result<Option<FeatureFlag>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        wait(self.delay, token).await?;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_owned()));
        }
        let missed = self
            .missed_gets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if missed.is_ok() {
            return Ok(None);
        }
        Ok(self.flags.lock().unwrap().get(key).cloned())
    }

    async fn create(
        &self,
        flag: &FeatureFlag,
        token: &CancellationToken,
    ) -> Result<FeatureFlag, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        wait(self.delay, token).await?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_owned()));
        }
        let mut flags = self.flags.lock().unwrap();
        if flags.contains_key(&flag.key) {
            return Err(StoreError::AlreadyExists(flag.key.clone()));
        }
        flags.insert(flag.key.clone(), flag.clone());
        Ok(flag.clone())
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Arc<FeatureFlag>, Option<Instant>)>>,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub last_ttl: Mutex<Option<Duration>>,
    pub fail: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn insert(&self, flag: FeatureFlag) {
        self.entries
            .lock()
            .unwrap()
            .insert(flag.key.clone(), (Arc::new(flag), None));
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("cache unavailable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl FlagCache for InMemoryCache {
    async fn get(
        &self,
        key: &str,
        _: &CancellationToken,
    ) -> Result<Option<Arc<FeatureFlag>>, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((flag, _)) => Ok(Some(Arc::clone(flag))),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        flag: Arc<FeatureFlag>,
        ttl: Option<Duration>,
        _: &CancellationToken,
    ) -> Result<(), StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_ttl.lock().unwrap() = ttl;
        self.check()?;
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_owned(), (flag, expires));
        Ok(())
    }

    async fn remove(&self, key: &str, _: &CancellationToken) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn clear(&self, _: &CancellationToken) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

pub struct RecordingLogger {}

impl RecordingLogger {
    thread_local!(pub static LOGS: RefCell<String> = RefCell::new(String::default()));
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("flagcore")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .and_then(|id| id.to_i64())
            .unwrap_or(0);
        Self::LOGS.with_borrow_mut(|l| {
            l.push_str(format!("{level} [{event_id}] {}\n", record.args()).as_str())
        });
    }

    fn flush(&self) {}
}

pub fn log_record_init() {
    log::set_max_level(log::LevelFilter::Info);
    _ = log::set_logger(&RecordingLogger {});
}

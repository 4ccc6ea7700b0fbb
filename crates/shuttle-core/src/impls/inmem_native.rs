//! InMemoryCluster - テスト・デモ用のネイティブ層
//!
//! データベースではありません。dispatch の全経路を通すのに必要な最小限の
//! 振る舞いだけを持ちます。
//!
//! # テスト用の仕掛け
//! - `fail_next`: 次のデータ操作を指定の ErrorCode で失敗させる
//! - `panic_next`: 次のデータ操作の中で panic する
//! - `set_latency`: 各データ操作の前に sleep する
//! - `on_next_open`: 接続の途中に割り込む
//! - `outstanding_allocations`: まだ release されていない配列の数

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use regex::bytes::Regex;

use crate::domain::buffer::{NativeArray, NativeBuffer, ReleaseHook};
use crate::domain::errors::ErrorCode;
use crate::domain::metadata::{EntryMetadata, EntryReference, EntryType};
use crate::domain::query::{QueryCell, QueryResult, QueryTable};
use crate::domain::series::{
    Aggregation, AggregationResult, AggregationType, ColumnInfo, ColumnType, Point, PointValue,
};
use crate::domain::time::{Expiry, Timespec, TsRange};
use crate::ports::{Clock, Credentials, NativeConnector, NativeSession, SystemClock};

/// InMemoryCluster は NativeConnector の開発用実装
#[derive(Clone)]
pub struct InMemoryCluster {
    uri: String,
    required_credentials: Option<Credentials>,
    state: Arc<ClusterState>,
}

struct ClusterState {
    store: Mutex<Store>,
    clock: Arc<dyn Clock>,
    outstanding: Arc<AtomicUsize>,
    faults: Mutex<Faults>,
    refuse: AtomicBool,
    opened: AtomicUsize,
    applied_timeout_ms: AtomicU32,
    on_open: Mutex<Option<OpenHook>>,
}

type OpenHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Faults {
    fail_next: VecDeque<ErrorCode>,
    panic_next: bool,
    latency: Option<Duration>,
}

impl InMemoryCluster {
    pub fn new(uri: impl Into<String>) -> Self {
        Self::with_clock(uri, Arc::new(SystemClock))
    }

    pub fn with_clock(uri: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            uri: uri.into(),
            required_credentials: None,
            state: Arc::new(ClusterState {
                store: Mutex::new(Store::default()),
                clock,
                outstanding: Arc::new(AtomicUsize::new(0)),
                faults: Mutex::new(Faults::default()),
                refuse: AtomicBool::new(false),
                opened: AtomicUsize::new(0),
                applied_timeout_ms: AtomicU32::new(0),
                on_open: Mutex::new(None),
            }),
        }
    }

    /// secured cluster として振る舞う
    pub fn require_credentials(mut self, credentials: Credentials) -> Self {
        self.required_credentials = Some(credentials);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 次のデータ操作を `code` で失敗させる（複数回呼ぶと順に消費）
    pub fn fail_next(&self, code: ErrorCode) {
        self.state.faults().fail_next.push_back(code);
    }

    pub fn panic_next(&self) {
        self.state.faults().panic_next = true;
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.faults().latency = latency;
    }

    /// 次の `open` が handle を返す直前に `hook` を一度だけ走らせる
    pub fn on_next_open(&self, hook: impl FnOnce() + Send + 'static) {
        *self.state.on_open.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn outstanding_allocations(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    pub fn opened_sessions(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// 最後に session へ適用された timeout。未適用なら `None`
    pub fn applied_timeout_ms(&self) -> Option<u32> {
        match self.state.applied_timeout_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(ms),
        }
    }
}

impl NativeConnector for InMemoryCluster {
    fn open(
        &self,
        uri: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn NativeSession>, ErrorCode> {
        if self.state.refuse.load(Ordering::SeqCst) || uri != self.uri {
            return Err(ErrorCode::CONNECTION_REFUSED);
        }
        if let Some(required) = &self.required_credentials
            && credentials != Some(required)
        {
            return Err(ErrorCode::INVALID_CREDENTIALS);
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let hook = self.state.on_open.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(Arc::new(InMemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

impl ClusterState {
    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 仕込まれた fault を適用する
    fn enter(&self) -> Result<(), ErrorCode> {
        let (latency, panic, fail) = {
            let mut faults = self.faults();
            let panic = std::mem::take(&mut faults.panic_next);
            (faults.latency, panic, faults.fail_next.pop_front())
        };
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
        if panic {
            panic!("injected native fault");
        }
        match fail {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn alloc<T>(&self, items: Vec<T>) -> NativeArray<T> {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = Arc::clone(&self.outstanding);
        let release: ReleaseHook = Arc::new(move |_| {
            outstanding.fetch_sub(1, Ordering::SeqCst);
        });
        NativeArray::with_release(items, release)
    }
}

// ========================================
// storage
// ========================================

enum Content {
    Blob(Vec<u8>),
    Integer(i64),
    Deque(VecDeque<Vec<u8>>),
    HSet(HashSet<Vec<u8>>),
    Tag,
    TimeSeries(Vec<StoredColumn>),
}

impl Content {
    fn entry_type(&self) -> EntryType {
        match self {
            Content::Blob(_) => EntryType::Blob,
            Content::Integer(_) => EntryType::Integer,
            Content::Deque(_) => EntryType::Deque,
            Content::HSet(_) => EntryType::HSet,
            Content::Tag => EntryType::Tag,
            Content::TimeSeries(_) => EntryType::TimeSeries,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Content::Blob(bytes) => bytes.len() as u64,
            Content::Integer(_) => 8,
            Content::Deque(items) => items.len() as u64,
            Content::HSet(items) => items.len() as u64,
            Content::Tag => 0,
            Content::TimeSeries(columns) => columns.len() as u64,
        }
    }

    fn supports_expiry(&self) -> bool {
        matches!(self, Content::Blob(_) | Content::Integer(_))
    }
}

struct StoredColumn {
    info: ColumnInfo,
    /// timestamp 順。同じ timestamp は挿入順
    points: Vec<Point>,
}

impl StoredColumn {
    fn accepts(&self, value: &PointValue) -> bool {
        match self.info.column_type {
            ColumnType::Symbol => value.column_type() == ColumnType::String,
            t => value.column_type() == t,
        }
    }

    fn in_ranges<'a>(&'a self, ranges: &'a [TsRange]) -> impl Iterator<Item = &'a Point> + 'a {
        ranges
            .iter()
            .flat_map(move |r| self.points.iter().filter(move |p| r.contains(p.timestamp)))
    }
}

struct StoredEntry {
    content: Content,
    tags: BTreeSet<String>,
    expiry: Option<DateTime<Utc>>,
    modified: DateTime<Utc>,
    reference: EntryReference,
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, StoredEntry>,
    next_reference: u64,
}

impl Store {
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries
            .retain(|_, e| e.expiry.is_none_or(|at| at > now));
    }

    fn live(&mut self, alias: &str, now: DateTime<Utc>) -> Result<&mut StoredEntry, ErrorCode> {
        if self
            .entries
            .get(alias)
            .and_then(|e| e.expiry)
            .is_some_and(|at| at <= now)
        {
            self.entries.remove(alias);
        }
        self.entries.get_mut(alias).ok_or(ErrorCode::ALIAS_NOT_FOUND)
    }

    fn exists(&mut self, alias: &str, now: DateTime<Utc>) -> bool {
        self.live(alias, now).is_ok()
    }

    fn create(
        &mut self,
        alias: &str,
        content: Content,
        now: DateTime<Utc>,
    ) -> Result<&mut StoredEntry, ErrorCode> {
        if self.exists(alias, now) {
            return Err(ErrorCode::ALIAS_ALREADY_EXISTS);
        }
        self.next_reference += 1;
        let mut hasher = DefaultHasher::new();
        alias.hash(&mut hasher);
        let reference = EntryReference([self.next_reference, hasher.finish(), 0, 0]);
        let entry = self.entries.entry(alias.to_string()).or_insert(StoredEntry {
            content,
            tags: BTreeSet::new(),
            expiry: None,
            modified: now,
            reference,
        });
        Ok(entry)
    }

    fn ensure_tag(&mut self, tag: &str, now: DateTime<Utc>) -> Result<(), ErrorCode> {
        match self.live(tag, now) {
            Ok(entry) if matches!(entry.content, Content::Tag) => Ok(()),
            Ok(_) => Err(ErrorCode::INCOMPATIBLE_TYPE),
            Err(_) => self.create(tag, Content::Tag, now).map(|_| ()),
        }
    }

    fn series(&mut self, alias: &str, now: DateTime<Utc>) -> Result<&mut Vec<StoredColumn>, ErrorCode> {
        match &mut self.live(alias, now)?.content {
            Content::TimeSeries(columns) => Ok(columns),
            _ => Err(ErrorCode::INCOMPATIBLE_TYPE),
        }
    }

    fn column(
        &mut self,
        alias: &str,
        column: &str,
        column_type: Option<ColumnType>,
        now: DateTime<Utc>,
    ) -> Result<&mut StoredColumn, ErrorCode> {
        let stored = self
            .series(alias, now)?
            .iter_mut()
            .find(|c| c.info.name == column)
            .ok_or(ErrorCode::COLUMN_NOT_FOUND)?;
        match column_type {
            Some(t) if t != stored.info.column_type => Err(ErrorCode::INCOMPATIBLE_TYPE),
            _ => Ok(stored),
        }
    }

    fn aliases_where(&self, pred: impl Fn(&str, &StoredEntry) -> bool) -> Vec<String> {
        let mut found: Vec<String> = self
            .entries
            .iter()
            .filter(|&(alias, e)| pred(alias.as_str(), e))
            .map(|(alias, _)| alias.clone())
            .collect();
        found.sort();
        found
    }
}

fn expiry_deadline(expiry: Expiry, current: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match expiry {
        Expiry::Never => None,
        Expiry::Preserve => current,
        Expiry::At(at) => Some(at),
    }
}

fn status(result: Result<(), ErrorCode>) -> ErrorCode {
    match result {
        Ok(()) => ErrorCode::OK,
        Err(code) => code,
    }
}

// ========================================
// session
// ========================================

struct InMemorySession {
    state: Arc<ClusterState>,
}

impl InMemorySession {
    fn with_store<T>(
        &self,
        f: impl FnOnce(&mut Store, DateTime<Utc>) -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        self.state.enter()?;
        let now = self.state.clock.now();
        let mut store = self.state.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *store, now)
    }

    fn buffer(&self, result: Result<Vec<u8>, ErrorCode>) -> Result<NativeBuffer, ErrorCode> {
        result.map(|bytes| self.state.alloc(bytes))
    }

    fn strings(&self, result: Result<Vec<String>, ErrorCode>) -> Result<NativeArray<String>, ErrorCode> {
        result.map(|items| self.state.alloc(items))
    }

    fn deque_pop(&self, alias: &str, front: bool, remove: bool) -> Result<NativeBuffer, ErrorCode> {
        self.buffer(self.with_store(|store, now| {
            let Content::Deque(items) = &mut store.live(alias, now)?.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            let item = match (front, remove) {
                (true, true) => items.pop_front(),
                (false, true) => items.pop_back(),
                (true, false) => items.front().cloned(),
                (false, false) => items.back().cloned(),
            };
            item.ok_or(ErrorCode::CONTAINER_EMPTY)
        }))
    }

    fn deque_push(&self, alias: &str, content: &[u8], front: bool) -> ErrorCode {
        status(self.with_store(|store, now| {
            if !store.exists(alias, now) {
                store.create(alias, Content::Deque(VecDeque::new()), now)?;
            }
            let entry = store.live(alias, now)?;
            let Content::Deque(items) = &mut entry.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            if front {
                items.push_front(content.to_vec());
            } else {
                items.push_back(content.to_vec());
            }
            entry.modified = now;
            Ok(())
        }))
    }

    fn search(&self, max_count: i64, pred: impl Fn(&str) -> bool) -> Result<NativeArray<String>, ErrorCode> {
        self.scan(max_count, |alias, e| !matches!(e.content, Content::Tag) && pred(alias))
    }

    /// blob の中身で検索する
    fn scan_blobs(&self, max_count: i64, pred: impl Fn(&[u8]) -> bool) -> Result<NativeArray<String>, ErrorCode> {
        self.scan(max_count, |_, e| matches!(&e.content, Content::Blob(bytes) if pred(bytes)))
    }

    /// 条件に合う alias を名前順で最大 `max_count` 件。一件もなければ `ALIAS_NOT_FOUND`
    fn scan(
        &self,
        max_count: i64,
        pred: impl Fn(&str, &StoredEntry) -> bool,
    ) -> Result<NativeArray<String>, ErrorCode> {
        if max_count <= 0 {
            return Err(ErrorCode::INVALID_ARGUMENT);
        }
        self.strings(self.with_store(|store, now| {
            store.purge_expired(now);
            let mut found = store.aliases_where(pred);
            if found.is_empty() {
                return Err(ErrorCode::ALIAS_NOT_FOUND);
            }
            found.truncate(max_count as usize);
            Ok(found)
        }))
    }

    fn put_value(&self, alias: &str, content: Content, expiry: Expiry) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.create(alias, content, now)?;
            entry.expiry = expiry_deadline(expiry, None);
            Ok(())
        }))
    }

    /// 既存の値だけを置き換える。なければ `ALIAS_NOT_FOUND`
    fn update_value(&self, alias: &str, content: Content, expiry: Expiry) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            if entry.content.entry_type() != content.entry_type() {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            }
            entry.content = content;
            entry.expiry = expiry_deadline(expiry, entry.expiry);
            entry.modified = now;
            Ok(())
        }))
    }
}

impl NativeSession for InMemorySession {
    fn set_timeout(&self, timeout_ms: u32) -> ErrorCode {
        if timeout_ms < 1000 {
            return ErrorCode::INVALID_ARGUMENT;
        }
        self.state.applied_timeout_ms.store(timeout_ms, Ordering::SeqCst);
        ErrorCode::OK
    }

    fn remove(&self, alias: &str) -> ErrorCode {
        status(self.with_store(|store, now| {
            store.live(alias, now)?;
            store.entries.remove(alias);
            Ok(())
        }))
    }

    fn attach_tag(&self, alias: &str, tag: &str) -> ErrorCode {
        status(self.with_store(|store, now| {
            store.live(alias, now)?;
            store.ensure_tag(tag, now)?;
            let entry = store.live(alias, now)?;
            if entry.tags.insert(tag.to_string()) {
                Ok(())
            } else {
                Err(ErrorCode::TAG_ALREADY_SET)
            }
        }))
    }

    fn attach_tags(&self, alias: &str, tags: &[String]) -> ErrorCode {
        status(self.with_store(|store, now| {
            store.live(alias, now)?;
            for tag in tags {
                store.ensure_tag(tag, now)?;
            }
            let entry = store.live(alias, now)?;
            let added = tags.iter().filter(|t| entry.tags.insert((*t).clone())).count();
            if added == 0 && !tags.is_empty() {
                Err(ErrorCode::TAG_ALREADY_SET)
            } else {
                Ok(())
            }
        }))
    }

    fn detach_tag(&self, alias: &str, tag: &str) -> ErrorCode {
        status(self.with_store(|store, now| {
            if store.live(alias, now)?.tags.remove(tag) {
                Ok(())
            } else {
                Err(ErrorCode::TAG_NOT_SET)
            }
        }))
    }

    fn detach_tags(&self, alias: &str, tags: &[String]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            let removed = tags.iter().filter(|t| entry.tags.remove(t.as_str())).count();
            if removed == 0 && !tags.is_empty() {
                Err(ErrorCode::TAG_NOT_SET)
            } else {
                Ok(())
            }
        }))
    }

    fn has_tag(&self, alias: &str, tag: &str) -> ErrorCode {
        status(self.with_store(|store, now| {
            if store.live(alias, now)?.tags.contains(tag) {
                Ok(())
            } else {
                Err(ErrorCode::TAG_NOT_SET)
            }
        }))
    }

    fn get_tags(&self, alias: &str) -> Result<NativeArray<String>, ErrorCode> {
        self.strings(self.with_store(|store, now| {
            Ok(store.live(alias, now)?.tags.iter().cloned().collect())
        }))
    }

    fn get_metadata(&self, alias: &str) -> Result<EntryMetadata, ErrorCode> {
        self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            Ok(EntryMetadata {
                reference: entry.reference,
                entry_type: entry.content.entry_type(),
                size: entry.content.size(),
                modification_time: Timespec::from(entry.modified),
                expiry_time: entry.expiry.map(Timespec::from),
            })
        })
    }

    fn get_type(&self, alias: &str) -> Result<EntryType, ErrorCode> {
        self.with_store(|store, now| Ok(store.live(alias, now)?.content.entry_type()))
    }

    fn expires_at(&self, alias: &str, expiry: Expiry) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            if !entry.content.supports_expiry() {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            }
            entry.expiry = expiry_deadline(expiry, entry.expiry);
            Ok(())
        }))
    }

    fn expires_from_now(&self, alias: &str, delta_secs: i64) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            if !entry.content.supports_expiry() {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            }
            // chrono の範囲外は入力エラー
            let deadline = TimeDelta::try_seconds(delta_secs)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or(ErrorCode::INVALID_ARGUMENT)?;
            entry.expiry = Some(deadline);
            Ok(())
        }))
    }

    fn get_expiry(&self, alias: &str) -> Result<Option<Timespec>, ErrorCode> {
        self.with_store(|store, now| Ok(store.live(alias, now)?.expiry.map(Timespec::from)))
    }

    fn blob_put(&self, alias: &str, content: &[u8], expiry: Expiry) -> ErrorCode {
        self.put_value(alias, Content::Blob(content.to_vec()), expiry)
    }

    fn blob_update(&self, alias: &str, content: &[u8], expiry: Expiry) -> ErrorCode {
        self.update_value(alias, Content::Blob(content.to_vec()), expiry)
    }

    fn blob_get(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.buffer(self.with_store(|store, now| match &store.live(alias, now)?.content {
            Content::Blob(bytes) => Ok(bytes.clone()),
            _ => Err(ErrorCode::INCOMPATIBLE_TYPE),
        }))
    }

    fn blob_get_and_remove(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.buffer(self.with_store(|store, now| {
            if !matches!(store.live(alias, now)?.content, Content::Blob(_)) {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            }
            match store.entries.remove(alias).map(|e| e.content) {
                Some(Content::Blob(bytes)) => Ok(bytes),
                _ => Err(ErrorCode::INTERNAL_REMOTE),
            }
        }))
    }

    fn int_put(&self, alias: &str, value: i64, expiry: Expiry) -> ErrorCode {
        self.put_value(alias, Content::Integer(value), expiry)
    }

    fn int_update(&self, alias: &str, value: i64, expiry: Expiry) -> ErrorCode {
        self.update_value(alias, Content::Integer(value), expiry)
    }

    fn int_get(&self, alias: &str) -> Result<i64, ErrorCode> {
        self.with_store(|store, now| match store.live(alias, now)?.content {
            Content::Integer(v) => Ok(v),
            _ => Err(ErrorCode::INCOMPATIBLE_TYPE),
        })
    }

    fn int_add(&self, alias: &str, addend: i64) -> Result<i64, ErrorCode> {
        self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            let Content::Integer(v) = &mut entry.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            *v = v.checked_add(addend).ok_or(if addend > 0 {
                ErrorCode::OVERFLOW
            } else {
                ErrorCode::UNDERFLOW
            })?;
            entry.modified = now;
            Ok(*v)
        })
    }

    fn deque_push_front(&self, alias: &str, content: &[u8]) -> ErrorCode {
        self.deque_push(alias, content, true)
    }

    fn deque_push_back(&self, alias: &str, content: &[u8]) -> ErrorCode {
        self.deque_push(alias, content, false)
    }

    fn deque_pop_front(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.deque_pop(alias, true, true)
    }

    fn deque_pop_back(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.deque_pop(alias, false, true)
    }

    fn deque_front(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.deque_pop(alias, true, false)
    }

    fn deque_back(&self, alias: &str) -> Result<NativeBuffer, ErrorCode> {
        self.deque_pop(alias, false, false)
    }

    fn deque_size(&self, alias: &str) -> Result<u64, ErrorCode> {
        self.with_store(|store, now| match &store.live(alias, now)?.content {
            Content::Deque(items) => Ok(items.len() as u64),
            _ => Err(ErrorCode::INCOMPATIBLE_TYPE),
        })
    }

    fn deque_get_at(&self, alias: &str, index: i64) -> Result<NativeBuffer, ErrorCode> {
        self.buffer(self.with_store(|store, now| {
            let Content::Deque(items) = &store.live(alias, now)?.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(ErrorCode::OUT_OF_BOUNDS)
        }))
    }

    fn deque_set_at(&self, alias: &str, index: i64, content: &[u8]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let entry = store.live(alias, now)?;
            let Content::Deque(items) = &mut entry.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or(ErrorCode::OUT_OF_BOUNDS)?;
            *slot = content.to_vec();
            entry.modified = now;
            Ok(())
        }))
    }

    fn hset_insert(&self, alias: &str, content: &[u8]) -> ErrorCode {
        status(self.with_store(|store, now| {
            if !store.exists(alias, now) {
                store.create(alias, Content::HSet(HashSet::new()), now)?;
            }
            let Content::HSet(items) = &mut store.live(alias, now)?.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            if items.insert(content.to_vec()) {
                Ok(())
            } else {
                Err(ErrorCode::ELEMENT_ALREADY_EXISTS)
            }
        }))
    }

    fn hset_erase(&self, alias: &str, content: &[u8]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let Content::HSet(items) = &mut store.live(alias, now)?.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            if items.remove(content) {
                Ok(())
            } else {
                Err(ErrorCode::ELEMENT_NOT_FOUND)
            }
        }))
    }

    fn hset_contains(&self, alias: &str, content: &[u8]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let Content::HSet(items) = &store.live(alias, now)?.content else {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            };
            if items.contains(content) {
                Ok(())
            } else {
                Err(ErrorCode::ELEMENT_NOT_FOUND)
            }
        }))
    }

    fn tag_entries(&self, tag: &str) -> Result<NativeArray<String>, ErrorCode> {
        self.strings(self.with_store(|store, now| {
            store.purge_expired(now);
            Ok(store.aliases_where(|_, e| e.tags.contains(tag)))
        }))
    }

    fn prefix_entries(&self, prefix: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode> {
        self.search(max_count, |alias| alias.starts_with(prefix))
    }

    fn suffix_entries(&self, suffix: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode> {
        self.search(max_count, |alias| alias.ends_with(suffix))
    }

    fn blob_scan(&self, pattern: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode> {
        let needle = pattern.as_bytes();
        self.scan_blobs(max_count, |bytes| {
            needle.is_empty() || bytes.windows(needle.len()).any(|w| w == needle)
        })
    }

    fn blob_scan_regex(&self, pattern: &str, max_count: i64) -> Result<NativeArray<String>, ErrorCode> {
        let re = Regex::new(pattern).map_err(|_| ErrorCode::INVALID_ARGUMENT)?;
        self.scan_blobs(max_count, |bytes| re.is_match(bytes))
    }

    fn ts_create(&self, alias: &str, columns: &[ColumnInfo]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let mut seen = HashSet::new();
            if !columns.iter().all(|c| seen.insert(c.name.as_str())) {
                return Err(ErrorCode::INVALID_ARGUMENT);
            }
            let stored = columns
                .iter()
                .map(|info| StoredColumn {
                    info: info.clone(),
                    points: Vec::new(),
                })
                .collect();
            store.create(alias, Content::TimeSeries(stored), now).map(|_| ())
        }))
    }

    fn ts_insert_columns(&self, alias: &str, columns: &[ColumnInfo]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let existing = store.series(alias, now)?;
            if columns
                .iter()
                .any(|c| existing.iter().any(|e| e.info.name == c.name))
            {
                return Err(ErrorCode::ELEMENT_ALREADY_EXISTS);
            }
            existing.extend(columns.iter().map(|info| StoredColumn {
                info: info.clone(),
                points: Vec::new(),
            }));
            Ok(())
        }))
    }

    fn ts_list_columns(&self, alias: &str) -> Result<NativeArray<ColumnInfo>, ErrorCode> {
        let infos = self.with_store(|store, now| {
            Ok(store.series(alias, now)?.iter().map(|c| c.info.clone()).collect())
        })?;
        Ok(self.state.alloc(infos))
    }

    fn ts_insert(&self, alias: &str, column: &str, points: &[Point]) -> ErrorCode {
        status(self.with_store(|store, now| {
            let stored = store.column(alias, column, None, now)?;
            if !points.iter().all(|p| stored.accepts(&p.value)) {
                return Err(ErrorCode::INCOMPATIBLE_TYPE);
            }
            for point in points {
                let at = stored.points.partition_point(|p| p.timestamp <= point.timestamp);
                stored.points.insert(at, point.clone());
            }
            Ok(())
        }))
    }

    fn ts_get_ranges(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        ranges: &[TsRange],
    ) -> Result<NativeArray<Point>, ErrorCode> {
        let points = self.with_store(|store, now| {
            let stored = store.column(alias, column, Some(column_type), now)?;
            Ok(stored.in_ranges(ranges).cloned().collect())
        })?;
        Ok(self.state.alloc(points))
    }

    fn ts_aggregate(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        aggregations: &[Aggregation],
    ) -> Result<Vec<AggregationResult>, ErrorCode> {
        self.with_store(|store, now| {
            let stored = store.column(alias, column, Some(column_type), now)?;
            aggregations
                .iter()
                .map(|agg| {
                    let points: Vec<&Point> = stored.in_ranges(std::slice::from_ref(&agg.range)).collect();
                    aggregate(agg, &points)
                })
                .collect()
        })
    }

    fn ts_erase_ranges(
        &self,
        alias: &str,
        column: &str,
        column_type: ColumnType,
        ranges: &[TsRange],
    ) -> Result<u64, ErrorCode> {
        self.with_store(|store, now| {
            let stored = store.column(alias, column, Some(column_type), now)?;
            let before = stored.points.len();
            stored
                .points
                .retain(|p| !ranges.iter().any(|r| r.contains(p.timestamp)));
            Ok((before - stored.points.len()) as u64)
        })
    }

    fn query(&self, text: &str) -> Result<QueryResult, ErrorCode> {
        let table = parse_select(text)?;
        self.with_store(|store, now| {
            let columns = store.series(&table, now)?;
            let mut timestamps: Vec<Timespec> = columns
                .iter()
                .flat_map(|c| c.points.iter().map(|p| p.timestamp))
                .collect();
            timestamps.sort();
            timestamps.dedup();

            let rows = timestamps
                .iter()
                .map(|ts| {
                    let mut row = vec![QueryCell::Timestamp(*ts)];
                    row.extend(columns.iter().map(|c| {
                        c.points
                            .iter()
                            .find(|p| p.timestamp == *ts)
                            .map(|p| cell(&p.value))
                            .unwrap_or(QueryCell::Empty)
                    }));
                    row
                })
                .collect();

            let mut names = vec!["$timestamp".to_string()];
            names.extend(columns.iter().map(|c| c.info.name.clone()));
            let scanned = columns.iter().map(|c| c.points.len() as u64).sum();

            Ok(QueryResult {
                tables: vec![QueryTable {
                    name: table.clone(),
                    columns: names,
                    rows,
                }],
                scanned_point_count: scanned,
                error_message: None,
            })
        })
    }

    fn query_find(&self, text: &str) -> Result<NativeArray<String>, ErrorCode> {
        let filter = parse_find(text)?;
        self.strings(self.with_store(|store, now| {
            store.purge_expired(now);
            Ok(store.aliases_where(|_, e| {
                filter.tags.iter().all(|t| e.tags.contains(t))
                    && filter.entry_type.is_none_or(|t| t == e.content.entry_type())
            }))
        }))
    }
}

fn cell(value: &PointValue) -> QueryCell {
    match value {
        PointValue::Double(v) => QueryCell::Double(*v),
        PointValue::Blob(b) => QueryCell::Blob(b.clone()),
        PointValue::Int64(v) => QueryCell::Int64(*v),
        PointValue::Timestamp(ts) => QueryCell::Timestamp(*ts),
        PointValue::String(s) => QueryCell::String(s.clone()),
    }
}

// ========================================
// aggregation
// ========================================

fn aggregate(agg: &Aggregation, points: &[&Point]) -> Result<AggregationResult, ErrorCode> {
    let count = points.len() as u64;
    let numeric: Option<Vec<f64>> = points.iter().map(|p| p.value.as_f64()).collect();
    if numeric.is_none() && !agg.kind.applies_to_non_numeric() {
        return Err(ErrorCode::INCOMPATIBLE_TYPE);
    }
    let values = numeric.unwrap_or_default();

    let computed = |v: f64| Some(Point::new(agg.range.begin, PointValue::Double(v)));
    let pick = |better: &dyn Fn(f64, f64) -> bool| {
        let mut best: Option<(f64, &Point)> = None;
        for (v, p) in values.iter().zip(points) {
            if best.is_none_or(|(b, _)| better(*v, b)) {
                best = Some((*v, *p));
            }
        }
        best.map(|(_, p)| p.clone())
    };

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let central = |k: i32| values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / n;

    let result = if points.is_empty() {
        None
    } else {
        match agg.kind {
            AggregationType::First => points.first().map(|p| (*p).clone()),
            AggregationType::Last => points.last().map(|p| (*p).clone()),
            AggregationType::Count => Some(Point::new(agg.range.begin, PointValue::Int64(count as i64))),
            AggregationType::Min => pick(&|v, b| v < b),
            AggregationType::Max => pick(&|v, b| v > b),
            AggregationType::AbsMin => pick(&|v, b| v.abs() < b.abs()),
            AggregationType::AbsMax => pick(&|v, b| v.abs() > b.abs()),
            AggregationType::ArithmeticMean => computed(mean),
            AggregationType::HarmonicMean => computed(n / values.iter().map(|v| 1.0 / v).sum::<f64>()),
            AggregationType::GeometricMean => computed((values.iter().map(|v| v.ln()).sum::<f64>() / n).exp()),
            AggregationType::QuadraticMean => computed((values.iter().map(|v| v * v).sum::<f64>() / n).sqrt()),
            AggregationType::Sum => computed(values.iter().sum()),
            AggregationType::SumOfSquares => computed(values.iter().map(|v| v * v).sum()),
            AggregationType::Product => computed(values.iter().product()),
            AggregationType::Spread => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                computed(max - min)
            }
            AggregationType::PopulationVariance => computed(central(2)),
            AggregationType::PopulationStddev => computed(central(2).sqrt()),
            AggregationType::SampleVariance | AggregationType::SampleStddev if values.len() < 2 => None,
            AggregationType::SampleVariance => computed(central(2) * n / (n - 1.0)),
            AggregationType::SampleStddev => computed((central(2) * n / (n - 1.0)).sqrt()),
            AggregationType::Skewness => computed(central(3) / central(2).powf(1.5)),
            // non-excess
            AggregationType::Kurtosis => computed(central(4) / central(2).powi(2)),
        }
    };

    Ok(AggregationResult {
        kind: agg.kind,
        range: agg.range,
        count,
        result,
    })
}

// ========================================
// query parsing
// ========================================

/// `select * from <table>` だけを受け付ける
fn parse_select(text: &str) -> Result<String, ErrorCode> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [select, "*", from, table]
            if select.eq_ignore_ascii_case("select") && from.eq_ignore_ascii_case("from") =>
        {
            Ok((*table).to_string())
        }
        _ => Err(ErrorCode::INVALID_QUERY),
    }
}

struct FindFilter {
    tags: Vec<String>,
    entry_type: Option<EntryType>,
}

/// `find(tag='a' AND type=blob ...)`
fn parse_find(text: &str) -> Result<FindFilter, ErrorCode> {
    let text = text.trim();
    let inner = text
        .get(..5)
        .filter(|head| head.eq_ignore_ascii_case("find("))
        .and_then(|_| text[5..].strip_suffix(')'))
        .ok_or(ErrorCode::INVALID_QUERY)?;

    let mut filter = FindFilter {
        tags: Vec::new(),
        entry_type: None,
    };
    for clause in inner.split(" AND ").flat_map(|s| s.split(" and ")) {
        let (key, value) = clause.split_once('=').ok_or(ErrorCode::INVALID_QUERY)?;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "tag" => {
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or(ErrorCode::INVALID_QUERY)?;
                filter.tags.push(unquoted.to_string());
            }
            "type" => {
                filter.entry_type = Some(match value.to_ascii_lowercase().as_str() {
                    "blob" => EntryType::Blob,
                    "integer" | "int" => EntryType::Integer,
                    "deque" => EntryType::Deque,
                    "hset" => EntryType::HSet,
                    "ts" => EntryType::TimeSeries,
                    _ => return Err(ErrorCode::INVALID_QUERY),
                });
            }
            _ => return Err(ErrorCode::INVALID_QUERY),
        }
    }
    if filter.tags.is_empty() {
        return Err(ErrorCode::INVALID_QUERY);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    const URI: &str = "qdb://127.0.0.1:2836";

    fn session() -> (InMemoryCluster, Arc<dyn NativeSession>) {
        let cluster = InMemoryCluster::new(URI);
        let session = cluster.open(URI, None).unwrap();
        (cluster, session)
    }

    fn ts(ms: i64) -> Timespec {
        Timespec::from_millis(ms)
    }

    #[test]
    fn open_refuses_unknown_uri() {
        let cluster = InMemoryCluster::new(URI);
        assert_eq!(
            cluster.open("qdb://10.0.0.1:2836", None).err(),
            Some(ErrorCode::CONNECTION_REFUSED)
        );
        cluster.refuse_connections(true);
        assert!(cluster.open(URI, None).is_err());
        assert_eq!(cluster.opened_sessions(), 0);
    }

    #[test]
    fn secured_cluster_checks_credentials() {
        let creds = Credentials {
            cluster_public_key: "PK".into(),
            user_name: "alice".into(),
            user_private_key: "SK".into(),
        };
        let cluster = InMemoryCluster::new(URI).require_credentials(creds.clone());
        assert_eq!(cluster.open(URI, None).err(), Some(ErrorCode::INVALID_CREDENTIALS));
        assert!(cluster.open(URI, Some(&creds)).is_ok());
    }

    #[test]
    fn blob_put_get_update() {
        let (cluster, s) = session();
        assert_eq!(s.blob_put("b", b"one", Expiry::Never), ErrorCode::OK);
        assert_eq!(s.blob_put("b", b"two", Expiry::Never), ErrorCode::ALIAS_ALREADY_EXISTS);
        assert_eq!(s.blob_update("b", b"two", Expiry::Never), ErrorCode::OK);
        assert_eq!(s.blob_update("c", b"new", Expiry::Never), ErrorCode::ALIAS_NOT_FOUND);

        let got = s.blob_get("b").unwrap();
        assert_eq!(&got[..], b"two");
        assert_eq!(cluster.outstanding_allocations(), 1);
        drop(got);
        assert_eq!(cluster.outstanding_allocations(), 0);

        assert_eq!(s.blob_get("missing").err(), Some(ErrorCode::ALIAS_NOT_FOUND));
    }

    #[test]
    fn get_and_remove_deletes_blob() {
        let (_cluster, s) = session();
        s.blob_put("b", b"x", Expiry::Never);
        assert_eq!(&s.blob_get_and_remove("b").unwrap()[..], b"x");
        assert_eq!(s.get_type("b").err(), Some(ErrorCode::ALIAS_NOT_FOUND));
    }

    #[test]
    fn entries_expire_by_clock() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cluster = InMemoryCluster::with_clock(URI, clock.clone());
        let s = cluster.open(URI, None).unwrap();

        s.int_put("i", 1, Expiry::At(start + chrono::Duration::seconds(10)));
        assert_eq!(s.get_expiry("i").unwrap(), Some(Timespec::from(start + chrono::Duration::seconds(10))));
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(s.int_get("i").err(), Some(ErrorCode::ALIAS_NOT_FOUND));
    }

    #[test]
    fn integer_add_detects_overflow() {
        let (_cluster, s) = session();
        s.int_put("i", i64::MAX - 1, Expiry::Never);
        assert_eq!(s.int_add("i", 1), Ok(i64::MAX));
        assert_eq!(s.int_add("i", 1), Err(ErrorCode::OVERFLOW));
    }

    #[test]
    fn tags_attach_detach_and_lookup() {
        let (_cluster, s) = session();
        s.blob_put("b", b"x", Expiry::Never);
        assert_eq!(s.attach_tag("b", "t"), ErrorCode::OK);
        assert_eq!(s.attach_tag("b", "t"), ErrorCode::TAG_ALREADY_SET);
        assert_eq!(s.has_tag("b", "t"), ErrorCode::OK);
        assert_eq!(s.has_tag("b", "u"), ErrorCode::TAG_NOT_SET);
        assert_eq!(&s.tag_entries("t").unwrap()[..], ["b".to_string()]);
        assert_eq!(s.get_type("t"), Ok(EntryType::Tag));
        assert_eq!(s.detach_tag("b", "t"), ErrorCode::OK);
        assert_eq!(s.detach_tag("b", "t"), ErrorCode::TAG_NOT_SET);
        assert!(s.tag_entries("t").unwrap().is_empty());
    }

    #[test]
    fn deque_operations() {
        let (_cluster, s) = session();
        assert_eq!(s.deque_pop_front("q").err(), Some(ErrorCode::ALIAS_NOT_FOUND));
        s.deque_push_back("q", b"b");
        s.deque_push_front("q", b"a");
        assert_eq!(s.deque_size("q"), Ok(2));
        assert_eq!(&s.deque_get_at("q", 1).unwrap()[..], b"b");
        assert_eq!(s.deque_get_at("q", 2).err(), Some(ErrorCode::OUT_OF_BOUNDS));
        assert_eq!(s.deque_set_at("q", 0, b"z"), ErrorCode::OK);
        assert_eq!(&s.deque_pop_front("q").unwrap()[..], b"z");
        assert_eq!(&s.deque_pop_back("q").unwrap()[..], b"b");
        assert_eq!(s.deque_front("q").err(), Some(ErrorCode::CONTAINER_EMPTY));
    }

    #[test]
    fn hset_membership() {
        let (_cluster, s) = session();
        assert_eq!(s.hset_insert("h", b"a"), ErrorCode::OK);
        assert_eq!(s.hset_insert("h", b"a"), ErrorCode::ELEMENT_ALREADY_EXISTS);
        assert_eq!(s.hset_contains("h", b"a"), ErrorCode::OK);
        assert_eq!(s.hset_erase("h", b"a"), ErrorCode::OK);
        assert_eq!(s.hset_contains("h", b"a"), ErrorCode::ELEMENT_NOT_FOUND);
    }

    #[test]
    fn prefix_search_truncates_and_reports_missing() {
        let (_cluster, s) = session();
        for alias in ["pre_a", "pre_b", "pre_c", "other"] {
            s.blob_put(alias, b"x", Expiry::Never);
        }
        assert_eq!(s.prefix_entries("pre_", 2).unwrap().len(), 2);
        assert_eq!(s.prefix_entries("nope", 10).err(), Some(ErrorCode::ALIAS_NOT_FOUND));
        assert_eq!(s.suffix_entries("_c", 10).unwrap()[..], ["pre_c".to_string()]);
        assert_eq!(s.prefix_entries("pre_", 0).err(), Some(ErrorCode::INVALID_ARGUMENT));
    }

    #[test]
    fn time_series_insert_range_aggregate_erase() {
        let (_cluster, s) = session();
        let cols = [ColumnInfo::new("d", ColumnType::Double), ColumnInfo::new("b", ColumnType::Blob)];
        assert_eq!(s.ts_create("ts", &cols), ErrorCode::OK);
        assert_eq!(s.ts_create("ts", &cols), ErrorCode::ALIAS_ALREADY_EXISTS);

        let points = [
            Point::new(ts(3000), PointValue::Double(3.0)),
            Point::new(ts(1000), PointValue::Double(1.0)),
            Point::new(ts(2000), PointValue::Double(2.0)),
        ];
        assert_eq!(s.ts_insert("ts", "d", &points), ErrorCode::OK);
        assert_eq!(
            s.ts_insert("ts", "d", &[Point::new(ts(1), PointValue::Int64(1))]),
            ErrorCode::INCOMPATIBLE_TYPE
        );
        assert_eq!(s.ts_insert("ts", "zz", &points), ErrorCode::COLUMN_NOT_FOUND);

        let range = TsRange::new(ts(1000), ts(3000));
        let got = s.ts_get_ranges("ts", "d", ColumnType::Double, &[range]).unwrap();
        assert_eq!(got.iter().map(|p| p.timestamp).collect::<Vec<_>>(), vec![ts(1000), ts(2000)]);
        assert_eq!(
            s.ts_get_ranges("ts", "d", ColumnType::Blob, &[range]).err(),
            Some(ErrorCode::INCOMPATIBLE_TYPE)
        );

        let aggs = [
            Aggregation { kind: AggregationType::Sum, range },
            Aggregation { kind: AggregationType::Max, range },
            Aggregation { kind: AggregationType::Count, range: TsRange::new(ts(0), ts(1)) },
        ];
        let results = s.ts_aggregate("ts", "d", ColumnType::Double, &aggs).unwrap();
        assert_eq!(results[0].result.as_ref().map(|p| p.value.clone()), Some(PointValue::Double(3.0)));
        assert_eq!(results[1].result.as_ref().map(|p| p.timestamp), Some(ts(2000)));
        assert_eq!(results[2].count, 0);
        assert_eq!(results[2].result, None);

        let blob_sum = [Aggregation { kind: AggregationType::Sum, range }];
        s.ts_insert("ts", "b", &[Point::new(ts(1000), PointValue::Blob(b"x".to_vec()))]);
        assert_eq!(
            s.ts_aggregate("ts", "b", ColumnType::Blob, &blob_sum).err(),
            Some(ErrorCode::INCOMPATIBLE_TYPE)
        );

        assert_eq!(s.ts_erase_ranges("ts", "d", ColumnType::Double, &[range]), Ok(2));
        assert_eq!(s.ts_list_columns("ts").unwrap().len(), 2);
    }

    #[test]
    fn select_query_joins_columns_by_timestamp() {
        let (_cluster, s) = session();
        s.ts_create("t", &[ColumnInfo::new("d", ColumnType::Double), ColumnInfo::new("i", ColumnType::Int64)]);
        s.ts_insert("t", "d", &[Point::new(ts(1000), PointValue::Double(0.5))]);
        s.ts_insert("t", "i", &[Point::new(ts(1000), PointValue::Int64(4)), Point::new(ts(2000), PointValue::Int64(5))]);

        let result = s.query("select * from t").unwrap();
        assert_eq!(result.scanned_point_count, 3);
        let table = &result.tables[0];
        assert_eq!(table.columns, vec!["$timestamp", "d", "i"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1][1], QueryCell::Empty);
        assert_eq!(s.query("drop everything").err(), Some(ErrorCode::INVALID_QUERY));
    }

    #[test]
    fn find_query_filters_by_tag_and_type() {
        let (_cluster, s) = session();
        s.blob_put("b", b"x", Expiry::Never);
        s.int_put("i", 1, Expiry::Never);
        s.attach_tags("b", &["t1".into(), "t2".into()]);
        s.attach_tag("i", "t1");

        assert_eq!(s.query_find("find(tag='t1')").unwrap().len(), 2);
        assert_eq!(&s.query_find("find(tag='t1' AND type=blob)").unwrap()[..], ["b".to_string()]);
        assert_eq!(&s.query_find("find(tag='t1' and tag='t2')").unwrap()[..], ["b".to_string()]);
        assert!(s.query_find("find(tag='t2' AND type=integer)").unwrap().is_empty());
        assert_eq!(s.query_find("sdljdflsdkjf").err(), Some(ErrorCode::INVALID_QUERY));
    }

    #[test]
    fn expiry_from_now_is_in_seconds_and_bounded() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let cluster = InMemoryCluster::with_clock(URI, clock.clone());
        let s = cluster.open(URI, None).unwrap();

        s.blob_put("b", b"x", Expiry::Never);
        assert_eq!(s.expires_from_now("b", 2), ErrorCode::OK);
        assert_eq!(s.get_expiry("b").unwrap(), Some(Timespec::from(start + chrono::Duration::seconds(2))));
        assert_eq!(s.expires_from_now("b", 9_000_000_000_000_000), ErrorCode::INVALID_ARGUMENT);
        assert_eq!(s.expires_from_now("b", i64::MIN), ErrorCode::INVALID_ARGUMENT);
    }

    #[test]
    fn blob_scan_matches_content() {
        let (_cluster, s) = session();
        for alias in ["range1", "range2", "range3"] {
            s.blob_put(alias, format!("pattern{alias}").as_bytes(), Expiry::Never);
        }
        s.blob_put("other", b"nothing here", Expiry::Never);
        s.int_put("pattern", 1, Expiry::Never);

        assert_eq!(s.blob_scan("pattern", 10).unwrap().len(), 3);
        assert_eq!(s.blob_scan("pattern", 2).unwrap().len(), 2);
        assert_eq!(s.blob_scan("absent", 10).err(), Some(ErrorCode::ALIAS_NOT_FOUND));
        assert_eq!(s.blob_scan_regex("pattern[a-z]*[0-9]+", 10).unwrap().len(), 3);
        assert_eq!(s.blob_scan_regex("^nothing", 10).unwrap()[..], ["other".to_string()]);
        assert_eq!(s.blob_scan_regex("(", 10).err(), Some(ErrorCode::INVALID_ARGUMENT));
        assert_eq!(s.blob_scan("pattern", 0).err(), Some(ErrorCode::INVALID_ARGUMENT));
    }

    #[test]
    fn open_hook_runs_once() {
        let cluster = InMemoryCluster::new(URI);
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&runs);
        cluster.on_next_open(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        cluster.open(URI, None).unwrap();
        cluster.open(URI, None).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn injected_failure_hits_next_call_only() {
        let (cluster, s) = session();
        cluster.fail_next(ErrorCode::TIMEOUT);
        assert_eq!(s.blob_put("b", b"x", Expiry::Never), ErrorCode::TIMEOUT);
        assert_eq!(s.blob_put("b", b"x", Expiry::Never), ErrorCode::OK);
    }

    #[test]
    fn session_timeout_is_recorded() {
        let (cluster, s) = session();
        assert_eq!(cluster.applied_timeout_ms(), None);
        assert_eq!(s.set_timeout(5000), ErrorCode::OK);
        assert_eq!(cluster.applied_timeout_ms(), Some(5000));
    }
}

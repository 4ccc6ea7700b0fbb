//! NativeArray - ネイティブ層が確保した配列の所有権
//!
//! ネイティブ呼び出しが返した配列は、呼び出し元が release するまで
//! ネイティブ側のメモリです。`NativeArray` はその所有権を値として持ち、
//! `Drop` で release hook を一度だけ呼びます。
//!
//! - caller に渡すときは move（コピーしない）
//! - `Clone` は release 責任を持たない owned コピーを作る

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// 解放時に呼ばれる hook。引数は確保時の要素数
pub type ReleaseHook = Arc<dyn Fn(usize) + Send + Sync>;

pub struct NativeArray<T> {
    items: Vec<T>,
    allocated: usize,
    release: Option<ReleaseHook>,
}

/// Bytes handed out by the native layer.
pub type NativeBuffer = NativeArray<u8>;

impl<T> NativeArray<T> {
    /// 解放責任のない配列（caller 側で作ったもの）
    pub fn owned(items: Vec<T>) -> Self {
        let allocated = items.len();
        Self {
            items,
            allocated,
            release: None,
        }
    }

    /// ネイティブ層の確保。drop 時に `release(len)` が呼ばれる
    pub fn with_release(items: Vec<T>, release: ReleaseHook) -> Self {
        let allocated = items.len();
        Self {
            items,
            allocated,
            release: Some(release),
        }
    }

    pub fn empty() -> Self {
        Self::owned(Vec::new())
    }

    /// release hook を持っているか
    pub fn is_native(&self) -> bool {
        self.release.is_some()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// 中身を取り出す。ネイティブ確保分はここで release される
    pub fn into_vec(mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }
}

impl<T> Drop for NativeArray<T> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.allocated);
        }
    }
}

impl<T> Deref for NativeArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T: Clone> Clone for NativeArray<T> {
    fn clone(&self) -> Self {
        Self::owned(self.items.clone())
    }
}

impl<T: PartialEq> PartialEq for NativeArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: fmt::Debug> fmt::Debug for NativeArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeArray")
            .field("items", &self.items)
            .field("native", &self.is_native())
            .finish()
    }
}

impl<T> Default for NativeArray<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for NativeArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self::owned(items)
    }
}

impl From<&[u8]> for NativeBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::owned(bytes.to_vec())
    }
}

impl From<&str> for NativeBuffer {
    fn from(text: &str) -> Self {
        Self::owned(text.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook() -> (ReleaseHook, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&released);
        let hook: ReleaseHook = Arc::new(move |n| {
            seen.fetch_add(n, Ordering::SeqCst);
        });
        (hook, released)
    }

    #[test]
    fn drop_releases_native_allocation_once() {
        let (hook, released) = counting_hook();
        let buf = NativeBuffer::with_release(b"hello".to_vec(), hook);
        assert!(buf.is_native());
        assert_eq!(&buf[..], b"hello");
        drop(buf);
        assert_eq!(released.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn into_vec_keeps_bytes_and_releases() {
        let (hook, released) = counting_hook();
        let buf = NativeBuffer::with_release(vec![1, 2, 3], hook);
        let bytes = buf.into_vec();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clone_does_not_carry_release_duty() {
        let (hook, released) = counting_hook();
        let buf = NativeBuffer::with_release(vec![9; 4], hook);
        let copy = buf.clone();
        assert!(!copy.is_native());
        drop(copy);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(buf);
        assert_eq!(released.load(Ordering::SeqCst), 4);
    }
}

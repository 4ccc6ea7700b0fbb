//! Range - blob の中身による検索
//!
//! alias を持たない entity です。`blobScan` は部分一致、`blobScanRegex` は
//! 正規表現で blob の中身を調べ、一致した alias を返します。

use crate::app::binder::Shape;
use crate::app::dispatcher::Dispatcher;
use crate::app::marshal::StringArrayResult;
use crate::domain::errors::BindError;
use crate::domain::ids::TaskId;
use crate::domain::task::Output;
use crate::domain::value::Value;

use super::entity::{Entity, EntityRef};
use super::registry::{EntityKind, Method};

#[derive(Debug, Clone)]
pub struct Range {
    base: EntityRef,
}

impl Entity for Range {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Range {
    /// `blobScan(pattern, maxCount, callback(error, aliases))`
    pub fn blob_scan(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::Scan, |s, t| {
            let (pattern, max_count) = t.input.scan()?;
            s.blob_scan(pattern, max_count).map(Output::Strings)
        })
    }

    pub fn blob_scan_regex(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::Scan, |s, t| {
            let (pattern, max_count) = t.input.scan()?;
            s.blob_scan_regex(pattern, max_count).map(Output::Strings)
        })
    }
}

impl EntityKind for Range {
    const KIND: &'static str = "range";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new("blobScan", Self::blob_scan),
            Method::new("blobScanRegex", Self::blob_scan_regex),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorCode;
    use crate::typed::blob::Blob;
    use crate::typed::testing::{Harness, error_of};

    const MATCHING: [&str; 4] = ["range1", "range2", "range3", "range4"];

    async fn seed(h: &Harness) -> Range {
        for alias in MATCHING {
            let blob = Blob::from_ref(h.entity_ref(alias));
            let content = Value::buffer(format!("pattern{alias}").into_bytes());
            h.call(vec![content], |d, a| blob.put(d, a)).await;
        }
        Range::from_ref(h.entity_ref(""))
    }

    fn names(argv: &[Value]) -> Vec<String> {
        let mut names: Vec<String> = argv[1]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn blob_scan_lists_matching_blobs() {
        let h = Harness::connected();
        let range = seed(&h).await;

        let argv = h
            .call(vec![Value::from("pattern"), Value::from(100i64)], |d, a| range.blob_scan(d, a))
            .await;
        assert_eq!(argv[0], Value::Null);
        assert_eq!(names(&argv), MATCHING);
    }

    #[tokio::test]
    async fn max_count_truncates() {
        let h = Harness::connected();
        let range = seed(&h).await;

        let argv = h
            .call(vec![Value::from("pattern"), Value::from(2i64)], |d, a| range.blob_scan(d, a))
            .await;
        assert_eq!(names(&argv).len(), 2);

        let argv = h
            .call(vec![Value::from("pattern[a-z]*[0-9]+"), Value::from(2i64)], |d, a| {
                range.blob_scan_regex(d, a)
            })
            .await;
        assert_eq!(argv[0], Value::Null);
        assert!(names(&argv).iter().all(|n| MATCHING.contains(&n.as_str())));
        assert_eq!(names(&argv).len(), 2);
    }

    #[tokio::test]
    async fn no_match_is_alias_not_found_with_empty_list() {
        let h = Harness::connected();
        let range = seed(&h).await;

        let argv = h
            .call(vec![Value::from("unexisting_pattern"), Value::from(10i64)], |d, a| {
                range.blob_scan_regex(d, a)
            })
            .await;
        assert_eq!(error_of(&argv), Some(ErrorCode::ALIAS_NOT_FOUND));
        assert_eq!(argv[1].as_array().map(<[Value]>::len), Some(0));
    }

    #[tokio::test]
    async fn missing_pattern_is_rejected_before_queueing() {
        let h = Harness::connected();
        let range = Range::from_ref(h.entity_ref(""));

        let err = range.blob_scan(&h.dispatcher, vec![Value::function(|_| {})]).unwrap_err();
        assert_eq!(err, BindError::InvalidArgument { position: 0, expected: "string" });
        let err = range
            .blob_scan_regex(&h.dispatcher, vec![Value::from(10i64), Value::function(|_| {})])
            .unwrap_err();
        assert_eq!(err, BindError::InvalidArgument { position: 0, expected: "string" });
        assert_eq!(h.dispatcher.pending_count(), 0);
    }
}

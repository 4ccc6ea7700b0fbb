//! Prefix / Suffix - alias の前方・後方一致検索
//!
//! alias が検索パターンを兼ねます。`maxCount` は必須で、0 以下なら
//! native 側が `INVALID_ARGUMENT` を返します。

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
pub struct Prefix {
    base: EntityRef,
}

#[derive(Debug, Clone)]
pub struct Suffix {
    base: EntityRef,
}

impl Entity for Prefix {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Entity for Suffix {
    fn base(&self) -> &EntityRef {
        &self.base
    }
}

impl Prefix {
    /// `getEntries(maxCount, callback(error, aliases))`
    pub fn get_entries(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::MaxCount, |s, t| {
            s.prefix_entries(&t.alias, t.input.integer()?).map(Output::Strings)
        })
    }
}

impl Suffix {
    pub fn get_entries(&self, dispatcher: &Dispatcher, args: Vec<Value>) -> Result<TaskId, BindError> {
        self.queue::<StringArrayResult, _>(dispatcher, args, Shape::MaxCount, |s, t| {
            s.suffix_entries(&t.alias, t.input.integer()?).map(Output::Strings)
        })
    }
}

impl EntityKind for Prefix {
    const KIND: &'static str = "prefix";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new("getEntries", Self::get_entries)]
    }
}

impl EntityKind for Suffix {
    const KIND: &'static str = "suffix";

    fn from_ref(base: EntityRef) -> Self {
        Self { base }
    }

    fn methods() -> Vec<Method<Self>> {
        vec![Method::new("getEntries", Self::get_entries)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorCode;
    use crate::typed::integer::Integer;
    use crate::typed::testing::{Harness, error_of};

    async fn seed(h: &Harness) {
        for alias in ["user.1", "user.2", "order.1"] {
            let n = Integer::from_ref(h.entity_ref(alias));
            h.call(vec![Value::from(0i64)], |d, a| n.put(d, a)).await;
        }
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
    async fn prefix_and_suffix_match() {
        let h = Harness::connected();
        seed(&h).await;

        let prefix = Prefix::from_ref(h.entity_ref("user."));
        let argv = h.call(vec![Value::from(10i64)], |d, a| prefix.get_entries(d, a)).await;
        assert_eq!(names(&argv), vec!["user.1", "user.2"]);

        let suffix = Suffix::from_ref(h.entity_ref(".1"));
        let argv = h.call(vec![Value::from(10i64)], |d, a| suffix.get_entries(d, a)).await;
        assert_eq!(names(&argv), vec!["order.1", "user.1"]);
    }

    #[tokio::test]
    async fn max_count_must_be_positive() {
        let h = Harness::connected();
        let prefix = Prefix::from_ref(h.entity_ref("user."));

        let argv = h.call(vec![Value::from(0i64)], |d, a| prefix.get_entries(d, a)).await;
        assert_eq!(error_of(&argv), Some(ErrorCode::INVALID_ARGUMENT));
        assert_eq!(argv[1].as_array().map(<[Value]>::len), Some(0));
    }

    #[tokio::test]
    async fn max_count_is_required() {
        let h = Harness::connected();
        let prefix = Prefix::from_ref(h.entity_ref("user."));

        let err = prefix
            .get_entries(&h.dispatcher, vec![Value::function(|_| {})])
            .unwrap_err();
        assert_eq!(err, BindError::InvalidArgument { position: 0, expected: "integer" });
    }
}

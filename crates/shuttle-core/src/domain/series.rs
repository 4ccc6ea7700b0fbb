//! Time-series 型: column 種別、point、aggregation

use serde::{Deserialize, Serialize};

use super::time::{Timespec, TsRange};

/// ColumnType は time-series column の値型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Double,
    Blob,
    Int64,
    Timestamp,
    String,
    Symbol,
}

impl ColumnType {
    pub const ALL: [ColumnType; 6] = [
        ColumnType::Double,
        ColumnType::Blob,
        ColumnType::Int64,
        ColumnType::Timestamp,
        ColumnType::String,
        ColumnType::Symbol,
    ];

    /// caller に公開する数値
    pub fn as_number(self) -> i64 {
        match self {
            ColumnType::Double => 0,
            ColumnType::Blob => 1,
            ColumnType::Int64 => 2,
            ColumnType::Timestamp => 3,
            ColumnType::String => 4,
            ColumnType::Symbol => 5,
        }
    }

    pub fn from_number(n: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_number() == n)
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Double => "COLUMN_DOUBLE",
            ColumnType::Blob => "COLUMN_BLOB",
            ColumnType::Int64 => "COLUMN_INT64",
            ColumnType::Timestamp => "COLUMN_TIMESTAMP",
            ColumnType::String => "COLUMN_STRING",
            ColumnType::Symbol => "COLUMN_SYMBOL",
        }
    }
}

/// ColumnInfo は column の定義。symbol column だけが symtable を持つ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub symtable: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            symtable: None,
        }
    }
}

/// PointValue は column 型ごとの値
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Double(f64),
    Blob(Vec<u8>),
    Int64(i64),
    Timestamp(Timespec),
    String(String),
}

impl PointValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            PointValue::Double(_) => ColumnType::Double,
            PointValue::Blob(_) => ColumnType::Blob,
            PointValue::Int64(_) => ColumnType::Int64,
            PointValue::Timestamp(_) => ColumnType::Timestamp,
            PointValue::String(_) => ColumnType::String,
        }
    }

    /// 数値集計に使える値
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Double(v) => Some(*v),
            PointValue::Int64(v) => Some(*v as f64),
            PointValue::Timestamp(ts) => Some(ts.to_millis_f64()),
            PointValue::Blob(_) | PointValue::String(_) => None,
        }
    }
}

/// Point は `{timestamp, value}`
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub timestamp: Timespec,
    pub value: PointValue,
}

impl Point {
    pub fn new(timestamp: Timespec, value: PointValue) -> Self {
        Self { timestamp, value }
    }
}

/// AggregationType は集計の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    First,
    Last,
    Min,
    Max,
    ArithmeticMean,
    HarmonicMean,
    GeometricMean,
    QuadraticMean,
    Count,
    Sum,
    SumOfSquares,
    Spread,
    SampleVariance,
    SampleStddev,
    PopulationVariance,
    PopulationStddev,
    AbsMin,
    AbsMax,
    Product,
    Skewness,
    Kurtosis,
}

impl AggregationType {
    pub const ALL: [AggregationType; 21] = [
        AggregationType::First,
        AggregationType::Last,
        AggregationType::Min,
        AggregationType::Max,
        AggregationType::ArithmeticMean,
        AggregationType::HarmonicMean,
        AggregationType::GeometricMean,
        AggregationType::QuadraticMean,
        AggregationType::Count,
        AggregationType::Sum,
        AggregationType::SumOfSquares,
        AggregationType::Spread,
        AggregationType::SampleVariance,
        AggregationType::SampleStddev,
        AggregationType::PopulationVariance,
        AggregationType::PopulationStddev,
        AggregationType::AbsMin,
        AggregationType::AbsMax,
        AggregationType::Product,
        AggregationType::Skewness,
        AggregationType::Kurtosis,
    ];

    pub fn as_number(self) -> i64 {
        Self::ALL
            .iter()
            .position(|t| *t == self)
            .map(|p| p as i64)
            .unwrap_or(-1)
    }

    pub fn from_number(n: i64) -> Option<Self> {
        usize::try_from(n).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            AggregationType::First => "AGG_FIRST",
            AggregationType::Last => "AGG_LAST",
            AggregationType::Min => "AGG_MIN",
            AggregationType::Max => "AGG_MAX",
            AggregationType::ArithmeticMean => "AGG_ARITHMETIC_MEAN",
            AggregationType::HarmonicMean => "AGG_HARMONIC_MEAN",
            AggregationType::GeometricMean => "AGG_GEOMETRIC_MEAN",
            AggregationType::QuadraticMean => "AGG_QUADRATIC_MEAN",
            AggregationType::Count => "AGG_COUNT",
            AggregationType::Sum => "AGG_SUM",
            AggregationType::SumOfSquares => "AGG_SUM_OF_SQUARES",
            AggregationType::Spread => "AGG_SPREAD",
            AggregationType::SampleVariance => "AGG_SAMPLE_VARIANCE",
            AggregationType::SampleStddev => "AGG_SAMPLE_STDDEV",
            AggregationType::PopulationVariance => "AGG_POPULATION_VARIANCE",
            AggregationType::PopulationStddev => "AGG_POPULATION_STDDEV",
            AggregationType::AbsMin => "AGG_ABS_MIN",
            AggregationType::AbsMax => "AGG_ABS_MAX",
            AggregationType::Product => "AGG_PRODUCT",
            AggregationType::Skewness => "AGG_SKEWNESS",
            AggregationType::Kurtosis => "AGG_KURTOSIS",
        }
    }

    /// blob / string column でも意味を持つ集計
    pub fn applies_to_non_numeric(self) -> bool {
        matches!(
            self,
            AggregationType::First | AggregationType::Last | AggregationType::Count
        )
    }
}

/// Aggregation は 1 件の集計要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregation {
    pub kind: AggregationType,
    pub range: TsRange,
}

/// AggregationResult は集計結果。該当 point がなければ `result` は `None`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub kind: AggregationType,
    pub range: TsRange,
    pub count: u64,
    pub result: Option<Point>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_numbers_round_trip() {
        for t in ColumnType::ALL {
            assert_eq!(ColumnType::from_number(t.as_number()), Some(t));
        }
        assert_eq!(ColumnType::from_number(42), None);
    }

    #[test]
    fn aggregation_numbers_follow_declaration_order() {
        assert_eq!(AggregationType::First.as_number(), 0);
        assert_eq!(AggregationType::Count.as_number(), 8);
        assert_eq!(AggregationType::from_number(20), Some(AggregationType::Kurtosis));
        assert_eq!(AggregationType::from_number(-3), None);
    }
}

//! Declarative expressions attached to feature tables
//!
//! Filters run before aggregation, aggregates group by the entity keys, and
//! derived expressions compute per-row columns afterwards. Evaluation lives in
//! the compiler crate; this module only holds the definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Value;

/// Row filter applied to a table's source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Column to filter on
    pub field: String,

    /// Operator
    pub operator: FilterOperator,

    /// Value (or list of values for `in` / `not_in`)
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: FilterValue::Single(value.into()),
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator: FilterOperator::In,
            value: FilterValue::List(values),
        }
    }
}

/// Filter operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,    // ==
    Ne,    // !=
    Gt,    // >
    Ge,    // >=
    Lt,    // <
    Le,    // <=
    In,    // IN
    NotIn, // NOT IN
    Like,  // LIKE with % and _
    Regex, // Regex match
}

impl FilterOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Ge => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Le => "<=",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::Like => "LIKE",
            FilterOperator::Regex => "REGEXP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    List(Vec<Value>),
    Single(Value),
}

/// Aggregation function over a window of rows per entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggFunction {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunction {
    pub fn sql(&self) -> &'static str {
        match self {
            AggFunction::Count => "COUNT",
            AggFunction::CountDistinct => "COUNT_DISTINCT",
            AggFunction::Sum => "SUM",
            AggFunction::Avg => "AVG",
            AggFunction::Min => "MIN",
            AggFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// Per-row arithmetic over columns and literals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureExpr {
    Column(String),
    Literal(Value),
    Binary {
        op: ArithmeticOp,
        left: Box<FeatureExpr>,
        right: Box<FeatureExpr>,
    },
}

impl FeatureExpr {
    pub fn col(name: impl Into<String>) -> Self {
        FeatureExpr::Column(name.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        FeatureExpr::Literal(value.into())
    }

    pub fn binary(op: ArithmeticOp, left: FeatureExpr, right: FeatureExpr) -> Self {
        FeatureExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Columns referenced anywhere in the expression
    pub fn columns(&self) -> Vec<&str> {
        match self {
            FeatureExpr::Column(name) => vec![name.as_str()],
            FeatureExpr::Literal(_) => Vec::new(),
            FeatureExpr::Binary { left, right, .. } => {
                let mut cols = left.columns();
                cols.extend(right.columns());
                cols
            }
        }
    }
}

impl fmt::Display for FeatureExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureExpr::Column(name) => write!(f, "{}", name),
            FeatureExpr::Literal(Value::String(s)) => write!(f, "'{}'", s),
            FeatureExpr::Literal(v) => write!(f, "{}", v),
            FeatureExpr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
        }
    }
}

//! Row-level evaluation of filters and derived expressions

use keel_core::{ArithmeticOp, FeatureExpr, Filter, FilterOperator, FilterValue, Frame, Value};
use regex::Regex;
use std::cmp::Ordering;

use crate::error::{CompileError, Result};

/// Translate a SQL LIKE pattern into an anchored regex
pub fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| CompileError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn equals(a: &Value, b: &Value) -> bool {
    a.compare(b) == Some(Ordering::Equal)
}

/// Boolean mask of rows passing `filter`. Nulls never pass.
pub fn filter_mask(frame: &Frame, filter: &Filter) -> Result<Vec<bool>> {
    let column = frame.require(&filter.field)?;
    let single = || match &filter.value {
        FilterValue::Single(v) => Ok(v),
        FilterValue::List(_) => Err(CompileError::InvalidExpression(format!(
            "operator {:?} on '{}' takes a single value",
            filter.operator, filter.field
        ))),
    };
    let list = || match &filter.value {
        FilterValue::List(values) => values.clone(),
        FilterValue::Single(v) => vec![v.clone()],
    };

    let mask = match filter.operator {
        FilterOperator::Eq
        | FilterOperator::Ne
        | FilterOperator::Gt
        | FilterOperator::Ge
        | FilterOperator::Lt
        | FilterOperator::Le => {
            let rhs = single()?;
            column
                .values
                .iter()
                .map(|v| match v.compare(rhs) {
                    None => false,
                    Some(ord) => match filter.operator {
                        FilterOperator::Eq => ord == Ordering::Equal,
                        FilterOperator::Ne => ord != Ordering::Equal,
                        FilterOperator::Gt => ord == Ordering::Greater,
                        FilterOperator::Ge => ord != Ordering::Less,
                        FilterOperator::Lt => ord == Ordering::Less,
                        _ => ord != Ordering::Greater,
                    },
                })
                .collect()
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let values = list();
            let negate = filter.operator == FilterOperator::NotIn;
            column
                .values
                .iter()
                .map(|v| !v.is_null() && (values.iter().any(|c| equals(v, c)) != negate))
                .collect()
        }
        FilterOperator::Like | FilterOperator::Regex => {
            let pattern = single()?.as_str().ok_or_else(|| {
                CompileError::InvalidExpression(format!(
                    "pattern for '{}' must be a string",
                    filter.field
                ))
            })?;
            let re = if filter.operator == FilterOperator::Like {
                like_to_regex(pattern)?
            } else {
                Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?
            };
            column
                .values
                .iter()
                .map(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false))
                .collect()
        }
    };
    Ok(mask)
}

/// Apply an arithmetic operator. Nulls propagate and division by zero is null.
pub fn apply_arithmetic(op: ArithmeticOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (left, right) {
        let out = match op {
            ArithmeticOp::Add => a.checked_add(*b).map(Value::Int),
            ArithmeticOp::Sub => a.checked_sub(*b).map(Value::Int),
            ArithmeticOp::Mul => a.checked_mul(*b).map(Value::Int),
            ArithmeticOp::Div if *b == 0 => Some(Value::Null),
            ArithmeticOp::Div => Some(Value::Float(*a as f64 / *b as f64)),
        };
        return out.ok_or_else(|| {
            CompileError::Execution(format!("integer overflow in {} {} {}", a, op.symbol(), b))
        });
    }
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(CompileError::InvalidExpression(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            left,
            right
        )));
    };
    let out = match op {
        ArithmeticOp::Add => a + b,
        ArithmeticOp::Sub => a - b,
        ArithmeticOp::Mul => a * b,
        ArithmeticOp::Div if b == 0.0 => return Ok(Value::Null),
        ArithmeticOp::Div => a / b,
    };
    Ok(Value::Float(out))
}

/// Evaluate `expr` for every row of `frame`
pub fn evaluate(frame: &Frame, expr: &FeatureExpr) -> Result<Vec<Value>> {
    let rows = frame.num_rows();
    match expr {
        FeatureExpr::Column(name) => Ok(frame.require(name)?.values.clone()),
        FeatureExpr::Literal(v) => Ok(vec![v.clone(); rows]),
        FeatureExpr::Binary { op, left, right } => {
            let l = evaluate(frame, left)?;
            let r = evaluate(frame, right)?;
            l.iter()
                .zip(r.iter())
                .map(|(a, b)| apply_arithmetic(*op, a, b))
                .collect()
        }
    }
}

/// Folds literal-only subexpressions at compile time
pub struct ConstantFolder;

impl ConstantFolder {
    pub fn new() -> Self {
        Self
    }

    pub fn fold(&self, expr: &FeatureExpr) -> FeatureExpr {
        match expr {
            FeatureExpr::Column(_) | FeatureExpr::Literal(_) => expr.clone(),
            FeatureExpr::Binary { op, left, right } => {
                let left = self.fold(left);
                let right = self.fold(right);
                if let (FeatureExpr::Literal(a), FeatureExpr::Literal(b)) = (&left, &right) {
                    if let Ok(value) = apply_arithmetic(*op, a, b) {
                        return FeatureExpr::Literal(value);
                    }
                }
                FeatureExpr::binary(*op, left, right)
            }
        }
    }
}

impl Default for ConstantFolder {
    fn default() -> Self {
        Self::new()
    }
}

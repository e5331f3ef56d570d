//! Evaluation of compiled snippets against the data environment.
//!
//! Conditions evaluate read-only; statements mutate in place. All failures
//! carry the source snippet so a crash mid-run names the snippet that
//! caused it.

use crate::data::SimData;
use crate::error::RuntimeError;
use crate::value::Value;

use super::parser::{AssignOp, BinaryOp, Expr, Stmt, UnaryOp};

fn type_mismatch(snippet: &str, reason: impl Into<String>) -> RuntimeError {
    RuntimeError::TypeMismatch {
        snippet: snippet.to_string(),
        reason: reason.into(),
    }
}

fn unknown_key(snippet: &str, key: &str) -> RuntimeError {
    RuntimeError::UnknownKey {
        key: key.to_string(),
        snippet: snippet.to_string(),
    }
}

pub(crate) fn eval_expr(
    expr: &Expr,
    data: &SimData,
    snippet: &str,
) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),

        Expr::Key(key) => data
            .get(key)
            .cloned()
            .ok_or_else(|| unknown_key(snippet, key)),

        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, data, snippet)?;
            match (op, value) {
                (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(-v)),
                (UnaryOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
                (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                (UnaryOp::Neg, other) => Err(type_mismatch(
                    snippet,
                    format!("cannot negate a {}", other.type_name()),
                )),
                (UnaryOp::Not, other) => Err(type_mismatch(
                    snippet,
                    format!("'!' needs a bool, got {}", other.type_name()),
                )),
            }
        }

        Expr::Binary { op, lhs, rhs } => match op {
            // Logical operators short-circuit, so the right side is only
            // evaluated when it can decide the outcome.
            BinaryOp::And | BinaryOp::Or => {
                let left = expect_bool(eval_expr(lhs, data, snippet)?, snippet)?;
                if *op == BinaryOp::And && !left {
                    return Ok(Value::Bool(false));
                }
                if *op == BinaryOp::Or && left {
                    return Ok(Value::Bool(true));
                }
                let right = expect_bool(eval_expr(rhs, data, snippet)?, snippet)?;
                Ok(Value::Bool(right))
            }
            _ => {
                let left = eval_expr(lhs, data, snippet)?;
                let right = eval_expr(rhs, data, snippet)?;
                apply_binary(*op, left, right, snippet)
            }
        },

        Expr::Matches { key, pattern } => {
            let value = data.get(key).ok_or_else(|| unknown_key(snippet, key))?;
            match value {
                Value::String(text) => Ok(Value::Bool(pattern.is_match(text))),
                other => Err(type_mismatch(
                    snippet,
                    format!("matches() needs a string key, got {}", other.type_name()),
                )),
            }
        }
    }
}

fn expect_bool(value: Value, snippet: &str) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| {
        type_mismatch(
            snippet,
            format!("logical operator needs bools, got {}", value.type_name()),
        )
    })
}

pub(crate) fn apply_binary(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    snippet: &str,
) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs, snippet)
        }

        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs, snippet)?;
            let holds = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                _ => unreachable!("filtered above"),
            };
            Ok(Value::Bool(holds))
        }

        BinaryOp::And | BinaryOp::Or => {
            // Handled (with short-circuiting) in eval_expr.
            let left = expect_bool(lhs, snippet)?;
            let right = expect_bool(rhs, snippet)?;
            Ok(Value::Bool(match op {
                BinaryOp::And => left && right,
                _ => left || right,
            }))
        }
    }
}

fn arithmetic(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    snippet: &str,
) -> Result<Value, RuntimeError> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem => {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero {
                            snippet: snippet.to_string(),
                        });
                    }
                    if op == BinaryOp::Div {
                        a.checked_div(b)
                    } else {
                        a.checked_rem(b)
                    }
                }
                _ => unreachable!("arithmetic() only sees arithmetic ops"),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| type_mismatch(snippet, "integer overflow"))
        }

        // Mixing Int and Float promotes to Float.
        _ if lhs.as_float().is_some() && rhs.as_float().is_some() => {
            let (a, b) = (
                lhs.as_float().unwrap_or_default(),
                rhs.as_float().unwrap_or_default(),
            );
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
                return Err(RuntimeError::DivisionByZero {
                    snippet: snippet.to_string(),
                });
            }
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => unreachable!("arithmetic() only sees arithmetic ops"),
            }))
        }

        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            let mut out = a.clone();
            out.push_str(b);
            Ok(Value::String(out))
        }

        _ => Err(type_mismatch(
            snippet,
            format!(
                "cannot apply arithmetic to {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        )),
    }
}

/// Equality coerces Int with Float so `x == 1` holds for `Float(1.0)`;
/// everything else compares structurally.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_float(), rhs.as_float()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(
    lhs: &Value,
    rhs: &Value,
    snippet: &str,
) -> Result<std::cmp::Ordering, RuntimeError> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    if let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) {
        return a.partial_cmp(&b).ok_or_else(|| {
            type_mismatch(snippet, "cannot order NaN")
        });
    }
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return Ok(a.cmp(b));
    }
    Err(type_mismatch(
        snippet,
        format!(
            "cannot order {} against {}",
            lhs.type_name(),
            rhs.type_name()
        ),
    ))
}

pub(crate) fn exec_stmt(
    stmt: &Stmt,
    data: &mut SimData,
    snippet: &str,
) -> Result<(), RuntimeError> {
    match stmt {
        Stmt::Assign {
            key,
            op: AssignOp::Set,
            value,
        } => {
            let value = eval_expr(value, data, snippet)?;
            data.insert(key.clone(), value);
            Ok(())
        }

        // Compound assignment requires the key to exist already; silently
        // materializing a zero would mask typos in action text.
        Stmt::Assign { key, op, value } => {
            let current = data
                .get(key)
                .cloned()
                .ok_or_else(|| unknown_key(snippet, key))?;
            let operand = eval_expr(value, data, snippet)?;
            let binop = match op {
                AssignOp::Add => BinaryOp::Add,
                AssignOp::Sub => BinaryOp::Sub,
                AssignOp::Mul => BinaryOp::Mul,
                AssignOp::Div => BinaryOp::Div,
                AssignOp::Set => unreachable!("handled above"),
            };
            let updated = apply_binary(binop, current, operand, snippet)?;
            data.insert(key.clone(), updated);
            Ok(())
        }

        Stmt::Push { key, value } => {
            let value = eval_expr(value, data, snippet)?;
            match data.get_mut(key) {
                Some(Value::List(items)) => {
                    items.push(value);
                    Ok(())
                }
                Some(other) => Err(type_mismatch(
                    snippet,
                    format!("push() needs a list key, got {}", other.type_name()),
                )),
                None => {
                    data.insert(key.clone(), Value::List(vec![value]));
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::{parse_expression, parse_program};

    fn eval(src: &str, data: &SimData) -> Result<Value, RuntimeError> {
        eval_expr(&parse_expression(src).unwrap(), data, src)
    }

    fn exec(src: &str, data: &mut SimData) -> Result<(), RuntimeError> {
        for stmt in parse_program(src).unwrap() {
            exec_stmt(&stmt, data, src)?;
        }
        Ok(())
    }

    #[test]
    fn arithmetic_over_keys() {
        let mut data = SimData::new();
        data.insert("x", 10);
        data.insert("y", 4);
        assert_eq!(eval("x + y * 2", &data).unwrap(), Value::Int(18));
        assert_eq!(eval("x / y", &data).unwrap(), Value::Int(2));
        assert_eq!(eval("x % y", &data).unwrap(), Value::Int(2));
    }

    #[test]
    fn mixed_numeric_promotes_to_float() {
        let mut data = SimData::new();
        data.insert("x", 3);
        assert_eq!(eval("x + 0.5", &data).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn string_concatenation() {
        let mut data = SimData::new();
        data.insert("name", "traffic");
        assert_eq!(
            eval("name + '-light'", &data).unwrap(),
            Value::String("traffic-light".into())
        );
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let data = SimData::new();
        assert!(matches!(
            eval("1 / 0", &data),
            Err(RuntimeError::DivisionByZero { .. })
        ));
        assert!(matches!(
            eval("1.5 / 0.0", &data),
            Err(RuntimeError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn unknown_key_propagates() {
        let data = SimData::new();
        let Err(RuntimeError::UnknownKey { key, .. }) = eval("speed > 3", &data) else {
            panic!("expected an unknown-key error");
        };
        assert_eq!(key, "speed");
    }

    #[test]
    fn comparisons() {
        let mut data = SimData::new();
        data.insert("timeOn", 20);
        assert_eq!(eval("timeOn > 19", &data).unwrap(), Value::Bool(true));
        assert_eq!(eval("timeOn <= 19", &data).unwrap(), Value::Bool(false));
        assert_eq!(eval("'abc' < 'abd'", &data).unwrap(), Value::Bool(true));
    }

    #[test]
    fn equality_coerces_int_and_float() {
        let data = SimData::new();
        assert_eq!(eval("1 == 1.0", &data).unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' == 'a'", &data).unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' != 'b'", &data).unwrap(), Value::Bool(true));
        assert_eq!(eval("true == 1", &data).unwrap(), Value::Bool(false));
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        let mut data = SimData::new();
        data.insert("ready", false);
        // `missing` does not exist; && must not evaluate it.
        assert_eq!(
            eval("ready && missing > 0", &data).unwrap(),
            Value::Bool(false)
        );
        data.insert("ready", true);
        assert_eq!(
            eval("ready || missing > 0", &data).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn ordering_across_types_is_rejected() {
        let data = SimData::new();
        assert!(matches!(
            eval("'a' < 1", &data),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn matches_builtin_reads_a_string_key() {
        let mut data = SimData::new();
        data.insert("light", "red");
        assert_eq!(
            eval("matches(light, '^re')", &data).unwrap(),
            Value::Bool(true)
        );
        data.insert("light", 3);
        assert!(matches!(
            eval("matches(light, '^re')", &data),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn assignment_creates_keys() {
        let mut data = SimData::new();
        exec("timeOn = 0; light = 'red'", &mut data).unwrap();
        assert_eq!(data.get("timeOn"), Some(&Value::Int(0)));
        assert_eq!(data.get("light"), Some(&Value::String("red".into())));
    }

    #[test]
    fn compound_assignment_updates_in_place() {
        let mut data = SimData::new();
        data.insert("timeOn", 4);
        exec("timeOn += 1", &mut data).unwrap();
        assert_eq!(data.get("timeOn"), Some(&Value::Int(5)));
    }

    #[test]
    fn compound_assignment_on_missing_key_fails() {
        let mut data = SimData::new();
        assert!(matches!(
            exec("missing += 1", &mut data),
            Err(RuntimeError::UnknownKey { .. })
        ));
    }

    #[test]
    fn push_appends_and_creates() {
        let mut data = SimData::new();
        exec("push(tags, 'enterA'); push(tags, 'exitA')", &mut data).unwrap();
        assert_eq!(data.string_list("tags"), vec!["enterA", "exitA"]);
    }

    #[test]
    fn push_on_non_list_fails() {
        let mut data = SimData::new();
        data.insert("tags", 3);
        assert!(matches!(
            exec("push(tags, 1)", &mut data),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn negation_and_not() {
        let mut data = SimData::new();
        data.insert("x", 3);
        data.insert("on", true);
        assert_eq!(eval("-x", &data).unwrap(), Value::Int(-3));
        assert_eq!(eval("!on", &data).unwrap(), Value::Bool(false));
        assert!(eval("!x", &data).is_err());
    }
}

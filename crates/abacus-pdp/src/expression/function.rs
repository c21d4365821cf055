//! Evaluation functions and the function registry.
//!
//! The engine's function surface is first-order: every function consumes
//! already-evaluated values (primitives or bags) and produces one value.
//! The higher-order `any-of` pattern a Match needs is hard-coded in the
//! match evaluator, so it never appears here.

use std::collections::HashMap;
use std::sync::Arc;

use kernel::{AttributeDatatype, AttributeValue, Bag};

use super::Value;
use crate::domain::EvaluationError;

/// An evaluation function, identified by its XACML function URN.
pub trait Function: Send + Sync {
    fn id(&self) -> &str;

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError>;
}

/// Resolves function identifiers to implementations.
///
/// A port: deployments may extend the standard library with their own
/// functions by wrapping or replacing the registry.
#[cfg_attr(test, mockall::automock)]
pub trait FunctionRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<dyn Function>>;
}

fn arg_error(function_id: &str, message: impl Into<String>) -> EvaluationError {
    EvaluationError::Function {
        function_id: function_id.to_string(),
        message: message.into(),
    }
}

fn primitive_arg<'a>(
    function_id: &str,
    args: &'a [Value],
    index: usize,
    datatype: AttributeDatatype,
) -> Result<&'a AttributeValue, EvaluationError> {
    match args.get(index) {
        Some(Value::Primitive(v)) if v.datatype() == datatype => Ok(v),
        Some(Value::Primitive(v)) => Err(arg_error(
            function_id,
            format!("argument #{index} has type {}, expected {datatype}", v.datatype()),
        )),
        Some(Value::Bag(_)) => Err(arg_error(
            function_id,
            format!("argument #{index} is a bag, expected a {datatype} value"),
        )),
        None => Err(arg_error(function_id, format!("missing argument #{index}"))),
    }
}

fn bag_arg<'a>(
    function_id: &str,
    args: &'a [Value],
    index: usize,
    datatype: AttributeDatatype,
) -> Result<&'a Bag, EvaluationError> {
    match args.get(index) {
        Some(Value::Bag(b)) if b.datatype() == datatype => Ok(b),
        Some(Value::Bag(b)) => Err(arg_error(
            function_id,
            format!(
                "argument #{index} is a bag of {}, expected a bag of {datatype}",
                b.datatype()
            ),
        )),
        Some(Value::Primitive(_)) => Err(arg_error(
            function_id,
            format!("argument #{index} is a primitive, expected a bag of {datatype}"),
        )),
        None => Err(arg_error(function_id, format!("missing argument #{index}"))),
    }
}

fn exact_arity(function_id: &str, args: &[Value], n: usize) -> Result<(), EvaluationError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(arg_error(
            function_id,
            format!("expected {n} arguments, got {}", args.len()),
        ))
    }
}

/// `<type>-equal` for one primitive datatype.
struct EqualFunction {
    id: String,
    datatype: AttributeDatatype,
}

impl Function for EqualFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        exact_arity(&self.id, args, 2)?;
        let a = primitive_arg(&self.id, args, 0, self.datatype)?;
        let b = primitive_arg(&self.id, args, 1, self.datatype)?;
        Ok(Value::Primitive(AttributeValue::boolean(a == b)))
    }
}

#[derive(Clone, Copy)]
enum CompareOp {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    fn suffix(self) -> &'static str {
        match self {
            Self::GreaterThan => "greater-than",
            Self::GreaterThanOrEqual => "greater-than-or-equal",
            Self::LessThan => "less-than",
            Self::LessThanOrEqual => "less-than-or-equal",
        }
    }

    fn holds(self, ord: std::cmp::Ordering) -> bool {
        match self {
            Self::GreaterThan => ord.is_gt(),
            Self::GreaterThanOrEqual => ord.is_ge(),
            Self::LessThan => ord.is_lt(),
            Self::LessThanOrEqual => ord.is_le(),
        }
    }
}

/// Numeric comparison for integer or double.
struct CompareFunction {
    id: String,
    datatype: AttributeDatatype,
    op: CompareOp,
}

impl Function for CompareFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        exact_arity(&self.id, args, 2)?;
        let a = primitive_arg(&self.id, args, 0, self.datatype)?;
        let b = primitive_arg(&self.id, args, 1, self.datatype)?;
        let ord = match (a, b) {
            (AttributeValue::Integer(x), AttributeValue::Integer(y)) => x.cmp(y),
            (AttributeValue::Double(x), AttributeValue::Double(y)) => x
                .partial_cmp(y)
                .ok_or_else(|| arg_error(&self.id, "cannot order NaN"))?,
            _ => return Err(arg_error(&self.id, "unsupported operand types")),
        };
        Ok(Value::Primitive(AttributeValue::boolean(self.op.holds(ord))))
    }
}

enum LogicalOp {
    And,
    Or,
    Not,
}

struct LogicalFunction {
    id: &'static str,
    op: LogicalOp,
}

impl Function for LogicalFunction {
    fn id(&self) -> &str {
        self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        let bool_arg = |i: usize| -> Result<bool, EvaluationError> {
            primitive_arg(self.id, args, i, AttributeDatatype::Boolean)
                .map(|v| v.as_boolean().unwrap_or_default())
        };
        let result = match self.op {
            LogicalOp::And => {
                let mut acc = true;
                for i in 0..args.len() {
                    acc = acc && bool_arg(i)?;
                }
                acc
            }
            LogicalOp::Or => {
                let mut acc = false;
                for i in 0..args.len() {
                    acc = acc || bool_arg(i)?;
                }
                acc
            }
            LogicalOp::Not => {
                exact_arity(self.id, args, 1)?;
                !bool_arg(0)?
            }
        };
        Ok(Value::Primitive(AttributeValue::boolean(result)))
    }
}

/// `string-regexp-match`: POSIX-flavored matching via the `regex` crate.
struct RegexpMatchFunction {
    id: &'static str,
}

impl Function for RegexpMatchFunction {
    fn id(&self) -> &str {
        self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        exact_arity(self.id, args, 2)?;
        let pattern = primitive_arg(self.id, args, 0, AttributeDatatype::String)?;
        let value = primitive_arg(self.id, args, 1, AttributeDatatype::String)?;
        let (Some(pattern), Some(value)) = (pattern.as_str(), value.as_str()) else {
            return Err(arg_error(self.id, "string arguments expected"));
        };
        let re = regex::Regex::new(pattern)
            .map_err(|e| arg_error(self.id, format!("invalid pattern: {e}")))?;
        Ok(Value::Primitive(AttributeValue::boolean(re.is_match(value))))
    }
}

/// `<type>-one-and-only`: the single element of a singleton bag.
struct OneAndOnlyFunction {
    id: String,
    datatype: AttributeDatatype,
}

impl Function for OneAndOnlyFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        exact_arity(&self.id, args, 1)?;
        let bag = bag_arg(&self.id, args, 0, self.datatype)?;
        Ok(Value::Primitive(bag.single()?.clone()))
    }
}

/// `<type>-bag-size`.
struct BagSizeFunction {
    id: String,
    datatype: AttributeDatatype,
}

impl Function for BagSizeFunction {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, EvaluationError> {
        exact_arity(&self.id, args, 1)?;
        let bag = bag_arg(&self.id, args, 0, self.datatype)?;
        Ok(Value::Primitive(AttributeValue::integer(bag.len() as i64)))
    }
}

const FUNCTION_URN_PREFIX: &str = "urn:oasis:names:tc:xacml:1.0:function:";

/// The standard function library the engine ships with: per-datatype
/// equality, integer/double comparison, logical connectives, regular
/// expression matching, and the bag accessors.
pub struct StandardFunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl StandardFunctionRegistry {
    pub fn new() -> Self {
        let mut functions: HashMap<String, Arc<dyn Function>> = HashMap::new();
        let mut register = |f: Arc<dyn Function>| {
            functions.insert(f.id().to_string(), f);
        };

        for &datatype in AttributeDatatype::all() {
            let prefix = datatype.function_prefix();
            register(Arc::new(EqualFunction {
                id: format!("{FUNCTION_URN_PREFIX}{prefix}-equal"),
                datatype,
            }));
            register(Arc::new(OneAndOnlyFunction {
                id: format!("{FUNCTION_URN_PREFIX}{prefix}-one-and-only"),
                datatype,
            }));
            register(Arc::new(BagSizeFunction {
                id: format!("{FUNCTION_URN_PREFIX}{prefix}-bag-size"),
                datatype,
            }));
        }

        for datatype in [AttributeDatatype::Integer, AttributeDatatype::Double] {
            for op in [
                CompareOp::GreaterThan,
                CompareOp::GreaterThanOrEqual,
                CompareOp::LessThan,
                CompareOp::LessThanOrEqual,
            ] {
                register(Arc::new(CompareFunction {
                    id: format!(
                        "{FUNCTION_URN_PREFIX}{}-{}",
                        datatype.function_prefix(),
                        op.suffix()
                    ),
                    datatype,
                    op,
                }));
            }
        }

        register(Arc::new(LogicalFunction {
            id: "urn:oasis:names:tc:xacml:1.0:function:and",
            op: LogicalOp::And,
        }));
        register(Arc::new(LogicalFunction {
            id: "urn:oasis:names:tc:xacml:1.0:function:or",
            op: LogicalOp::Or,
        }));
        register(Arc::new(LogicalFunction {
            id: "urn:oasis:names:tc:xacml:1.0:function:not",
            op: LogicalOp::Not,
        }));
        register(Arc::new(RegexpMatchFunction {
            id: "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match",
        }));

        Self { functions }
    }
}

impl Default for StandardFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry for StandardFunctionRegistry {
    fn get(&self, id: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> StandardFunctionRegistry {
        StandardFunctionRegistry::new()
    }

    fn invoke(id: &str, args: &[Value]) -> Result<Value, EvaluationError> {
        registry().get(id).expect(id).invoke(args)
    }

    fn boolean(value: Result<Value, EvaluationError>) -> bool {
        match value.unwrap() {
            Value::Primitive(AttributeValue::Boolean(b)) => b,
            other => panic!("expected boolean, got {other:?}"),
        }
    }

    #[test]
    fn string_equal() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
        assert!(boolean(invoke(
            id,
            &[
                Value::Primitive(AttributeValue::string("a")),
                Value::Primitive(AttributeValue::string("a")),
            ],
        )));
        assert!(!boolean(invoke(
            id,
            &[
                Value::Primitive(AttributeValue::string("a")),
                Value::Primitive(AttributeValue::string("b")),
            ],
        )));
    }

    #[test]
    fn equal_rejects_wrong_datatype() {
        let err = invoke(
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            &[
                Value::Primitive(AttributeValue::string("a")),
                Value::Primitive(AttributeValue::integer(1)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EvaluationError::Function { .. }));
    }

    #[test]
    fn integer_comparison() {
        assert!(boolean(invoke(
            "urn:oasis:names:tc:xacml:1.0:function:integer-greater-than",
            &[
                Value::Primitive(AttributeValue::integer(3)),
                Value::Primitive(AttributeValue::integer(2)),
            ],
        )));
        assert!(!boolean(invoke(
            "urn:oasis:names:tc:xacml:1.0:function:integer-less-than",
            &[
                Value::Primitive(AttributeValue::integer(3)),
                Value::Primitive(AttributeValue::integer(2)),
            ],
        )));
    }

    #[test]
    fn logical_connectives_have_units() {
        assert!(boolean(invoke("urn:oasis:names:tc:xacml:1.0:function:and", &[])));
        assert!(!boolean(invoke("urn:oasis:names:tc:xacml:1.0:function:or", &[])));
        assert!(!boolean(invoke(
            "urn:oasis:names:tc:xacml:1.0:function:not",
            &[Value::Primitive(AttributeValue::boolean(true))],
        )));
    }

    #[test]
    fn regexp_match() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";
        assert!(boolean(invoke(
            id,
            &[
                Value::Primitive(AttributeValue::string("^al.*e$")),
                Value::Primitive(AttributeValue::string("alice")),
            ],
        )));
        let err = invoke(
            id,
            &[
                Value::Primitive(AttributeValue::string("([")),
                Value::Primitive(AttributeValue::string("alice")),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn one_and_only_enforces_arity() {
        let id = "urn:oasis:names:tc:xacml:1.0:function:string-one-and-only";
        let single = invoke(
            id,
            &[Value::Bag(Bag::of(AttributeValue::string("only")))],
        )
        .unwrap();
        assert_eq!(single, Value::Primitive(AttributeValue::string("only")));

        let err = invoke(
            id,
            &[Value::Bag(Bag::empty(AttributeDatatype::String))],
        )
        .unwrap_err();
        assert!(matches!(err, EvaluationError::BagArity { len: 0 }));
    }

    #[test]
    fn bag_size() {
        let mut bag = Bag::of(AttributeValue::integer(1));
        bag.merge(Bag::of(AttributeValue::integer(2))).unwrap();
        let size = invoke(
            "urn:oasis:names:tc:xacml:1.0:function:integer-bag-size",
            &[Value::Bag(bag)],
        )
        .unwrap();
        assert_eq!(size, Value::Primitive(AttributeValue::integer(2)));
    }

    #[test]
    fn mocked_registry_resolves() {
        let mut mock = MockFunctionRegistry::new();
        mock.expect_get().returning(|id| {
            StandardFunctionRegistry::new().get(id)
        });
        assert!(mock.get("urn:oasis:names:tc:xacml:1.0:function:and").is_some());
        assert!(mock.get("urn:example:no-such-function").is_none());
    }
}

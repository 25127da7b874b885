//! Built-in scalar and aggregate functions.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::AggFunc;
use crate::json::{compare, Json, JsonValue};

/// A scalar function implementation.
pub type ScalarFn = fn(&[Json]) -> Json;

/// Implementation of `length(x)`.
///
/// Strings report their byte length; every other value reports the length
/// of its stringification.
#[allow(clippy::cast_precision_loss)]
fn fn_length(args: &[Json]) -> Json {
    let n = match &*args[0] {
        JsonValue::Str(s) => s.len(),
        other => other.to_display_string().len(),
    };
    JsonValue::real(n as f64)
}

/// Looks up a scalar function by name and arity.
#[must_use]
pub fn lookup_scalar(name: &str, arity: usize) -> Option<ScalarFn> {
    match (name, arity) {
        ("length", 1) => Some(fn_length),
        _ => None,
    }
}

/// Looks up an aggregate function by name and arity.
#[must_use]
pub fn lookup_aggregate(name: &str, arity: usize) -> Option<AggFunc> {
    match (name, arity) {
        ("count", 0) => Some(AggFunc::Count),
        ("sum", 1) => Some(AggFunc::Sum),
        ("avg", 1) => Some(AggFunc::Avg),
        ("min", 1) => Some(AggFunc::Min),
        ("max", 1) => Some(AggFunc::Max),
        _ => None,
    }
}

/// A running aggregate: stepped once per accumulated row, finalized once
/// per group.
#[derive(Debug)]
pub struct Accumulator {
    func: AggFunc,
    count: u64,
    sum: f64,
    extreme: Option<Json>,
    /// The finalized value, available to expression evaluation after
    /// `finalize` and until `reset`.
    finalized: Option<Json>,
}

impl Accumulator {
    /// Creates an empty accumulator for the given function.
    #[must_use]
    pub const fn new(func: AggFunc) -> Self {
        Self {
            func,
            count: 0,
            sum: 0.0,
            extreme: None,
            finalized: None,
        }
    }

    /// Accumulates one row's argument values.
    pub fn step(&mut self, args: &[Json]) {
        self.count += 1;
        match self.func {
            AggFunc::Count => {}
            AggFunc::Sum | AggFunc::Avg => {
                self.sum += args[0].to_real_or_nan();
            }
            AggFunc::Min => {
                let keep = match &self.extreme {
                    Some(cur) => compare(&args[0], cur) == Ordering::Less,
                    None => true,
                };
                if keep {
                    self.extreme = Some(Rc::clone(&args[0]));
                }
            }
            AggFunc::Max => {
                let keep = match &self.extreme {
                    Some(cur) => compare(&args[0], cur) == Ordering::Greater,
                    None => true,
                };
                if keep {
                    self.extreme = Some(Rc::clone(&args[0]));
                }
            }
        }
    }

    /// Finalizes the accumulated value for the current group.
    ///
    /// `count` of no rows is `0`; the other aggregates are NULL over an
    /// empty input.
    #[allow(clippy::cast_precision_loss)]
    pub fn finalize(&mut self) {
        let value = match self.func {
            AggFunc::Count => JsonValue::real(self.count as f64),
            AggFunc::Sum => {
                if self.count == 0 {
                    JsonValue::null()
                } else {
                    JsonValue::real(self.sum)
                }
            }
            AggFunc::Avg => {
                if self.count == 0 {
                    JsonValue::null()
                } else {
                    JsonValue::real(self.sum / self.count as f64)
                }
            }
            AggFunc::Min | AggFunc::Max => self
                .extreme
                .clone()
                .unwrap_or_else(JsonValue::null),
        };
        self.finalized = Some(value);
    }

    /// The finalized value, or NULL when no group has been finalized.
    #[must_use]
    pub fn value(&self) -> Json {
        self.finalized.clone().unwrap_or_else(JsonValue::null)
    }

    /// Clears all accumulated state for the next group.
    pub fn reset(&mut self) {
        self.count = 0;
        self.sum = 0.0;
        self.extreme = None;
        self.finalized = None;
    }
}

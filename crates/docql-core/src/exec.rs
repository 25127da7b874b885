//! The query executor: a stack of pull stages layered over the FROM
//! iterator.
//!
//! For a simple SELECT the step path is
//! `limit(offset(ordered(distinct(grouped(whered(from))))))`. The buffering
//! stages sort with the standard library's stable sort; grouping relies on
//! that stability for adjacent-equal-key runs.

use std::cmp::Ordering;

use crate::ast::{AggSpec, CompoundOp, Direction, Expr, ExprItem, Query, SimpleQuery};
use crate::datasrc::SrcExec;
use crate::error::{Result, StepResult};
use crate::eval::{eval, eval_true, Env, ScopeKind, ScopeNode};
use crate::func::Accumulator;
use crate::json::{compare, Json, JsonValue};

/// Which buffered stage currently supplies the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFrom {
    DataSrc,
    Grouped,
    Distincted,
    Ordered,
}

/// A buffered row: JSON references only, cheap to clone.
pub type Tuple = Vec<Json>;

/// The immutable execution plan of a simple query, cloned from the bound
/// AST.
pub struct QueryCfg {
    pub distinct: bool,
    pub result: Option<Expr>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<ExprItem>,
    pub having: Option<Expr>,
    pub order_by: Vec<ExprItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub aggs: Vec<AggSpec>,
}

/// The mutable run state of a simple query.
pub struct RunState {
    pub src: Option<SrcExec>,
    pub accums: Vec<Accumulator>,
    pub doc_from: DocFrom,
    /// The tuple backing the current row in the buffered stages.
    pub saved: Option<Tuple>,
    no_from_emitted: bool,
    agg_emitted: bool,
    grouped: Option<Vec<Tuple>>,
    grouped_pos: usize,
    distincted: Option<Vec<Tuple>>,
    distinct_pos: usize,
    ordered: Option<Vec<Tuple>>,
    ordered_pos: usize,
    offset_applied: bool,
    limit_evaluated: bool,
    limit_left: Option<i64>,
}

/// Runtime for one query: a simple pipeline or a compound pair.
pub enum QueryExec {
    Simple(Box<SimpleExec>),
    Compound(Box<CompoundExec>),
}

/// Runtime for a simple SELECT.
pub struct SimpleExec {
    pub cfg: QueryCfg,
    pub state: RunState,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Branch {
    Left,
    Right,
    Finished,
}

/// Runtime for a compound query: the left branch runs to completion, then
/// the right. No de-duplication is performed regardless of the keyword.
pub struct CompoundExec {
    #[allow(dead_code)]
    op: CompoundOp,
    left: QueryExec,
    right: QueryExec,
    active: Branch,
}

/// Named-document lookup against a simple query's current row, sensitive
/// to the supplying stage.
pub(crate) fn query_doc_named(cfg: &QueryCfg, state: &RunState, name: &str) -> Option<Json> {
    let src = state.src.as_ref()?;
    match state.doc_from {
        DocFrom::DataSrc => src.doc_named(name),
        DocFrom::Grouped => {
            let saved = state.saved.as_ref()?;
            src.read_cached(&saved[cfg.group_by.len()..], name)
        }
        DocFrom::Distincted => {
            let saved = state.saved.as_ref()?;
            src.read_cached(&saved[1..], name)
        }
        DocFrom::Ordered => None,
    }
}

/// The finalized value of an aggregate slot.
pub(crate) fn query_agg_value(state: &RunState, slot: usize) -> Json {
    state
        .accums
        .get(slot)
        .map_or_else(JsonValue::null, Accumulator::value)
}

/// Compares the first `keys.len()` columns of two tuples, honoring each
/// key's direction.
fn compare_keyed(a: &Tuple, b: &Tuple, keys: &[ExprItem]) -> Ordering {
    for (i, item) in keys.iter().enumerate() {
        let mut c = compare(&a[i], &b[i]);
        if item.direction == Some(Direction::Descending) {
            c = c.reverse();
        }
        if c != Ordering::Equal {
            return c;
        }
    }
    Ordering::Equal
}

/// Key-prefix equality, ignoring direction.
fn keys_equal(a: &Tuple, b: &Tuple, n: usize) -> bool {
    (0..n).all(|i| compare(&a[i], &b[i]) == Ordering::Equal)
}

impl QueryExec {
    /// Builds the runtime for a bound query.
    #[must_use]
    pub fn new(query: &Query) -> Self {
        match query {
            Query::Simple(sq) => Self::Simple(Box::new(SimpleExec::new(sq))),
            Query::Compound { op, left, right } => Self::Compound(Box::new(CompoundExec {
                op: *op,
                left: Self::new(left),
                right: Self::new(right),
                active: Branch::Left,
            })),
        }
    }

    /// Advances to the next result row.
    pub fn step(&mut self, env: Env<'_>) -> Result<StepResult> {
        match self {
            Self::Simple(exec) => exec.step(env),
            Self::Compound(exec) => exec.step(env),
        }
    }

    /// The current document: the result document for `None`, or a named
    /// binding.
    pub fn doc(&self, env: Env<'_>, name: Option<&str>) -> Result<Json> {
        match self {
            Self::Simple(exec) => exec.doc(env, name),
            Self::Compound(exec) => {
                let branch = match exec.active {
                    Branch::Left => &exec.left,
                    Branch::Right | Branch::Finished => &exec.right,
                };
                branch.doc(env, name)
            }
        }
    }

    /// Resets the query to the start.
    pub fn rewind(&mut self) {
        match self {
            Self::Simple(exec) => exec.rewind(),
            Self::Compound(exec) => {
                exec.left.rewind();
                exec.right.rewind();
                exec.active = Branch::Left;
            }
        }
    }
}

impl CompoundExec {
    fn step(&mut self, env: Env<'_>) -> Result<StepResult> {
        loop {
            match self.active {
                Branch::Left => {
                    if self.left.step(env)? == StepResult::Row {
                        return Ok(StepResult::Row);
                    }
                    self.active = Branch::Right;
                }
                Branch::Right => {
                    if self.right.step(env)? == StepResult::Row {
                        return Ok(StepResult::Row);
                    }
                    self.active = Branch::Finished;
                }
                Branch::Finished => return Ok(StepResult::Done),
            }
        }
    }
}

impl SimpleExec {
    /// Builds the runtime for a bound simple query.
    #[must_use]
    pub fn new(sq: &SimpleQuery) -> Self {
        let accums = sq.aggs.iter().map(|a| Accumulator::new(a.func)).collect();
        Self {
            cfg: QueryCfg {
                distinct: sq.distinct,
                result: sq.result.clone(),
                where_clause: sq.where_clause.clone(),
                group_by: sq.group_by.clone(),
                having: sq.having.clone(),
                order_by: sq.order_by.clone(),
                limit: sq.limit.clone(),
                offset: sq.offset.clone(),
                aggs: sq.aggs.clone(),
            },
            state: RunState {
                src: sq.from.as_ref().map(SrcExec::new),
                accums,
                doc_from: DocFrom::DataSrc,
                saved: None,
                no_from_emitted: false,
                agg_emitted: false,
                grouped: None,
                grouped_pos: 0,
                distincted: None,
                distinct_pos: 0,
                ordered: None,
                ordered_pos: 0,
                offset_applied: false,
                limit_evaluated: false,
                limit_left: None,
            },
        }
    }

    /// Resets every stage: buffered lists, accumulators, and the document
    /// source marker, then the FROM tree.
    pub fn rewind(&mut self) {
        if let Some(src) = self.state.src.as_mut() {
            src.rewind();
        }
        for acc in &mut self.state.accums {
            acc.reset();
        }
        self.state.doc_from = DocFrom::DataSrc;
        self.state.saved = None;
        self.state.no_from_emitted = false;
        self.state.agg_emitted = false;
        self.state.grouped = None;
        self.state.grouped_pos = 0;
        self.state.distincted = None;
        self.state.distinct_pos = 0;
        self.state.ordered = None;
        self.state.ordered_pos = 0;
        self.state.offset_applied = false;
        self.state.limit_evaluated = false;
        self.state.limit_left = None;
    }

    /// Evaluates an expression with this query's scope pushed onto the
    /// chain.
    fn eval_scoped(&self, expr: &Expr, env: Env<'_>) -> Result<Json> {
        let scope = ScopeNode {
            kind: ScopeKind::Query {
                cfg: &self.cfg,
                state: &self.state,
            },
            parent: env.scope,
        };
        let scoped = Env {
            scope: Some(&scope),
            ..env
        };
        eval(expr, scoped)
    }

    /// Evaluates an optional clause for truthiness with this query in
    /// scope.
    fn clause_true(&self, expr: Option<&Expr>, env: Env<'_>) -> Result<bool> {
        let scope = ScopeNode {
            kind: ScopeKind::Query {
                cfg: &self.cfg,
                state: &self.state,
            },
            parent: env.scope,
        };
        let scoped = Env {
            scope: Some(&scope),
            ..env
        };
        eval_true(expr, scoped)
    }

    /// The current document.
    pub fn doc(&self, env: Env<'_>, name: Option<&str>) -> Result<Json> {
        if let Some(name) = name {
            return Ok(
                query_doc_named(&self.cfg, &self.state, name).unwrap_or_else(JsonValue::null)
            );
        }
        match self.state.doc_from {
            DocFrom::Ordered => Ok(self
                .state
                .saved
                .as_ref()
                .and_then(|t| t.last().cloned())
                .unwrap_or_else(JsonValue::null)),
            DocFrom::Distincted => Ok(self
                .state
                .saved
                .as_ref()
                .and_then(|t| t.first().cloned())
                .unwrap_or_else(JsonValue::null)),
            DocFrom::Grouped | DocFrom::DataSrc => match &self.cfg.result {
                Some(result) => self.eval_scoped(result, env),
                None => Ok(self.composite_doc()),
            },
        }
    }

    /// The composite document when no result expression was written.
    fn composite_doc(&self) -> Json {
        match self.state.doc_from {
            DocFrom::DataSrc => self
                .state
                .src
                .as_ref()
                .map_or_else(JsonValue::null, SrcExec::composite),
            _ => self
                .state
                .saved
                .as_ref()
                .and_then(|t| t.get(self.cfg.group_by.len()).cloned())
                .unwrap_or_else(JsonValue::null),
        }
    }

    /// Snapshots the per-leaf documents backing the current row.
    fn current_leaves(&self) -> Tuple {
        match self.state.doc_from {
            DocFrom::DataSrc => {
                let mut out = Vec::new();
                if let Some(src) = self.state.src.as_ref() {
                    src.cache_save(&mut out);
                }
                out
            }
            DocFrom::Grouped => self
                .state
                .saved
                .as_ref()
                .map(|t| t[self.cfg.group_by.len()..].to_vec())
                .unwrap_or_default(),
            DocFrom::Distincted => self
                .state
                .saved
                .as_ref()
                .map(|t| t[1..].to_vec())
                .unwrap_or_default(),
            DocFrom::Ordered => Vec::new(),
        }
    }

    /// Advances to the next result row.
    pub fn step(&mut self, env: Env<'_>) -> Result<StepResult> {
        self.step_limit(env)
    }

    // --- limit stage ---

    fn step_limit(&mut self, env: Env<'_>) -> Result<StepResult> {
        if !self.state.limit_evaluated {
            self.state.limit_left = match &self.cfg.limit {
                None => None,
                Some(expr) => {
                    let n = round_to_count(self.eval_scoped(expr, env)?.as_ref());
                    if n < 0 {
                        None
                    } else {
                        Some(n)
                    }
                }
            };
            self.state.limit_evaluated = true;
        }
        if self.state.limit_left == Some(0) {
            return Ok(StepResult::Done);
        }
        let r = self.step_offset(env)?;
        if r == StepResult::Row {
            if let Some(n) = self.state.limit_left.as_mut() {
                *n -= 1;
            }
        }
        Ok(r)
    }

    // --- offset stage ---

    fn step_offset(&mut self, env: Env<'_>) -> Result<StepResult> {
        if !self.state.offset_applied {
            self.state.offset_applied = true;
            if let Some(expr) = self.cfg.offset.clone() {
                let n = round_to_count(self.eval_scoped(&expr, env)?.as_ref()).max(0);
                for _ in 0..n {
                    if self.step_ordered(env)? == StepResult::Done {
                        break;
                    }
                }
            }
        }
        self.step_ordered(env)
    }

    // --- ordered stage ---

    fn step_ordered(&mut self, env: Env<'_>) -> Result<StepResult> {
        if self.cfg.order_by.is_empty() {
            return self.step_distinct(env);
        }

        if self.state.ordered.is_none() {
            let mut buf: Vec<Tuple> = Vec::new();
            while self.step_distinct(env)? == StepResult::Row {
                let mut tuple = Vec::with_capacity(self.cfg.order_by.len() + 1);
                for item in &self.cfg.order_by {
                    tuple.push(self.eval_scoped(&item.expr, env)?);
                }
                tuple.push(self.doc(env, None)?);
                buf.push(tuple);
            }
            buf.sort_by(|a, b| compare_keyed(a, b, &self.cfg.order_by));
            self.state.ordered = Some(buf);
            self.state.ordered_pos = 0;
        }

        let Some(buf) = self.state.ordered.as_ref() else {
            return Ok(StepResult::Done);
        };
        if self.state.ordered_pos >= buf.len() {
            return Ok(StepResult::Done);
        }
        let tuple = buf[self.state.ordered_pos].clone();
        self.state.ordered_pos += 1;
        self.state.saved = Some(tuple);
        self.state.doc_from = DocFrom::Ordered;
        Ok(StepResult::Row)
    }

    // --- distinct stage ---

    fn step_distinct(&mut self, env: Env<'_>) -> Result<StepResult> {
        if !self.cfg.distinct {
            return self.step_grouped(env);
        }

        if self.state.distincted.is_none() {
            let mut buf: Vec<Tuple> = Vec::new();
            while self.step_grouped(env)? == StepResult::Row {
                let mut tuple = vec![self.doc(env, None)?];
                tuple.extend(self.current_leaves());
                buf.push(tuple);
            }
            buf.sort_by(|a, b| compare(&a[0], &b[0]));
            self.state.distincted = Some(buf);
            self.state.distinct_pos = 0;
        }

        loop {
            let Some(buf) = self.state.distincted.as_ref() else {
                return Ok(StepResult::Done);
            };
            let pos = self.state.distinct_pos;
            if pos >= buf.len() {
                return Ok(StepResult::Done);
            }
            let is_dup = pos > 0 && compare(&buf[pos][0], &buf[pos - 1][0]) == Ordering::Equal;
            let tuple = buf[pos].clone();
            self.state.distinct_pos += 1;
            if is_dup {
                continue;
            }
            self.state.saved = Some(tuple);
            self.state.doc_from = DocFrom::Distincted;
            return Ok(StepResult::Row);
        }
    }

    // --- grouped stage ---

    fn step_grouped(&mut self, env: Env<'_>) -> Result<StepResult> {
        if self.cfg.aggs.is_empty() && self.cfg.group_by.is_empty() {
            return self.step_whered(env);
        }
        if self.cfg.group_by.is_empty() {
            return self.step_plain_aggregate(env);
        }
        self.step_group_by(env)
    }

    /// Aggregate without GROUP BY: drain the filtered rows, accumulate,
    /// and yield exactly one row (subject to HAVING).
    fn step_plain_aggregate(&mut self, env: Env<'_>) -> Result<StepResult> {
        if self.state.agg_emitted {
            return Ok(StepResult::Done);
        }
        self.state.agg_emitted = true;

        let mut leaves: Tuple = Vec::new();
        loop {
            if self.step_whered(env)? == StepResult::Done {
                break;
            }
            let arg_values = self.eval_agg_args(env)?;
            for (acc, values) in self.state.accums.iter_mut().zip(&arg_values) {
                acc.step(values);
            }
            leaves = self.current_leaves();
        }
        for acc in &mut self.state.accums {
            acc.finalize();
        }
        if leaves.is_empty() {
            let n = self.state.src.as_ref().map_or(0, SrcExec::leaf_count);
            leaves = vec![JsonValue::null(); n];
        }
        self.state.saved = Some(leaves);
        self.state.doc_from = DocFrom::Grouped;

        if self.clause_true(self.cfg.having.as_ref(), env)? {
            Ok(StepResult::Row)
        } else {
            Ok(StepResult::Done)
        }
    }

    /// Aggregate with GROUP BY: drain into a stably sorted key/leaf list,
    /// then yield one row per adjacent-equal-key group.
    fn step_group_by(&mut self, env: Env<'_>) -> Result<StepResult> {
        if self.state.grouped.is_none() {
            let mut buf: Vec<Tuple> = Vec::new();
            while self.step_whered(env)? == StepResult::Row {
                let mut tuple = Vec::with_capacity(self.cfg.group_by.len());
                for item in &self.cfg.group_by {
                    tuple.push(self.eval_scoped(&item.expr, env)?);
                }
                if let Some(src) = self.state.src.as_ref() {
                    src.cache_save(&mut tuple);
                }
                buf.push(tuple);
            }
            buf.sort_by(|a, b| compare_keyed(a, b, &self.cfg.group_by));
            self.state.grouped = Some(buf);
            self.state.grouped_pos = 0;
        }

        let width = self.cfg.group_by.len();
        loop {
            let group: Vec<Tuple> = {
                let Some(buf) = self.state.grouped.as_ref() else {
                    return Ok(StepResult::Done);
                };
                let start = self.state.grouped_pos;
                if start >= buf.len() {
                    return Ok(StepResult::Done);
                }
                let mut end = start + 1;
                while end < buf.len() && keys_equal(&buf[start], &buf[end], width) {
                    end += 1;
                }
                self.state.grouped_pos = end;
                buf[start..end].to_vec()
            };

            for acc in &mut self.state.accums {
                acc.reset();
            }
            self.state.doc_from = DocFrom::Grouped;
            for tuple in &group {
                self.state.saved = Some(tuple.clone());
                let arg_values = self.eval_agg_args(env)?;
                for (acc, values) in self.state.accums.iter_mut().zip(&arg_values) {
                    acc.step(values);
                }
            }
            for acc in &mut self.state.accums {
                acc.finalize();
            }
            self.state.saved = group.last().cloned();

            if self.clause_true(self.cfg.having.as_ref(), env)? {
                return Ok(StepResult::Row);
            }
        }
    }

    /// Evaluates every aggregate's argument expressions against the
    /// current row.
    fn eval_agg_args(&self, env: Env<'_>) -> Result<Vec<Vec<Json>>> {
        let mut all = Vec::with_capacity(self.cfg.aggs.len());
        for spec in &self.cfg.aggs {
            let mut values = Vec::with_capacity(spec.args.len());
            for arg in &spec.args {
                values.push(self.eval_scoped(arg, env)?);
            }
            all.push(values);
        }
        Ok(all)
    }

    // --- whered stage ---

    fn step_whered(&mut self, env: Env<'_>) -> Result<StepResult> {
        loop {
            let stepped = match self.state.src.as_mut() {
                Some(src) => src.step(env)?,
                None => {
                    // A SELECT with no FROM clause yields exactly one row.
                    if self.state.no_from_emitted {
                        StepResult::Done
                    } else {
                        self.state.no_from_emitted = true;
                        StepResult::Row
                    }
                }
            };
            if stepped == StepResult::Done {
                return Ok(StepResult::Done);
            }
            if self.clause_true(self.cfg.where_clause.as_ref(), env)? {
                return Ok(StepResult::Row);
            }
        }
    }
}

/// Numeric coercion for LIMIT/OFFSET: coerce, round, and truncate to an
/// integer count.
#[allow(clippy::cast_possible_truncation)]
fn round_to_count(value: &JsonValue) -> i64 {
    value.to_real_or_nan().round() as i64
}

//! The expression contract and the shared handle around it.
//!
//! An expression describes how to compute one node value from the values of
//! its source expressions. Expressions form a DAG (sources may be shared) and
//! expose a lazily materialized tree of children by step.
//!
//! Invariants:
//! - `calculate` on a leaf expression (`data_type().is_some()`) returns a leaf
//!   value; otherwise it returns a root or child value.
//! - An identity expression has exactly one source and returns it unchanged.
//! - `calculation_equal` is reflexive and symmetric and ignores sources.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use prensor_core::config::CalcOptions;
use prensor_core::error::{Error, Result};
use prensor_core::id::ExprId;
use prensor_core::node::NodeValue;
use prensor_core::path::{Path, Step};
use prensor_core::prensor::Prensor;
use prensor_core::schema::DataType;

pub type ExprRef = Arc<Expr>;

/// Upcast to `Any` so implementations can compare themselves by concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// True if `a` and `b` are the same object.
pub fn same_object(a: &dyn Expression, b: &dyn Expression) -> bool {
    std::ptr::eq(
        a.as_any() as *const dyn Any as *const (),
        b.as_any() as *const dyn Any as *const (),
    )
}

/// Where a placeholder finds its value in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderBinding {
    /// The feed entry keyed by this expression's own id.
    Root,
    /// The subtree at `path` of the feed entry keyed by `root`.
    Descendant { root: ExprId, path: Path },
}

/// Inputs to one `calculate` call.
pub struct CalcContext<'a> {
    /// Values of `sources()`, in order.
    pub sources: &'a [Arc<NodeValue>],
    /// Expressions that read this one (after canonicalization).
    pub destinations: &'a [ExprRef],
    pub options: &'a CalcOptions,
    /// The bound subtree, for placeholders.
    pub side_info: Option<&'a Prensor>,
}

impl<'a> CalcContext<'a> {
    /// The single source of a unary expression.
    pub fn single_source(&self, kind: &str) -> Result<&'a Arc<NodeValue>> {
        match self.sources {
            [only] => Ok(only),
            other => Err(Error::Invariant(format!(
                "{} expected one source, got {}",
                kind,
                other.len()
            ))),
        }
    }

    /// Exactly two sources.
    pub fn source_pair(&self, kind: &str) -> Result<(&'a Arc<NodeValue>, &'a Arc<NodeValue>)> {
        match self.sources {
            [a, b] => Ok((a, b)),
            other => Err(Error::Invariant(format!(
                "{} expected two sources, got {}",
                kind,
                other.len()
            ))),
        }
    }
}

/// Trait that every kind of expression must implement.
pub trait Expression: AsAny + Send + Sync + 'static {
    /// Stable name of the computation. Nodes are only merged with nodes of the
    /// same kind.
    fn kind(&self) -> &'static str;

    fn is_repeated(&self) -> bool;

    /// `None` for roots and internal children.
    fn data_type(&self) -> Option<DataType>;

    fn sources(&self) -> Vec<ExprRef>;

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>>;

    fn is_identity(&self) -> bool {
        false
    }

    /// Same function of its inputs as `other`. Defaults to object identity.
    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        std::ptr::eq(
            self.as_any() as *const dyn Any as *const (),
            other.as_any() as *const dyn Any as *const (),
        )
    }

    /// Build the child named `step`. `this` is the handle wrapping `self`.
    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef>;

    fn known_field_names(&self) -> BTreeSet<Step>;

    fn validate_step_format(&self) -> bool {
        true
    }

    fn placeholder_binding(&self) -> Option<PlaceholderBinding> {
        None
    }
}

/// A shared, identity-carrying expression node.
///
/// Children are memoized weakly: asking twice for the same child returns the
/// same `Expr` for as long as anyone holds it, and children may point back at
/// their parent without creating a reference cycle.
pub struct Expr {
    id: ExprId,
    inner: Box<dyn Expression>,
    children: Mutex<BTreeMap<Step, Weak<Expr>>>,
}

impl Expr {
    pub fn new<E: Expression>(inner: E) -> ExprRef {
        Arc::new(Self {
            id: ExprId::next(),
            inner: Box::new(inner),
            children: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn id(&self) -> ExprId {
        self.id
    }

    pub fn inner(&self) -> &dyn Expression {
        self.inner.as_ref()
    }

    pub fn downcast_ref<T: Expression>(&self) -> Option<&T> {
        self.inner.as_ref().as_any().downcast_ref::<T>()
    }

    pub fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    pub fn is_repeated(&self) -> bool {
        self.inner.is_repeated()
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.inner.data_type()
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.data_type().is_some()
    }

    pub fn sources(&self) -> Vec<ExprRef> {
        self.inner.sources()
    }

    pub fn is_identity(&self) -> bool {
        self.inner.is_identity()
    }

    pub fn calculation_equal(&self, other: &Expr) -> bool {
        self.inner.calculation_equal(other.inner())
    }

    pub fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        self.inner.calculate(ctx)
    }

    pub fn known_field_names(&self) -> BTreeSet<Step> {
        self.inner.known_field_names()
    }

    pub fn validate_step_format(&self) -> bool {
        self.inner.validate_step_format()
    }

    pub fn placeholder_binding(&self) -> Option<PlaceholderBinding> {
        self.inner.placeholder_binding()
    }

    pub fn get_child(self: &Arc<Self>, step: &Step) -> Option<ExprRef> {
        if let Some(hit) = self.cached_child(step) {
            return Some(hit);
        }
        // Built without the lock held: child construction may look up other children.
        let built = self.inner.child(self, step)?;
        let mut cache = self
            .children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(raced) = cache.get(step).and_then(Weak::upgrade) {
            return Some(raced);
        }
        cache.insert(step.clone(), Arc::downgrade(&built));
        Some(built)
    }

    fn cached_child(&self, step: &Step) -> Option<ExprRef> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(step)
            .and_then(Weak::upgrade)
    }

    pub fn get_child_or_error(self: &Arc<Self>, step: &Step) -> Result<ExprRef> {
        self.get_child(step)
            .ok_or_else(|| Error::MissingPath(format!("no such field: {}", step)))
    }

    pub fn get_descendant(self: &Arc<Self>, p: &Path) -> Option<ExprRef> {
        let mut cur = Arc::clone(self);
        for step in p.steps() {
            cur = cur.get_child(step)?;
        }
        Some(cur)
    }

    pub fn get_descendant_or_error(self: &Arc<Self>, p: &Path) -> Result<ExprRef> {
        self.get_descendant(p).ok_or_else(|| {
            Error::MissingPath(format!("{} in\n{}", p, self.schema_string(Some(20))))
        })
    }

    pub fn get_known_children(self: &Arc<Self>) -> Result<BTreeMap<Step, ExprRef>> {
        self.known_field_names()
            .into_iter()
            .map(|name| {
                let child = self.get_child_or_error(&name)?;
                Ok((name, child))
            })
            .collect()
    }

    /// Every known subexpression keyed by its path relative to `self`
    /// (which is included at the empty path).
    ///
    /// Only terminates for expressions whose known children are finite;
    /// project first when in doubt.
    pub fn get_known_descendants(self: &Arc<Self>) -> Result<BTreeMap<Path, ExprRef>> {
        let base = if self.validate_step_format() {
            Path::root()
        } else {
            Path::lenient(Vec::<Step>::new())
        };
        let mut out = BTreeMap::new();
        self.collect_known_descendants(&base, &mut out)?;
        Ok(out)
    }

    fn collect_known_descendants(
        self: &Arc<Self>,
        at: &Path,
        out: &mut BTreeMap<Path, ExprRef>,
    ) -> Result<()> {
        for (step, child) in self.get_known_children()? {
            let child_path = at.join_step(&step);
            child.collect_known_descendants(&child_path, out)?;
        }
        out.insert(at.clone(), Arc::clone(self));
        Ok(())
    }

    /// A human-readable outline of the known tree, `limit` levels deep.
    pub fn schema_string(self: &Arc<Self>, limit: Option<usize>) -> String {
        self.schema_lines(&Step::from("<root>"), limit).join("\n")
    }

    fn schema_lines(self: &Arc<Self>, name: &Step, limit: Option<usize>) -> Vec<String> {
        let cardinality = if self.is_repeated() { "repeated" } else { "optional" };
        let mut lines = vec![match self.data_type() {
            None => format!("{} {}:", cardinality, name),
            Some(dt) => format!("{} {} {}", cardinality, dt, name),
        }];
        let children = self.get_known_children().unwrap_or_default();
        if limit == Some(0) {
            if !children.is_empty() {
                lines.push("  ...".to_string());
            }
            return lines;
        }
        let next = limit.map(|l| l - 1);
        for (step, child) in children {
            lines.extend(
                child
                    .schema_lines(&step, next)
                    .into_iter()
                    .map(|l| format!("  {}", l)),
            );
        }
        lines
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("is_repeated", &self.is_repeated())
            .field("data_type", &self.data_type())
            .finish()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind(), self.id)
    }
}

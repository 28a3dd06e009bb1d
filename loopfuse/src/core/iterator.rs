//! Iterator tags and the index expressions that carry them.
//!
//! An [`IteratorTag`] is an integer marker placed in a slice bound to ask the
//! indexing adapter for a sliding view. Index expressions are explicit sum
//! types, so a tagged bound is always distinguishable from a plain one.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Integer-valued marker requesting a sliding view along a slice.
///
/// Arithmetic with plain integers stays tagged, so `tag + 1` is still
/// recognized further down the indexing path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IteratorTag(i64);

impl IteratorTag {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

/// Create an iterator tag starting at `start`.
pub fn get_iterator(start: i64) -> IteratorTag {
    IteratorTag::new(start)
}

impl From<i64> for IteratorTag {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<IteratorTag> for i64 {
    fn from(tag: IteratorTag) -> Self {
        tag.0
    }
}

impl Add<i64> for IteratorTag {
    type Output = IteratorTag;

    fn add(self, rhs: i64) -> IteratorTag {
        IteratorTag(self.0 + rhs)
    }
}

impl Sub<i64> for IteratorTag {
    type Output = IteratorTag;

    fn sub(self, rhs: i64) -> IteratorTag {
        IteratorTag(self.0 - rhs)
    }
}

impl AddAssign<i64> for IteratorTag {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

impl SubAssign<i64> for IteratorTag {
    fn sub_assign(&mut self, rhs: i64) {
        self.0 -= rhs;
    }
}

impl PartialEq<i64> for IteratorTag {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i64> for IteratorTag {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for IteratorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a slice: either a plain integer or an iterator tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Fixed(i64),
    Iter(IteratorTag),
}

impl Bound {
    pub fn value(self) -> i64 {
        match self {
            Bound::Fixed(value) => value,
            Bound::Iter(tag) => tag.value(),
        }
    }

    pub fn is_iter(self) -> bool {
        matches!(self, Bound::Iter(_))
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Fixed(value)
    }
}

impl From<IteratorTag> for Bound {
    fn from(tag: IteratorTag) -> Self {
        Bound::Iter(tag)
    }
}

/// `start:stop:step` with optional parts, NumPy style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<Bound>,
    pub stop: Option<Bound>,
    pub step: Option<i64>,
}

impl SliceSpec {
    /// The full slice `:`.
    pub fn full() -> Self {
        Self::default()
    }

    pub fn new(start: impl Into<Bound>, stop: impl Into<Bound>) -> Self {
        Self {
            start: Some(start.into()),
            stop: Some(stop.into()),
            step: None,
        }
    }

    pub fn from_start(start: impl Into<Bound>) -> Self {
        Self {
            start: Some(start.into()),
            ..Self::default()
        }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// True if the start or stop bound is an iterator tag.
    pub fn has_iterator(&self) -> bool {
        self.start.is_some_and(Bound::is_iter) || self.stop.is_some_and(Bound::is_iter)
    }

    /// Plain selector with every part kept.
    pub fn to_static(&self) -> StaticSelector {
        StaticSelector::Slice {
            start: self.start.map(Bound::value),
            stop: self.stop.map(Bound::value),
            step: self.step,
        }
    }

    /// Plain selector for a tagged slice: bounds are untagged and the step is
    /// dropped, because it describes the per-iteration advance instead.
    pub fn strip(&self) -> StaticSelector {
        StaticSelector::Slice {
            start: self.start.map(Bound::value),
            stop: self.stop.map(Bound::value),
            step: None,
        }
    }

    /// Per-iteration stride encoded by this slice's step.
    pub fn slide_stride(&self) -> i64 {
        self.step.unwrap_or(1)
    }
}

/// Per-dimension selector inside a multi-dimensional index expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Slice(SliceSpec),
    Index(i64),
}

/// Index expression accepted by the indexing adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexExpr {
    /// A single slice applied to the first dimension.
    Slice(SliceSpec),
    /// One selector per leading dimension.
    Dims(Vec<Selector>),
}

/// Tag-free selector understood by engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticSelector {
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    Index(i64),
}

impl StaticSelector {
    pub fn range(start: i64, stop: i64) -> Self {
        StaticSelector::Slice {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }
}

/// Result of splitting an index expression into static indexing plus slides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidePlan {
    pub selectors: Vec<StaticSelector>,
    /// `(dimension, stride)` pairs, dimensions counted on the resulting view.
    pub slides: Vec<(usize, i64)>,
}

/// Split `expr` into tag-free selectors and the slides its tags request.
///
/// Scalar selectors drop their dimension, so a slide's dimension is the
/// position of its slice among the dimensions the view keeps.
pub fn plan_index(expr: &IndexExpr) -> SlidePlan {
    match expr {
        IndexExpr::Slice(slice) if slice.has_iterator() => SlidePlan {
            selectors: vec![slice.strip()],
            slides: vec![(0, slice.slide_stride())],
        },
        IndexExpr::Slice(slice) => SlidePlan {
            selectors: vec![slice.to_static()],
            slides: Vec::new(),
        },
        IndexExpr::Dims(dims) => {
            let mut plan = SlidePlan::default();
            let mut view_dim = 0usize;
            for selector in dims {
                match selector {
                    Selector::Slice(slice) if slice.has_iterator() => {
                        plan.selectors.push(slice.strip());
                        plan.slides.push((view_dim, slice.slide_stride()));
                        view_dim += 1;
                    }
                    Selector::Slice(slice) => {
                        plan.selectors.push(slice.to_static());
                        view_dim += 1;
                    }
                    Selector::Index(index) => plan.selectors.push(StaticSelector::Index(*index)),
                }
            }
            plan
        }
    }
}

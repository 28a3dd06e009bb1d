//! Sliding views and the indexing adapter that derives them from iterator tags.
//!
//! Slides must be registered at the top of a loop body, before anything reads
//! the view. The engine applies all of them together at the iteration
//! boundary. Nothing here checks bounds: sliding a view past its base is the
//! caller's problem.

use std::ops::Deref;

use anyhow::{Context, Result};
use tracing::trace;

use crate::core::iterator::{IndexExpr, plan_index};
use crate::engine::Engine;

/// Register `(dimension, stride)` advances on `view` and hand the view back.
pub fn slide_view<E: Engine>(
    engine: &mut E,
    view: E::Array,
    slides: &[(usize, i64)],
) -> Result<E::Array> {
    for &(dim, stride) in slides {
        engine
            .slide_view(&view, dim, stride)
            .with_context(|| format!("register slide on dimension {dim} (stride {stride})"))?;
    }
    Ok(view)
}

/// Array wrapper whose indexing understands iterator tags.
///
/// Everything other than [`IterArray::index`] goes straight to the wrapped
/// handle through `Deref`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterArray<A> {
    inner: A,
}

impl<A> IterArray<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    /// Index the wrapped array.
    ///
    /// Without iterator tags this is plain static indexing. With tags, the
    /// tagged bounds are used as plain integers for the static selection and
    /// each tagged slice registers a slide whose stride is the slice step
    /// (1 when absent).
    pub fn index<E>(&self, engine: &mut E, expr: &IndexExpr) -> Result<A>
    where
        E: Engine<Array = A>,
    {
        let plan = plan_index(expr);
        let view = engine.view(&self.inner, &plan.selectors)?;
        if plan.slides.is_empty() {
            return Ok(view);
        }
        trace!(slides = ?plan.slides, "deriving sliding view from iterator tags");
        slide_view(engine, view, &plan.slides)
    }
}

impl<A> From<A> for IterArray<A> {
    fn from(inner: A) -> Self {
        Self::new(inner)
    }
}

impl<A> Deref for IterArray<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.inner
    }
}

impl<A> AsRef<A> for IterArray<A> {
    fn as_ref(&self) -> &A {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::iterator::{Selector, SliceSpec, StaticSelector, get_iterator};
    use crate::core::types::DType;
    use crate::test_support::{EngineCall, RecordingEngine};

    #[test]
    fn slide_view_registers_in_order_and_returns_the_view() {
        let mut engine = RecordingEngine::new();
        let view = engine.view_of(DType::Float64, &[4, 4]);
        let returned = slide_view(&mut engine, view.clone(), &[(0, 2), (1, -1)]).expect("slide");

        assert_eq!(returned, view);
        assert_eq!(
            engine.calls,
            vec![
                EngineCall::Slide {
                    view: view.clone(),
                    dim: 0,
                    stride: 2
                },
                EngineCall::Slide {
                    view,
                    dim: 1,
                    stride: -1
                },
            ]
        );
    }

    #[test]
    fn untagged_index_registers_nothing() {
        let mut engine = RecordingEngine::new();
        let base = engine.base(DType::Float64, &[8]);
        let wrapped = IterArray::new(base.clone());
        wrapped
            .index(&mut engine, &IndexExpr::Slice(SliceSpec::new(1, 4)))
            .expect("index");

        assert!(engine.slides().is_empty());
        assert_eq!(
            engine.calls,
            vec![EngineCall::View {
                array: base,
                selectors: vec![StaticSelector::range(1, 4)]
            }]
        );
    }

    #[test]
    fn tagged_stop_registers_one_slide_with_step_stride() {
        let mut engine = RecordingEngine::new();
        let base = engine.base(DType::Float64, &[8]);
        let wrapped = IterArray::from(base);
        let i = get_iterator(3);
        let view = wrapped
            .index(
                &mut engine,
                &IndexExpr::Slice(SliceSpec::new(0, i).with_step(3)),
            )
            .expect("index");

        assert_eq!(engine.slides(), vec![(0, 3)]);
        assert!(matches!(
            engine.calls.last(),
            Some(EngineCall::Slide { view: slid, .. }) if *slid == view
        ));
    }

    #[test]
    fn multi_dim_tags_slide_their_own_dimensions() {
        let mut engine = RecordingEngine::new();
        let base = engine.base(DType::Float64, &[6, 6]);
        let wrapped = IterArray::new(base);
        let i = get_iterator(0);
        wrapped
            .index(
                &mut engine,
                &IndexExpr::Dims(vec![
                    Selector::Slice(SliceSpec::new(i, i + 2)),
                    Selector::Slice(SliceSpec::new(i + 1, i + 3).with_step(2)),
                ]),
            )
            .expect("index");

        assert_eq!(engine.slides(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn deref_forwards_to_the_wrapped_handle() {
        let mut engine = RecordingEngine::new();
        let base = engine.base(DType::Int64, &[3]);
        let wrapped = IterArray::new(base.clone());
        assert_eq!(wrapped.shape, vec![3]);
        assert!(engine.is_base(&wrapped));
        assert_eq!(wrapped.into_inner(), base);
    }
}

//! Per-parameter rate limiting for sample streams

use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

use crate::types::ParameterSample;

/// Extension trait to add coalescing to any sample stream
pub trait CoalesceExt: Stream<Item = Arc<ParameterSample>> {
    /// Emit at most one sample per parameter per interval
    ///
    /// Uses "latest-wins" semantics per tag: if a parameter is sampled
    /// several times within an interval only its newest sample is emitted,
    /// and different parameters never displace each other.
    fn coalesce(self, period: Duration) -> Coalesce<Self>
    where
        Self: Sized,
    {
        Coalesce::new(self, period)
    }
}

impl<T: Stream<Item = Arc<ParameterSample>>> CoalesceExt for T {}

pin_project! {
    /// A stream combinator that keeps the latest sample per tag
    pub struct Coalesce<S> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: BTreeMap<u32, Arc<ParameterSample>>,
        ready: VecDeque<Arc<ParameterSample>>,
        done: bool,
    }
}

impl<S> Coalesce<S>
where
    S: Stream<Item = Arc<ParameterSample>>,
{
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: BTreeMap::new(), ready: VecDeque::new(), done: false }
    }
}

impl<S> Stream for Coalesce<S>
where
    S: Stream<Item = Arc<ParameterSample>>,
{
    type Item = Arc<ParameterSample>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if let Some(sample) = this.ready.pop_front() {
            return Poll::Ready(Some(sample));
        }

        // Drain everything available, newest sample per tag wins
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(sample)) => {
                    this.pending.insert(sample.tag, sample);
                }
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if *this.done {
            // Flush without waiting for the next tick
            let flushed = std::mem::take(this.pending);
            this.ready.extend(flushed.into_values());
            return Poll::Ready(this.ready.pop_front());
        }

        if this.pending.is_empty() {
            return Poll::Pending;
        }

        match this.interval.poll_tick(cx) {
            Poll::Ready(_) => {
                let due = std::mem::take(this.pending);
                this.ready.extend(due.into_values());
                Poll::Ready(this.ready.pop_front())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

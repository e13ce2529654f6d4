//! Admission: resolve a descriptor to a flow, then enqueue.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use helix_core::PacketId;
use helix_fq::{Clock, FairQueueScheduler, SystemClock};
use tracing::debug;

use crate::error::AdmissionError;
use crate::resolver::FlowResolver;

/// Ingress front door of a scheduler.
///
/// `D` is the descriptor type the resolver understands.
pub struct Admission<D: ?Sized, R, T, C = SystemClock> {
    resolver: R,
    scheduler: Arc<FairQueueScheduler<T, C>>,
    _descriptor: PhantomData<fn(&D)>,
}

impl<D, R, T, C> Admission<D, R, T, C>
where
    D: ?Sized,
    R: FlowResolver<D>,
    C: Clock,
{
    /// Creates an admission front door over `scheduler`.
    #[must_use]
    pub const fn new(resolver: R, scheduler: Arc<FairQueueScheduler<T, C>>) -> Self {
        Self {
            resolver,
            scheduler,
            _descriptor: PhantomData,
        }
    }

    /// Returns the scheduler work is admitted to.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<FairQueueScheduler<T, C>> {
        &self.scheduler
    }

    /// Resolves `descriptor` and enqueues `payload` on its flow.
    ///
    /// # Errors
    /// Returns `AdmissionError::Unresolved` if the descriptor has no flow,
    /// or the scheduler's error if the enqueue is rejected.
    pub fn admit(&self, descriptor: &D, payload: T) -> Result<PacketId, AdmissionError> {
        let flow = self
            .resolver
            .resolve(descriptor)
            .ok_or(AdmissionError::Unresolved)?;
        let packet = self.scheduler.enqueue(flow, payload)?;
        debug!(%flow, %packet, "admitted");
        Ok(packet)
    }

    /// Like [`Admission::admit`], with a per-packet service estimate.
    ///
    /// # Errors
    /// Returns `AdmissionError::Unresolved` if the descriptor has no flow,
    /// or the scheduler's error if the enqueue is rejected.
    pub fn admit_with_estimate(
        &self,
        descriptor: &D,
        payload: T,
        estimate: Duration,
    ) -> Result<PacketId, AdmissionError> {
        let flow = self
            .resolver
            .resolve(descriptor)
            .ok_or(AdmissionError::Unresolved)?;
        let packet = self
            .scheduler
            .enqueue_with_estimate(flow, payload, estimate)?;
        debug!(%flow, %packet, estimate_ns = helix_fq::duration_to_nanos(estimate), "admitted");
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use helix_core::FlowKey;
    use helix_fq::{FairQueueConfig, FqError, ManualClock};

    use super::*;
    use crate::resolver::{HashFlowResolver, StaticFlowResolver};

    fn scheduler(flows: u64) -> Arc<FairQueueScheduler<&'static str, ManualClock>> {
        Arc::new(
            FairQueueScheduler::with_flow_count(
                flows,
                FairQueueConfig::for_testing(),
                ManualClock::new(0),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_admit_routes_by_descriptor() {
        let resolver = StaticFlowResolver::new()
            .with_route("tenant-a", FlowKey::new(0))
            .with_route("tenant-b", FlowKey::new(1));
        let admission = Admission::new(resolver, scheduler(2));

        admission.admit(&"tenant-b", "req-1").unwrap();
        let packet = admission.scheduler().dequeue().unwrap();
        assert_eq!(packet.flow(), FlowKey::new(1));
        assert_eq!(*packet.payload(), "req-1");
    }

    #[test]
    fn test_unresolved_descriptor() {
        let resolver: StaticFlowResolver<&str> = StaticFlowResolver::new();
        let admission = Admission::new(resolver, scheduler(2));
        assert_eq!(
            admission.admit(&"nobody", "req"),
            Err(AdmissionError::Unresolved)
        );
    }

    #[test]
    fn test_resolved_to_missing_queue() {
        let resolver = StaticFlowResolver::new().with_default(FlowKey::new(9));
        let admission = Admission::new(resolver, scheduler(2));
        assert_eq!(
            admission.admit(&"x", "req"),
            Err(AdmissionError::Scheduler(FqError::NoSuchQueue {
                flow: FlowKey::new(9)
            }))
        );
    }

    #[test]
    fn test_hash_admission_with_estimate() {
        let admission: Admission<str, _, _, _> =
            Admission::new(HashFlowResolver::new(3).unwrap(), scheduler(3));
        admission
            .admit_with_estimate("user-42", "req", Duration::from_nanos(250))
            .unwrap();

        let packet = admission.scheduler().dequeue().unwrap();
        assert_eq!(packet.estimated_service(), Duration::from_nanos(250));
    }
}

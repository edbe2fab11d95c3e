//! The flow controller (§4.6): admission control bounding outstanding secondary work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::operation::RequestResourcesDescription;

/// A granted reservation. Dropping it releases whatever resources it holds. Opaque to the
/// dispatcher: it only needs to outlive the secondary dispatch and verification it guards.
pub struct Reservation {
    _guard: Box<dyn Send + Sync>,
}

impl Reservation {
    pub fn new(guard: impl Send + Sync + 'static) -> Self {
        Reservation {
            _guard: Box::new(guard),
        }
    }
}

/// `acquire(description) -> deferred reservation | denial`. Implementations are expected to bound
/// outstanding secondary operations by count and/or bytes; a denial is a policy outcome, not an
/// error of the core.
#[async_trait]
pub trait FlowController: Send + Sync + 'static {
    async fn acquire(&self, description: RequestResourcesDescription) -> Option<Reservation>;
}

/// A flow controller with no effect: every reservation is granted immediately. Useful for tests
/// and for callers who want unconditional mirroring.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboundedFlowController;

#[async_trait]
impl FlowController for UnboundedFlowController {
    async fn acquire(&self, _description: RequestResourcesDescription) -> Option<Reservation> {
        Some(Reservation::new(()))
    }
}

/// The bundled flow controller: bounds outstanding secondary operations by count (a semaphore)
/// and, optionally, by approximate outstanding byte size. Admission is non-blocking — a request
/// that doesn't fit is denied rather than queued, matching `mirroring.flow-controller.max-outstanding-requests`.
pub struct SemaphoreFlowController {
    permits: Arc<Semaphore>,
    max_outstanding_bytes: Option<usize>,
    outstanding_bytes: Arc<AtomicUsize>,
}

impl SemaphoreFlowController {
    pub fn new(max_outstanding_requests: usize) -> Self {
        SemaphoreFlowController {
            permits: Arc::new(Semaphore::new(max_outstanding_requests)),
            max_outstanding_bytes: None,
            outstanding_bytes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_max_outstanding_bytes(mut self, max_outstanding_bytes: usize) -> Self {
        self.max_outstanding_bytes = Some(max_outstanding_bytes);
        self
    }
}

struct SemaphoreReservation {
    _permit: tokio::sync::OwnedSemaphorePermit,
    reserved_bytes: usize,
    outstanding_bytes: Arc<AtomicUsize>,
}

impl Drop for SemaphoreReservation {
    fn drop(&mut self) {
        self.outstanding_bytes
            .fetch_sub(self.reserved_bytes, Ordering::SeqCst);
    }
}

#[async_trait]
impl FlowController for SemaphoreFlowController {
    async fn acquire(&self, description: RequestResourcesDescription) -> Option<Reservation> {
        let permit = self.permits.clone().try_acquire_owned().ok()?;

        if let Some(max_bytes) = self.max_outstanding_bytes {
            let reserved = description.approximate_byte_size;
            let mut current = self.outstanding_bytes.load(Ordering::SeqCst);
            loop {
                if current.saturating_add(reserved) > max_bytes {
                    return None;
                }
                match self.outstanding_bytes.compare_exchange_weak(
                    current,
                    current + reserved,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                ) {
                    Ok(_) => {
                        return Some(Reservation::new(SemaphoreReservation {
                            _permit: permit,
                            reserved_bytes: reserved,
                            outstanding_bytes: self.outstanding_bytes.clone(),
                        }))
                    }
                    Err(observed) => current = observed,
                }
            }
        }

        Some(Reservation::new(permit))
    }
}

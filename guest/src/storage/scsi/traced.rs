//! Tracing decorator for [`ScsiOps`].

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::field::{display, Empty};
use tracing::{info_span, Instrument, Span};
use uvm_guest_shared::errors::GuestResult;

use super::{MountRequest, ScsiAddress, ScsiOps};
use crate::context::OpContext;

/// Wraps each operation in a span carrying the controller and LUN, and
/// records the error on failure.
#[derive(Debug, Clone)]
pub struct Traced<T> {
    inner: T,
}

impl<T> Traced<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn record<R>(span: &Span, result: GuestResult<R>) -> GuestResult<R> {
    if let Err(e) = &result {
        span.record("error", display(e));
    }
    result
}

#[async_trait]
impl<T: ScsiOps> ScsiOps for Traced<T> {
    async fn mount(&self, ctx: &OpContext, request: &MountRequest) -> GuestResult<()> {
        let span = info_span!(
            "scsi::mount",
            controller = request.address.controller,
            lun = request.address.lun,
            readonly = request.readonly,
            error = Empty,
        );
        let result = self.inner.mount(ctx, request).instrument(span.clone()).await;
        record(&span, result)
    }

    async fn resolve_device_path(
        &self,
        ctx: &OpContext,
        address: ScsiAddress,
    ) -> GuestResult<PathBuf> {
        let span = info_span!(
            "scsi::resolve_device_path",
            controller = address.controller,
            lun = address.lun,
            error = Empty,
        );
        let result = self
            .inner
            .resolve_device_path(ctx, address)
            .instrument(span.clone())
            .await;
        record(&span, result)
    }

    async fn unplug(&self, ctx: &OpContext, address: ScsiAddress) -> GuestResult<()> {
        let span = info_span!(
            "scsi::unplug",
            controller = address.controller,
            lun = address.lun,
            error = Empty,
        );
        let result = self.inner.unplug(ctx, address).instrument(span.clone()).await;
        record(&span, result)
    }
}

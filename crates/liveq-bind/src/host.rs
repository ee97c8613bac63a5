#![forbid(unsafe_code)]

//! The rendering-unit side of the binding.

use liveq_core::TransportFault;

/// What the binding needs from its host rendering unit.
///
/// `request_render` may be called any number of times per logical
/// transition; the rendering layer coalesces. It must not synchronously
/// re-enter [`QueryBinding::execute`] — renders are scheduled, not nested.
///
/// `raise_fault` is the host's fault boundary: non-query-shaped subscription
/// errors are handed over here instead of being absorbed.
///
/// [`QueryBinding::execute`]: crate::QueryBinding::execute
pub trait RenderLink {
    /// Ask the rendering unit to render again.
    fn request_render(&self);

    /// Deliver an unrecoverable fault to the host's fault boundary.
    fn raise_fault(&self, fault: TransportFault);
}

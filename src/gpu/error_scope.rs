//! Allocation failure detection via wgpu error scopes.

use crate::error::HorizonError;

/// Run `create` inside out-of-memory and validation error scopes and turn any
/// captured error into [`HorizonError::ResourceAllocation`].
///
/// wgpu reports creation failures asynchronously; the scopes are popped with
/// `pollster` so setup code sees them synchronously.
pub(crate) fn allocation_scope<T>(
    device: &wgpu::Device,
    resource: &str,
    create: impl FnOnce() -> T,
) -> Result<T, HorizonError> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(e) => Err(HorizonError::ResourceAllocation {
            resource: resource.to_owned(),
            reason: e.to_string(),
        }),
        None => Ok(value),
    }
}

use std::os::raw::c_void;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use log::{trace, warn};

use crate::api::{MonoApi, MonoMethod, MonoObject};
use crate::error::{MonoError, Result};
use crate::runtime::{DomainHandle, MonoRuntime};

/// A resolved static managed method with the signature
/// `int Method(IntPtr buffer, int size)`.
///
/// The method itself belongs to its assembly; this is only a handle to it.
/// Calling it after the runtime was released fails with
/// [`MonoError::RuntimeReleased`].
#[derive(Clone)]
pub struct ManagedMethod<'rt> {
    runtime: &'rt MonoRuntime,
    api: Arc<dyn MonoApi>,
    /// Domain the method was resolved in. Only used for diagnostics.
    domain: DomainHandle,
    method: NonNull<MonoMethod>,
    generation: u64,
}

impl<'rt> ManagedMethod<'rt> {
    pub(crate) fn new(
        runtime: &'rt MonoRuntime,
        api: Arc<dyn MonoApi>,
        domain: DomainHandle,
        method: NonNull<MonoMethod>,
        generation: u64,
    ) -> ManagedMethod<'rt> {
        ManagedMethod {
            runtime,
            api,
            domain,
            method,
            generation,
        }
    }

    /// Invokes the method with `(buffer, size)` and returns its `int` result.
    ///
    /// # Safety
    ///
    /// The managed side receives `buffer` as an `IntPtr` and may read or
    /// write up to `size` bytes through it.
    pub unsafe fn call(&self, buffer: *mut c_void, size: i32) -> Result<i32> {
        self.runtime.ensure_generation(self.generation)?;

        let mut buffer = buffer;
        let mut size = size;
        let mut params: [*mut c_void; 2] = [
            &mut buffer as *mut *mut c_void as *mut c_void,
            &mut size as *mut i32 as *mut c_void,
        ];
        let mut exception: *mut MonoObject = ptr::null_mut();

        trace!(
            "invoking method {:p} in domain {:p} with {} bytes",
            self.method,
            self.domain.as_ptr(),
            size
        );
        let result = self
            .api
            .runtime_invoke(self.method.as_ptr(), ptr::null_mut(), params.as_mut_ptr(), &mut exception);
        if result.is_null() {
            let exception = self.api.exception_message(exception);
            if let Some(message) = &exception {
                warn!("managed method threw: {}", message);
            }
            return Err(MonoError::Invocation { exception });
        }

        let unboxed = self.api.object_unbox(result) as *const i32;
        if unboxed.is_null() {
            return Err(MonoError::ResultConversion);
        }
        Ok(*unboxed)
    }

    /// Calls the method with a borrowed buffer.
    pub fn call_with(&self, buffer: &mut [u8]) -> Result<i32> {
        let size = i32::try_from(buffer.len()).map_err(|_| MonoError::BufferTooLarge(buffer.len()))?;
        unsafe { self.call(buffer.as_mut_ptr() as *mut c_void, size) }
    }
}

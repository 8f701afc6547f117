//! The slice of the Mono embedding API used by this crate.
//!
//! Everything here is expressed in terms of raw pointers to opaque runtime
//! structures, exactly as the C API hands them out. [`crate::native::NativeMono`]
//! forwards each call to the loaded library; tests swap in a fake.

use std::os::raw::{c_char, c_int, c_void};

macro_rules! opaque {
    ($($name:ident),*) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(MonoDomain, MonoAssembly, MonoImage, MonoMethod, MonoMethodDesc, MonoObject);

/// Entry points of the embedded runtime.
///
/// All methods are `unsafe`: pointer arguments must be handles previously
/// returned by the same implementation (or null where Mono accepts null), and
/// string arguments must be valid nul-terminated C strings.
pub trait MonoApi: Send + Sync {
    /// `mono_set_dirs`
    unsafe fn set_dirs(&self, assembly_dir: *const c_char, config_dir: *const c_char) -> crate::Result<()>;

    /// `mono_config_parse`. A null filename loads the default machine config.
    unsafe fn config_parse(&self, filename: *const c_char) -> crate::Result<()>;

    /// `mono_jit_parse_options`
    unsafe fn jit_parse_options(&self, argc: c_int, argv: *mut *mut c_char) -> crate::Result<()>;

    /// `mono_debug_init`
    unsafe fn debug_init(&self) -> crate::Result<()>;

    /// `mono_jit_init`
    unsafe fn jit_init(&self, domain_name: *const c_char) -> *mut MonoDomain;

    /// `mono_jit_cleanup`
    unsafe fn jit_cleanup(&self, domain: *mut MonoDomain);

    /// `mono_domain_assembly_open`
    unsafe fn domain_assembly_open(&self, domain: *mut MonoDomain, name: *const c_char) -> *mut MonoAssembly;

    /// `mono_assembly_get_image`
    unsafe fn assembly_get_image(&self, assembly: *mut MonoAssembly) -> *mut MonoImage;

    /// `mono_method_desc_new`
    unsafe fn method_desc_new(&self, name: *const c_char, include_namespace: bool) -> *mut MonoMethodDesc;

    /// `mono_method_desc_search_in_image`
    unsafe fn method_desc_search_in_image(&self, desc: *mut MonoMethodDesc, image: *mut MonoImage) -> *mut MonoMethod;

    /// `mono_method_desc_free`
    unsafe fn method_desc_free(&self, desc: *mut MonoMethodDesc);

    /// `mono_runtime_invoke`
    unsafe fn runtime_invoke(
        &self,
        method: *mut MonoMethod,
        target: *mut c_void,
        params: *mut *mut c_void,
        exception: *mut *mut MonoObject,
    ) -> *mut MonoObject;

    /// `mono_object_unbox`
    unsafe fn object_unbox(&self, object: *mut MonoObject) -> *mut c_void;

    /// Renders a managed exception object through its `ToString()` override.
    /// Returns `None` when the text cannot be obtained.
    unsafe fn exception_message(&self, exception: *mut MonoObject) -> Option<String>;
}

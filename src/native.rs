use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use libloading::{Library, Symbol};
use log::debug;

use crate::api::{MonoApi, MonoAssembly, MonoDomain, MonoImage, MonoMethod, MonoMethodDesc, MonoObject};
use crate::config::MonoConfig;
use crate::error::{MonoError, Result};

#[repr(C)]
struct MonoString {
    _private: [u8; 0],
}

const MONO_DEBUG_FORMAT_MONO: c_int = 1;

type MonoJitInit = unsafe extern "C" fn(*const c_char) -> *mut MonoDomain;
type MonoJitCleanup = unsafe extern "C" fn(*mut MonoDomain);
type MonoDomainAssemblyOpen = unsafe extern "C" fn(*mut MonoDomain, *const c_char) -> *mut MonoAssembly;
type MonoAssemblyGetImage = unsafe extern "C" fn(*mut MonoAssembly) -> *mut MonoImage;
type MonoMethodDescNew = unsafe extern "C" fn(*const c_char, c_int) -> *mut MonoMethodDesc;
type MonoMethodDescSearchInImage = unsafe extern "C" fn(*mut MonoMethodDesc, *mut MonoImage) -> *mut MonoMethod;
type MonoMethodDescFree = unsafe extern "C" fn(*mut MonoMethodDesc);
type MonoRuntimeInvoke =
    unsafe extern "C" fn(*mut MonoMethod, *mut c_void, *mut *mut c_void, *mut *mut MonoObject) -> *mut MonoObject;
type MonoObjectUnbox = unsafe extern "C" fn(*mut MonoObject) -> *mut c_void;

type MonoSetDirs = unsafe extern "C" fn(*const c_char, *const c_char);
type MonoConfigParse = unsafe extern "C" fn(*const c_char);
type MonoJitParseOptions = unsafe extern "C" fn(c_int, *mut *mut c_char);
type MonoDebugInit = unsafe extern "C" fn(c_int);
type MonoObjectToString = unsafe extern "C" fn(*mut MonoObject, *mut *mut MonoObject) -> *mut MonoString;
type MonoStringToUtf8 = unsafe extern "C" fn(*mut MonoString) -> *mut c_char;
type MonoFree = unsafe extern "C" fn(*mut c_void);

/// [`MonoApi`] backed by a dynamically loaded Mono shared library.
///
/// The entry points needed to resolve and invoke methods are looked up when
/// the library is loaded, so a library missing any of them is rejected up
/// front. Startup tuning and diagnostics entry points are looked up on use.
#[derive(Debug)]
pub struct NativeMono {
    library: Library,
    jit_init: MonoJitInit,
    jit_cleanup: MonoJitCleanup,
    domain_assembly_open: MonoDomainAssemblyOpen,
    assembly_get_image: MonoAssemblyGetImage,
    method_desc_new: MonoMethodDescNew,
    method_desc_search_in_image: MonoMethodDescSearchInImage,
    method_desc_free: MonoMethodDescFree,
    runtime_invoke: MonoRuntimeInvoke,
    object_unbox: MonoObjectUnbox,
}

/// Copies a function pointer out of the library. The pointer stays valid for
/// as long as `library` stays loaded.
unsafe fn required<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    let symbol: Symbol<T> = library
        .get(name)
        .map_err(|e| MonoError::Initialization(format!("{}: {}", symbol_name(name), e)))?;
    Ok(*symbol)
}

fn symbol_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name)).into_owned()
}

impl NativeMono {
    pub fn load(config: &MonoConfig) -> Result<NativeMono> {
        let path = config.library();
        debug!("loading Mono from {}", path.to_string_lossy());
        let library = unsafe { Library::new(&path) }
            .map_err(|e| MonoError::Initialization(format!("{}: {}", path.to_string_lossy(), e)))?;

        unsafe {
            Ok(NativeMono {
                jit_init: required(&library, b"mono_jit_init\0")?,
                jit_cleanup: required(&library, b"mono_jit_cleanup\0")?,
                domain_assembly_open: required(&library, b"mono_domain_assembly_open\0")?,
                assembly_get_image: required(&library, b"mono_assembly_get_image\0")?,
                method_desc_new: required(&library, b"mono_method_desc_new\0")?,
                method_desc_search_in_image: required(&library, b"mono_method_desc_search_in_image\0")?,
                method_desc_free: required(&library, b"mono_method_desc_free\0")?,
                runtime_invoke: required(&library, b"mono_runtime_invoke\0")?,
                object_unbox: required(&library, b"mono_object_unbox\0")?,
                library,
            })
        }
    }

    unsafe fn optional<T: Copy>(&self, name: &[u8]) -> Option<Symbol<'_, T>> {
        self.library.get(name).ok()
    }

    unsafe fn startup_symbol<T: Copy>(&self, name: &[u8]) -> Result<Symbol<'_, T>> {
        self.library
            .get(name)
            .map_err(|e| MonoError::Initialization(format!("{}: {}", symbol_name(name), e)))
    }
}

impl MonoApi for NativeMono {
    unsafe fn set_dirs(&self, assembly_dir: *const c_char, config_dir: *const c_char) -> Result<()> {
        let set_dirs: Symbol<MonoSetDirs> = self.startup_symbol(b"mono_set_dirs\0")?;
        set_dirs(assembly_dir, config_dir);
        Ok(())
    }

    unsafe fn config_parse(&self, filename: *const c_char) -> Result<()> {
        let config_parse: Symbol<MonoConfigParse> = self.startup_symbol(b"mono_config_parse\0")?;
        config_parse(filename);
        Ok(())
    }

    unsafe fn jit_parse_options(&self, argc: c_int, argv: *mut *mut c_char) -> Result<()> {
        let parse_options: Symbol<MonoJitParseOptions> = self.startup_symbol(b"mono_jit_parse_options\0")?;
        parse_options(argc, argv);
        Ok(())
    }

    unsafe fn debug_init(&self) -> Result<()> {
        let debug_init: Symbol<MonoDebugInit> = self.startup_symbol(b"mono_debug_init\0")?;
        debug_init(MONO_DEBUG_FORMAT_MONO);
        Ok(())
    }

    unsafe fn jit_init(&self, domain_name: *const c_char) -> *mut MonoDomain {
        (self.jit_init)(domain_name)
    }

    unsafe fn jit_cleanup(&self, domain: *mut MonoDomain) {
        (self.jit_cleanup)(domain)
    }

    unsafe fn domain_assembly_open(&self, domain: *mut MonoDomain, name: *const c_char) -> *mut MonoAssembly {
        (self.domain_assembly_open)(domain, name)
    }

    unsafe fn assembly_get_image(&self, assembly: *mut MonoAssembly) -> *mut MonoImage {
        (self.assembly_get_image)(assembly)
    }

    unsafe fn method_desc_new(&self, name: *const c_char, include_namespace: bool) -> *mut MonoMethodDesc {
        (self.method_desc_new)(name, include_namespace as c_int)
    }

    unsafe fn method_desc_search_in_image(&self, desc: *mut MonoMethodDesc, image: *mut MonoImage) -> *mut MonoMethod {
        (self.method_desc_search_in_image)(desc, image)
    }

    unsafe fn method_desc_free(&self, desc: *mut MonoMethodDesc) {
        (self.method_desc_free)(desc)
    }

    unsafe fn runtime_invoke(
        &self,
        method: *mut MonoMethod,
        target: *mut c_void,
        params: *mut *mut c_void,
        exception: *mut *mut MonoObject,
    ) -> *mut MonoObject {
        (self.runtime_invoke)(method, target, params, exception)
    }

    unsafe fn object_unbox(&self, object: *mut MonoObject) -> *mut c_void {
        (self.object_unbox)(object)
    }

    unsafe fn exception_message(&self, exception: *mut MonoObject) -> Option<String> {
        if exception.is_null() {
            return None;
        }
        let to_string: Symbol<MonoObjectToString> = self.optional(b"mono_object_to_string\0")?;
        let to_utf8: Symbol<MonoStringToUtf8> = self.optional(b"mono_string_to_utf8\0")?;
        let free: Symbol<MonoFree> = self.optional(b"mono_free\0")?;

        // ToString() itself may throw; that exception is dropped.
        let mut nested: *mut MonoObject = ptr::null_mut();
        let managed = to_string(exception, &mut nested);
        if managed.is_null() {
            return None;
        }
        let utf8 = to_utf8(managed);
        if utf8.is_null() {
            return None;
        }
        let message = CStr::from_ptr(utf8).to_string_lossy().into_owned();
        free(utf8 as *mut c_void);
        Some(message)
    }
}

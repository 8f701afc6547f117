use std::collections::HashMap;
use std::ffi::CString;
use std::ptr::NonNull;
use std::sync::Arc;

use log::{debug, trace};

use crate::api::{MonoApi, MonoAssembly, MonoImage, MonoMethod, MonoMethodDesc};
use crate::config::MonoConfig;
use crate::error::{MonoError, Result};
use crate::method::ManagedMethod;
use crate::runtime::{DomainHandle, LiveRuntime, MonoRuntime};

/// Which domain a [`Mono`] context should execute in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DomainRequest {
    /// The domain created by `mono_jit_init`.
    #[default]
    Root,
    /// A separately created domain. Not supported yet.
    Named(String),
}

/// An opened assembly. Owned by the runtime, valid until it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembly(NonNull<MonoAssembly>);

/// Metadata image of an [`Assembly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image(NonNull<MonoImage>);

/// A caller's view of the runtime: the domain it runs in plus the assemblies
/// it has opened so far. Assemblies are opened at most once per context.
pub struct Mono<'rt> {
    runtime: &'rt MonoRuntime,
    api: Arc<dyn MonoApi>,
    domain: DomainHandle,
    generation: u64,
    assemblies: HashMap<String, Assembly>,
}

impl Mono<'static> {
    /// Starts the process-wide runtime with the default configuration if it
    /// is not running yet and opens a context on it. A named domain is
    /// rejected without touching the runtime.
    pub fn new(domain: DomainRequest) -> Result<Mono<'static>> {
        if let DomainRequest::Named(name) = domain {
            return Err(MonoError::NotImplemented(name));
        }
        let runtime = MonoRuntime::global();
        runtime.initialize(&MonoConfig::default())?;
        runtime.context(DomainRequest::Root)
    }
}

impl<'rt> Mono<'rt> {
    pub(crate) fn bind(runtime: &'rt MonoRuntime, live: LiveRuntime) -> Mono<'rt> {
        Mono {
            runtime,
            api: live.api,
            domain: live.domain,
            generation: live.generation,
            assemblies: HashMap::new(),
        }
    }

    /// Resolves `type_name:method_name` in the assembly at `assembly_path`.
    ///
    /// The returned method must have the shape `int Method(IntPtr, int)`; see
    /// [`ManagedMethod::call`].
    pub fn get_callable(&mut self, assembly_path: &str, type_name: &str, method_name: &str) -> Result<ManagedMethod<'rt>> {
        let assembly = self.open_assembly(assembly_path)?;
        let image = self.get_image(assembly)?;
        let method = self.resolve_method(image, type_name, method_name)?;
        Ok(ManagedMethod::new(
            self.runtime,
            Arc::clone(&self.api),
            self.domain,
            method,
            self.generation,
        ))
    }

    pub fn open_assembly(&mut self, path: &str) -> Result<Assembly> {
        self.runtime.ensure_generation(self.generation)?;
        if let Some(assembly) = self.assemblies.get(path) {
            trace!("assembly {} already open", path);
            return Ok(*assembly);
        }

        let name = CString::new(path)?;
        let raw = unsafe { self.api.domain_assembly_open(self.domain.as_ptr(), name.as_ptr()) };
        let assembly = NonNull::new(raw).map(Assembly).ok_or_else(|| MonoError::AssemblyLoad {
            path: path.to_string(),
        })?;
        debug!("opened assembly {}", path);
        self.assemblies.insert(path.to_string(), assembly);
        Ok(assembly)
    }

    pub fn get_image(&self, assembly: Assembly) -> Result<Image> {
        self.runtime.ensure_generation(self.generation)?;
        let raw = unsafe { self.api.assembly_get_image(assembly.0.as_ptr()) };
        NonNull::new(raw).map(Image).ok_or(MonoError::ImageLoad)
    }

    /// Searches `image` for `type_name:method_name`. Namespace-qualified type
    /// names are matched. Nothing is validated up front; a malformed name
    /// simply does not match.
    pub fn resolve_method(&self, image: Image, type_name: &str, method_name: &str) -> Result<NonNull<MonoMethod>> {
        self.runtime.ensure_generation(self.generation)?;
        let not_found = || MonoError::MethodNotFound {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
        };

        let desc = MethodDesc::new(self.api.as_ref(), type_name, method_name)?.ok_or_else(not_found)?;
        let method = desc.search(image).ok_or_else(not_found)?;
        debug!("resolved {}:{}", type_name, method_name);
        Ok(method)
    }

    pub fn cached_assemblies(&self) -> usize {
        self.assemblies.len()
    }
}

/// Owned `MonoMethodDesc`, freed when dropped.
struct MethodDesc<'a> {
    api: &'a dyn MonoApi,
    ptr: NonNull<MonoMethodDesc>,
}

impl<'a> MethodDesc<'a> {
    /// `Ok(None)` when Mono cannot parse the descriptor.
    fn new(api: &'a dyn MonoApi, type_name: &str, method_name: &str) -> Result<Option<MethodDesc<'a>>> {
        let text = CString::new(format!("{}:{}", type_name, method_name))?;
        let raw = unsafe { api.method_desc_new(text.as_ptr(), true) };
        Ok(NonNull::new(raw).map(|ptr| MethodDesc { api, ptr }))
    }

    fn search(&self, image: Image) -> Option<NonNull<MonoMethod>> {
        NonNull::new(unsafe { self.api.method_desc_search_in_image(self.ptr.as_ptr(), image.0.as_ptr()) })
    }
}

impl Drop for MethodDesc<'_> {
    fn drop(&mut self) {
        unsafe { self.api.method_desc_free(self.ptr.as_ptr()) }
    }
}

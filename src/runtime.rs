//! Process-wide lifecycle of the embedded runtime.
//!
//! Mono can only be started once per process, so a single [`MonoRuntime`]
//! (see [`MonoRuntime::global`]) owns the loaded library and the root domain.
//! The state moves `Uninitialized -> Live -> Uninitialized`; initializing a
//! live runtime is a no-op.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};

use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;

use crate::api::{MonoApi, MonoDomain};
use crate::config::MonoConfig;
use crate::context::{DomainRequest, Mono};
use crate::error::{MonoError, Result};
use crate::native::NativeMono;

static GLOBAL: Lazy<MonoRuntime> = Lazy::new(MonoRuntime::new);
static EXIT_HOOK: Once = Once::new();

/// Root domain pointer. Owned by the runtime state, never dereferenced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DomainHandle(NonNull<MonoDomain>);

// The domain belongs to the process, not to the thread that created it.
unsafe impl Send for DomainHandle {}
unsafe impl Sync for DomainHandle {}

impl DomainHandle {
    pub(crate) fn as_ptr(self) -> *mut MonoDomain {
        self.0.as_ptr()
    }
}

enum State {
    Uninitialized,
    Live {
        api: Arc<dyn MonoApi>,
        domain: DomainHandle,
        generation: u64,
    },
}

/// Snapshot of a live runtime handed to contexts and callables.
#[derive(Clone)]
pub(crate) struct LiveRuntime {
    pub(crate) api: Arc<dyn MonoApi>,
    pub(crate) domain: DomainHandle,
    pub(crate) generation: u64,
}

pub struct MonoRuntime {
    state: Mutex<State>,
    generations: AtomicU64,
}

impl Default for MonoRuntime {
    fn default() -> Self {
        MonoRuntime::new()
    }
}

impl MonoRuntime {
    pub fn new() -> MonoRuntime {
        MonoRuntime {
            state: Mutex::new(State::Uninitialized),
            generations: AtomicU64::new(0),
        }
    }

    /// The runtime instance shared by the whole process.
    pub fn global() -> &'static MonoRuntime {
        &GLOBAL
    }

    /// Loads the Mono library described by `config` and starts the JIT.
    pub fn initialize(&self, config: &MonoConfig) -> Result<()> {
        self.initialize_with(config, |config| {
            let api: Arc<dyn MonoApi> = Arc::new(NativeMono::load(config)?);
            Ok(api)
        })
    }

    /// Like [`initialize`](Self::initialize) with a caller supplied loader
    /// for the native interface. The loader only runs when the runtime is
    /// not live yet.
    pub fn initialize_with<F>(&self, config: &MonoConfig, loader: F) -> Result<()>
    where
        F: FnOnce(&MonoConfig) -> Result<Arc<dyn MonoApi>>,
    {
        let mut state = self.lock();
        if let State::Live { generation, .. } = &*state {
            trace!("Mono runtime already live (generation {})", generation);
            return Ok(());
        }

        let api = loader(config)?;
        let domain = unsafe { start(api.as_ref(), config)? };
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *state = State::Live {
            api,
            domain,
            generation,
        };
        drop(state);

        info!("Mono runtime started, root domain {:?}", config.domain_name);
        if ptr::eq(self, MonoRuntime::global()) {
            register_exit_hook();
        }
        Ok(())
    }

    /// Shuts down the root domain. Does nothing when not initialized.
    pub fn release(&self) {
        let previous = std::mem::replace(&mut *self.lock(), State::Uninitialized);
        if let State::Live {
            api,
            domain,
            generation,
        } = previous
        {
            unsafe { api.jit_cleanup(domain.as_ptr()) };
            info!("Mono runtime released (generation {})", generation);
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.lock(), State::Live { .. })
    }

    /// Opens a context on this runtime. Only the root domain is available.
    pub fn context(&self, domain: DomainRequest) -> Result<Mono<'_>> {
        if let DomainRequest::Named(name) = domain {
            return Err(MonoError::NotImplemented(name));
        }
        let live = self.live().ok_or(MonoError::NotInitialized)?;
        Ok(Mono::bind(self, live))
    }

    pub(crate) fn live(&self) -> Option<LiveRuntime> {
        match &*self.lock() {
            State::Live {
                api,
                domain,
                generation,
            } => Some(LiveRuntime {
                api: Arc::clone(api),
                domain: *domain,
                generation: *generation,
            }),
            State::Uninitialized => None,
        }
    }

    /// Fails unless the runtime is still in the generation a handle was
    /// created under.
    pub(crate) fn ensure_generation(&self, expected: u64) -> Result<()> {
        match &*self.lock() {
            State::Live { generation, .. } if *generation == expected => Ok(()),
            _ => Err(MonoError::RuntimeReleased),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs the startup sequence: directories, machine config, JIT options,
/// debugger support, then `mono_jit_init`.
unsafe fn start(api: &dyn MonoApi, config: &MonoConfig) -> Result<DomainHandle> {
    if config.assembly_dir.is_some() || config.config_dir.is_some() {
        let assembly_dir = optional_path(config.assembly_dir.as_deref())?;
        let config_dir = optional_path(config.config_dir.as_deref())?;
        api.set_dirs(as_ptr_or_null(&assembly_dir), as_ptr_or_null(&config_dir))?;
    }

    let config_file = optional_path(config.config_file.as_deref())?;
    api.config_parse(as_ptr_or_null(&config_file))?;

    if !config.jit_options.is_empty() {
        let options = config
            .jit_options
            .iter()
            .map(|option| CString::new(option.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut argv: Vec<*mut c_char> = options.iter().map(|option| option.as_ptr() as *mut c_char).collect();
        debug!("parsing JIT options {:?}", config.jit_options);
        api.jit_parse_options(argv.len() as c_int, argv.as_mut_ptr())?;
    }

    if config.debug {
        api.debug_init()?;
    }

    let name = CString::new(config.domain_name.as_str())?;
    let domain = api.jit_init(name.as_ptr());
    NonNull::new(domain)
        .map(DomainHandle)
        .ok_or_else(|| MonoError::Initialization("mono_jit_init returned null".into()))
}

fn optional_path(path: Option<&std::path::Path>) -> Result<Option<CString>> {
    match path {
        Some(path) => Ok(Some(CString::new(path.to_string_lossy().into_owned())?)),
        None => Ok(None),
    }
}

fn as_ptr_or_null(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |value| value.as_ptr())
}

extern "C" fn release_at_exit() {
    MonoRuntime::global().release();
}

fn register_exit_hook() {
    EXIT_HOOK.call_once(|| {
        if unsafe { libc::atexit(release_at_exit) } != 0 {
            warn!("could not register Mono shutdown at process exit");
        }
    });
}

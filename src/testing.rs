//! In-memory stand-in for the Mono library used by unit tests.
//!
//! Handles are fabricated addresses that are never dereferenced, except for
//! the unboxed result which points at a real `i32` owned by the fake.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::{MonoApi, MonoAssembly, MonoDomain, MonoImage, MonoMethod, MonoMethodDesc, MonoObject};
use crate::error::Result;

const DOMAIN_BASE: usize = 0x1000;
const ASSEMBLY_BASE: usize = 0x2000;
const IMAGE_OFFSET: usize = 0x100;
const DESC_BASE: usize = 0x3000;
const METHOD_ADDR: usize = 0x4000;
const EXCEPTION_ADDR: usize = 0x5000;
const RESULT_ADDR: usize = 0x6000;

pub(crate) fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::SeqCst)
}

unsafe fn string(value: *const c_char) -> String {
    CStr::from_ptr(value).to_string_lossy().into_owned()
}

/// What `mono_runtime_invoke` does when called.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Returns(i32),
    ReturnsNull,
    Throws(String),
    UnboxesToNull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub method: usize,
    pub target_is_null: bool,
    pub buffer: usize,
    pub size: i32,
}

pub(crate) struct FakeMono {
    fail_init: bool,
    missing_assemblies: Vec<String>,
    null_image: bool,
    missing_methods: Vec<String>,
    outcome: Outcome,
    result: Box<i32>,

    pub jit_init_calls: AtomicUsize,
    pub jit_cleanup_calls: AtomicUsize,
    pub set_dirs_calls: AtomicUsize,
    pub config_parse_calls: AtomicUsize,
    pub debug_init_calls: AtomicUsize,
    pub assembly_open_calls: AtomicUsize,
    pub desc_new_calls: AtomicUsize,
    pub desc_free_calls: AtomicUsize,
    pub invoke_calls: AtomicUsize,

    pub config_files: Mutex<Vec<Option<String>>>,
    pub jit_options: Mutex<Vec<String>>,
    pub domain_names: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub descriptors: Mutex<Vec<(String, bool)>>,
    pub freed: Mutex<Vec<usize>>,
    pub invocations: Mutex<Vec<Invocation>>,
}

impl FakeMono {
    pub(crate) fn new() -> FakeMono {
        FakeMono {
            fail_init: false,
            missing_assemblies: Vec::new(),
            null_image: false,
            missing_methods: Vec::new(),
            outcome: Outcome::Returns(0),
            result: Box::new(0),
            jit_init_calls: AtomicUsize::new(0),
            jit_cleanup_calls: AtomicUsize::new(0),
            set_dirs_calls: AtomicUsize::new(0),
            config_parse_calls: AtomicUsize::new(0),
            debug_init_calls: AtomicUsize::new(0),
            assembly_open_calls: AtomicUsize::new(0),
            desc_new_calls: AtomicUsize::new(0),
            desc_free_calls: AtomicUsize::new(0),
            invoke_calls: AtomicUsize::new(0),
            config_files: Mutex::new(Vec::new()),
            jit_options: Mutex::new(Vec::new()),
            domain_names: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            descriptors: Mutex::new(Vec::new()),
            freed: Mutex::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub(crate) fn missing_assembly(mut self, path: &str) -> Self {
        self.missing_assemblies.push(path.to_string());
        self
    }

    pub(crate) fn null_image(mut self) -> Self {
        self.null_image = true;
        self
    }

    /// Makes the search for `descriptor` (`Type:Method`) come back empty.
    pub(crate) fn missing_method(mut self, descriptor: &str) -> Self {
        self.missing_methods.push(descriptor.to_string());
        self
    }

    pub(crate) fn outcome(mut self, outcome: Outcome) -> Self {
        if let Outcome::Returns(value) = outcome {
            self.result = Box::new(value);
        }
        self.outcome = outcome;
        self
    }

    pub(crate) fn method_addr() -> usize {
        METHOD_ADDR
    }
}

impl MonoApi for FakeMono {
    unsafe fn set_dirs(&self, _assembly_dir: *const c_char, _config_dir: *const c_char) -> Result<()> {
        bump(&self.set_dirs_calls);
        Ok(())
    }

    unsafe fn config_parse(&self, filename: *const c_char) -> Result<()> {
        bump(&self.config_parse_calls);
        let filename = if filename.is_null() { None } else { Some(string(filename)) };
        self.config_files.lock().unwrap().push(filename);
        Ok(())
    }

    unsafe fn jit_parse_options(&self, argc: c_int, argv: *mut *mut c_char) -> Result<()> {
        let mut options = self.jit_options.lock().unwrap();
        for i in 0..argc as usize {
            options.push(string(*argv.add(i)));
        }
        Ok(())
    }

    unsafe fn debug_init(&self) -> Result<()> {
        bump(&self.debug_init_calls);
        Ok(())
    }

    unsafe fn jit_init(&self, domain_name: *const c_char) -> *mut MonoDomain {
        let n = bump(&self.jit_init_calls);
        self.domain_names.lock().unwrap().push(string(domain_name));
        if self.fail_init {
            return ptr::null_mut();
        }
        (DOMAIN_BASE + n * 0x10) as *mut MonoDomain
    }

    unsafe fn jit_cleanup(&self, _domain: *mut MonoDomain) {
        bump(&self.jit_cleanup_calls);
    }

    unsafe fn domain_assembly_open(&self, _domain: *mut MonoDomain, name: *const c_char) -> *mut MonoAssembly {
        let n = bump(&self.assembly_open_calls);
        let name = string(name);
        if self.missing_assemblies.contains(&name) {
            return ptr::null_mut();
        }
        self.opened.lock().unwrap().push(name);
        (ASSEMBLY_BASE + n * 0x10) as *mut MonoAssembly
    }

    unsafe fn assembly_get_image(&self, assembly: *mut MonoAssembly) -> *mut MonoImage {
        if self.null_image {
            return ptr::null_mut();
        }
        (assembly as usize + IMAGE_OFFSET) as *mut MonoImage
    }

    unsafe fn method_desc_new(&self, name: *const c_char, include_namespace: bool) -> *mut MonoMethodDesc {
        let n = bump(&self.desc_new_calls);
        self.descriptors.lock().unwrap().push((string(name), include_namespace));
        (DESC_BASE + n * 0x10) as *mut MonoMethodDesc
    }

    unsafe fn method_desc_search_in_image(&self, desc: *mut MonoMethodDesc, _image: *mut MonoImage) -> *mut MonoMethod {
        let index = (desc as usize - DESC_BASE) / 0x10;
        let descriptors = self.descriptors.lock().unwrap();
        match descriptors.get(index) {
            Some((name, _)) if !self.missing_methods.contains(name) => METHOD_ADDR as *mut MonoMethod,
            _ => ptr::null_mut(),
        }
    }

    unsafe fn method_desc_free(&self, desc: *mut MonoMethodDesc) {
        bump(&self.desc_free_calls);
        self.freed.lock().unwrap().push(desc as usize);
    }

    unsafe fn runtime_invoke(
        &self,
        method: *mut MonoMethod,
        target: *mut c_void,
        params: *mut *mut c_void,
        exception: *mut *mut MonoObject,
    ) -> *mut MonoObject {
        bump(&self.invoke_calls);
        let buffer = *(*params.add(0) as *const *mut c_void);
        let size = *(*params.add(1) as *const i32);
        self.invocations.lock().unwrap().push(Invocation {
            method: method as usize,
            target_is_null: target.is_null(),
            buffer: buffer as usize,
            size,
        });

        match self.outcome {
            Outcome::ReturnsNull => ptr::null_mut(),
            Outcome::Throws(_) => {
                *exception = EXCEPTION_ADDR as *mut MonoObject;
                ptr::null_mut()
            }
            Outcome::Returns(_) | Outcome::UnboxesToNull => RESULT_ADDR as *mut MonoObject,
        }
    }

    unsafe fn object_unbox(&self, object: *mut MonoObject) -> *mut c_void {
        match self.outcome {
            Outcome::Returns(_) if object as usize == RESULT_ADDR => &*self.result as *const i32 as *mut c_void,
            _ => ptr::null_mut(),
        }
    }

    unsafe fn exception_message(&self, exception: *mut MonoObject) -> Option<String> {
        match &self.outcome {
            Outcome::Throws(message) if exception as usize == EXCEPTION_ADDR => Some(message.clone()),
            _ => None,
        }
    }
}

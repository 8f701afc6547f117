use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

const DEFAULT_GC: &str = "sgen";
const DEFAULT_DOMAIN_NAME: &str = "rustmono";

/// Options used when loading and starting the Mono runtime.
///
/// Everything is optional. With the defaults the runtime is loaded from the
/// platform's `monosgen-2.0` library on the regular search path and the
/// default machine configuration is parsed.
#[derive(Debug, Clone)]
pub struct MonoConfig {
    /// Explicit path to the Mono shared library. Takes precedence over `gc`.
    pub library_path: Option<PathBuf>,
    /// GC flavor (`sgen`, `boehm`) used to derive the library name.
    pub gc: Option<String>,
    /// Friendly name given to the root domain.
    pub domain_name: String,
    pub assembly_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    /// Machine config file. `None` parses Mono's default configuration.
    pub config_file: Option<PathBuf>,
    pub jit_options: Vec<String>,
    pub debug: bool,
}

impl Default for MonoConfig {
    fn default() -> Self {
        MonoConfig {
            library_path: None,
            gc: None,
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            assembly_dir: None,
            config_dir: None,
            config_file: None,
            jit_options: Vec::new(),
            debug: false,
        }
    }
}

impl MonoConfig {
    /// Builds a configuration from `RUSTMONO_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = MonoConfig::default();
        if let Some(path) = env::var_os("RUSTMONO_LIBRARY") {
            config.library_path = Some(PathBuf::from(path));
        }
        if let Ok(gc) = env::var("RUSTMONO_GC") {
            config.gc = Some(gc);
        }
        if let Some(path) = env::var_os("RUSTMONO_CONFIG_FILE") {
            config.config_file = Some(PathBuf::from(path));
        }
        if let Ok(options) = env::var("RUSTMONO_JIT_OPTIONS") {
            config.jit_options = options.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(debug) = env::var("RUSTMONO_DEBUG") {
            config.debug = matches!(debug.trim(), "1" | "true" | "TRUE" | "True");
        }
        config
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_gc(mut self, gc: impl Into<String>) -> Self {
        self.gc = Some(gc.into());
        self
    }

    pub fn with_domain_name(mut self, name: impl Into<String>) -> Self {
        self.domain_name = name.into();
        self
    }

    pub fn with_dirs(mut self, assembly_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        self.assembly_dir = Some(assembly_dir.into());
        self.config_dir = Some(config_dir.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_jit_option(mut self, option: impl Into<String>) -> Self {
        self.jit_options.push(option.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The library that will be handed to the dynamic loader.
    pub fn library(&self) -> OsString {
        match &self.library_path {
            Some(path) => path.clone().into_os_string(),
            None => {
                let gc = self.gc.as_deref().unwrap_or(DEFAULT_GC);
                libloading::library_filename(format!("mono{}-2.0", gc))
            }
        }
    }
}

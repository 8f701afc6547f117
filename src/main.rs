use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::error;
use rustmono::{DomainRequest, MonoConfig, MonoRuntime};

/// Loads an assembly into Mono and calls `int Method(IntPtr, int)` on it.
#[derive(Parser, Debug)]
#[command(name = "rustmono", version)]
struct Args {
    /// Path to the assembly
    assembly: String,
    /// Namespace-qualified type name
    type_name: String,
    /// Static method to invoke
    method: String,
    /// Bytes passed to the method
    #[arg(default_value = "")]
    payload: String,
    /// Mono shared library to load
    #[arg(long)]
    library: Option<PathBuf>,
    /// GC flavor used to pick the library (sgen, boehm)
    #[arg(long)]
    gc: Option<String>,
}

fn run(args: Args) -> rustmono::Result<i32> {
    let mut config = MonoConfig::from_env();
    if let Some(library) = args.library {
        config = config.with_library_path(library);
    }
    if let Some(gc) = args.gc {
        config = config.with_gc(gc);
    }

    let runtime = MonoRuntime::global();
    runtime.initialize(&config)?;
    let mut mono = runtime.context(DomainRequest::Root)?;
    let method = mono.get_callable(&args.assembly, &args.type_name, &args.method)?;

    let mut payload = args.payload.into_bytes();
    let result = method.call_with(&mut payload)?;
    runtime.release();
    Ok(result)
}

fn main() {
    env_logger::init();

    match run(Args::parse()) {
        Ok(result) => println!("{}", result),
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

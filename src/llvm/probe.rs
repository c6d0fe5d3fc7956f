//! Native symbol probing.
//!
//! Resolves functions from a finalized engine and calls them through their C
//! ABI. Resolution is fallible: a missing symbol becomes
//! [`ProbeError::SymbolNotFound`] and nothing is ever called through a null
//! address.

use std::ffi::{c_void, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

use inkwell::execution_engine::{JitFunction, UnsafeFunctionPointer};

use super::engine::JitEngine;
use crate::core::config::ProbeConfig;
use crate::core::error::ProbeError;
use crate::core::session::ProbeReport;
use crate::core::state::EngineState;

/// `int sqlite3_open(const char *filename, sqlite3 **ppDb)`
pub type OpenFn = unsafe extern "C" fn(*const c_char, *mut *mut c_void) -> c_int;

/// `int sqlite3_close(sqlite3 *db)`
pub type CloseFn = unsafe extern "C" fn(*mut c_void) -> c_int;

/// `int32_t f(int32_t)`
pub type UnaryI32Fn = unsafe extern "C" fn(i32) -> i32;

/// Symbol lookups against a finalized engine.
pub struct SymbolProber<'a, 'ctx> {
    engine: &'a JitEngine<'a, 'ctx>,
}

impl<'a, 'ctx> SymbolProber<'a, 'ctx> {
    /// Fails with [`ProbeError::NotFinalized`] unless machine code has been emitted.
    pub fn new(engine: &'a JitEngine<'a, 'ctx>) -> Result<Self, ProbeError> {
        match engine.state() {
            EngineState::Finalized => Ok(Self { engine }),
            state => Err(ProbeError::NotFinalized { state }),
        }
    }

    /// Address of `name`, if the engine defines or can resolve it.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        match self.engine.execution_engine().get_function_address(name) {
            Ok(address) if address != 0 => Some(address),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Lookup of {} failed: {}", name, e);
                None
            }
        }
    }

    /// Typed handle to `name`.
    ///
    /// # Safety
    ///
    /// `F` must match the native signature of the symbol.
    pub unsafe fn function<F>(&self, name: &str) -> Result<JitFunction<'ctx, F>, ProbeError>
    where
        F: UnsafeFunctionPointer,
    {
        self.engine
            .execution_engine()
            .get_function::<F>(name)
            .map_err(|_| ProbeError::SymbolNotFound {
                name: name.to_string(),
            })
    }

    /// Open and close the configured database through the JIT-compiled
    /// open/close functions. Close's return value is ignored.
    pub fn probe_database(&self, config: &ProbeConfig) -> Result<ProbeReport, ProbeError> {
        // SAFETY: the signatures match sqlite3_open and sqlite3_close.
        let (open, close) = unsafe {
            (
                self.function::<OpenFn>(&config.open_symbol)?,
                self.function::<CloseFn>(&config.close_symbol)?,
            )
        };

        let c_path = path_to_cstring(&config.database)?;
        let path = config.database.display().to_string();

        let mut db: *mut c_void = ptr::null_mut();
        // SAFETY: `c_path` outlives the call and `db` is a valid out-pointer.
        let status = unsafe { open.call(c_path.as_ptr(), &mut db) };
        log::debug!("{}({}) returned {}", config.open_symbol, path, status);

        if status != 0 {
            return Err(ProbeError::OpenFailed { path, status });
        }

        // SAFETY: `db` was produced by a successful open.
        let _ = unsafe { close.call(db) };

        Ok(ProbeReport {
            open_address: open.as_raw() as usize,
            close_address: close.as_raw() as usize,
            open_status: status,
        })
    }

    /// Call `i32 name(i32)`.
    pub fn invoke_i32(&self, name: &str, arg: i32) -> Result<i32, ProbeError> {
        // SAFETY: the caller names a function with the `i32 (i32)` signature.
        let function = unsafe { self.function::<UnaryI32Fn>(name)? };
        let result = unsafe { function.call(arg) };
        log::debug!("{}({}) = {}", name, arg, result);
        Ok(result)
    }
}

/// The path's raw bytes as a C string. Non-UTF-8 paths pass through unchanged on unix.
fn path_to_cstring(path: &Path) -> Result<CString, ProbeError> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path.to_string_lossy().into_owned().into_bytes();

    CString::new(bytes).map_err(|_| ProbeError::InvalidName {
        name: path.display().to_string(),
    })
}

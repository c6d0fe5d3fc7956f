//! Module loading.
//!
//! Reads bitcode or textual IR from disk into a module owned by the caller.
//! LLVM's IR reader picks the format from the buffer contents.

use std::path::Path;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;

use crate::core::error::LoadError;

/// Load the module at `path` into `context`.
pub fn load_module<'ctx>(context: &'ctx Context, path: &Path) -> Result<Module<'ctx>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing {
            path: path.to_path_buf(),
        });
    }

    let buffer = MemoryBuffer::create_from_file(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        diagnostic: e.to_string(),
    })?;

    let module = context
        .create_module_from_ir(buffer)
        .map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            diagnostic: e.to_string().trim_end().to_string(),
        })?;

    log::info!(
        "Loaded module {} ({} functions)",
        path.display(),
        module.get_functions().count()
    );
    Ok(module)
}

/// Parse textual IR held in memory. `name` stands in for the path in errors.
pub fn parse_module<'ctx>(
    context: &'ctx Context,
    name: &str,
    ir: &str,
) -> Result<Module<'ctx>, LoadError> {
    let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), name);
    context
        .create_module_from_ir(buffer)
        .map_err(|e| LoadError::Parse {
            path: name.into(),
            diagnostic: e.to_string().trim_end().to_string(),
        })
}

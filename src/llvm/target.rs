//! Host target setup.
//!
//! The JIT needs the native target, asm printer and asm parser registered
//! before any engine is created, and the pass pipeline needs a target machine
//! for the target cost model.

use std::sync::OnceLock;

use inkwell::execution_engine::ExecutionEngine;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::OptimizationLevel;

use crate::core::error::TargetError;

static NATIVE_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Register the native target and link in MCJIT. Safe to call repeatedly.
pub fn initialize_native() -> Result<(), TargetError> {
    NATIVE_INIT
        .get_or_init(|| {
            let config = InitializationConfig {
                asm_parser: true,
                asm_printer: true,
                base: true,
                disassembler: false,
                info: true,
                machine_code: true,
            };
            Target::initialize_native(&config)?;
            ExecutionEngine::link_in_mc_jit();
            log::debug!("Native target initialized");
            Ok(())
        })
        .clone()
        .map_err(TargetError::Initialize)
}

/// Whether the linked LLVM was built with thread support.
pub fn llvm_is_multithreaded() -> bool {
    // SAFETY: LLVMIsMultithreaded only reads a compile-time constant.
    unsafe { llvm_sys::core::LLVMIsMultithreaded() != 0 }
}

/// Create a target machine for the host CPU.
pub fn host_target_machine(level: OptimizationLevel) -> Result<TargetMachine, TargetError> {
    initialize_native()?;

    let triple = TargetMachine::get_default_triple();
    let triple_name = triple.as_str().to_string_lossy().into_owned();
    let target = Target::from_triple(&triple).map_err(|e| TargetError::UnknownTriple {
        triple: triple_name.clone(),
        reason: e.to_string(),
    })?;

    let cpu = TargetMachine::get_host_cpu_name();
    let features = TargetMachine::get_host_cpu_features();
    let machine = target
        .create_target_machine(
            &triple,
            &cpu.to_string_lossy(),
            &features.to_string_lossy(),
            level,
            RelocMode::Default,
            CodeModel::JITDefault,
        )
        .ok_or(TargetError::MachineCreation {
            triple: triple_name.clone(),
        })?;

    log::debug!("Target machine for {} ({})", triple_name, cpu.to_string_lossy());
    Ok(machine)
}

/// Tear down LLVM's global state. Call once, after every context and engine is gone.
pub fn shutdown() {
    // SAFETY: callers guarantee no LLVM object outlives this call.
    unsafe { llvm_sys::core::LLVMShutdown() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        initialize_native().unwrap();
        initialize_native().unwrap();
    }

    #[test]
    fn test_host_target_machine() {
        let machine = host_target_machine(OptimizationLevel::Default).unwrap();
        let triple = machine.get_triple();
        assert!(!triple.as_str().to_bytes().is_empty());
    }
}

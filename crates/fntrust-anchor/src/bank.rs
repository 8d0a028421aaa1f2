//! Register bank capability and the in-memory simulator.
//!
//! A register bank is a set of extend-only 256-bit registers. Its value can
//! only move to the all-zero reset constant or to `H(value || data)`; it is
//! never written directly.

use crate::error::{AnchorError, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Size of a register value in bytes (SHA-256 bank).
pub const REGISTER_SIZE: usize = 32;

/// Number of registers in a PC-client style bank.
pub const REGISTER_COUNT: u32 = 24;

/// A register value.
pub type RegisterValue = [u8; REGISTER_SIZE];

/// Value of a register after reset.
pub const RESET_VALUE: RegisterValue = [0u8; REGISTER_SIZE];

/// Extend-only register primitives.
///
/// Implemented by the in-memory [`SimulatedBank`] and by the TPM-backed
/// [`TpmBank`](crate::TpmBank). Every method fails promptly when the device
/// cannot be reached; retries, if any, belong to the implementation's
/// transport and never to callers.
pub trait RegisterBank: Send + Sync {
    /// Sets register `index` to [`RESET_VALUE`].
    fn reset(&self, index: u32) -> Result<()>;

    /// Sets register `index` to `H(current || data)`.
    fn extend(&self, index: u32, data: &RegisterValue) -> Result<()>;

    /// Returns the current value of register `index`.
    fn read(&self, index: u32) -> Result<RegisterValue>;
}

/// Computes the value a register takes when `data` is extended into `current`.
///
/// Shared by the simulator and by the anchor's expected-value derivation.
pub fn extend_value(current: &RegisterValue, data: &RegisterValue) -> RegisterValue {
    let mut hasher = Sha256::new();
    hasher.update(current);
    hasher.update(data);
    hasher.finalize().into()
}

/// In-memory register bank for tests and device-less deployments.
///
/// # Example
///
/// ```rust
/// use fntrust_anchor::{extend_value, RegisterBank, SimulatedBank, RESET_VALUE};
///
/// let bank = SimulatedBank::new();
/// bank.extend(16, &[7u8; 32]).unwrap();
/// assert_eq!(bank.read(16).unwrap(), extend_value(&RESET_VALUE, &[7u8; 32]));
///
/// bank.set_available(false);
/// assert!(bank.read(16).is_err());
/// ```
#[derive(Debug)]
pub struct SimulatedBank {
    registers: Mutex<Vec<RegisterValue>>,
    available: AtomicBool,
}

impl SimulatedBank {
    /// Creates a bank with every register at [`RESET_VALUE`].
    pub fn new() -> Self {
        SimulatedBank {
            registers: Mutex::new(vec![RESET_VALUE; REGISTER_COUNT as usize]),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates losing (or regaining) the device.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self, index: u32) -> Result<usize> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AnchorError::Unavailable("simulated device offline".to_string()));
        }
        if index >= REGISTER_COUNT {
            return Err(AnchorError::InvalidIndex(index));
        }
        Ok(index as usize)
    }
}

impl Default for SimulatedBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBank for SimulatedBank {
    fn reset(&self, index: u32) -> Result<()> {
        let slot = self.check(index)?;
        self.registers.lock()[slot] = RESET_VALUE;
        debug!(index, "simulated register reset");
        Ok(())
    }

    fn extend(&self, index: u32, data: &RegisterValue) -> Result<()> {
        let slot = self.check(index)?;
        let mut registers = self.registers.lock();
        let next = extend_value(&registers[slot], data);
        registers[slot] = next;
        debug!(index, "simulated register extended");
        Ok(())
    }

    fn read(&self, index: u32) -> Result<RegisterValue> {
        let slot = self.check(index)?;
        Ok(self.registers.lock()[slot])
    }
}

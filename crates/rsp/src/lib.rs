//! RSP (Reality Signal Processor) - low-level interpreter for Nintendo 64
//!
//! The RSP is the programmable half of the RCP (Reality Co-Processor). Games
//! upload microcode tasks to it for geometry transformation, audio mixing
//! and various decompression schemes. This crate interprets that microcode
//! at the instruction level:
//!
//! - **4KB DMEM / 4KB IMEM**: on-chip memories, big-endian as seen by code
//! - **Scalar Unit (SU)**: the MIPS R4000 integer subset with branch delay
//!   slots, driving control flow and coprocessor 0 (DMA, status)
//! - **Vector Unit (VU)**: 32 registers of eight 16-bit lanes behind COP2,
//!   with a 48-bit per-lane accumulator, carry/compare flag registers and a
//!   single-lane reciprocal unit
//! - **DMA engine**: synchronous block transfers between SP memory and the
//!   host's RDRAM
//! - **Task dispatcher**: hands display/audio lists to the host's HLE
//!   processors when configured, otherwise runs the microcode here
//!
//! # Host contract
//!
//! The engine is a plain value owning all of its state. The host owns RDRAM
//! and lends it to every call that can touch it; optional plugin callbacks
//! are modeled by the [`RspHost`] trait, whose methods all have defaults so
//! a host starts with an empty `impl` and grows it as needed. `do_cycles`
//! never fails: RSP hardware has no faults, so reserved encodings, unaligned
//! accesses and divide edge cases all have defined wrapping or saturating
//! behavior.
//!
//! Execution is single-threaded and runs to completion within each
//! `do_cycles` call; the only preemption is a watchdog that yields back to
//! the host when the microcode spins on a coprocessor 0 status register.

mod config;
mod dma;
mod registers;
mod rsp;
mod su;
mod task;
mod vu;

pub use config::{Config, ConfigError, CONFIG_LEN};
pub use registers::{RcpRegisters, SP_DMA_BUSY, SP_DMA_FULL, SP_DRAM_ADDR, SP_MEM_ADDR};
pub use registers::{SP_RD_LEN, SP_SEMAPHORE, SP_STATUS, SP_WR_LEN};
pub use registers::{
    SP_STATUS_BROKE, SP_STATUS_HALT, SP_STATUS_INTR_BREAK, SP_STATUS_SIG2, SP_STATUS_SSTEP,
};
pub use rsp::Rsp;
pub use task::TaskHeader;

/// Host side of the RSP plugin interface.
///
/// Every method has a default so hosts only implement what they support.
/// The three list processors return `true` when they handled the task;
/// returning `false` (the default) makes the dispatcher fall back to
/// low-level interpretation, which is the correct behavior for a host
/// without that HLE plugin.
pub trait RspHost {
    /// Service a freshly raised MI interrupt on the host CPU.
    fn check_interrupts(&mut self) {}

    /// High-level emulate the graphics task currently described in DMEM.
    fn process_dlist(&mut self) -> bool {
        false
    }

    /// High-level emulate the audio task currently described in DMEM.
    fn process_alist(&mut self) -> bool {
        false
    }

    /// Hand an RDP command list produced by LLE microcode to the rasterizer.
    fn process_rdp_list(&mut self) -> bool {
        false
    }

    /// Force a framebuffer refresh (HVQM tasks draw to memory directly).
    fn show_cfb(&mut self) {}
}

/// A host with none of the optional callbacks, for tests and bring-up.
pub struct NullHost;

impl RspHost for NullHost {}

//! RSP machine state and the task-level execution entry points.
//!
//! Everything the interpreter mutates lives in the [`Rsp`] value: the
//! on-chip memories, both register files, the vector accumulator and flags,
//! the divide unit, the coprocessor 0 mirror and the watchdog counters.
//! State persists across tasks; nothing is cleared between `do_cycles`
//! calls except what the microcode itself clears.

use std::io;
use std::path::Path;

use emu_core::logging::{LogCategory, LogConfig, LogLevel};

use crate::config::Config;
use crate::registers::*;
use crate::task::{self, TaskHeader};
use crate::RspHost;

/// Default RDRAM bound when the host never reported a size (8 MiB).
const DEFAULT_MAX_ADDR: u32 = 0x007F_FFFF;

/// Initial spin tolerance for MFC0 status polls. Lowered to 16 after the
/// first timeout: once one task has been seen waiting on the host, later
/// tasks are assumed to do the same and get yielded much sooner.
const MF_SP_STATUS_TIMEOUT: i16 = 32767;

/// RSP interpreter state
pub struct Rsp {
    /// 4KB DMEM (Data Memory), big-endian byte order
    pub(crate) dmem: [u8; 4096],
    /// 4KB IMEM (Instruction Memory), big-endian byte order
    pub(crate) imem: [u8; 4096],

    /// Scalar general-purpose registers; SR\[0\] reads as zero
    pub(crate) sr: [u32; 32],
    /// Program counter, always word aligned inside the 12-bit IMEM window
    pub(crate) pc: u32,
    /// Branch target armed by the previous instruction (delay slot pending)
    pub(crate) branch: Option<u32>,

    /// Vector registers, eight signed 16-bit lanes each
    pub(crate) vr: [[i16; 8]; 32],
    /// Vector accumulator, one 48-bit signed value per lane
    pub(crate) vacc: [i64; 8],
    /// VCO low half: per-lane carry/borrow out
    pub(crate) vco_carry: [bool; 8],
    /// VCO high half: per-lane not-equal
    pub(crate) vco_ne: [bool; 8],
    /// VCC low half: compare result
    pub(crate) vcc_comp: [bool; 8],
    /// VCC high half: clip compare result
    pub(crate) vcc_clip: [bool; 8],
    /// VCE: compare extension bits for VCH/VCL
    pub(crate) vce: [bool; 8],

    /// High half of the divide input, staged by VRCPH/VRSQH
    pub(crate) div_in: i32,
    /// Last divide result, 32 bits read back 16 at a time
    pub(crate) div_out: i32,
    /// Whether `div_in` holds a staged high half
    pub(crate) div_in_loaded: bool,

    /// Coprocessor 0 register mirror
    pub(crate) regs: RcpRegisters,
    /// Interpreter loop control; cleared by BREAK, MTC0 halt, watchdog
    pub(crate) running: bool,
    /// Consecutive status-poll count per destination register
    pub(crate) mfc0_count: [i16; 32],
    /// Current watchdog limit
    pub(crate) mf_status_timeout: i16,

    /// Highest valid RDRAM offset for DMA, clamped to [2 MiB, 16 MiB)
    pub(crate) max_addr: u32,

    cfg: Config,
    warned_no_rdp_list: bool,
}

impl Rsp {
    /// Create a new RSP, halted, with all state cleared
    pub fn new() -> Self {
        Self {
            dmem: [0; 4096],
            imem: [0; 4096],
            sr: [0; 32],
            pc: 0,
            branch: None,
            vr: [[0; 8]; 32],
            vacc: [0; 8],
            vco_carry: [false; 8],
            vco_ne: [false; 8],
            vcc_comp: [false; 8],
            vcc_clip: [false; 8],
            vce: [false; 8],
            div_in: 0,
            div_out: 0,
            div_in_loaded: false,
            regs: RcpRegisters::new(),
            running: false,
            mfc0_count: [0; 32],
            mf_status_timeout: MF_SP_STATUS_TIMEOUT,
            max_addr: DEFAULT_MAX_ADDR,
            cfg: Config::new(),
            warned_no_rdp_list: false,
        }
    }

    /// Attach to a host session.
    ///
    /// `rdram_len` replaces the original plugin's fault-probing of installed
    /// RDRAM; the DMA bound is clamped into the 2..16 MiB range the probe
    /// honored. The boot PC is 0x04001000, which lands on IMEM offset 0.
    pub fn init(&mut self, rdram_len: usize) {
        self.max_addr = if rdram_len == 0 {
            DEFAULT_MAX_ADDR
        } else {
            (rdram_len as u32 - 1).clamp(0x001F_FFFF, 0x00FF_FFFF)
        };
        self.set_pc(0x0400_1000);
        self.mf_status_timeout = MF_SP_STATUS_TIMEOUT;
    }

    /// Reset to power-on state (memories and registers cleared, halted)
    pub fn reset(&mut self) {
        let max_addr = self.max_addr;
        let cfg = self.cfg;
        *self = Self::new();
        self.max_addr = max_addr;
        self.cfg = cfg;
    }

    /// Install a configuration block
    pub fn configure(&mut self, cfg: Config) {
        self.cfg = cfg;
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Load the configuration block from a file, keeping defaults (and
    /// reporting) when the file is missing or short.
    pub fn load_config(&mut self, path: impl AsRef<Path>) {
        match Config::load(path) {
            Ok(cfg) => self.cfg = cfg,
            Err(err) => {
                if LogConfig::global().should_log(LogCategory::Stubs, LogLevel::Warn) {
                    eprintln!("RSP: failed to read config, using defaults: {err}");
                }
                self.cfg = Config::new();
            }
        }
    }

    /// ROM closed: reset the task PC and persist the configuration block
    pub fn rom_closed(&mut self, config_path: impl AsRef<Path>) -> Result<(), crate::ConfigError> {
        self.set_pc(0x0400_1000);
        self.cfg.save(config_path)
    }

    // ------------------------------------------------------------------
    // Memory access
    // ------------------------------------------------------------------

    /// Read from DMEM
    pub fn read_dmem(&self, offset: u32) -> u8 {
        self.dmem[(offset & 0xFFF) as usize]
    }

    /// Write to DMEM
    pub fn write_dmem(&mut self, offset: u32, value: u8) {
        self.dmem[(offset & 0xFFF) as usize] = value;
    }

    /// Read from IMEM
    pub fn read_imem(&self, offset: u32) -> u8 {
        self.imem[(offset & 0xFFF) as usize]
    }

    /// Write to IMEM
    pub fn write_imem(&mut self, offset: u32, value: u8) {
        self.imem[(offset & 0xFFF) as usize] = value;
    }

    /// Halfword read, byte-composed so unaligned addresses wrap instead of
    /// faulting (the RSP has no address error exception).
    pub(crate) fn dmem_half(&self, addr: u32) -> u16 {
        let hi = self.read_dmem(addr);
        let lo = self.read_dmem(addr.wrapping_add(1));
        u16::from_be_bytes([hi, lo])
    }

    pub(crate) fn set_dmem_half(&mut self, addr: u32, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.write_dmem(addr, hi);
        self.write_dmem(addr.wrapping_add(1), lo);
    }

    /// Word read, byte-composed (see `dmem_half`)
    pub(crate) fn dmem_word(&self, addr: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.read_dmem(addr.wrapping_add(i as u32));
        }
        u32::from_be_bytes(bytes)
    }

    pub(crate) fn set_dmem_word(&mut self, addr: u32, value: u32) {
        for (i, byte) in value.to_be_bytes().into_iter().enumerate() {
            self.write_dmem(addr.wrapping_add(i as u32), byte);
        }
    }

    /// Fetch the instruction word at the current PC
    pub(crate) fn fetch(&self) -> u32 {
        let at = (self.pc & 0xFFC) as usize;
        u32::from_be_bytes([
            self.imem[at],
            self.imem[at + 1],
            self.imem[at + 2],
            self.imem[at + 3],
        ])
    }

    /// SP_PC_REG as the host sees it
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Set SP_PC_REG; only the word-aligned IMEM offset is kept
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc & 0xFFC;
        self.branch = None;
    }

    // ------------------------------------------------------------------
    // Host register window (0x04040000..)
    // ------------------------------------------------------------------

    /// Read an SP register from the host side.
    ///
    /// Takes `&mut self` because reading SP_SEMAPHORE acquires the lock.
    pub fn read_register(&mut self, offset: u32) -> u32 {
        match offset & 0x1C {
            SP_MEM_ADDR => self.regs.sp_mem_addr,
            SP_DRAM_ADDR => self.regs.sp_dram_addr,
            SP_RD_LEN => self.regs.sp_rd_len,
            SP_WR_LEN => self.regs.sp_wr_len,
            SP_STATUS => self.regs.sp_status,
            SP_DMA_FULL => self.regs.sp_dma_full,
            SP_DMA_BUSY => self.regs.sp_dma_busy,
            _ => self.regs.read_semaphore(),
        }
    }

    /// Write an SP register from the host side.
    ///
    /// Writes to SP_RD_LEN/SP_WR_LEN run the DMA synchronously against the
    /// borrowed RDRAM; an interrupt request through SP_STATUS is delivered
    /// before returning.
    pub fn write_register(
        &mut self,
        offset: u32,
        value: u32,
        rdram: &mut [u8],
        host: &mut dyn RspHost,
    ) {
        match offset & 0x1C {
            SP_MEM_ADDR => self.regs.sp_mem_addr = value & 0x1FFF,
            SP_DRAM_ADDR => self.regs.sp_dram_addr = value & 0x00FF_FFFF,
            SP_RD_LEN => {
                self.regs.sp_rd_len = value;
                self.sp_dma_read(rdram);
            }
            SP_WR_LEN => {
                self.regs.sp_wr_len = value;
                self.sp_dma_write(rdram);
            }
            SP_STATUS => {
                if self.regs.write_status(value) {
                    self.raise_sp_interrupt(host);
                }
            }
            SP_DMA_FULL | SP_DMA_BUSY => {} // read-only
            _ => self.regs.sp_semaphore = 0,
        }
    }

    /// Raise the SP bit in MI_INTR and let the host CPU service it
    pub(crate) fn raise_sp_interrupt(&mut self, host: &mut dyn RspHost) {
        self.regs.mi_intr_sp = true;
        if LogConfig::global().should_log(LogCategory::Interrupts, LogLevel::Debug) {
            eprintln!("RSP: raising SP interrupt");
        }
        host.check_interrupts();
    }

    // ------------------------------------------------------------------
    // Task execution
    // ------------------------------------------------------------------

    /// Execute the task currently set up in DMEM.
    ///
    /// Returns the number of instructions retired, or 0 when the RSP is
    /// halted or the task was completed by an HLE handoff. The interpreter
    /// always runs until BREAK, an MTC0 halt, or the status-poll watchdog;
    /// `_cycles` is accepted for interface compatibility but the RSP cannot
    /// stop mid-task after a requested number of cycles.
    pub fn do_cycles(&mut self, _cycles: u32, rdram: &mut [u8], host: &mut dyn RspHost) -> u32 {
        if self.regs.sp_status & (SP_STATUS_HALT | SP_STATUS_BROKE) != 0 {
            return 0;
        }

        let header = TaskHeader::from_dmem(&self.dmem);
        match header.task_type {
            task::M_GFXTASK if self.cfg.hle_gfx() => {
                if header.data_ptr == 0 {
                    // Null display list pointer (seen in Resident Evil 2):
                    // drop the task but still complete the status protocol.
                    self.finish_hle_task(host, true);
                    return 0;
                }
                if host.process_dlist() {
                    self.finish_hle_task(host, true);
                    return 0;
                }
                // No graphics HLE in this host; interpret the task instead.
            }
            task::M_AUDTASK if self.cfg.hle_aud() => {
                if host.process_alist() {
                    self.finish_hle_task(host, false);
                    return 0;
                }
            }
            task::M_HVQMTASK => {
                // HVQM decodes straight into the framebuffer; poke the video
                // plugin so the result becomes visible, then run the task.
                host.show_cfb();
            }
            task::M_GFXTASK | task::M_AUDTASK | task::M_NJPEGTASK | task::CIC_BOOT_TYPE => {}
            task::M_VIDTASK | task::M_NULTASK | task::M_HVQTASK => {
                if LogConfig::global().should_log(LogCategory::Task, LogLevel::Info) {
                    eprintln!("RSP: running {} via LLE", header.type_name());
                }
            }
            other => {
                if LogConfig::global().should_log(LogCategory::Task, LogLevel::Warn) {
                    eprintln!(
                        "RSP: unknown task type {:#010X} (ucode crc {:#010X})",
                        other,
                        task::microcode_fingerprint(&self.imem)
                    );
                }
            }
        }

        self.mfc0_count = [0; 32];
        let retired = self.run_task(rdram, host);

        if self.regs.sp_status & SP_STATUS_BROKE != 0 {
            // Normal exit from executing BREAK
            return retired;
        }
        if self.regs.mi_intr_sp {
            // MTC0 requested an interrupt to stop the task
            host.check_interrupts();
        } else {
            // Watchdog or self-halt exit: the microcode is waiting on the
            // host. From now on give up after 16 polls instead of 32767,
            // and clear HALT so the loop resumes with the correct signals
            // once the host changes whatever is being waited on.
            self.mf_status_timeout = 16;
            self.regs.sp_status &= !SP_STATUS_HALT;
        }
        retired
    }

    /// Fetch-decode-execute until something stops the loop
    fn run_task(&mut self, rdram: &mut [u8], host: &mut dyn RspHost) -> u32 {
        self.running = true;
        let mut retired: u32 = 0;
        while self.running {
            self.step(rdram, host);
            retired = retired.wrapping_add(1);
            if self.regs.sp_status & SP_STATUS_SSTEP != 0 {
                // Single-step mode: yield to the host after every retire
                self.running = false;
            }
        }
        retired
    }

    /// Completion protocol shared by the HLE handoff paths
    fn finish_hle_task(&mut self, host: &mut dyn RspHost, graphics: bool) {
        self.regs.sp_status |= SP_STATUS_SIG2 | SP_STATUS_BROKE | SP_STATUS_HALT;
        if self.regs.sp_status & SP_STATUS_INTR_BREAK != 0 {
            self.raise_sp_interrupt(host);
        }
        if graphics {
            self.regs.dpc_status &= !DPC_STATUS_FREEZE;
        }
    }

    /// Warn once when LLE microcode kicks the RDP but the host cannot take
    /// the command list.
    pub(crate) fn warn_no_rdp_list(&mut self) {
        if self.warned_no_rdp_list {
            return;
        }
        self.warned_no_rdp_list = true;
        if LogConfig::global().should_log(LogCategory::Stubs, LogLevel::Warn) {
            eprintln!("RSP: LLE task produced an RDP list but the host has no processor for it");
        }
    }

    // ------------------------------------------------------------------
    // Debugging aids
    // ------------------------------------------------------------------

    /// Dump DMEM and IMEM snapshots (`rcpcache.dhex` / `rcpcache.ihex`)
    /// into `dir`. The files hold the big-endian bytes exactly as the
    /// microcode sees them.
    pub fn export_sp_memory(&self, dir: impl AsRef<Path>) -> io::Result<()> {
        let dir = dir.as_ref();
        std::fs::write(dir.join("rcpcache.dhex"), self.dmem)?;
        std::fs::write(dir.join("rcpcache.ihex"), self.imem)?;
        Ok(())
    }

    /// Return a JSON-serializable save state.
    /// Note: DMEM/IMEM are included; the host owns RDRAM separately.
    pub fn save_state(&self) -> serde_json::Value {
        serde_json::json!({
            "version": 1,
            "pc": self.pc,
            "sr": self.sr,
            "vr": self.vr,
            "vacc": self.vacc,
            "vco": self.get_vco(),
            "vcc": self.get_vcc(),
            "vce": self.get_vce(),
            "div_in": self.div_in,
            "div_out": self.div_out,
            "div_in_loaded": self.div_in_loaded,
            "dmem": serde_json::to_value(self.dmem.to_vec()).unwrap_or_default(),
            "imem": serde_json::to_value(self.imem.to_vec()).unwrap_or_default(),
            "regs": &self.regs,
        })
    }

    /// Load a JSON save state produced by `save_state`.
    /// Missing fields keep their current values.
    pub fn load_state(&mut self, v: &serde_json::Value) -> Result<(), serde_json::Error> {
        if let Some(pc) = v["pc"].as_u64() {
            self.pc = (pc as u32) & 0xFFC;
        }
        if let Some(sr) = v["sr"].as_array() {
            for (i, val) in sr.iter().enumerate().take(32) {
                self.sr[i] = val.as_u64().unwrap_or(0) as u32;
            }
        }
        if let Some(vr) = v["vr"].as_array() {
            for (i, lanes) in vr.iter().enumerate().take(32) {
                if let Some(lanes) = lanes.as_array() {
                    for (j, lane) in lanes.iter().enumerate().take(8) {
                        self.vr[i][j] = lane.as_i64().unwrap_or(0) as i16;
                    }
                }
            }
        }
        if let Some(vacc) = v["vacc"].as_array() {
            for (i, val) in vacc.iter().enumerate().take(8) {
                self.vacc[i] = val.as_i64().unwrap_or(0);
            }
        }
        if let Some(vco) = v["vco"].as_u64() {
            self.set_vco(vco as u16);
        }
        if let Some(vcc) = v["vcc"].as_u64() {
            self.set_vcc(vcc as u16);
        }
        if let Some(vce) = v["vce"].as_u64() {
            self.set_vce(vce as u8);
        }
        if let Some(div_in) = v["div_in"].as_i64() {
            self.div_in = div_in as i32;
        }
        if let Some(div_out) = v["div_out"].as_i64() {
            self.div_out = div_out as i32;
        }
        if let Some(flag) = v["div_in_loaded"].as_bool() {
            self.div_in_loaded = flag;
        }
        for (field, mem) in [("dmem", 0), ("imem", 1)] {
            if let Some(bytes) = v[field].as_array() {
                let target: &mut [u8; 4096] = if mem == 0 {
                    &mut self.dmem
                } else {
                    &mut self.imem
                };
                for (i, byte) in bytes.iter().enumerate().take(4096) {
                    target[i] = byte.as_u64().unwrap_or(0) as u8;
                }
            }
        }
        if v["regs"].is_object() {
            self.regs = serde_json::from_value(v["regs"].clone())?;
        }
        Ok(())
    }
}

impl Default for Rsp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod asm {
    //! Tiny instruction builders and a run harness for tests. Field order
    //! follows the MIPS manuals, not the assembler operand order.

    use super::Rsp;
    use crate::registers::{SP_STATUS_BROKE, SP_STATUS_HALT};
    use crate::NullHost;

    /// Place a program at IMEM 0 and point the PC at it
    pub fn load_program(rsp: &mut Rsp, program: &[u32]) {
        for (i, word) in program.iter().enumerate() {
            let bytes = word.to_be_bytes();
            for (j, byte) in bytes.iter().enumerate() {
                rsp.imem[i * 4 + j] = *byte;
            }
        }
        rsp.set_pc(0);
    }

    /// Clear HALT and BROKE the way the host CPU does
    pub fn unhalt(rsp: &mut Rsp) {
        rsp.regs.sp_status &= !(SP_STATUS_HALT | SP_STATUS_BROKE);
    }

    /// Load a program and run it to completion with a callback-less host
    pub fn run(rsp: &mut Rsp, program: &[u32]) -> u32 {
        load_program(rsp, program);
        unhalt(rsp);
        let mut rdram = vec![0u8; 0x20_0000];
        rsp.do_cycles(0, &mut rdram, &mut NullHost)
    }

    pub fn special(funct: u32, rs: u32, rt: u32, rd: u32, sa: u32) -> u32 {
        (rs << 21) | (rt << 16) | (rd << 11) | (sa << 6) | funct
    }

    pub fn i_type(op: u32, rs: u32, rt: u32, imm: u16) -> u32 {
        (op << 26) | (rs << 21) | (rt << 16) | imm as u32
    }

    pub fn addi(rt: u32, rs: u32, imm: i16) -> u32 {
        i_type(0x08, rs, rt, imm as u16)
    }

    pub fn ori(rt: u32, rs: u32, imm: u16) -> u32 {
        i_type(0x0D, rs, rt, imm)
    }

    pub fn lui(rt: u32, imm: u16) -> u32 {
        i_type(0x0F, 0, rt, imm)
    }

    pub fn beq(rs: u32, rt: u32, offset: i16) -> u32 {
        i_type(0x04, rs, rt, offset as u16)
    }

    pub fn bne(rs: u32, rt: u32, offset: i16) -> u32 {
        i_type(0x05, rs, rt, offset as u16)
    }

    pub fn j(target: u32) -> u32 {
        (0x02 << 26) | ((target >> 2) & 0x03FF_FFFF)
    }

    pub fn jal(target: u32) -> u32 {
        (0x03 << 26) | ((target >> 2) & 0x03FF_FFFF)
    }

    pub fn lw(rt: u32, offset: i16, base: u32) -> u32 {
        i_type(0x23, base, rt, offset as u16)
    }

    pub fn sw(rt: u32, offset: i16, base: u32) -> u32 {
        i_type(0x2B, base, rt, offset as u16)
    }

    pub fn mfc0(rt: u32, rd: u32) -> u32 {
        (0x10 << 26) | (rt << 16) | (rd << 11)
    }

    pub fn mtc0(rt: u32, rd: u32) -> u32 {
        (0x10 << 26) | (0x04 << 21) | (rt << 16) | (rd << 11)
    }

    pub fn mtc2(rt: u32, vd: u32, e: u32) -> u32 {
        (0x12 << 26) | (0x04 << 21) | (rt << 16) | (vd << 11) | (e << 7)
    }

    pub fn mfc2(rt: u32, vs: u32, e: u32) -> u32 {
        (0x12 << 26) | (rt << 16) | (vs << 11) | (e << 7)
    }

    pub fn vector(funct: u32, vd: u32, vs: u32, vt: u32, e: u32) -> u32 {
        (0x12 << 26) | (1 << 25) | (e << 21) | (vt << 16) | (vs << 11) | (vd << 6) | funct
    }

    pub fn lwc2(minor: u32, vt: u32, e: u32, offset: i32, base: u32) -> u32 {
        (0x32 << 26) | (base << 21) | (vt << 16) | (minor << 11) | (e << 7) | (offset as u32 & 0x7F)
    }

    pub const BREAK: u32 = 0x0000_000D;
    pub const NOP: u32 = 0;
}

//! SP DMA engine: block transfers between DMEM/IMEM and RDRAM.
//!
//! A length register write encodes `length | (count << 12) | (skip << 20)`:
//! `count + 1` rows of `length + 1` bytes, with `skip` bytes advanced
//! between rows on the RDRAM side only (used to walk framebuffer strips).
//! Lengths round up to 8-byte units and both base addresses are 8-byte
//! aligned, matching the hardware's bus granularity.
//!
//! Transfers complete synchronously inside the register write that started
//! them, so the busy/full registers only ever read back as idle. All
//! memories hold the microcode's big-endian byte order, which makes the
//! copy a plain byte move.

use emu_core::logging::{LogCategory, LogConfig, LogLevel};

use crate::registers::{SP_STATUS_DMA_BUSY, SP_STATUS_DMA_FULL};
use crate::rsp::Rsp;

impl Rsp {
    /// RDRAM -> SP memory, triggered by a write to SP_RD_LEN
    pub(crate) fn sp_dma_read(&mut self, rdram: &[u8]) {
        let (length, count, skip) = decode_length(self.regs.sp_rd_len);
        let is_imem = self.regs.sp_mem_addr & 0x1000 != 0;
        let mut mem = self.regs.sp_mem_addr & 0x0FF8;
        let mut dram = self.regs.sp_dram_addr & self.max_addr & !7;

        if LogConfig::global().should_log(LogCategory::Dma, LogLevel::Debug) {
            eprintln!(
                "RSP: DMA read {}x{} bytes (skip {}) {:06X} -> {}:{:03X}",
                count,
                length,
                skip,
                dram,
                if is_imem { "IMEM" } else { "DMEM" },
                mem
            );
        }

        for _ in 0..count {
            for i in 0..length {
                let src = (dram + i) as usize;
                if src >= rdram.len() {
                    continue;
                }
                let dst = ((mem + i) & 0xFFF) as usize;
                if is_imem {
                    self.imem[dst] = rdram[src];
                } else {
                    self.dmem[dst] = rdram[src];
                }
            }
            mem = mem.wrapping_add(length);
            dram = dram.wrapping_add(length + skip) & self.max_addr;
        }

        self.finish_dma(is_imem, mem, dram);
    }

    /// SP memory -> RDRAM, triggered by a write to SP_WR_LEN
    pub(crate) fn sp_dma_write(&mut self, rdram: &mut [u8]) {
        let (length, count, skip) = decode_length(self.regs.sp_wr_len);
        let is_imem = self.regs.sp_mem_addr & 0x1000 != 0;
        let mut mem = self.regs.sp_mem_addr & 0x0FF8;
        let mut dram = self.regs.sp_dram_addr & self.max_addr & !7;

        if LogConfig::global().should_log(LogCategory::Dma, LogLevel::Debug) {
            eprintln!(
                "RSP: DMA write {}x{} bytes (skip {}) {}:{:03X} -> {:06X}",
                count,
                length,
                skip,
                if is_imem { "IMEM" } else { "DMEM" },
                mem,
                dram
            );
        }

        for _ in 0..count {
            for i in 0..length {
                let dst = (dram + i) as usize;
                if dst >= rdram.len() {
                    continue;
                }
                let src = ((mem + i) & 0xFFF) as usize;
                rdram[dst] = if is_imem { self.imem[src] } else { self.dmem[src] };
            }
            mem = mem.wrapping_add(length);
            dram = dram.wrapping_add(length + skip) & self.max_addr;
        }

        self.finish_dma(is_imem, mem, dram);
    }

    fn finish_dma(&mut self, is_imem: bool, mem: u32, dram: u32) {
        // Leave the address registers pointing past the block, as the
        // hardware does, and report the engine idle.
        self.regs.sp_mem_addr = (mem & 0xFFF) | ((is_imem as u32) << 12);
        self.regs.sp_dram_addr = dram;
        self.regs.sp_dma_busy = 0;
        self.regs.sp_dma_full = 0;
        self.regs.sp_status &= !(SP_STATUS_DMA_BUSY | SP_STATUS_DMA_FULL);
    }
}

/// Split a length register into (row bytes, row count, inter-row skip)
fn decode_length(len: u32) -> (u32, u32, u32) {
    let length = ((len & 0xFFF) + 1 + 7) & !7;
    let count = ((len >> 12) & 0xFF) + 1;
    let skip = (len >> 20) & 0xFFF;
    (length, count, skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{SP_STATUS_DMA_BUSY, SP_STATUS_HALT};

    #[test]
    fn test_length_rounds_up_to_eight() {
        assert_eq!(decode_length(0), (8, 1, 0));
        assert_eq!(decode_length(7), (8, 1, 0));
        assert_eq!(decode_length(8), (16, 1, 0));
        assert_eq!(decode_length(0xFFF), (4096, 1, 0));
    }

    #[test]
    fn test_count_and_skip_fields() {
        let len = 0x0F | (3 << 12) | (0x20 << 20);
        assert_eq!(decode_length(len), (16, 4, 0x20));
    }

    #[test]
    fn test_dma_read_into_dmem() {
        let mut rsp = Rsp::new();
        let mut rdram = vec![0u8; 0x20_0000];
        for i in 0..8 {
            rdram[0x100 + i] = 0x10 + i as u8;
        }
        rsp.regs.sp_mem_addr = 0x200;
        rsp.regs.sp_dram_addr = 0x100;
        rsp.regs.sp_rd_len = 7;
        rsp.sp_dma_read(&mut rdram);

        for i in 0..8u32 {
            assert_eq!(rsp.read_dmem(0x200 + i), 0x10 + i as u8);
        }
        // Busy flags idle, status untouched otherwise
        assert_eq!(rsp.regs.sp_dma_busy, 0);
        assert_eq!(rsp.regs.sp_status & SP_STATUS_DMA_BUSY, 0);
        assert_eq!(rsp.regs.sp_status & SP_STATUS_HALT, SP_STATUS_HALT);
    }

    #[test]
    fn test_dma_read_into_imem() {
        let mut rsp = Rsp::new();
        let mut rdram = vec![0u8; 0x20_0000];
        rdram[0x40] = 0x12;
        rdram[0x41] = 0x34;
        rsp.regs.sp_mem_addr = 0x1000; // IMEM, offset 0
        rsp.regs.sp_dram_addr = 0x40;
        rsp.regs.sp_rd_len = 1;
        rsp.sp_dma_read(&mut rdram);
        assert_eq!(rsp.read_imem(0), 0x12);
        assert_eq!(rsp.read_imem(1), 0x34);
        // The IMEM select bit survives the address writeback
        assert_ne!(rsp.regs.sp_mem_addr & 0x1000, 0);
    }

    #[test]
    fn test_dma_write_round_trip() {
        let mut rsp = Rsp::new();
        let mut rdram = vec![0u8; 0x20_0000];
        for i in 0..32u32 {
            rsp.write_dmem(i, i as u8 ^ 0x5A);
        }
        rsp.regs.sp_mem_addr = 0;
        rsp.regs.sp_dram_addr = 0x1_0000;
        rsp.regs.sp_wr_len = 31;
        rsp.sp_dma_write(&mut rdram);

        rsp.regs.sp_mem_addr = 0x800;
        rsp.regs.sp_dram_addr = 0x1_0000;
        rsp.regs.sp_rd_len = 31;
        rsp.sp_dma_read(&mut rdram);

        for i in 0..32u32 {
            assert_eq!(rsp.read_dmem(0x800 + i), i as u8 ^ 0x5A);
        }
    }

    #[test]
    fn test_dma_row_skip_on_rdram_side() {
        let mut rsp = Rsp::new();
        let mut rdram = vec![0u8; 0x20_0000];
        for i in 0..16u32 {
            rsp.write_dmem(i, 1 + i as u8);
        }
        // Two rows of 8 bytes with an 8-byte hole between them in RDRAM
        rsp.regs.sp_mem_addr = 0;
        rsp.regs.sp_dram_addr = 0x2000;
        rsp.regs.sp_wr_len = 7 | (1 << 12) | (8 << 20);
        rsp.sp_dma_write(&mut rdram);

        assert_eq!(rdram[0x2000], 1);
        assert_eq!(rdram[0x2007], 8);
        // The hole stays clear, the second row lands after it
        assert_eq!(rdram[0x2008], 0);
        assert_eq!(rdram[0x2010], 9);
        assert_eq!(rdram[0x2017], 16);
    }

    #[test]
    fn test_dma_clamps_to_rdram_bound() {
        let mut rsp = Rsp::new();
        rsp.max_addr = 0x1F_FFFF;
        let mut rdram = vec![0u8; 0x20_0000];
        rdram[0x10] = 0x99;
        // An address above the bound wraps into the installed memory
        rsp.regs.sp_mem_addr = 0;
        rsp.regs.sp_dram_addr = 0x40_0010 & 0x00FF_FFFF;
        rsp.regs.sp_rd_len = 7;
        rsp.sp_dma_read(&mut rdram);
        assert_eq!(rsp.read_dmem(0), 0x99);
    }

    #[test]
    fn test_dma_spmem_wraps_4k() {
        let mut rsp = Rsp::new();
        let mut rdram = vec![0u8; 0x20_0000];
        for i in 0..16usize {
            rdram[0x300 + i] = 0xC0 + i as u8;
        }
        rsp.regs.sp_mem_addr = 0xFF8; // last 8 bytes of DMEM
        rsp.regs.sp_dram_addr = 0x300;
        rsp.regs.sp_rd_len = 15;
        rsp.sp_dma_read(&mut rdram);
        assert_eq!(rsp.read_dmem(0xFF8), 0xC0);
        assert_eq!(rsp.read_dmem(0xFFF), 0xC7);
        assert_eq!(rsp.read_dmem(0x000), 0xC8);
        assert_eq!(rsp.read_dmem(0x007), 0xCF);
    }
}

//! COP2 compare and select family.
//!
//! VLT/VEQ/VNE/VGE fold the VADDC/VSUBC carry state into exact 32-bit
//! comparisons, then leave their verdict in VCC low and the winning operand
//! in ACC_L. VCH/VCL/VCR are the two-sided clip compares used by triangle
//! and lighting setup; VCH computes against +VT/-VT and stages state that a
//! following VCL refines for the low halves of 32-bit lanes. All of them
//! retire with VCO and VCE cleared.

use crate::rsp::Rsp;

impl Rsp {
    fn finish_compare(&mut self) {
        self.clear_vco();
        self.vce = [false; 8];
    }

    /// VLT: less-than, or equal where VADDC left carry and not-equal
    pub(super) fn vlt(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let equal_wins = s == st[i] && self.vco_ne[i] && self.vco_carry[i];
            let comp = s < st[i] || equal_wins;
            let result = if comp { s } else { st[i] };
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
            self.vcc_comp[i] = comp;
            self.vcc_clip[i] = false;
        }
        self.finish_compare();
    }

    /// VEQ: equal and no sticky not-equal
    pub(super) fn veq(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let comp = s == st[i] && !self.vco_ne[i];
            let result = if comp { s } else { st[i] };
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
            self.vcc_comp[i] = comp;
            self.vcc_clip[i] = false;
        }
        self.finish_compare();
    }

    /// VNE: not-equal or sticky not-equal
    pub(super) fn vne(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let comp = s != st[i] || self.vco_ne[i];
            let result = if comp { s } else { st[i] };
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
            self.vcc_comp[i] = comp;
            self.vcc_clip[i] = false;
        }
        self.finish_compare();
    }

    /// VGE: greater-than, or equal unless carry and not-equal both held
    pub(super) fn vge(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let equal_wins = s == st[i] && !(self.vco_ne[i] && self.vco_carry[i]);
            let comp = s > st[i] || equal_wins;
            let result = if comp { s } else { st[i] };
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
            self.vcc_comp[i] = comp;
            self.vcc_clip[i] = false;
        }
        self.finish_compare();
    }

    /// VCH: clip test high. Each lane compares VS against +/-VT depending
    /// on whether the operand signs agree, producing the le/ge pair in VCC,
    /// carry/not-equal in VCO and the "exactly -1" extension bit in VCE.
    pub(super) fn vch(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let t = st[i];
            let result;
            if (s ^ t) < 0 {
                // Signs differ: test against -VT
                let sum = s as i32 + t as i32;
                self.vcc_clip[i] = t < 0;
                self.vcc_comp[i] = sum <= 0;
                self.vce[i] = sum == -1;
                self.vco_carry[i] = true;
                self.vco_ne[i] = sum != 0 && !self.vce[i];
                result = if self.vcc_comp[i] { t.wrapping_neg() } else { s };
            } else {
                let diff = s as i32 - t as i32;
                self.vcc_comp[i] = t < 0;
                self.vcc_clip[i] = diff >= 0;
                self.vce[i] = false;
                self.vco_carry[i] = false;
                self.vco_ne[i] = diff != 0;
                result = if self.vcc_clip[i] { t } else { s };
            }
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
        }
    }

    /// VCL: clip test low, refining the VCH verdict with unsigned
    /// comparisons for the low halves. Consumes and clears VCO/VCE.
    pub(super) fn vcl(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i] as u16;
            let t = st[i] as u16;
            let result;
            if self.vco_carry[i] {
                if !self.vco_ne[i] {
                    let sum = s as u32 + t as u32;
                    let low_zero = sum & 0xFFFF == 0;
                    let carry_out = sum > 0xFFFF;
                    self.vcc_comp[i] = if self.vce[i] {
                        low_zero || !carry_out
                    } else {
                        low_zero && !carry_out
                    };
                }
                result = if self.vcc_comp[i] { t.wrapping_neg() } else { s };
            } else {
                if !self.vco_ne[i] {
                    self.vcc_clip[i] = s >= t;
                }
                result = if self.vcc_clip[i] { t } else { s };
            }
            self.set_acc_l(i, result as i16);
            self.vr[vd][i] = result as i16;
        }
        self.finish_compare();
    }

    /// VCR: single-pass clip against a one's-complement bound
    pub(super) fn vcr(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let s = self.vr[vs][i];
            let t = st[i];
            let result;
            if (s ^ t) < 0 {
                self.vcc_clip[i] = t < 0;
                self.vcc_comp[i] = s as i32 + t as i32 + 1 <= 0;
                result = if self.vcc_comp[i] { !t } else { s };
            } else {
                self.vcc_comp[i] = t < 0;
                self.vcc_clip[i] = s as i32 - t as i32 >= 0;
                result = if self.vcc_clip[i] { t } else { s };
            }
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
        }
        self.finish_compare();
    }

    /// VMRG: lane-wise select on VCC low
    pub(super) fn vmrg(&mut self, vd: usize, vs: usize, vt: usize, e: usize) {
        let st = self.st(vt, e);
        for i in 0..8 {
            let result = if self.vcc_comp[i] {
                self.vr[vs][i]
            } else {
                st[i]
            };
            self.set_acc_l(i, result);
            self.vr[vd][i] = result;
        }
        self.finish_compare();
    }
}

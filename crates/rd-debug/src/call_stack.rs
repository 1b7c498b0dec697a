//! Call stack reconstruction
//!
//! Two sources feed the stack. When the host instruments call and return
//! instructions it reports them through [`CallStackViewer::push_call`] and
//! [`CallStackViewer::pop_call`], and the viewer trusts that record from
//! then on. Otherwise the stack is rebuilt on every detection pass from the
//! stack and frame pointers:
//!
//! - M68K and ARM follow the frame-pointer chain (A6 and R11).
//! - Z80, M6502 and MIPS scan a few stack slots for values that look like
//!   return addresses. This is a heuristic: frames can be missed and stale
//!   data can show up as a frame.
//!
//! Every walk is bounded by `max_frames` and stops on null, cyclic or
//! implausibly low frame pointers, so a corrupted chain cannot hang it.

use rd_core::config::CallStackConfig;
use rd_core::{Architecture, MemoryReadFn};
use rd_cpu::{core_for, CpuCore};

use crate::render::{self, Canvas, Color, Rect};

/// One activation record; index 0 of a stack is the innermost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Address of the call instruction (0 for the current frame)
    pub call_address: u32,
    /// Address execution resumes at after the callee returns
    pub return_address: u32,
    /// Where this frame is executing now
    pub current_address: u32,
    pub function_name: String,
    pub stack_pointer: u32,
    pub frame_pointer: u32,
}

/// Address to symbol name
pub type SymbolLookupFn = Box<dyn Fn(u32) -> Option<String> + Send + Sync>;

/// Call stack viewer
pub struct CallStackViewer {
    architecture: Option<Architecture>,
    core: Option<Box<dyn CpuCore>>,
    read: Option<MemoryReadFn>,
    frames: Vec<StackFrame>,
    stack_pointer: u32,
    frame_pointer: u32,
    pc: u32,
    /// Set once the host reports calls directly
    explicit: bool,
    symbols: Option<SymbolLookupFn>,
    max_frames: usize,
    min_frame_address: u32,
    scan_slots: usize,
    code_start: u32,
    code_end: u32,
    max_display_depth: usize,
    auto_detect: bool,
}

impl Default for CallStackViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStackViewer {
    pub fn new() -> Self {
        Self::with_config(&CallStackConfig::default())
    }

    pub fn with_config(config: &CallStackConfig) -> Self {
        Self {
            architecture: None,
            core: None,
            read: None,
            frames: Vec::new(),
            stack_pointer: 0,
            frame_pointer: 0,
            pc: 0,
            explicit: false,
            symbols: None,
            max_frames: config.max_frames.max(1),
            min_frame_address: config.min_frame_address,
            scan_slots: config.scan_slots,
            code_start: config.code_start,
            code_end: config.code_end,
            max_display_depth: config.max_display_depth.max(1),
            auto_detect: config.auto_detect,
        }
    }

    /// Select the detection strategy for `arch` and drop the current stack
    pub fn set_architecture(&mut self, arch: Architecture) {
        self.architecture = Some(arch);
        self.core = Some(core_for(arch));
        self.clear_stack();
        tracing::debug!("Call stack strategy set to {}", arch);
    }

    pub fn architecture(&self) -> Option<Architecture> {
        self.architecture
    }

    pub fn set_memory_read_function(&mut self, read: MemoryReadFn) {
        self.read = Some(read);
    }

    pub fn set_stack_pointer(&mut self, sp: u32) {
        self.stack_pointer = sp;
    }

    pub fn set_frame_pointer(&mut self, fp: u32) {
        self.frame_pointer = fp;
    }

    pub fn stack_pointer(&self) -> u32 {
        self.stack_pointer
    }

    pub fn frame_pointer(&self) -> u32 {
        self.frame_pointer
    }

    /// Record the live PC; frame 0 follows it
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
        if let Some(frame) = self.frames.first_mut() {
            frame.current_address = pc;
        }
    }

    pub fn set_symbol_lookup(&mut self, lookup: SymbolLookupFn) {
        self.symbols = Some(lookup);
    }

    pub fn set_auto_detect(&mut self, enabled: bool) {
        self.auto_detect = enabled;
    }

    pub fn auto_detect(&self) -> bool {
        self.auto_detect
    }

    pub fn set_max_display_depth(&mut self, depth: usize) {
        self.max_display_depth = depth.max(1);
    }

    /// Restrict plausible return addresses to `[start, end]`
    pub fn set_code_range(&mut self, start: u32, end: u32) {
        self.code_start = start;
        self.code_end = end;
    }

    /// True once calls are being reported by the host
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Host-reported call; the new frame becomes the innermost
    pub fn push_call(&mut self, call_address: u32, return_address: u32) {
        if !self.explicit {
            // Heuristic frames are not mixed with reported ones
            self.frames.clear();
            self.explicit = true;
        }
        if self.frames.len() >= self.max_frames {
            tracing::warn!("Call stack full at {} frames, dropping outermost", self.max_frames);
            self.frames.pop();
        }

        let frame = StackFrame {
            call_address,
            return_address,
            current_address: self.pc,
            function_name: self.name_for(call_address),
            stack_pointer: self.stack_pointer,
            frame_pointer: self.frame_pointer,
        };
        tracing::trace!("Call at 0x{:08X}, return 0x{:08X}", call_address, return_address);
        self.frames.insert(0, frame);
    }

    /// Host-reported return; false when the stack is already empty
    pub fn pop_call(&mut self) -> bool {
        if self.frames.is_empty() {
            return false;
        }
        let frame = self.frames.remove(0);
        tracing::trace!("Return to 0x{:08X}", frame.return_address);
        true
    }

    /// Drop all frames and leave explicit tracking mode
    pub fn clear_stack(&mut self) {
        self.frames.clear();
        self.explicit = false;
    }

    /// Per-step refresh; runs detection unless calls are host-reported
    pub fn update(&mut self) {
        if self.explicit || !self.auto_detect || self.read.is_none() {
            return;
        }
        self.detect_stack_frames();
    }

    /// Rebuild the stack from the registers and stack memory
    pub fn detect_stack_frames(&mut self) {
        if self.explicit {
            return;
        }
        let Some(arch) = self.architecture else {
            self.frames.clear();
            return;
        };

        let mut frames = vec![StackFrame {
            call_address: 0,
            return_address: 0,
            current_address: self.pc,
            function_name: self.name_for(self.pc),
            stack_pointer: self.stack_pointer,
            frame_pointer: self.frame_pointer,
        }];

        if let Some(read) = self.read.clone() {
            let read: &dyn Fn(u32) -> u8 = &*read;
            match arch {
                Architecture::M68K | Architecture::ARM => self.walk_frame_chain(arch, read, &mut frames),
                Architecture::Z80 => self.scan_z80(read, &mut frames),
                Architecture::M6502 => self.scan_m6502(read, &mut frames),
                Architecture::MIPS => self.scan_mips(read, &mut frames),
            }
        }

        tracing::trace!("Detected {} frames", frames.len());
        self.frames = frames;
    }

    fn walk_frame_chain(&self, arch: Architecture, read: &dyn Fn(u32) -> u8, frames: &mut Vec<StackFrame>) {
        let endian = arch.endianness();
        let mut fp = self.frame_pointer;

        while frames.len() < self.max_frames {
            if fp == 0 || fp < self.min_frame_address {
                break;
            }

            let (saved_fp, ret) = match arch {
                // LINK A6: [A6] = caller's A6, [A6+4] = return address
                Architecture::M68K => (
                    endian.read_value(read, fp, 4) as u32,
                    endian.read_value(read, fp.wrapping_add(4), 4) as u32,
                ),
                // APCS: [fp] = saved lr, [fp-4] = caller's fp
                _ => (
                    endian.read_value(read, fp.wrapping_sub(4), 4) as u32,
                    endian.read_value(read, fp, 4) as u32,
                ),
            };

            if ret == 0 || !self.in_code_range(ret) {
                break;
            }

            let call = self.call_site(arch, read, ret);
            frames.push(StackFrame {
                call_address: call,
                return_address: ret,
                current_address: ret,
                function_name: self.name_for(call),
                stack_pointer: 0,
                frame_pointer: fp,
            });

            if saved_fp == 0 || saved_fp == fp || saved_fp < self.min_frame_address {
                break;
            }
            fp = saved_fp;
        }
    }

    fn scan_z80(&self, read: &dyn Fn(u32) -> u8, frames: &mut Vec<StackFrame>) {
        for slot in 0..self.scan_slots {
            if frames.len() >= self.max_frames {
                break;
            }
            let addr = (self.stack_pointer as usize + slot * 2) as u32 & 0xFFFF;
            let ret = Architecture::Z80.read_value(read, addr, 2) as u32;
            if ret == 0 || !self.in_code_range(ret) {
                continue;
            }
            let call = self.call_site(Architecture::Z80, read, ret);
            frames.push(self.scanned_frame(call, ret, addr));
        }
    }

    fn scan_m6502(&self, read: &dyn Fn(u32) -> u8, frames: &mut Vec<StackFrame>) {
        // Page one; JSR pushes the address of its last byte
        for slot in 0..self.scan_slots {
            if frames.len() >= self.max_frames {
                break;
            }
            let offset = (self.stack_pointer & 0xFF) as usize + 1 + slot * 2;
            if offset + 1 > 0xFF {
                break;
            }
            let addr = 0x100 + offset as u32;
            let popped = Architecture::M6502.read_value(read, addr, 2) as u32;
            if popped == 0 {
                continue;
            }
            let ret = (popped + 1) & 0xFFFF;
            if !self.in_code_range(ret) {
                continue;
            }
            frames.push(self.scanned_frame(popped.wrapping_sub(2) & 0xFFFF, ret, addr));
        }
    }

    fn scan_mips(&self, read: &dyn Fn(u32) -> u8, frames: &mut Vec<StackFrame>) {
        for slot in 0..self.scan_slots {
            if frames.len() >= self.max_frames {
                break;
            }
            let addr = self.stack_pointer.wrapping_add(slot as u32 * 4);
            let ret = Architecture::MIPS.read_value(read, addr, 4) as u32;
            if ret == 0 || ret % 4 != 0 || !self.in_code_range(ret) {
                continue;
            }
            // jal leaves ra past the delay slot
            frames.push(self.scanned_frame(ret.wrapping_sub(8), ret, addr));
        }
    }

    fn scanned_frame(&self, call: u32, ret: u32, slot: u32) -> StackFrame {
        StackFrame {
            call_address: call,
            return_address: ret,
            current_address: ret,
            function_name: self.name_for(call),
            stack_pointer: slot,
            frame_pointer: 0,
        }
    }

    /// Find the call instruction ending at `ret`, else assume the common size
    fn call_site(&self, arch: Architecture, read: &dyn Fn(u32) -> u8, ret: u32) -> u32 {
        let (candidates, default): (&[u32], u32) = match arch {
            Architecture::M68K => (&[6, 4, 2], 4),
            Architecture::Z80 => (&[3, 1], 3),
            Architecture::ARM => (&[4], 4),
            Architecture::MIPS => (&[8], 8),
            Architecture::M6502 => (&[3], 3),
        };

        if let Some(core) = self.core.as_ref() {
            for &back in candidates {
                let Some(addr) = ret.checked_sub(back) else {
                    continue;
                };
                let insn = core.disassemble_instruction(addr, read);
                if core.is_call_instruction(&insn) && insn.next_address() == ret {
                    return addr;
                }
            }
        }
        ret.wrapping_sub(default)
    }

    fn in_code_range(&self, addr: u32) -> bool {
        addr >= self.code_start && addr <= self.code_end
    }

    fn name_for(&self, addr: u32) -> String {
        if let Some(name) = self.symbols.as_ref().and_then(|lookup| lookup(addr)) {
            return name;
        }
        let digits = self.architecture.map(|a| a.address_digits()).unwrap_or(8);
        format!("${:0width$X}", addr, width = digits)
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn get_frame(&self, index: usize) -> Option<&StackFrame> {
        self.frames.get(index)
    }

    /// Number of frames, including the current one
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn render(&self, canvas: &mut dyn Canvas, rect: Rect) {
        let title = format!("Call Stack ({})", self.frames.len());
        let body = render::panel(canvas, rect, &title);
        let line = canvas.line_height();
        let digits = self.architecture.map(|a| a.address_digits()).unwrap_or(8);

        if self.frames.is_empty() {
            canvas.draw_text(body.x, body.y, "No frames", Color::DIM);
            return;
        }

        let visible = self.frames.len().min(self.max_display_depth).min(body.rows(line));
        for (i, frame) in self.frames.iter().take(visible).enumerate() {
            let text = format!(
                "#{:<2} ${:0width$X}  {}",
                i,
                frame.current_address,
                frame.function_name,
                width = digits
            );
            let color = if i == 0 { Color::PROGRAM_COUNTER } else { Color::TEXT };
            canvas.draw_text(body.x, body.row_y(i, line), &text, color);
        }

        if self.frames.len() > visible && visible < body.rows(line) {
            let more = format!("... {} more", self.frames.len() - visible);
            canvas.draw_text(body.x, body.row_y(visible, line), &more, Color::DIM);
        }
    }
}

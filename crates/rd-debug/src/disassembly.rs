//! Disassembly view for one architecture
//!
//! Windows a [`CpuCore`] over the host's memory reader, annotates the
//! decoded lines with breakpoint and PC markers, and keeps a bounded
//! back/forward navigation history.

use std::collections::{BTreeMap, VecDeque};

use rd_core::config::DisassemblyConfig;
use rd_core::{Architecture, MemoryReadFn};
use rd_cpu::{core_for, CpuCore, Instruction};

use crate::breakpoint::BreakpointManager;
use crate::render::{self, Canvas, Color, Rect};

/// Breakpoint as mirrored into the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewBreakpoint {
    pub address: u32,
    pub enabled: bool,
    pub condition: String,
    pub description: String,
}

/// Address change observer
pub type AddressChangedCallback = Box<dyn FnMut(u32) + Send>;

/// Disassembly viewer
pub struct DisassemblyViewer {
    architecture: Architecture,
    core: Box<dyn CpuCore>,
    read: Option<MemoryReadFn>,
    /// View cursor
    current_address: u32,
    /// Live PC reported by the host
    execution_address: u32,
    /// Breakpoint overlay by address
    breakpoints: BTreeMap<u32, ViewBreakpoint>,
    /// Manager revision the overlay was last copied from
    synced_revision: Option<u64>,
    back: VecDeque<u32>,
    forward: Vec<u32>,
    history_limit: usize,
    lines_per_view: usize,
    max_probe_bytes: u32,
    on_address_changed: Option<AddressChangedCallback>,
}

impl DisassemblyViewer {
    /// Create a viewer for `architecture` with default settings
    pub fn new(architecture: Architecture) -> Self {
        Self::with_config(architecture, &DisassemblyConfig::default())
    }

    pub fn with_config(architecture: Architecture, config: &DisassemblyConfig) -> Self {
        Self {
            architecture,
            core: core_for(architecture),
            read: None,
            current_address: 0,
            execution_address: 0,
            breakpoints: BTreeMap::new(),
            synced_revision: None,
            back: VecDeque::new(),
            forward: Vec::new(),
            history_limit: config.history_limit.max(1),
            lines_per_view: config.lines_per_view.max(1),
            max_probe_bytes: config.max_probe_bytes.max(1),
            on_address_changed: None,
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn core(&self) -> &dyn CpuCore {
        self.core.as_ref()
    }

    pub fn set_memory_read_function(&mut self, read: MemoryReadFn) {
        self.read = Some(read);
    }

    pub fn has_memory(&self) -> bool {
        self.read.is_some()
    }

    pub fn set_address_changed_callback(&mut self, callback: AddressChangedCallback) {
        self.on_address_changed = Some(callback);
    }

    pub fn current_address(&self) -> u32 {
        self.current_address
    }

    pub fn execution_address(&self) -> u32 {
        self.execution_address
    }

    pub fn set_execution_address(&mut self, address: u32) {
        self.execution_address = address & self.architecture.address_mask();
    }

    pub fn lines_per_view(&self) -> usize {
        self.lines_per_view
    }

    /// Decode `count` consecutive instructions starting at `start`
    ///
    /// Side-effect free; empty until a memory reader is installed.
    pub fn disassemble_range(&self, start: u32, count: usize) -> Vec<Instruction> {
        let Some(read) = self.read.as_ref() else {
            return Vec::new();
        };
        let mut lines = self.core.disassemble_range(start, count, &**read);
        for insn in &mut lines {
            self.annotate(insn);
        }
        lines
    }

    /// Decode the single instruction at `address`
    pub fn instruction_at(&self, address: u32) -> Option<Instruction> {
        let read = self.read.as_ref()?;
        let mut insn = self.core.disassemble_instruction(address, &**read);
        self.annotate(&mut insn);
        Some(insn)
    }

    fn annotate(&self, insn: &mut Instruction) {
        insn.has_breakpoint = self.breakpoints.contains_key(&insn.address);
        insn.is_program_counter = insn.address == self.execution_address;
    }

    /// Move the cursor, recording the address left in the history
    pub fn navigate_to(&mut self, address: u32) {
        let address = address & self.architecture.address_mask();
        if address == self.current_address {
            return;
        }

        if self.back.back() != Some(&self.current_address) {
            if self.back.len() == self.history_limit {
                self.back.pop_front();
            }
            self.back.push_back(self.current_address);
        }
        self.forward.clear();
        self.set_cursor(address);
    }

    fn set_cursor(&mut self, address: u32) {
        self.current_address = address;
        tracing::trace!("{} disassembly at 0x{:08X}", self.architecture, address);
        if let Some(callback) = self.on_address_changed.as_mut() {
            callback(address);
        }
    }

    /// Step the cursor past the instruction under it
    pub fn navigate_next(&mut self) {
        let size = match self.read.as_ref() {
            Some(read) => self.core.instruction_size(self.current_address, &**read),
            None => self.core.min_instruction_size(),
        };
        self.navigate_to(self.current_address.wrapping_add(size));
    }

    /// Step the cursor back one instruction
    ///
    /// Probes backwards for the closest address whose instruction ends
    /// exactly at the cursor. With variable-length encodings the answer may
    /// be wrong; without a match the cursor moves back by the minimum
    /// instruction size.
    pub fn navigate_previous(&mut self) {
        let target = self.previous_instruction_address(self.current_address);
        self.navigate_to(target);
    }

    /// Best guess at the start of the instruction that ends at `address`
    pub fn previous_instruction_address(&self, address: u32) -> u32 {
        let min = self.core.min_instruction_size().max(1);
        if let Some(read) = self.read.as_ref() {
            let widest = self.max_probe_bytes.max(self.core.max_instruction_size());
            for back in (1..=widest).filter(|back| back % min == 0) {
                if back > address {
                    break;
                }
                let candidate = address - back;
                if self.core.instruction_size(candidate, &**read) == back {
                    return candidate;
                }
            }
        }
        address.saturating_sub(min)
    }

    pub fn navigate_to_execution_point(&mut self) {
        self.navigate_to(self.execution_address);
    }

    /// Navigate to the target of the call or jump under the cursor
    ///
    /// Returns false when there is nothing to follow.
    pub fn follow_jump(&mut self) -> bool {
        let Some(insn) = self.instruction_at(self.current_address) else {
            return false;
        };
        if !self.core.is_call_instruction(&insn) && !self.core.is_jump_instruction(&insn) {
            return false;
        }

        let target = self.core.branch_target_address(&insn);
        if target == 0 {
            tracing::debug!("Cannot resolve target of '{}'", insn.text());
            return false;
        }
        self.navigate_to(target);
        true
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    pub fn history_back(&mut self) -> bool {
        let Some(address) = self.back.pop_back() else {
            return false;
        };
        self.forward.push(self.current_address);
        self.set_cursor(address);
        true
    }

    pub fn history_forward(&mut self) -> bool {
        let Some(address) = self.forward.pop() else {
            return false;
        };
        if self.back.len() == self.history_limit {
            self.back.pop_front();
        }
        self.back.push_back(self.current_address);
        self.set_cursor(address);
        true
    }

    /// Add or remove a breakpoint; true when one now exists
    pub fn toggle_breakpoint(&mut self, address: u32) -> bool {
        if self.breakpoints.remove(&address).is_some() {
            false
        } else {
            self.add_breakpoint(address, "", "");
            true
        }
    }

    pub fn add_breakpoint(&mut self, address: u32, condition: &str, description: &str) {
        self.breakpoints.insert(
            address,
            ViewBreakpoint {
                address,
                enabled: true,
                condition: condition.to_string(),
                description: description.to_string(),
            },
        );
    }

    pub fn remove_breakpoint(&mut self, address: u32) -> bool {
        self.breakpoints.remove(&address).is_some()
    }

    pub fn enable_breakpoint(&mut self, address: u32, enabled: bool) -> bool {
        match self.breakpoints.get_mut(&address) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn has_breakpoint(&self, address: u32) -> bool {
        self.breakpoints.contains_key(&address)
    }

    pub fn clear_all_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Overlay contents, ordered by address
    pub fn get_breakpoints(&self) -> Vec<ViewBreakpoint> {
        self.breakpoints.values().cloned().collect()
    }

    /// Refresh the overlay from `manager` if it changed since the last sync
    pub fn sync_breakpoints(&mut self, manager: &BreakpointManager) {
        if self.synced_revision == Some(manager.revision()) {
            return;
        }
        self.breakpoints = manager
            .get_breakpoints_for_architecture(self.architecture)
            .into_iter()
            .map(|bp| {
                (
                    bp.address,
                    ViewBreakpoint {
                        address: bp.address,
                        enabled: bp.enabled,
                        condition: bp.condition,
                        description: bp.description,
                    },
                )
            })
            .collect();
        self.synced_revision = Some(manager.revision());
    }

    pub fn format_address(&self, address: u32) -> String {
        self.core.format_address(address)
    }

    pub fn render(&self, canvas: &mut dyn Canvas, rect: Rect) {
        let title = format!(
            "Disassembly [{}] {}",
            self.architecture,
            self.format_address(self.current_address)
        );
        let body = render::panel(canvas, rect, &title);
        if self.read.is_none() {
            canvas.draw_text(body.x, body.y, "No memory attached", Color::DIM);
            return;
        }

        let line = canvas.line_height();
        let rows = body.rows(line).min(self.lines_per_view);
        let cell = canvas.char_width();
        let bytes_width = (self.core.max_instruction_size() as usize * 3).min(30);

        for (row, insn) in self.disassemble_range(self.current_address, rows).iter().enumerate() {
            let y = body.row_y(row, line);
            if insn.is_program_counter {
                canvas.fill_rect(Rect::new(body.x, y, body.width, line), Color::CURSOR);
            }
            if let Some(bp) = self.breakpoints.get(&insn.address) {
                let color = if bp.enabled { Color::BREAKPOINT } else { Color::DISABLED };
                canvas.fill_rect(Rect::new(body.x, y + 3.0, cell, line - 6.0), color);
            }

            let marker = if insn.is_program_counter { '>' } else { ' ' };
            let text = format!(
                "{}{} {:<width$} {}",
                marker,
                self.format_address(insn.address),
                insn.bytes_hex(),
                insn.text(),
                width = bytes_width
            );
            let color = if insn.is_program_counter {
                Color::PROGRAM_COUNTER
            } else {
                Color::TEXT
            };
            canvas.draw_text(body.x + cell * 1.5, y, &text, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn viewer_with(arch: Architecture, base: u32, bytes: &[u8]) -> DisassemblyViewer {
        let image = bytes.to_vec();
        let mut viewer = DisassemblyViewer::new(arch);
        viewer.set_memory_read_function(Arc::new(move |addr: u32| {
            image
                .get(addr.wrapping_sub(base) as usize)
                .copied()
                .unwrap_or(0)
        }));
        viewer
    }

    // 0x1000: MOVE.L #$12345678,D0 (6), 0x1006: NOP (2), 0x1008: JSR $00002000 (6), 0x100E: RTS
    const M68K_CODE: [u8; 16] = [
        0x20, 0x3C, 0x12, 0x34, 0x56, 0x78, 0x4E, 0x71, 0x4E, 0xB9, 0x00, 0x00, 0x20, 0x00, 0x4E,
        0x75,
    ];

    #[test]
    fn test_disassemble_range_annotations() {
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.set_execution_address(0x1006);
        viewer.add_breakpoint(0x1008, "", "");

        let lines = viewer.disassemble_range(0x1000, 4);
        let addrs: Vec<u32> = lines.iter().map(|i| i.address).collect();
        assert_eq!(addrs, vec![0x1000, 0x1006, 0x1008, 0x100E]);
        assert!(lines[1].is_program_counter);
        assert!(lines[2].has_breakpoint);
        assert!(!lines[0].has_breakpoint && !lines[0].is_program_counter);

        // Read path does not move the cursor
        assert_eq!(viewer.current_address(), 0);
        assert_eq!(viewer.disassemble_range(0x1000, 4), lines);
    }

    #[test]
    fn test_no_memory() {
        let mut viewer = DisassemblyViewer::new(Architecture::Z80);
        assert!(viewer.disassemble_range(0, 4).is_empty());
        assert!(!viewer.follow_jump());
        viewer.navigate_next();
        assert_eq!(viewer.current_address(), 1);
    }

    #[test]
    fn test_next_and_previous() {
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.navigate_to(0x1000);
        viewer.navigate_next();
        assert_eq!(viewer.current_address(), 0x1006);
        viewer.navigate_next();
        assert_eq!(viewer.current_address(), 0x1008);

        viewer.navigate_previous();
        assert_eq!(viewer.current_address(), 0x1006);

        // Whatever is picked must end exactly where the cursor was
        viewer.navigate_previous();
        let prev = viewer.current_address();
        assert!(prev < 0x1006);
        assert_eq!(viewer.instruction_at(prev).unwrap().next_address(), 0x1006);
    }

    #[test]
    fn test_previous_instruction_probe() {
        // A run of NOPs steps back one byte at a time
        let mut viewer = viewer_with(Architecture::Z80, 0, &[0x00; 16]);
        viewer.navigate_to(8);
        viewer.navigate_previous();
        assert_eq!(viewer.current_address(), 7);

        let mut viewer = viewer_with(Architecture::M6502, 0, &[0x20, 0x00, 0x10, 0xEA]);
        assert_eq!(viewer.previous_instruction_address(3), 0);
        assert_eq!(viewer.previous_instruction_address(0), 0);
        viewer.navigate_to(3);
        viewer.navigate_previous();
        assert_eq!(viewer.current_address(), 0);
    }

    #[test]
    fn test_follow_jump() {
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.navigate_to(0x1008);
        assert!(viewer.follow_jump());
        assert_eq!(viewer.current_address(), 0x2000);

        // NOP has nothing to follow
        viewer.navigate_to(0x1006);
        assert!(!viewer.follow_jump());
        assert_eq!(viewer.current_address(), 0x1006);
    }

    #[test]
    fn test_history_truncates_forward() {
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.navigate_to(0x100);
        viewer.navigate_to(0x200);
        viewer.navigate_to(0x300);

        assert!(viewer.history_back());
        assert_eq!(viewer.current_address(), 0x200);
        assert!(viewer.history_back());
        assert_eq!(viewer.current_address(), 0x100);
        assert!(viewer.history_forward());
        assert_eq!(viewer.current_address(), 0x200);

        viewer.navigate_to(0x400);
        assert!(!viewer.can_go_forward());
        assert!(!viewer.history_forward());
        assert!(viewer.history_back());
        assert_eq!(viewer.current_address(), 0x200);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = DisassemblyConfig {
            history_limit: 3,
            ..DisassemblyConfig::default()
        };
        let mut viewer = DisassemblyViewer::with_config(Architecture::Z80, &config);
        for addr in 1..=10 {
            viewer.navigate_to(addr * 0x10);
        }
        let mut steps = 0;
        while viewer.history_back() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(viewer.current_address(), 0x70);
    }

    #[test]
    fn test_navigation_masks_16_bit_addresses() {
        let mut viewer = DisassemblyViewer::new(Architecture::M6502);
        viewer.navigate_to(0x1_C000);
        assert_eq!(viewer.current_address(), 0xC000);
        assert_eq!(viewer.format_address(0xC000), "$C000");
    }

    #[test]
    fn test_toggle_and_sync() {
        let mut viewer = DisassemblyViewer::new(Architecture::Z80);
        assert!(viewer.toggle_breakpoint(0x38));
        assert!(viewer.has_breakpoint(0x38));
        assert!(!viewer.toggle_breakpoint(0x38));
        assert!(!viewer.has_breakpoint(0x38));

        let mut manager = BreakpointManager::new();
        let id = manager.add_breakpoint(0x66, Architecture::Z80, "", "nmi");
        manager.add_breakpoint(0x66, Architecture::M68K, "", "");
        viewer.add_breakpoint(0x10, "", "");
        viewer.sync_breakpoints(&manager);
        let bps = viewer.get_breakpoints();
        assert_eq!(bps.len(), 1);
        assert_eq!(bps[0].description, "nmi");

        manager.enable_breakpoint(id, false);
        viewer.sync_breakpoints(&manager);
        assert!(!viewer.get_breakpoints()[0].enabled);
    }

    #[test]
    fn test_address_callback() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.set_address_changed_callback(Box::new(move |addr: u32| sink.lock().push(addr)));
        viewer.navigate_to(0x1000);
        viewer.navigate_to(0x1000);
        viewer.history_back();
        assert_eq!(*seen.lock(), vec![0x1000, 0]);
    }

    #[test]
    fn test_render_marks_pc_and_breakpoint() {
        let mut viewer = viewer_with(Architecture::M68K, 0x1000, &M68K_CODE);
        viewer.navigate_to(0x1000);
        viewer.set_execution_address(0x1006);
        viewer.add_breakpoint(0x1008, "", "");

        let mut canvas = crate::render::DrawList::new();
        viewer.render(&mut canvas, Rect::new(0.0, 0.0, 400.0, 200.0));
        assert!(canvas.contains_text("Disassembly [M68K] $00001000"));
        assert!(canvas.contains_text("JSR $00002000"));
        assert_eq!(canvas.text_color(">$00001006"), Some(Color::PROGRAM_COUNTER));
        assert!(canvas.commands().iter().any(|cmd| matches!(
            cmd,
            crate::render::DrawCommand::FillRect { color, .. } if *color == Color::BREAKPOINT
        )));
    }
}

//! Debugger front end for one emulation host
//!
//! [`DebugVisualizer`] owns every view and store, receives CPU state from
//! the host after each step, and decides when execution pauses. The host
//! drives it like this:
//!
//! ```text
//! loop {
//!     cpu.step();
//!     visualizer.set_execution_address(cpu.pc());
//!     visualizer.set_register_values(&cpu.registers());
//!     if visualizer.update() != UpdateOutcome::Idle { /* stop stepping */ }
//!     while visualizer.state() == DebuggerState::Paused { /* wait for UI */ }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rd_core::{Architecture, Config, MemoryReadFn, MemoryWriteFn, Result};

use crate::breakpoint::BreakpointManager;
use crate::call_stack::CallStackViewer;
use crate::condition;
use crate::disassembly::DisassemblyViewer;
use crate::memory_viewer::MemoryViewer;
use crate::registers::RegisterViewer;
use crate::render::{self, Canvas, Rect};
use crate::watch_viewer::WatchViewer;
use crate::watchpoint::WatchpointManager;

/// Debug execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerState {
    /// Not initialised, or shut down
    Inactive,
    /// Running until a breakpoint or watchpoint
    Running,
    /// Stopped, waiting for the user
    Paused,
    /// Running until the instruction after the current one
    StepOver,
    /// Stopping after one host step
    StepInto,
    /// Running until the call stack is shallower
    StepOut,
}

impl DebuggerState {
    /// Whether the host is expected to keep stepping
    pub fn is_executing(self) -> bool {
        matches!(
            self,
            Self::Running | Self::StepOver | Self::StepInto | Self::StepOut
        )
    }
}

/// What one [`DebugVisualizer::update`] call decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing changed
    Idle,
    BreakpointHit,
    WatchpointHit,
    StepComplete,
}

/// Run/pause/step controller and owner of all debugger views
pub struct DebugVisualizer {
    config: Config,
    state: DebuggerState,
    active: Option<Architecture>,
    disassembly: HashMap<Architecture, DisassemblyViewer>,
    readers: HashMap<Architecture, MemoryReadFn>,
    writers: HashMap<Architecture, MemoryWriteFn>,
    breakpoints: BreakpointManager,
    watchpoints: Arc<WatchpointManager>,
    watch_viewer: WatchViewer,
    registers: RegisterViewer,
    call_stack: CallStackViewer,
    memory: MemoryViewer,
    /// Live PC of the active CPU
    execution_address: u32,
    /// Address that completes a step over
    step_over_return_address: u32,
    /// Depth that completes a step out
    step_out_target_depth: usize,
    /// Breakpoint address skipped until execution leaves it
    skip_address: Option<u32>,
    /// A watchpoint fired since the last update
    pending_watch_break: bool,
}

impl Default for DebugVisualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugVisualizer {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let watchpoints = Arc::new(WatchpointManager::new());
        let mut watch_viewer = WatchViewer::new(watchpoints.clone());
        watch_viewer.set_highlight_changes(config.watch.highlight_changes);

        Self {
            call_stack: CallStackViewer::with_config(&config.call_stack),
            memory: MemoryViewer::new(config.general.architecture),
            config,
            state: DebuggerState::Inactive,
            active: None,
            disassembly: HashMap::new(),
            readers: HashMap::new(),
            writers: HashMap::new(),
            breakpoints: BreakpointManager::new(),
            watchpoints,
            watch_viewer,
            registers: RegisterViewer::new(),
            execution_address: 0,
            step_over_return_address: 0,
            step_out_target_depth: 0,
            skip_address: None,
            pending_watch_break: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register `arch`, make it active and start running (or paused)
    pub fn initialize(&mut self, arch: Architecture) {
        self.add_cpu_architecture(arch);
        self.set_active_cpu_architecture(arch);
        self.state = if self.config.general.start_paused {
            DebuggerState::Paused
        } else {
            DebuggerState::Running
        };
        tracing::info!("Debugger initialized for {} ({:?})", arch, self.state);
    }

    /// Drop every view, store and hook; back to `Inactive`
    pub fn shutdown(&mut self) {
        self.disassembly.clear();
        self.readers.clear();
        self.writers.clear();
        self.breakpoints.clear_all_breakpoints();
        self.watchpoints.clear_all_watchpoints();
        self.registers.clear_registers();
        self.call_stack.clear_stack();
        self.active = None;
        self.skip_address = None;
        self.pending_watch_break = false;
        self.state = DebuggerState::Inactive;
        tracing::info!("Debugger shut down");
    }

    pub fn state(&self) -> DebuggerState {
        self.state
    }

    pub fn active_architecture(&self) -> Option<Architecture> {
        self.active
    }

    /// Add a disassembly view for `arch`; the first one added becomes active
    pub fn add_cpu_architecture(&mut self, arch: Architecture) {
        if self.disassembly.contains_key(&arch) {
            return;
        }
        let mut viewer = DisassemblyViewer::with_config(arch, &self.config.disassembly);
        if let Some(read) = self.readers.get(&arch) {
            viewer.set_memory_read_function(read.clone());
        }
        viewer.sync_breakpoints(&self.breakpoints);
        self.disassembly.insert(arch, viewer);
        tracing::debug!("Added CPU architecture {}", arch);

        if self.active.is_none() {
            self.set_active_cpu_architecture(arch);
        }
    }

    pub fn architectures(&self) -> Vec<Architecture> {
        Architecture::ALL
            .into_iter()
            .filter(|arch| self.disassembly.contains_key(arch))
            .collect()
    }

    /// Point the register, call stack, memory and watch views at `arch`
    ///
    /// False when `arch` was never added.
    pub fn set_active_cpu_architecture(&mut self, arch: Architecture) -> bool {
        if !self.disassembly.contains_key(&arch) {
            tracing::warn!("Architecture {} has not been added", arch);
            return false;
        }
        if self.active == Some(arch) {
            return true;
        }

        self.active = Some(arch);
        self.registers.set_architecture(arch);
        self.call_stack.set_architecture(arch);
        self.memory.set_architecture(arch);
        self.watch_viewer.set_architecture(arch);
        self.watchpoints.set_default_architecture(Some(arch));
        if let Some(read) = self.readers.get(&arch) {
            self.call_stack.set_memory_read_function(read.clone());
            self.memory.set_memory_read_function(read.clone());
        }
        if let Some(write) = self.writers.get(&arch) {
            self.memory.set_memory_write_function(write.clone());
        }
        tracing::debug!("Active CPU architecture is now {}", arch);
        true
    }

    /// Byte reader for `arch`, shared by every view that reads its memory
    pub fn set_memory_read_function(&mut self, arch: Architecture, read: MemoryReadFn) {
        if let Some(viewer) = self.disassembly.get_mut(&arch) {
            viewer.set_memory_read_function(read.clone());
        }
        self.watchpoints.set_value_reader(arch, read.clone());
        if self.active == Some(arch) {
            self.call_stack.set_memory_read_function(read.clone());
            self.memory.set_memory_read_function(read.clone());
        }
        self.readers.insert(arch, read);
    }

    pub fn set_memory_write_function(&mut self, arch: Architecture, write: MemoryWriteFn) {
        if self.active == Some(arch) {
            self.memory.set_memory_write_function(write.clone());
        }
        self.writers.insert(arch, write);
    }

    /// Live PC of the active CPU, pushed by the host after every step
    pub fn set_execution_address(&mut self, address: u32) {
        let Some(arch) = self.active else {
            self.execution_address = address;
            return;
        };
        self.execution_address = address & arch.address_mask();
        if let Some(viewer) = self.disassembly.get_mut(&arch) {
            viewer.set_execution_address(self.execution_address);
        }
        self.call_stack.set_pc(self.execution_address);
    }

    pub fn execution_address(&self) -> u32 {
        self.execution_address
    }

    /// Register snapshot from the host; stack and frame pointers also feed
    /// the call stack
    pub fn set_register_values(&mut self, values: &HashMap<String, u64>) {
        self.registers.update_registers(values);

        let Some(arch) = self.active else {
            return;
        };
        let (sp, fp) = match arch {
            Architecture::M68K => ("A7", Some("A6")),
            Architecture::Z80 => ("SP", None),
            Architecture::ARM => ("R13", Some("R11")),
            Architecture::MIPS => ("$29", Some("$30")),
            Architecture::M6502 => ("S", None),
        };
        if let Some(&value) = values.get(sp) {
            self.call_stack.set_stack_pointer(value as u32);
        }
        if let Some(&value) = fp.and_then(|name| values.get(name)) {
            self.call_stack.set_frame_pointer(value as u32);
        }
    }

    /// Memory bus read hook; true when a watchpoint fired
    pub fn check_memory_read(&mut self, address: u32, value: u64, size: u32) -> bool {
        let fired = self
            .watchpoints
            .check_memory_read(address, value, size, self.active);
        self.latch_watch_break(fired);
        fired
    }

    /// Memory bus write hook; true when a watchpoint fired
    pub fn check_memory_write(&mut self, address: u32, value: u64, size: u32) -> bool {
        let fired = self
            .watchpoints
            .check_memory_write(address, value, size, self.active);
        self.latch_watch_break(fired);
        fired
    }

    fn latch_watch_break(&mut self, fired: bool) {
        if fired && self.config.watch.break_on_trigger && self.state.is_executing() {
            self.pending_watch_break = true;
        }
    }

    /// Whether execution at the current PC hits a breakpoint
    ///
    /// Conditions can name registers of the active CPU (`$D0 == 5`).
    pub fn check_breakpoints(&mut self) -> bool {
        let Some(arch) = self.active else {
            return false;
        };
        let pc = self.execution_address;
        if self.skip_address == Some(pc) {
            return false;
        }

        let registers = &self.registers;
        let lookup = |name: &str| registers.find_register_value(name);
        self.breakpoints.should_break_with(pc, arch, &mut |cond: &str| {
            condition::evaluate_with(cond, None, &lookup)
        })
    }

    /// Advance the state machine after one host step
    ///
    /// Breakpoints are checked before a step can complete, so a breakpoint
    /// on the step target reports `BreakpointHit`.
    pub fn update(&mut self) -> UpdateOutcome {
        if !self.state.is_executing() {
            return UpdateOutcome::Idle;
        }

        let pc = self.execution_address;
        if self.skip_address.is_some_and(|skip| skip != pc) {
            self.skip_address = None;
        }
        self.call_stack.update();

        if self.check_breakpoints() {
            tracing::info!("Breakpoint hit at 0x{:08X}", pc);
            self.enter_paused();
            return UpdateOutcome::BreakpointHit;
        }

        if self.watchpoints.count() > 0 && self.watchpoints.update() {
            self.latch_watch_break(true);
        }
        if self.pending_watch_break {
            tracing::info!("Watchpoint hit at 0x{:08X}", pc);
            self.enter_paused();
            return UpdateOutcome::WatchpointHit;
        }

        let complete = match self.state {
            DebuggerState::StepInto => true,
            DebuggerState::StepOver => pc == self.step_over_return_address,
            DebuggerState::StepOut => self.call_stack.depth() <= self.step_out_target_depth,
            _ => false,
        };
        if complete {
            tracing::debug!("{:?} complete at 0x{:08X}", self.state, pc);
            self.enter_paused();
            return UpdateOutcome::StepComplete;
        }
        UpdateOutcome::Idle
    }

    fn enter_paused(&mut self) {
        self.state = DebuggerState::Paused;
        self.skip_address = None;
        self.pending_watch_break = false;
        if let Some(viewer) = self.active.and_then(|arch| self.disassembly.get_mut(&arch)) {
            viewer.navigate_to_execution_point();
        }
    }

    /// Stop at the current PC; abandons any step in progress
    pub fn pause_emulation(&mut self) {
        if self.state == DebuggerState::Inactive {
            return;
        }
        self.enter_paused();
        tracing::info!("Paused at 0x{:08X}", self.execution_address);
    }

    /// Paused to running; the breakpoint at the PC is not re-hit on the way out
    pub fn resume_emulation(&mut self) -> bool {
        if self.state != DebuggerState::Paused {
            return false;
        }
        self.begin_execution(DebuggerState::Running);
        tracing::info!("Resumed at 0x{:08X}", self.execution_address);
        true
    }

    fn begin_execution(&mut self, state: DebuggerState) {
        self.skip_address = Some(self.execution_address);
        self.pending_watch_break = false;
        self.state = state;
    }

    /// Run until the instruction after the current one
    pub fn step_over(&mut self) -> bool {
        if self.state != DebuggerState::Paused {
            return false;
        }
        let pc = self.execution_address;
        let size = self
            .active
            .and_then(|arch| self.disassembly.get(&arch))
            .map(|viewer| {
                viewer
                    .instruction_at(pc)
                    .map(|insn| insn.size)
                    .unwrap_or_else(|| viewer.core().min_instruction_size())
            })
            .unwrap_or(1);
        let mask = self.active.map(|arch| arch.address_mask()).unwrap_or(u32::MAX);

        self.step_over_return_address = pc.wrapping_add(size) & mask;
        self.begin_execution(DebuggerState::StepOver);
        tracing::debug!("Step over, return at 0x{:08X}", self.step_over_return_address);
        true
    }

    /// Stop after the next host step
    pub fn step_into(&mut self) -> bool {
        if self.state != DebuggerState::Paused {
            return false;
        }
        self.begin_execution(DebuggerState::StepInto);
        tracing::debug!("Step into at depth {}", self.call_stack.depth());
        true
    }

    /// Run until the current function returns
    pub fn step_out(&mut self) -> bool {
        if self.state != DebuggerState::Paused {
            return false;
        }
        self.step_out_target_depth = self.call_stack.depth().saturating_sub(1);
        self.begin_execution(DebuggerState::StepOut);
        tracing::debug!("Step out, target depth {}", self.step_out_target_depth);
        true
    }

    /// Add a breakpoint if there is none at `address`, else remove it
    ///
    /// Returns true when a breakpoint was added.
    pub fn toggle_breakpoint(&mut self, address: u32, arch: Architecture) -> bool {
        let added = match self.breakpoints.breakpoint_at(address, arch).map(|bp| bp.id) {
            Some(id) => {
                self.breakpoints.remove_breakpoint(id);
                false
            }
            None => {
                self.breakpoints.add_breakpoint(address, arch, "", "");
                true
            }
        };
        self.sync_breakpoint_views();
        added
    }

    pub fn add_breakpoint(&mut self, address: u32, arch: Architecture, condition: &str, description: &str) -> u32 {
        let id = self.breakpoints.add_breakpoint(address, arch, condition, description);
        self.sync_breakpoint_views();
        id
    }

    pub fn remove_breakpoint(&mut self, id: u32) -> bool {
        let removed = self.breakpoints.remove_breakpoint(id);
        self.sync_breakpoint_views();
        removed
    }

    pub fn enable_breakpoint(&mut self, id: u32, enabled: bool) -> bool {
        let changed = self.breakpoints.enable_breakpoint(id, enabled);
        self.sync_breakpoint_views();
        changed
    }

    pub fn save_breakpoints(&self, path: &Path) -> Result<()> {
        self.breakpoints.save_breakpoints(path)
    }

    /// Replace all breakpoints with the file's contents
    pub fn load_breakpoints(&mut self, path: &Path) -> Result<usize> {
        let loaded = self.breakpoints.load_breakpoints(path);
        self.sync_breakpoint_views();
        loaded
    }

    fn sync_breakpoint_views(&mut self) {
        for viewer in self.disassembly.values_mut() {
            viewer.sync_breakpoints(&self.breakpoints);
        }
    }

    /// Show call stack frame `index` in the active disassembly view
    pub fn navigate_to_frame(&mut self, index: usize) -> bool {
        let Some(frame) = self.call_stack.get_frame(index) else {
            return false;
        };
        let target = if frame.call_address != 0 {
            frame.call_address
        } else {
            frame.current_address
        };
        match self.active.and_then(|arch| self.disassembly.get_mut(&arch)) {
            Some(viewer) => {
                viewer.navigate_to(target);
                true
            }
            None => false,
        }
    }

    pub fn breakpoint_manager(&self) -> &BreakpointManager {
        &self.breakpoints
    }

    /// Direct access; views pick up changes on the next render
    pub fn breakpoint_manager_mut(&mut self) -> &mut BreakpointManager {
        &mut self.breakpoints
    }

    pub fn watchpoint_manager(&self) -> &Arc<WatchpointManager> {
        &self.watchpoints
    }

    pub fn disassembly_viewer(&self, arch: Architecture) -> Option<&DisassemblyViewer> {
        self.disassembly.get(&arch)
    }

    pub fn disassembly_viewer_mut(&mut self, arch: Architecture) -> Option<&mut DisassemblyViewer> {
        self.disassembly.get_mut(&arch)
    }

    pub fn register_viewer(&self) -> &RegisterViewer {
        &self.registers
    }

    pub fn register_viewer_mut(&mut self) -> &mut RegisterViewer {
        &mut self.registers
    }

    pub fn call_stack_viewer(&self) -> &CallStackViewer {
        &self.call_stack
    }

    pub fn call_stack_viewer_mut(&mut self) -> &mut CallStackViewer {
        &mut self.call_stack
    }

    pub fn watch_viewer(&self) -> &WatchViewer {
        &self.watch_viewer
    }

    pub fn watch_viewer_mut(&mut self) -> &mut WatchViewer {
        &mut self.watch_viewer
    }

    pub fn memory_viewer(&self) -> &MemoryViewer {
        &self.memory
    }

    pub fn memory_viewer_mut(&mut self) -> &mut MemoryViewer {
        &mut self.memory
    }

    /// Draw all five panels into `rect`
    pub fn render(&mut self, canvas: &mut dyn Canvas, rect: Rect) {
        self.sync_breakpoint_views();

        let Some(viewer) = self.active.and_then(|arch| self.disassembly.get(&arch)) else {
            render::panel(canvas, rect, "Debugger [Inactive]");
            return;
        };

        let (x, y) = (rect.x, rect.y);
        let (half_w, half_h) = (rect.width / 2.0, rect.height / 2.0);
        let quarter_w = rect.width / 4.0;

        viewer.render(canvas, Rect::new(x, y, half_w, half_h));
        self.memory.render(canvas, Rect::new(x + half_w, y, half_w, half_h));
        self.registers.render(canvas, Rect::new(x, y + half_h, half_w, half_h));
        self.call_stack
            .render(canvas, Rect::new(x + half_w, y + half_h, quarter_w, half_h));
        self.watch_viewer
            .render(canvas, Rect::new(x + 3.0 * quarter_w, y + half_h, quarter_w, half_h));
    }
}

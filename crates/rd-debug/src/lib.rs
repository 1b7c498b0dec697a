//! Debugging engine for retrodbg
//!
//! This crate provides the architecture-agnostic debugger components:
//! - Breakpoint and watchpoint stores with a small condition grammar
//! - Disassembly, register, call stack, memory and watch viewers
//! - The `DebugVisualizer` run/pause/step state machine that ties them
//!   together for one emulation host

pub mod breakpoint;
pub mod call_stack;
pub mod condition;
pub mod disassembly;
pub mod memory_viewer;
pub mod registers;
pub mod render;
pub mod visualizer;
pub mod watch_viewer;
pub mod watchpoint;

pub use breakpoint::{Breakpoint, BreakpointManager};
pub use call_stack::{CallStackViewer, StackFrame};
pub use condition::{evaluate_condition, Condition};
pub use disassembly::DisassemblyViewer;
pub use memory_viewer::MemoryViewer;
pub use registers::{DisplayFormat, RegisterInfo, RegisterViewer};
pub use render::{Canvas, Color, DrawCommand, DrawList, Rect};
pub use visualizer::{DebugVisualizer, DebuggerState, UpdateOutcome};
pub use watch_viewer::WatchViewer;
pub use watchpoint::{AccessType, DataType, Watchpoint, WatchpointManager};

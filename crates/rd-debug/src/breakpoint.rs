//! Execution breakpoints keyed by address and architecture

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rd_core::{Architecture, DebugError, Result};

use crate::condition;

/// Breakpoint information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Unique ID, never reused within one manager
    pub id: u32,
    /// Address of the breakpoint
    pub address: u32,
    /// Architecture whose PC is compared against `address`
    pub architecture: Architecture,
    /// Condition expression, empty for unconditional
    pub condition: String,
    /// Free-form note
    pub description: String,
    /// Whether the breakpoint is enabled
    pub enabled: bool,
    /// Times execution reached the address while enabled
    pub hit_count: u32,
    /// Hits to let pass before the breakpoint fires
    pub ignore_count: u32,
}

/// Change notification for observers of the breakpoint set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointEvent {
    Added(u32),
    Removed(u32),
    Changed(u32),
    Cleared,
}

/// Pluggable condition evaluator
pub type ConditionEvaluator = Box<dyn FnMut(&str) -> bool + Send>;

/// Breakpoint change observer
pub type BreakpointCallback = Box<dyn FnMut(BreakpointEvent) + Send>;

/// Breakpoint store
///
/// At most one breakpoint exists per (address, architecture) pair.
pub struct BreakpointManager {
    /// Breakpoints by ID
    breakpoints: BTreeMap<u32, Breakpoint>,
    /// Location index
    by_location: HashMap<(u32, Architecture), u32>,
    next_id: u32,
    /// Bumped on every change that affects presence or enable state
    revision: u64,
    evaluator: Option<ConditionEvaluator>,
    on_change: Option<BreakpointCallback>,
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointManager {
    /// Create an empty breakpoint manager
    pub fn new() -> Self {
        Self {
            breakpoints: BTreeMap::new(),
            by_location: HashMap::new(),
            next_id: 1,
            revision: 0,
            evaluator: None,
            on_change: None,
        }
    }

    fn notify(&mut self, event: BreakpointEvent) {
        self.revision += 1;
        if let Some(callback) = self.on_change.as_mut() {
            callback(event);
        }
    }

    /// Add a breakpoint, or return the ID already set at this location
    pub fn add_breakpoint(
        &mut self,
        address: u32,
        architecture: Architecture,
        condition: &str,
        description: &str,
    ) -> u32 {
        if let Some(&id) = self.by_location.get(&(address, architecture)) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.breakpoints.insert(
            id,
            Breakpoint {
                id,
                address,
                architecture,
                condition: condition.to_string(),
                description: description.to_string(),
                enabled: true,
                hit_count: 0,
                ignore_count: 0,
            },
        );
        self.by_location.insert((address, architecture), id);

        tracing::debug!("Breakpoint {} added at 0x{:08X} ({})", id, address, architecture);
        self.notify(BreakpointEvent::Added(id));
        id
    }

    /// Remove a breakpoint by ID
    pub fn remove_breakpoint(&mut self, id: u32) -> bool {
        let Some(bp) = self.breakpoints.remove(&id) else {
            return false;
        };
        self.by_location.remove(&(bp.address, bp.architecture));

        tracing::debug!("Breakpoint {} removed", id);
        self.notify(BreakpointEvent::Removed(id));
        true
    }

    /// Enable or disable a breakpoint
    pub fn enable_breakpoint(&mut self, id: u32, enabled: bool) -> bool {
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return false;
        };
        bp.enabled = enabled;
        self.notify(BreakpointEvent::Changed(id));
        true
    }

    pub fn set_condition(&mut self, id: u32, condition: &str) -> bool {
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return false;
        };
        bp.condition = condition.to_string();
        self.notify(BreakpointEvent::Changed(id));
        true
    }

    pub fn set_ignore_count(&mut self, id: u32, ignore_count: u32) -> bool {
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return false;
        };
        bp.ignore_count = ignore_count;
        self.notify(BreakpointEvent::Changed(id));
        true
    }

    pub fn has_breakpoint(&self, address: u32, architecture: Architecture) -> bool {
        self.by_location.contains_key(&(address, architecture))
    }

    /// Breakpoint at a location, if any
    pub fn breakpoint_at(&self, address: u32, architecture: Architecture) -> Option<&Breakpoint> {
        self.by_location
            .get(&(address, architecture))
            .and_then(|id| self.breakpoints.get(id))
    }

    pub fn get_breakpoint(&self, id: u32) -> Option<&Breakpoint> {
        self.breakpoints.get(&id)
    }

    /// Breakpoints of one architecture, ordered by ID
    pub fn get_breakpoints_for_architecture(&self, architecture: Architecture) -> Vec<Breakpoint> {
        self.breakpoints
            .values()
            .filter(|bp| bp.architecture == architecture)
            .cloned()
            .collect()
    }

    /// Every breakpoint, ordered by ID
    pub fn get_all_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn clear_all_breakpoints(&mut self) {
        self.breakpoints.clear();
        self.by_location.clear();
        self.notify(BreakpointEvent::Cleared);
    }

    pub fn reset_hit_counts(&mut self) {
        for bp in self.breakpoints.values_mut() {
            bp.hit_count = 0;
        }
    }

    /// Monotonic change counter for mirrors of the breakpoint set
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_condition_evaluator(&mut self, evaluator: ConditionEvaluator) {
        self.evaluator = Some(evaluator);
    }

    pub fn has_condition_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn set_change_callback(&mut self, callback: BreakpointCallback) {
        self.on_change = Some(callback);
    }

    /// Decide whether execution at `address` should stop
    ///
    /// Every call that finds an enabled breakpoint counts a hit, even when
    /// the ignore count or the condition then suppresses it.
    pub fn should_break(&mut self, address: u32, architecture: Architecture) -> bool {
        self.should_break_with(address, architecture, &mut |cond: &str| {
            condition::evaluate_with(cond, None, &|_: &str| None)
        })
    }

    /// Like [`Self::should_break`], using `fallback` when no evaluator is installed
    pub fn should_break_with(
        &mut self,
        address: u32,
        architecture: Architecture,
        fallback: &mut dyn FnMut(&str) -> bool,
    ) -> bool {
        let Some(&id) = self.by_location.get(&(address, architecture)) else {
            return false;
        };
        let Some(bp) = self.breakpoints.get_mut(&id) else {
            return false;
        };
        if !bp.enabled {
            return false;
        }

        bp.hit_count = bp.hit_count.saturating_add(1);
        if bp.hit_count <= bp.ignore_count {
            tracing::trace!(
                "Breakpoint {} hit {} of {} ignored",
                id,
                bp.hit_count,
                bp.ignore_count
            );
            return false;
        }

        if bp.condition.is_empty() {
            return true;
        }
        match self.evaluator.as_mut() {
            Some(evaluator) => evaluator(&bp.condition),
            None => fallback(&bp.condition),
        }
    }

    /// Write every breakpoint as one `addr,arch,enabled,condition,description,ignore` line
    ///
    /// Commas inside conditions or descriptions are not escaped.
    pub fn write_records<W: Write>(&self, mut out: W) -> Result<()> {
        for bp in self.breakpoints.values() {
            if bp.condition.contains(',') || bp.description.contains(',') {
                tracing::warn!("Breakpoint {} has a comma in its text and will not reload cleanly", bp.id);
            }
            writeln!(
                out,
                "{:X},{},{},{},{},{}",
                bp.address,
                bp.architecture,
                if bp.enabled { 1 } else { 0 },
                bp.condition,
                bp.description,
                bp.ignore_count
            )?;
        }
        Ok(())
    }

    /// Replace the current set with records read from `input`
    ///
    /// The whole input is read before the current set is cleared, so an I/O
    /// error leaves it untouched. Lines that are not UTF-8 are decoded
    /// lossily and malformed lines are skipped with a warning. Returns the
    /// number of records loaded.
    pub fn read_records<R: BufRead>(&mut self, input: R) -> Result<usize> {
        let mut lines = Vec::new();
        for (index, chunk) in input.split(b'\n').enumerate() {
            let mut bytes = chunk?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Breakpoint record {} is not valid UTF-8", index + 1);
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            lines.push(line);
        }

        self.clear_all_breakpoints();

        let mut loaded = 0;
        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(line, index + 1) {
                Ok(record) => {
                    let id = self.add_breakpoint(
                        record.address,
                        record.architecture,
                        &record.condition,
                        &record.description,
                    );
                    self.enable_breakpoint(id, record.enabled);
                    self.set_ignore_count(id, record.ignore_count);
                    loaded += 1;
                }
                Err(e) => tracing::warn!("Skipping breakpoint record: {}", e),
            }
        }

        tracing::info!("Loaded {} breakpoints", loaded);
        Ok(loaded)
    }

    pub fn save_breakpoints(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_records(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from `path`; the existing set is kept if the file cannot be opened
    pub fn load_breakpoints(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path)?;
        self.read_records(BufReader::new(file))
    }
}

struct Record {
    address: u32,
    architecture: Architecture,
    enabled: bool,
    condition: String,
    description: String,
    ignore_count: u32,
}

fn parse_record(line: &str, line_no: usize) -> Result<Record> {
    let malformed = |reason: &str| DebugError::MalformedRecord {
        line: line_no,
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 6 {
        return Err(malformed("expected 6 fields"));
    }

    let address_text = fields[0].trim();
    let address_text = address_text
        .strip_prefix("0x")
        .or_else(|| address_text.strip_prefix("0X"))
        .unwrap_or(address_text);
    let address = u32::from_str_radix(address_text, 16).map_err(|_| malformed("bad address"))?;
    let architecture = fields[1].parse::<Architecture>()?;
    let ignore_count = fields[5]
        .trim()
        .parse::<u32>()
        .map_err(|_| malformed("bad ignore count"))?;

    Ok(Record {
        address,
        architecture,
        enabled: fields[2].trim() == "1",
        condition: fields[3].to_string(),
        description: fields[4].to_string(),
        ignore_count,
    })
}

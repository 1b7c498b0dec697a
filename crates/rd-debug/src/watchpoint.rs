//! Memory watchpoints
//!
//! Watchpoints cover half-open ranges `[address, address + size)` and fire
//! either from the memory bus hooks (`check_memory_read`/`check_memory_write`,
//! every matching access) or from the polling path (`update`, only when the
//! sampled value changed).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use rd_core::{Architecture, MemoryReadFn};

use crate::condition;

const PAGE_SHIFT: u32 = 12;

/// Kind of access a watchpoint reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Break on read
    Read,
    /// Break on write
    Write,
    /// Break on read or write
    ReadWrite,
}

impl AccessType {
    pub const ALL: [AccessType; 3] = [Self::Read, Self::Write, Self::ReadWrite];

    /// Whether a watchpoint of this type reacts to `access`
    pub fn matches(self, access: AccessType) -> bool {
        self == access || self == Self::ReadWrite || access == Self::ReadWrite
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Read => "R",
            Self::Write => "W",
            Self::ReadWrite => "RW",
        }
    }
}

/// Width of the watched value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    Word,
    DWord,
    QWord,
}

impl DataType {
    pub const ALL: [DataType; 4] = [Self::Byte, Self::Word, Self::DWord, Self::QWord];

    /// Size in bytes
    pub fn size(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::DWord => 4,
            Self::QWord => 8,
        }
    }

    pub fn from_size(size: u32) -> Option<Self> {
        match size {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::DWord),
            8 => Some(Self::QWord),
            _ => None,
        }
    }

    pub fn mask(self) -> u64 {
        match self {
            Self::QWord => u64::MAX,
            _ => (1u64 << (self.size() * 8)) - 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Word => "Word",
            Self::DWord => "DWord",
            Self::QWord => "QWord",
        }
    }
}

/// Watchpoint information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    pub id: u32,
    pub name: String,
    /// First watched byte
    pub address: u32,
    /// Watched bytes, always `data_type.size()`
    pub size: u32,
    pub access_type: AccessType,
    pub data_type: DataType,
    pub enabled: bool,
    /// Condition on `$value`, empty for unconditional
    pub condition: String,
    pub previous_value: u64,
    pub current_value: u64,
    /// Set when the watchpoint fired; cleared by `clear_triggered`
    pub has_triggered: bool,
    /// `None` watches accesses from every architecture
    pub architecture: Option<Architecture>,
    /// Matching accesses seen while enabled
    pub hit_count: u32,
    /// Matching accesses to let pass before firing
    pub ignore_count: u32,
}

impl Watchpoint {
    /// Half-open overlap test against `[address, address + size)`
    pub fn overlaps(&self, address: u32, size: u32) -> bool {
        let start = self.address as u64;
        let end = start + self.size as u64;
        let access_start = address as u64;
        let access_end = access_start + size.max(1) as u64;
        access_start < end && start < access_end
    }

    fn matches_architecture(&self, architecture: Option<Architecture>) -> bool {
        match (self.architecture, architecture) {
            (Some(watched), Some(accessed)) => watched == accessed,
            _ => true,
        }
    }

    pub fn value_changed(&self) -> bool {
        self.previous_value != self.current_value
    }
}

/// Parameters for a new watchpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchpointRequest {
    pub address: u32,
    pub size: u32,
    pub access_type: AccessType,
    pub data_type: DataType,
    /// Empty picks `Watchpoint <id>`
    pub name: String,
    pub condition: String,
    pub enabled: bool,
    pub architecture: Option<Architecture>,
}

impl WatchpointRequest {
    pub fn new(address: u32, data_type: DataType, access_type: AccessType) -> Self {
        Self {
            address,
            size: data_type.size(),
            access_type,
            data_type,
            name: String::new(),
            condition: String::new(),
            enabled: true,
            architecture: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = condition.to_string();
        self
    }

    pub fn for_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Callback receiving a watchpoint snapshot
pub type WatchpointCallback = Arc<dyn Fn(&Watchpoint) + Send + Sync>;

/// Callback receiving a removed watchpoint ID
pub type WatchpointRemovedCallback = Arc<dyn Fn(u32) + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
    triggered: Option<WatchpointCallback>,
    added: Option<WatchpointCallback>,
    removed: Option<WatchpointRemovedCallback>,
    changed: Option<WatchpointCallback>,
}

/// Memory watchpoint manager
///
/// Callbacks run after internal locks are released, so they may call back
/// into the manager.
pub struct WatchpointManager {
    /// Watchpoints by ID
    watchpoints: RwLock<BTreeMap<u32, Watchpoint>>,
    /// Quick lookup for pages touched by any watchpoint
    watched_pages: RwLock<HashSet<u32>>,
    /// Byte readers used to sample values, per architecture
    readers: RwLock<HashMap<Architecture, MemoryReadFn>>,
    /// Architecture used to sample watchpoints that have none
    default_architecture: RwLock<Option<Architecture>>,
    callbacks: RwLock<Callbacks>,
    next_id: RwLock<u32>,
    /// Watchpoints updated by a bus access since the last poll
    bus_touched: RwLock<HashSet<u32>>,
}

impl Default for WatchpointManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchpointManager {
    /// Create a new watchpoint manager
    pub fn new() -> Self {
        Self {
            watchpoints: RwLock::new(BTreeMap::new()),
            watched_pages: RwLock::new(HashSet::new()),
            readers: RwLock::new(HashMap::new()),
            default_architecture: RwLock::new(None),
            callbacks: RwLock::new(Callbacks::default()),
            next_id: RwLock::new(1),
            bus_touched: RwLock::new(HashSet::new()),
        }
    }

    fn rebuild_pages(&self, watchpoints: &BTreeMap<u32, Watchpoint>) {
        let mut watched = self.watched_pages.write();
        watched.clear();
        for wp in watchpoints.values() {
            let start_page = wp.address >> PAGE_SHIFT;
            let end_page = wp.address.saturating_add(wp.size.saturating_sub(1)) >> PAGE_SHIFT;
            for page in start_page..=end_page {
                watched.insert(page);
            }
        }
    }

    /// Check if an access touches a watched page (fast path)
    #[inline]
    pub fn is_watched_page(&self, address: u32, size: u32) -> bool {
        let watched = self.watched_pages.read();
        if watched.is_empty() {
            return false;
        }
        let last = address.saturating_add(size.max(1) - 1);
        watched.contains(&(address >> PAGE_SHIFT)) || watched.contains(&(last >> PAGE_SHIFT))
    }

    /// Install the byte reader used to sample values of `architecture`
    pub fn set_value_reader(&self, architecture: Architecture, read: MemoryReadFn) {
        self.readers.write().insert(architecture, read);
    }

    /// Architecture whose reader samples watchpoints without one
    pub fn set_default_architecture(&self, architecture: Option<Architecture>) {
        *self.default_architecture.write() = architecture;
    }

    /// Sample `data_type` at `address`, or `None` without a reader
    pub fn read_memory_value(
        &self,
        address: u32,
        data_type: DataType,
        architecture: Option<Architecture>,
    ) -> Option<u64> {
        let arch = architecture.or(*self.default_architecture.read())?;
        let read = self.readers.read().get(&arch).cloned()?;
        Some(arch.read_value(&*read, address, data_type.size()))
    }

    /// Add a watchpoint and return its ID
    pub fn add_watchpoint(&self, request: WatchpointRequest) -> u32 {
        let size = request.data_type.size();
        if request.size != size {
            tracing::warn!(
                "Watchpoint size {} does not match {}, using {}",
                request.size,
                request.data_type.label(),
                size
            );
        }

        let id = {
            let mut next = self.next_id.write();
            let id = *next;
            *next += 1;
            id
        };
        let initial = self
            .read_memory_value(request.address, request.data_type, request.architecture)
            .unwrap_or(0);

        let wp = Watchpoint {
            id,
            name: if request.name.is_empty() {
                format!("Watchpoint {}", id)
            } else {
                request.name
            },
            address: request.address,
            size,
            access_type: request.access_type,
            data_type: request.data_type,
            enabled: request.enabled,
            condition: request.condition,
            previous_value: initial,
            current_value: initial,
            has_triggered: false,
            architecture: request.architecture,
            hit_count: 0,
            ignore_count: 0,
        };
        tracing::debug!("Watchpoint {} ({}) added at 0x{:08X}", id, wp.name, wp.address);

        {
            let mut watchpoints = self.watchpoints.write();
            watchpoints.insert(id, wp.clone());
            self.rebuild_pages(&watchpoints);
        }

        let added = self.callbacks.read().added.clone();
        if let Some(callback) = added {
            callback(&wp);
        }
        id
    }

    /// Remove a watchpoint by ID
    pub fn remove_watchpoint(&self, id: u32) -> bool {
        {
            let mut watchpoints = self.watchpoints.write();
            if watchpoints.remove(&id).is_none() {
                return false;
            }
            self.rebuild_pages(&watchpoints);
        }
        tracing::debug!("Watchpoint {} removed", id);

        let removed = self.callbacks.read().removed.clone();
        if let Some(callback) = removed {
            callback(id);
        }
        true
    }

    fn modify(&self, id: u32, apply: impl FnOnce(&mut Watchpoint)) -> bool {
        let snapshot = {
            let mut watchpoints = self.watchpoints.write();
            let Some(wp) = watchpoints.get_mut(&id) else {
                return false;
            };
            apply(wp);
            wp.clone()
        };

        let changed = self.callbacks.read().changed.clone();
        if let Some(callback) = changed {
            callback(&snapshot);
        }
        true
    }

    pub fn enable_watchpoint(&self, id: u32, enabled: bool) -> bool {
        self.modify(id, |wp| wp.enabled = enabled)
    }

    pub fn set_watchpoint_condition(&self, id: u32, condition: &str) -> bool {
        self.modify(id, |wp| wp.condition = condition.to_string())
    }

    pub fn set_watchpoint_ignore_count(&self, id: u32, ignore_count: u32) -> bool {
        self.modify(id, |wp| wp.ignore_count = ignore_count)
    }

    pub fn rename_watchpoint(&self, id: u32, name: &str) -> bool {
        self.modify(id, |wp| wp.name = name.to_string())
    }

    pub fn get_watchpoint(&self, id: u32) -> Option<Watchpoint> {
        self.watchpoints.read().get(&id).cloned()
    }

    /// Every watchpoint, ordered by ID
    pub fn get_all_watchpoints(&self) -> Vec<Watchpoint> {
        self.watchpoints.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.watchpoints.read().len()
    }

    /// Remove everything, notifying the removed callback once per watchpoint
    pub fn clear_all_watchpoints(&self) {
        let ids: Vec<u32> = {
            let mut watchpoints = self.watchpoints.write();
            let ids = watchpoints.keys().copied().collect();
            watchpoints.clear();
            ids
        };
        self.watched_pages.write().clear();

        let removed = self.callbacks.read().removed.clone();
        if let Some(callback) = removed {
            for id in ids {
                callback(id);
            }
        }
    }

    pub fn set_watchpoint_triggered_callback(&self, callback: WatchpointCallback) {
        self.callbacks.write().triggered = Some(callback);
    }

    pub fn set_watchpoint_added_callback(&self, callback: WatchpointCallback) {
        self.callbacks.write().added = Some(callback);
    }

    pub fn set_watchpoint_removed_callback(&self, callback: WatchpointRemovedCallback) {
        self.callbacks.write().removed = Some(callback);
    }

    pub fn set_watchpoint_changed_callback(&self, callback: WatchpointCallback) {
        self.callbacks.write().changed = Some(callback);
    }

    /// Whether an enabled watchpoint of a matching type overlaps the access
    pub fn is_address_watched(
        &self,
        address: u32,
        size: u32,
        access_type: AccessType,
        architecture: Option<Architecture>,
    ) -> bool {
        if !self.is_watched_page(address, size) {
            return false;
        }
        self.watchpoints.read().values().any(|wp| {
            wp.enabled
                && wp.access_type.matches(access_type)
                && wp.matches_architecture(architecture)
                && wp.overlaps(address, size)
        })
    }

    /// Snapshots of enabled watchpoints matching the access
    pub fn get_watchpoints_for_address(
        &self,
        address: u32,
        size: u32,
        access_type: AccessType,
        architecture: Option<Architecture>,
    ) -> Vec<Watchpoint> {
        self.watchpoints
            .read()
            .values()
            .filter(|wp| {
                wp.enabled
                    && wp.access_type.matches(access_type)
                    && wp.matches_architecture(architecture)
                    && wp.overlaps(address, size)
            })
            .cloned()
            .collect()
    }

    /// Memory bus hook for reads; true when any watchpoint fired
    pub fn check_memory_read(
        &self,
        address: u32,
        value: u64,
        size: u32,
        architecture: Option<Architecture>,
    ) -> bool {
        self.check_access(address, value, size, AccessType::Read, architecture)
    }

    /// Memory bus hook for writes; true when any watchpoint fired
    ///
    /// Fires on every matching write, even when the value is unchanged.
    pub fn check_memory_write(
        &self,
        address: u32,
        value: u64,
        size: u32,
        architecture: Option<Architecture>,
    ) -> bool {
        self.check_access(address, value, size, AccessType::Write, architecture)
    }

    fn check_access(
        &self,
        address: u32,
        value: u64,
        size: u32,
        access: AccessType,
        architecture: Option<Architecture>,
    ) -> bool {
        if !self.is_watched_page(address, size) {
            return false;
        }

        let matches = |wp: &Watchpoint| {
            wp.enabled
                && wp.access_type.matches(access)
                && wp.matches_architecture(architecture)
                && wp.overlaps(address, size)
        };

        // Accesses that do not cover the whole watchpoint are resampled at
        // its full width so the stored value agrees with the polling path
        let partial: Vec<(u32, u32, DataType, Option<Architecture>)> = self
            .watchpoints
            .read()
            .values()
            .filter(|wp| matches(*wp) && !(address == wp.address && size >= wp.size))
            .map(|wp| (wp.id, wp.address, wp.data_type, wp.architecture.or(architecture)))
            .collect();
        let samples: HashMap<u32, u64> = partial
            .into_iter()
            .filter_map(|(id, wp_address, data_type, arch)| {
                self.read_memory_value(wp_address, data_type, arch)
                    .map(|sample| (id, sample))
            })
            .collect();

        let mut fired = Vec::new();
        {
            let mut watchpoints = self.watchpoints.write();
            let mut touched = self.bus_touched.write();
            for wp in watchpoints.values_mut() {
                if !matches(&*wp) {
                    continue;
                }

                let observed = samples.get(&wp.id).copied().unwrap_or(value);
                wp.previous_value = wp.current_value;
                wp.current_value = observed;
                touched.insert(wp.id);
                if Self::fires(wp, observed) {
                    fired.push(wp.clone());
                }
            }
        }

        for wp in &fired {
            tracing::trace!(
                "Watchpoint {} {:?} at 0x{:08X} = 0x{:X}",
                wp.id,
                access,
                address,
                value
            );
        }
        self.notify_triggered(&fired);
        !fired.is_empty()
    }

    /// Hit counting, ignore count and condition for one matching access
    fn fires(wp: &mut Watchpoint, value: u64) -> bool {
        wp.hit_count = wp.hit_count.saturating_add(1);
        if wp.hit_count <= wp.ignore_count {
            return false;
        }
        if !wp.condition.is_empty() && !condition::evaluate_condition(&wp.condition, value) {
            return false;
        }
        wp.has_triggered = true;
        true
    }

    fn notify_triggered(&self, fired: &[Watchpoint]) {
        if fired.is_empty() {
            return;
        }
        let triggered = self.callbacks.read().triggered.clone();
        if let Some(callback) = triggered {
            for wp in fired {
                callback(wp);
            }
        }
    }

    /// Polling path: sample every enabled watchpoint and fire on change
    ///
    /// Watchpoints without a usable reader are skipped. A watchpoint already
    /// counted by a bus access since the last poll only takes the sampled
    /// value, so one write is never counted twice.
    pub fn update(&self) -> bool {
        let touched: HashSet<u32> = std::mem::take(&mut *self.bus_touched.write());

        let targets: Vec<(u32, u32, DataType, Option<Architecture>)> = self
            .watchpoints
            .read()
            .values()
            .filter(|wp| wp.enabled)
            .map(|wp| (wp.id, wp.address, wp.data_type, wp.architecture))
            .collect();

        let samples: Vec<(u32, u64)> = targets
            .into_iter()
            .filter_map(|(id, address, data_type, arch)| {
                self.read_memory_value(address, data_type, arch)
                    .map(|value| (id, value))
            })
            .collect();

        let mut fired = Vec::new();
        {
            let mut watchpoints = self.watchpoints.write();
            for (id, value) in samples {
                let Some(wp) = watchpoints.get_mut(&id) else {
                    continue;
                };
                if touched.contains(&id) {
                    wp.current_value = value;
                    continue;
                }
                if value == wp.current_value {
                    continue;
                }
                wp.previous_value = wp.current_value;
                wp.current_value = value;
                if Self::fires(wp, value) {
                    fired.push(wp.clone());
                }
            }
        }

        self.notify_triggered(&fired);
        !fired.is_empty()
    }

    /// Current value, or `None` for an unknown ID
    pub fn get_watchpoint_value(&self, id: u32) -> Option<u64> {
        self.watchpoints.read().get(&id).map(|wp| wp.current_value)
    }

    pub fn has_watchpoint_value_changed(&self, id: u32) -> bool {
        self.watchpoints
            .read()
            .get(&id)
            .map(|wp| wp.value_changed())
            .unwrap_or(false)
    }

    /// Reset every `has_triggered` flag
    pub fn clear_triggered(&self) {
        for wp in self.watchpoints.write().values_mut() {
            wp.has_triggered = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn write_word(manager: &WatchpointManager, address: u32) -> u32 {
        manager.add_watchpoint(WatchpointRequest::new(address, DataType::Word, AccessType::Write))
    }

    #[test]
    fn test_default_name_and_size() {
        let manager = WatchpointManager::new();
        let id = write_word(&manager, 0x200000);
        let wp = manager.get_watchpoint(id).unwrap();
        assert_eq!(wp.name, format!("Watchpoint {}", id));
        assert_eq!(wp.size, 2);

        let mut request = WatchpointRequest::new(0x10, DataType::DWord, AccessType::Read).named("timer");
        request.size = 3;
        let id = manager.add_watchpoint(request);
        let wp = manager.get_watchpoint(id).unwrap();
        assert_eq!(wp.name, "timer");
        assert_eq!(wp.size, 4);
    }

    #[test]
    fn test_half_open_overlap() {
        let manager = WatchpointManager::new();
        manager.add_watchpoint(WatchpointRequest::new(0x1000, DataType::DWord, AccessType::Write));

        assert!(manager.check_memory_write(0x1002, 0xAA, 1, None));
        assert!(!manager.check_memory_write(0x1004, 0xAA, 2, None));
        assert!(manager.check_memory_write(0x0FFF, 0xAAAA, 2, None));
        assert!(!manager.check_memory_write(0x0FFE, 0xAAAA, 2, None));
    }

    #[test]
    fn test_direct_write_always_notifies() {
        let manager = WatchpointManager::new();
        let id = write_word(&manager, 0x200000);

        assert!(manager.check_memory_write(0x200000, 0x1234, 2, Some(Architecture::Z80)));
        let wp = manager.get_watchpoint(id).unwrap();
        assert_eq!(wp.current_value, 0x1234);
        assert!(wp.has_triggered);

        manager.clear_triggered();
        assert!(manager.check_memory_write(0x200000, 0x1234, 2, Some(Architecture::Z80)));
        let wp = manager.get_watchpoint(id).unwrap();
        assert!(wp.has_triggered);
        assert_eq!(wp.previous_value, 0x1234);
        assert!(!manager.has_watchpoint_value_changed(id));
    }

    #[test]
    fn test_access_type_filter() {
        let manager = WatchpointManager::new();
        manager.add_watchpoint(WatchpointRequest::new(0x40, DataType::Byte, AccessType::Read));
        assert!(!manager.check_memory_write(0x40, 1, 1, None));
        assert!(manager.check_memory_read(0x40, 1, 1, None));

        manager.add_watchpoint(WatchpointRequest::new(0x80, DataType::Byte, AccessType::ReadWrite));
        assert!(manager.check_memory_write(0x80, 1, 1, None));
        assert!(manager.check_memory_read(0x80, 1, 1, None));
        assert!(manager.is_address_watched(0x80, 1, AccessType::Write, None));
        assert!(!manager.is_address_watched(0x40, 1, AccessType::Write, None));
    }

    #[test]
    fn test_architecture_filter() {
        let manager = WatchpointManager::new();
        manager.add_watchpoint(
            WatchpointRequest::new(0x40, DataType::Byte, AccessType::Write)
                .for_architecture(Architecture::M68K),
        );
        assert!(!manager.check_memory_write(0x40, 1, 1, Some(Architecture::Z80)));
        assert!(manager.check_memory_write(0x40, 1, 1, Some(Architecture::M68K)));
        // Unspecified access architecture matches any watchpoint
        assert!(manager.check_memory_write(0x40, 1, 1, None));
    }

    #[test]
    fn test_condition_and_fail_open() {
        let manager = WatchpointManager::new();
        let id = manager.add_watchpoint(
            WatchpointRequest::new(0x10, DataType::Byte, AccessType::Write).with_condition("$value == 0x42"),
        );
        assert!(!manager.check_memory_write(0x10, 0x41, 1, None));
        // Value still recorded when the condition is false
        assert_eq!(manager.get_watchpoint_value(id), Some(0x41));
        assert!(manager.check_memory_write(0x10, 0x42, 1, None));

        // A broken condition fires unconditionally
        manager.set_watchpoint_condition(id, "$value ~ 3");
        assert!(manager.check_memory_write(0x10, 0x00, 1, None));
    }

    #[test]
    fn test_ignore_count() {
        let manager = WatchpointManager::new();
        let id = write_word(&manager, 0x10);
        manager.set_watchpoint_ignore_count(id, 2);
        assert!(!manager.check_memory_write(0x10, 1, 2, None));
        assert!(!manager.check_memory_write(0x10, 2, 2, None));
        assert!(manager.check_memory_write(0x10, 3, 2, None));
    }

    #[test]
    fn test_disabled_watchpoint() {
        let manager = WatchpointManager::new();
        let id = write_word(&manager, 0x10);
        manager.enable_watchpoint(id, false);
        assert!(!manager.check_memory_write(0x10, 1, 2, None));
        assert_eq!(manager.get_watchpoint(id).unwrap().hit_count, 0);
    }

    #[test]
    fn test_polling_fires_only_on_change() {
        let ram = Arc::new(RwLock::new(vec![0u8; 0x100]));
        let manager = WatchpointManager::new();
        let reader = ram.clone();
        manager.set_value_reader(
            Architecture::M68K,
            Arc::new(move |addr: u32| reader.read().get(addr as usize).copied().unwrap_or(0)),
        );
        ram.write()[0x20] = 0x12;
        ram.write()[0x21] = 0x34;

        let id = manager.add_watchpoint(
            WatchpointRequest::new(0x20, DataType::Word, AccessType::Write)
                .for_architecture(Architecture::M68K),
        );
        // Sampled big-endian at creation
        assert_eq!(manager.get_watchpoint_value(id), Some(0x1234));

        assert!(!manager.update());
        ram.write()[0x21] = 0x35;
        assert!(manager.update());
        assert_eq!(manager.get_watchpoint_value(id), Some(0x1235));
        assert!(manager.has_watchpoint_value_changed(id));
        assert!(!manager.update());
    }

    #[test]
    fn test_bus_hit_is_not_recounted_by_polling() {
        let ram = Arc::new(RwLock::new(vec![0u8; 0x100]));
        let manager = WatchpointManager::new();
        let reader = ram.clone();
        manager.set_value_reader(
            Architecture::Z80,
            Arc::new(move |addr: u32| reader.read().get(addr as usize).copied().unwrap_or(0)),
        );
        let id = manager.add_watchpoint(
            WatchpointRequest::new(0x40, DataType::Word, AccessType::Write)
                .for_architecture(Architecture::Z80),
        );

        ram.write()[0x41] = 0x12;
        assert!(manager.check_memory_write(0x41, 0x12, 1, Some(Architecture::Z80)));
        // Little-endian word resampled at full width
        assert_eq!(manager.get_watchpoint_value(id), Some(0x1200));

        assert!(!manager.update());
        assert_eq!(manager.get_watchpoint(id).unwrap().hit_count, 1);

        // Polling resumes normally afterwards
        ram.write()[0x40] = 0x34;
        assert!(manager.update());
        assert_eq!(manager.get_watchpoint(id).unwrap().hit_count, 2);
        assert_eq!(manager.get_watchpoint_value(id), Some(0x1234));
    }

    #[test]
    fn test_polling_without_reader_is_skipped() {
        let manager = WatchpointManager::new();
        write_word(&manager, 0x10);
        assert!(!manager.update());
    }

    #[test]
    fn test_callbacks() {
        let manager = WatchpointManager::new();
        let added = Arc::new(AtomicU32::new(0));
        let removed = Arc::new(AtomicU32::new(0));
        let triggered = Arc::new(AtomicU32::new(0));
        let changed = Arc::new(AtomicU32::new(0));

        let counter = added.clone();
        manager.set_watchpoint_added_callback(Arc::new(move |_: &Watchpoint| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = removed.clone();
        manager.set_watchpoint_removed_callback(Arc::new(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = triggered.clone();
        manager.set_watchpoint_triggered_callback(Arc::new(move |wp: &Watchpoint| {
            assert!(wp.has_triggered);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = changed.clone();
        manager.set_watchpoint_changed_callback(Arc::new(move |_: &Watchpoint| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let a = write_word(&manager, 0x10);
        write_word(&manager, 0x20);
        manager.enable_watchpoint(a, false);
        manager.enable_watchpoint(a, true);
        manager.check_memory_write(0x10, 5, 2, None);
        manager.remove_watchpoint(a);
        manager.clear_all_watchpoints();

        assert_eq!(added.load(Ordering::SeqCst), 2);
        assert_eq!(changed.load(Ordering::SeqCst), 2);
        assert_eq!(triggered.load(Ordering::SeqCst), 1);
        assert_eq!(removed.load(Ordering::SeqCst), 2);
        assert_eq!(manager.count(), 0);
        assert!(!manager.is_watched_page(0x10, 1));
    }

    #[test]
    fn test_page_index_follows_removal() {
        let manager = WatchpointManager::new();
        let a = write_word(&manager, 0x1FFF);
        assert!(manager.is_watched_page(0x2000, 1));
        let b = write_word(&manager, 0x2100);
        manager.remove_watchpoint(a);
        assert!(manager.is_watched_page(0x2000, 1));
        assert!(!manager.is_watched_page(0x1000, 1));
        manager.remove_watchpoint(b);
        assert!(!manager.is_watched_page(0x2000, 1));
    }

    #[test]
    fn test_unknown_ids() {
        let manager = WatchpointManager::new();
        assert!(!manager.remove_watchpoint(7));
        assert!(!manager.enable_watchpoint(7, true));
        assert!(manager.get_watchpoint(7).is_none());
        assert_eq!(manager.get_watchpoint_value(7), None);
        assert!(!manager.has_watchpoint_value_changed(7));
    }
}

//! Memory viewer for inspecting and patching emulated memory

use serde::{Deserialize, Serialize};

use rd_core::{Architecture, MemoryReadFn, MemoryWriteFn};

use crate::render::{self, Canvas, Color, Rect};

/// Named address range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub name: String,
    pub start: u32,
    pub size: u32,
}

impl MemoryRegion {
    pub fn contains(&self, address: u32) -> bool {
        (address as u64) >= self.start as u64
            && (address as u64) < self.start as u64 + self.size as u64
    }
}

/// One hexdump line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRow {
    pub address: u32,
    pub bytes: Vec<u8>,
}

impl MemoryRow {
    pub fn hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn ascii(&self) -> String {
        self.bytes
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
            .collect()
    }
}

/// Persisted view settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryViewerSettings {
    pub address: u32,
    pub columns: usize,
    pub rows: usize,
    pub editable: bool,
    pub regions: Vec<MemoryRegion>,
}

impl Default for MemoryViewerSettings {
    fn default() -> Self {
        Self {
            address: 0,
            columns: 16,
            rows: 16,
            editable: false,
            regions: Vec::new(),
        }
    }
}

/// Memory viewer panel state
pub struct MemoryViewer {
    architecture: Architecture,
    read: Option<MemoryReadFn>,
    write: Option<MemoryWriteFn>,
    /// First address shown
    address: u32,
    /// Bytes per row
    columns: usize,
    /// Rows shown
    rows: usize,
    /// Byte editing allowed
    editable: bool,
    regions: Vec<MemoryRegion>,
    /// Address re-centred on every update
    follow_address: Option<u32>,
}

impl MemoryViewer {
    pub const MAX_COLUMNS: usize = 64;

    pub fn new(architecture: Architecture) -> Self {
        let defaults = MemoryViewerSettings::default();
        Self {
            architecture,
            read: None,
            write: None,
            address: defaults.address,
            columns: defaults.columns,
            rows: defaults.rows,
            editable: defaults.editable,
            regions: defaults.regions,
            follow_address: None,
        }
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// Switch byte order and address width; regions are kept
    pub fn set_architecture(&mut self, architecture: Architecture) {
        self.architecture = architecture;
        self.address &= architecture.address_mask();
    }

    pub fn set_memory_read_function(&mut self, read: MemoryReadFn) {
        self.read = Some(read);
    }

    pub fn set_memory_write_function(&mut self, write: MemoryWriteFn) {
        self.write = Some(write);
    }

    pub fn is_connected(&self) -> bool {
        self.read.is_some()
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn go_to_address(&mut self, address: u32) {
        self.address = address & self.architecture.address_mask();
    }

    /// Jump to a typed address (`0x`, `$` or bare hex, then decimal)
    pub fn go_to_expression(&mut self, text: &str) -> bool {
        match parse_address(text) {
            Some(address) => {
                self.go_to_address(address);
                true
            }
            None => false,
        }
    }

    pub fn follow(&mut self, address: u32) {
        self.follow_address = Some(address);
        self.go_to_address(address);
    }

    pub fn stop_following(&mut self) {
        self.follow_address = None;
    }

    /// Re-centre on the followed address, if any
    pub fn update(&mut self) {
        if let Some(address) = self.follow_address {
            self.go_to_address(address);
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.columns = columns.clamp(1, Self::MAX_COLUMNS);
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn set_rows(&mut self, rows: usize) {
        self.rows = rows.max(1);
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    pub fn read_byte(&self, address: u32) -> Option<u8> {
        let address = address & self.architecture.address_mask();
        self.read.as_ref().map(|read| read(address))
    }

    /// Value of `size` bytes in the architecture's byte order
    pub fn read_value(&self, address: u32, size: u32) -> Option<u64> {
        let read = self.read.as_ref()?;
        Some(self.architecture.read_value(&**read, address, size))
    }

    /// Hexdump rows for the current window
    pub fn read_rows(&self) -> Vec<MemoryRow> {
        let Some(read) = self.read.as_ref() else {
            return Vec::new();
        };
        let arch = self.architecture;
        (0..self.rows)
            .map(|row| {
                let address = arch.offset_address(self.address, (row * self.columns) as u32);
                let bytes = (0..self.columns as u32)
                    .map(|i| read(arch.offset_address(address, i)))
                    .collect();
                MemoryRow { address, bytes }
            })
            .collect()
    }

    /// `$ADDR  HEX  ASCII`
    pub fn format_row(&self, row: &MemoryRow) -> String {
        format!(
            "${:0width$X}  {}  {}",
            row.address,
            row.hex(),
            row.ascii(),
            width = self.architecture.address_digits()
        )
    }

    /// Write one byte; false when read-only or no writer is attached
    pub fn write_byte(&mut self, address: u32, value: u8) -> bool {
        self.write_bytes(address, &[value])
    }

    pub fn write_word(&mut self, address: u32, value: u16) -> bool {
        let bytes = self.architecture.endianness().to_bytes(value as u64, 2);
        self.write_bytes(address, &bytes)
    }

    pub fn write_dword(&mut self, address: u32, value: u32) -> bool {
        let bytes = self.architecture.endianness().to_bytes(value as u64, 4);
        self.write_bytes(address, &bytes)
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> bool {
        if !self.editable {
            tracing::debug!("Memory view is read-only, ignoring write at 0x{:08X}", address);
            return false;
        }
        let Some(write) = self.write.as_ref() else {
            return false;
        };
        for (i, &byte) in bytes.iter().enumerate() {
            write(self.architecture.offset_address(address, i as u32), byte);
        }
        tracing::trace!("Wrote {} bytes at 0x{:08X}", bytes.len(), address);
        true
    }

    /// First address in `[start, start+length)` holding `value` as a
    /// 1, 2 or 4 byte quantity in the architecture's byte order
    pub fn search_value(&self, value: u64, size: u32, start: u32, length: u32) -> Option<u32> {
        if !matches!(size, 1 | 2 | 4) {
            return None;
        }
        let read = self.read.as_ref()?;
        let needle = self.architecture.endianness().to_bytes(value, size);
        let last = length.checked_sub(size)?;

        let arch = self.architecture;
        (0..=last).map(|offset| arch.offset_address(start, offset)).find(|&address| {
            needle
                .iter()
                .enumerate()
                .all(|(i, &byte)| read(arch.offset_address(address, i as u32)) == byte)
        })
    }

    /// Add or replace a named region
    pub fn add_region(&mut self, name: &str, start: u32, size: u32) {
        self.regions.retain(|region| region.name != name);
        self.regions.push(MemoryRegion {
            name: name.to_string(),
            start,
            size,
        });
    }

    pub fn remove_region(&mut self, name: &str) -> bool {
        let before = self.regions.len();
        self.regions.retain(|region| region.name != name);
        self.regions.len() != before
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn region_at(&self, address: u32) -> Option<&MemoryRegion> {
        self.regions.iter().find(|region| region.contains(address))
    }

    pub fn go_to_region(&mut self, name: &str) -> bool {
        match self.regions.iter().find(|region| region.name == name) {
            Some(region) => {
                let start = region.start;
                self.go_to_address(start);
                true
            }
            None => false,
        }
    }

    pub fn save_settings(&self) -> String {
        let settings = MemoryViewerSettings {
            address: self.address,
            columns: self.columns,
            rows: self.rows,
            editable: self.editable,
            regions: self.regions.clone(),
        };
        serde_json::to_string(&settings).unwrap_or_default()
    }

    /// Apply JSON settings; the view is untouched when they do not parse
    pub fn load_settings(&mut self, json: &str) -> bool {
        match serde_json::from_str::<MemoryViewerSettings>(json) {
            Ok(settings) => {
                self.go_to_address(settings.address);
                self.set_columns(settings.columns);
                self.set_rows(settings.rows);
                self.editable = settings.editable;
                self.regions = settings.regions;
                true
            }
            Err(e) => {
                tracing::warn!("Ignoring memory view settings: {}", e);
                false
            }
        }
    }

    pub fn render(&self, canvas: &mut dyn Canvas, rect: Rect) {
        let digits = self.architecture.address_digits();
        let mut title = format!("Memory [{}] ${:0width$X}", self.architecture, self.address, width = digits);
        if let Some(region) = self.region_at(self.address) {
            title.push_str(&format!(" ({})", region.name));
        }
        let body = render::panel(canvas, rect, &title);

        if !self.is_connected() {
            canvas.draw_text(body.x, body.y, "Memory not connected", Color::DIM);
            return;
        }

        let line = canvas.line_height();
        let char_width = canvas.char_width();
        let hex_x = body.x + (digits as f32 + 3.0) * char_width;
        let ascii_x = hex_x + (self.columns as f32 * 3.0 + 1.0) * char_width;

        for (i, row) in self.read_rows().iter().take(body.rows(line)).enumerate() {
            let y = body.row_y(i, line);
            canvas.draw_text(body.x, y, &format!("${:0width$X}", row.address, width = digits), Color::HEADER);
            for (col, byte) in row.bytes.iter().enumerate() {
                let color = if *byte == 0 { Color::DIM } else { Color::TEXT };
                let x = hex_x + col as f32 * 3.0 * char_width;
                canvas.draw_text(x, y, &format!("{:02X}", byte), color);
            }
            canvas.draw_text(ascii_x, y, &row.ascii(), Color::TEXT);
        }
    }
}

/// Parse `0x`/`$` hex, bare hex, or decimal
pub fn parse_address(text: &str) -> Option<u32> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        u32::from_str_radix(text, 16).ok().or_else(|| text.parse().ok())
    }
}

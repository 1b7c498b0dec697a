//! Register view with change tracking and validated editing

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use rd_core::Architecture;
use rd_cpu::describe_flags;

use crate::render::{self, Canvas, Color, Rect};

/// How a register value is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayFormat {
    #[default]
    Hex,
    Decimal,
    Binary,
    Ascii,
}

/// One register and its last two values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub name: String,
    pub value: u64,
    pub prev_value: u64,
    pub size_bits: u32,
    pub group: String,
    pub description: String,
    pub read_only: bool,
}

impl RegisterInfo {
    pub fn changed(&self) -> bool {
        self.value != self.prev_value
    }

    /// Mask covering `size_bits`
    pub fn mask(&self) -> u64 {
        if self.size_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.size_bits) - 1
        }
    }
}

/// Named, ordered set of registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterGroup {
    pub name: String,
    pub registers: Vec<String>,
}

/// Static register definition
#[derive(Debug, Clone)]
pub struct RegisterDef {
    pub name: String,
    pub size_bits: u32,
    pub description: String,
    pub read_only: bool,
}

/// Static group definition
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: &'static str,
    pub registers: Vec<RegisterDef>,
}

fn reg(name: impl Into<String>, size_bits: u32, description: impl Into<String>) -> RegisterDef {
    RegisterDef {
        name: name.into(),
        size_bits,
        description: description.into(),
        read_only: false,
    }
}

fn m68k_layout() -> Vec<GroupDef> {
    vec![
        GroupDef {
            name: "Data Registers",
            registers: (0..8)
                .map(|i| reg(format!("D{}", i), 32, "32-bit data register"))
                .collect(),
        },
        GroupDef {
            name: "Address Registers",
            registers: (0..8)
                .map(|i| {
                    let desc = match i {
                        6 => "Frame pointer by convention",
                        7 => "Active stack pointer",
                        _ => "32-bit address register",
                    };
                    reg(format!("A{}", i), 32, desc)
                })
                .collect(),
        },
        GroupDef {
            name: "Special Registers",
            registers: vec![
                reg("PC", 32, "Program Counter"),
                reg("SR", 16, "Status Register"),
                reg("USP", 32, "User Stack Pointer"),
                reg("SSP", 32, "Supervisor Stack Pointer"),
            ],
        },
    ]
}

fn z80_layout() -> Vec<GroupDef> {
    let pair = |name: &str| reg(name, 16, format!("{} register pair", name));
    let alternate = |name: &str| {
        reg(
            format!("{}'", name),
            16,
            format!("Alternate {} register pair", name),
        )
    };
    vec![
        GroupDef {
            name: "Main Registers",
            registers: ["AF", "BC", "DE", "HL"].into_iter().map(pair).collect(),
        },
        GroupDef {
            name: "8-bit Registers",
            registers: vec![
                reg("A", 8, "Accumulator"),
                reg("F", 8, "Flags"),
                reg("B", 8, "B register"),
                reg("C", 8, "C register"),
                reg("D", 8, "D register"),
                reg("E", 8, "E register"),
                reg("H", 8, "H register"),
                reg("L", 8, "L register"),
            ],
        },
        GroupDef {
            name: "Alternate Registers",
            registers: ["AF", "BC", "DE", "HL"].into_iter().map(alternate).collect(),
        },
        GroupDef {
            name: "Special Registers",
            registers: vec![
                reg("IX", 16, "Index Register X"),
                reg("IY", 16, "Index Register Y"),
                reg("SP", 16, "Stack Pointer"),
                reg("PC", 16, "Program Counter"),
                reg("I", 8, "Interrupt Vector"),
                reg("R", 8, "Memory Refresh"),
            ],
        },
    ]
}

fn arm_layout() -> Vec<GroupDef> {
    vec![
        GroupDef {
            name: "General Purpose",
            registers: (0..16)
                .map(|i| {
                    let desc = match i {
                        11 => "Frame Pointer (FP)",
                        13 => "Stack Pointer (SP)",
                        14 => "Link Register (LR)",
                        15 => "Program Counter (PC)",
                        _ => "General Purpose Register",
                    };
                    reg(format!("R{}", i), 32, desc)
                })
                .collect(),
        },
        GroupDef {
            name: "Status Registers",
            registers: vec![
                reg("CPSR", 32, "Current Program Status Register"),
                reg("SPSR", 32, "Saved Program Status Register"),
            ],
        },
    ]
}

const MIPS_ALIASES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

fn mips_layout() -> Vec<GroupDef> {
    vec![
        GroupDef {
            name: "General Purpose",
            registers: MIPS_ALIASES
                .iter()
                .enumerate()
                .map(|(i, alias)| RegisterDef {
                    name: format!("${}", i),
                    size_bits: 32,
                    description: format!("General Purpose Register ({})", alias),
                    read_only: i == 0,
                })
                .collect(),
        },
        GroupDef {
            name: "Special Registers",
            registers: vec![
                reg("PC", 32, "Program Counter"),
                reg("HI", 32, "Multiply/Divide Result High"),
                reg("LO", 32, "Multiply/Divide Result Low"),
            ],
        },
    ]
}

fn m6502_layout() -> Vec<GroupDef> {
    vec![
        GroupDef {
            name: "Registers",
            registers: vec![
                reg("A", 8, "Accumulator"),
                reg("X", 8, "X Index Register"),
                reg("Y", 8, "Y Index Register"),
                reg("S", 8, "Stack Pointer"),
                reg("P", 8, "Processor Status"),
                reg("PC", 16, "Program Counter"),
            ],
        },
        GroupDef {
            name: "Status Flags",
            registers: vec![
                reg("N", 1, "Negative Flag"),
                reg("V", 1, "Overflow Flag"),
                reg("B", 1, "Break Command"),
                reg("D", 1, "Decimal Mode"),
                reg("I", 1, "Interrupt Disable"),
                reg("Z", 1, "Zero Flag"),
                reg("C", 1, "Carry Flag"),
            ],
        },
    ]
}

/// Register layouts, built once and never mutated
static LAYOUTS: Lazy<HashMap<Architecture, Vec<GroupDef>>> = Lazy::new(|| {
    let mut layouts = HashMap::new();
    layouts.insert(Architecture::M68K, m68k_layout());
    layouts.insert(Architecture::Z80, z80_layout());
    layouts.insert(Architecture::ARM, arm_layout());
    layouts.insert(Architecture::MIPS, mips_layout());
    layouts.insert(Architecture::M6502, m6502_layout());
    layouts
});

/// Grouped register layout of `arch`
pub fn layout(arch: Architecture) -> &'static [GroupDef] {
    LAYOUTS.get(&arch).map(Vec::as_slice).unwrap_or(&[])
}

/// Print `value` in `format`, sized by the register width rather than the value
pub fn format_register_value(value: u64, size_bits: u32, format: DisplayFormat) -> String {
    let width_bits = match size_bits {
        0..=8 => 8,
        9..=16 => 16,
        17..=32 => 32,
        _ => 64,
    };
    let masked = if width_bits == 64 {
        value
    } else {
        value & ((1u64 << width_bits) - 1)
    };

    match format {
        DisplayFormat::Hex => format!("0x{:0width$X}", masked, width = (width_bits / 4) as usize),
        DisplayFormat::Decimal => value.to_string(),
        DisplayFormat::Binary => format!("{:0width$b}", masked, width = width_bits as usize),
        DisplayFormat::Ascii if width_bits == 8 => {
            let byte = masked as u8;
            if (0x20..=0x7E).contains(&byte) {
                format!("'{}'", byte as char)
            } else {
                format!("\\x{:02X}", byte)
            }
        }
        DisplayFormat::Ascii => {
            let bytes = width_bits / 8;
            let text: String = (0..bytes)
                .rev()
                .map(|i| {
                    let byte = (masked >> (i * 8)) as u8;
                    if (0x20..=0x7E).contains(&byte) {
                        byte as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!("'{}'", text)
        }
    }
}

/// Parse `0x`/`$` hex, `0b` binary or decimal input for a `size_bits` register
pub fn parse_register_value(input: &str, size_bits: u32) -> Option<u64> {
    let input = input.trim();
    let value = if let Some(hex) = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .or_else(|| input.strip_prefix('$'))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = input.strip_prefix("0b").or_else(|| input.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()?
    } else {
        input.parse::<u64>().ok()?
    };

    Some(if size_bits >= 64 {
        value
    } else {
        value & ((1u64 << size_bits) - 1)
    })
}

/// Write-back observer for edited registers
pub type RegisterUpdateCallback = Box<dyn FnMut(&str, u64) + Send>;

#[derive(Debug, Clone)]
struct EditSession {
    register: String,
    buffer: String,
}

/// Register viewer
pub struct RegisterViewer {
    architecture: Option<Architecture>,
    registers: HashMap<String, RegisterInfo>,
    groups: Vec<RegisterGroup>,
    default_format: DisplayFormat,
    formats: HashMap<String, DisplayFormat>,
    on_update: Option<RegisterUpdateCallback>,
    edit: Option<EditSession>,
}

impl Default for RegisterViewer {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterViewer {
    pub fn new() -> Self {
        Self {
            architecture: None,
            registers: HashMap::new(),
            groups: Vec::new(),
            default_format: DisplayFormat::Hex,
            formats: HashMap::new(),
            on_update: None,
            edit: None,
        }
    }

    /// Replace the register tables with the layout of `arch`
    pub fn set_architecture(&mut self, arch: Architecture) {
        self.clear_registers();
        self.architecture = Some(arch);

        for group in layout(arch) {
            let names = group.registers.iter().map(|def| def.name.clone()).collect();
            self.define_register_group(group.name, names);
            for def in &group.registers {
                self.registers.insert(
                    def.name.clone(),
                    RegisterInfo {
                        name: def.name.clone(),
                        value: 0,
                        prev_value: 0,
                        size_bits: def.size_bits,
                        group: group.name.to_string(),
                        description: def.description.clone(),
                        read_only: def.read_only,
                    },
                );
            }
        }
        tracing::debug!("Register layout for {}: {} registers", arch, self.registers.len());
    }

    pub fn architecture(&self) -> Option<Architecture> {
        self.architecture
    }

    /// Add or replace a group
    pub fn define_register_group(&mut self, name: &str, registers: Vec<String>) {
        match self.groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.registers = registers,
            None => self.groups.push(RegisterGroup {
                name: name.to_string(),
                registers,
            }),
        }
    }

    pub fn clear_registers(&mut self) {
        self.registers.clear();
        self.groups.clear();
        self.formats.clear();
        self.edit = None;
    }

    /// Bulk per-step sync; names not in the layout are ignored
    pub fn update_registers(&mut self, values: &HashMap<String, u64>) {
        for (name, &value) in values {
            if let Some(info) = self.registers.get_mut(name) {
                info.prev_value = info.value;
                info.value = value & info.mask();
            }
        }
    }

    /// Set one register
    ///
    /// False for unknown or read-only registers, and for values that do not
    /// fit the register's width; nothing is applied in those cases.
    pub fn set_register_value(&mut self, name: &str, value: u64) -> bool {
        let Some(info) = self.registers.get_mut(name) else {
            return false;
        };
        if info.read_only {
            tracing::debug!("Register {} is read-only", name);
            return false;
        }
        if value & !info.mask() != 0 {
            tracing::debug!("Value 0x{:X} does not fit {}-bit {}", value, info.size_bits, name);
            return false;
        }

        info.prev_value = info.value;
        info.value = value;
        if let Some(callback) = self.on_update.as_mut() {
            callback(name, value);
        }
        true
    }

    pub fn get_register_value(&self, name: &str) -> Option<u64> {
        self.registers.get(name).map(|info| info.value)
    }

    /// Case-insensitive lookup, for condition operands such as `$d0`
    pub fn find_register_value(&self, name: &str) -> Option<u64> {
        self.get_register_value(name).or_else(|| {
            self.registers
                .values()
                .find(|info| info.name.eq_ignore_ascii_case(name) || info.name.trim_start_matches('$') == name)
                .map(|info| info.value)
        })
    }

    pub fn has_register_changed(&self, name: &str) -> bool {
        self.registers.get(name).map(RegisterInfo::changed).unwrap_or(false)
    }

    pub fn set_register_update_callback(&mut self, callback: RegisterUpdateCallback) {
        self.on_update = Some(callback);
    }

    pub fn set_display_format(&mut self, format: DisplayFormat) {
        self.default_format = format;
    }

    pub fn set_register_display_format(&mut self, name: &str, format: DisplayFormat) {
        self.formats.insert(name.to_string(), format);
    }

    pub fn display_format(&self, name: &str) -> DisplayFormat {
        self.formats.get(name).copied().unwrap_or(self.default_format)
    }

    /// Value of `name` in its display format
    pub fn formatted_value(&self, name: &str) -> Option<String> {
        let info = self.registers.get(name)?;
        Some(format_register_value(info.value, info.size_bits, self.display_format(name)))
    }

    pub fn get_register_groups(&self) -> &[RegisterGroup] {
        &self.groups
    }

    pub fn get_registers_in_group(&self, group: &str) -> Vec<RegisterInfo> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| {
                g.registers
                    .iter()
                    .filter_map(|name| self.registers.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_all_registers(&self) -> &HashMap<String, RegisterInfo> {
        &self.registers
    }

    /// Start editing `name`, prefilled with its hex value
    pub fn begin_edit(&mut self, name: &str) -> bool {
        let Some(info) = self.registers.get(name) else {
            return false;
        };
        if info.read_only {
            return false;
        }
        self.edit = Some(EditSession {
            register: name.to_string(),
            buffer: format_register_value(info.value, info.size_bits, DisplayFormat::Hex),
        });
        true
    }

    pub fn editing_register(&self) -> Option<&str> {
        self.edit.as_ref().map(|edit| edit.register.as_str())
    }

    pub fn set_edit_buffer(&mut self, text: &str) {
        if let Some(edit) = self.edit.as_mut() {
            edit.buffer = text.to_string();
        }
    }

    /// Parse the buffer and apply it; the session stays open on bad input
    pub fn commit_edit(&mut self) -> bool {
        let Some(edit) = self.edit.clone() else {
            return false;
        };
        let Some(size_bits) = self.registers.get(&edit.register).map(|info| info.size_bits) else {
            self.edit = None;
            return false;
        };
        let Some(value) = parse_register_value(&edit.buffer, size_bits) else {
            tracing::debug!("Rejected value '{}' for {}", edit.buffer, edit.register);
            return false;
        };

        self.edit = None;
        self.set_register_value(&edit.register, value)
    }

    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    pub fn render(&self, canvas: &mut dyn Canvas, rect: Rect) {
        let title = match self.architecture {
            Some(arch) => format!("Registers [{}]", arch),
            None => "Registers".to_string(),
        };
        let body = render::panel(canvas, rect, &title);
        let line = canvas.line_height();
        let rows = body.rows(line);
        let mut row = 0;

        'groups: for group in &self.groups {
            if row >= rows {
                break;
            }
            canvas.draw_text(body.x, body.row_y(row, line), &group.name, Color::HEADER);
            row += 1;

            for name in &group.registers {
                if row >= rows {
                    break 'groups;
                }
                let Some(info) = self.registers.get(name) else {
                    continue;
                };

                let mut text = format!(
                    "  {:<5}{}",
                    info.name,
                    format_register_value(info.value, info.size_bits, self.display_format(name))
                );
                if let Some(flags) = self
                    .architecture
                    .and_then(|arch| describe_flags(arch, &info.name, info.value))
                {
                    text.push_str("  ");
                    text.push_str(&flags);
                }
                if info.read_only {
                    text.push_str(" [RO]");
                }

                let color = if info.changed() { Color::CHANGED } else { Color::TEXT };
                canvas.draw_text(body.x, body.row_y(row, line), &text, color);
                row += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DrawList;

    fn values(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|&(n, v)| (n.to_string(), v)).collect()
    }

    #[test]
    fn test_layouts() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::M68K);
        assert_eq!(viewer.get_all_registers().len(), 20);
        let names: Vec<&str> = viewer.get_register_groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Data Registers", "Address Registers", "Special Registers"]);
        assert_eq!(viewer.get_registers_in_group("Special Registers")[1].size_bits, 16);

        viewer.set_architecture(Architecture::Z80);
        assert!(viewer.get_register_value("D0").is_none());
        assert!(viewer.get_register_value("HL'").is_some());
        assert_eq!(viewer.get_register_groups().len(), 4);

        viewer.set_architecture(Architecture::M6502);
        assert_eq!(viewer.get_registers_in_group("Status Flags").len(), 7);
        assert!(viewer.get_registers_in_group("Nope").is_empty());
    }

    #[test]
    fn test_update_tracks_changes() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::M68K);
        viewer.update_registers(&values(&[("D0", 1), ("PC", 0x1000), ("XYZ", 9)]));
        assert!(viewer.has_register_changed("D0"));
        assert!(!viewer.has_register_changed("D1"));
        assert!(!viewer.has_register_changed("XYZ"));

        viewer.update_registers(&values(&[("D0", 1), ("PC", 0x1002)]));
        assert!(!viewer.has_register_changed("D0"));
        assert!(viewer.has_register_changed("PC"));
        let pc = &viewer.get_all_registers()["PC"];
        assert_eq!((pc.prev_value, pc.value), (0x1000, 0x1002));
    }

    #[test]
    fn test_set_register_value() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::MIPS);
        assert!(!viewer.set_register_value("$0", 5));
        assert_eq!(viewer.get_register_value("$0"), Some(0));
        assert!(!viewer.set_register_value("R0", 5));
        assert!(viewer.set_register_value("$29", 0x8001_0000));
        assert_eq!(viewer.get_register_value("$29"), Some(0x8001_0000));

        viewer.set_architecture(Architecture::Z80);
        assert!(viewer.set_register_value("A", 0x7F));
        assert!(!viewer.set_register_value("A", 0x1FF));
        assert_eq!(viewer.get_register_value("A"), Some(0x7F));
        assert!(viewer.set_register_value("HL", 0xFFFF));
        assert!(!viewer.set_register_value("HL", 0x1_0000));
    }

    #[test]
    fn test_update_callback() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::ARM);
        viewer.set_register_update_callback(Box::new(move |name: &str, value: u64| {
            sink.lock().push((name.to_string(), value));
        }));
        viewer.set_register_value("R0", 7);
        viewer.update_registers(&values(&[("R1", 3)]));
        assert_eq!(*seen.lock(), vec![("R0".to_string(), 7)]);
    }

    #[test]
    fn test_format_widths_follow_register_size() {
        assert_eq!(format_register_value(0x5, 8, DisplayFormat::Hex), "0x05");
        assert_eq!(format_register_value(0x5, 16, DisplayFormat::Hex), "0x0005");
        assert_eq!(format_register_value(0x5, 32, DisplayFormat::Hex), "0x00000005");
        assert_eq!(format_register_value(0x5, 64, DisplayFormat::Hex), "0x0000000000000005");
        assert_eq!(format_register_value(0x5, 8, DisplayFormat::Binary), "00000101");
        assert_eq!(format_register_value(0x5, 16, DisplayFormat::Binary).len(), 16);
        assert_eq!(format_register_value(1, 1, DisplayFormat::Binary), "00000001");
        assert_eq!(format_register_value(1234, 32, DisplayFormat::Decimal), "1234");
    }

    #[test]
    fn test_format_ascii() {
        assert_eq!(format_register_value(0x41, 8, DisplayFormat::Ascii), "'A'");
        assert_eq!(format_register_value(0x07, 8, DisplayFormat::Ascii), "\\x07");
        assert_eq!(format_register_value(0x4849, 16, DisplayFormat::Ascii), "'HI'");
        assert_eq!(format_register_value(0x4100_0042, 32, DisplayFormat::Ascii), "'A..B'");
    }

    #[test]
    fn test_parse_register_value() {
        assert_eq!(parse_register_value("0x1F", 8), Some(0x1F));
        assert_eq!(parse_register_value("$FF", 8), Some(0xFF));
        assert_eq!(parse_register_value("0b101", 8), Some(5));
        assert_eq!(parse_register_value(" 300 ", 8), Some(300 & 0xFF));
        assert_eq!(parse_register_value("0x1FFFF", 16), Some(0xFFFF));
        assert_eq!(parse_register_value("zz", 8), None);
        assert_eq!(parse_register_value("", 8), None);
    }

    #[test]
    fn test_edit_session() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::M68K);
        viewer.update_registers(&values(&[("D3", 0x10)]));

        assert!(viewer.begin_edit("D3"));
        assert_eq!(viewer.editing_register(), Some("D3"));
        viewer.set_edit_buffer("nonsense");
        assert!(!viewer.commit_edit());
        assert_eq!(viewer.editing_register(), Some("D3"));

        viewer.set_edit_buffer("0xCAFE");
        assert!(viewer.commit_edit());
        assert_eq!(viewer.get_register_value("D3"), Some(0xCAFE));
        assert!(viewer.editing_register().is_none());

        assert!(!viewer.begin_edit("Q9"));
        viewer.set_architecture(Architecture::MIPS);
        assert!(!viewer.begin_edit("$0"));
    }

    #[test]
    fn test_find_register_value() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::MIPS);
        viewer.update_registers(&values(&[("$29", 0x100)]));
        assert_eq!(viewer.find_register_value("29"), Some(0x100));
        viewer.set_architecture(Architecture::M68K);
        viewer.update_registers(&values(&[("D0", 3)]));
        assert_eq!(viewer.find_register_value("d0"), Some(3));
        assert_eq!(viewer.find_register_value("D9"), None);
    }

    #[test]
    fn test_render_highlights_changes() {
        let mut viewer = RegisterViewer::new();
        viewer.set_architecture(Architecture::M6502);
        viewer.update_registers(&values(&[("A", 0x42), ("P", 0x83)]));
        viewer.set_register_display_format("A", DisplayFormat::Decimal);

        let mut canvas = DrawList::new();
        viewer.render(&mut canvas, Rect::new(0.0, 0.0, 300.0, 400.0));
        assert!(canvas.contains_text("Registers [M6502]"));
        assert_eq!(canvas.text_color("A    66"), Some(Color::CHANGED));
        assert!(canvas.contains_text("N-----ZC"));
        assert_eq!(canvas.text_color("X    0x00"), Some(Color::TEXT));
    }
}

//! Watch panel over a shared [`WatchpointManager`]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rd_core::Architecture;

use crate::memory_viewer::parse_address;
use crate::render::{self, Canvas, Color, Rect};
use crate::watchpoint::{AccessType, DataType, Watchpoint, WatchpointManager, WatchpointRequest};

/// Pending watchpoint as typed into the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchForm {
    /// Address text (`0x`, `$`, bare hex or decimal)
    pub address: String,
    pub name: String,
    pub access_type: AccessType,
    pub data_type: DataType,
    pub condition: String,
}

impl Default for WatchForm {
    fn default() -> Self {
        Self {
            address: String::new(),
            name: String::new(),
            access_type: AccessType::Write,
            data_type: DataType::Byte,
            condition: String::new(),
        }
    }
}

/// Persisted panel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchViewerSettings {
    pub show_all_architectures: bool,
    pub highlight_changes: bool,
    pub default_access_type: AccessType,
    pub default_data_type: DataType,
}

impl Default for WatchViewerSettings {
    fn default() -> Self {
        Self {
            show_all_architectures: false,
            highlight_changes: true,
            default_access_type: AccessType::Write,
            default_data_type: DataType::Byte,
        }
    }
}

/// Watch viewer
pub struct WatchViewer {
    manager: Arc<WatchpointManager>,
    architecture: Option<Architecture>,
    settings: WatchViewerSettings,
    form: WatchForm,
    /// Watchpoint whose condition the form is editing
    editing: Option<u32>,
}

impl WatchViewer {
    pub fn new(manager: Arc<WatchpointManager>) -> Self {
        Self {
            manager,
            architecture: None,
            settings: WatchViewerSettings::default(),
            form: WatchForm::default(),
            editing: None,
        }
    }

    pub fn manager(&self) -> &Arc<WatchpointManager> {
        &self.manager
    }

    /// Architecture new watchpoints are bound to and the list is filtered by
    pub fn set_architecture(&mut self, architecture: Architecture) {
        self.architecture = Some(architecture);
    }

    pub fn architecture(&self) -> Option<Architecture> {
        self.architecture
    }

    pub fn set_show_all_architectures(&mut self, show_all: bool) {
        self.settings.show_all_architectures = show_all;
    }

    pub fn show_all_architectures(&self) -> bool {
        self.settings.show_all_architectures
    }

    pub fn set_highlight_changes(&mut self, highlight: bool) {
        self.settings.highlight_changes = highlight;
    }

    pub fn highlight_changes(&self) -> bool {
        self.settings.highlight_changes
    }

    pub fn form(&self) -> &WatchForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut WatchForm {
        &mut self.form
    }

    /// Empty form using the default access and data types
    pub fn reset_form(&mut self) {
        self.form = WatchForm {
            access_type: self.settings.default_access_type,
            data_type: self.settings.default_data_type,
            ..WatchForm::default()
        };
        self.editing = None;
    }

    /// Create a watchpoint from the form, or save the edited condition
    ///
    /// Returns the watchpoint ID, or `None` when the address does not parse
    /// or the edited watchpoint is gone.
    pub fn submit_form(&mut self) -> Option<u32> {
        if let Some(id) = self.editing {
            if !self.manager.set_watchpoint_condition(id, self.form.condition.trim()) {
                self.reset_form();
                return None;
            }
            if !self.form.name.trim().is_empty() {
                self.manager.rename_watchpoint(id, self.form.name.trim());
            }
            self.reset_form();
            return Some(id);
        }

        let Some(address) = parse_address(&self.form.address) else {
            tracing::warn!("Watch address '{}' is not a number", self.form.address);
            return None;
        };
        let address = self
            .architecture
            .map(|arch| address & arch.address_mask())
            .unwrap_or(address);

        let mut request = WatchpointRequest::new(address, self.form.data_type, self.form.access_type)
            .named(self.form.name.trim())
            .with_condition(self.form.condition.trim());
        if let Some(arch) = self.architecture {
            request = request.for_architecture(arch);
        }

        let id = self.manager.add_watchpoint(request);
        self.reset_form();
        Some(id)
    }

    /// Load watchpoint `id` into the form for editing
    pub fn begin_edit(&mut self, id: u32) -> bool {
        let Some(wp) = self.manager.get_watchpoint(id) else {
            return false;
        };
        let digits = wp.architecture.map(|a| a.address_digits()).unwrap_or(8);
        self.form = WatchForm {
            address: format!("0x{:0width$X}", wp.address, width = digits),
            name: wp.name,
            access_type: wp.access_type,
            data_type: wp.data_type,
            condition: wp.condition,
        };
        self.editing = Some(id);
        true
    }

    pub fn editing(&self) -> Option<u32> {
        self.editing
    }

    pub fn cancel_edit(&mut self) {
        self.reset_form();
    }

    pub fn remove_watchpoint(&mut self, id: u32) -> bool {
        if self.editing == Some(id) {
            self.reset_form();
        }
        self.manager.remove_watchpoint(id)
    }

    pub fn enable_watchpoint(&self, id: u32, enabled: bool) -> bool {
        self.manager.enable_watchpoint(id, enabled)
    }

    pub fn set_watchpoint_condition(&self, id: u32, condition: &str) -> bool {
        self.manager.set_watchpoint_condition(id, condition)
    }

    pub fn clear_all_watchpoints(&mut self) {
        self.reset_form();
        self.manager.clear_all_watchpoints();
    }

    pub fn get_all_watchpoints(&self) -> Vec<Watchpoint> {
        self.manager.get_all_watchpoints()
    }

    /// Watchpoints shown under the current architecture filter
    pub fn visible_watchpoints(&self) -> Vec<Watchpoint> {
        let all = self.manager.get_all_watchpoints();
        if self.settings.show_all_architectures {
            return all;
        }
        all.into_iter()
            .filter(|wp| match (wp.architecture, self.architecture) {
                (Some(watched), Some(current)) => watched == current,
                _ => true,
            })
            .collect()
    }

    pub fn format_access_type(access_type: AccessType) -> &'static str {
        match access_type {
            AccessType::Read => "Read",
            AccessType::Write => "Write",
            AccessType::ReadWrite => "Read/Write",
        }
    }

    pub fn format_data_type(data_type: DataType) -> &'static str {
        data_type.label()
    }

    /// `0x` hex padded to the data type's width
    pub fn format_value(value: u64, data_type: DataType) -> String {
        format!(
            "0x{:0width$X}",
            value & data_type.mask(),
            width = (data_type.size() * 2) as usize
        )
    }

    pub fn save_settings(&self) -> String {
        serde_json::to_string(&self.settings).unwrap_or_default()
    }

    /// Apply JSON settings; unknown or broken input leaves them unchanged
    pub fn load_settings(&mut self, json: &str) -> bool {
        match serde_json::from_str::<WatchViewerSettings>(json) {
            Ok(settings) => {
                self.settings = settings;
                true
            }
            Err(e) => {
                tracing::warn!("Ignoring watch view settings: {}", e);
                false
            }
        }
    }

    pub fn render(&self, canvas: &mut dyn Canvas, rect: Rect) {
        let watchpoints = self.visible_watchpoints();
        let body = render::panel(canvas, rect, &format!("Watch ({})", watchpoints.len()));
        let line = canvas.line_height();

        if watchpoints.is_empty() {
            canvas.draw_text(body.x, body.y, "No watchpoints", Color::DIM);
            return;
        }

        for (row, wp) in watchpoints.iter().take(body.rows(line)).enumerate() {
            let digits = wp.architecture.map(|a| a.address_digits()).unwrap_or(8);
            let mut text = format!(
                "{:<12} ${:0width$X} {:<2} {}",
                wp.name,
                wp.address,
                wp.access_type.label(),
                Self::format_value(wp.current_value, wp.data_type),
                width = digits
            );
            if !wp.condition.is_empty() {
                text.push_str(&format!(" if {}", wp.condition));
            }

            let color = if !wp.enabled {
                Color::DISABLED
            } else if wp.has_triggered {
                Color::BREAKPOINT
            } else if self.settings.highlight_changes && wp.value_changed() {
                Color::CHANGED
            } else {
                Color::TEXT
            };
            canvas.draw_text(body.x, body.row_y(row, line), &text, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DrawList;

    fn viewer() -> WatchViewer {
        WatchViewer::new(Arc::new(WatchpointManager::new()))
    }

    #[test]
    fn test_submit_form() {
        let mut viewer = viewer();
        viewer.set_architecture(Architecture::Z80);
        {
            let form = viewer.form_mut();
            form.address = "$C000".to_string();
            form.data_type = DataType::Word;
            form.condition = "$value > 10".to_string();
        }
        let id = viewer.submit_form().unwrap();
        let wp = viewer.manager().get_watchpoint(id).unwrap();
        assert_eq!(wp.address, 0xC000);
        assert_eq!(wp.size, 2);
        assert_eq!(wp.access_type, AccessType::Write);
        assert_eq!(wp.architecture, Some(Architecture::Z80));
        assert_eq!(wp.name, format!("Watchpoint {}", id));
        assert_eq!(viewer.form(), &WatchForm::default());
    }

    #[test]
    fn test_bad_address_keeps_form() {
        let mut viewer = viewer();
        viewer.form_mut().address = "xyz!".to_string();
        assert!(viewer.submit_form().is_none());
        assert_eq!(viewer.form().address, "xyz!");
        assert_eq!(viewer.get_all_watchpoints().len(), 0);
    }

    #[test]
    fn test_edit_session_saves_condition() {
        let mut viewer = viewer();
        viewer.form_mut().address = "0x1000".to_string();
        viewer.form_mut().name = "counter".to_string();
        let id = viewer.submit_form().unwrap();

        assert!(viewer.begin_edit(id));
        assert_eq!(viewer.form().name, "counter");
        assert_eq!(viewer.form().address, "0x00001000");
        viewer.form_mut().condition = "$value == 3".to_string();
        assert_eq!(viewer.submit_form(), Some(id));
        assert_eq!(viewer.manager().get_watchpoint(id).unwrap().condition, "$value == 3");
        assert_eq!(viewer.get_all_watchpoints().len(), 1);
        assert!(viewer.editing().is_none());

        assert!(!viewer.begin_edit(999));
    }

    #[test]
    fn test_architecture_filter() {
        let manager = Arc::new(WatchpointManager::new());
        manager.add_watchpoint(WatchpointRequest::new(0x10, DataType::Byte, AccessType::Read).for_architecture(Architecture::Z80));
        manager.add_watchpoint(WatchpointRequest::new(0x20, DataType::Byte, AccessType::Read).for_architecture(Architecture::M68K));
        manager.add_watchpoint(WatchpointRequest::new(0x30, DataType::Byte, AccessType::Read));

        let mut viewer = WatchViewer::new(manager);
        viewer.set_architecture(Architecture::Z80);
        let visible: Vec<u32> = viewer.visible_watchpoints().iter().map(|wp| wp.address).collect();
        assert_eq!(visible, vec![0x10, 0x30]);

        viewer.set_show_all_architectures(true);
        assert_eq!(viewer.visible_watchpoints().len(), 3);
    }

    #[test]
    fn test_pass_throughs() {
        let mut viewer = viewer();
        viewer.form_mut().address = "100".to_string();
        let id = viewer.submit_form().unwrap();
        assert!(viewer.enable_watchpoint(id, false));
        assert!(!viewer.manager().get_watchpoint(id).unwrap().enabled);
        assert!(viewer.set_watchpoint_condition(id, "1"));
        assert!(viewer.remove_watchpoint(id));
        assert!(!viewer.remove_watchpoint(id));

        viewer.form_mut().address = "0x10".to_string();
        viewer.submit_form();
        viewer.clear_all_watchpoints();
        assert!(viewer.get_all_watchpoints().is_empty());
    }

    #[test]
    fn test_formatting() {
        assert_eq!(WatchViewer::format_access_type(AccessType::ReadWrite), "Read/Write");
        assert_eq!(WatchViewer::format_data_type(DataType::DWord), "DWord");
        assert_eq!(WatchViewer::format_value(0xAB, DataType::Byte), "0xAB");
        assert_eq!(WatchViewer::format_value(0x1FF, DataType::Byte), "0xFF");
        assert_eq!(WatchViewer::format_value(0x12, DataType::DWord), "0x00000012");
        assert_eq!(WatchViewer::format_value(1, DataType::QWord).len(), 18);
    }

    #[test]
    fn test_settings_round_trip() {
        let mut viewer = viewer();
        viewer.set_show_all_architectures(true);
        viewer.set_highlight_changes(false);
        let json = viewer.save_settings();

        let mut other = self::viewer();
        assert!(other.load_settings(&json));
        assert!(other.show_all_architectures());
        assert!(!other.highlight_changes());
        assert!(!other.load_settings("[1, 2"));
        assert!(other.show_all_architectures());
        // Missing fields fall back to defaults
        assert!(other.load_settings("{}"));
        assert!(other.highlight_changes());
    }

    #[test]
    fn test_render() {
        let mut viewer = viewer();
        let mut canvas = DrawList::new();
        viewer.render(&mut canvas, Rect::new(0.0, 0.0, 300.0, 200.0));
        assert!(canvas.contains_text("No watchpoints"));

        viewer.form_mut().address = "0x40".to_string();
        viewer.form_mut().name = "lives".to_string();
        viewer.form_mut().condition = "$value == 0".to_string();
        let id = viewer.submit_form().unwrap();
        viewer.manager().check_memory_write(0x40, 0, 1, None);

        let mut canvas = DrawList::new();
        viewer.render(&mut canvas, Rect::new(0.0, 0.0, 300.0, 200.0));
        assert!(canvas.contains_text("Watch (1)"));
        assert_eq!(canvas.text_color("lives"), Some(Color::BREAKPOINT));
        assert!(canvas.contains_text("if $value == 0"));

        viewer.manager().clear_triggered();
        viewer.enable_watchpoint(id, false);
        let mut canvas = DrawList::new();
        viewer.render(&mut canvas, Rect::new(0.0, 0.0, 300.0, 200.0));
        assert_eq!(canvas.text_color("lives"), Some(Color::DISABLED));
    }
}

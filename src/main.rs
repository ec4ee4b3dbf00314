//! 程序入口：读取配置、初始化日志、加载 Slint UI，并绑定 VM 回调

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use anyhow::Context;
use slint::{ComponentHandle, ModelRc, VecModel};

use novel_xml_editor::model::data_core::{AppError, EditorState};
use novel_xml_editor::model::shadow_tree::{FlatRow, RowContent, RowId};
use novel_xml_editor::utils::config::{EditorConfig, CONFIG_FILE_NAME};
use novel_xml_editor::utils::logging::{init_logging, with_bootstrap_logging};
use novel_xml_editor::vm::bridge::*;

slint::include_modules!();

// TreeRowData转换实现
impl From<&FlatRow> for TreeRowData {
    /// 将Rust FlatRow转换为Slint可用的数据结构
    fn from(row: &FlatRow) -> Self {
        Self {
            id: row.id as i32,
            label: row.label.clone().into(),
            kind: format!("{:?}", row.kind).into(), // Element/Attribute/Text
            depth: row.depth as i32,
            has_children: row.has_children,
            expanded: row.expanded,
        }
    }
}

fn row_id(id: i32) -> Option<RowId> {
    RowId::try_from(id).ok()
}

/// VM桥接器：管理UI与数据层的交互
struct ViewModelBridge {
    state: Rc<RefCell<EditorState>>,
}

impl ViewModelBridge {
    /// 创建新的VM桥接器并绑定所有回调
    fn new(app_window: &AppWindow, state: Rc<RefCell<EditorState>>) -> Self {
        let bridge = Self { state };
        bridge.setup_callbacks(app_window);
        bridge
    }

    /// 设置所有UI回调函数
    fn setup_callbacks(&self, app_window: &AppWindow) {
        let state = self.state.clone();

        // === 新建 / 打开 / 保存 ===
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_new_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_new_file(&app_window, &state);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_open_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_open_file(&app_window, &state);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_save_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_save_file(&app_window, &state, false);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_save_file_as(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_save_file(&app_window, &state, true);
                }
            });
        }

        // === 节点增删 ===
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_add_node(move |name, attribute| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_add_node(&app_window, &state, &name, &attribute);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_remove_node(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_remove_node(&app_window, &state);
                }
            });
        }

        // === 树选择与展开 ===
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_row_selected(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_row_selected(&app_window, &state, id);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_toggle_row(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_toggle_row(&app_window, &state, id);
                }
            });
        }

        // === 显示树编辑（保存时回写） ===
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_apply_edit(move |id, name, value| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_apply_edit(&app_window, &state, id, &name, &value);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_add_attribute(move |id, input| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_add_attribute(&app_window, &state, id, &input);
                }
            });
        }
        {
            let state = state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_remove_row(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_remove_row(&app_window, &state, id);
                }
            });
        }

        // === 消息对话框回调 ===
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_show_message_dialog(move |title, text| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_message_dialog_title(title);
                    app_window.set_message_dialog_text(text);
                    app_window.set_message_dialog_visible(true);
                }
            });
        }
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_close_message_dialog(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_message_dialog_visible(false);
                }
            });
        }
    }

    /// 初始化UI状态
    fn initialize_ui(&self, app_window: &AppWindow) {
        app_window.set_status_message(STATUS_READY.into());
        app_window.set_current_path("".into());
        app_window.set_selected_row(-1);
        app_window.set_selected_kind("".into());

        // 设置空的树模型
        let empty_model = ModelRc::new(VecModel::<TreeRowData>::default());
        app_window.set_tree_model(empty_model);
    }

    /// 用当前状态刷新树模型与编辑区
    fn refresh_view(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>) {
        let state = state.borrow();

        let tree_data: Vec<TreeRowData> = state.visible_rows().iter().map(TreeRowData::from).collect();
        app_window.set_tree_model(ModelRc::new(VecModel::from(tree_data)));

        let path_str = state
            .source_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "（未保存的新文档）".to_string());
        app_window.set_current_path(path_str.into());
        app_window.set_dirty(state.is_dirty());

        let selected = state.selected().and_then(|id| state.tree().row(id));
        let Some(row) = selected else {
            app_window.set_selected_row(-1);
            app_window.set_selected_kind("".into());
            app_window.set_edit_name("".into());
            app_window.set_edit_value("".into());
            return;
        };
        app_window.set_selected_row(row.id as i32);
        app_window.set_selected_kind(format!("{:?}", row.kind()).into());
        let (name, value) = match &row.content {
            // 显示树中的待保存文本
            RowContent::Element { tag, .. } => {
                (tag.clone(), row.text_value().unwrap_or_default().to_string())
            }
            RowContent::Attribute { name, value } => (name.clone(), value.clone()),
            RowContent::Text { value } => (String::new(), value.clone()),
        };
        app_window.set_edit_name(name.into());
        app_window.set_edit_value(value.into());
    }

    /// 状态栏与对话框中显示错误
    fn report_error(app_window: &AppWindow, action: &str, err: &AppError) {
        tracing::error!("{}失败: {}", action, err);
        let message = user_message(err);
        app_window.set_status_message(format!("{}{}失败", STATUS_ERROR_PREFIX, action).into());
        app_window.invoke_show_message_dialog(dialog_title(err).into(), message.into());
    }

    /// 有未保存修改时询问是否放弃
    fn confirm_discard(state: &Rc<RefCell<EditorState>>) -> bool {
        if !state.borrow().is_dirty() {
            return true;
        }
        let answer = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("未保存的修改")
            .set_description("当前文档有未保存的修改，确定放弃吗？")
            .set_buttons(rfd::MessageButtons::YesNo)
            .show();
        answer == rfd::MessageDialogResult::Yes
    }

    /// 显示打开文件对话框
    fn show_open_dialog() -> Option<PathBuf> {
        let file_path = rfd::FileDialog::new()
            .add_filter("XML文件", &["xml"])
            .add_filter("所有文件", &["*"])
            .set_title("选择要编辑的场景文件")
            .pick_file();

        match file_path {
            Some(path) => {
                tracing::info!("用户选择了文件: {}", path.display());
                Some(path)
            }
            None => {
                tracing::info!("用户取消了文件选择");
                None
            }
        }
    }

    fn show_save_dialog() -> Option<PathBuf> {
        rfd::FileDialog::new()
            .add_filter("XML文件", &["xml"])
            .set_title("另存为")
            .set_file_name("scene.xml")
            .save_file()
    }

    fn handle_new_file(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>) {
        if !Self::confirm_discard(state) {
            return;
        }
        let result = state.borrow_mut().new_document();
        match result {
            Ok(()) => {
                Self::refresh_view(app_window, state);
                app_window.set_status_message(STATUS_CREATED.into());
            }
            Err(e) => Self::report_error(app_window, "新建文档", &e),
        }
    }

    fn handle_open_file(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>) {
        if !Self::confirm_discard(state) {
            return;
        }
        let Some(file_path) = Self::show_open_dialog() else {
            app_window.set_status_message(STATUS_NO_FILE_SELECTED.into());
            return;
        };

        app_window.set_status_message(STATUS_LOADING.into());
        let result = state.borrow_mut().load_file(&file_path);
        match result {
            Ok(()) => {
                Self::refresh_view(app_window, state);
                let count = state.borrow().editor().node_count();
                app_window.set_status_message(format!("{}：{} 个元素", STATUS_LOADED, count).into());
            }
            // 加载失败时原文档与显示树保持不变
            Err(e) => Self::report_error(app_window, "打开文件", &e),
        }
    }

    fn handle_save_file(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, save_as: bool) {
        let needs_path = save_as || state.borrow().source_path.is_none();
        let result = if needs_path {
            let Some(path) = Self::show_save_dialog() else {
                app_window.set_status_message(STATUS_NO_FILE_SELECTED.into());
                return;
            };
            state.borrow_mut().save_as(&path)
        } else {
            state.borrow_mut().save()
        };

        match result {
            Ok(report) => {
                Self::refresh_view(app_window, state);
                if report.is_clean() {
                    app_window.set_status_message(STATUS_SAVED.into());
                } else {
                    let msg = format!("{}（{} 条警告）", STATUS_SAVED, report.warnings.len());
                    app_window.set_status_message(msg.into());
                    app_window.invoke_show_message_dialog(
                        DIALOG_TITLE_WARNING.into(),
                        report.warnings.join("\n").into(),
                    );
                }
            }
            Err(e) => Self::report_error(app_window, "保存", &e),
        }
    }

    fn handle_add_node(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, name: &str, attribute: &str) {
        let result = state.borrow_mut().add_node(name, attribute);
        match result {
            Ok(_) => {
                app_window.set_node_name_input("".into());
                app_window.set_node_attribute_input("".into());
                Self::refresh_view(app_window, state);
                app_window.set_status_message(format!("{}: {}", STATUS_NODE_ADDED, name.trim()).into());
            }
            Err(e) => Self::report_error(app_window, "添加节点", &e),
        }
    }

    fn handle_remove_node(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>) {
        let result = state.borrow_mut().remove_selected_node();
        match result {
            Ok(_) => {
                Self::refresh_view(app_window, state);
                app_window.set_status_message(STATUS_NODE_REMOVED.into());
            }
            Err(e) => Self::report_error(app_window, "删除节点", &e),
        }
    }

    fn handle_row_selected(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, id: i32) {
        let Some(id) = row_id(id) else {
            return;
        };
        let result = state.borrow_mut().select(id);
        match result {
            Ok(()) => Self::refresh_view(app_window, state),
            Err(e) => tracing::warn!("选择行失败: {}", e),
        }
    }

    fn handle_toggle_row(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, id: i32) {
        let Some(id) = row_id(id) else {
            return;
        };
        let result = state.borrow_mut().toggle_expanded(id);
        match result {
            Ok(expanded) => {
                Self::refresh_view(app_window, state);
                let action = if expanded { "展开" } else { "折叠" };
                app_window.set_status_message(action.into());
            }
            Err(e) => tracing::warn!("切换展开状态失败: {}", e),
        }
    }

    /// 属性行修改名称与值；元素行或文本行修改文本
    fn handle_apply_edit(
        app_window: &AppWindow,
        state: &Rc<RefCell<EditorState>>,
        id: i32,
        name: &str,
        value: &str,
    ) {
        let Some(id) = row_id(id) else {
            Self::report_error(app_window, "修改", &AppError::NoSelection);
            return;
        };
        let is_attribute = matches!(
            state.borrow().tree().row(id).map(|r| &r.content),
            Some(RowContent::Attribute { .. })
        );
        let result = if is_attribute {
            state.borrow_mut().edit_attribute(id, name.trim(), value.trim())
        } else {
            state.borrow_mut().edit_text(id, value.trim()).map(|_| ())
        };
        match result {
            Ok(()) => {
                Self::refresh_view(app_window, state);
                app_window.set_status_message("已修改（保存时写入文件）".into());
            }
            Err(e) => Self::report_error(app_window, "修改", &e),
        }
    }

    fn handle_add_attribute(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, id: i32, input: &str) {
        let Some(id) = row_id(id) else {
            Self::report_error(app_window, "添加属性", &AppError::NoSelection);
            return;
        };
        let result = state.borrow_mut().add_attribute(id, input);
        match result {
            Ok(_) => {
                app_window.set_attribute_input("".into());
                Self::refresh_view(app_window, state);
                app_window.set_status_message("已添加属性（保存时写入文件）".into());
            }
            Err(e) => Self::report_error(app_window, "添加属性", &e),
        }
    }

    fn handle_remove_row(app_window: &AppWindow, state: &Rc<RefCell<EditorState>>, id: i32) {
        let Some(id) = row_id(id) else {
            return;
        };
        let result = state.borrow_mut().remove_row(id);
        match result {
            Ok(()) => {
                Self::refresh_view(app_window, state);
                app_window.set_status_message("已删除（保存时写入文件）".into());
            }
            Err(e) => Self::report_error(app_window, "删除", &e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // 全局日志级别来自配置，读取配置时先用临时订阅者
    let config = with_bootstrap_logging(|| {
        EditorConfig::load_or_default(std::path::Path::new(CONFIG_FILE_NAME))
    })
    .context("读取配置文件失败")?;
    init_logging(config.max_level()?);

    let app = AppWindow::new().context("UI 初始化失败")?;
    let state = Rc::new(RefCell::new(EditorState::new(config)));

    // 创建VM桥接器并绑定UI回调
    let bridge = ViewModelBridge::new(&app, state.clone());
    bridge.initialize_ui(&app);

    tracing::info!("应用启动成功，UI已初始化");
    app.run()?;
    Ok(())
}

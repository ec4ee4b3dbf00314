fn main() {
    // 仅在启用图形界面时编译 Slint 界面
    #[cfg(feature = "gui")]
    slint_build::compile("ui/app_window.slint").expect("Slint 界面编译失败");
}

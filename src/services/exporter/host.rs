//! 宿主程序矢量导出
//!
//! 生成 ExtendScript，交给宿主图形程序（默认经 osascript 驱动 Illustrator）执行，
//! 由宿主程序把文档保存为 .ai。

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{absolute_path, ensure_parent_dir, DocumentExporter};
use crate::error::ExportError;
use crate::infrastructure::HostExecutor;
use crate::models::{ExportOptions, LayerStack, Origin, Placement};

const ENCODING: &str = "ai";

/// 宿主程序可识别的兼容版本
pub const SUPPORTED_PROFILES: [u16; 14] = [8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 19, 22, 23, 24];
pub const DEFAULT_PROFILE: u16 = 24;

/// 输出路径占位符名称
const OUTPUT_PLACEHOLDER: &str = "output";

pub struct HostScriptExporter {
    executor: Arc<HostExecutor>,
}

impl HostScriptExporter {
    pub fn new(executor: Arc<HostExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl DocumentExporter for HostScriptExporter {
    fn name(&self) -> &'static str {
        ENCODING
    }

    fn extension(&self, _options: &ExportOptions) -> &'static str {
        "ai"
    }

    fn check_options(&self, options: &ExportOptions) -> Result<(), ExportError> {
        check_host_options(options)
    }

    async fn export(
        &self,
        stack: &LayerStack,
        destination: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        let profile = resolve_profile(options)?;
        let parent = ensure_parent_dir(destination)?;

        // 宿主程序写入同目录临时文件，成功后再替换目标
        let output = tempfile::Builder::new()
            .prefix(".layerstack-")
            .suffix(".ai")
            .tempfile_in(parent)
            .map_err(|e| ExportError::write_failed(parent, e))?
            .into_temp_path();

        let script = render_script(stack, &output, options, profile)?;
        debug!(
            "[页面 {}] 交给 {} 执行，{} 个图层",
            stack.page_id(),
            self.executor.program(),
            stack.len()
        );

        let stdout = self
            .executor
            .run_script(&script, &[(OUTPUT_PLACEHOLDER, &*output)])
            .await?;

        if stdout.starts_with("ERROR") {
            return Err(ExportError::HostFailed { message: stdout });
        }

        let written = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(ExportError::HostFailed {
                message: format!("{} 没有写出文档", self.executor.program()),
            });
        }

        output
            .persist(destination)
            .map_err(|e| ExportError::write_failed(destination, e.error))?;
        Ok(())
    }
}

pub(crate) fn check_host_options(options: &ExportOptions) -> Result<(), ExportError> {
    resolve_profile(options).map(|_| ())
}

fn resolve_profile(options: &ExportOptions) -> Result<u16, ExportError> {
    let profile = options.compatibility_profile.unwrap_or(DEFAULT_PROFILE);
    if SUPPORTED_PROFILES.contains(&profile) {
        Ok(profile)
    } else {
        Err(ExportError::unsupported(
            ENCODING,
            format!("compatibility profile {}", profile),
        ))
    }
}

/// 字符串字面量，使用 JSON 转义
fn js_string(raw: &str) -> String {
    serde_json::Value::from(raw).to_string()
}

fn render_script(
    stack: &LayerStack,
    output: &Path,
    options: &ExportOptions,
    profile: u16,
) -> Result<String, ExportError> {
    let size = stack.size();
    let mut js = String::new();

    js.push_str("(function () {\n");
    js.push_str("    var doc = null;\n");
    js.push_str("    try {\n");
    let _ = writeln!(
        js,
        "        doc = app.documents.add(DocumentColorSpace.RGB, {}, {});",
        size.width, size.height
    );
    js.push_str("        var initial = doc.layers[0];\n");

    // doc.layers.add() 总是加在最上层，所以按自下而上的顺序添加
    for layer in stack.layers() {
        let placement = Placement::full_page(layer.extent, Origin::BottomLeft);
        js.push_str("        (function () {\n");
        js.push_str("            var layer = doc.layers.add();\n");
        let _ = writeln!(js, "            layer.name = {};", js_string(&layer.name));
        js.push_str("            var item = layer.placedItems.add();\n");
        let _ = writeln!(
            js,
            "            item.file = new File({});",
            js_string(&absolute_path(layer.source())?.to_string_lossy())
        );
        let _ = writeln!(
            js,
            "            item.position = [{}, {}];",
            placement.x, placement.y
        );
        let _ = writeln!(js, "            item.width = {};", placement.width);
        let _ = writeln!(js, "            item.height = {};", placement.height);
        if options.embed_assets {
            js.push_str("            item.embed();\n");
        }
        js.push_str("        })();\n");
    }

    js.push_str("        initial.remove();\n");
    js.push_str("        var opts = new IllustratorSaveOptions();\n");
    let _ = writeln!(
        js,
        "        opts.compatibility = Compatibility.ILLUSTRATOR{};",
        profile
    );
    let _ = writeln!(js, "        opts.compressed = {};", options.compress);
    let _ = writeln!(js, "        opts.pdfCompatible = {};", options.pdf_compatible);
    let _ = writeln!(js, "        opts.embedLinkedFiles = {};", options.embed_assets);
    let _ = writeln!(
        js,
        "        doc.saveAs(new File({}), opts);",
        js_string(&absolute_path(output)?.to_string_lossy())
    );
    js.push_str("        return \"OK\";\n");
    js.push_str("    } catch (e) {\n");
    js.push_str("        return \"ERROR: \" + e;\n");
    js.push_str("    } finally {\n");
    js.push_str("        if (doc) {\n");
    js.push_str("            doc.close(SaveOptions.DONOTSAVECHANGES);\n");
    js.push_str("        }\n");
    js.push_str("    }\n");
    js.push_str("})();\n");
    Ok(js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::HostConfig;
    use crate::models::{PageId, PageSize, ResolvedLayer};

    fn stack() -> LayerStack {
        let size = PageSize::new(400, 300);
        LayerStack::new(
            PageId::new("12"),
            size,
            vec![
                ResolvedLayer::full_page("sheet_background", "/in/12/sheet_background.png", size),
                ResolvedLayer::full_page("sheet_character", "/in/12/sheet_character.png", size),
            ],
        )
        .unwrap()
    }

    #[test]
    fn script_adds_layers_bottom_first_at_page_top() {
        let script =
            render_script(&stack(), Path::new("/out/12.ai"), &ExportOptions::default(), 24)
                .unwrap();

        let bg = script.find("\"sheet_background\"").unwrap();
        let ch = script.find("\"sheet_character\"").unwrap();
        assert!(bg < ch);
        assert_eq!(script.matches("item.position = [0, 300];").count(), 2);
        assert!(script.contains("Compatibility.ILLUSTRATOR24"));
        assert!(script.contains("opts.pdfCompatible = false;"));
        assert!(script.contains("item.embed();"));
        assert!(script.contains("new File(\"/out/12.ai\")"));
    }

    #[test]
    fn linked_assets_are_not_embedded() {
        let options = ExportOptions {
            embed_assets: false,
            ..ExportOptions::default()
        };
        let script = render_script(&stack(), Path::new("o.ai"), &options, 17).unwrap();
        assert!(!script.contains("embed()"));
        assert!(script.contains("opts.embedLinkedFiles = false;"));
    }

    #[test]
    fn relative_paths_are_resolved_before_reaching_the_host() {
        let size = PageSize::new(10, 10);
        let stack = LayerStack::new(
            PageId::new("3"),
            size,
            vec![ResolvedLayer::full_page(
                "sheet_background",
                "output/3/sheet_background.png",
                size,
            )],
        )
        .unwrap();
        let options = ExportOptions {
            embed_assets: false,
            ..ExportOptions::default()
        };

        let script =
            render_script(&stack, Path::new("ai_output/3.ai"), &options, 24).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let layer = cwd.join("output/3/sheet_background.png");
        let output = cwd.join("ai_output/3.ai");
        assert!(script.contains(&format!("new File({})", js_string(&layer.to_string_lossy()))));
        assert!(script.contains(&format!("new File({})", js_string(&output.to_string_lossy()))));
        assert!(!script.contains("new File(\"output/"));
    }

    #[test]
    fn quotes_in_paths_are_escaped() {
        assert_eq!(js_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let options = ExportOptions {
            compatibility_profile: Some(18),
            ..ExportOptions::default()
        };
        assert_eq!(resolve_profile(&options).unwrap_err().code(), "UnsupportedOption");
        assert_eq!(resolve_profile(&ExportOptions::default()).unwrap(), 24);
    }

    fn fake_host(command: &str) -> HostScriptExporter {
        HostScriptExporter::new(Arc::new(HostExecutor::new(HostConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                command.to_string(),
                "sh".to_string(),
                "{script}".to_string(),
                "{output}".to_string(),
            ],
        })))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn host_output_is_published_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("ai_output").join("12.ai");

        fake_host("cp \"$1\" \"$2\"")
            .export(&stack(), &dest, &ExportOptions::default())
            .await
            .unwrap();

        let written = std::fs::read_to_string(&dest).unwrap();
        assert!(written.contains("doc.layers.add()"));
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_error_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("12.ai");

        let err = fake_host("echo 'ERROR: no document'")
            .export(&stack(), &dest, &ExportOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "HostFailed");
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

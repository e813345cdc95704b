//! SVG 矢量导出
//!
//! 每个图层写成一个 Inkscape 图层组，组内一张铺满页面的置入位图。

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::Url;
use tracing::debug;

use super::{absolute_path, publish_atomically, run_blocking, DocumentExporter};
use crate::error::ExportError;
use crate::models::{ExportOptions, LayerStack, Origin, Placement, ResolvedLayer};

const ENCODING: &str = "svg";

/// SVG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SvgProfile {
    /// SVG 1.1，置入图像使用 `xlink:href`
    V1,
    /// SVG 2，置入图像使用 `href`
    V2,
}

impl SvgProfile {
    fn from_options(options: &ExportOptions) -> Result<Self, ExportError> {
        match options.compatibility_profile {
            None | Some(2) => Ok(SvgProfile::V2),
            Some(1) => Ok(SvgProfile::V1),
            Some(other) => Err(ExportError::unsupported(
                ENCODING,
                format!("compatibility profile {}", other),
            )),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SvgExporter;

#[async_trait]
impl DocumentExporter for SvgExporter {
    fn name(&self) -> &'static str {
        ENCODING
    }

    fn extension(&self, options: &ExportOptions) -> &'static str {
        if options.compress {
            "svgz"
        } else {
            "svg"
        }
    }

    fn check_options(&self, options: &ExportOptions) -> Result<(), ExportError> {
        if options.pdf_compatible {
            return Err(ExportError::unsupported(ENCODING, "pdf-compatible"));
        }
        SvgProfile::from_options(options).map(|_| ())
    }

    async fn export(
        &self,
        stack: &LayerStack,
        destination: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        self.check_options(options)?;
        let profile = SvgProfile::from_options(options)?;

        let stack = stack.clone();
        let destination = destination.to_path_buf();
        let embed = options.embed_assets;
        let compress = options.compress;

        run_blocking(move || {
            let document = render_document(&stack, profile, embed)?;
            debug!(
                "[页面 {}] SVG 文档 {} 字节，压缩: {}",
                stack.page_id(),
                document.len(),
                compress
            );

            publish_atomically(&destination, |w| {
                if compress {
                    let mut gz = GzEncoder::new(w, Compression::default());
                    gz.write_all(document.as_bytes())?;
                    gz.finish()?;
                    Ok(())
                } else {
                    w.write_all(document.as_bytes())
                }
            })
        })
        .await
    }
}

fn render_document(
    stack: &LayerStack,
    profile: SvgProfile,
    embed: bool,
) -> Result<String, ExportError> {
    let size = stack.size();
    let mut out = String::new();

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
    out.push_str("<svg xmlns=\"http://www.w3.org/2000/svg\"");
    if profile == SvgProfile::V1 {
        out.push_str(" version=\"1.1\" xmlns:xlink=\"http://www.w3.org/1999/xlink\"");
    }
    let _ = writeln!(
        out,
        " xmlns:inkscape=\"http://www.inkscape.org/namespaces/inkscape\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = size.width,
        h = size.height
    );

    for (index, layer) in stack.layers().iter().enumerate() {
        let href = layer_href(layer, embed)?;
        let placement = Placement::full_page(layer.extent, Origin::TopLeft);
        let label = escape_xml(&layer.name);
        let href_attr = match profile {
            SvgProfile::V1 => "xlink:href",
            SvgProfile::V2 => "href",
        };

        let _ = writeln!(
            out,
            "  <g id=\"layer{}\" inkscape:groupmode=\"layer\" inkscape:label=\"{}\">",
            index + 1,
            label
        );
        let _ = writeln!(
            out,
            "    <image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"none\" {}=\"{}\"/>",
            placement.x, placement.y, placement.width, placement.height, href_attr, href
        );
        out.push_str("  </g>\n");
    }

    out.push_str("</svg>\n");
    Ok(out)
}

/// 嵌入时返回 data URI，否则返回源文件的 `file://` URI
fn layer_href(layer: &ResolvedLayer, embed: bool) -> Result<String, ExportError> {
    if !embed {
        let path = absolute_path(layer.source())?;
        let url = Url::from_file_path(&path).map_err(|()| ExportError::ReadFailed {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "无法转换为 file URI"),
        })?;
        return Ok(escape_xml(url.as_str()));
    }

    let bytes = std::fs::read(layer.source()).map_err(|source| ExportError::ReadFailed {
        path: layer.source.clone(),
        source,
    })?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(bytes)))
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

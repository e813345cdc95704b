//! PSD 分层位图导出
//!
//! 写出版本 1 的 RGB 8 位 PSD：
//! - 每个图层一条图层记录，四个通道（透明度 + RGB），尺寸与页面一致
//! - 合成图写在文件末尾的图像数据段
//! - 可选 JPEG 缩略图资源（1036）
//!
//! 所有整数都是大端序。

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, RgbImage, RgbaImage};
use tracing::debug;

use super::packbits;
use super::{publish_atomically, run_blocking, DocumentExporter};
use crate::error::ExportError;
use crate::models::{ExportOptions, LayerStack, PageSize, ResolvedLayer};

const ENCODING: &str = "psd";

/// PSD 版本 1 的最大边长
const MAX_SIDE: u32 = 30_000;
const THUMBNAIL_MAX_SIDE: u32 = 160;
const THUMBNAIL_RESOURCE_ID: u16 = 1036;
const THUMBNAIL_QUALITY: u8 = 80;

const COMPRESSION_RAW: u16 = 0;
const COMPRESSION_RLE: u16 = 1;

/// 图层记录中的通道顺序：透明度在前
const LAYER_CHANNELS: [(i16, usize); 4] = [(-1, 3), (0, 0), (1, 1), (2, 2)];

#[derive(Debug, Default, Clone, Copy)]
pub struct PsdExporter;

#[async_trait]
impl DocumentExporter for PsdExporter {
    fn name(&self) -> &'static str {
        ENCODING
    }

    fn extension(&self, _options: &ExportOptions) -> &'static str {
        "psd"
    }

    fn check_options(&self, options: &ExportOptions) -> Result<(), ExportError> {
        if options.pdf_compatible {
            return Err(ExportError::unsupported(ENCODING, "pdf-compatible"));
        }
        match options.compatibility_profile {
            None | Some(1) => Ok(()),
            Some(other) => Err(ExportError::unsupported(
                ENCODING,
                format!("compatibility profile {}", other),
            )),
        }
    }

    async fn export(
        &self,
        stack: &LayerStack,
        destination: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        self.check_options(options)?;

        let size = stack.size();
        if size.width > MAX_SIDE || size.height > MAX_SIDE {
            return Err(ExportError::unsupported(
                ENCODING,
                format!("page size {}x{} (max {})", size.width, size.height, MAX_SIDE),
            ));
        }

        let stack = stack.clone();
        let destination = destination.to_path_buf();
        let compress = options.compress;
        let thumbnail = options.thumbnail;

        run_blocking(move || {
            let layers = stack
                .layers()
                .iter()
                .map(|layer| load_layer(layer, size))
                .collect::<Result<Vec<_>, _>>()?;

            let composite = flatten(&layers, size);
            let thumbnail = if thumbnail {
                Some(encode_thumbnail(&composite).map_err(|source| ExportError::Encode {
                    page: stack.page_id().to_string(),
                    source,
                })?)
            } else {
                None
            };

            let document = encode_document(size, &layers, &composite, compress, thumbnail.as_ref());
            debug!(
                "[页面 {}] PSD {} 个图层，{} 字节",
                stack.page_id(),
                layers.len(),
                document.len()
            );

            publish_atomically(&destination, |w| w.write_all(&document))
        })
        .await
    }
}

struct DecodedLayer {
    name: String,
    pixels: RgbaImage,
}

/// 解码图层，尺寸与页面不一致时拉伸铺满
fn load_layer(layer: &ResolvedLayer, size: PageSize) -> Result<DecodedLayer, ExportError> {
    let pixels = image::open(layer.source())
        .map_err(|source| ExportError::Decode {
            path: layer.source.clone(),
            source,
        })?
        .to_rgba8();

    let pixels = if pixels.dimensions() != (size.width, size.height) {
        debug!(
            "图层 {} 原始尺寸 {}x{}，拉伸到 {}x{}",
            layer.name,
            pixels.width(),
            pixels.height(),
            size.width,
            size.height
        );
        imageops::resize(&pixels, size.width, size.height, FilterType::Triangle)
    } else {
        pixels
    };

    Ok(DecodedLayer {
        name: layer.name.clone(),
        pixels,
    })
}

/// 自下而上合成
fn flatten(layers: &[DecodedLayer], size: PageSize) -> RgbaImage {
    let mut canvas = RgbaImage::new(size.width, size.height);
    for layer in layers {
        imageops::overlay(&mut canvas, &layer.pixels, 0, 0);
    }
    canvas
}

/// 合成图铺在白底上缩小后编码为 JPEG
fn encode_thumbnail(composite: &RgbaImage) -> Result<Thumbnail, image::ImageError> {
    let (width, height) = composite.dimensions();
    let scale = f64::from(THUMBNAIL_MAX_SIDE) / f64::from(width.max(height));
    let scale = scale.min(1.0);
    let tw = ((f64::from(width) * scale).round() as u32).max(1);
    let th = ((f64::from(height) * scale).round() as u32).max(1);

    let on_white = RgbImage::from_fn(width, height, |x, y| {
        let p = composite.get_pixel(x, y);
        let a = u32::from(p[3]);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    });
    let small = imageops::resize(&on_white, tw, th, FilterType::Triangle);

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, THUMBNAIL_QUALITY).encode(
        small.as_raw(),
        tw,
        th,
        ExtendedColorType::Rgb8,
    )?;

    Ok(Thumbnail {
        width: tw,
        height: th,
        jpeg,
    })
}

struct Thumbnail {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

fn encode_document(
    size: PageSize,
    layers: &[DecodedLayer],
    composite: &RgbaImage,
    compress: bool,
    thumbnail: Option<&Thumbnail>,
) -> Vec<u8> {
    let mut out = PsdBuffer::default();

    // 文件头
    out.bytes(b"8BPS");
    out.u16(1);
    out.bytes(&[0; 6]);
    out.u16(4);
    out.u32(size.height);
    out.u32(size.width);
    out.u16(8);
    out.u16(3);

    // 颜色模式数据
    out.u32(0);

    // 图像资源
    let mut resources = PsdBuffer::default();
    if let Some(thumb) = thumbnail {
        write_thumbnail_resource(&mut resources, thumb);
    }
    out.u32(resources.len());
    out.bytes(&resources.0);

    // 图层与蒙版信息
    let layer_info = encode_layer_info(layers, size, compress);
    out.u32(4 + layer_info.len() + 4);
    out.u32(layer_info.len());
    out.bytes(&layer_info.0);
    out.u32(0);

    // 合成图像数据，平面顺序 R G B A
    let planes: Vec<Vec<u8>> = (0..4).map(|c| channel_plane(composite, c)).collect();
    if compress {
        out.u16(COMPRESSION_RLE);
        let rows: Vec<Vec<Vec<u8>>> = planes
            .iter()
            .map(|plane| rle_rows(plane, size.width))
            .collect();
        for row in rows.iter().flatten() {
            out.u16(row.len() as u16);
        }
        for row in rows.iter().flatten() {
            out.bytes(row);
        }
    } else {
        out.u16(COMPRESSION_RAW);
        for plane in &planes {
            out.bytes(plane);
        }
    }

    out.0
}

fn write_thumbnail_resource(out: &mut PsdBuffer, thumb: &Thumbnail) {
    let width_bytes = (thumb.width * 24 + 31) / 32 * 4;

    let mut data = PsdBuffer::default();
    data.u32(1); // kJpegRGB
    data.u32(thumb.width);
    data.u32(thumb.height);
    data.u32(width_bytes);
    data.u32(width_bytes * thumb.height);
    data.u32(thumb.jpeg.len() as u32);
    data.u16(24);
    data.u16(1);
    data.bytes(&thumb.jpeg);

    out.bytes(b"8BIM");
    out.u16(THUMBNAIL_RESOURCE_ID);
    out.bytes(&[0, 0]); // 空名称，补齐到偶数
    out.u32(data.len());
    out.bytes(&data.0);
    out.pad_to(2);
}

fn encode_layer_info(layers: &[DecodedLayer], size: PageSize, compress: bool) -> PsdBuffer {
    let channel_data: Vec<Vec<Vec<u8>>> = layers
        .iter()
        .map(|layer| {
            LAYER_CHANNELS
                .iter()
                .map(|&(_, index)| encode_channel(&channel_plane(&layer.pixels, index), size.width, compress))
                .collect()
        })
        .collect();

    let mut info = PsdBuffer::default();
    // 负数表示第一个透明通道是合成图的透明度
    info.i16(-(layers.len() as i16));

    for (layer, channels) in layers.iter().zip(&channel_data) {
        info.i32(0);
        info.i32(0);
        info.i32(size.height as i32);
        info.i32(size.width as i32);

        info.u16(LAYER_CHANNELS.len() as u16);
        for (&(id, _), data) in LAYER_CHANNELS.iter().zip(channels) {
            info.i16(id);
            info.u32(data.len() as u32);
        }

        info.bytes(b"8BIM");
        info.bytes(b"norm");
        info.bytes(&[255, 0, 0, 0]); // 不透明度、剪贴、可见、填充

        let name = pascal_name(&layer.name);
        info.u32(4 + 4 + name.len() as u32);
        info.u32(0); // 图层蒙版
        info.u32(0); // 混合范围
        info.bytes(&name);
    }

    for data in channel_data.iter().flatten() {
        info.bytes(data);
    }

    info.pad_to(2);
    info
}

/// 图层名：长度前缀，整体补齐到 4 的倍数
fn pascal_name(name: &str) -> Vec<u8> {
    let bytes = &name.as_bytes()[..name.len().min(255)];
    let mut out = Vec::with_capacity(bytes.len() + 4);
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

fn channel_plane(image: &RgbaImage, index: usize) -> Vec<u8> {
    image.pixels().map(|p| p[index]).collect()
}

fn rle_rows(plane: &[u8], width: u32) -> Vec<Vec<u8>> {
    plane
        .chunks(width as usize)
        .map(|row| {
            let mut encoded = Vec::new();
            packbits::encode_row(row, &mut encoded);
            encoded
        })
        .collect()
}

/// 单个图层通道：压缩方式 + 数据
fn encode_channel(plane: &[u8], width: u32, compress: bool) -> Vec<u8> {
    let mut out = PsdBuffer::default();
    if compress {
        let rows = rle_rows(plane, width);
        out.u16(COMPRESSION_RLE);
        for row in &rows {
            out.u16(row.len() as u16);
        }
        for row in &rows {
            out.bytes(row);
        }
    } else {
        out.u16(COMPRESSION_RAW);
        out.bytes(plane);
    }
    out.0
}

#[derive(Default)]
struct PsdBuffer(Vec<u8>);

impl PsdBuffer {
    fn len(&self) -> u32 {
        self.0.len() as u32
    }

    fn bytes(&mut self, data: &[u8]) {
        self.0.extend_from_slice(data);
    }

    fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn pad_to(&mut self, multiple: usize) {
        while self.0.len() % multiple != 0 {
            self.0.push(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageId;
    use image::Rgba;

    fn be16(b: &[u8], at: usize) -> u16 {
        u16::from_be_bytes([b[at], b[at + 1]])
    }

    fn be32(b: &[u8], at: usize) -> u32 {
        u32::from_be_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
    }

    /// 返回 (图像资源段, 合成图像数据段)
    fn sections(b: &[u8]) -> (&[u8], &[u8]) {
        let mut at = 26;
        at += 4 + be32(b, at) as usize;
        let res_len = be32(b, at) as usize;
        let resources = &b[at + 4..at + 4 + res_len];
        at += 4 + res_len;
        at += 4 + be32(b, at) as usize;
        (resources, &b[at..])
    }

    fn write_layer(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 4]) -> ResolvedLayer {
        let path = dir.join(format!("{}.png", name));
        RgbaImage::from_pixel(w, h, Rgba(color)).save(&path).unwrap();
        ResolvedLayer::full_page(name, path, PageSize::new(3, 2))
    }

    fn stack(dir: &Path) -> LayerStack {
        let layers = vec![
            write_layer(dir, "sheet_background", 3, 2, [255, 0, 0, 255]),
            write_layer(dir, "sheet_character", 3, 2, [0, 0, 255, 255]),
        ];
        LayerStack::new(PageId::new("1"), PageSize::new(3, 2), layers).unwrap()
    }

    fn options(compress: bool, thumbnail: bool) -> ExportOptions {
        ExportOptions {
            compress,
            thumbnail,
            ..ExportOptions::default()
        }
    }

    #[tokio::test]
    async fn header_and_layer_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.psd");
        PsdExporter
            .export(&stack(dir.path()), &dest, &options(false, false))
            .await
            .unwrap();

        let b = std::fs::read(&dest).unwrap();
        assert_eq!(&b[0..4], b"8BPS");
        assert_eq!(be16(&b, 4), 1);
        assert_eq!(be16(&b, 12), 4);
        assert_eq!(be32(&b, 14), 2);
        assert_eq!(be32(&b, 18), 3);
        assert_eq!(be16(&b, 22), 8);
        assert_eq!(be16(&b, 24), 3);

        let find = |needle: &[u8]| b.windows(needle.len()).position(|w| w == needle).unwrap();
        assert!(find(b"sheet_background") < find(b"sheet_character"));
    }

    #[tokio::test]
    async fn raw_composite_has_top_layer_on_top() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.psd");
        PsdExporter
            .export(&stack(dir.path()), &dest, &options(false, false))
            .await
            .unwrap();

        let b = std::fs::read(&dest).unwrap();
        let (resources, merged) = sections(&b);
        assert!(resources.is_empty());
        assert_eq!(be16(merged, 0), COMPRESSION_RAW);

        let planes = &merged[2..];
        assert_eq!(planes.len(), 4 * 6);
        assert!(planes[0..6].iter().all(|&v| v == 0)); // R
        assert!(planes[12..18].iter().all(|&v| v == 255)); // B
        assert!(planes[18..24].iter().all(|&v| v == 255)); // A
    }

    #[tokio::test]
    async fn rle_composite_decodes_and_thumbnail_is_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("1.psd");
        PsdExporter
            .export(&stack(dir.path()), &dest, &options(true, true))
            .await
            .unwrap();

        let b = std::fs::read(&dest).unwrap();
        let (resources, merged) = sections(&b);

        assert_eq!(&resources[0..4], b"8BIM");
        assert_eq!(be16(resources, 4), THUMBNAIL_RESOURCE_ID);
        assert_eq!(&resources[8 + 4 + 28..8 + 4 + 30], &[0xFF, 0xD8]);

        assert_eq!(be16(merged, 0), COMPRESSION_RLE);
        let rows = 4 * 2;
        let counts: Vec<usize> = (0..rows).map(|i| be16(merged, 2 + i * 2) as usize).collect();
        let mut at = 2 + rows * 2;
        let mut decoded = Vec::new();
        for len in counts {
            decoded.extend(packbits::decode(&merged[at..at + len]));
            at += len;
        }
        assert_eq!(at, merged.len());
        assert_eq!(&decoded[12..18], &[255; 6]);
        assert_eq!(&decoded[0..6], &[0; 6]);
    }

    #[test]
    fn mismatched_layer_is_stretched_to_page() {
        let dir = tempfile::tempdir().unwrap();
        let layer = write_layer(dir.path(), "sheet_glare", 6, 5, [9, 9, 9, 128]);
        let decoded = load_layer(&layer, PageSize::new(3, 2)).unwrap();
        assert_eq!(decoded.pixels.dimensions(), (3, 2));
    }

    #[test]
    fn corrupt_layer_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet_logos.png");
        std::fs::write(&path, b"garbage").unwrap();
        let layer = ResolvedLayer::full_page("sheet_logos", path, PageSize::new(3, 2));
        let err = load_layer(&layer, PageSize::new(3, 2)).err().unwrap();
        assert_eq!(err.code(), "DecodeFailed");
    }

    #[test]
    fn rejects_unknown_profile() {
        let opts = ExportOptions {
            compatibility_profile: Some(2),
            ..ExportOptions::default()
        };
        assert_eq!(PsdExporter.check_options(&opts).unwrap_err().code(), "UnsupportedOption");
    }

    #[test]
    fn layer_names_are_padded_to_four() {
        assert_eq!(pascal_name("abc"), vec![3, b'a', b'b', b'c']);
        assert_eq!(pascal_name("sheet_logos").len(), 12);
        assert_eq!(pascal_name("ab").len(), 4);
    }
}

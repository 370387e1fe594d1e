//! Captured render output: view forests and the raster image.
//!
//! Serialization emits each node's attributes before its children, children
//! in engine order. Snapshot diffing depends on that order.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::engine::{EngineCapture, RawView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixelFormat {
    /// 8 bits per channel, red first, non-premultiplied alpha
    Rgba8888,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
        }
    }
}

/// A raster buffer with an explicit pixel format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    #[serde(serialize_with = "serialize_base64")]
    pub pixels: Vec<u8>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

impl RasterImage {
    /// An image filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 4);
        for _ in 0..len {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgba8888,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        let p = self.pixels.get(i..i + bpp)?;
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Fill the rectangle `[left, right) x [top, bottom)`, clipped to the image.
    pub fn fill_rect(&mut self, left: i32, top: i32, right: i32, bottom: i32, rgba: [u8; 4]) {
        let clamp_x = |v: i32| v.clamp(0, self.width as i32) as usize;
        let clamp_y = |v: i32| v.clamp(0, self.height as i32) as usize;
        let (x0, x1, y0, y1) = (clamp_x(left), clamp_x(right), clamp_y(top), clamp_y(bottom));
        let bpp = self.format.bytes_per_pixel();
        let stride = self.width as usize * bpp;
        for y in y0..y1 {
            for x in x0..x1 {
                let i = y * stride + x * bpp;
                self.pixels[i..i + bpp].copy_from_slice(&rgba);
            }
        }
    }

    /// Hex SHA-256 over dimensions, format and pixels; stable across runs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update([self.format.bytes_per_pixel() as u8]);
        hasher.update(&self.pixels);
        hex::encode(hasher.finalize())
    }
}

/// One captured view. Unmeasured geometry is reported as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewNode {
    #[serde(rename = "type")]
    pub type_name: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub baseline: i32,
    pub left_margin: i32,
    pub top_margin: i32,
    pub right_margin: i32,
    pub bottom_margin: i32,
    pub children: Vec<ViewNode>,
}

fn measured(v: i32) -> i32 {
    if v == RawView::UNMEASURED {
        0
    } else {
        v
    }
}

impl ViewNode {
    pub fn from_raw(raw: &RawView) -> Self {
        Self {
            type_name: raw.class_name.clone(),
            left: measured(raw.left),
            top: measured(raw.top),
            right: measured(raw.right),
            bottom: measured(raw.bottom),
            baseline: measured(raw.baseline),
            left_margin: measured(raw.left_margin),
            top_margin: measured(raw.top_margin),
            right_margin: measured(raw.right_margin),
            bottom_margin: measured(raw.bottom_margin),
            children: raw.children.iter().map(ViewNode::from_raw).collect(),
        }
    }

    pub fn geometry(&self) -> [i32; 9] {
        [
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.baseline,
            self.left_margin,
            self.top_margin,
            self.right_margin,
            self.bottom_margin,
        ]
    }

    /// Depth-first pre-order traversal starting at this node.
    pub fn walk(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

/// Pre-order iterator over a view forest.
pub struct PreOrder<'a> {
    stack: Vec<&'a ViewNode>,
}

impl<'a> PreOrder<'a> {
    pub fn forest(roots: &'a [ViewNode]) -> Self {
        Self {
            stack: roots.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a ViewNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The immutable result of one successful render call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderData {
    pub system_views: Vec<ViewNode>,
    pub root_views: Vec<ViewNode>,
    pub image: RasterImage,
}

impl RenderData {
    pub fn from_capture(capture: EngineCapture) -> Self {
        Self {
            system_views: capture.system_views.iter().map(ViewNode::from_raw).collect(),
            root_views: capture.root_views.iter().map(ViewNode::from_raw).collect(),
            image: capture.image,
        }
    }

    /// Every captured node, system forest first, each in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &ViewNode> {
        PreOrder::forest(&self.system_views).chain(PreOrder::forest(&self.root_views))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

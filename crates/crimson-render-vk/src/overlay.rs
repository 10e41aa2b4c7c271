// SPDX-License-Identifier: CEPL-1.0
//! The UI layer drawn on top of each frame, inside the already-open
//! render pass.
//!
//! [`FrameTimingOverlay`] is the built-in implementation: a frame-time
//! readout (FPS and average ms/frame as seven-segment digits, plus a bar
//! graph of recent frames) emitted as `vkCmdClearAttachments` rectangles, so
//! it needs no pipeline, shaders or descriptors.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ash::vk;
use tracing::{debug, info};

use crate::device::DeviceContext;
use crate::error::Result;

/// Handles an overlay needs to build GPU resources compatible with the
/// current render pass.
pub struct OverlayInit<'a> {
    pub device: &'a DeviceContext,
    pub render_pass: vk::RenderPass,
    pub image_count: usize,
    /// Shared pool for overlays that bind textures or samplers. Running it
    /// dry is fatal ([`RenderError::ResourcePoolExhausted`]).
    ///
    /// [`RenderError::ResourcePoolExhausted`]: crate::RenderError::ResourcePoolExhausted
    pub descriptor_pool: vk::DescriptorPool,
}

/// Where the overlay records this frame.
#[derive(Clone, Copy, Debug)]
pub struct OverlayTarget {
    pub command_buffer: vk::CommandBuffer,
    pub extent: vk::Extent2D,
    pub image_index: u32,
}

pub trait Overlay {
    fn initialize(&mut self, init: &OverlayInit<'_>) -> Result<()>;

    /// The swapchain (and render pass) was rebuilt.
    fn rebuild(&mut self, _render_pass: vk::RenderPass, _image_count: usize) -> Result<()> {
        Ok(())
    }

    /// Build this frame's UI description.
    fn begin_frame_content(&mut self);

    /// Emit commands into the currently bound render pass.
    fn record_into(&mut self, target: &OverlayTarget);

    fn shutdown(&mut self);
}

const HISTORY: usize = 120;

/// Rolling frame-time statistics over the last [`HISTORY`] frames.
#[derive(Debug)]
pub struct FrameClock {
    samples: VecDeque<Duration>,
    last: Option<Instant>,
    window_start: Option<Instant>,
    window_frames: u32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY),
            last: None,
            window_start: None,
            window_frames: 0,
        }
    }
}

impl FrameClock {
    /// Records the time since the previous tick. Returns the frame count of
    /// the last full second whenever one elapses.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        if let Some(last) = self.last {
            self.push(now.saturating_duration_since(last));
        }
        self.last = Some(now);

        self.window_frames += 1;
        let start = *self.window_start.get_or_insert(now);
        if now.saturating_duration_since(start) >= Duration::from_secs(1) {
            let frames = self.window_frames;
            self.window_frames = 0;
            self.window_start = Some(now);
            return Some(frames);
        }
        None
    }

    pub fn push(&mut self, frame_time: Duration) {
        if self.samples.len() == HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(frame_time);
    }

    pub fn average_ms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        total.as_secs_f32() * 1000.0 / self.samples.len() as f32
    }

    pub fn fps(&self) -> f32 {
        let ms = self.average_ms();
        if ms <= 0.0 {
            0.0
        } else {
            1000.0 / ms
        }
    }

    pub fn history(&self) -> impl Iterator<Item = Duration> + '_ {
        self.samples.iter().copied()
    }
}

// segments a..g in bits 0..6
const DIGIT_SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];

fn rect(x: i32, y: i32, w: u32, h: u32) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x, y },
        extent: vk::Extent2D {
            width: w,
            height: h,
        },
    }
}

/// Seven-segment glyph `digit` with its top-left at (x, y). A glyph is
/// `4 * scale` wide and `7 * scale` tall.
pub fn digit_rects(digit: u8, x: i32, y: i32, scale: u32) -> Vec<vk::Rect2D> {
    let Some(&mask) = DIGIT_SEGMENTS.get(digit as usize) else {
        return Vec::new();
    };
    let s = scale as i32;
    let (w, t, half) = (4 * scale, scale, 4 * scale);
    let segments = [
        rect(x, y, w, t),                    // a
        rect(x + 3 * s, y, t, half),         // b
        rect(x + 3 * s, y + 3 * s, t, half), // c
        rect(x, y + 6 * s, w, t),            // d
        rect(x, y + 3 * s, t, half),         // e
        rect(x, y, t, half),                 // f
        rect(x, y + 3 * s, w, t),            // g
    ];
    segments
        .into_iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, r)| r)
        .collect()
}

/// Lays out digits and '.'; anything else advances like a space.
pub fn text_rects(text: &str, x: i32, y: i32, scale: u32) -> Vec<vk::Rect2D> {
    let s = scale as i32;
    let mut out = Vec::new();
    let mut pen = x;
    for ch in text.chars() {
        match ch {
            '0'..='9' => {
                out.extend(digit_rects(ch as u8 - b'0', pen, y, scale));
                pen += 5 * s;
            }
            '.' => {
                out.push(rect(pen, y + 6 * s, scale, scale));
                pen += 2 * s;
            }
            _ => pen += 5 * s,
        }
    }
    out
}

/// Intersects with `[0, extent)`; `None` when nothing is left.
pub fn clip(r: vk::Rect2D, extent: vk::Extent2D) -> Option<vk::Rect2D> {
    let x0 = r.offset.x.max(0) as i64;
    let y0 = r.offset.y.max(0) as i64;
    let x1 = (r.offset.x as i64 + r.extent.width as i64).min(extent.width as i64);
    let y1 = (r.offset.y as i64 + r.extent.height as i64).min(extent.height as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(rect(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
}

const MARGIN: i32 = 8;
const PAD: i32 = 6;
const SCALE: u32 = 3;
const BAR_WIDTH: u32 = 2;
const BAR_MAX_HEIGHT: u32 = 40;
/// Frames at or above this time draw a full-height bar.
const BAR_CEILING_MS: f32 = 33.3;

#[derive(Debug, Default, PartialEq)]
pub struct OverlayLayout {
    pub panel: Vec<vk::Rect2D>,
    pub text: Vec<vk::Rect2D>,
    pub bars: Vec<vk::Rect2D>,
}

impl OverlayLayout {
    /// Panel in the top-left corner: FPS on the first line, ms/frame on the
    /// second, bar graph below. Everything is clipped to `extent`.
    pub fn compute(clock: &FrameClock, extent: vk::Extent2D) -> Self {
        let s = SCALE as i32;
        let line_h = 7 * s;
        let text_x = MARGIN + PAD;
        let fps_y = MARGIN + PAD;
        let ms_y = fps_y + line_h + PAD;
        let bars_top = ms_y + line_h + PAD;
        let bars_bottom = bars_top + BAR_MAX_HEIGHT as i32;

        let mut text = text_rects(&format!("{:.0}", clock.fps()), text_x, fps_y, SCALE);
        text.extend(text_rects(&format!("{:.1}", clock.average_ms()), text_x, ms_y, SCALE));

        let bars: Vec<_> = clock
            .history()
            .enumerate()
            .map(|(i, dt)| {
                let ms = dt.as_secs_f32() * 1000.0;
                let frac = (ms / BAR_CEILING_MS).clamp(0.0, 1.0);
                let h = ((frac * BAR_MAX_HEIGHT as f32).round() as u32).max(1);
                rect(
                    text_x + (i as u32 * BAR_WIDTH) as i32,
                    bars_bottom - h as i32,
                    BAR_WIDTH - 1,
                    h,
                )
            })
            .collect();

        let panel_w = (PAD * 2) as u32 + HISTORY as u32 * BAR_WIDTH;
        let panel_h = (bars_bottom - MARGIN + PAD) as u32;
        let panel = vec![rect(MARGIN, MARGIN, panel_w, panel_h)];

        let keep = |v: Vec<vk::Rect2D>| -> Vec<vk::Rect2D> {
            v.into_iter().filter_map(|r| clip(r, extent)).collect()
        };
        Self {
            panel: keep(panel),
            text: keep(text),
            bars: keep(bars),
        }
    }
}

const PANEL_COLOR: [f32; 4] = [0.03, 0.03, 0.05, 1.0];
const TEXT_COLOR: [f32; 4] = [0.95, 0.85, 0.3, 1.0];
const BAR_COLOR: [f32; 4] = [0.75, 0.12, 0.15, 1.0];

#[derive(Default)]
pub struct FrameTimingOverlay {
    device: Option<ash::Device>,
    clock: FrameClock,
    layout: OverlayLayout,
    image_count: usize,
}

impl FrameTimingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    fn clear_rects(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        color: [f32; 4],
        rects: &[vk::Rect2D],
    ) {
        if rects.is_empty() {
            return;
        }
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        };
        let clear_rects: Vec<vk::ClearRect> = rects
            .iter()
            .map(|&rect| vk::ClearRect {
                rect,
                base_array_layer: 0,
                layer_count: 1,
            })
            .collect();
        let attachments = std::slice::from_ref(&attachment);
        unsafe { device.cmd_clear_attachments(cmd, attachments, &clear_rects) };
    }
}

impl Overlay for FrameTimingOverlay {
    fn initialize(&mut self, init: &OverlayInit<'_>) -> Result<()> {
        self.device = Some(init.device.device().clone());
        self.image_count = init.image_count;
        info!("frame-timing overlay ready ({} images)", init.image_count);
        Ok(())
    }

    fn rebuild(&mut self, _render_pass: vk::RenderPass, image_count: usize) -> Result<()> {
        // clear rects carry no render-pass-dependent state
        self.image_count = image_count;
        debug!("overlay follows rebuilt swapchain ({} images)", self.image_count);
        Ok(())
    }

    fn begin_frame_content(&mut self) {
        if let Some(frames) = self.clock.tick(Instant::now()) {
            info!("fps ~ {frames} ({:.3} ms/frame)", self.clock.average_ms());
        }
    }

    fn record_into(&mut self, target: &OverlayTarget) {
        let Some(device) = self.device.as_ref() else {
            return;
        };
        self.layout = OverlayLayout::compute(&self.clock, target.extent);
        let cmd = target.command_buffer;
        self.clear_rects(device, cmd, PANEL_COLOR, &self.layout.panel);
        self.clear_rects(device, cmd, BAR_COLOR, &self.layout.bars);
        self.clear_rects(device, cmd, TEXT_COLOR, &self.layout.text);
    }

    fn shutdown(&mut self) {
        self.device = None;
    }
}

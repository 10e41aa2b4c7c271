// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan window bootstrap: device selection, swapchain lifecycle, and the
//! per-frame acquire/record/submit/present cycle with an overlay pass.

mod context;
mod debug;
mod device;
mod error;
mod frame;
mod overlay;
mod swapchain;

pub use context::{VkConfig, VkContext};
pub use device::{DeviceContext, QueueFamilyIndices};
pub use error::{RenderError, Result};
pub use frame::{FrameBackend, FrameDriver, FrameOutcome, FrameRequest};
pub use overlay::{
    FrameClock, FrameTimingOverlay, Overlay, OverlayInit, OverlayLayout, OverlayTarget,
};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, Acquire,
    Present, PresentModePreference, PresentationSurfaceSet, Recreate, SwapchainPlan,
    SwapchainState, SwapchainSupport,
};

// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use thiserror::Error;

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Every fatal condition the backend can surface. Swapchain staleness is
/// not in here; see [`crate::Acquire`], [`crate::Present`] and
/// [`crate::Recreate`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to load the Vulkan library: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("initialization failed in {call}: {result}")]
    InitializationCall {
        call: &'static str,
        result: vk::Result,
    },

    #[error("requested layer {0} is not available")]
    MissingLayer(String),

    #[error("logical device creation refused: {0}")]
    DeviceCreation(vk::Result),

    #[error("swapchain creation failed in {call}: {result}")]
    SwapchainCreation {
        call: &'static str,
        result: vk::Result,
    },

    #[error("failed to acquire swapchain image: {0}")]
    Acquire(vk::Result),

    #[error("swapchain image index {index} is outside the {count} framebuffers")]
    ImageIndexOutOfRange { index: u32, count: usize },

    #[error("command recording failed in {call}: {result}")]
    Recording {
        call: &'static str,
        result: vk::Result,
    },

    #[error("queue submission failed: {0}")]
    Submit(vk::Result),

    #[error("failed to present swapchain image: {0}")]
    Present(vk::Result),

    #[error("device idle-wait failed: {0}")]
    WaitIdle(vk::Result),

    #[error("{pool} pool exhausted ({result}); raise its configured budget")]
    ResourcePoolExhausted {
        pool: &'static str,
        result: vk::Result,
    },
}

impl RenderError {
    pub(crate) fn init(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::InitializationCall { call, result }
    }

    pub(crate) fn swapchain(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::SwapchainCreation { call, result }
    }

    pub(crate) fn recording(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Recording { call, result }
    }

    /// Allocation out of a fixed pool. Exhaustion is a sizing defect, not
    /// something to retry.
    pub(crate) fn allocation(
        pool: &'static str,
        call: &'static str,
    ) -> impl FnOnce(vk::Result) -> Self {
        move |result| match result {
            vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                Self::ResourcePoolExhausted { pool, result }
            }
            _ => Self::Recording { call, result },
        }
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! Everything that outlives a single frame and does not depend on surface
//! geometry: the Vulkan connection, the bound surface, the selected physical
//! device, the logical device with its queues, and the two resource pools.

use std::collections::BTreeSet;
use std::ffi::{c_char, CStr};

use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, info};

use crate::debug::{first_missing_layer, DebugMessenger, VALIDATION_LAYER};
use crate::error::{RenderError, Result};
use crate::swapchain::SwapchainSupport;
use crate::VkConfig;

const APP_NAME: &CStr = c"Crimson Engine";

pub(crate) const DEVICE_EXTENSIONS: [&CStr; 1] = [swapchain::NAME];

/// Descriptor types the overlay pool carries capacity for.
const DESCRIPTOR_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Prefers one family that does both graphics and presentation. Failing
    /// that, the first GRAPHICS family plus the first family that can present.
    pub fn resolve(
        families: &[vk::QueueFamilyProperties],
        can_present: impl Fn(u32) -> bool,
    ) -> Option<Self> {
        let graphics: Vec<u32> = (0..families.len() as u32)
            .filter(|&i| {
                let f = &families[i as usize];
                f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            })
            .collect();
        if let Some(&both) = graphics.iter().find(|&&i| can_present(i)) {
            return Some(Self {
                graphics: both,
                present: both,
            });
        }
        let present = (0..families.len() as u32).find(|&i| can_present(i))?;
        Some(Self {
            graphics: *graphics.first()?,
            present,
        })
    }

    pub fn shared(&self) -> bool {
        self.graphics == self.present
    }

    /// One entry per distinct family, in ascending order.
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present])
            .into_iter()
            .collect()
    }
}

/// Device extensions from `required` the device does not expose.
pub(crate) fn missing_extensions<'a>(
    available: &[vk::ExtensionProperties],
    required: &[&'a CStr],
) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|want| {
            !available.iter().any(|e| {
                e.extension_name_as_c_str()
                    .map(|n| n == *want)
                    .unwrap_or(false)
            })
        })
        .collect()
}

pub(crate) fn descriptor_pool_sizes(budget: u32) -> Vec<vk::DescriptorPoolSize> {
    DESCRIPTOR_TYPES
        .iter()
        .map(|&ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: budget,
        })
        .collect()
}

/// Instance, diagnostics messenger and surface. Released in reverse order.
struct Connection {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(dbg) = &mut self.debug {
                dbg.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: 0,
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .map_err(RenderError::init("enumerate_required_extensions"))?
        .to_vec();

    let mut layers: Vec<*const c_char> = Vec::new();
    if validation {
        let available = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(RenderError::init("vkEnumerateInstanceLayerProperties"))?;
        if let Some(missing) = first_missing_layer(&available, &[VALIDATION_LAYER]) {
            return Err(RenderError::MissingLayer(
                missing.to_string_lossy().into_owned(),
            ));
        }
        layers.push(VALIDATION_LAYER.as_ptr());
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    // chained so instance creation itself is covered by the messenger
    let mut debug_ci = DebugMessenger::create_info();
    let mut create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };
    if validation {
        create_info = create_info.push_next(&mut debug_ci);
    }

    unsafe { entry.create_instance(&create_info, None) }
        .map_err(RenderError::init("vkCreateInstance"))
}

/// A device qualifies when it has the swapchain extension, at least one
/// surface format and present mode for `surface`, and queue families that
/// cover graphics and presentation.
unsafe fn rate_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<Option<QueueFamilyIndices>> {
    let exts = unsafe { instance.enumerate_device_extension_properties(phys) }
        .map_err(RenderError::init("vkEnumerateDeviceExtensionProperties"))?;
    let missing = missing_extensions(&exts, &DEVICE_EXTENSIONS);
    if !missing.is_empty() {
        debug!("device skipped, missing extensions {missing:?}");
        return Ok(None);
    }

    let support = match unsafe { SwapchainSupport::query(surface_loader, phys, surface) } {
        Ok(s) => s,
        Err(e) => {
            debug!("device skipped, surface query failed: {e}");
            return Ok(None);
        }
    };
    if !support.is_adequate() {
        debug!("device skipped, no surface formats or present modes");
        return Ok(None);
    }

    let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    Ok(QueueFamilyIndices::resolve(&families, |i| {
        unsafe { surface_loader.get_physical_device_surface_support(phys, i, surface) }
            .unwrap_or(false)
    }))
}

pub(crate) struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

pub(crate) struct ResourcePools {
    pub command: vk::CommandPool,
    pub descriptor: vk::DescriptorPool,
}

pub struct DeviceContext {
    device: ash::Device,
    queues: Queues,
    pools: ResourcePools,
    phys: vk::PhysicalDevice,
    families: QueueFamilyIndices,
    device_name: String,
    // dropped after the Drop body has released the device
    connection: Connection,
}

impl DeviceContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &VkConfig,
    ) -> Result<Self> {
        let (connection, phys, families) = unsafe { Self::initialize(window, display, cfg)? };
        let (device, queues) = unsafe {
            Self::create_logical_device_and_queues(&connection.instance, phys, families)?
        };
        let budget = cfg.descriptor_budget;
        let pools = match unsafe { Self::resource_pools(&device, families, budget) } {
            Ok(p) => p,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let props = unsafe { connection.instance.get_physical_device_properties(phys) };
        let device_name = props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_owned());
        info!(
            "Vulkan device: {device_name} (graphics family {}, present family {})",
            families.graphics, families.present
        );

        Ok(Self {
            device,
            queues,
            pools,
            phys,
            families,
            device_name,
            connection,
        })
    }

    /// Instance (+ messenger), surface, and physical-device selection.
    unsafe fn initialize(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &VkConfig,
    ) -> Result<(Connection, vk::PhysicalDevice, QueueFamilyIndices)> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = unsafe { Entry::load()? };
        let instance = unsafe { create_instance(&entry, dh, cfg.validation)? };
        let surface_loader = surface::Instance::new(&entry, &instance);
        let mut connection = Connection {
            entry,
            instance,
            debug: None,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };

        if cfg.validation {
            connection.debug =
                Some(unsafe { DebugMessenger::new(&connection.entry, &connection.instance)? });
        }

        connection.surface = unsafe {
            ash_window::create_surface(&connection.entry, &connection.instance, dh, wh, None)
        }
        .map_err(RenderError::init("ash_window::create_surface"))?;

        let devices = unsafe { connection.instance.enumerate_physical_devices() }
            .map_err(RenderError::init("vkEnumeratePhysicalDevices"))?;
        for phys in devices {
            let rated = unsafe {
                rate_device(
                    &connection.instance,
                    &connection.surface_loader,
                    connection.surface,
                    phys,
                )?
            };
            if let Some(families) = rated {
                return Ok((connection, phys, families));
            }
        }
        Err(RenderError::Initialization(
            "no physical device supports presentation to this window".into(),
        ))
    }

    unsafe fn create_logical_device_and_queues(
        instance: &Instance,
        phys: vk::PhysicalDevice,
        families: QueueFamilyIndices,
    ) -> Result<(ash::Device, Queues)> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        // nothing beyond the core feature set is needed for a clear + overlay pass
        let features = vk::PhysicalDeviceFeatures::default();
        let device_exts: Vec<*const c_char> =
            DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };

        let device = unsafe { instance.create_device(phys, &dinfo, None) }
            .map_err(RenderError::DeviceCreation)?;
        let queues = unsafe {
            Queues {
                graphics: device.get_device_queue(families.graphics, 0),
                present: device.get_device_queue(families.present, 0),
            }
        };
        Ok((device, queues))
    }

    /// Transient command pool on the graphics family and the overlay's
    /// descriptor pool. `budget` descriptors per type is a hard ceiling.
    /// The pool reaches overlays through [`OverlayInit`]; the built-in
    /// frame-timing overlay binds no descriptors and leaves it untouched.
    ///
    /// [`OverlayInit`]: crate::OverlayInit
    unsafe fn resource_pools(
        device: &ash::Device,
        families: QueueFamilyIndices,
        budget: u32,
    ) -> Result<ResourcePools> {
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::TRANSIENT,
            queue_family_index: families.graphics,
            ..Default::default()
        };
        let command = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(RenderError::DeviceCreation)?;

        let sizes = descriptor_pool_sizes(budget);
        let dp_info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            max_sets: budget.saturating_mul(sizes.len() as u32),
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        let descriptor = match unsafe { device.create_descriptor_pool(&dp_info, None) } {
            Ok(p) => p,
            Err(e) => {
                unsafe { device.destroy_command_pool(command, None) };
                return Err(RenderError::DeviceCreation(e));
            }
        };
        debug!("resource pools ready ({budget} descriptors per type)");
        Ok(ResourcePools {
            command,
            descriptor,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.connection.instance
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.connection.surface
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.connection.surface_loader
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.queues.graphics
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.queues.present
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.pools.command
    }

    pub fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.pools.descriptor
    }

    pub fn allocate_command_buffer(&self) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.pools.command,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bufs = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(RenderError::allocation("command", "vkAllocateCommandBuffers"))?;
        bufs.into_iter().next().ok_or(RenderError::Recording {
            call: "vkAllocateCommandBuffers",
            result: vk::Result::ERROR_UNKNOWN,
        })
    }

    /// The buffer must not be pending on any queue.
    pub fn free_command_buffer(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device
                .free_command_buffers(self.pools.command, std::slice::from_ref(&cmd))
        };
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(RenderError::WaitIdle)
    }

    /// Submits on the graphics queue and blocks until that queue drains.
    pub fn submit_and_wait(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        unsafe {
            let submits = std::slice::from_ref(&submit);
            self.device
                .queue_submit(self.queues.graphics, submits, vk::Fence::null())
                .map_err(RenderError::Submit)?;
            self.device
                .queue_wait_idle(self.queues.graphics)
                .map_err(RenderError::WaitIdle)
        }
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            d.device_wait_idle().ok();
            d.destroy_descriptor_pool(self.pools.descriptor, None);
            d.destroy_command_pool(self.pools.command, None);
            d.destroy_device(None);
        }
        // `connection` drops next: surface, messenger, instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn ext(name: &CStr) -> vk::ExtensionProperties {
        vk::ExtensionProperties::default()
            .extension_name(name)
            .expect("extension name fits")
    }

    #[test]
    fn shared_family_is_used_for_both_queues() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let idx = QueueFamilyIndices::resolve(&families, |_| true).unwrap();
        assert_eq!(idx, QueueFamilyIndices { graphics: 1, present: 1 });
        assert!(idx.shared());
        assert_eq!(idx.unique(), vec![1]);
    }

    #[test]
    fn separate_present_family_when_graphics_cannot_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let idx = QueueFamilyIndices::resolve(&families, |i| i == 2).unwrap();
        assert_eq!(idx, QueueFamilyIndices { graphics: 0, present: 2 });
        assert!(!idx.shared());
        assert_eq!(idx.unique(), vec![0, 2]);
    }

    #[test]
    fn combined_family_beats_an_earlier_graphics_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        let idx = QueueFamilyIndices::resolve(&families, |i| i != 0).unwrap();
        assert_eq!(idx, QueueFamilyIndices { graphics: 2, present: 2 });
        assert!(idx.shared());
    }

    #[test]
    fn no_graphics_or_no_present_is_unsuitable() {
        let compute_only = [family(vk::QueueFlags::COMPUTE)];
        assert!(QueueFamilyIndices::resolve(&compute_only, |_| true).is_none());

        let graphics = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilyIndices::resolve(&graphics, |_| false).is_none());
    }

    #[test]
    fn swapchain_extension_required() {
        let with = [ext(c"VK_KHR_maintenance1"), ext(swapchain::NAME)];
        assert!(missing_extensions(&with, &DEVICE_EXTENSIONS).is_empty());

        let without = [ext(c"VK_KHR_maintenance1")];
        assert_eq!(
            missing_extensions(&without, &DEVICE_EXTENSIONS),
            vec![swapchain::NAME]
        );
    }

    #[test]
    fn descriptor_pool_covers_every_type() {
        let sizes = descriptor_pool_sizes(1000);
        assert_eq!(sizes.len(), DESCRIPTOR_TYPES.len());
        assert!(sizes.iter().all(|s| s.descriptor_count == 1000));
        assert!(sizes
            .iter()
            .any(|s| s.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER));
    }
}

//! Physical device selection and logical device creation.

use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{c_char, CStr};

/// Device extensions a GPU must expose to be considered at all.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// What device selection needs to know about one physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCandidate {
    /// Every required device extension is exposed.
    pub has_required_extensions: bool,
    /// Geometry shader feature support.
    pub geometry_shader: bool,
    /// Discrete GPU.
    pub discrete: bool,
    /// `limits.maxImageDimension2D`.
    pub max_image_dimension_2d: u32,
}

impl DeviceCandidate {
    /// Selection score. Zero means unusable.
    pub fn score(&self) -> u64 {
        if !self.geometry_shader {
            return 0;
        }
        let discrete_bonus = if self.discrete { 1000 } else { 0 };
        discrete_bonus + u64::from(self.max_image_dimension_2d)
    }
}

/// Index of the highest scoring candidate.
///
/// Candidates without the required extensions are skipped. Ties go to the
/// earliest candidate.
pub fn pick_best(candidates: &[DeviceCandidate]) -> Result<usize> {
    let mut best: Option<(usize, u64)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.has_required_extensions {
            continue;
        }
        let score = candidate.score();
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    match best {
        None => Err(GpuError::NoCompatibleDevice),
        Some((_, 0)) => Err(GpuError::NoSuitableDevice),
        Some((index, _)) => Ok(index),
    }
}

/// A queue family that was either found or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FamilySlot {
    Found(u32),
    #[default]
    Missing,
}

impl FamilySlot {
    pub const fn index(self) -> Option<u32> {
        match self {
            Self::Found(index) => Some(index),
            Self::Missing => None,
        }
    }

    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Queue family lookup result for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueFamilies {
    pub graphics: FamilySlot,
    pub present: FamilySlot,
}

impl QueueFamilies {
    /// Both a graphics and a present family were found.
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_found() && self.present.is_found()
    }

    /// Convert to concrete indices.
    pub fn resolve(&self) -> Result<ResolvedFamilies> {
        match (self.graphics, self.present) {
            (FamilySlot::Found(graphics), FamilySlot::Found(present)) => {
                Ok(ResolvedFamilies { graphics, present })
            }
            (graphics, present) => Err(GpuError::IncompleteQueueFamilies {
                graphics: graphics.is_found(),
                present: present.is_found(),
            }),
        }
    }
}

/// Concrete graphics and present family indices. They may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl ResolvedFamilies {
    /// Distinct family indices, one queue is created for each.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Graphics and present happen on the same family.
    pub const fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Capabilities of one queue family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FamilyProbe {
    pub graphics: bool,
    pub present: bool,
}

/// First family with graphics, first family that can present.
pub fn resolve_families(probes: &[FamilyProbe]) -> QueueFamilies {
    let mut families = QueueFamilies::default();

    for (index, probe) in (0u32..).zip(probes) {
        if probe.graphics && !families.graphics.is_found() {
            families.graphics = FamilySlot::Found(index);
        }
        if probe.present && !families.present.is_found() {
            families.present = FamilySlot::Found(index);
        }
        if families.is_complete() {
            break;
        }
    }

    families
}

/// The physical device chosen at startup.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceChoice {
    pub physical_device: vk::PhysicalDevice,
    pub families: ResolvedFamilies,
    pub name: String,
    pub score: u64,
}

/// Describe a physical device for selection.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn probe_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> (DeviceCandidate, String) {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let features = unsafe { instance.get_physical_device_features(physical_device) };
    let extensions =
        unsafe { instance.enumerate_device_extension_properties(physical_device) }.unwrap_or_default();

    let available: Vec<&CStr> = extensions
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();
    let has_required_extensions = required_device_extensions()
        .iter()
        .all(|required| available.contains(required));

    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();

    tracing::debug!(
        "Candidate GPU {} ({:?}), Vulkan {}.{}.{}, extensions ok: {}",
        name,
        properties.device_type,
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version),
        has_required_extensions,
    );

    let candidate = DeviceCandidate {
        has_required_extensions,
        geometry_shader: features.geometry_shader == vk::TRUE,
        discrete: properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
    };

    (candidate, name)
}

/// Probe every queue family of a device for graphics and present support.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn probe_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<Vec<FamilyProbe>> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    (0u32..)
        .zip(&families)
        .map(|(index, family)| {
            let present = unsafe {
                surface_loader.get_physical_device_surface_support(physical_device, index, surface)
            }?;
            Ok(FamilyProbe {
                graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                present,
            })
        })
        .collect()
}

/// Select the best physical device and resolve its queue families.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn select_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<PhysicalDeviceChoice> {
    let devices = unsafe { instance.enumerate_physical_devices() }?;

    let probed: Vec<(DeviceCandidate, String)> = devices
        .iter()
        .map(|&device| unsafe { probe_device(instance, device) })
        .collect();
    let candidates: Vec<DeviceCandidate> = probed.iter().map(|(candidate, _)| *candidate).collect();

    let index = pick_best(&candidates)?;
    let physical_device = devices[index];
    let (candidate, name) = probed[index].clone();

    let probes =
        unsafe { probe_queue_families(instance, surface_loader, physical_device, surface) }?;
    let families = resolve_families(&probes).resolve()?;

    tracing::info!(
        "Selected GPU: {} (score {}, graphics family {}, present family {})",
        name,
        candidate.score(),
        families.graphics,
        families.present,
    );

    Ok(PhysicalDeviceChoice {
        physical_device,
        families,
        name,
        score: candidate.score(),
    })
}

/// Logical device with its graphics and present queues.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
pub unsafe fn create_logical_device(
    instance: &ash::Instance,
    choice: &PhysicalDeviceChoice,
    enable_validation: bool,
) -> Result<LogicalDevice> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = choice
        .families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = required_device_extensions()
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();

    // Device layers are ignored by current loaders but older ones still read them.
    let layer_names: Vec<*const c_char> = crate::instance::required_layers(enable_validation)
        .iter()
        .map(|layer| layer.as_ptr())
        .collect();

    let features = vk::PhysicalDeviceFeatures::default().geometry_shader(true);

    #[allow(deprecated)]
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(choice.physical_device, &device_create_info, None) }
        .map_err(GpuError::DeviceCreation)?;

    let graphics_queue = unsafe { device.get_device_queue(choice.families.graphics, 0) };
    let present_queue = unsafe { device.get_device_queue(choice.families.present, 0) };

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(geometry_shader: bool, discrete: bool, max: u32) -> DeviceCandidate {
        DeviceCandidate {
            has_required_extensions: true,
            geometry_shader,
            discrete,
            max_image_dimension_2d: max,
        }
    }

    #[test]
    fn score_requires_geometry_shader() {
        assert_eq!(candidate(false, true, 16384).score(), 0);
        assert_eq!(candidate(true, false, 8192).score(), 8192);
        assert_eq!(candidate(true, true, 8192).score(), 9192);
    }

    #[test]
    fn discrete_beats_integrated_of_equal_dimension() {
        let devices = [candidate(true, false, 16384), candidate(true, true, 16384)];
        assert_eq!(pick_best(&devices).unwrap(), 1);
    }

    #[test]
    fn ties_go_to_first_enumerated() {
        let devices = [candidate(true, true, 4096), candidate(true, true, 4096)];
        assert_eq!(pick_best(&devices).unwrap(), 0);
    }

    #[test]
    fn no_geometry_shader_anywhere_is_unsuitable() {
        let devices = [candidate(false, true, 16384), candidate(false, false, 8192)];
        assert!(matches!(pick_best(&devices), Err(GpuError::NoSuitableDevice)));
    }

    #[test]
    fn missing_extensions_are_skipped() {
        let mut lacking = candidate(true, true, 32768);
        lacking.has_required_extensions = false;
        let devices = [lacking, candidate(true, false, 4096)];
        assert_eq!(pick_best(&devices).unwrap(), 1);
    }

    #[test]
    fn no_compatible_device() {
        let mut lacking = candidate(true, true, 32768);
        lacking.has_required_extensions = false;
        assert!(matches!(pick_best(&[lacking]), Err(GpuError::NoCompatibleDevice)));
        assert!(matches!(pick_best(&[]), Err(GpuError::NoCompatibleDevice)));
    }

    #[test]
    fn families_pick_first_match() {
        let probes = [
            FamilyProbe { graphics: false, present: false },
            FamilyProbe { graphics: true, present: false },
            FamilyProbe { graphics: true, present: true },
            FamilyProbe { graphics: false, present: true },
        ];
        let families = resolve_families(&probes);
        assert_eq!(families.graphics, FamilySlot::Found(1));
        assert_eq!(families.present, FamilySlot::Found(2));
        assert!(families.is_complete());

        let resolved = families.resolve().unwrap();
        assert!(!resolved.is_shared());
        assert_eq!(resolved.unique(), vec![1, 2]);
    }

    #[test]
    fn shared_family_creates_one_queue() {
        let probes = [FamilyProbe { graphics: true, present: true }];
        let resolved = resolve_families(&probes).resolve().unwrap();
        assert!(resolved.is_shared());
        assert_eq!(resolved.unique(), vec![0]);
    }

    #[test]
    fn missing_present_family_is_incomplete() {
        let probes = [FamilyProbe { graphics: true, present: false }];
        let families = resolve_families(&probes);
        assert!(!families.is_complete());
        assert_eq!(families.present.index(), None);
        assert!(matches!(
            families.resolve(),
            Err(GpuError::IncompleteQueueFamilies { graphics: true, present: false })
        ));
    }
}

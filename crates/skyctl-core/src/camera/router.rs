// ── Camera router ──
//
// Cameras are discovered at runtime: the device announces each one with a
// capabilities event, and the router remembers its model in the device
// dictionary under `camera<id>` so it is restored before the next
// connection. Older stores hold a single main camera under `camera`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::controller::CameraController;
use super::presets;
use crate::device::{DeviceContext, FeatureController};
use crate::error::RejectedEvent;
use crate::event::{CameraEvent, Event};
use crate::list::{ListAssembler, ListFlags};
use crate::model::{
    CameraModel, Framerate, PhotoCapability, PhotoFileFormat, PhotoFormat, PhotoMode,
    RecordingCapability, RecordingMode, Resolution,
};
use crate::wire::Supported;

const SETTINGS_KEY_PREFIX: &str = "camera";

/// Camera ids are bit positions of the camera-states bitmask.
const MAX_CAMERAS: usize = 64;

/// Routes camera events to per-instance controllers.
pub struct CameraRouter {
    context: Arc<DeviceContext>,
    slots: Vec<Option<CameraController>>,
    known: BTreeSet<u8>,
    photo_caps: ListAssembler<u8, PhotoCapability>,
    recording_caps: ListAssembler<u8, RecordingCapability>,
    connected: bool,
    /// Whether the camera-states bitmask arrived during this session.
    states_received: bool,
}

impl CameraRouter {
    pub(crate) fn new(context: Arc<DeviceContext>) -> Self {
        let mut router = Self {
            context,
            slots: std::iter::repeat_with(|| None).take(MAX_CAMERAS).collect(),
            known: BTreeSet::new(),
            photo_caps: ListAssembler::new(),
            recording_caps: ListAssembler::new(),
            connected: false,
            states_received: false,
        };
        router.restore();
        router
    }

    /// Recreates the controllers of every camera seen in earlier sessions.
    fn restore(&mut self) {
        let Some(root) = self.context.device_root().cloned() else {
            return;
        };

        for key in root.keys() {
            let Some(suffix) = key.strip_prefix(SETTINGS_KEY_PREFIX) else {
                continue;
            };
            let (id, model) = if suffix.is_empty() {
                (0, CameraModel::Main)
            } else {
                let Some(id) = suffix.parse::<u8>().ok().filter(|id| usize::from(*id) < MAX_CAMERAS) else {
                    error!(key = %key, "unparsable camera key in persisted data, skipped");
                    continue;
                };
                let Some(model) = presets::MODEL.load(Some(&root.dictionary(&key))) else {
                    error!(key = %key, "persisted camera has no model, skipped");
                    continue;
                };
                (id, model)
            };
            if self.known.contains(&id) {
                warn!(key = %key, camera = id, "camera persisted twice, keeping the first record");
                continue;
            }
            self.insert(CameraController::new(Arc::clone(&self.context), id, model, key));
        }
    }

    fn insert(&mut self, controller: CameraController) {
        let id = controller.id();
        self.known.insert(id);
        if let Some(slot) = self.slots.get_mut(usize::from(id)) {
            *slot = Some(controller);
        }
    }

    /// Ids of every known camera, sorted.
    pub fn ids(&self) -> Vec<u8> {
        self.known.iter().copied().collect()
    }

    pub fn camera_mut(&mut self, id: u8) -> Option<&mut CameraController> {
        self.slots.get_mut(usize::from(id)).and_then(Option::as_mut)
    }

    pub fn camera(&self, id: u8) -> Option<&CameraController> {
        self.slots.get(usize::from(id)).and_then(Option::as_ref)
    }

    fn controller_for(&mut self, id: u8) -> Result<&mut CameraController, RejectedEvent> {
        self.camera_mut(id).ok_or(RejectedEvent::UnknownInstance { id })
    }

    fn controllers(&mut self) -> impl Iterator<Item = &mut CameraController> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    fn on_camera_event(&mut self, event: &CameraEvent) -> Result<(), RejectedEvent> {
        match event {
            CameraEvent::Capabilities { cam_id, model, .. } => {
                let model = CameraModel::from_wire(*model)
                    .ok_or_else(|| RejectedEvent::field(event.name(), "model"))?;
                if usize::from(*cam_id) >= MAX_CAMERAS {
                    return Err(RejectedEvent::InstanceOutOfRange {
                        id: u16::from(*cam_id),
                    });
                }

                if self.known.contains(cam_id) {
                    return self.controller_for(*cam_id)?.on_event(event);
                }

                // Nothing is registered or persisted until the announcement
                // decodes in full.
                let key = format!("{SETTINGS_KEY_PREFIX}{cam_id}");
                let mut controller = CameraController::new(Arc::clone(&self.context), *cam_id, model, key);
                controller.on_event(event)?;
                presets::MODEL.save(controller.device_dict.as_ref(), &model);
                info!(camera = cam_id, %model, "new camera announced");
                if self.connected {
                    controller.on_connected();
                }
                self.insert(controller);
                Ok(())
            }

            CameraEvent::PhotoCapabilities {
                id,
                modes,
                formats,
                file_formats,
                hdr,
                list_flags,
            } => {
                let [cam_id, _index] = id.to_be_bytes();
                let capability = PhotoCapability {
                    modes: PhotoMode::from_bitfield(*modes),
                    formats: PhotoFormat::from_bitfield(*formats),
                    file_formats: PhotoFileFormat::from_bitfield(*file_formats),
                    hdr: Supported::from_wire(*hdr).is_some_and(Supported::is_supported),
                };
                let flags = ListFlags::from_bits(*list_flags);
                if let Some(caps) = self.photo_caps.process(cam_id, flags, capability) {
                    self.controller_for(cam_id)?.on_photo_capabilities(caps);
                }
                Ok(())
            }

            CameraEvent::RecordingCapabilities {
                id,
                modes,
                resolutions,
                framerates,
                hdr,
                list_flags,
            } => {
                let [cam_id, _index] = id.to_be_bytes();
                let capability = RecordingCapability {
                    modes: RecordingMode::from_bitfield(*modes),
                    resolutions: Resolution::from_bitfield(*resolutions),
                    framerates: Framerate::from_bitfield(*framerates),
                    hdr: Supported::from_wire(*hdr).is_some_and(Supported::is_supported),
                };
                let flags = ListFlags::from_bits(*list_flags);
                if let Some(caps) = self.recording_caps.process(cam_id, flags, capability) {
                    self.controller_for(cam_id)?.on_recording_capabilities(caps);
                }
                Ok(())
            }

            CameraEvent::CameraStates { active_cameras } => {
                self.states_received = true;
                for controller in self.controllers() {
                    let active = active_cameras & (1u64 << controller.id()) != 0;
                    controller.on_activation_state(active);
                }
                Ok(())
            }

            CameraEvent::AntiFlickerCapabilities { .. } | CameraEvent::AntiFlickerMode { .. } => Ok(()),

            _ => match event.cam_id() {
                Some(id) => self.controller_for(id)?.on_event(event),
                None => Ok(()),
            },
        }
    }
}

impl FeatureController for CameraRouter {
    fn on_connecting(&mut self) {
        self.states_received = false;
        self.photo_caps.clear();
        self.recording_caps.clear();
    }

    fn on_connected(&mut self) {
        if !self.states_received && self.context.config().assume_main_camera_active {
            if let Some(main) = self.camera_mut(0) {
                warn!("no camera states received, assuming the main camera is active");
                main.on_activation_state(true);
            }
        }
        self.connected = true;
        for controller in self.controllers() {
            controller.on_connected();
        }
    }

    fn on_disconnected(&mut self) {
        self.photo_caps.clear();
        self.recording_caps.clear();
        for controller in self.controllers() {
            controller.on_disconnected();
        }
        self.connected = false;
    }

    fn on_forgetting(&mut self) {
        for controller in self.controllers() {
            controller.on_forgetting();
        }
    }

    fn on_preset_change(&mut self) {
        for controller in self.controllers() {
            controller.on_preset_change();
        }
    }

    fn on_event(&mut self, event: &Event) -> Result<(), RejectedEvent> {
        match event {
            Event::Camera(event) => self.on_camera_event(event),
            Event::Battery(_) | Event::Piloting(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for CameraRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRouter")
            .field("known", &self.known)
            .field("connected", &self.connected)
            .field("states_received", &self.states_received)
            .finish_non_exhaustive()
    }
}

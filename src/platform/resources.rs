//! Ordered stack of live backend resources
//!
//! Handles are pushed in acquisition order and released strictly in reverse,
//! either explicitly or when the stack is dropped. A capture start that fails
//! halfway unwinds back to its mark and leaves nothing behind.

use super::{CameraBackend, Handle};
use std::fmt;
use std::sync::Arc;

/// A backend object owned by the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Device(Handle),
    OutputContainer(Handle),
    ImageReader(Handle),
    Window(Handle),
    SessionOutput { output: Handle, container: Handle },
    CaptureRequest(Handle),
    OutputTarget { target: Handle, request: Handle },
    Session(Handle),
    /// Active repeating request on a session; releasing it stops the repetition
    Repeating { session: Handle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Device,
    OutputContainer,
    ImageReader,
    Window,
    SessionOutput,
    CaptureRequest,
    OutputTarget,
    Session,
    Repeating,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Device(_) => ResourceKind::Device,
            Resource::OutputContainer(_) => ResourceKind::OutputContainer,
            Resource::ImageReader(_) => ResourceKind::ImageReader,
            Resource::Window(_) => ResourceKind::Window,
            Resource::SessionOutput { .. } => ResourceKind::SessionOutput,
            Resource::CaptureRequest(_) => ResourceKind::CaptureRequest,
            Resource::OutputTarget { .. } => ResourceKind::OutputTarget,
            Resource::Session(_) => ResourceKind::Session,
            Resource::Repeating { .. } => ResourceKind::Repeating,
        }
    }

    /// Primary handle of the resource
    pub fn handle(&self) -> Handle {
        match *self {
            Resource::Device(h)
            | Resource::OutputContainer(h)
            | Resource::ImageReader(h)
            | Resource::Window(h)
            | Resource::CaptureRequest(h)
            | Resource::Session(h) => h,
            Resource::SessionOutput { output, .. } => output,
            Resource::OutputTarget { target, .. } => target,
            Resource::Repeating { session } => session,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Device => "camera device",
            ResourceKind::OutputContainer => "output container",
            ResourceKind::ImageReader => "image reader",
            ResourceKind::Window => "capture window",
            ResourceKind::SessionOutput => "session output",
            ResourceKind::CaptureRequest => "capture request",
            ResourceKind::OutputTarget => "output target",
            ResourceKind::Session => "capture session",
            ResourceKind::Repeating => "repeating request",
        };
        f.write_str(name)
    }
}

/// Live resources of one capture, released in reverse acquisition order
pub struct ResourceStack {
    backend: Arc<dyn CameraBackend>,
    live: Vec<Resource>,
}

impl ResourceStack {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            live: Vec::new(),
        }
    }

    pub fn push(&mut self, resource: Resource) {
        crate::assert_invariant!(
            (resource.kind() == ResourceKind::Device) == self.live.is_empty(),
            "Device must be the first resource acquired",
            "platform::ResourceStack"
        );
        log::debug!("[Resources] Acquired {} {:?}", resource.kind(), resource.handle());
        self.live.push(resource);
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn find(&self, kind: ResourceKind) -> Option<Handle> {
        self.live
            .iter()
            .find(|r| r.kind() == kind)
            .map(Resource::handle)
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.find(kind).is_some()
    }

    /// Release everything above `mark`, newest first.
    ///
    /// A failing release is logged and does not stop the remaining releases.
    pub fn unwind_to(&mut self, mark: usize) {
        while self.live.len() > mark {
            let Some(resource) = self.live.pop() else {
                break;
            };
            match self.backend.release(&resource) {
                Ok(()) => log::debug!(
                    "[Resources] Released {} {:?}",
                    resource.kind(),
                    resource.handle()
                ),
                Err(e) => log::warn!(
                    "[Resources] Failed to release {} {:?}: {}",
                    resource.kind(),
                    resource.handle(),
                    e
                ),
            }
        }
    }

    pub fn release_all(&mut self) {
        self.unwind_to(0);
    }
}

impl Drop for ResourceStack {
    fn drop(&mut self) {
        if !self.live.is_empty() {
            log::debug!("[Resources] Releasing {} resources on drop", self.live.len());
            self.release_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockOp};

    fn stack_with(backend: &Arc<MockBackend>) -> ResourceStack {
        let mut stack = ResourceStack::new(backend.clone());
        stack.push(Resource::Device(Handle(1)));
        stack.push(Resource::OutputContainer(Handle(2)));
        stack.push(Resource::ImageReader(Handle(3)));
        stack
    }

    #[test]
    fn test_release_in_reverse_order() {
        let backend = Arc::new(MockBackend::new());
        let mut stack = stack_with(&backend);
        stack.release_all();
        assert!(stack.is_empty());
        assert_eq!(
            backend.ops(),
            vec![
                MockOp::Released(ResourceKind::ImageReader),
                MockOp::Released(ResourceKind::OutputContainer),
                MockOp::Released(ResourceKind::Device),
            ]
        );
    }

    #[test]
    fn test_unwind_to_mark_keeps_lower_entries() {
        let backend = Arc::new(MockBackend::new());
        let mut stack = stack_with(&backend);
        stack.unwind_to(1);
        assert_eq!(stack.len(), 1);
        assert!(stack.contains(ResourceKind::Device));
        assert!(!stack.contains(ResourceKind::ImageReader));
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = Arc::new(MockBackend::new());
        drop(stack_with(&backend));
        assert_eq!(backend.ops().len(), 3);
    }

    #[test]
    #[should_panic(expected = "Device must be the first resource acquired")]
    fn test_device_must_be_bottom_entry() {
        let backend = Arc::new(MockBackend::new());
        let mut stack = ResourceStack::new(backend);
        stack.push(Resource::ImageReader(Handle(3)));
    }
}

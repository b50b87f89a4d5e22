use super::NetDevice;
use std::{
    cell::RefCell,
    fmt::Debug,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

///
/// A host owning a list of network devices.
///
pub struct Node {
    id: u32,
    this: Weak<Node>,
    devices: RefCell<Vec<Rc<dyn NetDevice>>>,
}

impl Node {
    /// Creates a new node with a unique id.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::SeqCst),
            this: this.clone(),
            devices: RefCell::new(Vec::new()),
        })
    }

    /// The id of the node.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    ///
    /// Installs a device on this node.
    ///
    /// The device is assigned the next interface index and bound to
    /// this node. Returns the interface index.
    ///
    pub fn add_device(&self, device: Rc<dyn NetDevice>) -> u32 {
        let index = u32::try_from(self.devices.borrow().len()).unwrap_or(u32::MAX);
        device.set_if_index(index);
        if let Some(this) = self.this.upgrade() {
            device.set_node(&this);
        }

        tracing::debug!(node = self.id, index, "installing device {}", device.address());
        self.devices.borrow_mut().push(device);
        index
    }

    /// The number of installed devices.
    #[must_use]
    pub fn n_devices(&self) -> usize {
        self.devices.borrow().len()
    }

    /// The device with the interface index `i`.
    #[must_use]
    pub fn device(&self, i: usize) -> Option<Rc<dyn NetDevice>> {
        self.devices.borrow().get(i).cloned()
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("devices", &self.n_devices())
            .finish()
    }
}

//! Device objects and installable I/O services
//!
//! A driver binds by installing an [`IoService`] on its [`DeviceObject`].
//! Generated stubs are reached only through that service's `dispatch`
//! entry point: the command id selects the method, `data` carries the
//! marshalled request and `reply` receives the marshalled results.

use crate::sbuf::HdfSbuf;
use crate::status::{HdfStatus, HDF_ERR_INVALID_OBJECT, HDF_ERR_INVALID_PARAM, HDF_SUCCESS};

/// Dispatch entry point exposed by a bound driver
pub trait IoService {
    /// Handle one request. Runs to completion; there is no cancellation.
    fn dispatch(&mut self, cmd: i32, data: &mut HdfSbuf, reply: &mut HdfSbuf) -> HdfStatus;
}

/// Device node a driver binds its service to
#[derive(Default)]
pub struct DeviceObject {
    name: String,
    service: Option<Box<dyn IoService>>,
}

impl DeviceObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the service handle, replacing any previous one
    pub fn install_service(&mut self, service: Box<dyn IoService>) {
        tracing::debug!(device = %self.name, "service installed");
        self.service = Some(service);
    }

    /// Remove the installed service
    pub fn take_service(&mut self) -> Option<Box<dyn IoService>> {
        self.service.take()
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Route a request to the installed service
    pub fn dispatch(&mut self, cmd: i32, data: &mut HdfSbuf, reply: &mut HdfSbuf) -> HdfStatus {
        match self.service.as_mut() {
            Some(service) => service.dispatch(cmd, data, reply),
            None => {
                tracing::error!(device = %self.name, cmd, "dispatch without a bound service");
                HDF_ERR_INVALID_OBJECT
            }
        }
    }
}

impl IoService for DeviceObject {
    fn dispatch(&mut self, cmd: i32, data: &mut HdfSbuf, reply: &mut HdfSbuf) -> HdfStatus {
        DeviceObject::dispatch(self, cmd, data, reply)
    }
}

/// Driver lifecycle hooks, in the order the host calls them
pub trait DriverEntry {
    /// Module name used in host configuration
    fn module_name(&self) -> &str;

    /// Install the driver's service on `device`
    fn bind(&mut self, device: &mut DeviceObject) -> HdfStatus;

    /// Bring up hardware after binding
    fn init(&mut self, device: &mut DeviceObject) -> HdfStatus {
        let _ = device;
        HDF_SUCCESS
    }

    /// Tear down; called once even if `init` failed
    fn release(&mut self, device: &mut DeviceObject) {
        device.take_service();
    }
}

/// Run bind then init, releasing the driver if either step fails
pub fn load_driver(entry: &mut dyn DriverEntry, device: &mut DeviceObject) -> HdfStatus {
    let status = entry.bind(device);
    if !status.is_success() {
        tracing::error!(module = entry.module_name(), %status, "bind failed");
        entry.release(device);
        return status;
    }
    if !device.has_service() {
        tracing::error!(module = entry.module_name(), "bind reported success without a service");
        entry.release(device);
        return HDF_ERR_INVALID_PARAM;
    }
    let status = entry.init(device);
    if !status.is_success() {
        tracing::error!(module = entry.module_name(), %status, "init failed");
        entry.release(device);
        return status;
    }
    tracing::info!(module = entry.module_name(), device = device.name(), "driver loaded");
    HDF_SUCCESS
}

use crate::api::ClientError;
use crate::util::assert_valid_device_id;
use serde::{Deserialize, Serialize};

/// A device as known to the backend.
///
/// The id is validated on construction; name, type and creation date are optional. Values are
/// immutable: the `with_*` methods consume the device and return a new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeviceFields")]
pub struct Device {
    #[serde(rename = "device_id")]
    id: String,
    #[serde(rename = "device_name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "device_type", skip_serializing_if = "Option::is_none")]
    device_type: Option<String>,
    #[serde(skip_serializing)]
    created: Option<String>,
}

/// Wire form of a device, checked before it becomes a `Device`
#[derive(Deserialize)]
struct DeviceFields {
    device_id: String,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    created: Option<String>,
}

impl TryFrom<DeviceFields> for Device {
    type Error = ClientError;

    fn try_from(fields: DeviceFields) -> Result<Device, ClientError> {
        let mut device = Device::new(fields.device_id)?;
        device.name = fields.device_name;
        device.device_type = fields.device_type;
        device.created = fields.created;
        Ok(device)
    }
}

impl Device {
    pub fn new(id: impl Into<String>) -> Result<Device, ClientError> {
        let id = id.into();
        assert_valid_device_id(&id)?;
        Ok(Device {
            id,
            name: None,
            device_type: None,
            created: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Device {
        self.name = Some(name.into());
        self
    }

    pub fn with_type(mut self, device_type: impl Into<String>) -> Device {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    /// Creation date assigned by the server, if this device came back from a registration
    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }
}

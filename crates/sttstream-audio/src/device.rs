use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SupportedStreamConfig};
use sttstream_core::AudioError;

/// Capture device lookup on the default cpal host.
pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn list_input_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;

        let mut result = Vec::new();
        for device in devices {
            let name = device.name().unwrap_or_else(|_| "unknown".to_string());
            result.push((name, device));
        }
        Ok(result)
    }

    /// Resolve an input device by name; `"default"` picks the host default.
    pub fn get_input_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()));
        }

        let devices = self.list_input_devices()?;
        for (dev_name, device) in devices {
            if dev_name == name {
                return Ok(device);
            }
        }
        Err(AudioError::DeviceNotFound(format!(
            "input device not found: {}",
            name
        )))
    }

    /// The device's native capture format. Capture opens the device in this
    /// format and converts to the session format itself.
    pub fn native_input_config(
        &self,
        device: &Device,
    ) -> Result<SupportedStreamConfig, AudioError> {
        device
            .default_input_config()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))
    }

    /// One line per capture device with its native format, for `--list-devices`.
    pub fn describe_input_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self.list_input_devices()?;
        Ok(devices
            .iter()
            .map(|(name, device)| match self.native_input_config(device) {
                Ok(config) => format!(
                    "{name} ({} Hz, {} ch, {:?})",
                    config.sample_rate().0,
                    config.channels(),
                    config.sample_format()
                ),
                Err(_) => format!("{name} (format unavailable)"),
            })
            .collect())
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration driven entry point for a device registry.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    config::{Mode, ProtocolConfig, Transport},
    device::{DeviceInfo, DeviceStatus, ModbusDevice, Role},
    error::TransportError,
    frame::{Address, Quantity, Word},
    master::{Master, RtuMaster, TcpMaster},
    observer::{self, SharedObserver},
    slave::{RtuSlave, SlaveHandle, TcpSlave},
    store::RegisterStore,
};

const NAME: &str = "Modbus";

/// Modbus master or slave, TCP or RTU, selected by configuration.
///
/// A successful [`connect`](Self::connect) creates one device named after
/// the configuration, e.g. `modbus_TCP_master`.
pub struct ModbusProtocol {
    config: Option<ProtocolConfig>,
    devices: BTreeMap<String, ModbusDevice>,
    observer: SharedObserver,
}

impl std::fmt::Debug for ModbusProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusProtocol")
            .field("config", &self.config)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl Default for ModbusProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ModbusProtocol {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            devices: BTreeMap::new(),
            observer: observer::noop(),
        }
    }

    /// Observer handed to every master and slave created later on.
    #[must_use]
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        NAME
    }

    #[must_use]
    pub const fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    #[must_use]
    pub fn validate_config(&self, config: &Value) -> bool {
        match ProtocolConfig::from_value(config) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("Invalid Modbus configuration: {err}");
                false
            }
        }
    }

    /// Create and connect the master or start the slave.
    ///
    /// An invalid configuration is rejected without touching the current
    /// connection. Otherwise the current connection is closed first.
    pub fn connect(&mut self, config: &Value) -> bool {
        let config = match ProtocolConfig::from_value(config) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Invalid Modbus configuration: {err}");
                return false;
            }
        };
        self.disconnect();
        log::info!(
            "Connecting Modbus {} {}",
            config.protocol_type,
            config.mode
        );
        let role = match self.create_role(&config) {
            Ok(role) => role,
            Err(err) => {
                log::warn!(
                    "Failed to connect Modbus {} {}: {err}",
                    config.protocol_type,
                    config.mode
                );
                self.observer.on_error(&err);
                return false;
            }
        };
        let id = config.device_id();
        log::info!("Modbus {} {} connected as {id}", config.protocol_type, config.mode);
        self.devices
            .insert(id.clone(), ModbusDevice::new(id, NAME, role));
        self.config = Some(config);
        true
    }

    fn create_role(&self, config: &ProtocolConfig) -> Result<Role, TransportError> {
        let ProtocolConfig {
            mode,
            slave_id,
            transport,
            timing,
            ..
        } = config;
        let role = match (mode, transport) {
            (Mode::Master, Transport::Tcp { ip, port }) => {
                let mut master = TcpMaster::new(ip.as_str(), *port, *slave_id)
                    .with_timeout(timing.timeout)
                    .with_observer(self.observer.clone());
                master.connect()?;
                Role::Master(Box::new(master))
            }
            (Mode::Master, Transport::Serial(settings)) => {
                let mut master = RtuMaster::new(settings.clone(), *slave_id)
                    .with_timing(timing.rtu())
                    .with_observer(self.observer.clone());
                master.connect()?;
                Role::Master(Box::new(master))
            }
            (Mode::Slave, Transport::Tcp { ip, port }) => {
                let slave = TcpSlave::bind((ip.as_str(), *port), *slave_id, RegisterStore::default())?
                    .with_timing(timing.slave())
                    .with_observer(self.observer.clone());
                Role::Slave(SlaveHandle::spawn(slave)?)
            }
            (Mode::Slave, Transport::Serial(settings)) => {
                let slave = RtuSlave::open(settings, *slave_id, RegisterStore::default())?
                    .with_timing(timing.slave())
                    .with_observer(self.observer.clone());
                Role::Slave(SlaveHandle::spawn(slave)?)
            }
        };
        Ok(role)
    }

    /// Disconnect the master or stop the slave. Does nothing if not connected.
    pub fn disconnect(&mut self) {
        if self.config.take().is_none() {
            return;
        }
        for (id, mut device) in std::mem::take(&mut self.devices) {
            device.disconnect();
            log::info!("{id} disconnected");
        }
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.config.is_some()
    }

    #[must_use]
    pub const fn status(&self) -> DeviceStatus {
        if self.is_connected() {
            DeviceStatus::Connected
        } else {
            DeviceStatus::Disconnected
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> Option<&ProtocolConfig> {
        self.config.as_ref()
    }

    /// Read holding registers of a device, empty if there is no such device.
    pub fn read_data(&mut self, device_id: &str, address: Address, count: Quantity) -> Vec<Word> {
        let Some(device) = self.devices.get_mut(device_id) else {
            log::warn!("Unknown device: {device_id}");
            return vec![];
        };
        device.read_registers(address, count)
    }

    /// Write holding registers of a device.
    pub fn write_data(&mut self, device_id: &str, address: Address, values: &[Word]) -> bool {
        let Some(device) = self.devices.get_mut(device_id) else {
            log::warn!("Unknown device: {device_id}");
            return false;
        };
        device.write_registers(address, values)
    }

    #[must_use]
    pub fn devices(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    #[must_use]
    pub fn device_info(&self, device_id: &str) -> Option<DeviceInfo> {
        self.devices.get(device_id).map(ModbusDevice::info)
    }

    #[must_use]
    pub fn device(&self, device_id: &str) -> Option<&ModbusDevice> {
        self.devices.get(device_id)
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<&mut ModbusDevice> {
        self.devices.get_mut(device_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn identity() {
        let protocol = ModbusProtocol::new();
        assert_eq!(protocol.name(), "Modbus");
        assert_eq!(protocol.version(), env!("CARGO_PKG_VERSION"));
        assert!(!protocol.is_connected());
        assert_eq!(protocol.status(), DeviceStatus::Disconnected);
        assert!(protocol.devices().is_empty());
    }

    #[test]
    fn invalid_config_has_no_side_effects() {
        let mut protocol = ModbusProtocol::new();
        let config = json!({ "mode": "master", "protocol_type": "TCP", "ip": "127.0.0.1" });
        assert!(!protocol.validate_config(&config));
        assert!(!protocol.connect(&config));
        assert!(!protocol.is_connected());
        assert!(protocol.devices().is_empty());
        assert!(protocol.read_data("modbus_TCP_master", 0, 1).is_empty());
        assert!(!protocol.write_data("modbus_TCP_master", 0, &[1]));
        assert!(protocol.device_info("modbus_TCP_master").is_none());
    }

    #[test]
    fn tcp_slave_lifecycle() {
        let mut protocol = ModbusProtocol::new();
        let config = json!({
            "mode": "slave",
            "protocol_type": "TCP",
            "ip": "127.0.0.1",
            "port": 0,
            "accept_timeout_ms": 50,
        });
        assert!(protocol.validate_config(&config));
        assert!(protocol.connect(&config));
        assert!(protocol.is_connected());
        assert_eq!(protocol.devices(), vec!["modbus_TCP_slave".to_owned()]);
        let info = protocol.device_info("modbus_TCP_slave").unwrap();
        assert_eq!(info.mode, "Slave");
        assert_eq!(info.protocol, "Modbus");
        // slaves cannot be read through the registry interface
        assert!(protocol.read_data("modbus_TCP_slave", 0, 1).is_empty());

        protocol.disconnect();
        assert!(!protocol.is_connected());
        assert!(protocol.devices().is_empty());
        protocol.disconnect();
    }

    #[test]
    fn unreachable_master() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut protocol = ModbusProtocol::new();
        let config = json!({
            "mode": "master",
            "protocol_type": "TCP",
            "ip": "127.0.0.1",
            "port": port,
            "timeout_ms": 200,
        });
        assert!(!protocol.connect(&config));
        assert!(!protocol.is_connected());
    }
}

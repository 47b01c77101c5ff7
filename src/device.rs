// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Uniform device surface on top of a master or a slave.

use std::fmt;

use serde::Serialize;

use crate::{
    error::TransportError,
    frame::{Address, Coil, Quantity, Word},
    master::Master,
    slave::SlaveHandle,
    store::RegisterStore,
};

const CAPABILITIES: &[&str] = &[
    "read_holding_registers",
    "write_holding_registers",
    "read_coils",
    "write_coils",
    "read_discrete_inputs",
    "read_input_registers",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
}

/// What a device does: request data from a remote slave or serve its own
/// register store.
pub enum Role {
    Master(Box<dyn Master>),
    Slave(SlaveHandle),
}

impl Role {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Master(_) => "Master",
            Self::Slave(_) => "Slave",
        }
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master(master) => f
                .debug_struct("Master")
                .field("unit_id", &master.unit_id())
                .field("connected", &master.is_connected())
                .finish(),
            Self::Slave(handle) => f.debug_tuple("Slave").field(handle).finish(),
        }
    }
}

/// Description of a device for the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub protocol: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub status: DeviceStatus,
    pub mode: &'static str,
    pub capabilities: Vec<&'static str>,
}

/// A logical Modbus device.
///
/// None of the operations fail: reads of a master return exactly `count`
/// values (zero-filled on failure), reads of a slave return nothing, and
/// writes report success as `bool`. The reason of the last failure is
/// available through [`Self::last_error`].
#[derive(Debug)]
pub struct ModbusDevice {
    id: String,
    protocol: String,
    role: Role,
    status: DeviceStatus,
    last_error: Option<String>,
}

impl ModbusDevice {
    pub fn new(id: impl Into<String>, protocol: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            protocol: protocol.into(),
            role,
            status: DeviceStatus::Connected,
            last_error: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.role
    }

    #[must_use]
    pub const fn status(&self) -> DeviceStatus {
        self.status
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == DeviceStatus::Connected
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Register store of a slave device.
    #[must_use]
    pub const fn store(&self) -> Option<&RegisterStore> {
        match &self.role {
            Role::Master(_) => None,
            Role::Slave(handle) => Some(handle.store()),
        }
    }

    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            device_id: self.id.clone(),
            protocol: self.protocol.clone(),
            kind: "Modbus Device",
            status: self.status,
            mode: self.role.name(),
            capabilities: CAPABILITIES.to_vec(),
        }
    }

    pub fn connect(&mut self) -> bool {
        let res = match &mut self.role {
            Role::Master(master) => master.connect(),
            Role::Slave(handle) if handle.is_running() => Ok(()),
            Role::Slave(_) => Err(TransportError::InvalidConfig(
                "a stopped slave cannot be restarted".into(),
            )),
        };
        match res {
            Ok(()) => {
                self.status = DeviceStatus::Connected;
                true
            }
            Err(err) => {
                self.fail(&err);
                false
            }
        }
    }

    pub fn disconnect(&mut self) -> bool {
        match &mut self.role {
            Role::Master(master) => master.stop(),
            Role::Slave(handle) => {
                if let Err(err) = handle.stop() {
                    self.last_error = Some(err.to_string());
                }
            }
        }
        self.status = DeviceStatus::Disconnected;
        true
    }

    pub fn read_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        self.read(address, count, "registers", |master| {
            master.try_read_holding_registers(address, count)
        })
    }

    pub fn read_input_registers(&mut self, address: Address, count: Quantity) -> Vec<Word> {
        self.read(address, count, "input registers", |master| {
            master.try_read_input_registers(address, count)
        })
    }

    pub fn read_coils(&mut self, address: Address, count: Quantity) -> Vec<Coil> {
        self.read(address, count, "coils", |master| {
            master.try_read_coils(address, count)
        })
    }

    pub fn read_discrete_inputs(&mut self, address: Address, count: Quantity) -> Vec<Coil> {
        self.read(address, count, "discrete inputs", |master| {
            master.try_read_discrete_inputs(address, count)
        })
    }

    /// Write holding registers, one value with a single register write.
    pub fn write_registers(&mut self, address: Address, values: &[Word]) -> bool {
        self.write("registers", |master| match values {
            [] => Err(TransportError::InvalidConfig("nothing to write".into())),
            [value] => master.try_write_single_register(address, *value),
            values => master.try_write_multiple_registers(address, values),
        })
    }

    pub fn write_coils(&mut self, address: Address, values: &[Coil]) -> bool {
        self.write("coils", |master| master.try_write_multiple_coils(address, values))
    }

    fn read<T: Clone + Default>(
        &mut self,
        address: Address,
        count: Quantity,
        what: &str,
        op: impl FnOnce(&mut dyn Master) -> Result<Vec<T>, TransportError>,
    ) -> Vec<T> {
        let Role::Master(master) = &mut self.role else {
            self.last_error = Some(format!("cannot read {what} in slave mode"));
            return vec![];
        };
        match op(master.as_mut()) {
            Ok(values) => values,
            Err(err) => {
                log::warn!("{}: reading {count} {what} at {address} failed: {err}", self.id);
                self.fail(&err);
                vec![T::default(); usize::from(count)]
            }
        }
    }

    fn write(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut dyn Master) -> Result<(), TransportError>,
    ) -> bool {
        let Role::Master(master) = &mut self.role else {
            self.last_error = Some(format!("cannot write {what} in slave mode"));
            return false;
        };
        match op(master.as_mut()) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}: writing {what} failed: {err}", self.id);
                self.fail(&err);
                false
            }
        }
    }

    fn fail(&mut self, err: &TransportError) {
        self.last_error = Some(err.to_string());
    }
}

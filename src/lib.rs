// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

pub mod cancel;
pub mod codec;
pub mod config;
pub mod device;
mod error;
mod frame;
pub mod master;
pub mod observer;
pub mod protocol;
pub mod serial;
pub mod service;
pub mod slave;
pub mod store;
mod util;

pub use codec::rtu;
pub use codec::tcp;
pub use error::*;
pub use frame::*;

pub use self::{
    cancel::CancellationToken,
    config::ProtocolConfig,
    device::{DeviceInfo, DeviceStatus, ModbusDevice, Role},
    master::{Master, RtuMaster, TcpMaster},
    protocol::ModbusProtocol,
    slave::{RtuSlave, Slave, SlaveHandle, TcpSlave},
    store::RegisterStore,
};

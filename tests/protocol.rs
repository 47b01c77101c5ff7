// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use std::net::TcpListener;

use modbus_engine::{DeviceStatus, ModbusProtocol};
use serde_json::json;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn validate_configurations() {
    let protocol = ModbusProtocol::new();
    assert!(protocol.validate_config(&json!({
        "mode": "master", "protocol_type": "TCP", "ip": "10.0.0.1", "port": 502
    })));
    assert!(protocol.validate_config(&json!({
        "mode": "slave", "protocol_type": "RTU", "port": "/dev/ttyS0"
    })));
    assert!(!protocol.validate_config(&json!({
        "mode": "master", "protocol_type": "TCP", "ip": "10.0.0.1"
    })));
    assert!(!protocol.validate_config(&json!({
        "mode": "master", "protocol_type": "RTU"
    })));
    assert!(!protocol.validate_config(&json!({
        "mode": "gateway", "protocol_type": "TCP", "ip": "10.0.0.1", "port": 502
    })));
}

#[test]
fn master_and_slave_through_the_registry_interface() {
    common::init_logging();
    let port = free_port();

    let mut server = ModbusProtocol::new();
    assert!(server.connect(&json!({
        "mode": "slave",
        "protocol_type": "TCP",
        "ip": "127.0.0.1",
        "port": port,
        "slave_id": 3,
        "accept_timeout_ms": 50,
    })));
    assert_eq!(server.status(), DeviceStatus::Connected);

    let mut client = ModbusProtocol::new();
    assert!(client.connect(&json!({
        "mode": "master",
        "protocol_type": "TCP",
        "ip": "127.0.0.1",
        "port": port.to_string(),
        "slave_id": 3,
        "timeout_ms": 1000,
    })));
    assert_eq!(client.devices(), vec!["modbus_TCP_master".to_owned()]);

    assert_eq!(
        client.read_data("modbus_TCP_master", 0, 10),
        vec![1000, 1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800, 1900]
    );
    assert!(client.write_data("modbus_TCP_master", 0, &[100]));
    assert_eq!(client.read_data("modbus_TCP_master", 0, 1), vec![100]);
    assert!(client.write_data("modbus_TCP_master", 4, &[1, 2]));

    let store = server
        .device("modbus_TCP_slave")
        .and_then(|device| device.store())
        .unwrap();
    assert_eq!(store.read_holding_registers(4, 2).unwrap(), vec![1, 2]);

    let device = client.device_mut("modbus_TCP_master").unwrap();
    assert_eq!(device.read_coils(0, 3), vec![true, false, true]);
    assert!(device.write_coils(0, &[false]));
    assert_eq!(device.read_coils(0, 1), vec![false]);

    // unknown devices
    assert!(client.read_data("modbus_RTU_master", 0, 1).is_empty());
    assert!(!client.write_data("modbus_RTU_master", 0, &[1]));

    client.disconnect();
    assert!(!client.is_connected());
    assert!(client.read_data("modbus_TCP_master", 0, 1).is_empty());

    server.disconnect();
    assert_eq!(server.status(), DeviceStatus::Disconnected);
}

#[test]
fn failed_reads_are_zero_filled() {
    common::init_logging();
    let port = free_port();
    let mut server = ModbusProtocol::new();
    assert!(server.connect(&json!({
        "mode": "slave", "protocol_type": "TCP", "ip": "127.0.0.1", "port": port,
        "accept_timeout_ms": 50,
    })));
    let mut client = ModbusProtocol::new();
    assert!(client.connect(&json!({
        "mode": "master", "protocol_type": "TCP", "ip": "127.0.0.1", "port": port,
    })));
    assert_eq!(client.read_data("modbus_TCP_master", 9999, 4), vec![0; 4]);
    let device = client.device("modbus_TCP_master").unwrap();
    assert!(device.last_error().is_some());
    assert!(device.is_available());
}

#[test]
fn reconnect_replaces_the_device() {
    common::init_logging();
    let mut protocol = ModbusProtocol::new();
    let first = json!({
        "mode": "slave", "protocol_type": "TCP", "ip": "127.0.0.1", "port": free_port(),
        "accept_timeout_ms": 50,
    });
    assert!(protocol.connect(&first));
    let second = json!({
        "mode": "slave", "protocol_type": "TCP", "ip": "127.0.0.1", "port": free_port(),
        "accept_timeout_ms": 50,
    });
    assert!(protocol.connect(&second));
    assert_eq!(protocol.devices().len(), 1);

    // an invalid configuration leaves the running slave untouched
    assert!(!protocol.connect(&json!({ "mode": "slave" })));
    assert!(protocol.is_connected());
    assert_eq!(protocol.devices(), vec!["modbus_TCP_slave".to_owned()]);
    let info = protocol.device_info("modbus_TCP_slave").unwrap();
    assert_eq!(info.kind, "Modbus Device");
    assert_eq!(info.status, DeviceStatus::Connected);
}

// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use std::time::Duration;

use modbus_engine::slave::SlaveTiming;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fast_slave_timing() -> SlaveTiming {
    SlaveTiming {
        accept_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        frame_timeout: Duration::from_millis(50),
    }
}

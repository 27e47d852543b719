// Copyright (c) 2024 The Gimbal developers
// SPDX-License-Identifier: MIT
// Licensed under the MIT License;
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://spdx.org/licenses/MIT
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hardware-facing capability contracts.
//!
//! These are the interfaces the core and application units consume;
//! platform crates bind concrete drivers with [crate::bind_unit]. The
//! framework itself registers no implementations. Drivers return
//! [Error::NotImplemented] for operations the platform cannot support.

use std::time::SystemTime;

use crate::Error;

/// Severity for the [Logger] capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Message sink for units that log on behalf of external components
/// (remote peers, scripted commands). Framework code logs through the
/// `logging` crate directly.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

pub type Pin = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
    /// Alternate pin function, numbered per platform.
    Alt(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// A level change delivered by [Gpio::watch].
#[derive(Clone, Copy, Debug)]
pub struct PinEvent {
    pub pin: Pin,
    pub level: bool,
    pub timestamp: SystemTime,
}

/// General-purpose I/O pins.
#[async_trait::async_trait]
pub trait Gpio: Send + Sync {
    /// Pins available on this platform.
    fn pins(&self) -> Vec<Pin>;

    fn mode(&self, pin: Pin) -> Result<PinMode, Error>;
    fn set_mode(&self, pin: Pin, mode: PinMode) -> Result<(), Error>;
    fn set_pull(&self, pin: Pin, pull: Pull) -> Result<(), Error>;
    fn read(&self, pin: Pin) -> Result<bool, Error>;
    fn write(&self, pin: Pin, level: bool) -> Result<(), Error>;

    /// Watch a pin for edges. Events stop when the receiver is dropped.
    async fn watch(
        &self,
        pin: Pin,
        edge: Edge,
    ) -> Result<tokio::sync::mpsc::Receiver<PinEvent>, Error>;
}

/// Capability bits reported by an I2C bus driver, modelled on the Linux
/// `I2C_FUNC_*` flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct I2cFunctions(pub u64);

impl I2cFunctions {
    pub const PLAIN_I2C: u64 = 1 << 0;
    pub const SMBUS_BYTE: u64 = 1 << 1;
    pub const SMBUS_WORD: u64 = 1 << 2;
    pub const SMBUS_BLOCK: u64 = 1 << 3;

    pub fn supports(&self, flag: u64) -> bool {
        self.0 & flag != 0
    }
}

/// I2C/SMBus master access.
#[async_trait::async_trait]
pub trait I2c: Send + Sync {
    /// Bus device names, e.g. `/dev/i2c-1`.
    fn buses(&self) -> Vec<String>;

    fn functions(&self, bus: &str) -> Result<I2cFunctions, Error>;

    /// Probe the bus for responding slave addresses.
    async fn detect(&self, bus: &str) -> Result<Vec<u16>, Error>;

    async fn read_byte(&self, bus: &str, addr: u16, reg: u8) -> Result<u8, Error>;
    async fn write_byte(&self, bus: &str, addr: u16, reg: u8, value: u8) -> Result<(), Error>;
    async fn read_word(&self, bus: &str, addr: u16, reg: u8) -> Result<u16, Error>;
    async fn write_word(&self, bus: &str, addr: u16, reg: u8, value: u16) -> Result<(), Error>;
    async fn read_block(&self, bus: &str, addr: u16, reg: u8) -> Result<Vec<u8>, Error>;
    async fn write_block(&self, bus: &str, addr: u16, reg: u8, data: &[u8]) -> Result<(), Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: u32,
}

#[derive(Clone, Debug)]
pub struct DisplayInfo {
    pub id: String,
    pub modes: Vec<DisplayMode>,
    pub current: Option<DisplayMode>,
}

/// A client-owned pixel buffer handed to a display for scan-out.
#[derive(Clone, Debug)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes.
    pub stride: u32,
    /// Packed pixel data, `stride * height` bytes.
    pub data: std::sync::Arc<Vec<u8>>,
}

/// Display output control.
#[async_trait::async_trait]
pub trait DisplayManager: Send + Sync {
    fn displays(&self) -> Vec<DisplayInfo>;
    async fn select_mode(&self, display: &str, mode: DisplayMode) -> Result<(), Error>;
    async fn attach_framebuffer(&self, display: &str, fb: Framebuffer) -> Result<(), Error>;
    /// Flip the attached framebuffer to the screen.
    async fn commit(&self, display: &str) -> Result<(), Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioDirection {
    Playback,
    Capture,
}

#[derive(Clone, Debug)]
pub struct AudioDevice {
    pub name: String,
    pub direction: AudioDirection,
}

pub trait AudioManager: Send + Sync {
    fn devices(&self) -> Vec<AudioDevice>;
}

/// A network service record, as published or found on the local network.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub txt: Vec<(String, String)>,
}

/// Zero-configuration service discovery.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<ServiceRecord>, Error>;
    async fn lookup(&self, name: &str) -> Result<ServiceRecord, Error>;
    async fn announce(&self, record: ServiceRecord) -> Result<(), Error>;
}

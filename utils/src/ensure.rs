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

//! Tools for interrupting function flow unless some condition holds.

/// Early exit if given condition is not satisfied.
///
/// There are two variants:
/// * `ensure!(cond)` returns from the enclosing function with [`None`] if `cond` fails
/// * `ensure!(cond, err)` returns from the function with [`Err`]`(err)` if `cond` fails
///
/// Example with [Option]:
/// ```
/// # use utils::ensure;
/// fn pin_index(pin: u32, pin_count: u32) -> Option<usize> {
///     ensure!(pin < pin_count);
///     Some(pin as usize)
/// }
///
/// assert_eq!(pin_index(3, 8), Some(3));
/// assert_eq!(pin_index(9, 8), None);
/// ```
///
/// Example with [Result]:
/// ```
/// # use utils::ensure;
/// # #[derive(PartialEq, Eq, Debug)]
/// enum BusError {
///     NoSuchBus,
///     AddressReserved,
/// }
///
/// fn select_slave(bus: u32, addr: u8) -> Result<u8, BusError> {
///     ensure!(bus < 2, BusError::NoSuchBus);
///     ensure!(addr >= 0x08 && addr <= 0x77, BusError::AddressReserved);
///     Ok(addr)
/// }
///
/// assert_eq!(select_slave(0, 0x40), Ok(0x40));
/// assert_eq!(select_slave(5, 0x40), Err(BusError::NoSuchBus));
/// assert_eq!(select_slave(1, 0x03), Err(BusError::AddressReserved));
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr $(,)?) => {
        $cond.then(|| ())?
    };
    ($cond:expr, $err:expr $(,)?) => {
        $cond.then(|| ()).ok_or_else(|| $err)?
    };
}

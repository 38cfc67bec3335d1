/*
goldtree library & toolset
Copyright (C) 2018 Steve Muller <steve.muller@outlook.com>

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

use std::time::Duration;
use log::{debug, info};
use rusb::{DeviceHandle, Direction, GlobalContext, TransferType};
use super::error::Error;
use super::io::{Timeout, Transport};

pub const DEFAULT_VENDOR_ID: u16 = 0x057E;
pub const DEFAULT_PRODUCT_ID: u16 = 0x3000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Copy, Clone, Debug)]
pub struct UsbConfig {
	pub vendor_id: u16,
	pub product_id: u16,
	/// Used for writes and for idle polling while awaiting the next frame.
	pub timeout: Duration,
}

impl Default for UsbConfig {
	fn default() -> UsbConfig {
		UsbConfig {
			vendor_id: DEFAULT_VENDOR_ID,
			product_id: DEFAULT_PRODUCT_ID,
			timeout: DEFAULT_TIMEOUT,
		}
	}
}

/// Bulk transport over the first interface of the console's USB device.
pub struct UsbTransport {
	handle: DeviceHandle<GlobalContext>,
	endpoint_in: u8,
	endpoint_out: u8,
	interface_number: u8,
	product: String,
	serial_number: String,
}

impl UsbTransport {
	pub fn open(config: &UsbConfig) -> Result<UsbTransport, Error> {
		debug!("Looking for USB device {:04x}:{:04x} ...", config.vendor_id, config.product_id);
		let mut handle = rusb::open_device_with_vid_pid(config.vendor_id, config.product_id)
			.ok_or(Error::DeviceNotFound { vendor_id: config.vendor_id, product_id: config.product_id })?;

		let device = handle.device();
		let device_descriptor = device.device_descriptor()?;
		handle.set_active_configuration(1)?;
		let config_descriptor = device.active_config_descriptor()?;

		// Bulk endpoints of interface 0, alternate setting 0
		let mut endpoint_in = None;
		let mut endpoint_out = None;
		let mut interface_number = 0;
		if let Some(interface) = config_descriptor.interfaces().next() {
			if let Some(descriptor) = interface.descriptors().next() {
				interface_number = descriptor.interface_number();
				for endpoint in descriptor.endpoint_descriptors() {
					if endpoint.transfer_type() != TransferType::Bulk {
						continue;
					}
					match endpoint.direction() {
						Direction::In if endpoint_in.is_none() => endpoint_in = Some(endpoint.address()),
						Direction::Out if endpoint_out.is_none() => endpoint_out = Some(endpoint.address()),
						_ => {},
					}
				}
			}
		}
		let endpoint_in = endpoint_in.ok_or(Error::Usb(rusb::Error::NotFound))?;
		let endpoint_out = endpoint_out.ok_or(Error::Usb(rusb::Error::NotFound))?;
		debug!("Bulk endpoints: IN {:#04X}, OUT {:#04X}.", endpoint_in, endpoint_out);

		handle.claim_interface(interface_number)?;

		let product = handle.read_product_string_ascii(&device_descriptor).unwrap_or_default();
		let serial_number = handle.read_serial_number_string_ascii(&device_descriptor).unwrap_or_default();
		info!("Connected to {} - {}", product, serial_number);

		Ok(UsbTransport { handle, endpoint_in, endpoint_out, interface_number, product, serial_number })
	}

	pub fn product(&self) -> &str {
		&self.product
	}

	pub fn serial_number(&self) -> &str {
		&self.serial_number
	}
}

/// Parses a USB vendor or product id, written in hex with or without a `0x` prefix.
pub fn parse_id(value: &str) -> Result<u16, String> {
	let digits = value.trim_start_matches("0x").trim_start_matches("0X");
	u16::from_str_radix(digits, 16).map_err(|_| format!("'{}' is not a hexadecimal USB id", value))
}

/// libusb treats a zero timeout as "wait forever".
fn to_duration(timeout: Timeout) -> Duration {
	match timeout {
		Timeout::Finite(duration) => duration,
		Timeout::Infinite => Duration::from_millis(0),
	}
}

fn map_usb_error(error: rusb::Error) -> Error {
	match error {
		rusb::Error::Timeout => Error::Timeout,
		rusb::Error::NoDevice => Error::Disconnected,
		other => Error::Usb(other),
	}
}

impl Transport for UsbTransport {
	fn read(&mut self, size: usize, timeout: Timeout) -> Result<Vec<u8>, Error> {
		let mut buffer = vec![0u8; size];
		loop {
			let received = self.handle.read_bulk(self.endpoint_in, &mut buffer, to_duration(timeout)).map_err(map_usb_error)?;
			// Zero-length packets carry nothing; wait for the next transfer
			if received > 0 {
				buffer.truncate(received);
				return Ok(buffer);
			}
		}
	}

	fn write(&mut self, data: &[u8], timeout: Timeout) -> Result<(), Error> {
		let mut written = 0;
		while written < data.len() {
			written += self.handle.write_bulk(self.endpoint_out, &data[written..], to_duration(timeout)).map_err(map_usb_error)?;
		}
		Ok(())
	}
}

impl Drop for UsbTransport {
	fn drop(&mut self) {
		let _ = self.handle.release_interface(self.interface_number);
	}
}

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

#[macro_use] // enable value_t! macro
extern crate clap;
extern crate goldtree;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use clap::{Arg, App};
use goldtree::Error;
use goldtree::install::{Installer, Outcome};
use goldtree::io::{init_logging, Timeout};
use goldtree::pfs0::{Container, DEFAULT_CHUNK_SIZE};
use goldtree::usb::{self, UsbConfig, UsbTransport};

fn main() {
	let default_chunk_size = DEFAULT_CHUNK_SIZE.to_string();
	let matches = App::new("nspinstall")
		.version("1.0")
		.author("Steve Muller <steve.muller@outlook.com>")
		.about("This utility offers an NSP package to Goldleaf over USB and streams the contents the console asks for.")
		.arg(Arg::with_name("verbose")
			.short("v")
			.help("Increases the debug verbosity. This will print a lot of debug messages to standard error (STDERR). Can be used up to 3 times.")
			.multiple(true)
			.takes_value(false))
		.arg(Arg::with_name("input")
			.value_name("NSP")
			.help("The NSP package to install.")
			.required(true))
		.arg(Arg::with_name("vid")
			.value_name("VENDORID")
			.help("USB vendor ID of the console, in hex.")
			.long("vid")
			.default_value("057e")
			.validator(|v| usb::parse_id(&v).map(|_| ())))
		.arg(Arg::with_name("pid")
			.value_name("PRODUCTID")
			.help("USB product ID of the console, in hex.")
			.long("pid")
			.default_value("3000")
			.validator(|v| usb::parse_id(&v).map(|_| ())))
		.arg(Arg::with_name("timeout")
			.value_name("MILLISECONDS")
			.help("Timeout for USB writes.")
			.long("timeout")
			.default_value("3000"))
		.arg(Arg::with_name("chunk-size")
			.value_name("BYTES")
			.help("Size of the pieces in which contents are sent.")
			.long("chunk-size")
			.default_value(&default_chunk_size))
	.get_matches();

	init_logging(matches.occurrences_of("verbose"));

	let defaults = UsbConfig::default();
	let config = UsbConfig {
		vendor_id: matches.value_of("vid").and_then(|v| usb::parse_id(v).ok()).unwrap_or(defaults.vendor_id),
		product_id: matches.value_of("pid").and_then(|v| usb::parse_id(v).ok()).unwrap_or(defaults.product_id),
		timeout: Duration::from_millis(value_t!(matches, "timeout", u64).unwrap_or_else(|e| e.exit())),
	};
	let chunk_size = value_t!(matches, "chunk-size", usize).unwrap_or_else(|e| e.exit());
	let input = matches.value_of("input").unwrap_or_default();

	match install(Path::new(input), &config, chunk_size) {
		Ok(Outcome::Completed) => println!("Installation of '{}' completed.", input),
		Ok(Outcome::Declined) => println!("Installation of '{}' was canceled on the console.", input),
		Err(Error::ProtocolViolation(message)) => {
			eprintln!("PROTOCOL ERROR: {}", message);
			std::process::exit(2);
		},
		Err(e) => {
			eprintln!("I/O ERROR: {}", e);
			std::process::exit(1);
		},
	}
}

fn install(path: &Path, config: &UsbConfig, chunk_size: usize) -> Result<Outcome, Error> {
	if chunk_size == 0 {
		return Err(Error::InvalidChunkSize);
	}
	let file = BufReader::new(File::open(path)?);
	let container = Container::new(file)?;
	println!("Package contains {} entries.", container.entries().len());

	let name = path.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.display().to_string());

	let transport = UsbTransport::open(config)?;
	println!("Connected to {} - {}", transport.product(), transport.serial_number());
	let mut installer = Installer::new(transport, container, name, chunk_size, Timeout::Finite(config.timeout));
	installer.run()
}

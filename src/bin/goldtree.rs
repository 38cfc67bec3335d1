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
extern crate signal_hook;

use std::io::{stdin, stdout, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use clap::{Arg, App, ArgMatches};
use goldtree::Error;
use goldtree::drive::{DriveTable, SpecialPaths};
use goldtree::goldleaf::Dispatcher;
use goldtree::io::init_logging;
use goldtree::session::{FileSelector, Preselected, Prompt, Session};
use goldtree::usb::{self, UsbConfig, UsbTransport};
use signal_hook::consts::{SIGINT, SIGTERM};

fn main() {
	let matches = App::new("goldtree")
		.version("1.0")
		.author("Steve Muller <steve.muller@outlook.com>")
		.about("This utility lets Goldleaf browse, read and write files on this computer over USB. Each given directory is offered as a drive, next to a ROOT drive for the whole filesystem.")
		.arg(Arg::with_name("verbose")
			.short("v")
			.help("Increases the debug verbosity. This will print a lot of debug messages to standard error (STDERR). Can be used up to 3 times.")
			.multiple(true)
			.takes_value(false))
		.arg(Arg::with_name("selected-file")
			.value_name("FILE")
			.help("The file that is handed to Goldleaf when it asks for a file selection. If omitted and the first PATH is a file, that file is used. Otherwise the selection is prompted for on the terminal.")
			.short("f")
			.long("selected-file")
			.takes_value(true))
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
			.help("Timeout for USB writes, and the interval at which an idle connection checks for Ctrl-C.")
			.long("timeout")
			.default_value("3000"))
		.arg(Arg::with_name("drives")
			.value_name("PATH")
			.help("Directories to offer as drives, named after the directory. A file stands for its parent directory.")
			.multiple(true)
			.required(false))
	.get_matches();

	init_logging(matches.occurrences_of("verbose"));

	let mut drive_paths: Vec<PathBuf> = matches.values_of("drives")
		.map(|values| values.map(PathBuf::from).collect())
		.unwrap_or_default();
	let mut selected_file = matches.value_of("selected-file").map(PathBuf::from);
	if selected_file.is_none() && drive_paths.first().map_or(false, |path| path.is_file()) {
		selected_file = Some(drive_paths.remove(0));
	}

	if let Err(e) = serve(&drive_paths, selected_file, usb_config(&matches)) {
		eprintln!("I/O ERROR: {}", e);
		std::process::exit(1);
	}
}

fn usb_config(matches: &ArgMatches) -> UsbConfig {
	let defaults = UsbConfig::default();
	UsbConfig {
		vendor_id: matches.value_of("vid").and_then(|v| usb::parse_id(v).ok()).unwrap_or(defaults.vendor_id),
		product_id: matches.value_of("pid").and_then(|v| usb::parse_id(v).ok()).unwrap_or(defaults.product_id),
		timeout: Duration::from_millis(value_t!(matches, "timeout", u64).unwrap_or_else(|e| e.exit())),
	}
}

fn serve(drive_paths: &[PathBuf], selected_file: Option<PathBuf>, config: UsbConfig) -> Result<(), Error> {
	// The first Ctrl-C asks the loop to stop; a second one while it is still busy terminates
	let interrupted = Arc::new(AtomicBool::new(false));
	for &signal in [SIGINT, SIGTERM].iter() {
		signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&interrupted))?;
		signal_hook::flag::register(signal, Arc::clone(&interrupted))?;
	}

	let drives = DriveTable::from_paths(drive_paths)?;
	for drive in drives.iter() {
		println!("Drive {}: {}", drive.name, drive.root.display());
	}
	let selector: Box<dyn FileSelector> = match selected_file {
		Some(path) => {
			println!("Selected file: {}", path.display());
			Box::new(Preselected(path))
		},
		None => Box::new(Prompt::new(BufReader::new(stdin()), stdout())),
	};
	let special_paths = SpecialPaths::discover();
	if special_paths.is_empty() {
		println!("No special paths found.");
	}
	let session = Session::new(drives, special_paths, selector);

	let transport = UsbTransport::open(&config)?;
	println!("Connected to {} - {}", transport.product(), transport.serial_number());
	let mut dispatcher = Dispatcher::new(transport, session, config.timeout);
	dispatcher.run(&interrupted)
}

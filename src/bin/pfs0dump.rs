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

use std::io::{Cursor, Read, Seek, Write, stdin, stdout};
use std::fs::File;
use std::io::BufReader;
use clap::{Arg, App, AppSettings, SubCommand, ArgMatches};
use goldtree::Error;
use goldtree::io::init_logging;
use goldtree::pfs0::{Container, DEFAULT_CHUNK_SIZE};

trait ReadSeek: Read + Seek { }
impl<T> ReadSeek for T where T: Read + Seek { }

fn main() {
	let matches = App::new("pfs0dump")
		.version("1.0")
		.author("Steve Muller <steve.muller@outlook.com>")
		.about("This utility reads a PFS0 archive (such as an NSP package) and dumps the contained files.")
		.setting(AppSettings::SubcommandRequired)
		.arg(Arg::with_name("verbose")
			.short("v")
			.help("Increases the debug verbosity. This will print a lot of debug messages to standard error (STDERR). Can be used up to 3 times.")
			.multiple(true)
			.takes_value(false))
		.subcommand(SubCommand::with_name("list")
			.about("Lists all files contained in the PFS0 archive. Each output line represents a file, and contains the file ID, the absolute offset, the size in bytes and the name, separated by spaces.")
			.arg(Arg::with_name("input")
				.value_name("FILE")
				.help("A PFS0 archive. If omitted, the archive will be read from STDIN instead.")
				.short("i")
				.long("input")
				.required(false))
		)
		.subcommand(SubCommand::with_name("dump")
			.about("Dumps a file from the PFS0 archive.")
			.arg(Arg::with_name("id")
				.value_name("FILEID")
				.help("The ID of the file that shall be dumped.")
				.long("id")
				.required(true))
			.arg(Arg::with_name("output")
				.value_name("FILE")
				.help("The file where the contents shall be written to. If this parameter is not specified (or has the value '-'), the contents will be written to STDOUT instead.")
				.short("o")
				.long("output")
				.required(false))
			.arg(Arg::with_name("input")
				.value_name("FILE")
				.help("A PFS0 archive. If omitted, the archive will be read from STDIN instead.")
				.short("i")
				.long("input")
				.required(false))
		)
	.get_matches();

	init_logging(matches.occurrences_of("verbose"));

	if let Err(e) = dispatch(matches) {
		eprintln!("I/O ERROR: {}", e);
		std::process::exit(1);
	}
}

fn dispatch(matches: ArgMatches) -> Result<(), Error> {
	match matches.subcommand() {
		("list", Some(submatches)) => dispatch_list(submatches),
		("dump", Some(submatches)) => dispatch_dump(submatches),
		_ => unreachable!("subcommand is required"),
	}
}

fn open_input(inputfile: &str) -> Result<Box<dyn ReadSeek>, Error> {
	Ok(match inputfile {
		"" | "-" => {
			// STDIN cannot seek, so buffer it whole
			let mut buffer = Vec::new();
			stdin().read_to_end(&mut buffer)?;
			Box::new(Cursor::new(buffer))
		},
		_ => Box::new(BufReader::new(File::open(inputfile)?)),
	})
}

fn dispatch_list(matches: &ArgMatches) -> Result<(), Error> {
	let input = open_input(matches.value_of("input").unwrap_or(""))?;
	let container = Container::new(input)?;
	for (index, entry) in container.entries().iter().enumerate() {
		println!("{} {:#X} {} {}", index, container.absolute_offset(index)?, entry.size, entry.name);
	}
	Ok(())
}

fn dispatch_dump(matches: &ArgMatches) -> Result<(), Error> {
	let inputfile = matches.value_of("input").unwrap_or("");
	let outputfile = matches.value_of("output").unwrap_or("");
	let id = value_t!(matches, "id", usize).unwrap_or_else(|e| e.exit());

	let mut container = Container::new(open_input(inputfile)?)?;
	let mut output: Box<dyn Write> = match outputfile {
		"" | "-" => Box::new(stdout()),
		_ => Box::new(File::create(outputfile)?),
	};
	for chunk in container.stream_entry(id, DEFAULT_CHUNK_SIZE)? {
		output.write_all(&chunk?)?;
	}
	output.flush()?;
	Ok(())
}

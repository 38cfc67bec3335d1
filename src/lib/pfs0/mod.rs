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

// PFS0 is the flat archive format of NSP packages: a header, a table of fixed-size entries,
// a table of NUL-terminated names, then the entry data.

mod structures;

use self::structures::{Header, ENTRY_SIZE, HEADER_SIZE, MAGIC};
use std::cmp::min;
use std::io::{Read, Seek, SeekFrom};
use log::{debug, trace};
use super::error::Error;

/// Default chunk size for streaming entries.
pub const DEFAULT_CHUNK_SIZE: usize = 0x100000;

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
	pub name: String,
	/// Offset of the entry's data, relative to the start of the data region.
	pub offset: u64,
	pub size: u64,
}

pub struct Container<TFile: Read + Seek> {
	file: TFile,
	header: Header,
	entries: Vec<Entry>,
}

impl<TFile> Container<TFile> where TFile: Read + Seek {
	pub fn new(mut file: TFile) -> Result<Container<TFile>, Error> {
		debug!("[new] Reading PFS0 header ({} bytes) ...", HEADER_SIZE);
		let mut buffer = [0; HEADER_SIZE as usize];
		file.seek(SeekFrom::Start(0))?;
		file.read_exact(&mut buffer)?;
		if buffer[0..4] != MAGIC {
			debug!("[new] Bad magic number {:02X?}, expected 'PFS0'!", &buffer[0..4]);
			return Err(Error::NotPfs0);
		}
		let header = Header {
			number_of_entries: read_u32(&buffer[4..8]),
			string_table_size: read_u32(&buffer[8..12]),
		};
		debug!("[new] {} entries, string table of {} bytes.", header.number_of_entries, header.string_table_size);

		// Entry table
		let mut raw_entries = Vec::new();
		let mut entry_buffer = [0; ENTRY_SIZE as usize];
		for _ in 0..header.number_of_entries {
			file.read_exact(&mut entry_buffer)?;
			let offset = read_u64(&entry_buffer[0..8]);
			let size = read_u64(&entry_buffer[8..16]);
			let name_offset = read_u32(&entry_buffer[16..20]) as usize;
			// skip reserved (4 bytes)
			raw_entries.push((offset, size, name_offset));
		}

		// String table, read no further than the file goes
		let mut strings = Vec::new();
		file.seek(SeekFrom::Start(header.string_table_offset()))?;
		(&mut file).take(header.string_table_size as u64).read_to_end(&mut strings)?;
		if strings.len() < header.string_table_size as usize {
			return Err(Error::InvalidContainer("string table extends past the end of the file"));
		}

		let mut entries = Vec::with_capacity(raw_entries.len());
		for (offset, size, name_offset) in raw_entries {
			let name = read_name(&strings, name_offset)?;
			trace!("[new] Entry '{}': offset {:#X}, {} bytes.", name, offset, size);
			let end = header.data_offset().checked_add(offset).and_then(|start| start.checked_add(size));
			if end.is_none() {
				debug!("[new] Entry '{}' at {:#X} with {} bytes lies beyond any addressable offset!", name, offset, size);
				return Err(Error::InvalidContainer("entry offset overflows"));
			}
			entries.push(Entry { name, offset, size });
		}
		debug!("[new] Data region starts at {:#X}.", header.data_offset());

		Ok(Container { file, header, entries })
	}

	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	pub fn entry(&self, index: usize) -> Result<&Entry, Error> {
		self.entries.get(index).ok_or(Error::EntryOutOfRange { index, count: self.entries.len() })
	}

	/// Start of the data region: the header, the entry table and the string table.
	pub fn data_offset(&self) -> u64 {
		self.header.data_offset()
	}

	/// Offset of an entry's data from the start of the archive.
	pub fn absolute_offset(&self, index: usize) -> Result<u64, Error> {
		self.data_offset().checked_add(self.entry(index)?.offset)
			.ok_or(Error::InvalidContainer("entry offset overflows"))
	}

	/// Index of the first entry whose name has the given extension (compared case-insensitively).
	pub fn find_by_extension(&self, extension: &str) -> Option<usize> {
		let suffix = format!(".{}", extension.to_lowercase());
		self.entries.iter().position(|entry| entry.name.to_lowercase().ends_with(&suffix))
	}

	/// Reads an entry's data in one piece.
	pub fn read_entry(&mut self, index: usize) -> Result<Vec<u8>, Error> {
		let offset = self.absolute_offset(index)?;
		let size = self.entries[index].size;
		debug!("[read_entry] Reading entry #{} ({} bytes at {:#X}) ...", index, size, offset);
		let mut buffer = Vec::new();
		self.file.seek(SeekFrom::Start(offset))?;
		(&mut self.file).take(size).read_to_end(&mut buffer)?;
		if (buffer.len() as u64) < size {
			return Err(Error::InvalidContainer("entry data extends past the end of the file"));
		}
		Ok(buffer)
	}

	/// Reads an entry's data in chunks of at most `chunk_size` bytes. Every call starts over at
	/// the beginning of the entry.
	pub fn stream_entry(&mut self, index: usize, chunk_size: usize) -> Result<Chunks<TFile>, Error> {
		if chunk_size == 0 {
			return Err(Error::InvalidChunkSize);
		}
		let offset = self.absolute_offset(index)?;
		let remaining = self.entries[index].size;
		debug!("[stream_entry] Streaming entry #{} ({} bytes at {:#X}) in chunks of {} bytes ...", index, remaining, offset, chunk_size);
		Ok(Chunks { file: &mut self.file, offset, remaining, chunk_size })
	}

	pub fn into_inner(self) -> TFile {
		self.file
	}
}

/// Iterator over the chunks of one entry. Chunk sizes add up to exactly the entry size.
pub struct Chunks<'a, TFile: Read + Seek> {
	file: &'a mut TFile,
	offset: u64,
	remaining: u64,
	chunk_size: usize,
}

impl<'a, TFile> Iterator for Chunks<'a, TFile> where TFile: Read + Seek {
	type Item = Result<Vec<u8>, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		let length = min(self.chunk_size as u64, self.remaining) as usize;
		let mut chunk = vec![0; length];
		let result = self.file.seek(SeekFrom::Start(self.offset))
			.and_then(|_| self.file.read_exact(&mut chunk));
		match result {
			Ok(()) => {
				trace!("[next] Chunk of {} bytes at {:#X}.", length, self.offset);
				self.offset += length as u64;
				self.remaining -= length as u64;
				Some(Ok(chunk))
			},
			Err(e) => {
				// Stop after the first failure
				self.remaining = 0;
				Some(Err(Error::Io(e)))
			},
		}
	}
}

fn read_u32(bytes: &[u8]) -> u32 {
	let mut buffer = [0; 4];
	buffer.copy_from_slice(&bytes[0..4]);
	u32::from_le_bytes(buffer)
}

fn read_u64(bytes: &[u8]) -> u64 {
	let mut buffer = [0; 8];
	buffer.copy_from_slice(&bytes[0..8]);
	u64::from_le_bytes(buffer)
}

fn read_name(strings: &[u8], offset: usize) -> Result<String, Error> {
	if offset >= strings.len() {
		return Err(Error::InvalidContainer("name offset outside the string table"));
	}
	let end = strings[offset..].iter().position(|&b| b == 0)
		.ok_or(Error::InvalidContainer("unterminated name in the string table"))?;
	Ok(String::from_utf8_lossy(&strings[offset..offset + end]).into_owned())
}

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

pub const MAGIC: [u8; 4] = *b"PFS0";

/// Magic, entry count, string table length and 4 reserved bytes.
pub const HEADER_SIZE: u64 = 0x10;

/// Data offset (8 bytes), data size (8 bytes), name offset (4 bytes), reserved (4 bytes).
pub const ENTRY_SIZE: u64 = 0x18;

/// The fixed part of a PFS0 header.
pub struct Header {
	pub number_of_entries: u32,
	pub string_table_size: u32,
}

impl Header {
	/// Where the string table starts.
	pub fn string_table_offset(&self) -> u64 {
		HEADER_SIZE + ENTRY_SIZE * self.number_of_entries as u64
	}

	/// Where the data region starts; entry offsets are relative to it.
	pub fn data_offset(&self) -> u64 {
		self.string_table_offset() + self.string_table_size as u64
	}
}

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

//! Host side of the Goldleaf USB protocol.
//!
//! The remote homebrew client browses, reads and writes a set of host directories ("drives")
//! through the block-framed command protocol in [`goldleaf`], and receives NSP packages for
//! installation through the negotiation protocol in [`install`].

pub mod error;
pub mod io;
pub mod usb;
pub mod codec;
pub mod drive;
pub mod session;
pub mod goldleaf;
pub mod pfs0;
pub mod install;

pub use error::Error;

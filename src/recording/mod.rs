// SPDX-License-Identifier: MIT
pub mod format;
pub mod jpeg;
pub mod reader;
pub mod writer;

// SPDX-License-Identifier: MIT
pub mod camera;
pub mod header;
pub mod sensors;
pub mod writer;

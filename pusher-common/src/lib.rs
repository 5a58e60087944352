// SPDX-FileCopyrightText: 2025 pusher contributors
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod settings;
pub mod types;

pub use settings::{Settings, SubindexPolicy};
pub use types::*;

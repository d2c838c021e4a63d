// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Native (host-provided) functions exposed to scripts.

use crate::value::Value;

/// Seconds since the Unix epoch, as a float. The language's only clock.
pub fn clock(_args: &[Value]) -> Value {
    let elapsed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Value::Number(elapsed.as_secs_f64())
}

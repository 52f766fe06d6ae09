//! Pure formatting helpers shared by every display surface.

/// Wall-clock milliseconds since the epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Number of decimal places implied by a string-formatted number.
///
/// Handles plain decimals ("1.50" → 2) and exponential notation
/// ("1e-4" → 4, "2.5e-3" → 4). Integers return 0.
pub fn get_decimal_count(value: &str) -> u32 {
    let lower = value.to_ascii_lowercase();

    if let Some(epos) = lower.find('e') {
        let (mantissa, exponent) = lower.split_at(epos);
        let exp: i32 = exponent[1..].parse().unwrap_or(0);
        let mantissa_decimals = mantissa
            .find('.')
            .map(|dot| (mantissa.len() - dot - 1) as i32)
            .unwrap_or(0);
        return (mantissa_decimals - exp).max(0) as u32;
    }

    match lower.find('.') {
        Some(dot) => (lower.len() - dot - 1) as u32,
        None => 0,
    }
}

/// Shorten a long address to `first5…last5`.
///
/// Inputs of 11 chars or fewer pass through unchanged, which also makes
/// the function idempotent: an already-abbreviated address (5 + '…' + 5)
/// abbreviates to itself.
pub fn abbreviate_address(addr: &str) -> String {
    let chars: Vec<char> = addr.chars().collect();
    if chars.len() <= 11 {
        return addr.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}…{tail}")
}

/// Format with thousands separators and a fixed number of decimals.
pub fn group_digits(n: f64, decimals: u32) -> String {
    let formatted = format!("{:.*}", decimals as usize, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if n < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Half-up rounding to a fixed number of decimals.
pub fn round_to_decimal(n: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (n * scale).round() / scale
}

/// Display decimals implied by a tick or lot size, e.g. 0.01 → 2, 1.0 → 0.
pub fn precision_from_increment(inc: f64) -> u32 {
    if inc <= 0.0 {
        return 0;
    }
    let mut decimals = 0u32;
    let mut scaled = inc;
    // Tick sizes are powers of ten in practice; cap the scan anyway.
    while decimals < 12 && (scaled.fract()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}

/// Clamp a value down to the nearest multiple of an increment.
pub fn floor_to_increment(value: f64, inc: f64) -> f64 {
    if inc <= 0.0 {
        return value;
    }
    (value / inc).floor() * inc
}

// Stop condition checking for token generation

/// Result of stop condition check
#[derive(Debug, PartialEq, Eq)]
pub struct StopConditionResult {
    /// Whether generation should stop
    pub should_stop: bool,
    /// Byte length the response must be cut to (drops the stop text itself)
    pub truncate_at: Option<usize>,
    /// Stop string that triggered the stop (for logging)
    pub matched_token: Option<String>,
}

impl StopConditionResult {
    pub fn no_stop() -> Self {
        Self {
            should_stop: false,
            truncate_at: None,
            matched_token: None,
        }
    }

    pub fn stop_at(index: usize, matched: &str) -> Self {
        Self {
            should_stop: true,
            truncate_at: Some(index),
            matched_token: Some(matched.to_string()),
        }
    }
}

/// Check whether the response now contains one of the stop strings.
///
/// `scan_from` is where the previous check left off; only text from a stop
/// string's length before it needs rescanning, since a stop string can
/// straddle two token pieces. The earliest match wins.
pub fn check_stop_conditions(
    response: &str,
    scan_from: usize,
    stop_strings: &[String],
) -> StopConditionResult {
    let mut best: Option<(usize, &str)> = None;

    for stop in stop_strings.iter().filter(|s| !s.is_empty()) {
        let mut start = scan_from.min(response.len()).saturating_sub(stop.len());
        while start > 0 && !response.is_char_boundary(start) {
            start -= 1;
        }
        if let Some(pos) = response[start..].find(stop.as_str()) {
            let index = start + pos;
            if best.map_or(true, |(b, _)| index < b) {
                best = Some((index, stop.as_str()));
            }
        }
    }

    match best {
        Some((index, matched)) => StopConditionResult::stop_at(index, matched),
        None => StopConditionResult::no_stop(),
    }
}

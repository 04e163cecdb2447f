/// Parse a display clock into a whole minute where possible.
///
/// Accepted forms: `"45+3'"` (stoppage time, added) => 48, `"111'"` => 111,
/// `"23:41"` => 23, bare `"67"` => 67.  Anything else yields `None`; the
/// clock string itself is always preserved verbatim upstream.
pub fn parse_clock_minute(clock: &str) -> Option<i32> {
    let s = clock.trim().trim_end_matches('\'').trim();
    if s.is_empty() {
        return None;
    }
    if let Some((base, added)) = s.split_once('+') {
        let base: i32 = base.trim().parse().ok()?;
        let added: i32 = added.trim().parse().ok()?;
        return Some(base + added);
    }
    if let Some((minutes, _seconds)) = s.split_once(':') {
        return minutes.trim().parse().ok();
    }
    s.parse().ok()
}

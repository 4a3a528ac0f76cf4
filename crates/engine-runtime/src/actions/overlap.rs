//! Shared clock-skew tolerance used by both `IncrementalLoadAction` and
//! `RefreshRecentAction` (spec §5, glossary "Overlap").

/// Lookback folded into a watermark before it's used as a `since` filter,
/// so a row that committed just before the last recorded watermark is
/// still picked up once more.
pub(crate) const OVERLAP_SECS: i64 = 60;

/// `OVERLAP_SECS` expressed in the unit the plan declares its timestamp
/// column in (spec scenario: "OVERLAP arithmetic is performed in
/// milliseconds" when `timestamp_in_millis` is set).
pub(crate) fn overlap_units(millis: bool) -> i64 {
    if millis {
        OVERLAP_SECS * 1000
    } else {
        OVERLAP_SECS
    }
}

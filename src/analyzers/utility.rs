use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use std::cmp::Ordering;
use std::sync::LazyLock;
use tracing::warn;

/// Divides `part` by `whole`, returning 0.0 when `whole` is zero.
pub fn rate(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part / whole }
}

/// Formats a number the way a spreadsheet shows it: integral values without a
/// fractional part, everything else with Rust's shortest round-trip form.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

static COLLATOR: LazyLock<Option<CollatorBorrowed<'static>>> = LazyLock::new(|| {
    Collator::try_new(Default::default(), CollatorOptions::default())
        .inspect_err(|e| warn!(error = %e, "Collation data unavailable, ordering by code point"))
        .ok()
});

/// Locale-aware ordering for class names and emails (CLDR root collation).
///
/// Punctuation sorts before digits and letters, case differences only break
/// ties, and hiragana and katakana share primary weights. Strings the
/// collator considers equal fall back to code point order.
pub fn collate(a: &str, b: &str) -> Ordering {
    let ordering = match COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => Ordering::Equal,
    };
    ordering.then_with(|| a.cmp(b))
}

/// Parses the leading number of `s` (`"100pts"` -> 100). `None` when there is none.
pub fn parse_leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut best = None;
    for (i, c) in s.char_indices() {
        if let Ok(v) = s[..i + c.len_utf8()].parse::<f64>() {
            best = Some(v);
        } else if !matches!(c, '0'..='9' | '.' | '-' | '+' | 'e' | 'E') {
            break;
        }
    }
    best.filter(|v| v.is_finite())
}

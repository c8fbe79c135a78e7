//! Modifier node: base value plus four accumulation buckets.
//!
//! ```text
//! static_total  = base * (100 + static%) / 100 + static_fixed
//! dynamic_total = floor(base * (100 + static% + dynamic%) / 100
//!                       + static_fixed + dynamic_fixed)
//! ```
//!
//! The static total is the character-sheet value; the dynamic total is the
//! in-battle value and always includes the static buckets.

use crate::expr::{CompiledFormula, Expr};

/// Which accumulation bucket an entry lands in.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[strum(serialize_all = "camelCase")]
pub enum ModifierBucket {
    StaticFixed,
    StaticPercentage,
    DynamicFixed,
    DynamicPercentage,
}

impl ModifierBucket {
    pub const ALL: [ModifierBucket; 4] = [
        ModifierBucket::StaticFixed,
        ModifierBucket::StaticPercentage,
        ModifierBucket::DynamicFixed,
        ModifierBucket::DynamicPercentage,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// One bucket entry, attributed to whatever added it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModifierEntry {
    pub value: f64,
    pub origin: String,
}

/// Where a modifier's base comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum BaseSource {
    Value(f64),
    Formula {
        source: String,
        compiled: CompiledFormula,
    },
}

impl BaseSource {
    pub fn formula_expr(&self) -> Option<&Expr> {
        match self {
            BaseSource::Value(_) => None,
            BaseSource::Formula { compiled, .. } => Some(&compiled.expr),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub(crate) path: String,
    pub(crate) base: BaseSource,
    /// Resolved base for the static and dynamic passes. Equal for plain
    /// values; formulas resolve each pass against their dependencies.
    pub(crate) static_base: f64,
    pub(crate) dynamic_base: f64,
    buckets: [Vec<ModifierEntry>; 4],
    static_total: f64,
    dynamic_total: f64,
}

impl Modifier {
    pub fn new(path: impl Into<String>, base: f64) -> Self {
        let mut modifier = Self {
            path: path.into(),
            base: BaseSource::Value(base),
            static_base: base,
            dynamic_base: base,
            buckets: Default::default(),
            static_total: 0.0,
            dynamic_total: 0.0,
        };
        modifier.recompute_totals();
        modifier
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn base(&self) -> &BaseSource {
        &self.base
    }

    /// Base used by the dynamic pass.
    pub fn base_value(&self) -> f64 {
        self.dynamic_base
    }

    pub fn static_total(&self) -> f64 {
        self.static_total
    }

    pub fn dynamic_total(&self) -> f64 {
        self.dynamic_total
    }

    pub fn entries(&self, bucket: ModifierBucket) -> &[ModifierEntry] {
        &self.buckets[bucket.slot()]
    }

    pub fn sum(&self, bucket: ModifierBucket) -> f64 {
        self.entries(bucket).iter().map(|e| e.value).sum()
    }

    pub(crate) fn push(&mut self, bucket: ModifierBucket, entry: ModifierEntry) {
        self.buckets[bucket.slot()].push(entry);
    }

    /// Drops every entry from `origin`; returns how many were removed.
    pub(crate) fn retain_not_from(&mut self, origin: &str) -> usize {
        let mut removed = 0;
        for bucket in &mut self.buckets {
            let before = bucket.len();
            bucket.retain(|entry| entry.origin != origin);
            removed += before - bucket.len();
        }
        removed
    }

    pub(crate) fn recompute_totals(&mut self) {
        let static_pct = self.sum(ModifierBucket::StaticPercentage);
        let static_fixed = self.sum(ModifierBucket::StaticFixed);
        let dynamic_pct = self.sum(ModifierBucket::DynamicPercentage);
        let dynamic_fixed = self.sum(ModifierBucket::DynamicFixed);

        self.static_total = static_total(self.static_base, static_pct, static_fixed);
        self.dynamic_total = dynamic_total(
            self.dynamic_base,
            static_pct + dynamic_pct,
            static_fixed + dynamic_fixed,
        );
    }
}

/// Character-sheet value (no rounding).
pub fn static_total(base: f64, percentage: f64, fixed: f64) -> f64 {
    base * (100.0 + percentage) / 100.0 + fixed
}

/// In-battle value, floored.
pub fn dynamic_total(base: f64, percentage: f64, fixed: f64) -> f64 {
    (base * (100.0 + percentage) / 100.0 + fixed).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: f64) -> ModifierEntry {
        ModifierEntry {
            value,
            origin: "test".into(),
        }
    }

    #[test]
    fn static_and_dynamic_totals() {
        let mut m = Modifier::new("atk", 100.0);
        m.push(ModifierBucket::StaticFixed, entry(10.0));
        m.push(ModifierBucket::StaticPercentage, entry(20.0));
        m.recompute_totals();
        assert_eq!(m.static_total(), 130.0);
        assert_eq!(m.dynamic_total(), 130.0);

        m.push(ModifierBucket::DynamicPercentage, entry(5.0));
        m.recompute_totals();
        assert_eq!(m.static_total(), 130.0);
        assert_eq!(m.dynamic_total(), 135.0);
    }

    #[test]
    fn dynamic_total_is_floored() {
        let cases = [
            (33.0, [1.5, 7.0, 0.25, 3.0]),
            (17.0, [-4.0, 12.5, 2.2, -1.0]),
            (250.0, [0.0, 0.0, 0.7, 0.0]),
            (1.0, [0.0, 33.3, 0.0, 0.0]),
        ];
        for (base, [sf, sp, df, dp]) in cases {
            let mut m = Modifier::new("x", base);
            m.push(ModifierBucket::StaticFixed, entry(sf));
            m.push(ModifierBucket::StaticPercentage, entry(sp));
            m.push(ModifierBucket::DynamicFixed, entry(df));
            m.push(ModifierBucket::DynamicPercentage, entry(dp));
            m.recompute_totals();

            let expected = (base * (1.0 + (sp + dp) / 100.0) + sf + df).floor();
            assert!((m.dynamic_total() - expected).abs() < 1e-9, "base {base}");
            assert_eq!(m.dynamic_total().fract(), 0.0);
        }
    }

    #[test]
    fn removing_by_origin_only_touches_that_origin() {
        let mut m = Modifier::new("x", 10.0);
        m.push(
            ModifierBucket::DynamicFixed,
            ModifierEntry {
                value: 5.0,
                origin: "buff:a".into(),
            },
        );
        m.push(
            ModifierBucket::StaticFixed,
            ModifierEntry {
                value: 1.0,
                origin: "gear".into(),
            },
        );
        assert_eq!(m.retain_not_from("buff:a"), 1);
        assert_eq!(m.entries(ModifierBucket::StaticFixed).len(), 1);
    }

    #[test]
    fn bucket_names_parse() {
        use std::str::FromStr;
        assert_eq!(
            ModifierBucket::from_str("dynamicPercentage").unwrap(),
            ModifierBucket::DynamicPercentage
        );
        assert_eq!(ModifierBucket::StaticFixed.to_string(), "staticFixed");
    }
}

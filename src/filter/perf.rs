//! Performance data derived from the thresholds in warn/crit expressions.

use std::fmt;

use crate::context::{EvaluationContext, PerformanceCollector};
use crate::filter::bound::BoundExpression;
use crate::registry::AttributeRegistry;

/// One Nagios performance data item
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    pub label: String,
    pub value: f64,
    pub warn: Option<f64>,
    pub crit: Option<f64>,
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'={}", self.label, self.value)?;
        if self.warn.is_none() && self.crit.is_none() {
            return Ok(());
        }
        let threshold = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        write!(f, ";{};{}", threshold(self.warn), threshold(self.crit))
    }
}

#[derive(Debug, Clone)]
struct Threshold {
    attribute: String,
    warn: Option<f64>,
    crit: Option<f64>,
}

/// Attributes compared against numeric literals, with their thresholds
#[derive(Debug, Clone, Default)]
pub struct PerfThresholds {
    thresholds: Vec<Threshold>,
}

impl PerfThresholds {
    pub fn collect(
        warn: Option<&BoundExpression>,
        crit: Option<&BoundExpression>,
        ctx: &EvaluationContext,
    ) -> Self {
        let mut result = Self::default();
        let sources = [(warn, false), (crit, true)];
        for (expr, is_crit) in sources {
            let Some(expr) = expr else { continue };
            let mut collector = PerformanceCollector::new();
            expr.find_performance_data(ctx, &mut collector);
            // first sample per attribute wins
            for sample in collector.samples() {
                let entry = result.entry(&sample.name);
                let slot = if is_crit { &mut entry.crit } else { &mut entry.warn };
                slot.get_or_insert(sample.value);
            }
        }
        result
    }

    fn entry(&mut self, attribute: &str) -> &mut Threshold {
        let index = match self.thresholds.iter().position(|t| t.attribute == attribute) {
            Some(index) => index,
            None => {
                self.thresholds.push(Threshold {
                    attribute: attribute.to_string(),
                    warn: None,
                    crit: None,
                });
                self.thresholds.len() - 1
            }
        };
        &mut self.thresholds[index]
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.thresholds.iter().map(|t| t.attribute.as_str())
    }

    /// Read the current value of every threshold attribute from `object`.
    ///
    /// Labels are `<prefix>_<attribute>` when a prefix is given.
    pub fn read<T>(
        &self,
        registry: &AttributeRegistry<T>,
        object: &T,
        prefix: Option<&str>,
        ctx: &mut EvaluationContext,
    ) -> Vec<PerfData> {
        let mut data = Vec::with_capacity(self.thresholds.len());
        for threshold in &self.thresholds {
            let Some((_, attribute)) = registry.lookup(&threshold.attribute) else {
                continue;
            };
            let value = match attribute.read(object) {
                Ok(value) => value,
                Err(err) => {
                    ctx.error(format!("Failed to read {}: {}", threshold.attribute, err));
                    continue;
                }
            };
            let Some(value) = value.as_float() else {
                continue;
            };
            let label = match prefix {
                Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, threshold.attribute),
                _ => threshold.attribute.clone(),
            };
            data.push(PerfData {
                label,
                value,
                warn: threshold.warn,
                crit: threshold.crit,
            });
        }
        data
    }
}

//! A small threshold evaluator broadcasting alert events to subscribers.
//!
//! Grounded on `pmocontrol::events::MediaServerEventBus`: a `Vec<Sender<T>>`
//! registry pruned by retain-on-send, generalized here to a named set of
//! numeric rules evaluated against sampled gauge values.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// One named alert condition: fires when `sample >= threshold`.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub name: String,
    pub threshold: f64,
}

/// Emitted when a rule's threshold is crossed.
#[derive(Debug, Clone)]
pub struct AlertFired {
    pub rule: String,
    pub value: f64,
    pub threshold: f64,
}

/// Evaluates a fixed set of named rules against incoming samples and
/// broadcasts [`AlertFired`] events for every rule whose threshold is met.
///
/// A rule with no sample ever recorded for it simply never fires — this is
/// how the "rate-limit-rejection" alert category stays present but inert
/// until a caller actually records samples for it (the data source is not
/// wired in this workspace).
pub struct AlertRules {
    rules: Mutex<Vec<AlertRule>>,
    tx: broadcast::Sender<AlertFired>,
}

impl AlertRules {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            tx: broadcast::channel(256).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertFired> {
        self.tx.subscribe()
    }

    /// Records a sample for `rule_name` and fires an alert if its
    /// configured threshold is met or exceeded.
    pub fn sample(&self, rule_name: &str, value: f64) {
        let rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter().find(|r| r.name == rule_name) else {
            return;
        };

        if value >= rule.threshold {
            let _ = self.tx.send(AlertFired {
                rule: rule.name.clone(),
                value,
                threshold: rule.threshold,
            });
        }
    }
}

pub fn shared(rules: Vec<AlertRule>) -> Arc<AlertRules> {
    Arc::new(AlertRules::new(rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_when_threshold_met() {
        let rules = AlertRules::new(vec![AlertRule {
            name: "queue_depth".into(),
            threshold: 100.0,
        }]);
        let mut rx = rules.subscribe();

        rules.sample("queue_depth", 50.0);
        assert!(rx.try_recv().is_err());

        rules.sample("queue_depth", 120.0);
        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.rule, "queue_depth");
    }

    #[test]
    fn unknown_rule_is_a_no_op() {
        let rules = AlertRules::new(vec![]);
        rules.sample("rate_limit_rejections", 999.0);
    }
}

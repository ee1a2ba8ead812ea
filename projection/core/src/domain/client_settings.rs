// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inherited client settings and their weighted merge

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::object_ident::ObjectIdent;

/// One settings contribution a profile inherits from itself or a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSetting {
    pub key: String,
    #[serde(default)]
    pub weight: i32,
    pub source: ObjectIdent,
    pub value: Value,
}

/// Merge all contributions per key. Lower weights are applied first, so the
/// highest weight wins on conflicting leaves; objects merge recursively.
pub fn calculate_client_settings(settings: &[ClientSetting]) -> BTreeMap<String, Value> {
    let mut by_key: BTreeMap<&str, Vec<&ClientSetting>> = BTreeMap::new();
    for setting in settings {
        by_key.entry(setting.key.as_str()).or_default().push(setting);
    }

    by_key
        .into_iter()
        .map(|(key, mut contributions)| {
            contributions.sort_by(|a, b| {
                a.weight
                    .cmp(&b.weight)
                    .then_with(|| a.source.cmp(&b.source))
            });
            let mut merged = Value::Null;
            for contribution in contributions {
                merge_value(&mut merged, &contribution.value);
            }
            (key.to_string(), merged)
        })
        .collect()
}

fn merge_value(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => {
            for (field, value) in overlay {
                merge_value(target.entry(field.clone()).or_insert(Value::Null), value);
            }
        }
        (target, overlay) => *target = overlay.clone(),
    }
}

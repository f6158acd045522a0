//! Static reference models: medication catalog and insurance plans.

use serde::{Deserialize, Serialize};

/// A medication catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Medication {
    pub id: Option<i64>,
    pub name: Option<String>,
    /// Strength (e.g. mg per unit)
    pub strength: Option<f32>,
    /// Mock NDC product code, joins to `Transaction::product_code`
    pub product_code: Option<String>,
    /// Units per package
    pub package_size: Option<i32>,
    pub price_per_unit: Option<f32>,
}

/// An insurance plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Insurance {
    pub id: Option<i64>,
    pub name: Option<String>,
    /// Plan type (e.g. "PPO", "Medicare")
    pub plan_type: Option<String>,
    /// Coverage amount
    pub amount: Option<f32>,
}

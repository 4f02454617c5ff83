use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay rows of the `business_rules` table (`{"value": ...}`) onto the file config
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            if let Some(v) = row.rule_value.get("value") {
                apply_rule(&mut rules, &row.rule_key, v);
            }
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, v: &Value) {
    match key {
        "seat_hold_seconds" => {
            if let Some(u) = v.as_u64() {
                rules.seat_hold_seconds = u;
            }
        }
        "allow_cancel_after_start" => {
            if let Some(b) = v.as_bool() {
                rules.allow_cancel_after_start = b;
            }
        }
        "price_adult" => {
            if let Some(p) = v.as_i64() {
                rules.prices.adult = p;
            }
        }
        "price_teen" => {
            if let Some(p) = v.as_i64() {
                rules.prices.teen = p;
            }
        }
        "price_preferential" => {
            if let Some(p) = v.as_i64() {
                rules.prices.preferential = p;
            }
        }
        "saving_rate_basic" => {
            if let Some(r) = v.as_i64() {
                rules.saving_rates.basic = r;
            }
        }
        "saving_rate_vip" => {
            if let Some(r) = v.as_i64() {
                rules.saving_rates.vip = r;
            }
        }
        other => tracing::warn!("Ignoring unknown business rule '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_overlay() {
        let mut rules = BusinessRules::default();
        apply_rule(&mut rules, "price_adult", &json!(13000));
        apply_rule(&mut rules, "seat_hold_seconds", &json!(300));
        // Wrong type leaves the value alone
        apply_rule(&mut rules, "price_teen", &json!("cheap"));
        apply_rule(&mut rules, "unknown", &json!(1));

        assert_eq!(rules.prices.adult, 13000);
        assert_eq!(rules.prices.teen, 10000);
        assert_eq!(rules.seat_hold_seconds, 300);
    }
}

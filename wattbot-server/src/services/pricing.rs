//! Pricing engine
//!
//! Billing amount = consumption since the previous reading times the price
//! per unit in force. Both rules are switched off entirely by
//! `Settings::calculate_pricing`.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;
use wattbot_common::{Error, Result};

use crate::db;

/// Round to 2 decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone)]
pub struct PricingEngine {
    db: SqlitePool,
}

impl PricingEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn enabled(&self) -> Result<bool> {
        Ok(db::settings::get_settings(&self.db).await?.calculate_pricing)
    }

    /// Price of a reading about to be created with value `total`
    ///
    /// Uses the latest price entry overall. Fails with `DuplicatePeriod`
    /// when the latest recorded reading is not strictly below `total`.
    pub async fn price_for_new_reading(&self, total: f64) -> Result<f64> {
        if !self.enabled().await? {
            return Ok(0.0);
        }

        let entry = db::prices::latest(&self.db)
            .await?
            .ok_or_else(|| Error::NoPriceFound("no price entries defined".to_string()))?;

        let previous = match db::readings::latest(&self.db).await? {
            Some(prior) if prior.captured_value >= total => {
                return Err(Error::DuplicatePeriod(format!(
                    "latest reading ({}) on {} is not below {}",
                    prior.captured_value, prior.billing_date, total
                )));
            }
            Some(prior) => prior.captured_value,
            None => 0.0,
        };

        let price = round2((total - previous) * entry.price_per_unit);
        debug!(total, previous, price_per_unit = entry.price_per_unit, price, "Priced new reading");
        Ok(price)
    }

    /// Price of an existing reading after an edit
    ///
    /// The previous reading is the latest one other than `reading_id`
    /// billed strictly before `billing_date`. No monotonicity check: edits
    /// may correct history.
    pub async fn price_for_edited_reading(
        &self,
        reading_id: i64,
        billing_date: NaiveDate,
        total: f64,
    ) -> Result<f64> {
        if !self.enabled().await? {
            return Ok(0.0);
        }

        let previous = db::readings::latest_before(&self.db, billing_date, reading_id)
            .await?
            .map(|r| r.captured_value)
            .unwrap_or(0.0);

        let entry = db::prices::latest_on_or_before(&self.db, billing_date)
            .await?
            .ok_or_else(|| {
                Error::NoPriceFound(format!("no price effective on or before {}", billing_date))
            })?;

        let price = round2((total - previous) * entry.price_per_unit);
        debug!(
            reading_id,
            %billing_date,
            total,
            previous,
            price_per_unit = entry.price_per_unit,
            price,
            "Priced edited reading"
        );
        Ok(price)
    }
}

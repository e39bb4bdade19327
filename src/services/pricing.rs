//! Monthly price computation.
//!
//! `monthly price = base × frequency multiplier + Σ add-on × multiplier`.
//! The multiplier table lives on `Frequency`; unrecognized frequencies are
//! priced with multiplier 1 rather than rejected.

use sqlx::PgPool;

use crate::db::queries;
use crate::error::{ServiceError, ServiceResult};
use crate::types::ServiceConfiguration;

/// Monthly price for a configuration given its plan's base price.
pub fn monthly_price(base_price: f64, config: &ServiceConfiguration) -> f64 {
    let multiplier = config.frequency.multiplier();
    let mut total = base_price * multiplier;
    for add_on in &config.add_ons {
        total += add_on.price * multiplier;
    }
    total
}

/// Monthly price with the plan looked up from the database.
pub async fn monthly_price_for(pool: &PgPool, config: &ServiceConfiguration) -> ServiceResult<f64> {
    let plan = queries::plan::get_plan(pool, config.plan_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("service plan {}", config.plan_id)))?;
    Ok(monthly_price(plan.base_price, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddOn, Frequency};
    use uuid::Uuid;

    fn config(frequency: Frequency, add_ons: Vec<AddOn>) -> ServiceConfiguration {
        ServiceConfiguration {
            plan_id: Uuid::new_v4(),
            frequency,
            add_ons,
        }
    }

    #[test]
    fn test_weekly_vs_biweekly_base_price() {
        // $35 base: weekly bills 4 visits/month, biweekly 2.
        assert_eq!(monthly_price(35.0, &config(Frequency::Weekly, vec![])), 140.0);
        assert_eq!(monthly_price(35.0, &config(Frequency::Biweekly, vec![])), 70.0);
        assert_eq!(monthly_price(35.0, &config(Frequency::Monthly, vec![])), 35.0);
    }

    #[test]
    fn test_add_ons_scale_with_frequency() {
        let deodorizer = AddOn { id: "deodorizer".into(), price: 5.0 };
        let price = monthly_price(35.0, &config(Frequency::Weekly, vec![deodorizer]));
        // (35 + 5) × 4
        assert_eq!(price, 160.0);
    }

    #[test]
    fn test_unrecognized_frequency_priced_as_monthly() {
        let price = monthly_price(50.0, &config(Frequency::Other, vec![]));
        assert_eq!(price, 50.0);
    }
}

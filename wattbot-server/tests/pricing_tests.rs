//! Pricing engine rules against a real schema

mod helpers;

use helpers::{add_price, date, disable_pricing, seed_reading, test_pool};
use wattbot_common::Error;
use wattbot_server::services::PricingEngine;

#[tokio::test]
async fn test_new_reading_without_prior_uses_full_value() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    let pricing = PricingEngine::new(pool);

    assert_eq!(pricing.price_for_new_reading(50.0).await.unwrap(), 25.0);
}

#[tokio::test]
async fn test_new_reading_charges_delta_since_prior() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let pricing = PricingEngine::new(pool);

    assert_eq!(pricing.price_for_new_reading(150.0).await.unwrap(), 25.0);
}

#[tokio::test]
async fn test_new_reading_not_above_prior_is_duplicate_period() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let pricing = PricingEngine::new(pool);

    let lower = pricing.price_for_new_reading(90.0).await.unwrap_err();
    assert!(matches!(lower, Error::DuplicatePeriod(_)));

    let equal = pricing.price_for_new_reading(100.0).await.unwrap_err();
    assert!(matches!(equal, Error::DuplicatePeriod(_)));
}

#[tokio::test]
async fn test_new_reading_compares_against_latest_billing_date() {
    let pool = test_pool().await;
    add_price(&pool, 1.0, date(2024, 1, 1)).await;
    // Inserted last but billed earlier
    seed_reading(&pool, 300.0, date(2024, 3, 31), None).await;
    seed_reading(&pool, 200.0, date(2024, 2, 29), None).await;
    let pricing = PricingEngine::new(pool);

    assert_eq!(pricing.price_for_new_reading(350.0).await.unwrap(), 50.0);
}

#[tokio::test]
async fn test_no_price_entry_is_no_price_found() {
    let pool = test_pool().await;
    let pricing = PricingEngine::new(pool);

    let err = pricing.price_for_new_reading(50.0).await.unwrap_err();
    assert!(matches!(err, Error::NoPriceFound(_)));

    let err = pricing
        .price_for_edited_reading(1, date(2024, 1, 31), 50.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoPriceFound(_)));
}

#[tokio::test]
async fn test_pricing_disabled_returns_zero_without_lookups() {
    let pool = test_pool().await;
    disable_pricing(&pool).await;
    // A prior higher reading would otherwise be a duplicate period
    let id = seed_reading(&pool, 500.0, date(2024, 1, 31), None).await;
    let pricing = PricingEngine::new(pool);

    assert_eq!(pricing.price_for_new_reading(10.0).await.unwrap(), 0.0);
    assert_eq!(
        pricing
            .price_for_edited_reading(id, date(2024, 2, 29), 10.0)
            .await
            .unwrap(),
        0.0
    );
}

#[tokio::test]
async fn test_edited_reading_uses_strictly_earlier_reading_and_price_in_force() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    add_price(&pool, 1.0, date(2024, 3, 1)).await;
    seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let feb_id = seed_reading(&pool, 180.0, date(2024, 2, 29), None).await;
    let mar_id = seed_reading(&pool, 190.0, date(2024, 3, 1), None).await;
    let pricing = PricingEngine::new(pool);

    let feb = pricing
        .price_for_edited_reading(feb_id, date(2024, 2, 29), 160.0)
        .await
        .unwrap();
    assert_eq!(feb, 30.0);

    // March price applies from its effective date
    let mar = pricing
        .price_for_edited_reading(mar_id, date(2024, 3, 1), 200.0)
        .await
        .unwrap();
    assert_eq!(mar, 20.0);
}

#[tokio::test]
async fn test_edited_reading_allows_value_below_neighbor() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let feb_id = seed_reading(&pool, 150.0, date(2024, 2, 29), None).await;
    let pricing = PricingEngine::new(pool);

    let price = pricing
        .price_for_edited_reading(feb_id, date(2024, 2, 29), 90.0)
        .await
        .unwrap();
    assert_eq!(price, -5.0);
}

#[tokio::test]
async fn test_edited_reading_before_first_price_is_no_price_found() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 6, 1)).await;
    let pricing = PricingEngine::new(pool);

    let err = pricing
        .price_for_edited_reading(1, date(2024, 5, 31), 10.0)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoPriceFound(_)));
}

#[tokio::test]
async fn test_edited_reading_never_prices_against_itself() {
    let pool = test_pool().await;
    add_price(&pool, 0.5, date(2024, 1, 1)).await;
    let id = seed_reading(&pool, 100.0, date(2024, 1, 31), None).await;
    let pricing = PricingEngine::new(pool);

    // Stored row still carries the old date while the edit is priced
    let moved = pricing
        .price_for_edited_reading(id, date(2024, 2, 29), 100.0)
        .await
        .unwrap();
    assert_eq!(moved, 50.0);
}

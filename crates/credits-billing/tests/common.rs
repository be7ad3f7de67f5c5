//! Common test utilities for credit ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use credits_billing::{BillingService, ManualClock, UsageObserver, UsageRecord};
use credits_core::{UserId, DEFAULT_MONTHLY_ALLOWANCE};
use credits_store::MemoryStore;

/// Collects every usage notification.
#[derive(Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<UsageRecord>>,
}

impl RecordingObserver {
    /// Records received so far, in order.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl UsageObserver for RecordingObserver {
    fn usage_recorded(&self, record: &UsageRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The service under test.
    pub billing: BillingService,
    /// The store behind the service, for direct inspection.
    pub store: Arc<MemoryStore>,
    /// The service's clock.
    pub clock: Arc<ManualClock>,
    /// Observer attached to the service.
    pub observer: Arc<RecordingObserver>,
    /// A test user with no prior activity.
    pub user_id: UserId,
}

impl TestHarness {
    /// Fresh store, default allowance, clock at mid-October 2026.
    pub fn new() -> Self {
        Self::with_allowance(DEFAULT_MONTHLY_ALLOWANCE)
    }

    /// Fresh store granting `allowance` per period.
    pub fn with_allowance(allowance: i64) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(at(2026, 10, 18, 12, 0, 0)));
        let observer = Arc::new(RecordingObserver::default());

        let billing = BillingService::new(store.clone())
            .with_clock(clock.clone())
            .with_monthly_allowance(allowance)
            .with_observer(observer.clone());

        Self {
            billing,
            store,
            clock,
            observer,
            user_id: user("user-1"),
        }
    }

    /// Remaining credits for the test user in the current period.
    pub async fn remaining(&self) -> i64 {
        self.billing
            .check_credits(&self.user_id)
            .await
            .expect("credit check failed")
            .remaining_credits
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a user ID.
pub fn user(name: &str) -> UserId {
    UserId::new(name).expect("valid user id")
}

/// Build a UTC instant.
pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .expect("valid instant")
}

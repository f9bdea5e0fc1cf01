// SPDX-License-Identifier: MIT

//! Referral code reservation tests (Firestore emulator required).

use voluntree::services::referral::{generate_code, is_valid_code};
use voluntree::services::ReferralService;

mod common;
use common::{test_db, test_member, unique_id};

#[tokio::test]
async fn concurrent_identical_codes_end_up_distinct() {
    require_emulator!();

    let db = test_db().await;
    let service = ReferralService::new(db.clone());

    // Same email + name would generate the same candidate code for both.
    let email = format!("{}@example.com", unique_id("race"));
    let uid_a = unique_id("member-a");
    let uid_b = unique_id("member-b");

    let (code_a, code_b) = tokio::join!(
        service.allocate_code(&uid_a, &email, "Race Runner"),
        service.allocate_code(&uid_b, &email, "Race Runner"),
    );
    let code_a = code_a.unwrap();
    let code_b = code_b.unwrap();

    assert!(is_valid_code(&code_a));
    assert!(is_valid_code(&code_b));
    assert_ne!(code_a, code_b, "exactly one insert wins, the loser mutates");

    // One of them holds the deterministic candidate
    let candidate = generate_code(&email, "Race Runner");
    assert!(code_a == candidate || code_b == candidate);
}

#[tokio::test]
async fn validate_code_is_an_existence_oracle_only() {
    require_emulator!();

    let db = test_db().await;
    let service = ReferralService::new(db.clone());

    let uid = unique_id("member");
    let code = service
        .allocate_code(&uid, &format!("{uid}@example.com"), "Owner")
        .await
        .unwrap();

    let mut member = test_member(&uid, &code);
    member.code = code.clone();
    db.upsert_member(&member).await.unwrap();

    assert!(service.validate_code(&code).await.unwrap());
    assert!(!service.validate_code("ZZZ99").await.unwrap());
    // Malformed input short-circuits to false rather than erroring
    assert!(!service.validate_code("nope").await.unwrap());

    assert!(!service.is_code_unique(&code).await.unwrap());
    assert!(service.is_code_unique("ZZZ98").await.unwrap());
}

#[tokio::test]
async fn reserved_code_cannot_be_taken_twice() {
    require_emulator!();

    let db = test_db().await;
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let code = voluntree::services::referral::fallback_code(nanos);

    assert!(db.try_reserve_code(&code, "first").await.unwrap());
    assert!(!db.try_reserve_code(&code, "second").await.unwrap());
}

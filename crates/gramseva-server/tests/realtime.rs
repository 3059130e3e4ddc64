//! Realtime channel tests: every write fans out to every session.

mod common;

use anyhow::Result;
use common::{TestServer, expect_event, next_event};
use gramseva_types::{
    Bill, BillType, Collection, Department, LocationStamp, NoticeCategory, Payment, PaymentMethod,
    VillageNotice,
};
use serde_json::json;

fn wagholi() -> LocationStamp {
    LocationStamp::new("Maharashtra", "Pune", "Haveli", "Wagholi", "412207")
}

#[tokio::test]
async fn test_two_clients_receive_new_notice() -> Result<()> {
    let server = TestServer::start().await?;
    let mut asha = server.connect_ws().await?;
    let mut meera = server.connect_ws().await?;

    let notice = VillageNotice::new(wagholi(), "Water cut", "Tuesday 9-12", NoticeCategory::Emergency);
    server.http.post(server.url("notices")).json(&vec![notice.clone()]).send().await?;

    for ws in [&mut asha, &mut meera] {
        let msg = next_event(ws).await?;
        assert_eq!(msg.event, "data-update-notices");
        assert_eq!(msg.collection(), Some(Collection::Notices));
        let received: Vec<VillageNotice> = serde_json::from_value(msg.payload)?;
        assert_eq!(received, vec![notice.clone()]);
    }
    Ok(())
}

#[tokio::test]
async fn test_writer_also_receives_its_own_write() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    server.http.post(server.url("requests")).json(&json!([])).send().await?;
    let msg = next_event(&mut ws).await?;
    assert_eq!(msg.event, "data-update-requests");
    assert_eq!(msg.payload, json!([]));
    Ok(())
}

#[tokio::test]
async fn test_settlement_broadcasts_bills_and_transactions() -> Result<()> {
    let server = TestServer::start().await?;
    let bill = Bill::issue(Department::Gas, "RES-1", wagholi(), BillType::GasBill, 640.0, "2026-11-30")?;
    server.http.post(server.url("bills")).json(&vec![bill.clone()]).send().await?;

    let mut ws = server.connect_ws().await?;
    let payment = Payment {
        method: PaymentMethod::Online,
        payer_id: "RES-1".into(),
        payer_name: "Asha".into(),
        recipient_name: "Gas Department".into(),
        payment_address: "gas@upi".into(),
    };
    server
        .http
        .post(server.url(&format!("bills/{}/settle", bill.id)))
        .json(&payment)
        .send()
        .await?;

    let bills = expect_event(&mut ws, "data-update-bills").await?;
    assert_eq!(bills.payload[0]["status"], "Paid");
    let transactions = expect_event(&mut ws, "data-update-transactions").await?;
    assert_eq!(transactions.payload[0]["billId"], bill.id.as_str());
    Ok(())
}

#[tokio::test]
async fn test_registration_broadcasts_accounts() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.connect_ws().await?;

    let body = json!({
        "id": "",
        "name": "Asha",
        "email": "asha@example.in",
        "role": "resident",
        "village": "Wagholi",
        "password": "secret"
    });
    server.http.post(server.url("auth/register")).json(&body).send().await?;

    let msg = expect_event(&mut ws, "data-update-accounts").await?;
    assert_eq!(msg.payload[0]["email"], "asha@example.in");
    assert!(msg.payload[0].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn test_lagging_session_is_resynced() -> Result<()> {
    let server = TestServer::start_with(|c| c.broadcast_capacity = 1).await?;
    let mut ws = server.connect_ws().await?;

    for n in 0..20 {
        let payload = json!([{"id": format!("NOTIF-{n}"), "title": "t", "message": "m"}]);
        server.http.post(server.url("notifications")).json(&payload).send().await?;
    }

    let msg = expect_event(&mut ws, "data-update-notifications").await?;
    let mut last = msg.payload;
    // Drain until the final state shows up, directly or through a resync.
    while last[0]["id"] != "NOTIF-19" {
        last = expect_event(&mut ws, "data-update-notifications").await?.payload;
    }
    assert_eq!(last[0]["id"], "NOTIF-19");
    Ok(())
}

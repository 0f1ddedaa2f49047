//! End-to-end market flows over the HTTP surface.

use serde_json::{json, Value};

use mandi_market_integration::{
    error_kind, staples_order, staples_quote, staples_quote_no_lentils, TestHarness,
};

/// The full worked scenario: three sellers quote a three-item order,
/// ranking puts the cheapest full-coverage quote first, the buyer
/// accepts it, the siblings close, and a late quote bounces.
#[tokio::test]
async fn quote_compare_accept_flow() {
    let h = TestHarness::setup().await;

    let order = h.priya.create_order(staples_order()).await;
    assert_eq!(order.status.label(), "Awaiting offers");
    let order_id = order.id.0.as_str();

    let quote_a = h
        .arjun
        .submit_quotation(order_id, staples_quote(240, 90, 80), 50)
        .await;
    let quote_b = h
        .meera
        .submit_quotation(order_id, staples_quote_no_lentils(300, 95), 5)
        .await;
    let quote_c = h
        .sanjay
        .submit_quotation(order_id, staples_quote(250, 85, 75), 100)
        .await;
    assert_eq!(quote_a.total_amount(), 680);
    assert_eq!(quote_b.total_amount(), 620);
    assert_eq!(quote_c.total_amount(), 600);

    // First offer flipped the order to in-progress.
    let resp = h.priya.get(&format!("/orders/{order_id}")).await;
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "in_progress");

    // Ranking: C (600, best, full) < B (620, partial) < A (680).
    let resp = h
        .priya
        .get(&format!("/orders/{order_id}/quotations"))
        .await;
    let body: Value = resp.json().await.unwrap();
    let summary = body["summary"].as_array().unwrap();
    assert_eq!(summary.len(), 3);
    assert_eq!(summary[0]["quotation_id"], quote_c.id.0);
    assert_eq!(summary[0]["total_price"], 600);
    assert_eq!(summary[0]["coverage"], "full");
    assert_eq!(summary[0]["is_best_price"], true);
    assert_eq!(summary[1]["quotation_id"], quote_b.id.0);
    assert_eq!(summary[1]["coverage"], "partial");
    assert_eq!(summary[1]["is_best_price"], false);
    assert_eq!(summary[2]["total_price"], 680);

    // Coverage filter and descending sort compose.
    let resp = h
        .priya
        .get(&format!("/orders/{order_id}/quotations?coverage=full&sort=desc"))
        .await;
    let body: Value = resp.json().await.unwrap();
    let totals: Vec<u64> = body["summary"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["total_price"].as_u64().unwrap())
        .collect();
    assert_eq!(totals, [680, 600]);

    // Accept C: order accepted, A and B rejected, C accepted.
    let resp = h.priya.accept_quotation(order_id, &quote_c.id.0).await;
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "accepted");

    let resp = h
        .priya
        .get(&format!("/orders/{order_id}/quotations"))
        .await;
    let body: Value = resp.json().await.unwrap();
    for q in body["quotations"].as_array().unwrap() {
        let expected = if q["id"] == quote_c.id.0 { "accepted" } else { "rejected" };
        assert_eq!(q["status"], expected, "quotation {}", q["id"]);
    }

    // A late quote attempt by a fourth seller is a conflict, not a write.
    let divya = h.participant("divya", "seller");
    let resp = divya
        .post(
            &format!("/orders/{order_id}/quotations"),
            &json!({ "items": staples_quote(200, 80, 70), "discount": 0 }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    assert_eq!(error_kind(resp).await, "invalid_transition");

    // Completion is a pass-through from accepted.
    let resp = h.priya.put(&format!("/orders/{order_id}/complete"), None).await;
    assert_eq!(resp.status(), 200);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], "completed");
}

#[tokio::test]
async fn validation_errors_are_distinguished_from_conflicts() {
    let h = TestHarness::setup().await;

    // Empty wanted list: the caller's input is wrong.
    let resp = h.priya.post("/orders", &json!({ "items": [] })).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_kind(resp).await, "validation_error");

    // Non-positive quantity.
    let resp = h
        .priya
        .post(
            "/orders",
            &json!({ "items": [
                { "product_name": "Basmati Rice", "category": "Staples", "quantity": 0.0, "unit": "kg" }
            ]}),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Incomplete coverage: a quote must declare every requested line.
    let order = h.priya.create_order(staples_order()).await;
    let resp = h
        .arjun
        .post(
            &format!("/orders/{}/quotations", order.id.0),
            &json!({ "items": [
                { "product_name": "Basmati Rice", "unit": "kg", "quantity": 5.0, "price_per_unit": 90, "available": true }
            ], "discount": 0 }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(error_kind(resp).await, "validation_error");
}

#[tokio::test]
async fn unknown_ids_and_wrong_actors() {
    let h = TestHarness::setup().await;

    let resp = h.priya.get("/orders/ord-missing").await;
    assert_eq!(resp.status(), 404);
    assert_eq!(error_kind(resp).await, "not_found");

    let order = h.priya.create_order(staples_order()).await;
    let quote = h
        .arjun
        .submit_quotation(&order.id.0, staples_quote(240, 90, 80), 0)
        .await;

    // Another buyer cannot accept or cancel priya's order.
    let rohan = h.participant("rohan", "buyer");
    let resp = rohan.accept_quotation(&order.id.0, &quote.id.0).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(error_kind(resp).await, "forbidden");
    let resp = rohan.put(&format!("/orders/{}/cancel", order.id.0), None).await;
    assert_eq!(resp.status(), 403);

    // A seller cannot act through buyer-only endpoints at all.
    let resp = h.arjun.accept_quotation(&order.id.0, &quote.id.0).await;
    assert_eq!(resp.status(), 403);

    // Accepting a quotation that is not on this order is unknown.
    let resp = h.priya.accept_quotation(&order.id.0, "quo-missing").await;
    assert_eq!(resp.status(), 404);

    // Requests without session headers are refused.
    let resp = reqwest::Client::new()
        .post(format!("{}/orders", h.base_url))
        .json(&json!({ "items": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn cancel_cascades_and_blocks_further_quoting() {
    let h = TestHarness::setup().await;
    let order = h.priya.create_order(staples_order()).await;
    let quote = h
        .arjun
        .submit_quotation(&order.id.0, staples_quote(240, 90, 80), 0)
        .await;

    let resp = h.priya.put(&format!("/orders/{}/cancel", order.id.0), None).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "cancelled");

    let resp = h.priya.get(&format!("/orders/{}/quotations", order.id.0)).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["quotations"][0]["status"], "rejected");
    // No active quotes left, so nothing carries the best-price flag.
    assert_eq!(body["summary"][0]["is_best_price"], false);

    let resp = h
        .meera
        .post(
            &format!("/orders/{}/quotations", order.id.0),
            &json!({ "items": staples_quote(300, 95, 80), "discount": 0 }),
        )
        .await;
    assert_eq!(resp.status(), 409);

    // The rejected quotation's channel is closed.
    let resp = h.arjun.send_message(&quote.id.0, "Any news?").await;
    assert_eq!(resp.status(), 409);
    assert_eq!(error_kind(resp).await, "channel_closed");
}

#[tokio::test]
async fn seller_revises_and_withdraws() {
    let h = TestHarness::setup().await;
    let order = h.priya.create_order(staples_order()).await;
    let order_id = order.id.0.as_str();
    let quote = h
        .arjun
        .submit_quotation(order_id, staples_quote(240, 90, 80), 0)
        .await;

    // A second pending quote from the same seller is refused.
    let resp = h
        .arjun
        .post(
            &format!("/orders/{order_id}/quotations"),
            &json!({ "items": staples_quote(230, 85, 75), "discount": 0 }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Revision re-validates and re-prices.
    let resp = h
        .arjun
        .put(
            &format!("/quotations/{}", quote.id.0),
            Some(&json!({ "items": staples_quote(230, 85, 75), "discount": 40 })),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["discount"], 40);

    // Only the owner may revise.
    let resp = h
        .meera
        .put(
            &format!("/quotations/{}", quote.id.0),
            Some(&json!({ "items": staples_quote(1, 1, 1), "discount": 0 })),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // Withdrawing the only offer reverts the order to pending.
    let resp = h.arjun.delete(&format!("/quotations/{}", quote.id.0)).await;
    assert_eq!(resp.status(), 200);
    let resp = h.priya.get(&format!("/orders/{order_id}")).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "pending");

    // The withdrawn quote stays visible in history but cannot be revised.
    let resp = h
        .arjun
        .put(
            &format!("/quotations/{}", quote.id.0),
            Some(&json!({ "items": staples_quote(230, 85, 75), "discount": 0 })),
        )
        .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn chat_follows_quotation_state() {
    let h = TestHarness::setup().await;
    let order = h.priya.create_order(staples_order()).await;
    let order_id = order.id.0.as_str();
    let winner = h
        .arjun
        .submit_quotation(order_id, staples_quote(240, 90, 80), 0)
        .await;
    let loser = h
        .meera
        .submit_quotation(order_id, staples_quote(250, 95, 85), 0)
        .await;

    let resp = h.priya.send_message(&loser.id.0, "Can you do better on rice?").await;
    assert_eq!(resp.status(), 200);
    let resp = h.meera.send_message(&loser.id.0, "95 is my floor.").await;
    assert_eq!(resp.status(), 200);

    // Empty bodies are invalid, not conflicts.
    let resp = h.priya.send_message(&loser.id.0, "   ").await;
    assert_eq!(resp.status(), 400);

    let resp = h.priya.accept_quotation(order_id, &winner.id.0).await;
    assert_eq!(resp.status(), 200);

    // Winner chat stays open after acceptance; loser chat is closed.
    let resp = h.priya.send_message(&winner.id.0, "See you Tuesday.").await;
    assert_eq!(resp.status(), 200);
    let resp = h.meera.send_message(&loser.id.0, "Final offer!").await;
    assert_eq!(resp.status(), 409);
    assert_eq!(error_kind(resp).await, "channel_closed");

    // History on the closed channel is still readable.
    let resp = h.priya.get(&format!("/messages/quotation/{}", loser.id.0)).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["open"], false);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender_role"], "buyer");
    assert_eq!(messages[1]["sender_role"], "seller");
}

#[tokio::test]
async fn buyer_order_listing_filters_by_buyer() {
    let h = TestHarness::setup().await;
    let rohan = h.participant("rohan", "buyer");
    h.priya.create_order(staples_order()).await;
    h.priya.create_order(staples_order()).await;
    rohan.create_order(staples_order()).await;

    let resp = h.priya.get("/orders?buyer=priya").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["orders"].as_array().unwrap().len(), 2);

    let resp = h.priya.get("/orders").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["orders"].as_array().unwrap().len(), 3);
}

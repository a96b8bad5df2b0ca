//! Cart behaviour over HTTP: guest carts, quantity clamping and the merge
//! into the remote cart on sign-in.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use golzar_core::Role;
use golzar_integration_tests::TestApp;
use golzar_storefront::backend::{DataApi, Query, Table};
use serde_json::json;

#[tokio::test]
async fn test_guest_add_clamps_to_stock() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let rose = app.seed_product(&store, "رز قرمز", "100000", 3);

    let response = app
        .post("/cart/add", json!({"product_id": rose["id"], "quantity": 5}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["items"][0]["quantity"], 3);
    assert_eq!(response.body["items"][0]["store_name"], "گل رز");
    assert_eq!(response.body["total_items"], 3);
    assert_eq!(response.body["total_price"], "300000");

    // The three roses are reserved, so nothing is left to add.
    assert_eq!(app.backend.rows(Table::Products)[0]["stock"], 0);
    let response = app.post("/cart/add", json!({"product_id": rose["id"]})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart.body["items"][0]["quantity"], 3);

    // The cart lives in the session, not the backend.
    assert!(app.backend.rows(Table::CartItems).is_empty());
    let fresh = app.new_visitor().get("/cart").await;
    assert_eq!(fresh.body["items"], json!([]));
}

#[tokio::test]
async fn test_update_remove_and_clear() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let rose = app.seed_product(&store, "رز قرمز", "100000", 10);
    let tulip = app.seed_product(&store, "لاله", "50000", 10);

    app.post("/cart/add", json!({"product_id": rose["id"], "quantity": 2})).await;
    let cart = app.post("/cart/add", json!({"product_id": tulip["id"]})).await;
    let rose_line = cart.body["items"][0]["id"].clone();
    let tulip_line = cart.body["items"][1]["id"].clone();

    let cart = app
        .post("/cart/update", json!({"item_id": rose_line, "quantity": 0}))
        .await;
    assert_eq!(cart.body["items"][0]["quantity"], 1);

    let cart = app
        .post("/cart/update", json!({"item_id": rose_line, "quantity": 99}))
        .await;
    assert_eq!(cart.body["items"][0]["quantity"], 10);

    let cart = app.post("/cart/remove", json!({"item_id": tulip_line})).await;
    assert_eq!(cart.body["items"].as_array().unwrap().len(), 1);

    let missing = app.post("/cart/remove", json!({"item_id": tulip_line})).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let cart = app.post("/cart/clear", json!({})).await;
    assert_eq!(cart.body["items"], json!([]));
    assert_eq!(cart.body["total_price"], "0");
}

#[tokio::test]
async fn test_unavailable_products_cannot_be_added() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let sold_out = app.seed_product(&store, "ارکیده", "250000", 0);

    let response = app.post("/cart/add", json!({"product_id": sold_out["id"]})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "موجودی این محصول به اتمام رسیده است");

    let hidden = app.seed_product(&store, "نرگس", "90000", 4);
    app.backend
        .update(
            None,
            Table::Products,
            &Query::new().eq("id", hidden["id"].as_str().unwrap()),
            json!({"is_available": false}),
        )
        .await
        .unwrap();
    let response = app.post("/cart/add", json!({"product_id": hidden["id"]})).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"], json!([]));
}

#[tokio::test]
async fn test_add_reserves_stock_and_failed_reservation_changes_nothing() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let rose = app.seed_product(&store, "رز قرمز", "100000", 5);

    let cart = app
        .post("/cart/add", json!({"product_id": rose["id"], "quantity": 2}))
        .await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["items"][0]["max_stock"], 5);
    assert_eq!(app.backend.rows(Table::Products)[0]["stock"], 3);

    app.backend.fail_writes(Table::Products);
    let response = app.post("/cart/add", json!({"product_id": rose["id"]})).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["error"], "مشکلی در بروزرسانی موجودی پیش آمد");
    assert_eq!(app.backend.rows(Table::Products)[0]["stock"], 3);
    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_groups_by_store() {
    let mut app = TestApp::new();
    let (_, roses) = app.seed_store("rose@example.ir", "گل رز");
    let (_, plants) = app.seed_store("plant@example.ir", "گلخانه");
    let rose = app.seed_product(&roses, "رز قرمز", "100000", 5);
    let fern = app.seed_product(&plants, "سرخس", "80000", 5);

    app.post("/cart/add", json!({"product_id": rose["id"], "quantity": 2})).await;
    let cart = app.post("/cart/add", json!({"product_id": fern["id"]})).await;

    let stores = cart.body["stores"].as_array().unwrap();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores[0]["store_name"], "گل رز");
    assert_eq!(stores[0]["total"], "200000");
    assert_eq!(stores[1]["store_name"], "گلخانه");
    assert_eq!(cart.body["total_price"], "280000");
}

#[tokio::test]
async fn test_guest_cart_merges_on_login() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let rose = app.seed_product(&store, "رز قرمز", "100000", 3);
    let tulip = app.seed_product(&store, "لاله", "50000", 4);
    let customer = app.seed_user("mina@example.ir", "مینا", &[Role::Customer]);

    // Two roses already saved in the remote cart from an earlier visit.
    app.backend.insert_row(
        Table::CartItems,
        json!({
            "user_id": customer,
            "product_id": rose["id"],
            "product_name": "رز قرمز",
            "price": "100000",
            "quantity": 2,
            "store_id": store["id"],
            "store_name": "گل رز",
            "max_stock": 3,
        }),
    );

    app.post("/cart/add", json!({"product_id": rose["id"], "quantity": 2})).await;
    app.post("/cart/add", json!({"product_id": tulip["id"]})).await;
    app.login("mina@example.ir").await;

    let cart = app.get("/cart").await;
    let items = cart.body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let rose_line = items.iter().find(|i| i["name"] == "رز قرمز").unwrap();
    assert_eq!(rose_line["quantity"], 3);
    assert_eq!(app.backend.rows(Table::CartItems).len(), 2);

    // The remote cart is what signed-in users see; signing out leaves an
    // empty guest cart behind.
    assert_eq!(app.post("/auth/logout", json!({})).await.status, StatusCode::NO_CONTENT);
    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"], json!([]));
}

#[tokio::test]
async fn test_failed_merge_keeps_guest_lines() {
    let mut app = TestApp::new();
    let (_, store) = app.seed_store("rose@example.ir", "گل رز");
    let rose = app.seed_product(&store, "رز قرمز", "100000", 3);
    app.seed_user("mina@example.ir", "مینا", &[Role::Customer]);

    app.post("/cart/add", json!({"product_id": rose["id"]})).await;
    app.backend.fail_writes(Table::CartItems);
    app.login("mina@example.ir").await;

    // Sign-in succeeds; the remote cart is still empty.
    assert!(app.backend.rows(Table::CartItems).is_empty());
    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"], json!([]));

    // Signing in again once the backend recovers picks the guest line up.
    app.backend.heal(Table::CartItems);
    app.post("/auth/logout", json!({})).await;
    app.login("mina@example.ir").await;
    let cart = app.get("/cart").await;
    assert_eq!(cart.body["items"][0]["quantity"], 1);
}

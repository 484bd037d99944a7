use std::net::TcpListener;
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::redirect::Policy;
use shopfront_common::Money;
use shopfront_config::AppConfig;
use shopfront_db::{Database, NewUser, ProductInput};
use shopfront_security::hash_password;
use shopfront_web::StorefrontServer;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse battery";

/// Pick a random available port.
fn random_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
    listener.local_addr().unwrap().port()
}

fn test_config(port: u16) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.store.name = "Test Roasters".to_string();
    config
}

/// A migrated in-memory database with one category, one product and an admin.
fn seeded_database() -> (Arc<Database>, i64) {
    let db = Database::in_memory_migrated().unwrap();
    let category = db.create_category("Beans", "Whole bean coffee").unwrap();
    let product = db
        .create_product(&ProductInput {
            category_id: Some(category),
            name: "Ethiopia Guji".to_string(),
            description: "Bright and floral".to_string(),
            price: Money::from_cents(1850),
            stock: 3,
            image_url: None,
            is_active: true,
        })
        .unwrap();
    let hash = hash_password(ADMIN_PASSWORD).unwrap();
    db.create_user(&NewUser {
        email: ADMIN_EMAIL,
        name: "Admin",
        password_hash: &hash,
        is_admin: true,
    })
    .unwrap();
    (Arc::new(db), product)
}

/// Start the storefront in the background and return its base URL.
async fn start_test_server(db: Arc<Database>) -> String {
    let port = random_port();
    let config = test_config(port);
    tokio::spawn(async move {
        let server = StorefrontServer::with_database(config, db);
        let _ = server.run().await;
    });

    // Wait for the server to be ready
    for _ in 0..50 {
        if TcpListener::bind(format!("127.0.0.1:{port}")).is_err() {
            break; // port is in use = server is up
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    format!("http://127.0.0.1:{port}")
}

fn browser() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

fn browser_without_redirects() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let (db, _) = seeded_database();
    let base = start_test_server(db).await;

    let resp = reqwest::get(format!("{base}/health"))
        .await
        .expect("health request failed");
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn home_lists_products_and_unknown_pages_are_404() {
    let (db, _) = seeded_database();
    let base = start_test_server(db).await;
    let client = browser();

    let resp = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("shopfront_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("Test Roasters"));
    assert!(body.contains("Ethiopia Guji"));
    assert!(body.contains("$18.50"));

    let missing = client
        .get(format!("{base}/product/no-such-thing"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let nowhere = client.get(format!("{base}/nowhere")).send().await.unwrap();
    assert_eq!(nowhere.status(), StatusCode::NOT_FOUND);
    assert!(nowhere.text().await.unwrap().contains("Page not found"));
}

#[tokio::test]
async fn guest_can_fill_cart_and_check_out() {
    let (db, product) = seeded_database();
    let base = start_test_server(Arc::clone(&db)).await;
    let client = browser();

    let cart = client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", product.to_string()), ("quantity", "2".to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(cart.url().path(), "/cart");
    let body = cart.text().await.unwrap();
    assert!(body.contains("Ethiopia Guji"));
    assert!(body.contains("$37.00"));
    assert!(body.contains("Cart (2)"));

    let checkout = client.get(format!("{base}/checkout")).send().await.unwrap();
    assert!(checkout.text().await.unwrap().contains("Place order"));

    let receipt = client
        .post(format!("{base}/checkout"))
        .form(&[
            ("name", "Grace Hopper"),
            ("email", "grace@example.com"),
            ("address", "1 Harbour Road"),
        ])
        .send()
        .await
        .unwrap();
    assert!(receipt.url().path().starts_with("/orders/"));
    let body = receipt.text().await.unwrap();
    assert!(body.contains("Your order has been placed"));
    assert!(body.contains("Grace Hopper"));
    assert!(body.contains("Cart (0)"));

    assert_eq!(db.product_by_id(product).unwrap().unwrap().stock, 1);
    assert_eq!(db.list_orders(None).unwrap().len(), 1);

    // Another visitor cannot see the receipt.
    let order_path = receipt_path(&db);
    let stranger = browser()
        .get(format!("{base}{order_path}"))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::NOT_FOUND);
}

fn receipt_path(db: &Database) -> String {
    let order = &db.list_orders(None).unwrap()[0];
    format!("/orders/{}", order.id)
}

#[tokio::test]
async fn cart_refuses_more_than_stock() {
    let (db, product) = seeded_database();
    let base = start_test_server(db).await;
    let client = browser();

    let page = client
        .post(format!("{base}/cart/add"))
        .form(&[("product_id", product.to_string()), ("quantity", "5".to_string())])
        .send()
        .await
        .unwrap();
    let body = page.text().await.unwrap();
    assert!(body.contains("Only 3 of Ethiopia Guji left in stock."));
    assert!(body.contains("Cart (0)"));
}

#[tokio::test]
async fn admin_requires_login() {
    let (db, _) = seeded_database();
    let base = start_test_server(db).await;
    let client = browser_without_redirects();

    let resp = client.get(format!("{base}/admin/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        resp.headers().get(reqwest::header::LOCATION).unwrap(),
        "/login?next=/admin/orders"
    );
}

#[tokio::test]
async fn admin_logs_in_and_manages_catalog() {
    let (db, beans) = seeded_database();
    let base = start_test_server(Arc::clone(&db)).await;
    let client = browser();

    let wrong = client
        .post(format!("{base}/login"))
        .form(&[("email", ADMIN_EMAIL), ("password", "nope"), ("next", "/admin")])
        .send()
        .await
        .unwrap();
    assert!(wrong.text().await.unwrap().contains("Invalid email or password."));

    let dashboard = client
        .post(format!("{base}/login"))
        .form(&[("email", ADMIN_EMAIL), ("password", ADMIN_PASSWORD), ("next", "/admin")])
        .send()
        .await
        .unwrap();
    assert_eq!(dashboard.url().path(), "/admin");
    assert!(dashboard.text().await.unwrap().contains("Dashboard"));

    let created = client
        .post(format!("{base}/admin/products/new"))
        .form(&[
            ("name", "Pour-over Kettle"),
            ("price", "45.00"),
            ("stock", "4"),
            ("category_id", ""),
            ("description", "Gooseneck"),
            ("is_active", "on"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(created.url().path(), "/admin/products");
    assert!(created.text().await.unwrap().contains("Pour-over Kettle"));
    assert_eq!(db.all_products().unwrap().len(), 2);

    let rejected = client
        .post(format!("{base}/admin/products/new"))
        .form(&[("name", "Bad"), ("price", "-3"), ("stock", "1")])
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::OK);
    assert!(rejected.text().await.unwrap().contains(r#"class="flash flash-error""#));
    assert_eq!(db.all_products().unwrap().len(), 2);

    let overpriced = client
        .post(format!("{base}/admin/products/new"))
        .form(&[("name", "Gold Grinder"), ("price", "92233720368547758.07"), ("stock", "1")])
        .send()
        .await
        .unwrap();
    assert!(overpriced.text().await.unwrap().contains("Price cannot exceed"));
    assert_eq!(db.all_products().unwrap().len(), 2);

    let restocked = client
        .post(format!("{base}/admin/products/{beans}/stock"))
        .form(&[("delta", "+4")])
        .send()
        .await
        .unwrap();
    assert_eq!(restocked.url().path(), "/admin/products");
    assert!(restocked.text().await.unwrap().contains("Stock is now 7."));

    let oversold = client
        .post(format!("{base}/admin/products/{beans}/stock"))
        .form(&[("delta", "-100")])
        .send()
        .await
        .unwrap();
    assert!(oversold.text().await.unwrap().contains(r#"class="flash flash-error""#));
    assert_eq!(db.product_by_id(beans).unwrap().unwrap().stock, 7);
}
